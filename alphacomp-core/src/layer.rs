//! Layer graphs composited over decoded video frames
//!
//! A [`LayerTree`] is a small arena of layers. Every layer has a frame
//! relative to its parent (origin at the top-left corner) and optional
//! contents: either the surface decoded video frames are drawn into, or a
//! static image. Sublayers are drawn after their parent, in insertion order.

use crate::{Error, Point, Rect, Result, Size};
use image::RgbaImage;
use std::sync::Arc;

/// Handle to a layer inside a [`LayerTree`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct LayerId(usize);

/// What a layer draws
#[derive(Debug, Clone)]
pub enum LayerContents {
    /// Draws nothing itself; only groups sublayers
    Empty,
    /// Receives the decoded video frame, scaled to the layer frame
    VideoSurface,
    /// A static image drawn into the layer frame
    Image(Arc<RgbaImage>),
}

/// A single node of a layer tree
#[derive(Debug, Clone)]
pub struct Layer {
    /// Frame relative to the parent layer
    pub frame: Rect,
    pub contents: LayerContents,
    sublayers: Vec<LayerId>,
}

impl Layer {
    fn new(frame: Rect, contents: LayerContents) -> Self {
        Self {
            frame,
            contents,
            sublayers: Vec::new(),
        }
    }

    pub fn sublayers(&self) -> &[LayerId] {
        &self.sublayers
    }
}

/// A tree of layers rooted at a parent layer
#[derive(Debug, Clone)]
pub struct LayerTree {
    layers: Vec<Layer>,
}

impl LayerTree {
    /// Creates a tree whose root layer has the given frame
    pub fn new(root_frame: Rect) -> Self {
        Self {
            layers: vec![Layer::new(root_frame, LayerContents::Empty)],
        }
    }

    /// The root (parent) layer
    pub fn root(&self) -> LayerId {
        LayerId(0)
    }

    pub fn layer(&self, id: LayerId) -> Option<&Layer> {
        self.layers.get(id.0)
    }

    /// Adds an empty grouping layer under `parent`
    pub fn add_layer(&mut self, parent: LayerId, frame: Rect) -> Result<LayerId> {
        self.push(parent, Layer::new(frame, LayerContents::Empty))
    }

    /// Adds the surface decoded video frames are drawn into
    pub fn add_video_surface(&mut self, parent: LayerId, frame: Rect) -> Result<LayerId> {
        self.push(parent, Layer::new(frame, LayerContents::VideoSurface))
    }

    /// Adds a static image drawn into `frame`
    pub fn add_image(&mut self, parent: LayerId, image: Arc<RgbaImage>, frame: Rect) -> Result<LayerId> {
        self.push(parent, Layer::new(frame, LayerContents::Image(image)))
    }

    fn push(&mut self, parent: LayerId, layer: Layer) -> Result<LayerId> {
        if parent.0 >= self.layers.len() {
            return Err(Error::InvalidLayer(parent.0));
        }
        let id = LayerId(self.layers.len());
        self.layers.push(layer);
        self.layers[parent.0].sublayers.push(id);
        Ok(id)
    }

    /// Visits every layer in drawing order with its frame in root coordinates
    pub fn visit<F>(&self, mut visitor: F)
    where
        F: FnMut(LayerId, &Layer, Rect),
    {
        let root = self.root();
        let frame = self.layers[root.0].frame;
        self.visit_from(root, frame, &mut visitor);
    }

    fn visit_from<F>(&self, id: LayerId, absolute: Rect, visitor: &mut F)
    where
        F: FnMut(LayerId, &Layer, Rect),
    {
        let layer = &self.layers[id.0];
        visitor(id, layer, absolute);
        for &child in &layer.sublayers {
            let frame = self.layers[child.0].frame.offset_by(absolute.origin);
            self.visit_from(child, frame, visitor);
        }
    }
}

/// Binds a layer tree to the video frames of a composition.
///
/// Decoded frames are drawn into `video_layer`, then the whole tree under the
/// parent layer is flattened into the output frame.
#[derive(Debug, Clone)]
pub struct AnimationTool {
    tree: LayerTree,
    video_layer: LayerId,
}

impl AnimationTool {
    /// Uses `video_layer` of `tree` as the post-processing video surface
    pub fn post_processing_as_video_layer(video_layer: LayerId, tree: LayerTree) -> Result<Self> {
        match tree.layer(video_layer) {
            Some(Layer {
                contents: LayerContents::VideoSurface,
                ..
            }) => Ok(Self { tree, video_layer }),
            _ => Err(Error::InvalidLayer(video_layer.0)),
        }
    }

    pub fn tree(&self) -> &LayerTree {
        &self.tree
    }

    pub fn video_layer(&self) -> LayerId {
        self.video_layer
    }

    pub fn parent_layer(&self) -> LayerId {
        self.tree.root()
    }
}

/// Flattens a layer tree and a decoded video frame into an output frame
pub trait Compositor {
    /// Renders `tool` at `render_size`, drawing `video_frame` into its video layer
    fn flatten(&mut self, tool: &AnimationTool, video_frame: &RgbaImage, render_size: Size) -> Result<RgbaImage>;
}

/// Origin of a rectangle rounded to whole pixels
pub fn pixel_origin(rect: &Rect) -> (i64, i64) {
    let Point { x, y } = rect.origin;
    (x.round() as i64, y.round() as i64)
}
