//! Frame compositor for flattening layer graphs over video frames

use alphacomp_core::layer::pixel_origin;
use alphacomp_core::{AnimationTool, Compositor, LayerContents, Rect, Size};
use image::imageops::{self, FilterType};
use image::{Rgba, RgbaImage};
use std::collections::HashMap;
use std::sync::Arc;

/// Raster compositor that flattens a layer tree into straight-alpha RGBA frames
#[derive(Default)]
pub struct FrameCompositor {
    scaled_images: HashMap<ScaleKey, ScaledImage>,
}

/// Source image identity plus target pixel size
type ScaleKey = (usize, u32, u32);

struct ScaledImage {
    // Keeps the source alive so its address is not reused by another image
    _source: Arc<RgbaImage>,
    scaled: RgbaImage,
}

enum Draw {
    Video(Rect),
    Image(Arc<RgbaImage>, Rect),
}

impl FrameCompositor {
    /// Creates a new frame compositor
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns `image` resized to the layer frame, caching one copy per
    /// source image and size
    fn image_for_layer<'a>(&'a mut self, image: &'a Arc<RgbaImage>, frame: &Rect) -> &'a RgbaImage {
        let (width, height) = frame.size.to_pixels();
        if image.width() == width && image.height() == height {
            return image;
        }
        let key = (Arc::as_ptr(image) as usize, width, height);
        &self
            .scaled_images
            .entry(key)
            .or_insert_with(|| ScaledImage {
                _source: Arc::clone(image),
                scaled: imageops::resize(&**image, width, height, FilterType::Triangle),
            })
            .scaled
    }
}

impl Compositor for FrameCompositor {
    fn flatten(
        &mut self,
        tool: &AnimationTool,
        video_frame: &RgbaImage,
        render_size: Size,
    ) -> alphacomp_core::Result<RgbaImage> {
        let (width, height) = render_size.to_pixels();
        if width == 0 || height == 0 {
            return Err(alphacomp_core::Error::InvalidRenderSize(render_size));
        }

        // Transparent canvas; layers are drawn parent first, then sublayers in order
        let mut canvas = RgbaImage::new(width, height);

        let mut draws = Vec::new();
        tool.tree().visit(|id, layer, frame| match &layer.contents {
            LayerContents::VideoSurface if id == tool.video_layer() => draws.push(Draw::Video(frame)),
            LayerContents::Image(image) => draws.push(Draw::Image(Arc::clone(image), frame)),
            _ => {}
        });

        for draw in draws {
            match draw {
                Draw::Video(frame) => {
                    let (x, y) = pixel_origin(&frame);
                    let (w, h) = frame.size.to_pixels();
                    if video_frame.width() == w && video_frame.height() == h {
                        overlay_image(&mut canvas, video_frame, x, y);
                    } else {
                        let scaled = imageops::resize(video_frame, w, h, FilterType::Triangle);
                        overlay_image(&mut canvas, &scaled, x, y);
                    }
                }
                Draw::Image(image, frame) => {
                    let (x, y) = pixel_origin(&frame);
                    let source = self.image_for_layer(&image, &frame);
                    overlay_image(&mut canvas, source, x, y);
                }
            }
        }

        Ok(canvas)
    }
}

/// Draws `overlay` over `base` at the specified position
fn overlay_image(base: &mut RgbaImage, overlay: &RgbaImage, x: i64, y: i64) {
    let base_width = base.width() as i64;
    let base_height = base.height() as i64;
    let overlay_width = overlay.width() as i64;
    let overlay_height = overlay.height() as i64;

    // Calculate the region to copy
    let src_x_start = 0.max(-x);
    let src_y_start = 0.max(-y);
    let src_x_end = overlay_width.min(base_width - x);
    let src_y_end = overlay_height.min(base_height - y);

    if src_x_start >= src_x_end || src_y_start >= src_y_end {
        return; // Nothing to overlay
    }

    for src_y in src_y_start..src_y_end {
        for src_x in src_x_start..src_x_end {
            let dest_x = (x + src_x) as u32;
            let dest_y = (y + src_y) as u32;

            let overlay_pixel = overlay.get_pixel(src_x as u32, src_y as u32);
            let base_pixel = base.get_pixel(dest_x, dest_y);
            let blended = blend_over(overlay_pixel, base_pixel);
            base.put_pixel(dest_x, dest_y, blended);
        }
    }
}

/// Porter-Duff "source over" for straight (non-premultiplied) alpha
fn blend_over(src: &Rgba<u8>, dst: &Rgba<u8>) -> Rgba<u8> {
    match src[3] {
        255 => return *src,
        0 => return *dst,
        _ => {}
    }

    let src_alpha = src[3] as f32 / 255.0;
    let dst_alpha = dst[3] as f32 / 255.0;
    let out_alpha = src_alpha + dst_alpha * (1.0 - src_alpha);

    let channel = |i: usize| {
        let value = (src[i] as f32 * src_alpha + dst[i] as f32 * dst_alpha * (1.0 - src_alpha)) / out_alpha;
        value.round().clamp(0.0, 255.0) as u8
    };

    Rgba([
        channel(0),
        channel(1),
        channel(2),
        (out_alpha * 255.0).round().clamp(0.0, 255.0) as u8,
    ])
}

#[cfg(test)]
mod tests {
    use super::*;
    use alphacomp_core::LayerTree;

    const RED: Rgba<u8> = Rgba([255, 0, 0, 255]);
    const HALF_RED: Rgba<u8> = Rgba([255, 0, 0, 128]);
    const BLUE: Rgba<u8> = Rgba([0, 0, 255, 255]);
    const CLEAR: Rgba<u8> = Rgba([0, 0, 0, 0]);

    /// Parent + video layer + overlay layer holding one image at its native size
    fn overlay_tool(video_size: Size, image: RgbaImage) -> AnimationTool {
        let frame = Rect::with_size(video_size);
        let image_frame = Rect::with_size(Size::from_pixels(image.width(), image.height()));

        let mut tree = LayerTree::new(frame);
        let root = tree.root();
        let video = tree.add_video_surface(root, frame).unwrap();
        let overlay = tree.add_layer(root, frame).unwrap();
        tree.add_image(overlay, Arc::new(image), image_frame).unwrap();

        AnimationTool::post_processing_as_video_layer(video, tree).unwrap()
    }

    #[test]
    fn test_flatten_keeps_render_size_and_alpha() {
        let mut badge = RgbaImage::from_pixel(4, 4, CLEAR);
        badge.put_pixel(1, 1, BLUE);

        let tool = overlay_tool(Size::new(8.0, 6.0), badge);
        let video = RgbaImage::from_pixel(8, 6, HALF_RED);

        let mut compositor = FrameCompositor::new();
        let frame = compositor.flatten(&tool, &video, Size::new(8.0, 6.0)).unwrap();

        assert_eq!(frame.dimensions(), (8, 6));
        // Opaque overlay pixel replaces the video
        assert_eq!(*frame.get_pixel(1, 1), BLUE);
        // Transparent overlay pixels keep the video pixel, alpha included
        assert_eq!(*frame.get_pixel(0, 0), HALF_RED);
        // Outside the overlay image the video is untouched
        assert_eq!(*frame.get_pixel(7, 5), HALF_RED);
    }

    #[test]
    fn test_overlay_is_not_scaled() {
        let badge = RgbaImage::from_pixel(2, 2, BLUE);
        let tool = overlay_tool(Size::new(6.0, 6.0), badge);
        let video = RgbaImage::from_pixel(6, 6, RED);

        let frame = FrameCompositor::new()
            .flatten(&tool, &video, Size::new(6.0, 6.0))
            .unwrap();

        assert_eq!(*frame.get_pixel(0, 0), BLUE);
        assert_eq!(*frame.get_pixel(1, 1), BLUE);
        assert_eq!(*frame.get_pixel(2, 2), RED);
        assert_eq!(*frame.get_pixel(0, 2), RED);
    }

    #[test]
    fn test_video_is_scaled_to_layer() {
        let tool = overlay_tool(Size::new(4.0, 4.0), RgbaImage::new(1, 1));
        let video = RgbaImage::from_pixel(2, 2, RED);

        let frame = FrameCompositor::new()
            .flatten(&tool, &video, Size::new(4.0, 4.0))
            .unwrap();

        assert_eq!(frame.dimensions(), (4, 4));
        assert_eq!(*frame.get_pixel(3, 3), RED);
    }

    #[test]
    fn test_scaled_images_follow_the_current_tool() {
        let size = Size::new(4.0, 4.0);
        let video = RgbaImage::from_pixel(4, 4, CLEAR);
        let build = |color| {
            let frame = Rect::with_size(size);
            let mut tree = LayerTree::new(frame);
            let root = tree.root();
            let video = tree.add_video_surface(root, frame).unwrap();
            // Drawn at twice its native size, so it goes through the scale cache
            tree.add_image(root, Arc::new(RgbaImage::from_pixel(2, 2, color)), frame)
                .unwrap();
            AnimationTool::post_processing_as_video_layer(video, tree).unwrap()
        };

        let mut compositor = FrameCompositor::new();
        let first = compositor.flatten(&build(RED), &video, size).unwrap();
        let second = compositor.flatten(&build(BLUE), &video, size).unwrap();

        assert_eq!(*first.get_pixel(3, 3), RED);
        assert_eq!(*second.get_pixel(3, 3), BLUE);
    }

    #[test]
    fn test_empty_render_size_is_rejected() {
        let tool = overlay_tool(Size::new(4.0, 4.0), RgbaImage::new(1, 1));
        let video = RgbaImage::new(4, 4);
        assert!(FrameCompositor::new()
            .flatten(&tool, &video, Size::new(0.0, 4.0))
            .is_err());
    }

    #[test]
    fn test_blend_over_translucent() {
        let blended = blend_over(&Rgba([0, 0, 255, 128]), &RED);
        assert_eq!(blended[3], 255);
        assert!((blended[0] as i32 - 127).abs() <= 1);
        assert!((blended[2] as i32 - 128).abs() <= 1);

        // Over a transparent destination the source is unchanged
        assert_eq!(blend_over(&HALF_RED, &CLEAR), HALF_RED);
    }
}
