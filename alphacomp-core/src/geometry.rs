//! Sizes, rectangles and affine transforms in pixel space

use std::fmt;

/// Width and height in pixels
#[derive(Debug, Clone, Copy, PartialEq, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Size {
    pub width: f64,
    pub height: f64,
}

impl Size {
    pub fn new(width: f64, height: f64) -> Self {
        Self { width, height }
    }

    /// Creates a size from integer pixel dimensions
    pub fn from_pixels(width: u32, height: u32) -> Self {
        Self::new(width as f64, height as f64)
    }

    /// Returns the size rounded to whole pixels
    pub fn to_pixels(&self) -> (u32, u32) {
        (
            self.width.max(0.0).round() as u32,
            self.height.max(0.0).round() as u32,
        )
    }

    pub fn is_empty(&self) -> bool {
        self.width <= 0.0 || self.height <= 0.0
    }
}

impl fmt::Display for Size {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}x{}", self.width, self.height)
    }
}

/// A point in pixel space, origin at the top-left corner
#[derive(Debug, Clone, Copy, PartialEq, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Point {
    pub x: f64,
    pub y: f64,
}

impl Point {
    pub const ZERO: Point = Point { x: 0.0, y: 0.0 };

    pub fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }
}

/// An axis-aligned rectangle
#[derive(Debug, Clone, Copy, PartialEq, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Rect {
    pub origin: Point,
    pub size: Size,
}

impl Rect {
    pub fn new(x: f64, y: f64, width: f64, height: f64) -> Self {
        Self {
            origin: Point::new(x, y),
            size: Size::new(width, height),
        }
    }

    /// Creates a rectangle of `size` anchored at the origin
    pub fn with_size(size: Size) -> Self {
        Self {
            origin: Point::ZERO,
            size,
        }
    }

    /// Returns the rectangle moved by `offset`
    pub fn offset_by(&self, offset: Point) -> Self {
        Self {
            origin: Point::new(self.origin.x + offset.x, self.origin.y + offset.y),
            size: self.size,
        }
    }
}

impl fmt::Display for Rect {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "({}, {}) {}", self.origin.x, self.origin.y, self.size)
    }
}

/// A 2D affine transform `[a b; c d] + (tx, ty)` applied to row vectors
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Transform {
    pub a: f64,
    pub b: f64,
    pub c: f64,
    pub d: f64,
    pub tx: f64,
    pub ty: f64,
}

impl Transform {
    pub const IDENTITY: Transform = Transform {
        a: 1.0,
        b: 0.0,
        c: 0.0,
        d: 1.0,
        tx: 0.0,
        ty: 0.0,
    };

    /// Parses a 3x3 display matrix as stored in container side data.
    ///
    /// The scale/rotation and translation entries are 16.16 fixed point.
    pub fn from_display_matrix(matrix: &[i32; 9]) -> Self {
        let fixed = |v: i32| v as f64 / 65536.0;
        Self {
            a: fixed(matrix[0]),
            b: fixed(matrix[1]),
            c: fixed(matrix[3]),
            d: fixed(matrix[4]),
            tx: fixed(matrix[6]),
            ty: fixed(matrix[7]),
        }
    }

    /// Creates a pure rotation; positive angles rotate clockwise on screen
    pub fn rotation(degrees: f64) -> Self {
        let (sin, cos) = degrees.to_radians().sin_cos();
        Self {
            a: cos,
            b: sin,
            c: -sin,
            d: cos,
            tx: 0.0,
            ty: 0.0,
        }
    }

    pub fn is_identity(&self) -> bool {
        const EPS: f64 = 1e-9;
        (self.a - 1.0).abs() < EPS
            && self.b.abs() < EPS
            && self.c.abs() < EPS
            && (self.d - 1.0).abs() < EPS
            && self.tx.abs() < EPS
            && self.ty.abs() < EPS
    }

    /// Rotation component in degrees, normalized to `(-180, 180]`
    pub fn rotation_degrees(&self) -> f64 {
        self.b.atan2(self.a).to_degrees()
    }
}

impl Default for Transform {
    fn default() -> Self {
        Self::IDENTITY
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_display_matrix_identity() {
        let matrix = [0x10000, 0, 0, 0, 0x10000, 0, 0, 0, 0x4000_0000];
        assert!(Transform::from_display_matrix(&matrix).is_identity());
    }

    #[test]
    fn test_display_matrix_rotation() {
        // 90 degree rotation: a = 0, b = 1, c = -1, d = 0
        let matrix = [0, 0x10000, 0, -0x10000, 0, 0, 0, 0, 0x4000_0000];
        let transform = Transform::from_display_matrix(&matrix);
        assert!(!transform.is_identity());
        assert!((transform.rotation_degrees() - 90.0).abs() < 1e-6);
        assert_eq!(transform, Transform::rotation(90.0).rounded());
    }

    #[test]
    fn test_size_to_pixels() {
        assert_eq!(Size::new(1919.6, 1080.2).to_pixels(), (1920, 1080));
        assert!(Size::new(0.0, 10.0).is_empty());
    }

    impl Transform {
        fn rounded(self) -> Self {
            let r = |v: f64| (v * 1e6).round() / 1e6 + 0.0;
            Self {
                a: r(self.a),
                b: r(self.b),
                c: r(self.c),
                d: r(self.d),
                tx: r(self.tx),
                ty: r(self.ty),
            }
        }
    }
}
