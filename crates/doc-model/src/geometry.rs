//! Geometry primitives for page space and device space
//!
//! Page coordinates are in points (1/72 inch). Device coordinates are
//! integer pixel boxes obtained by transforming and rounding page rects.

/// A point in page or device space
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct Point {
    pub x: f32,
    pub y: f32,
}

impl Point {
    pub fn new(x: f32, y: f32) -> Self {
        Self { x, y }
    }
}

/// An axis-aligned rectangle with float coordinates
///
/// `x0,y0` is the top-left corner, `x1,y1` the bottom-right. An empty
/// rect has `x1 <= x0` or `y1 <= y0`.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct Rect {
    pub x0: f32,
    pub y0: f32,
    pub x1: f32,
    pub y1: f32,
}

impl Rect {
    pub const EMPTY: Rect = Rect { x0: 0.0, y0: 0.0, x1: 0.0, y1: 0.0 };

    /// A rect large enough to never clip anything
    pub const INFINITE: Rect = Rect {
        x0: f32::MIN / 2.0,
        y0: f32::MIN / 2.0,
        x1: f32::MAX / 2.0,
        y1: f32::MAX / 2.0,
    };

    pub fn new(x0: f32, y0: f32, x1: f32, y1: f32) -> Self {
        Self { x0, y0, x1, y1 }
    }

    pub fn from_origin_size(x: f32, y: f32, w: f32, h: f32) -> Self {
        Self { x0: x, y0: y, x1: x + w, y1: y + h }
    }

    pub fn width(&self) -> f32 {
        self.x1 - self.x0
    }

    pub fn height(&self) -> f32 {
        self.y1 - self.y0
    }

    pub fn is_empty(&self) -> bool {
        self.x1 <= self.x0 || self.y1 <= self.y0
    }

    /// Smallest rect containing both rects
    ///
    /// Union with an empty rect returns the other rect unchanged, so a
    /// running union can start from `Rect::EMPTY`.
    pub fn union(&self, other: &Rect) -> Rect {
        if self.is_empty() {
            return *other;
        }
        if other.is_empty() {
            return *self;
        }
        Rect {
            x0: self.x0.min(other.x0),
            y0: self.y0.min(other.y0),
            x1: self.x1.max(other.x1),
            y1: self.y1.max(other.y1),
        }
    }

    /// Intersection of two rects; empty if they do not overlap
    pub fn intersect(&self, other: &Rect) -> Rect {
        Rect {
            x0: self.x0.max(other.x0),
            y0: self.y0.max(other.y0),
            x1: self.x1.min(other.x1),
            y1: self.y1.min(other.y1),
        }
    }

    /// Transform all four corners and return the bounding rect
    pub fn transform(&self, m: &Matrix) -> Rect {
        let corners = [
            m.transform_point(Point::new(self.x0, self.y0)),
            m.transform_point(Point::new(self.x1, self.y0)),
            m.transform_point(Point::new(self.x0, self.y1)),
            m.transform_point(Point::new(self.x1, self.y1)),
        ];
        let mut out = Rect::new(corners[0].x, corners[0].y, corners[0].x, corners[0].y);
        for p in &corners[1..] {
            out.x0 = out.x0.min(p.x);
            out.y0 = out.y0.min(p.y);
            out.x1 = out.x1.max(p.x);
            out.y1 = out.y1.max(p.y);
        }
        out
    }

    /// Round each edge to the nearest integer pixel boundary
    ///
    /// A rect of width 595.2 at zoom 1.0 becomes 595 pixels wide. The small
    /// epsilon keeps exact integer edges stable against float error.
    pub fn round(&self) -> IRect {
        IRect {
            x0: (self.x0 + 0.001).round() as i32,
            y0: (self.y0 + 0.001).round() as i32,
            x1: (self.x1 - 0.001).round() as i32,
            y1: (self.y1 - 0.001).round() as i32,
        }
    }
}

/// An integer pixel rectangle
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct IRect {
    pub x0: i32,
    pub y0: i32,
    pub x1: i32,
    pub y1: i32,
}

impl IRect {
    pub fn width(&self) -> i32 {
        (self.x1 - self.x0).max(0)
    }

    pub fn height(&self) -> i32 {
        (self.y1 - self.y0).max(0)
    }

    pub fn is_empty(&self) -> bool {
        self.x1 <= self.x0 || self.y1 <= self.y0
    }
}

/// A quadrilateral described by its four corners
///
/// Unlike `Rect`, a quad is not axis-aligned, so it can describe the visual
/// extent of rotated or skewed text. Corners are upper-left, upper-right,
/// lower-left, lower-right.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct Quad {
    pub ul: Point,
    pub ur: Point,
    pub ll: Point,
    pub lr: Point,
}

impl Quad {
    /// Build an axis-aligned quad from a rect
    pub fn from_rect(r: &Rect) -> Self {
        Self {
            ul: Point::new(r.x0, r.y0),
            ur: Point::new(r.x1, r.y0),
            ll: Point::new(r.x0, r.y1),
            lr: Point::new(r.x1, r.y1),
        }
    }

    /// Axis-aligned bounding rect of the four corners
    pub fn bounds(&self) -> Rect {
        Rect {
            x0: self.ul.x.min(self.ur.x).min(self.ll.x).min(self.lr.x),
            y0: self.ul.y.min(self.ur.y).min(self.ll.y).min(self.lr.y),
            x1: self.ul.x.max(self.ur.x).max(self.ll.x).max(self.lr.x),
            y1: self.ul.y.max(self.ur.y).max(self.ll.y).max(self.lr.y),
        }
    }

    pub fn transform(&self, m: &Matrix) -> Quad {
        Quad {
            ul: m.transform_point(self.ul),
            ur: m.transform_point(self.ur),
            ll: m.transform_point(self.ll),
            lr: m.transform_point(self.lr),
        }
    }
}

/// A 2D affine transform
///
/// Maps `(x, y)` to `(a*x + c*y + e, b*x + d*y + f)`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Matrix {
    pub a: f32,
    pub b: f32,
    pub c: f32,
    pub d: f32,
    pub e: f32,
    pub f: f32,
}

impl Matrix {
    pub const IDENTITY: Matrix = Matrix { a: 1.0, b: 0.0, c: 0.0, d: 1.0, e: 0.0, f: 0.0 };

    pub fn scale(sx: f32, sy: f32) -> Self {
        Matrix { a: sx, b: 0.0, c: 0.0, d: sy, e: 0.0, f: 0.0 }
    }

    pub fn translate(tx: f32, ty: f32) -> Self {
        Matrix { a: 1.0, b: 0.0, c: 0.0, d: 1.0, e: tx, f: ty }
    }

    /// Compose two transforms: the result applies `self` first, then `other`
    pub fn concat(&self, other: &Matrix) -> Matrix {
        Matrix {
            a: self.a * other.a + self.b * other.c,
            b: self.a * other.b + self.b * other.d,
            c: self.c * other.a + self.d * other.c,
            d: self.c * other.b + self.d * other.d,
            e: self.e * other.a + self.f * other.c + other.e,
            f: self.e * other.b + self.f * other.d + other.f,
        }
    }

    pub fn transform_point(&self, p: Point) -> Point {
        Point {
            x: self.a * p.x + self.c * p.y + self.e,
            y: self.b * p.x + self.d * p.y + self.f,
        }
    }
}

impl Default for Matrix {
    fn default() -> Self {
        Matrix::IDENTITY
    }
}
