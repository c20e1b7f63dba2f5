use std::ops::{Add, Sub};

use serde::{Deserialize, Serialize};

/// Integer point. Which coordinate space it lives in is up to the caller.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Point {
    pub x: i32,
    pub y: i32,
}

impl Point {
    pub const fn new(x: i32, y: i32) -> Self {
        Self { x, y }
    }
}

/// Axis-aligned integer rectangle.
///
/// A `Geometry` is implicitly tagged by the space it was produced in
/// (logical, target-pixel or view-local). Convert through
/// [`TargetLayout`](crate::rendering::domain::coordinate_mapper::TargetLayout)
/// before comparing boxes from different spaces.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Geometry {
    pub x: i32,
    pub y: i32,
    pub width: i32,
    pub height: i32,
}

impl Geometry {
    pub const fn new(x: i32, y: i32, width: i32, height: i32) -> Self {
        Self {
            x,
            y,
            width,
            height,
        }
    }

    /// Builds a box from its edges. Inverted edges produce an empty box.
    pub fn from_edges(x1: i32, y1: i32, x2: i32, y2: i32) -> Self {
        Self {
            x: x1,
            y: y1,
            width: (x2 - x1).max(0),
            height: (y2 - y1).max(0),
        }
    }

    pub fn right(&self) -> i32 {
        self.x + self.width
    }

    pub fn bottom(&self) -> i32 {
        self.y + self.height
    }

    pub fn origin(&self) -> Point {
        Point::new(self.x, self.y)
    }

    pub fn is_empty(&self) -> bool {
        self.width <= 0 || self.height <= 0
    }

    pub fn area(&self) -> i64 {
        if self.is_empty() {
            0
        } else {
            self.width as i64 * self.height as i64
        }
    }

    pub fn contains_point(&self, point: Point) -> bool {
        point.x >= self.x && point.x < self.right() && point.y >= self.y && point.y < self.bottom()
    }

    /// Overlap of two boxes, or `None` when they do not share any pixel.
    pub fn intersection(&self, other: &Geometry) -> Option<Geometry> {
        let x1 = self.x.max(other.x);
        let y1 = self.y.max(other.y);
        let x2 = self.right().min(other.right());
        let y2 = self.bottom().min(other.bottom());
        if x2 <= x1 || y2 <= y1 {
            return None;
        }
        Some(Geometry::from_edges(x1, y1, x2, y2))
    }

    /// Same origin, with width and height clamped to at least `min`.
    pub fn with_min_size(&self, min: i32) -> Geometry {
        Geometry {
            width: self.width.max(min),
            height: self.height.max(min),
            ..*self
        }
    }
}

impl Add<Point> for Geometry {
    type Output = Geometry;

    fn add(self, offset: Point) -> Geometry {
        Geometry {
            x: self.x + offset.x,
            y: self.y + offset.y,
            ..self
        }
    }
}

impl Sub<Point> for Geometry {
    type Output = Geometry;

    fn sub(self, offset: Point) -> Geometry {
        Geometry {
            x: self.x - offset.x,
            y: self.y - offset.y,
            ..self
        }
    }
}
