use std::ops::{BitAnd, BitOr, Sub};

use super::geometry::{Geometry, Point};

/// A set of screen pixels stored as non-overlapping rectangles.
///
/// Rectangles are kept in canonical y-x banded form: the region is cut into
/// horizontal bands, each band holds maximal disjoint spans sorted by x, and
/// vertically adjacent bands with identical spans are coalesced. Two regions
/// covering the same pixels therefore always compare equal.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Region {
    rects: Vec<Geometry>,
}

impl Region {
    pub fn new() -> Self {
        Self { rects: Vec::new() }
    }

    pub fn from_rects<I: IntoIterator<Item = Geometry>>(rects: I) -> Self {
        let raw: Vec<Geometry> = rects.into_iter().filter(|r| !r.is_empty()).collect();
        Self {
            rects: combine(&raw, &[], |a, _| a),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.rects.is_empty()
    }

    pub fn clear(&mut self) {
        self.rects.clear();
    }

    pub fn rects(&self) -> &[Geometry] {
        &self.rects
    }

    pub fn iter(&self) -> std::slice::Iter<'_, Geometry> {
        self.rects.iter()
    }

    /// Number of pixels covered.
    pub fn area(&self) -> i64 {
        self.rects.iter().map(Geometry::area).sum()
    }

    /// Bounding box of the region; an all-zero box when empty.
    pub fn extents(&self) -> Geometry {
        let mut iter = self.rects.iter();
        let Some(first) = iter.next() else {
            return Geometry::default();
        };
        let (mut x1, mut y1, mut x2, mut y2) = (first.x, first.y, first.right(), first.bottom());
        for r in iter {
            x1 = x1.min(r.x);
            y1 = y1.min(r.y);
            x2 = x2.max(r.right());
            y2 = y2.max(r.bottom());
        }
        Geometry::from_edges(x1, y1, x2, y2)
    }

    pub fn contains_point(&self, point: Point) -> bool {
        self.rects.iter().any(|r| r.contains_point(point))
    }

    pub fn contains_pointf(&self, x: f64, y: f64) -> bool {
        self.rects.iter().any(|r| {
            x >= r.x as f64 && x < r.right() as f64 && y >= r.y as f64 && y < r.bottom() as f64
        })
    }

    pub fn union(&self, other: &Region) -> Region {
        Region {
            rects: combine(&self.rects, &other.rects, |a, b| a || b),
        }
    }

    pub fn union_box(&self, rect: Geometry) -> Region {
        self.union(&Region::from(rect))
    }

    pub fn intersect(&self, other: &Region) -> Region {
        Region {
            rects: combine(&self.rects, &other.rects, |a, b| a && b),
        }
    }

    pub fn intersect_box(&self, rect: Geometry) -> Region {
        self.intersect(&Region::from(rect))
    }

    pub fn subtract(&self, other: &Region) -> Region {
        Region {
            rects: combine(&self.rects, &other.rects, |a, b| a && !b),
        }
    }

    pub fn subtract_box(&self, rect: Geometry) -> Region {
        self.subtract(&Region::from(rect))
    }

    pub fn translate(&self, dx: i32, dy: i32) -> Region {
        Region {
            rects: self
                .rects
                .iter()
                .map(|r| *r + Point::new(dx, dy))
                .collect(),
        }
    }

    /// Scales every rectangle, rounding outward: left/top edges use `floor`,
    /// right/bottom edges use `ceil`. The scaled region always covers the
    /// exact scaled area, so repeated scale passes never open seams between
    /// neighbouring rectangles. Non-positive factors yield an empty region.
    pub fn scale(&self, factor: f64) -> Region {
        if factor <= 0.0 || !factor.is_finite() {
            return Region::new();
        }
        Region::from_rects(self.rects.iter().map(|r| {
            Geometry::from_edges(
                floor_edge(r.x as f64 * factor),
                floor_edge(r.y as f64 * factor),
                ceil_edge(r.right() as f64 * factor),
                ceil_edge(r.bottom() as f64 * factor),
            )
        }))
    }

    /// Grows every rectangle by `amount` on all four sides. Negative amounts
    /// shrink rectangles; those that collapse disappear.
    pub fn expand_edges(&self, amount: i32) -> Region {
        Region::from_rects(self.rects.iter().map(|r| {
            Geometry::from_edges(
                r.x - amount,
                r.y - amount,
                r.right() + amount,
                r.bottom() + amount,
            )
        }))
    }
}

/// `floor` that tolerates float noise just under an integer (e.g. 2.9999999).
pub(crate) fn floor_edge(value: f64) -> i32 {
    (value + 1e-9).floor() as i32
}

/// `ceil` that tolerates float noise just over an integer (e.g. 3.0000001).
pub(crate) fn ceil_edge(value: f64) -> i32 {
    (value - 1e-9).ceil() as i32
}

impl From<Geometry> for Region {
    fn from(rect: Geometry) -> Self {
        if rect.is_empty() {
            Region::new()
        } else {
            Region { rects: vec![rect] }
        }
    }
}

impl FromIterator<Geometry> for Region {
    fn from_iter<I: IntoIterator<Item = Geometry>>(iter: I) -> Self {
        Region::from_rects(iter)
    }
}

impl<'a> IntoIterator for &'a Region {
    type Item = &'a Geometry;
    type IntoIter = std::slice::Iter<'a, Geometry>;

    fn into_iter(self) -> Self::IntoIter {
        self.rects.iter()
    }
}

impl BitOr<&Region> for &Region {
    type Output = Region;

    fn bitor(self, rhs: &Region) -> Region {
        self.union(rhs)
    }
}

impl BitAnd<&Region> for &Region {
    type Output = Region;

    fn bitand(self, rhs: &Region) -> Region {
        self.intersect(rhs)
    }
}

impl Sub<&Region> for &Region {
    type Output = Region;

    fn sub(self, rhs: &Region) -> Region {
        self.subtract(rhs)
    }
}

/// Sweeps both rectangle sets band by band and keeps every elementary cell
/// for which `keep(in_a, in_b)` holds. The result is canonical.
fn combine(a: &[Geometry], b: &[Geometry], keep: fn(bool, bool) -> bool) -> Vec<Geometry> {
    let mut ys: Vec<i32> = a
        .iter()
        .chain(b)
        .flat_map(|r| [r.y, r.bottom()])
        .collect();
    ys.sort_unstable();
    ys.dedup();

    // (y1, y2, spans) with spans sorted and merged
    let mut bands: Vec<(i32, i32, Vec<(i32, i32)>)> = Vec::new();

    for w in ys.windows(2) {
        let (y1, y2) = (w[0], w[1]);
        let spans_a = spans_covering(a, y1, y2);
        let spans_b = spans_covering(b, y1, y2);

        let mut xs: Vec<i32> = spans_a
            .iter()
            .chain(&spans_b)
            .flat_map(|&(l, r)| [l, r])
            .collect();
        xs.sort_unstable();
        xs.dedup();

        let mut spans: Vec<(i32, i32)> = Vec::new();
        for xw in xs.windows(2) {
            let (x1, x2) = (xw[0], xw[1]);
            let in_a = spans_a.iter().any(|&(l, r)| l <= x1 && x2 <= r);
            let in_b = spans_b.iter().any(|&(l, r)| l <= x1 && x2 <= r);
            if !keep(in_a, in_b) {
                continue;
            }
            if let Some(last) = spans.last_mut() {
                if last.1 == x1 {
                    last.1 = x2;
                    continue;
                }
            }
            spans.push((x1, x2));
        }

        if spans.is_empty() {
            continue;
        }
        if let Some(last) = bands.last_mut() {
            if last.1 == y1 && last.2 == spans {
                last.1 = y2;
                continue;
            }
        }
        bands.push((y1, y2, spans));
    }

    bands
        .into_iter()
        .flat_map(|(y1, y2, spans)| {
            spans
                .into_iter()
                .map(move |(x1, x2)| Geometry::from_edges(x1, y1, x2, y2))
        })
        .collect()
}

fn spans_covering(rects: &[Geometry], y1: i32, y2: i32) -> Vec<(i32, i32)> {
    rects
        .iter()
        .filter(|r| !r.is_empty() && r.y <= y1 && r.bottom() >= y2)
        .map(|r| (r.x, r.right()))
        .collect()
}
