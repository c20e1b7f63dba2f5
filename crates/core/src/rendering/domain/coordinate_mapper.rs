use serde::{Deserialize, Serialize};

use crate::shared::geometry::{Geometry, Point};
use crate::shared::region::{ceil_edge, floor_edge};

use super::output_transform::OutputTransform;

/// Placement of a render target in the compositor's logical layout.
///
/// Converts boxes between three spaces:
///
/// - **logical**: layout coordinates shared by all outputs and windows,
/// - **target-pixel**: the target's pixel buffer after scale and transform,
/// - **view-local**: target-pixel coordinates relative to one window's box
///   (see [`to_view_local`]).
///
/// Logical → pixel rounds outward (origin `floor`, far edge `ceil`); pixel →
/// logical rounds inward (origin `ceil`, far edge `floor`). For scales ≥ 1
/// the round trip reproduces every integer logical box exactly, for all
/// eight transforms.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct TargetLayout {
    geometry: Geometry,
    scale: f64,
    transform: OutputTransform,
}

impl TargetLayout {
    pub fn new(geometry: Geometry, scale: f64, transform: OutputTransform) -> Self {
        let scale = if scale > 0.0 && scale.is_finite() {
            scale
        } else {
            log::warn!("Invalid output scale {scale}, using 1.0");
            1.0
        };
        Self {
            geometry,
            scale,
            transform,
        }
    }

    pub fn geometry(&self) -> Geometry {
        self.geometry
    }

    pub fn scale(&self) -> f64 {
        self.scale
    }

    pub fn transform(&self) -> OutputTransform {
        self.transform
    }

    /// Dimensions of the target's pixel buffer.
    pub fn pixel_size(&self) -> (u32, u32) {
        let (w, h) = self.scaled_size();
        let (w, h) = self.transform.transformed_size(w, h);
        (
            (w.round() as u32).max(1),
            (h.round() as u32).max(1),
        )
    }

    pub fn pixel_bounds(&self) -> Geometry {
        let (w, h) = self.pixel_size();
        Geometry::new(0, 0, w as i32, h as i32)
    }

    pub fn to_target_pixel(&self, logical: Geometry) -> Geometry {
        let rel = logical - self.geometry.origin();
        let (w, h) = self.scaled_size();
        let corners = corners(
            rel.x as f64 * self.scale,
            rel.y as f64 * self.scale,
            rel.right() as f64 * self.scale,
            rel.bottom() as f64 * self.scale,
        )
        .map(|(x, y)| self.transform.apply_point(x, y, w, h));

        let (x1, y1, x2, y2) = bounds(&corners);
        Geometry::from_edges(floor_edge(x1), floor_edge(y1), ceil_edge(x2), ceil_edge(y2))
    }

    pub fn to_logical(&self, pixel: Geometry) -> Geometry {
        let (w, h) = self.scaled_size();
        let (tw, th) = self.transform.transformed_size(w, h);
        let inverse = self.transform.inverse();
        let corners = corners(
            pixel.x as f64,
            pixel.y as f64,
            pixel.right() as f64,
            pixel.bottom() as f64,
        )
        .map(|(x, y)| inverse.apply_point(x, y, tw, th));

        let (x1, y1, x2, y2) = bounds(&corners);
        let rel = Geometry::from_edges(
            ceil_edge(x1 / self.scale),
            ceil_edge(y1 / self.scale),
            floor_edge(x2 / self.scale),
            floor_edge(y2 / self.scale),
        );
        rel + self.geometry.origin()
    }

    /// Target-pixel box of a damage extents box, clipped to the buffer.
    /// Returns an empty box when the damage lies outside the target.
    pub fn damage_to_target_pixel(&self, damage_extents: Geometry) -> Geometry {
        self.to_target_pixel(damage_extents)
            .intersection(&self.pixel_bounds())
            .unwrap_or_default()
    }

    fn scaled_size(&self) -> (f64, f64) {
        (
            self.geometry.width as f64 * self.scale,
            self.geometry.height as f64 * self.scale,
        )
    }
}

/// Expresses a target-pixel box relative to a view's target-pixel origin.
pub fn to_view_local(pixel: Geometry, view: Geometry) -> Geometry {
    pixel - Point::new(view.x, view.y)
}

fn corners(x1: f64, y1: f64, x2: f64, y2: f64) -> [(f64, f64); 4] {
    [(x1, y1), (x2, y1), (x1, y2), (x2, y2)]
}

fn bounds(points: &[(f64, f64); 4]) -> (f64, f64, f64, f64) {
    points.iter().fold(
        (f64::MAX, f64::MAX, f64::MIN, f64::MIN),
        |(x1, y1, x2, y2), &(x, y)| (x1.min(x), y1.min(y), x2.max(x), y2.max(y)),
    )
}
