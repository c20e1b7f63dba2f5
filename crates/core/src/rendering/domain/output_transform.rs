use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// How an output's pixel buffer is oriented relative to its logical layout.
///
/// Rotations are counter-clockwise; the flipped variants mirror around the
/// vertical axis before rotating, matching `wl_output_transform`.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum OutputTransform {
    #[default]
    Normal,
    Rotate90,
    Rotate180,
    Rotate270,
    Flipped,
    Flipped90,
    Flipped180,
    Flipped270,
}

impl OutputTransform {
    pub const ALL: &[OutputTransform] = &[
        OutputTransform::Normal,
        OutputTransform::Rotate90,
        OutputTransform::Rotate180,
        OutputTransform::Rotate270,
        OutputTransform::Flipped,
        OutputTransform::Flipped90,
        OutputTransform::Flipped180,
        OutputTransform::Flipped270,
    ];

    /// True for transforms that swap width and height.
    pub fn swaps_axes(self) -> bool {
        matches!(
            self,
            OutputTransform::Rotate90
                | OutputTransform::Rotate270
                | OutputTransform::Flipped90
                | OutputTransform::Flipped270
        )
    }

    pub fn inverse(self) -> OutputTransform {
        match self {
            OutputTransform::Rotate90 => OutputTransform::Rotate270,
            OutputTransform::Rotate270 => OutputTransform::Rotate90,
            other => other,
        }
    }

    /// Size of a `width x height` area after the transform.
    pub fn transformed_size(self, width: f64, height: f64) -> (f64, f64) {
        if self.swaps_axes() {
            (height, width)
        } else {
            (width, height)
        }
    }

    /// Maps a point of a `width x height` area into the transformed area.
    pub fn apply_point(self, x: f64, y: f64, width: f64, height: f64) -> (f64, f64) {
        match self {
            OutputTransform::Normal => (x, y),
            OutputTransform::Rotate90 => (height - y, x),
            OutputTransform::Rotate180 => (width - x, height - y),
            OutputTransform::Rotate270 => (y, width - x),
            OutputTransform::Flipped => (width - x, y),
            OutputTransform::Flipped90 => (y, x),
            OutputTransform::Flipped180 => (x, height - y),
            OutputTransform::Flipped270 => (height - y, width - x),
        }
    }

    /// Linear part of the transform on UV coordinates centered at 0.5,
    /// row-major `[[a, b], [c, d]]` so that `u' = a*u + b*v`, `v' = c*u + d*v`.
    pub fn matrix(self) -> [[f32; 2]; 2] {
        match self {
            OutputTransform::Normal => [[1.0, 0.0], [0.0, 1.0]],
            OutputTransform::Rotate90 => [[0.0, -1.0], [1.0, 0.0]],
            OutputTransform::Rotate180 => [[-1.0, 0.0], [0.0, -1.0]],
            OutputTransform::Rotate270 => [[0.0, 1.0], [-1.0, 0.0]],
            OutputTransform::Flipped => [[-1.0, 0.0], [0.0, 1.0]],
            OutputTransform::Flipped90 => [[0.0, 1.0], [1.0, 0.0]],
            OutputTransform::Flipped180 => [[1.0, 0.0], [0.0, -1.0]],
            OutputTransform::Flipped270 => [[0.0, -1.0], [-1.0, 0.0]],
        }
    }

    fn name(self) -> &'static str {
        match self {
            OutputTransform::Normal => "normal",
            OutputTransform::Rotate90 => "90",
            OutputTransform::Rotate180 => "180",
            OutputTransform::Rotate270 => "270",
            OutputTransform::Flipped => "flipped",
            OutputTransform::Flipped90 => "flipped-90",
            OutputTransform::Flipped180 => "flipped-180",
            OutputTransform::Flipped270 => "flipped-270",
        }
    }
}

impl fmt::Display for OutputTransform {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for OutputTransform {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        OutputTransform::ALL
            .iter()
            .copied()
            .find(|t| t.name() == s)
            .ok_or_else(|| format!("unknown output transform '{s}'"))
    }
}
