/// Algorithm used when a configured name is not recognized.
pub const FALLBACK_ALGORITHM: &str = "kawase";

/// Suffixes of the per-algorithm option keys (`<algo>_offset`, ...).
pub const OFFSET_SUFFIX: &str = "offset";
pub const DEGRADE_SUFFIX: &str = "degrade";
pub const ITERATIONS_SUFFIX: &str = "iterations";

/// Smallest framebuffer edge; zero-sized targets are clamped to this.
pub const MIN_FRAMEBUFFER_EDGE: u32 = 1;

/// Taps on each side of the center for the box kernel.
pub const BOX_KERNEL_HALF_TAPS: i32 = 4;

/// Golden angle in radians, used to place bokeh samples on a spiral.
pub const GOLDEN_ANGLE: f32 = 2.399_963;

/// Highlight boost applied to bright bokeh samples.
pub const BOKEH_HIGHLIGHT_GAIN: f32 = 16.0;

/// Bokeh samples come in opposite pairs; at least this many pairs are taken.
pub const BOKEH_MIN_SAMPLE_PAIRS: u32 = 4;

pub const IMAGE_EXTENSIONS: &[&str] = &["png", "jpg", "jpeg", "bmp", "tiff", "tif", "webp"];
