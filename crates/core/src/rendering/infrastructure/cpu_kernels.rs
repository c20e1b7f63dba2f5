use ndarray::ArrayView3;

use crate::rendering::domain::render_backend::ShaderPass;
use crate::shared::constants::{
    BOKEH_HIGHLIGHT_GAIN, BOKEH_MIN_SAMPLE_PAIRS, BOX_KERNEL_HALF_TAPS, GOLDEN_ANGLE,
};

/// Normalized premultiplied color.
pub type Rgba = [f32; 4];

/// Precompute a 1D Gaussian kernel of the given size.
///
/// `kernel_size` must be odd and >= 1. Sigma is derived as `kernel_size / 6.0`
/// (matching OpenCV's sigma=0 convention). The WGSL passes compute the same
/// weights in-shader.
pub fn gaussian_kernel_1d(kernel_size: usize) -> Vec<f32> {
    debug_assert!(kernel_size >= 1 && kernel_size % 2 == 1);
    let sigma = kernel_size as f64 / 6.0;
    let half = (kernel_size / 2) as f64;
    let mut kernel_f64: Vec<f64> = (0..kernel_size)
        .map(|i| {
            let x = i as f64 - half;
            (-x * x / (2.0 * sigma * sigma)).exp()
        })
        .collect();
    let sum: f64 = kernel_f64.iter().sum();
    for v in &mut kernel_f64 {
        *v /= sum;
    }
    kernel_f64.iter().map(|&v| v as f32).collect()
}

/// Texel fetch with clamp-to-edge addressing.
pub fn fetch(src: &ArrayView3<'_, u8>, x: i32, y: i32) -> Rgba {
    let (h, w, _) = src.dim();
    let x = x.clamp(0, w as i32 - 1) as usize;
    let y = y.clamp(0, h as i32 - 1) as usize;
    [
        src[[y, x, 0]] as f32 / 255.0,
        src[[y, x, 1]] as f32 / 255.0,
        src[[y, x, 2]] as f32 / 255.0,
        src[[y, x, 3]] as f32 / 255.0,
    ]
}

/// Bilinear sample at normalized coordinates, texel centers at `(i + 0.5) / size`.
pub fn sample_bilinear(src: &ArrayView3<'_, u8>, u: f32, v: f32) -> Rgba {
    let (h, w, _) = src.dim();
    let px = u * w as f32 - 0.5;
    let py = v * h as f32 - 0.5;
    let x0 = px.floor();
    let y0 = py.floor();
    let fx = px - x0;
    let fy = py - y0;
    let (x0, y0) = (x0 as i32, y0 as i32);

    let a = fetch(src, x0, y0);
    let b = fetch(src, x0 + 1, y0);
    let c = fetch(src, x0, y0 + 1);
    let d = fetch(src, x0 + 1, y0 + 1);
    let top = mix(a, b, fx);
    let bottom = mix(c, d, fx);
    mix(top, bottom, fy)
}

pub fn to_bytes(c: Rgba) -> [u8; 4] {
    c.map(|v| (v * 255.0).round().clamp(0.0, 255.0) as u8)
}

/// `window + (1 - window.a) * backdrop` on premultiplied colors.
pub fn blend_over(window: Rgba, backdrop: Rgba) -> Rgba {
    let k = 1.0 - window[3];
    [
        window[0] + k * backdrop[0],
        window[1] + k * backdrop[1],
        window[2] + k * backdrop[2],
        window[3] + k * backdrop[3],
    ]
}

/// A [`ShaderPass`] with its per-draw constants resolved.
pub struct PreparedPass {
    pass: ShaderPass,
    weights: Vec<f32>,
}

impl PreparedPass {
    pub fn new(pass: ShaderPass) -> Self {
        let weights = match pass {
            ShaderPass::Gaussian { radius, .. } => gaussian_kernel_1d(2 * radius.max(1) as usize + 1),
            _ => Vec::new(),
        };
        Self { pass, weights }
    }

    /// Shades one destination pixel at `uv`. `step` is the size of one
    /// destination pixel in UV units.
    pub fn shade(&self, src: &ArrayView3<'_, u8>, uv: (f32, f32), step: (f32, f32)) -> Rgba {
        let sample = |du: f32, dv: f32| sample_bilinear(src, uv.0 + du, uv.1 + dv);
        match self.pass {
            ShaderPass::Box { offset, direction } => {
                let (dx, dy) = direction.unit();
                let mut acc = [0.0; 4];
                for i in -BOX_KERNEL_HALF_TAPS..=BOX_KERNEL_HALF_TAPS {
                    let t = i as f32 * offset;
                    add_scaled(&mut acc, sample(dx * t * step.0, dy * t * step.1), 1.0);
                }
                scale(acc, 1.0 / (2 * BOX_KERNEL_HALF_TAPS + 1) as f32)
            }
            ShaderPass::Gaussian { direction, .. } => {
                let (dx, dy) = direction.unit();
                let half = (self.weights.len() / 2) as i32;
                let mut acc = [0.0; 4];
                for (k, &w) in self.weights.iter().enumerate() {
                    let t = (k as i32 - half) as f32;
                    add_scaled(&mut acc, sample(dx * t * step.0, dy * t * step.1), w);
                }
                acc
            }
            ShaderPass::KawaseDown { offset } => {
                let hx = 0.5 * offset * step.0;
                let hy = 0.5 * offset * step.1;
                let mut acc = scale(sample(0.0, 0.0), 4.0);
                add_scaled(&mut acc, sample(-hx, -hy), 1.0);
                add_scaled(&mut acc, sample(hx, hy), 1.0);
                add_scaled(&mut acc, sample(hx, -hy), 1.0);
                add_scaled(&mut acc, sample(-hx, hy), 1.0);
                scale(acc, 1.0 / 8.0)
            }
            ShaderPass::KawaseUp { offset } => {
                let hx = 0.5 * offset * step.0;
                let hy = 0.5 * offset * step.1;
                let mut acc = [0.0; 4];
                add_scaled(&mut acc, sample(-2.0 * hx, 0.0), 1.0);
                add_scaled(&mut acc, sample(-hx, hy), 2.0);
                add_scaled(&mut acc, sample(0.0, 2.0 * hy), 1.0);
                add_scaled(&mut acc, sample(hx, hy), 2.0);
                add_scaled(&mut acc, sample(2.0 * hx, 0.0), 1.0);
                add_scaled(&mut acc, sample(hx, -hy), 2.0);
                add_scaled(&mut acc, sample(0.0, -2.0 * hy), 1.0);
                add_scaled(&mut acc, sample(-hx, -hy), 2.0);
                scale(acc, 1.0 / 12.0)
            }
            ShaderPass::Bokeh { offset, samples } => {
                let pairs = bokeh_sample_pairs(samples);
                let mut acc = [0.0; 4];
                let mut total = 0.0;
                for i in 0..pairs {
                    let theta = i as f32 * GOLDEN_ANGLE;
                    let r = offset * ((i as f32 + 0.5) / pairs as f32).sqrt();
                    let (dx, dy) = (theta.cos() * r * step.0, theta.sin() * r * step.1);
                    for c in [sample(dx, dy), sample(-dx, -dy)] {
                        let w = 1.0 + BOKEH_HIGHLIGHT_GAIN * luma(c).powi(4);
                        add_scaled(&mut acc, c, w);
                        total += w;
                    }
                }
                scale(acc, 1.0 / total)
            }
        }
    }
}

/// Spiral positions for a bokeh pass of `samples` taps; each is also
/// mirrored through the center so the disc stays centred.
pub fn bokeh_sample_pairs(samples: u32) -> u32 {
    samples.div_ceil(2).max(BOKEH_MIN_SAMPLE_PAIRS)
}

fn luma(c: Rgba) -> f32 {
    0.2126 * c[0] + 0.7152 * c[1] + 0.0722 * c[2]
}

fn mix(a: Rgba, b: Rgba, t: f32) -> Rgba {
    [
        a[0] + (b[0] - a[0]) * t,
        a[1] + (b[1] - a[1]) * t,
        a[2] + (b[2] - a[2]) * t,
        a[3] + (b[3] - a[3]) * t,
    ]
}

fn add_scaled(acc: &mut Rgba, c: Rgba, w: f32) {
    for (a, v) in acc.iter_mut().zip(c) {
        *a += v * w;
    }
}

fn scale(c: Rgba, k: f32) -> Rgba {
    c.map(|v| v * k)
}
