use crate::blurring::domain::blur_algorithm::{render_iteration, AlgorithmKind, BlurPasses};
use crate::blurring::domain::blur_options::BlurParameters;
use crate::rendering::domain::framebuffer::{FramebufferPair, Slot};
use crate::rendering::domain::render_backend::{Direction, RenderBackend, RenderError, ShaderPass};

/// Separable Gaussian blur, one horizontal and one vertical pass per
/// iteration.
///
/// The kernel radius follows `offset`: `r = max(1, round(3 * offset))`, with
/// sigma derived from the kernel size (`(2r + 1) / 6`).
#[derive(Clone, Copy, Debug, Default)]
pub struct GaussianBlur;

impl GaussianBlur {
    pub fn new() -> Self {
        Self
    }

    pub fn kernel_radius(offset: f64) -> u32 {
        ((3.0 * offset).round() as u32).max(1)
    }
}

impl BlurPasses for GaussianBlur {
    fn kind(&self) -> AlgorithmKind {
        AlgorithmKind::Gaussian
    }

    fn run_passes(
        &self,
        backend: &mut dyn RenderBackend,
        buffers: &mut FramebufferPair,
        params: &BlurParameters,
        width: u32,
        height: u32,
    ) -> Result<bool, RenderError> {
        let radius = Self::kernel_radius(params.offset);
        for _ in 0..params.iterations {
            let horizontal = ShaderPass::Gaussian {
                radius,
                direction: Direction::Horizontal,
            };
            render_iteration(backend, buffers, Slot::Current, Slot::Other, &horizontal, width, height)?;

            let vertical = ShaderPass::Gaussian {
                radius,
                direction: Direction::Vertical,
            };
            render_iteration(backend, buffers, Slot::Other, Slot::Current, &vertical, width, height)?;
        }
        Ok(false)
    }
}
