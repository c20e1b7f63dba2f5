use crate::blurring::domain::blur_algorithm::{render_iteration, AlgorithmKind, BlurPasses};
use crate::blurring::domain::blur_options::BlurParameters;
use crate::rendering::domain::framebuffer::{FramebufferPair, Slot};
use crate::rendering::domain::render_backend::{Direction, RenderBackend, RenderError, ShaderPass};

/// Separable box blur: each iteration is a horizontal then a vertical
/// 9-tap uniform pass, with taps `offset` pixels apart.
#[derive(Clone, Copy, Debug, Default)]
pub struct BoxBlur;

impl BoxBlur {
    pub fn new() -> Self {
        Self
    }
}

impl BlurPasses for BoxBlur {
    fn kind(&self) -> AlgorithmKind {
        AlgorithmKind::Box
    }

    fn run_passes(
        &self,
        backend: &mut dyn RenderBackend,
        buffers: &mut FramebufferPair,
        params: &BlurParameters,
        width: u32,
        height: u32,
    ) -> Result<bool, RenderError> {
        let offset = params.offset as f32;
        for _ in 0..params.iterations {
            let horizontal = ShaderPass::Box {
                offset,
                direction: Direction::Horizontal,
            };
            render_iteration(backend, buffers, Slot::Current, Slot::Other, &horizontal, width, height)?;

            let vertical = ShaderPass::Box {
                offset,
                direction: Direction::Vertical,
            };
            render_iteration(backend, buffers, Slot::Other, Slot::Current, &vertical, width, height)?;
        }
        Ok(false)
    }
}
