use crate::blurring::domain::blur_algorithm::{render_iteration, AlgorithmKind, BlurPasses};
use crate::blurring::domain::blur_options::BlurParameters;
use crate::rendering::domain::framebuffer::{FramebufferPair, Slot};
use crate::rendering::domain::render_backend::{RenderBackend, RenderError, ShaderPass};

/// Single-pass bokeh blur.
///
/// Samples a golden-angle spiral over a disc of radius `offset`, with
/// `iterations` samples taken in opposite pairs (at least eight), weighting
/// bright samples up so highlights bloom into discs. Always renders exactly
/// one pass, so the result ends in the alternate buffer.
#[derive(Clone, Copy, Debug, Default)]
pub struct BokehBlur;

impl BokehBlur {
    pub fn new() -> Self {
        Self
    }
}

impl BlurPasses for BokehBlur {
    fn kind(&self) -> AlgorithmKind {
        AlgorithmKind::Bokeh
    }

    fn run_passes(
        &self,
        backend: &mut dyn RenderBackend,
        buffers: &mut FramebufferPair,
        params: &BlurParameters,
        width: u32,
        height: u32,
    ) -> Result<bool, RenderError> {
        let pass = ShaderPass::Bokeh {
            offset: params.offset as f32,
            samples: params.iterations,
        };
        render_iteration(backend, buffers, Slot::Current, Slot::Other, &pass, width, height)?;
        Ok(true)
    }
}
