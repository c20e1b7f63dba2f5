use crate::blurring::domain::blur_algorithm::{AlgorithmKind, BlurPasses};
use crate::blurring::domain::blur_options::BlurParameters;
use crate::rendering::domain::framebuffer::FramebufferPair;
use crate::rendering::domain::render_backend::{RenderBackend, RenderError};
use crate::shared::constants::FALLBACK_ALGORITHM;

use super::bokeh_blur::BokehBlur;
use super::box_blur::BoxBlur;
use super::gaussian_blur::GaussianBlur;
use super::kawase_blur::KawaseBlur;

/// A blur algorithm chosen once per pipeline.
#[derive(Clone, Copy, Debug)]
pub enum BlurAlgorithm {
    Box(BoxBlur),
    Gaussian(GaussianBlur),
    Kawase(KawaseBlur),
    Bokeh(BokehBlur),
}

impl BlurAlgorithm {
    pub fn from_kind(kind: AlgorithmKind) -> Self {
        match kind {
            AlgorithmKind::Box => BlurAlgorithm::Box(BoxBlur::new()),
            AlgorithmKind::Gaussian => BlurAlgorithm::Gaussian(GaussianBlur::new()),
            AlgorithmKind::Kawase => BlurAlgorithm::Kawase(KawaseBlur::new()),
            AlgorithmKind::Bokeh => BlurAlgorithm::Bokeh(BokehBlur::new()),
        }
    }

    fn passes(&self) -> &dyn BlurPasses {
        match self {
            BlurAlgorithm::Box(a) => a,
            BlurAlgorithm::Gaussian(a) => a,
            BlurAlgorithm::Kawase(a) => a,
            BlurAlgorithm::Bokeh(a) => a,
        }
    }
}

impl BlurPasses for BlurAlgorithm {
    fn kind(&self) -> AlgorithmKind {
        self.passes().kind()
    }

    fn run_passes(
        &self,
        backend: &mut dyn RenderBackend,
        buffers: &mut FramebufferPair,
        params: &BlurParameters,
        width: u32,
        height: u32,
    ) -> Result<bool, RenderError> {
        self.passes()
            .run_passes(backend, buffers, params, width, height)
    }
}

/// Creates the algorithm called `name`.
///
/// Unknown names log one error and fall back to Kawase.
pub fn algorithm_for(name: &str) -> BlurAlgorithm {
    let kind = AlgorithmKind::from_name(name).unwrap_or_else(|| {
        log::error!("Unrecognized blur algorithm \"{name}\", using {FALLBACK_ALGORITHM} instead");
        AlgorithmKind::Kawase
    });
    BlurAlgorithm::from_kind(kind)
}
