use std::fmt;

use crate::rendering::domain::framebuffer::{FramebufferPair, Slot};
use crate::rendering::domain::render_backend::{RenderBackend, RenderError, ShaderPass};
use crate::rendering::domain::render_context::RenderContext;

use super::blur_options::BlurParameters;

/// The four blur variants.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum AlgorithmKind {
    Box,
    Gaussian,
    Kawase,
    Bokeh,
}

impl AlgorithmKind {
    pub const ALL: [AlgorithmKind; 4] = [
        AlgorithmKind::Box,
        AlgorithmKind::Gaussian,
        AlgorithmKind::Kawase,
        AlgorithmKind::Bokeh,
    ];

    pub fn name(self) -> &'static str {
        match self {
            AlgorithmKind::Box => "box",
            AlgorithmKind::Gaussian => "gaussian",
            AlgorithmKind::Kawase => "kawase",
            AlgorithmKind::Bokeh => "bokeh",
        }
    }

    pub fn from_name(name: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|kind| kind.name() == name)
    }

    /// Option values registered for a pipeline that finds none configured.
    pub fn default_parameters(self) -> BlurParameters {
        match self {
            AlgorithmKind::Box => BlurParameters::new(1.0, 1, 2),
            AlgorithmKind::Gaussian => BlurParameters::new(1.0, 1, 2),
            AlgorithmKind::Kawase => BlurParameters::new(2.0, 1, 2),
            AlgorithmKind::Bokeh => BlurParameters::new(5.0, 1, 15),
        }
    }
}

impl fmt::Display for AlgorithmKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Domain interface for a multi-pass blur.
///
/// On entry the captured image sits in `buffers.current()`. The first pass
/// samples all of it while rendering at `width x height`, which performs the
/// downsample. Implementations return `true` when the result ended up in
/// `buffers.other()`.
pub trait BlurPasses {
    fn kind(&self) -> AlgorithmKind;

    fn run_passes(
        &self,
        backend: &mut dyn RenderBackend,
        buffers: &mut FramebufferPair,
        params: &BlurParameters,
        width: u32,
        height: u32,
    ) -> Result<bool, RenderError>;
}

/// One pass from `from` into `to`: sizes `to` to `width x height`, binds it
/// and draws `pass` sampling the whole of `from`.
pub fn render_iteration(
    backend: &mut dyn RenderBackend,
    buffers: &mut FramebufferPair,
    from: Slot,
    to: Slot,
    pass: &ShaderPass,
    width: u32,
    height: u32,
) -> Result<(), RenderError> {
    // Too few pixels to blur; keep at least one.
    let width = width.max(1);
    let height = height.max(1);

    buffers.get_mut(to).allocate(backend, width, height)?;
    let src = buffers
        .get(from)
        .surface()
        .ok_or(RenderError::UnallocatedFramebuffer)?;

    let mut ctx = RenderContext::begin_on_framebuffer(backend, buffers.get(to))?;
    ctx.draw(pass, src)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::rendering::infrastructure::cpu_backend::{BackendOp, CpuBackend};

    #[test]
    fn test_names_round_trip() {
        for kind in AlgorithmKind::ALL {
            assert_eq!(AlgorithmKind::from_name(kind.name()), Some(kind));
        }
        assert_eq!(AlgorithmKind::from_name("foo"), None);
    }

    #[test]
    fn test_default_parameters() {
        assert_eq!(
            AlgorithmKind::Bokeh.default_parameters(),
            BlurParameters::new(5.0, 1, 15)
        );
        assert_eq!(
            AlgorithmKind::Kawase.default_parameters(),
            BlurParameters::new(2.0, 1, 2)
        );
    }

    #[test]
    fn test_render_iteration_allocates_and_draws() {
        let mut backend = CpuBackend::new();
        let mut buffers = FramebufferPair::new();
        buffers
            .get_mut(Slot::Current)
            .allocate(&mut backend, 8, 8)
            .unwrap();

        let pass = ShaderPass::KawaseDown { offset: 1.0 };
        render_iteration(&mut backend, &mut buffers, Slot::Current, Slot::Other, &pass, 0, 3)
            .unwrap();

        assert_eq!(buffers.other().size(), (1, 3));
        assert!(matches!(
            backend.operations().last(),
            Some(BackendOp::Draw { width: 1, height: 3, .. })
        ));
        assert_eq!(backend.binding().target, None);
    }

    #[test]
    fn test_render_iteration_from_unallocated_fails() {
        let mut backend = CpuBackend::new();
        let mut buffers = FramebufferPair::new();
        let pass = ShaderPass::KawaseDown { offset: 1.0 };
        let result =
            render_iteration(&mut backend, &mut buffers, Slot::Current, Slot::Other, &pass, 4, 4);
        assert!(matches!(result, Err(RenderError::UnallocatedFramebuffer)));
    }
}
