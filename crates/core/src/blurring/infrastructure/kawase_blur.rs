use crate::blurring::domain::blur_algorithm::{render_iteration, AlgorithmKind, BlurPasses};
use crate::blurring::domain::blur_options::BlurParameters;
use crate::rendering::domain::framebuffer::{FramebufferPair, Slot};
use crate::rendering::domain::render_backend::{RenderBackend, RenderError, ShaderPass};

/// Dual-filter Kawase blur.
///
/// Runs `iterations` downsample passes, halving the size each time
/// (`width >> i`), then the same number of upsample passes back to
/// `width x height`. Each pass ping-pongs, so an even pass count leaves the
/// result in the working buffer.
#[derive(Clone, Copy, Debug, Default)]
pub struct KawaseBlur;

impl KawaseBlur {
    pub fn new() -> Self {
        Self
    }
}

fn level_size(width: u32, height: u32, level: u32) -> (u32, u32) {
    let shift = level.min(31);
    ((width >> shift).max(1), (height >> shift).max(1))
}

impl BlurPasses for KawaseBlur {
    fn kind(&self) -> AlgorithmKind {
        AlgorithmKind::Kawase
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
        let iterations = params.iterations;

        let down = ShaderPass::KawaseDown { offset };
        for i in 0..iterations {
            let (w, h) = level_size(width, height, i);
            let from = Slot::for_parity(i);
            render_iteration(backend, buffers, from, from.flipped(), &down, w, h)?;
        }

        let up = ShaderPass::KawaseUp { offset };
        for i in (0..iterations).rev() {
            let (w, h) = level_size(width, height, i);
            let to = Slot::for_parity(i);
            render_iteration(backend, buffers, to.flipped(), to, &up, w, h)?;
        }

        Ok(false)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::rendering::infrastructure::cpu_backend::{BackendOp, CpuBackend};
    use crate::shared::pixel_buffer::PixelBuffer;

    fn draws(backend: &CpuBackend) -> Vec<(&'static str, u32, u32)> {
        backend
            .operations()
            .iter()
            .filter_map(|op| match op {
                BackendOp::Draw {
                    pass,
                    width,
                    height,
                    ..
                } => Some((*pass, *width, *height)),
                _ => None,
            })
            .collect()
    }

    fn captured(backend: &mut CpuBackend, size: u32) -> FramebufferPair {
        let mut buffers = FramebufferPair::new();
        buffers
            .get_mut(Slot::Current)
            .allocate(backend, size, size)
            .unwrap();
        buffers
    }

    #[test]
    fn test_down_then_up_levels() {
        let mut backend = CpuBackend::new();
        let mut buffers = captured(&mut backend, 200);
        let params = BlurParameters::new(2.0, 4, 2);
        let swapped = KawaseBlur::new()
            .run_passes(&mut backend, &mut buffers, &params, 50, 50)
            .unwrap();

        assert!(!swapped);
        assert_eq!(
            draws(&backend),
            vec![
                ("kawase-down", 50, 50),
                ("kawase-down", 25, 25),
                ("kawase-up", 25, 25),
                ("kawase-up", 50, 50),
            ]
        );
        assert_eq!(buffers.current().size(), (50, 50));
    }

    #[test]
    fn test_levels_never_reach_zero() {
        assert_eq!(level_size(3, 2, 4), (1, 1));
        assert_eq!(level_size(3, 2, 40), (1, 1));
    }

    #[test]
    fn test_uniform_image_is_preserved() {
        let mut backend = CpuBackend::new();
        let mut buffers = captured(&mut backend, 32);
        let surface = buffers.current().surface().unwrap();
        backend
            .upload(surface, &PixelBuffer::filled(32, 32, [40, 80, 120, 255]))
            .unwrap();

        let params = BlurParameters::new(2.0, 1, 3);
        KawaseBlur::new()
            .run_passes(&mut backend, &mut buffers, &params, 32, 32)
            .unwrap();

        let out = backend
            .read_pixels(buffers.current().surface().unwrap())
            .unwrap();
        assert_eq!(out.pixel(0, 0), [40, 80, 120, 255]);
        assert_eq!(out.pixel(31, 17), [40, 80, 120, 255]);
    }
}
