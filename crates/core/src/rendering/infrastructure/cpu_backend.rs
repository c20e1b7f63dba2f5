use std::collections::BTreeMap;

use crate::rendering::domain::render_backend::{
    clip_rect, BindingState, BlendParams, RenderBackend, RenderError, ShaderPass, SurfaceId,
};
use crate::shared::constants::MIN_FRAMEBUFFER_EDGE;
use crate::shared::geometry::Geometry;
use crate::shared::pixel_buffer::PixelBuffer;

use super::cpu_kernels::{blend_over, sample_bilinear, to_bytes, PreparedPass};

/// One recorded backend call, for inspecting what a pipeline did.
#[derive(Clone, Debug, PartialEq)]
pub enum BackendOp {
    Create {
        surface: SurfaceId,
        width: u32,
        height: u32,
    },
    Destroy(SurfaceId),
    Blit {
        src: SurfaceId,
        target: SurfaceId,
        dst_rect: Geometry,
    },
    Draw {
        pass: &'static str,
        src: SurfaceId,
        target: SurfaceId,
        width: u32,
        height: u32,
    },
    Blend {
        window: SurfaceId,
        backdrop: SurfaceId,
        target: SurfaceId,
    },
}

/// Software implementation of [`RenderBackend`].
///
/// Evaluates every pass per pixel on the CPU with the same sampling rules as
/// the GPU shaders. Deterministic, so tests compare its output exactly.
#[derive(Debug, Default)]
pub struct CpuBackend {
    surfaces: BTreeMap<SurfaceId, PixelBuffer>,
    next_id: u32,
    binding: BindingState,
    operations: Vec<BackendOp>,
}

impl CpuBackend {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn operations(&self) -> &[BackendOp] {
        &self.operations
    }

    pub fn clear_operations(&mut self) {
        self.operations.clear();
    }

    pub fn live_surfaces(&self) -> usize {
        self.surfaces.len()
    }

    fn surface(&self, id: SurfaceId) -> Result<&PixelBuffer, RenderError> {
        self.surfaces.get(&id).ok_or(RenderError::UnknownSurface(id))
    }

    fn bound_target(&self) -> Result<(SurfaceId, (u32, u32)), RenderError> {
        let target = self.binding.target.ok_or(RenderError::NoTargetBound)?;
        let buf = self.surface(target)?;
        Ok((target, (buf.width(), buf.height())))
    }

    /// Shades every pixel of `clip` and writes the results into `target`.
    ///
    /// All reads complete before the first write, so sampling the bound
    /// target itself behaves like sampling a copy of it.
    fn shade_into<F>(&mut self, target: SurfaceId, clip: Geometry, shade: F) -> Result<(), RenderError>
    where
        F: Fn(&Self, i32, i32) -> Result<[u8; 4], RenderError>,
    {
        let mut out = Vec::with_capacity(clip.area() as usize);
        for y in clip.y..clip.bottom() {
            for x in clip.x..clip.right() {
                out.push(shade(self, x, y)?);
            }
        }

        let dst = self
            .surfaces
            .get_mut(&target)
            .ok_or(RenderError::UnknownSurface(target))?;
        let mut texels = out.into_iter();
        for y in clip.y..clip.bottom() {
            for x in clip.x..clip.right() {
                if let Some(px) = texels.next() {
                    dst.set_pixel(x as u32, y as u32, px);
                }
            }
        }
        Ok(())
    }
}

fn viewport_uv(viewport: &Geometry, x: i32, y: i32) -> (f32, f32) {
    (
        ((x - viewport.x) as f32 + 0.5) / viewport.width.max(1) as f32,
        ((y - viewport.y) as f32 + 0.5) / viewport.height.max(1) as f32,
    )
}

impl RenderBackend for CpuBackend {
    fn create_surface(&mut self, width: u32, height: u32) -> Result<SurfaceId, RenderError> {
        let width = width.max(MIN_FRAMEBUFFER_EDGE);
        let height = height.max(MIN_FRAMEBUFFER_EDGE);
        self.next_id += 1;
        let id = SurfaceId(self.next_id);
        self.surfaces.insert(id, PixelBuffer::zeroed(width, height));
        self.operations.push(BackendOp::Create {
            surface: id,
            width,
            height,
        });
        Ok(id)
    }

    fn destroy_surface(&mut self, id: SurfaceId) {
        if self.surfaces.remove(&id).is_some() {
            self.operations.push(BackendOp::Destroy(id));
            if self.binding.target == Some(id) {
                self.binding = BindingState::default();
            }
        }
    }

    fn surface_size(&self, id: SurfaceId) -> Option<(u32, u32)> {
        self.surfaces.get(&id).map(|b| (b.width(), b.height()))
    }

    fn upload(&mut self, id: SurfaceId, pixels: &PixelBuffer) -> Result<(), RenderError> {
        let dst = self
            .surfaces
            .get_mut(&id)
            .ok_or(RenderError::UnknownSurface(id))?;
        if dst.width() != pixels.width() || dst.height() != pixels.height() {
            return Err(RenderError::SizeMismatch {
                surface: id,
                expected: dst.data().len(),
                actual: pixels.data().len(),
            });
        }
        dst.data_mut().copy_from_slice(pixels.data());
        Ok(())
    }

    fn read_pixels(&mut self, id: SurfaceId) -> Result<PixelBuffer, RenderError> {
        self.surface(id).cloned()
    }

    fn binding(&self) -> BindingState {
        self.binding
    }

    fn restore_binding(&mut self, state: BindingState) {
        self.binding = state;
    }

    fn bind_target(&mut self, id: SurfaceId) -> Result<(), RenderError> {
        let buf = self.surface(id)?;
        self.binding = BindingState {
            target: Some(id),
            viewport: Geometry::new(0, 0, buf.width() as i32, buf.height() as i32),
            scissor: None,
        };
        Ok(())
    }

    fn set_viewport(&mut self, viewport: Geometry) {
        self.binding.viewport = viewport;
    }

    fn set_scissor(&mut self, scissor: Option<Geometry>) {
        self.binding.scissor = scissor;
    }

    fn blit(
        &mut self,
        src: SurfaceId,
        src_rect: Geometry,
        dst_rect: Geometry,
    ) -> Result<(), RenderError> {
        let (target, size) = self.bound_target()?;
        self.surface(src)?;
        self.operations.push(BackendOp::Blit {
            src,
            target,
            dst_rect,
        });
        log::trace!("cpu blit {src:?} {src_rect:?} -> {target:?} {dst_rect:?}");

        let state = BindingState {
            viewport: dst_rect,
            ..self.binding
        };
        let Some(clip) = clip_rect(&state, size) else {
            return Ok(());
        };
        let sx_scale = src_rect.width as f32 / dst_rect.width.max(1) as f32;
        let sy_scale = src_rect.height as f32 / dst_rect.height.max(1) as f32;

        self.shade_into(target, clip, |me, x, y| {
            let buf = me.surface(src)?;
            let sx = src_rect.x as f32 + ((x - dst_rect.x) as f32 + 0.5) * sx_scale;
            let sy = src_rect.y as f32 + ((y - dst_rect.y) as f32 + 0.5) * sy_scale;
            let view = buf.as_ndarray();
            let c = sample_bilinear(&view, sx / buf.width() as f32, sy / buf.height() as f32);
            Ok(to_bytes(c))
        })
    }

    fn draw(&mut self, pass: &ShaderPass, src: SurfaceId) -> Result<(), RenderError> {
        let (target, size) = self.bound_target()?;
        self.surface(src)?;
        self.operations.push(BackendOp::Draw {
            pass: pass.name(),
            src,
            target,
            width: size.0,
            height: size.1,
        });
        log::trace!("cpu {} pass {src:?} -> {target:?} ({}x{})", pass.name(), size.0, size.1);

        let Some(clip) = clip_rect(&self.binding, size) else {
            return Ok(());
        };
        let viewport = self.binding.viewport;
        let step = (
            1.0 / viewport.width.max(1) as f32,
            1.0 / viewport.height.max(1) as f32,
        );
        let prepared = PreparedPass::new(*pass);

        self.shade_into(target, clip, |me, x, y| {
            let view = me.surface(src)?.as_ndarray();
            let uv = viewport_uv(&viewport, x, y);
            Ok(to_bytes(prepared.shade(&view, uv, step)))
        })
    }

    fn blend(
        &mut self,
        window: SurfaceId,
        backdrop: SurfaceId,
        params: &BlendParams,
    ) -> Result<(), RenderError> {
        let (target, size) = self.bound_target()?;
        self.surface(window)?;
        self.surface(backdrop)?;
        self.operations.push(BackendOp::Blend {
            window,
            backdrop,
            target,
        });

        let Some(clip) = clip_rect(&self.binding, size) else {
            return Ok(());
        };
        let viewport = self.binding.viewport;
        let m = params.window_uv_matrix;

        self.shade_into(target, clip, |me, x, y| {
            let (u, v) = viewport_uv(&viewport, x, y);
            let bp = sample_bilinear(&me.surface(backdrop)?.as_ndarray(), u, v);
            let (cu, cv) = (u - 0.5, v - 0.5);
            let wu = m[0][0] * cu + m[0][1] * cv + 0.5;
            let wv = m[1][0] * cu + m[1][1] * cv + 0.5;
            let wp = sample_bilinear(&me.surface(window)?.as_ndarray(), wu, wv);
            Ok(to_bytes(blend_over(wp, bp)))
        })
    }

    fn name(&self) -> &'static str {
        "cpu"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::rendering::domain::render_backend::Direction;

    fn backend_with(width: u32, height: u32, rgba: [u8; 4]) -> (CpuBackend, SurfaceId) {
        let mut backend = CpuBackend::new();
        let id = backend.create_surface(width, height).unwrap();
        backend
            .upload(id, &PixelBuffer::filled(width, height, rgba))
            .unwrap();
        (backend, id)
    }

    #[test]
    fn test_new_surface_is_transparent() {
        let mut backend = CpuBackend::new();
        let id = backend.create_surface(3, 2).unwrap();
        let px = backend.read_pixels(id).unwrap();
        assert!(px.data().iter().all(|&b| b == 0));
    }

    #[test]
    fn test_upload_size_mismatch_errors() {
        let mut backend = CpuBackend::new();
        let id = backend.create_surface(3, 2).unwrap();
        let err = backend.upload(id, &PixelBuffer::zeroed(2, 2)).unwrap_err();
        assert!(matches!(err, RenderError::SizeMismatch { .. }));
    }

    #[test]
    fn test_unknown_surface_errors() {
        let mut backend = CpuBackend::new();
        assert!(matches!(
            backend.bind_target(SurfaceId(42)),
            Err(RenderError::UnknownSurface(SurfaceId(42)))
        ));
        assert!(backend.read_pixels(SurfaceId(42)).is_err());
    }

    #[test]
    fn test_draw_without_target_errors() {
        let (mut backend, src) = backend_with(2, 2, [0; 4]);
        let pass = ShaderPass::KawaseDown { offset: 1.0 };
        assert!(matches!(
            backend.draw(&pass, src),
            Err(RenderError::NoTargetBound)
        ));
    }

    #[test]
    fn test_identity_blit_copies_pixels() {
        let (mut backend, src) = backend_with(4, 4, [0; 4]);
        let mut pixels = PixelBuffer::zeroed(4, 4);
        pixels.set_pixel(1, 2, [9, 8, 7, 255]);
        backend.upload(src, &pixels).unwrap();
        let dst = backend.create_surface(4, 4).unwrap();

        backend.bind_target(dst).unwrap();
        let full = Geometry::new(0, 0, 4, 4);
        backend.blit(src, full, full).unwrap();

        assert_eq!(backend.read_pixels(dst).unwrap(), pixels);
    }

    #[test]
    fn test_blit_into_sub_rect_leaves_rest_untouched() {
        let (mut backend, src) = backend_with(2, 2, [200, 100, 50, 255]);
        let dst = backend.create_surface(6, 6).unwrap();
        backend.bind_target(dst).unwrap();
        backend
            .blit(src, Geometry::new(0, 0, 2, 2), Geometry::new(4, 4, 2, 2))
            .unwrap();

        let out = backend.read_pixels(dst).unwrap();
        assert_eq!(out.pixel(5, 5), [200, 100, 50, 255]);
        assert_eq!(out.pixel(3, 3), [0, 0, 0, 0]);
    }

    #[test]
    fn test_blit_respects_scissor() {
        let (mut backend, src) = backend_with(4, 4, [255; 4]);
        let dst = backend.create_surface(4, 4).unwrap();
        backend.bind_target(dst).unwrap();
        backend.set_scissor(Some(Geometry::new(0, 0, 2, 4)));
        let full = Geometry::new(0, 0, 4, 4);
        backend.blit(src, full, full).unwrap();

        let out = backend.read_pixels(dst).unwrap();
        assert_eq!(out.pixel(1, 0), [255; 4]);
        assert_eq!(out.pixel(2, 0), [0; 4]);
    }

    #[test]
    fn test_draw_onto_itself_reads_original() {
        let (mut backend, id) = backend_with(8, 1, [0; 4]);
        let mut pixels = PixelBuffer::zeroed(8, 1);
        pixels.set_pixel(0, 0, [255, 255, 255, 255]);
        backend.upload(id, &pixels).unwrap();

        backend.bind_target(id).unwrap();
        let pass = ShaderPass::Box {
            offset: 1.0,
            direction: Direction::Horizontal,
        };
        backend.draw(&pass, id).unwrap();

        let out = backend.read_pixels(id).unwrap();
        assert_eq!(out.pixel(7, 0), [0, 0, 0, 0]);
        assert!(out.pixel(4, 0)[0] > 0);
    }

    #[test]
    fn test_blend_identity_composites_window_over_backdrop() {
        let (mut backend, backdrop) = backend_with(2, 2, [0, 0, 255, 255]);
        let window = backend.create_surface(2, 2).unwrap();
        let mut w = PixelBuffer::zeroed(2, 2);
        w.set_pixel(0, 0, [255, 0, 0, 255]);
        backend.upload(window, &w).unwrap();
        let target = backend.create_surface(2, 2).unwrap();

        backend.bind_target(target).unwrap();
        let params = BlendParams {
            window_uv_matrix: [[1.0, 0.0], [0.0, 1.0]],
        };
        backend.blend(window, backdrop, &params).unwrap();

        let out = backend.read_pixels(target).unwrap();
        assert_eq!(out.pixel(0, 0), [255, 0, 0, 255]);
        assert_eq!(out.pixel(1, 1), [0, 0, 255, 255]);
    }

    #[test]
    fn test_operations_are_recorded() {
        let (mut backend, src) = backend_with(2, 2, [0; 4]);
        let dst = backend.create_surface(1, 1).unwrap();
        backend.bind_target(dst).unwrap();
        backend
            .draw(&ShaderPass::KawaseDown { offset: 1.0 }, src)
            .unwrap();
        backend.destroy_surface(dst);

        let ops = backend.operations();
        assert_eq!(ops.last(), Some(&BackendOp::Destroy(dst)));
        assert!(ops.contains(&BackendOp::Draw {
            pass: "kawase-down",
            src,
            target: dst,
            width: 1,
            height: 1,
        }));
        assert_eq!(backend.binding().target, None);
    }
}
