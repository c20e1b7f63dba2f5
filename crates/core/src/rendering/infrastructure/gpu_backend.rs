use std::collections::BTreeMap;
use std::sync::Arc;

use crate::rendering::domain::render_backend::{
    clip_rect, BindingState, BlendParams, Direction, RenderBackend, RenderError, ShaderPass,
    SurfaceId,
};
use crate::shared::constants::MIN_FRAMEBUFFER_EDGE;
use crate::shared::geometry::Geometry;
use crate::shared::pixel_buffer::PixelBuffer;

use super::gpu_context::{DispatchBuffers, GpuContext, GpuPassParams, Kernel};

struct GpuSurface {
    buffer: wgpu::Buffer,
    width: u32,
    height: u32,
}

/// wgpu compute implementation of [`RenderBackend`].
///
/// Surfaces are storage buffers of packed RGBA8 texels; every draw is one
/// compute dispatch over the clipped viewport.
pub struct GpuBackend {
    ctx: Arc<GpuContext>,
    surfaces: BTreeMap<SurfaceId, GpuSurface>,
    next_id: u32,
    binding: BindingState,
}

impl GpuBackend {
    pub fn new(ctx: Arc<GpuContext>) -> Self {
        Self {
            ctx,
            surfaces: BTreeMap::new(),
            next_id: 0,
            binding: BindingState::default(),
        }
    }

    /// Probes for an adapter and builds a backend on it.
    pub fn probe() -> Result<Self, RenderError> {
        let ctx = GpuContext::new().ok_or(RenderError::NoAdapter)?;
        Ok(Self::new(Arc::new(ctx)))
    }

    fn surface(&self, id: SurfaceId) -> Result<&GpuSurface, RenderError> {
        self.surfaces.get(&id).ok_or(RenderError::UnknownSurface(id))
    }

    fn bound_target(&self) -> Result<(SurfaceId, &GpuSurface), RenderError> {
        let target = self.binding.target.ok_or(RenderError::NoTargetBound)?;
        Ok((target, self.surface(target)?))
    }

    /// Builds params for a dispatch over `clip` of the bound target.
    fn base_params(&self, src: &GpuSurface, dst: &GpuSurface, viewport: Geometry, clip: Geometry) -> GpuPassParams {
        GpuPassParams {
            src_width: src.width,
            src_height: src.height,
            dst_width: dst.width,
            dst_height: dst.height,
            view_x: viewport.x,
            view_y: viewport.y,
            view_w: viewport.width,
            view_h: viewport.height,
            clip_x: clip.x,
            clip_y: clip.y,
            clip_w: clip.width,
            clip_h: clip.height,
            aux_width: src.width,
            aux_height: src.height,
            m00: 1.0,
            m11: 1.0,
            ..GpuPassParams::default()
        }
    }

    /// Dispatches `kernel` writing into the bound target. Inputs that alias
    /// the target are sampled from a copy.
    fn run(
        &self,
        kernel: Kernel,
        params: &GpuPassParams,
        src: SurfaceId,
        aux: SurfaceId,
        target: SurfaceId,
    ) -> Result<(), RenderError> {
        let dst = &self.surface(target)?.buffer;
        let src_copy = (src == target).then(|| self.ctx.duplicate(dst));
        let aux_copy = (aux == target).then(|| self.ctx.duplicate(dst));
        let src_buf = match &src_copy {
            Some(copy) => copy,
            None => &self.surface(src)?.buffer,
        };
        let aux_buf = match &aux_copy {
            Some(copy) => copy,
            None => &self.surface(aux)?.buffer,
        };

        self.ctx.dispatch(
            kernel,
            params,
            DispatchBuffers {
                src: src_buf,
                dst,
                aux: aux_buf,
            },
        );
        Ok(())
    }
}

fn direction_code(direction: Direction) -> u32 {
    match direction {
        Direction::Horizontal => 0,
        Direction::Vertical => 1,
    }
}

impl RenderBackend for GpuBackend {
    fn create_surface(&mut self, width: u32, height: u32) -> Result<SurfaceId, RenderError> {
        let width = width.max(MIN_FRAMEBUFFER_EDGE);
        let height = height.max(MIN_FRAMEBUFFER_EDGE);
        self.next_id += 1;
        let id = SurfaceId(self.next_id);
        let buffer = self.ctx.create_surface_buffer(width, height);
        self.surfaces.insert(
            id,
            GpuSurface {
                buffer,
                width,
                height,
            },
        );
        Ok(id)
    }

    fn destroy_surface(&mut self, id: SurfaceId) {
        if let Some(surface) = self.surfaces.remove(&id) {
            surface.buffer.destroy();
            if self.binding.target == Some(id) {
                self.binding = BindingState::default();
            }
        }
    }

    fn surface_size(&self, id: SurfaceId) -> Option<(u32, u32)> {
        self.surfaces.get(&id).map(|s| (s.width, s.height))
    }

    fn upload(&mut self, id: SurfaceId, pixels: &PixelBuffer) -> Result<(), RenderError> {
        let surface = self.surface(id)?;
        if surface.width != pixels.width() || surface.height != pixels.height() {
            return Err(RenderError::SizeMismatch {
                surface: id,
                expected: (surface.width * surface.height * 4) as usize,
                actual: pixels.data().len(),
            });
        }
        self.ctx.queue.write_buffer(&surface.buffer, 0, pixels.data());
        Ok(())
    }

    fn read_pixels(&mut self, id: SurfaceId) -> Result<PixelBuffer, RenderError> {
        let surface = self.surface(id)?;
        let data = self.ctx.read_buffer(&surface.buffer)?;
        Ok(PixelBuffer::new(data, surface.width, surface.height))
    }

    fn binding(&self) -> BindingState {
        self.binding
    }

    fn restore_binding(&mut self, state: BindingState) {
        self.binding = state;
    }

    fn bind_target(&mut self, id: SurfaceId) -> Result<(), RenderError> {
        let surface = self.surface(id)?;
        self.binding = BindingState {
            target: Some(id),
            viewport: Geometry::new(0, 0, surface.width as i32, surface.height as i32),
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
        let (target, dst) = self.bound_target()?;
        let state = BindingState {
            viewport: dst_rect,
            ..self.binding
        };
        let Some(clip) = clip_rect(&state, (dst.width, dst.height)) else {
            return Ok(());
        };
        let params = GpuPassParams {
            src_x: src_rect.x,
            src_y: src_rect.y,
            src_w: src_rect.width,
            src_h: src_rect.height,
            ..self.base_params(self.surface(src)?, dst, dst_rect, clip)
        };
        log::trace!("gpu blit {src:?} {src_rect:?} -> {target:?} {dst_rect:?}");
        self.run(Kernel::Blit, &params, src, src, target)
    }

    fn draw(&mut self, pass: &ShaderPass, src: SurfaceId) -> Result<(), RenderError> {
        let (target, dst) = self.bound_target()?;
        let Some(clip) = clip_rect(&self.binding, (dst.width, dst.height)) else {
            return Ok(());
        };
        let base = self.base_params(self.surface(src)?, dst, self.binding.viewport, clip);
        let (kernel, params) = match *pass {
            ShaderPass::Box { offset, direction } => (
                Kernel::BoxBlur,
                GpuPassParams {
                    offset,
                    direction: direction_code(direction),
                    ..base
                },
            ),
            ShaderPass::Gaussian { radius, direction } => (
                Kernel::GaussianBlur,
                GpuPassParams {
                    radius,
                    direction: direction_code(direction),
                    ..base
                },
            ),
            ShaderPass::KawaseDown { offset } => {
                (Kernel::KawaseDown, GpuPassParams { offset, ..base })
            }
            ShaderPass::KawaseUp { offset } => (Kernel::KawaseUp, GpuPassParams { offset, ..base }),
            ShaderPass::Bokeh { offset, samples } => (
                Kernel::Bokeh,
                GpuPassParams {
                    offset,
                    samples,
                    ..base
                },
            ),
        };
        log::trace!("gpu {} pass {src:?} -> {target:?} ({}x{})", pass.name(), dst.width, dst.height);
        self.run(kernel, &params, src, src, target)
    }

    fn blend(
        &mut self,
        window: SurfaceId,
        backdrop: SurfaceId,
        params: &BlendParams,
    ) -> Result<(), RenderError> {
        let (target, dst) = self.bound_target()?;
        let Some(clip) = clip_rect(&self.binding, (dst.width, dst.height)) else {
            return Ok(());
        };
        let back = self.surface(backdrop)?;
        let m = params.window_uv_matrix;
        let gpu_params = GpuPassParams {
            aux_width: back.width,
            aux_height: back.height,
            m00: m[0][0],
            m01: m[0][1],
            m10: m[1][0],
            m11: m[1][1],
            ..self.base_params(self.surface(window)?, dst, self.binding.viewport, clip)
        };
        self.run(Kernel::Blend, &gpu_params, window, backdrop, target)
    }

    fn name(&self) -> &'static str {
        "gpu"
    }
}
