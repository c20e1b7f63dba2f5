use thiserror::Error;

use crate::shared::geometry::Geometry;
use crate::shared::pixel_buffer::PixelBuffer;

/// Handle to a backend-owned pixel surface (texture + render target).
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SurfaceId(pub u32);

#[derive(Error, Debug)]
pub enum RenderError {
    #[error("no GPU adapter available")]
    NoAdapter,
    #[error("failed to request GPU device: {0}")]
    DeviceRequest(#[source] wgpu::RequestDeviceError),
    #[error("unknown surface {0:?}")]
    UnknownSurface(SurfaceId),
    #[error("no render target bound")]
    NoTargetBound,
    #[error("framebuffer has no storage allocated")]
    UnallocatedFramebuffer,
    #[error("failed to map GPU buffer for readback: {0}")]
    BufferMap(#[source] wgpu::BufferAsyncError),
    #[error("GPU readback was dropped before completing")]
    ReadbackIncomplete,
    #[error("pixel data is {actual} bytes, surface {surface:?} needs {expected}")]
    SizeMismatch {
        surface: SurfaceId,
        expected: usize,
        actual: usize,
    },
}

/// Draw-target state that a [`RenderContext`](super::render_context::RenderContext)
/// saves on entry and restores on exit.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct BindingState {
    pub target: Option<SurfaceId>,
    pub viewport: Geometry,
    pub scissor: Option<Geometry>,
}

/// One full-viewport shader pass. Offsets are in destination pixels.
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum ShaderPass {
    /// Uniform 9-tap kernel along one axis.
    Box { offset: f32, direction: Direction },
    /// Gaussian kernel with `radius` one-pixel taps on each side along one axis.
    Gaussian { radius: u32, direction: Direction },
    /// Dual-filter downsample (center + four diagonal taps).
    KawaseDown { offset: f32 },
    /// Dual-filter upsample (eight-tap tent).
    KawaseUp { offset: f32 },
    /// Golden-angle spiral over a disc of radius `offset`.
    Bokeh { offset: f32, samples: u32 },
}

impl ShaderPass {
    pub fn name(&self) -> &'static str {
        match self {
            ShaderPass::Box { .. } => "box",
            ShaderPass::Gaussian { .. } => "gaussian",
            ShaderPass::KawaseDown { .. } => "kawase-down",
            ShaderPass::KawaseUp { .. } => "kawase-up",
            ShaderPass::Bokeh { .. } => "bokeh",
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Direction {
    Horizontal,
    Vertical,
}

impl Direction {
    pub fn unit(self) -> (f32, f32) {
        match self {
            Direction::Horizontal => (1.0, 0.0),
            Direction::Vertical => (0.0, 1.0),
        }
    }
}

/// Parameters of the window-over-backdrop blend.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct BlendParams {
    /// Maps viewport UVs (centered at 0.5) to window-texture UVs.
    pub window_uv_matrix: [[f32; 2]; 2],
}

/// Minimal immediate-mode render API the blur stage is written against.
///
/// Mirrors a GL-style context: one surface is bound as the draw target, a
/// viewport and optional scissor restrict where draws land, and draws sample
/// other surfaces with bilinear filtering and clamp-to-edge addressing.
/// Surfaces hold premultiplied RGBA8 and start out transparent black.
pub trait RenderBackend {
    /// Creates a zero-filled surface of at least 1x1 pixels.
    fn create_surface(&mut self, width: u32, height: u32) -> Result<SurfaceId, RenderError>;

    /// Frees a surface. Unknown ids are ignored.
    fn destroy_surface(&mut self, id: SurfaceId);

    fn surface_size(&self, id: SurfaceId) -> Option<(u32, u32)>;

    /// Replaces a surface's pixels. Dimensions must match.
    fn upload(&mut self, id: SurfaceId, pixels: &PixelBuffer) -> Result<(), RenderError>;

    fn read_pixels(&mut self, id: SurfaceId) -> Result<PixelBuffer, RenderError>;

    fn binding(&self) -> BindingState;

    fn restore_binding(&mut self, state: BindingState);

    /// Binds `id` as the draw target with a full-surface viewport and no scissor.
    fn bind_target(&mut self, id: SurfaceId) -> Result<(), RenderError>;

    fn set_viewport(&mut self, viewport: Geometry);

    fn set_scissor(&mut self, scissor: Option<Geometry>);

    /// Linear-filtered copy of `src_rect` of `src` into `dst_rect` of the
    /// bound target. Pixels outside the target bounds or the scissor are
    /// skipped.
    fn blit(&mut self, src: SurfaceId, src_rect: Geometry, dst_rect: Geometry)
        -> Result<(), RenderError>;

    /// Runs `pass` over the viewport of the bound target, sampling all of `src`.
    fn draw(&mut self, pass: &ShaderPass, src: SurfaceId) -> Result<(), RenderError>;

    /// Writes `window + (1 - window.a) * backdrop` over the viewport of the
    /// bound target, clipped by the scissor.
    fn blend(
        &mut self,
        window: SurfaceId,
        backdrop: SurfaceId,
        params: &BlendParams,
    ) -> Result<(), RenderError>;

    fn name(&self) -> &'static str;
}

/// Area a draw actually touches: viewport ∩ scissor ∩ target bounds.
pub fn clip_rect(state: &BindingState, target_size: (u32, u32)) -> Option<Geometry> {
    let bounds = Geometry::new(0, 0, target_size.0 as i32, target_size.1 as i32);
    let mut clip = state.viewport.intersection(&bounds)?;
    if let Some(scissor) = state.scissor {
        clip = clip.intersection(&scissor)?;
    }
    Some(clip)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_clip_rect_without_scissor_is_viewport_in_bounds() {
        let state = BindingState {
            target: Some(SurfaceId(1)),
            viewport: Geometry::new(-10, 0, 50, 50),
            scissor: None,
        };
        assert_eq!(clip_rect(&state, (30, 30)), Some(Geometry::new(0, 0, 30, 30)));
    }

    #[test]
    fn test_clip_rect_applies_scissor() {
        let state = BindingState {
            target: Some(SurfaceId(1)),
            viewport: Geometry::new(0, 0, 100, 100),
            scissor: Some(Geometry::new(90, 90, 50, 50)),
        };
        assert_eq!(clip_rect(&state, (100, 100)), Some(Geometry::new(90, 90, 10, 10)));
    }

    #[test]
    fn test_clip_rect_disjoint_scissor_is_none() {
        let state = BindingState {
            target: Some(SurfaceId(1)),
            viewport: Geometry::new(0, 0, 10, 10),
            scissor: Some(Geometry::new(20, 20, 5, 5)),
        };
        assert_eq!(clip_rect(&state, (100, 100)), None);
    }

    #[test]
    fn test_direction_units() {
        assert_eq!(Direction::Horizontal.unit(), (1.0, 0.0));
        assert_eq!(Direction::Vertical.unit(), (0.0, 1.0));
    }
}
