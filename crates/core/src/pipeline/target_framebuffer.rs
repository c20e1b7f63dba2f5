use crate::rendering::domain::coordinate_mapper::TargetLayout;
use crate::rendering::domain::render_backend::SurfaceId;

/// The framebuffer a view is being composited into: the backend surface
/// plus where it sits in the logical layout.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct TargetFramebuffer {
    pub surface: SurfaceId,
    pub layout: TargetLayout,
}

impl TargetFramebuffer {
    pub fn new(surface: SurfaceId, layout: TargetLayout) -> Self {
        Self { surface, layout }
    }
}
