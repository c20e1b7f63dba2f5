use crate::rendering::domain::render_backend::{BlendParams, RenderBackend, RenderError, SurfaceId};
use crate::rendering::domain::render_context::RenderContext;
use crate::shared::geometry::Geometry;

use super::target_framebuffer::TargetFramebuffer;

/// Composites `window` over the blurred `backdrop` into the target.
///
/// The viewport is the view's target-pixel box and the scissor is
/// `scissor_box` (logical) mapped to pixels and clipped to that viewport.
/// The backdrop is already in target orientation; the window texture is in
/// logical orientation and is sampled through the inverse output transform.
/// Returns `false` when the scissor leaves nothing to draw.
pub fn composite(
    backend: &mut dyn RenderBackend,
    window: SurfaceId,
    backdrop: SurfaceId,
    source_box: Geometry,
    scissor_box: Geometry,
    target: &TargetFramebuffer,
) -> Result<bool, RenderError> {
    let layout = &target.layout;
    let view_box = layout.to_target_pixel(source_box);
    let Some(scissor) = layout.to_target_pixel(scissor_box).intersection(&view_box) else {
        log::trace!("Blend scissor {scissor_box:?} misses view {source_box:?}");
        return Ok(false);
    };

    let params = BlendParams {
        window_uv_matrix: layout.transform().inverse().matrix(),
    };

    let mut ctx = RenderContext::begin_on(backend, target.surface)?;
    ctx.set_viewport(view_box);
    ctx.set_scissor(Some(scissor));
    ctx.blend(window, backdrop, &params)?;
    Ok(true)
}
