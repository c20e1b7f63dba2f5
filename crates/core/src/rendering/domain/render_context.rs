use std::ops::{Deref, DerefMut};

use super::framebuffer::Framebuffer;
use super::render_backend::{BindingState, RenderBackend, RenderError, SurfaceId};

/// Scoped access to a backend's draw state.
///
/// Saves the binding (target, viewport, scissor) on `begin` and restores it
/// when dropped, so early `?` returns also leave the backend as the caller
/// found it.
pub struct RenderContext<'a> {
    backend: &'a mut dyn RenderBackend,
    saved: BindingState,
}

impl<'a> RenderContext<'a> {
    pub fn begin(backend: &'a mut dyn RenderBackend) -> Self {
        let saved = backend.binding();
        Self { backend, saved }
    }

    /// Begins a context with `target` bound and its full size as viewport.
    pub fn begin_on(
        backend: &'a mut dyn RenderBackend,
        target: SurfaceId,
    ) -> Result<Self, RenderError> {
        let mut ctx = Self::begin(backend);
        ctx.backend.bind_target(target)?;
        Ok(ctx)
    }

    /// Begins a context drawing into `framebuffer`, which must be allocated.
    pub fn begin_on_framebuffer(
        backend: &'a mut dyn RenderBackend,
        framebuffer: &Framebuffer,
    ) -> Result<Self, RenderError> {
        let mut ctx = Self::begin(backend);
        framebuffer.bind(&mut *ctx.backend)?;
        Ok(ctx)
    }

    pub fn backend(&mut self) -> &mut dyn RenderBackend {
        &mut *self.backend
    }
}

impl<'a> Deref for RenderContext<'a> {
    type Target = dyn RenderBackend + 'a;

    fn deref(&self) -> &Self::Target {
        &*self.backend
    }
}

impl<'a> DerefMut for RenderContext<'a> {
    fn deref_mut(&mut self) -> &mut Self::Target {
        &mut *self.backend
    }
}

impl Drop for RenderContext<'_> {
    fn drop(&mut self) {
        self.backend.restore_binding(self.saved);
    }
}
