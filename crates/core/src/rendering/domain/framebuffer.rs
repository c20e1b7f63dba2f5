use crate::shared::constants::MIN_FRAMEBUFFER_EDGE;

use super::render_backend::{RenderBackend, RenderError, SurfaceId};

/// A lazily sized render target.
///
/// Backing storage is only recreated when the requested size changes, so a
/// window with a stable size reuses the same surface frame after frame.
#[derive(Debug, Default)]
pub struct Framebuffer {
    surface: Option<SurfaceId>,
    width: u32,
    height: u32,
}

impl Framebuffer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn surface(&self) -> Option<SurfaceId> {
        self.surface
    }

    pub fn size(&self) -> (u32, u32) {
        (self.width, self.height)
    }

    pub fn is_allocated(&self) -> bool {
        self.surface.is_some()
    }

    /// Ensures storage of `width x height` (each clamped to at least 1).
    /// Returns `true` when storage was (re)created; reallocated storage is
    /// zero-filled, so previous contents are gone.
    pub fn allocate(
        &mut self,
        backend: &mut dyn RenderBackend,
        width: u32,
        height: u32,
    ) -> Result<bool, RenderError> {
        let width = width.max(MIN_FRAMEBUFFER_EDGE);
        let height = height.max(MIN_FRAMEBUFFER_EDGE);
        if self.surface.is_some() && self.width == width && self.height == height {
            return Ok(false);
        }

        self.release(backend);
        let surface = backend.create_surface(width, height)?;
        log::trace!("Allocated framebuffer {surface:?} at {width}x{height}");
        self.surface = Some(surface);
        self.width = width;
        self.height = height;
        Ok(true)
    }

    /// Makes this the active draw target with a full-size viewport.
    pub fn bind(&self, backend: &mut dyn RenderBackend) -> Result<(), RenderError> {
        let surface = self.surface.ok_or(RenderError::UnallocatedFramebuffer)?;
        backend.bind_target(surface)
    }

    /// Frees the backing storage. Releasing twice is a no-op.
    pub fn release(&mut self, backend: &mut dyn RenderBackend) {
        if let Some(surface) = self.surface.take() {
            backend.destroy_surface(surface);
        }
        self.width = 0;
        self.height = 0;
    }
}

/// Addresses one of the two buffers of a [`FramebufferPair`] relative to
/// its current orientation.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Slot {
    /// The working buffer (`A`): captures land here and blurred results
    /// are normalized back here.
    Current,
    /// The alternate buffer (`B`).
    Other,
}

impl Slot {
    pub fn flipped(self) -> Slot {
        match self {
            Slot::Current => Slot::Other,
            Slot::Other => Slot::Current,
        }
    }

    /// Slot for ping-pong step `i`: even steps map to `Current`.
    pub fn for_parity(i: u32) -> Slot {
        if i % 2 == 0 {
            Slot::Current
        } else {
            Slot::Other
        }
    }
}

/// Two framebuffers used ping-pong style.
///
/// Swapping only flips an index; the owned buffers never move, so there is
/// no way to alias or lose one of them.
#[derive(Debug, Default)]
pub struct FramebufferPair {
    buffers: [Framebuffer; 2],
    front: usize,
}

impl FramebufferPair {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, slot: Slot) -> &Framebuffer {
        &self.buffers[self.index(slot)]
    }

    pub fn get_mut(&mut self, slot: Slot) -> &mut Framebuffer {
        let idx = self.index(slot);
        &mut self.buffers[idx]
    }

    pub fn current(&self) -> &Framebuffer {
        self.get(Slot::Current)
    }

    pub fn other(&self) -> &Framebuffer {
        self.get(Slot::Other)
    }

    pub fn swap(&mut self) {
        self.front = 1 - self.front;
    }

    pub fn release(&mut self, backend: &mut dyn RenderBackend) {
        for fb in &mut self.buffers {
            fb.release(backend);
        }
    }

    fn index(&self, slot: Slot) -> usize {
        match slot {
            Slot::Current => self.front,
            Slot::Other => 1 - self.front,
        }
    }
}
