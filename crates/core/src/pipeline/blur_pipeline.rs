use std::rc::Rc;

use serde::Serialize;

use crate::blurring::domain::blur_algorithm::{AlgorithmKind, BlurPasses};
use crate::blurring::domain::blur_options::{option_keys, BlurConfig, BlurParameters, SubscriptionId};
use crate::blurring::infrastructure::algorithm_factory::{algorithm_for, BlurAlgorithm};
use crate::rendering::domain::coordinate_mapper::to_view_local;
use crate::rendering::domain::framebuffer::{FramebufferPair, Slot};
use crate::rendering::domain::render_backend::{RenderBackend, RenderError, SurfaceId};
use crate::rendering::domain::render_context::RenderContext;
use crate::shared::geometry::Geometry;
use crate::shared::region::Region;

use super::blend_stage;
use super::target_framebuffer::TargetFramebuffer;

/// What the last `pre_render` did, in target-pixel units.
#[derive(Clone, Copy, Debug, PartialEq, Serialize)]
pub struct FrameStats {
    pub parameters: BlurParameters,
    /// Damaged box captured from the target.
    pub capture_box: Geometry,
    /// Capture size rounded up to a multiple of `degrade` (capped at the
    /// captured extent).
    pub rounded_size: (u32, u32),
    /// Size the algorithm ran at.
    pub scaled_size: (u32, u32),
    /// The view's box; the output buffer has its size.
    pub view_box: Geometry,
    pub swapped: bool,
}

/// Per-window backdrop blur.
///
/// Each frame, [`pre_render`](Self::pre_render) captures the damaged part of
/// the target behind the window, blurs it with the configured algorithm and
/// places the result into a view-sized output buffer;
/// [`render`](Self::render) then blends the window over that output.
///
/// Owns two framebuffers. Call [`destroy`](Self::destroy) with the backend
/// before dropping the pipeline to free them.
pub struct BlurPipeline {
    algorithm: BlurAlgorithm,
    config: Rc<BlurConfig>,
    defaults: BlurParameters,
    buffers: FramebufferPair,
    subscriptions: Vec<SubscriptionId>,
    last_frame: Option<FrameStats>,
}

impl BlurPipeline {
    /// Creates a pipeline for `algorithm_name` (unknown names fall back to
    /// Kawase). Registers the algorithm's option keys with their defaults and
    /// calls `on_invalidate` whenever one of them changes.
    pub fn new(config: Rc<BlurConfig>, algorithm_name: &str, on_invalidate: Rc<dyn Fn()>) -> Self {
        let algorithm = algorithm_for(algorithm_name);
        let kind = algorithm.kind();
        let defaults = kind.default_parameters();
        defaults.register_defaults(&config, kind.name());

        let subscriptions = option_keys(kind.name())
            .iter()
            .map(|key| config.subscribe(key, Rc::clone(&on_invalidate)))
            .collect();

        log::debug!("Created {kind} blur pipeline");
        Self {
            algorithm,
            config,
            defaults,
            buffers: FramebufferPair::new(),
            subscriptions,
            last_frame: None,
        }
    }

    pub fn algorithm(&self) -> AlgorithmKind {
        self.algorithm.kind()
    }

    /// Current tunables, clamped to their valid ranges.
    pub fn parameters(&self) -> BlurParameters {
        BlurParameters::snapshot(&self.config, self.algorithm.kind().name(), &self.defaults)
    }

    /// Distance in target pixels the blur can pull color from. Callers grow
    /// damage by this much so the blurred edges are redrawn.
    pub fn blur_radius(&self) -> i32 {
        self.parameters().blur_radius()
    }

    /// The view-sized blurred backdrop, once `pre_render` has run.
    pub fn output(&self) -> Option<SurfaceId> {
        self.buffers.other().surface()
    }

    pub fn last_frame(&self) -> Option<&FrameStats> {
        self.last_frame.as_ref()
    }

    /// Blurs the damaged part of the target behind `source_box` (logical)
    /// into the output buffer.
    ///
    /// Only `damage ∩ target geometry` is recomputed; the rest of the output
    /// keeps its previous content. With no damage on the target nothing is
    /// drawn and the output is only sized to the view.
    pub fn pre_render(
        &mut self,
        backend: &mut dyn RenderBackend,
        source_box: Geometry,
        damage: &Region,
        target: &TargetFramebuffer,
    ) -> Result<(), RenderError> {
        let params = self.parameters();
        let layout = &target.layout;
        let view_box = layout.to_target_pixel(source_box);

        let damage = damage.intersect_box(layout.geometry());
        let capture_box = layout.damage_to_target_pixel(damage.extents());
        if damage.is_empty() || capture_box.is_empty() {
            self.buffers
                .get_mut(Slot::Other)
                .allocate(backend, view_box.width as u32, view_box.height as u32)?;
            return Ok(());
        }

        let degrade = params.degrade;
        let rounded_size = (
            capture_edge(capture_box.width as u32, degrade),
            capture_edge(capture_box.height as u32, degrade),
        );
        let scaled_size = (
            (capture_box.width as u32 / degrade).max(1),
            (capture_box.height as u32 / degrade).max(1),
        );

        self.capture(backend, target.surface, capture_box, rounded_size)?;

        let swapped = self.algorithm.run_passes(
            backend,
            &mut self.buffers,
            &params,
            scaled_size.0,
            scaled_size.1,
        )?;
        if swapped {
            self.buffers.swap();
        }

        if params.iterations == 0 && self.algorithm.kind() != AlgorithmKind::Bokeh {
            self.copy_scaled(backend, rounded_size, scaled_size)?;
        }

        self.upsample(backend, scaled_size, to_view_local(capture_box, view_box), view_box)?;

        log::trace!(
            "{} pre-render: capture {capture_box:?} rounded {rounded_size:?} scaled {scaled_size:?} view {view_box:?}",
            self.algorithm.kind()
        );
        self.last_frame = Some(FrameStats {
            parameters: params,
            capture_box,
            rounded_size,
            scaled_size,
            view_box,
            swapped,
        });
        Ok(())
    }

    /// Blends `window` over the blurred backdrop into the target, limited to
    /// `scissor_box` (logical).
    pub fn render(
        &self,
        backend: &mut dyn RenderBackend,
        window: SurfaceId,
        source_box: Geometry,
        scissor_box: Geometry,
        target: &TargetFramebuffer,
    ) -> Result<(), RenderError> {
        let Some(backdrop) = self.output() else {
            log::warn!("render() called before pre_render(); nothing to blend");
            return Ok(());
        };
        blend_stage::composite(backend, window, backdrop, source_box, scissor_box, target)?;
        Ok(())
    }

    /// Frees both framebuffers. The pipeline can be reused afterwards.
    pub fn destroy(&mut self, backend: &mut dyn RenderBackend) {
        self.buffers.release(backend);
        self.last_frame = None;
    }

    /// Linear blit of the damaged target box into the working buffer.
    fn capture(
        &mut self,
        backend: &mut dyn RenderBackend,
        source: SurfaceId,
        capture_box: Geometry,
        (width, height): (u32, u32),
    ) -> Result<(), RenderError> {
        let working = self.buffers.get_mut(Slot::Current);
        working.allocate(backend, width, height)?;

        let mut ctx = RenderContext::begin_on_framebuffer(backend, working)?;
        ctx.blit(source, capture_box, Geometry::new(0, 0, width as i32, height as i32))
    }

    /// Zero-iteration path: scale the capture straight to the output
    /// resolution so it matches what the algorithms would have produced.
    fn copy_scaled(
        &mut self,
        backend: &mut dyn RenderBackend,
        (rounded_w, rounded_h): (u32, u32),
        (scaled_w, scaled_h): (u32, u32),
    ) -> Result<(), RenderError> {
        let src = self
            .buffers
            .current()
            .surface()
            .ok_or(RenderError::UnallocatedFramebuffer)?;
        let scratch = self.buffers.get_mut(Slot::Other);
        scratch.allocate(backend, scaled_w, scaled_h)?;

        {
            let mut ctx = RenderContext::begin_on_framebuffer(backend, scratch)?;
            ctx.blit(
                src,
                Geometry::new(0, 0, rounded_w as i32, rounded_h as i32),
                Geometry::new(0, 0, scaled_w as i32, scaled_h as i32),
            )?;
        }
        self.buffers.swap();
        Ok(())
    }

    /// Blits the blurred result into the damaged box of the view-sized output.
    fn upsample(
        &mut self,
        backend: &mut dyn RenderBackend,
        (scaled_w, scaled_h): (u32, u32),
        local_box: Geometry,
        view_box: Geometry,
    ) -> Result<(), RenderError> {
        let src = self
            .buffers
            .current()
            .surface()
            .ok_or(RenderError::UnallocatedFramebuffer)?;
        let output = self.buffers.get_mut(Slot::Other);
        output.allocate(backend, view_box.width as u32, view_box.height as u32)?;

        let mut ctx = RenderContext::begin_on_framebuffer(backend, output)?;
        ctx.blit(
            src,
            Geometry::new(0, 0, scaled_w as i32, scaled_h as i32),
            local_box,
        )
    }
}

impl Drop for BlurPipeline {
    fn drop(&mut self) {
        for id in self.subscriptions.drain(..) {
            self.config.unsubscribe(id);
        }
        if self.buffers.current().is_allocated() || self.buffers.other().is_allocated() {
            log::warn!(
                "{} blur pipeline dropped without destroy(); framebuffers were not released",
                self.algorithm.kind()
            );
        }
    }
}

/// Capture edge for a damaged extent: rounded up to a multiple of
/// `degrade`, where `degrade` is capped at the extent so the result never
/// exceeds twice the extent.
fn capture_edge(extent: u32, degrade: u32) -> u32 {
    let extent = extent.max(1);
    let multiple = degrade.clamp(1, extent);
    extent.div_ceil(multiple) * multiple
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::rendering::domain::coordinate_mapper::TargetLayout;
    use crate::rendering::domain::output_transform::OutputTransform;
    use crate::rendering::infrastructure::cpu_backend::{BackendOp, CpuBackend};
    use crate::shared::pixel_buffer::PixelBuffer;
    use rstest::rstest;
    use std::cell::Cell;

    struct Fixture {
        backend: CpuBackend,
        config: Rc<BlurConfig>,
        invalidations: Rc<Cell<u32>>,
        target: TargetFramebuffer,
    }

    impl Fixture {
        fn new(pixels: &PixelBuffer, transform: OutputTransform) -> Self {
            let mut backend = CpuBackend::new();
            let surface = backend
                .create_surface(pixels.width(), pixels.height())
                .unwrap();
            backend.upload(surface, pixels).unwrap();
            let (w, h) = if transform.swaps_axes() {
                (pixels.height(), pixels.width())
            } else {
                (pixels.width(), pixels.height())
            };
            let layout = TargetLayout::new(Geometry::new(0, 0, w as i32, h as i32), 1.0, transform);
            Self {
                backend,
                config: Rc::new(BlurConfig::new()),
                invalidations: Rc::new(Cell::new(0)),
                target: TargetFramebuffer::new(surface, layout),
            }
        }

        fn pipeline(&self, algorithm: &str) -> BlurPipeline {
            let hits = Rc::clone(&self.invalidations);
            BlurPipeline::new(
                Rc::clone(&self.config),
                algorithm,
                Rc::new(move || hits.set(hits.get() + 1)),
            )
        }

        fn output(&mut self, pipeline: &BlurPipeline) -> PixelBuffer {
            self.backend
                .read_pixels(pipeline.output().unwrap())
                .unwrap()
        }
    }

    fn gradient(width: u32, height: u32) -> PixelBuffer {
        let mut buf = PixelBuffer::zeroed(width, height);
        for y in 0..height {
            for x in 0..width {
                buf.set_pixel(x, y, [(x * 5) as u8, (y * 5) as u8, 128, 255]);
            }
        }
        buf
    }

    fn checkerboard(size: u32) -> PixelBuffer {
        let mut buf = PixelBuffer::zeroed(size, size);
        for y in 0..size {
            for x in 0..size {
                let v = if (x / 2 + y / 2) % 2 == 0 { 255 } else { 0 };
                buf.set_pixel(x, y, [v, v, v, 255]);
            }
        }
        buf
    }

    #[rstest]
    #[case(200, 4, 200)]
    #[case(201, 4, 204)]
    #[case(5, 3, 6)]
    #[case(3, 4, 3)]
    #[case(1, 4096, 1)]
    #[case(0, 4, 1)]
    #[case(7, 1, 7)]
    #[case(100, u32::MAX, 100)]
    fn test_capture_edge(#[case] extent: u32, #[case] degrade: u32, #[case] expected: u32) {
        assert_eq!(capture_edge(extent, degrade), expected);
    }

    #[test]
    fn test_huge_degrade_keeps_capture_small() {
        let mut fx = Fixture::new(&gradient(8, 8), OutputTransform::Normal);
        let mut pipeline = fx.pipeline("kawase");
        fx.config.set_int("kawase_degrade", 4096).unwrap();
        fx.backend.clear_operations();

        let view = Geometry::new(0, 0, 8, 8);
        let damage = Region::from(Geometry::new(3, 3, 1, 1));
        pipeline
            .pre_render(&mut fx.backend, view, &damage, &fx.target)
            .unwrap();

        let largest = fx
            .backend
            .operations()
            .iter()
            .filter_map(|op| match op {
                BackendOp::Create { width, height, .. } => Some(width * height),
                _ => None,
            })
            .max();
        assert_eq!(largest, Some(64));
        let stats = pipeline.last_frame().unwrap();
        assert_eq!(stats.rounded_size, (1, 1));
        assert_eq!(stats.scaled_size, (1, 1));
        pipeline.destroy(&mut fx.backend);
    }

    #[test]
    fn test_kawase_scenario_sizes() {
        let mut fx = Fixture::new(&gradient(200, 200), OutputTransform::Normal);
        let mut pipeline = fx.pipeline("kawase");
        fx.config.set_int("kawase_degrade", 4).unwrap();
        fx.config.set_int("kawase_iterations", 2).unwrap();
        fx.backend.clear_operations();

        let window = Geometry::new(0, 0, 200, 200);
        let damage = Region::from(window);
        pipeline
            .pre_render(&mut fx.backend, window, &damage, &fx.target)
            .unwrap();

        let draws: Vec<_> = fx
            .backend
            .operations()
            .iter()
            .filter_map(|op| match op {
                BackendOp::Draw { pass, width, height, .. } => Some((*pass, *width, *height)),
                _ => None,
            })
            .collect();
        assert_eq!(
            draws,
            vec![
                ("kawase-down", 50, 50),
                ("kawase-down", 25, 25),
                ("kawase-up", 25, 25),
                ("kawase-up", 50, 50),
            ]
        );

        let stats = pipeline.last_frame().unwrap();
        assert_eq!(stats.capture_box, window);
        assert_eq!(stats.rounded_size, (200, 200));
        assert_eq!(stats.scaled_size, (50, 50));
        assert_eq!(
            fx.backend.surface_size(pipeline.output().unwrap()),
            Some((200, 200))
        );
        assert_eq!(pipeline.blur_radius(), 16);
        pipeline.destroy(&mut fx.backend);
    }

    #[test]
    fn test_capture_blit_uses_rounded_size() {
        let mut fx = Fixture::new(&gradient(40, 40), OutputTransform::Normal);
        let mut pipeline = fx.pipeline("box");
        fx.config.set_int("box_degrade", 4).unwrap();
        fx.backend.clear_operations();

        let window = Geometry::new(0, 0, 40, 40);
        let damage = Region::from(Geometry::new(5, 5, 10, 7));
        pipeline
            .pre_render(&mut fx.backend, window, &damage, &fx.target)
            .unwrap();

        let first_blit = fx.backend.operations().iter().find_map(|op| match op {
            BackendOp::Blit { dst_rect, .. } => Some(*dst_rect),
            _ => None,
        });
        assert_eq!(first_blit, Some(Geometry::new(0, 0, 12, 8)));
        assert_eq!(pipeline.last_frame().unwrap().scaled_size, (2, 1));
        pipeline.destroy(&mut fx.backend);
    }

    #[rstest]
    #[case("box")]
    #[case("gaussian")]
    #[case("kawase")]
    fn test_zero_iterations_is_identity(#[case] algorithm: &str) {
        let input = gradient(32, 24);
        let mut fx = Fixture::new(&input, OutputTransform::Normal);
        let mut pipeline = fx.pipeline(algorithm);
        fx.config
            .set_int(&format!("{algorithm}_iterations"), 0)
            .unwrap();

        let window = Geometry::new(0, 0, 32, 24);
        pipeline
            .pre_render(&mut fx.backend, window, &Region::from(window), &fx.target)
            .unwrap();

        assert_eq!(fx.output(&pipeline), input);
        pipeline.destroy(&mut fx.backend);
    }

    #[test]
    fn test_zero_iterations_with_degrade_keeps_flat_areas() {
        let input = PixelBuffer::filled(32, 32, [60, 120, 180, 255]);
        let mut fx = Fixture::new(&input, OutputTransform::Normal);
        let mut pipeline = fx.pipeline("kawase");
        fx.config.set_int("kawase_iterations", 0).unwrap();
        fx.config.set_int("kawase_degrade", 4).unwrap();

        let window = Geometry::new(0, 0, 32, 32);
        pipeline
            .pre_render(&mut fx.backend, window, &Region::from(window), &fx.target)
            .unwrap();

        assert_eq!(fx.output(&pipeline), input);
        pipeline.destroy(&mut fx.backend);
    }

    #[test]
    fn test_bokeh_alters_input_with_zero_iterations() {
        let input = checkerboard(32);
        let mut fx = Fixture::new(&input, OutputTransform::Normal);
        let mut pipeline = fx.pipeline("bokeh");
        fx.config.set_int("bokeh_iterations", 0).unwrap();

        let window = Geometry::new(0, 0, 32, 32);
        pipeline
            .pre_render(&mut fx.backend, window, &Region::from(window), &fx.target)
            .unwrap();

        assert!(pipeline.last_frame().unwrap().swapped);
        assert_ne!(fx.output(&pipeline), input);
        pipeline.destroy(&mut fx.backend);
    }

    #[rstest]
    #[case("box")]
    #[case("gaussian")]
    #[case("kawase")]
    #[case("bokeh")]
    fn test_blur_changes_detailed_input(#[case] algorithm: &str) {
        let input = checkerboard(32);
        let mut fx = Fixture::new(&input, OutputTransform::Normal);
        let mut pipeline = fx.pipeline(algorithm);

        let window = Geometry::new(0, 0, 32, 32);
        pipeline
            .pre_render(&mut fx.backend, window, &Region::from(window), &fx.target)
            .unwrap();

        let out = fx.output(&pipeline);
        assert_eq!((out.width(), out.height()), (32, 32));
        assert_ne!(out, input);
        pipeline.destroy(&mut fx.backend);
    }

    #[test]
    fn test_empty_damage_is_idempotent() {
        let mut fx = Fixture::new(&gradient(40, 40), OutputTransform::Normal);
        let mut pipeline = fx.pipeline("kawase");
        let window = Geometry::new(0, 0, 40, 40);
        pipeline
            .pre_render(&mut fx.backend, window, &Region::from(window), &fx.target)
            .unwrap();
        let first = fx.output(&pipeline);

        fx.backend.clear_operations();
        pipeline
            .pre_render(&mut fx.backend, window, &Region::new(), &fx.target)
            .unwrap();
        pipeline
            .pre_render(&mut fx.backend, window, &Region::new(), &fx.target)
            .unwrap();

        assert_eq!(fx.output(&pipeline), first);
        assert!(!fx
            .backend
            .operations()
            .iter()
            .any(|op| matches!(op, BackendOp::Draw { .. } | BackendOp::Blit { .. })));
        pipeline.destroy(&mut fx.backend);
    }

    #[test]
    fn test_damage_outside_target_is_ignored() {
        let mut fx = Fixture::new(&gradient(40, 40), OutputTransform::Normal);
        let mut pipeline = fx.pipeline("box");
        let window = Geometry::new(0, 0, 40, 40);
        let damage = Region::from(Geometry::new(100, 100, 10, 10));
        pipeline
            .pre_render(&mut fx.backend, window, &damage, &fx.target)
            .unwrap();

        assert!(pipeline.last_frame().is_none());
        assert_eq!(
            fx.backend.surface_size(pipeline.output().unwrap()),
            Some((40, 40))
        );
        pipeline.destroy(&mut fx.backend);
    }

    #[test]
    fn test_partial_damage_only_updates_damaged_box() {
        let input = checkerboard(40);
        let mut fx = Fixture::new(&input, OutputTransform::Normal);
        let mut pipeline = fx.pipeline("box");
        let window = Geometry::new(0, 0, 40, 40);
        pipeline
            .pre_render(
                &mut fx.backend,
                window,
                &Region::from(Geometry::new(20, 20, 20, 20)),
                &fx.target,
            )
            .unwrap();

        let out = fx.output(&pipeline);
        assert_eq!(out.pixel(5, 5), [0, 0, 0, 0]);
        assert_eq!(out.pixel(30, 30)[3], 255);
        pipeline.destroy(&mut fx.backend);
    }

    #[test]
    fn test_option_change_invalidates() {
        let fx = Fixture::new(&gradient(8, 8), OutputTransform::Normal);
        let pipeline = fx.pipeline("gaussian");
        fx.config.set_float("gaussian_offset", 3.0).unwrap();
        fx.config.set_int("gaussian_degrade", 2).unwrap();
        fx.config.set_int("box_degrade", 2).unwrap_err();
        assert_eq!(fx.invalidations.get(), 2);
        drop(pipeline);
    }

    #[test]
    fn test_drop_unsubscribes() {
        let fx = Fixture::new(&gradient(8, 8), OutputTransform::Normal);
        let pipeline = fx.pipeline("kawase");
        assert_eq!(fx.config.subscriber_count(), 3);
        drop(pipeline);
        assert_eq!(fx.config.subscriber_count(), 0);
        fx.config.set_int("kawase_degrade", 3).unwrap();
        assert_eq!(fx.invalidations.get(), 0);
    }

    #[test]
    fn test_unknown_algorithm_uses_kawase_options() {
        let fx = Fixture::new(&gradient(8, 8), OutputTransform::Normal);
        let pipeline = fx.pipeline("foo");
        assert_eq!(pipeline.algorithm(), AlgorithmKind::Kawase);
        assert_eq!(fx.config.get_float("kawase_offset"), Some(2.0));
    }

    #[test]
    fn test_destroy_releases_buffers() {
        let mut fx = Fixture::new(&gradient(16, 16), OutputTransform::Normal);
        let mut pipeline = fx.pipeline("kawase");
        let window = Geometry::new(0, 0, 16, 16);
        pipeline
            .pre_render(&mut fx.backend, window, &Region::from(window), &fx.target)
            .unwrap();
        assert_eq!(fx.backend.live_surfaces(), 3);

        pipeline.destroy(&mut fx.backend);
        pipeline.destroy(&mut fx.backend);
        assert_eq!(fx.backend.live_surfaces(), 1);
        assert!(pipeline.output().is_none());
    }

    #[test]
    fn test_render_before_pre_render_draws_nothing() {
        let mut fx = Fixture::new(&gradient(8, 8), OutputTransform::Normal);
        let pipeline = fx.pipeline("box");
        let window = fx.backend.create_surface(8, 8).unwrap();
        fx.backend.clear_operations();
        let view = Geometry::new(0, 0, 8, 8);
        pipeline
            .render(&mut fx.backend, window, view, view, &fx.target)
            .unwrap();
        assert!(fx.backend.operations().is_empty());
    }

    #[test]
    fn test_full_frame_on_rotated_target() {
        let input = PixelBuffer::filled(20, 30, [10, 200, 30, 255]);
        let mut fx = Fixture::new(&input, OutputTransform::Rotate90);
        let mut pipeline = fx.pipeline("kawase");

        // Logical 30x20 view covering the whole rotated output.
        let view = Geometry::new(0, 0, 30, 20);
        pipeline
            .pre_render(&mut fx.backend, view, &Region::from(view), &fx.target)
            .unwrap();
        assert_eq!(
            fx.backend.surface_size(pipeline.output().unwrap()),
            Some((20, 30))
        );

        let window = fx.backend.create_surface(30, 20).unwrap();
        pipeline
            .render(&mut fx.backend, window, view, view, &fx.target)
            .unwrap();
        let out = fx.backend.read_pixels(fx.target.surface).unwrap();
        assert_eq!(out, input);
        pipeline.destroy(&mut fx.backend);
    }
}
