use std::path::Path;
use std::rc::Rc;

use serde::Serialize;

use crate::blurring::domain::blur_algorithm::AlgorithmKind;
use crate::blurring::domain::blur_options::{BlurConfig, BlurParameters};
use crate::io::image_file_reader::ImageFileReader;
use crate::io::image_file_writer::ImageFileWriter;
use crate::rendering::domain::coordinate_mapper::TargetLayout;
use crate::rendering::domain::output_transform::OutputTransform;
use crate::rendering::domain::render_backend::{RenderBackend, RenderError, SurfaceId};
use crate::shared::geometry::Geometry;
use crate::shared::pixel_buffer::PixelBuffer;
use crate::shared::region::Region;

use super::blur_pipeline::{BlurPipeline, FrameStats};
use super::target_framebuffer::TargetFramebuffer;

/// Where the window sits on the output.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Placement {
    /// Window origin in logical output coordinates.
    pub x: i32,
    pub y: i32,
    /// Output scale; the window image is `scale` pixels per logical unit.
    pub scale: f64,
    /// Transform of the backdrop buffer relative to the logical output.
    pub transform: OutputTransform,
}

impl Default for Placement {
    fn default() -> Self {
        Self {
            x: 0,
            y: 0,
            scale: 1.0,
            transform: OutputTransform::Normal,
        }
    }
}

/// Summary of one composite, suitable for JSON output.
#[derive(Clone, Debug, Serialize)]
pub struct CompositeReport {
    pub backend: &'static str,
    pub algorithm: &'static str,
    pub parameters: BlurParameters,
    pub blur_radius: i32,
    pub output_geometry: Geometry,
    pub window_box: Geometry,
    pub frame: Option<FrameStats>,
}

/// Single-frame compositing: read → upload → pre-render → blend → write.
///
/// The backdrop image plays the role of the output's framebuffer and the
/// window image is composited over its blurred copy.
pub struct CompositeImageUseCase {
    backend: Box<dyn RenderBackend>,
    pipeline: BlurPipeline,
    reader: ImageFileReader,
    writer: ImageFileWriter,
}

impl CompositeImageUseCase {
    /// Builds the pipeline for `algorithm`, registering its option keys in
    /// `config`. Options can be adjusted through `config` until `execute`.
    pub fn new(backend: Box<dyn RenderBackend>, config: Rc<BlurConfig>, algorithm: &str) -> Self {
        let pipeline = BlurPipeline::new(
            config,
            algorithm,
            Rc::new(|| log::debug!("Blur options changed; next frame is fully damaged")),
        );
        Self {
            backend,
            pipeline,
            reader: ImageFileReader::new(),
            writer: ImageFileWriter::new(),
        }
    }

    pub fn algorithm(&self) -> AlgorithmKind {
        self.pipeline.algorithm()
    }

    pub fn execute(
        &mut self,
        backdrop_path: &Path,
        window_path: &Path,
        output_path: &Path,
        placement: Placement,
    ) -> Result<CompositeReport, Box<dyn std::error::Error>> {
        let backdrop = self.reader.read(backdrop_path)?;
        let window = self.reader.read(window_path)?;

        let (output, report) = self.composite(&backdrop, &window, placement)?;
        self.writer.write(output_path, &output)?;
        Ok(report)
    }

    /// Composites `window` over the blurred `backdrop` and returns the new
    /// backdrop pixels.
    pub fn composite(
        &mut self,
        backdrop: &PixelBuffer,
        window: &PixelBuffer,
        placement: Placement,
    ) -> Result<(PixelBuffer, CompositeReport), RenderError> {
        let layout = output_layout(backdrop, placement);
        if layout.pixel_size() != (backdrop.width(), backdrop.height()) {
            log::warn!(
                "Backdrop {}x{} does not divide evenly by scale {}; edges are clipped",
                backdrop.width(),
                backdrop.height(),
                placement.scale
            );
        }
        let window_box = Geometry::new(
            placement.x,
            placement.y,
            logical_edge(window.width(), placement.scale),
            logical_edge(window.height(), placement.scale),
        );

        let target_surface = self.upload(backdrop)?;
        let window_surface = match self.upload(window) {
            Ok(id) => id,
            Err(e) => {
                self.backend.destroy_surface(target_surface);
                return Err(e);
            }
        };
        let target = TargetFramebuffer::new(target_surface, layout);

        let result = self.draw_frame(&target, window_surface, window_box);

        self.backend.destroy_surface(window_surface);
        self.backend.destroy_surface(target_surface);
        let output = result?;

        let report = CompositeReport {
            backend: self.backend.name(),
            algorithm: self.pipeline.algorithm().name(),
            parameters: self.pipeline.parameters(),
            blur_radius: self.pipeline.blur_radius(),
            output_geometry: layout.geometry(),
            window_box,
            frame: self.pipeline.last_frame().copied(),
        };
        log::info!(
            "Composited {}x{} window at ({}, {}) with {} on {}",
            window.width(),
            window.height(),
            placement.x,
            placement.y,
            report.algorithm,
            report.backend
        );
        Ok((output, report))
    }

    fn upload(&mut self, pixels: &PixelBuffer) -> Result<SurfaceId, RenderError> {
        let id = self.backend.create_surface(pixels.width(), pixels.height())?;
        if let Err(e) = self.backend.upload(id, pixels) {
            self.backend.destroy_surface(id);
            return Err(e);
        }
        Ok(id)
    }

    fn draw_frame(
        &mut self,
        target: &TargetFramebuffer,
        window: SurfaceId,
        window_box: Geometry,
    ) -> Result<PixelBuffer, RenderError> {
        // Blurred pixels near the window edge depend on pixels up to the
        // blur radius away.
        let damage = Region::from(window_box).expand_edges(self.pipeline.blur_radius());
        let backend = self.backend.as_mut();

        self.pipeline.pre_render(backend, window_box, &damage, target)?;
        self.pipeline
            .render(backend, window, window_box, window_box, target)?;
        backend.read_pixels(target.surface)
    }
}

impl Drop for CompositeImageUseCase {
    fn drop(&mut self) {
        self.pipeline.destroy(self.backend.as_mut());
    }
}

/// Logical output covering the whole backdrop buffer.
fn output_layout(backdrop: &PixelBuffer, placement: Placement) -> TargetLayout {
    let (w, h) = placement
        .transform
        .transformed_size(backdrop.width() as f64, backdrop.height() as f64);
    TargetLayout::new(
        Geometry::new(
            0,
            0,
            logical_edge(w as u32, placement.scale),
            logical_edge(h as u32, placement.scale),
        ),
        placement.scale,
        placement.transform,
    )
}

fn logical_edge(pixels: u32, scale: f64) -> i32 {
    ((pixels as f64 / scale).round() as i32).max(1)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::rendering::infrastructure::cpu_backend::CpuBackend;

    const GREY: [u8; 4] = [90, 90, 90, 255];
    const RED: [u8; 4] = [255, 0, 0, 255];

    fn use_case(algorithm: &str) -> (CompositeImageUseCase, Rc<BlurConfig>) {
        let config = Rc::new(BlurConfig::new());
        let uc = CompositeImageUseCase::new(Box::new(CpuBackend::new()), Rc::clone(&config), algorithm);
        (uc, config)
    }

    fn stripes(width: u32, height: u32) -> PixelBuffer {
        let mut buf = PixelBuffer::zeroed(width, height);
        for y in 0..height {
            for x in 0..width {
                let v = if x % 2 == 0 { 255 } else { 0 };
                buf.set_pixel(x, y, [v, v, v, 255]);
            }
        }
        buf
    }

    fn placement(x: i32, y: i32) -> Placement {
        Placement {
            x,
            y,
            ..Placement::default()
        }
    }

    #[test]
    fn test_transparent_window_over_flat_backdrop_is_unchanged() {
        let (mut uc, _config) = use_case("kawase");
        let backdrop = PixelBuffer::filled(24, 24, GREY);
        let window = PixelBuffer::zeroed(8, 8);

        let (out, report) = uc.composite(&backdrop, &window, placement(8, 8)).unwrap();
        assert_eq!(out, backdrop);
        assert_eq!(report.window_box, Geometry::new(8, 8, 8, 8));
        assert_eq!(report.backend, "cpu");
    }

    #[test]
    fn test_opaque_window_covers_its_box_only() {
        let (mut uc, _config) = use_case("box");
        let backdrop = stripes(24, 24);
        let window = PixelBuffer::filled(8, 8, RED);

        let (out, _) = uc.composite(&backdrop, &window, placement(4, 4)).unwrap();
        assert_eq!(out.pixel(4, 4), RED);
        assert_eq!(out.pixel(11, 11), RED);
        assert_eq!(out.pixel(12, 12), backdrop.pixel(12, 12));
        assert_eq!(out.pixel(0, 0), backdrop.pixel(0, 0));
    }

    #[test]
    fn test_transparent_window_shows_blurred_backdrop() {
        let (mut uc, _config) = use_case("gaussian");
        let backdrop = stripes(24, 24);
        let window = PixelBuffer::zeroed(8, 8);

        let (out, report) = uc.composite(&backdrop, &window, placement(8, 8)).unwrap();
        let inside = out.pixel(12, 12);
        assert!(inside[0] > 0 && inside[0] < 255, "{inside:?}");
        assert_eq!(out.pixel(2, 2), backdrop.pixel(2, 2));
        // Damage grows by the blur radius around the window.
        let frame = report.frame.unwrap();
        let r = report.blur_radius;
        assert_eq!(frame.capture_box, Geometry::new(8 - r, 8 - r, 8 + 2 * r, 8 + 2 * r));
    }

    #[test]
    fn test_options_set_after_construction_apply() {
        let (mut uc, config) = use_case("kawase");
        config.apply_str("kawase_iterations", "0").unwrap();
        let backdrop = stripes(16, 16);
        let window = PixelBuffer::zeroed(16, 16);

        let (out, report) = uc.composite(&backdrop, &window, placement(0, 0)).unwrap();
        assert_eq!(report.parameters.iterations, 0);
        assert_eq!(out, backdrop);
    }

    #[test]
    fn test_scaled_output_places_window_in_pixels() {
        let (mut uc, _config) = use_case("box");
        let backdrop = PixelBuffer::filled(32, 32, GREY);
        let window = PixelBuffer::filled(8, 8, RED);
        let place = Placement {
            x: 4,
            y: 4,
            scale: 2.0,
            ..Placement::default()
        };

        let (out, report) = uc.composite(&backdrop, &window, place).unwrap();
        assert_eq!(report.output_geometry, Geometry::new(0, 0, 16, 16));
        assert_eq!(report.window_box, Geometry::new(4, 4, 4, 4));
        assert_eq!(out.pixel(8, 8), RED);
        assert_eq!(out.pixel(15, 15), RED);
        assert_eq!(out.pixel(16, 16), GREY);
    }

    #[test]
    fn test_execute_reads_and_writes_files() {
        let dir = tempfile::tempdir().unwrap();
        let backdrop_path = dir.path().join("backdrop.png");
        let window_path = dir.path().join("window.png");
        let output_path = dir.path().join("out").join("result.png");
        image::RgbaImage::from_pixel(20, 10, image::Rgba(GREY))
            .save(&backdrop_path)
            .unwrap();
        image::RgbaImage::from_pixel(4, 4, image::Rgba(RED))
            .save(&window_path)
            .unwrap();

        let (mut uc, _config) = use_case("bokeh");
        let report = uc
            .execute(&backdrop_path, &window_path, &output_path, placement(2, 2))
            .unwrap();

        assert_eq!(report.algorithm, "bokeh");
        let img = image::open(&output_path).unwrap().to_rgba8();
        assert_eq!(img.dimensions(), (20, 10));
        assert_eq!(img.get_pixel(3, 3).0, RED);
        assert_eq!(img.get_pixel(15, 8).0, GREY);
    }

    #[test]
    fn test_execute_missing_input_fails() {
        let dir = tempfile::tempdir().unwrap();
        let (mut uc, _config) = use_case("box");
        let result = uc.execute(
            &dir.path().join("missing.png"),
            &dir.path().join("missing-too.png"),
            &dir.path().join("out.png"),
            Placement::default(),
        );
        assert!(result.is_err());
    }
}
