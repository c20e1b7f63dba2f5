use std::fmt;
use std::str::FromStr;

use crate::rendering::domain::render_backend::{RenderBackend, RenderError};

use super::cpu_backend::CpuBackend;
use super::gpu_backend::GpuBackend;
use super::gpu_context::GpuContext;

/// Which backend to render with.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum BackendPreference {
    /// GPU when an adapter is available, CPU otherwise.
    #[default]
    Auto,
    Cpu,
    Gpu,
}

impl fmt::Display for BackendPreference {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            BackendPreference::Auto => "auto",
            BackendPreference::Cpu => "cpu",
            BackendPreference::Gpu => "gpu",
        })
    }
}

impl FromStr for BackendPreference {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "auto" => Ok(BackendPreference::Auto),
            "cpu" => Ok(BackendPreference::Cpu),
            "gpu" => Ok(BackendPreference::Gpu),
            other => Err(format!("unknown backend '{other}' (expected auto, cpu or gpu)")),
        }
    }
}

/// Creates a render backend according to `preference`.
///
/// `Auto` probes for a wgpu adapter and falls back to the software backend
/// when none is found. `Gpu` fails with [`RenderError::NoAdapter`] instead.
/// Logs which backend is selected.
pub fn create_backend(preference: BackendPreference) -> Result<Box<dyn RenderBackend>, RenderError> {
    match preference {
        BackendPreference::Cpu => {
            log::info!("Using CPU render backend");
            Ok(Box::new(CpuBackend::new()))
        }
        BackendPreference::Gpu => {
            let backend = GpuBackend::probe()?;
            log::info!("Using GPU render backend");
            Ok(Box::new(backend))
        }
        BackendPreference::Auto => match GpuBackend::probe() {
            Ok(backend) => {
                log::info!("Using GPU render backend");
                Ok(Box::new(backend))
            }
            Err(_) => {
                log::info!("No GPU available, using CPU render backend");
                Ok(Box::new(CpuBackend::new()))
            }
        },
    }
}

/// Returns true if a GPU adapter is available for compute shaders.
pub fn gpu_available() -> bool {
    GpuContext::new().is_some()
}
