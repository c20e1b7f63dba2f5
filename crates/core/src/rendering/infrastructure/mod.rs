pub mod backend_factory;
pub mod cpu_backend;
mod cpu_kernels;
pub mod gpu_backend;
pub mod gpu_context;
