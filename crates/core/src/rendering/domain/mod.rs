pub mod coordinate_mapper;
pub mod framebuffer;
pub mod output_transform;
pub mod render_backend;
pub mod render_context;
