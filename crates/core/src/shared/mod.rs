pub mod constants;
pub mod geometry;
pub mod pixel_buffer;
pub mod region;
