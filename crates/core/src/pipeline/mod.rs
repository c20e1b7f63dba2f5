pub mod blend_stage;
pub mod blur_pipeline;
pub mod composite_image_use_case;
pub mod target_framebuffer;
