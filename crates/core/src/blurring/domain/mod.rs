pub mod blur_algorithm;
pub mod blur_options;
