pub mod algorithm_factory;
pub mod bokeh_blur;
pub mod box_blur;
pub mod gaussian_blur;
pub mod kawase_blur;
