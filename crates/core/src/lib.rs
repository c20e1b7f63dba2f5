pub mod blurring;
pub mod io;
pub mod pipeline;
pub mod rendering;
pub mod shared;
