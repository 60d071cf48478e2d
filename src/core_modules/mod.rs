pub mod diff_engine;
pub mod frame_pair;
pub mod grid_aggregator;
pub mod motion_matrix;
pub mod pixel;
pub mod pixel_buffer;
pub mod utils;
