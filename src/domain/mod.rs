pub mod color;
pub mod errors;
pub mod gate;
pub mod overlay;
pub mod prediction;
pub mod thresholds;
pub mod upload;
