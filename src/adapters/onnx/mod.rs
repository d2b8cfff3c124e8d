pub mod engine;
pub mod model_catalog;
pub mod models;
