pub mod config;
pub mod dataset;
pub mod input;
pub mod net;
pub mod render;
