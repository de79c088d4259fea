pub mod check;
pub mod config;
pub mod plan;
pub mod render;
