pub mod cache;
pub mod config;
pub mod error;
pub mod geometry;
pub mod pdf;
pub mod pipeline;
pub mod transparency;
