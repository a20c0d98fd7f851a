pub mod config;
pub mod data;
pub mod errors;
pub mod monitoring;
pub mod pipeline;
pub mod revenue;
pub mod scoring;
