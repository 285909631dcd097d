pub mod client;
pub mod config;
pub mod errors;
pub mod models;
pub mod pipeline;
pub mod sources;
pub mod transform;
