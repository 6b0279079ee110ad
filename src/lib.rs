pub mod api;
pub mod config;
pub mod dataset;
pub mod error;
pub mod interpolation;
pub mod measure;
pub mod platform;
pub mod probe;
pub mod record;
pub mod state;
