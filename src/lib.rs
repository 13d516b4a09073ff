pub mod config;
pub mod constants;
pub mod contracts;
pub mod error;
pub mod export;
pub mod filter;
pub mod logging;
pub mod parser;
pub mod pipeline;
pub mod session;
pub mod stats;
pub mod types;

// Ports for the external collaborators and their concrete adapters
pub mod app;
pub mod infra;
