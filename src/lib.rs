pub mod backends;
pub mod broker;
pub mod config_loader;
pub mod engine;
pub mod error;
pub mod router;
