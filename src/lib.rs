pub mod catalog;
pub mod config;
pub mod error;
pub mod http;
pub mod mappings;
pub mod ratings;

pub use config::Settings;
pub use error::{CatalogError, Result};
