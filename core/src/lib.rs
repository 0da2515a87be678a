pub mod aggregate;
pub mod clock;
pub mod db;
pub mod error;
pub mod food_api;
pub mod models;
pub mod service;
pub mod settings;

pub use error::{LedgerError, Result};
pub use service::Tracker;
