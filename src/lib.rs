pub mod commands;
pub mod config;
pub mod consts;
pub mod database;
pub mod error;
pub mod filters;
pub mod iterate;
pub mod logging;
pub mod progress;
pub mod record;

pub use error::{Error, Result};
