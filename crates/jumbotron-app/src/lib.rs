//! Jumbotron Display Application
//!
//! The display client: a window showing one region of a shared image,
//! driven by a coordinating server and by local pan and zoom gestures.

mod app;
pub mod bridge;
pub mod config;
pub mod loader;
mod present;

pub use app::App;
pub use config::DisplayConfig;
pub use loader::{ImageLoader, LoadError};
