//! Jumbotron Render Library
//!
//! Turns fetched image bytes into GPU-ready image data and places that image
//! on the display surface according to the current viewport.
//! The default implementation builds a Vello scene.

mod decode;

#[cfg(feature = "vello-renderer")]
mod vello_impl;

pub use decode::{RenderError, decode_image};

#[cfg(feature = "vello-renderer")]
pub use vello_impl::VelloSink;
