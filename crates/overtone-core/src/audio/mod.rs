//! Audio output backend
//!
//! Streams the engine to the default output device via CPAL. The stream
//! callback owns the [`Engine`](crate::engine::Engine) outright; the
//! returned [`EngineController`](crate::controller::EngineController) is
//! the only way anything else talks to it.

mod cpal_backend;
mod error;

pub use cpal_backend::*;
pub use error::*;
