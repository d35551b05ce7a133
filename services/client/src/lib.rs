//! EDA Client Library Crate
//!
//! Turns a one-shot file upload into a long-lived, incrementally updating
//! analysis session: configuration, the HTTP backend, stream decoding, the
//! session controller and its terminal presentation. The `eda` binary is a
//! thin wrapper around this library.

pub mod backend;
pub mod config;
pub mod controller;
pub mod render;
pub mod stream;

pub use controller::{ControllerClosed, SessionController, SessionHandle, Submission};
