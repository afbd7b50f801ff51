//! A terminal research assistant that answers questions with the help of
//! web search.
//!
//! The crate includes a CLI tool for using in the terminal. And you can also
//! use it as a library to bring the assistant into your own host apps.

#![deny(missing_docs)]

#[macro_use]
extern crate tracing;

pub mod config;
mod session;
#[cfg(feature = "cli")]
pub mod shell;
pub mod tools;

pub use config::{Config, ConfigError};
pub use session::{Session, SessionBuilder};

/// Re-exports of [`scout_core`] crate.
pub mod core {
    pub use scout_core::*;
}
