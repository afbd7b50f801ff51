//! Provider-neutral protocol between the agent and language models.
//!
//! The agent only speaks the types defined here: requests made of
//! messages and tool descriptors, and responses delivered as a pull-based
//! stream of events. Each model service gets its own crate implementing
//! [`ModelProvider`], so the agent loop never learns which service it is
//! talking to, nor whether the service streams.
//!
//! Nothing in this crate performs I/O.

#![deny(missing_docs)]

mod error;
mod provider;
mod request;
mod response;

pub use error::*;
pub use provider::*;
pub use request::*;
pub use response::*;
