//! Helpers shared by the unit tests: logger setup, unique ensemble names,
//! a recording action subscriber and an async poller.
mod common;
mod recording;

pub use common::*;
pub use recording::*;
