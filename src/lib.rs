//! Client-side facade over a ZooKeeper-shaped coordination service.
//!
//! - [`SessionRegistry`] - one reference-counted session per
//!   `(server, credential)`
//! - [`ZkClient`] - typed path operations and deduplicated watch caches
//! - [`ActionMonitor`] - observation hook fed by every completed operation
//! - [`ZkFacade`] - resolves the environment and hands out handles

mod cache;
mod client;
mod config;
pub mod constants;
mod env;
mod errors;
mod monitor;
pub mod path;
mod serializer;
pub mod session;
mod utils;

pub use cache::*;
pub use client::*;
pub use config::*;
pub use env::*;
pub use errors::*;
pub use monitor::*;
pub use serializer::*;
pub use session::*;


//-----------------------------------------------------------
// Test utils

#[cfg(test)]
pub(crate) mod test_utils;
