//! Handles and the facade that hands them out.
//!
//! - [`ZkFacade`] - resolves environment settings and opens handles
//! - [`ZkClient`] - path operations, watch caches and action emission over
//!   one shared session
//!
//! # Basic Usage
//! ```no_run
//! use std::sync::Arc;
//!
//! use zk_facade::session::memory::MemorySessionFactory;
//! use zk_facade::SessionRegistry;
//! use zk_facade::StringSerializer;
//! use zk_facade::ZkFacade;
//!
//! #[tokio::main(flavor = "current_thread")]
//! async fn main() -> zk_facade::Result<()> {
//!     // Once per process. Swap in the factory of a real service client.
//!     SessionRegistry::install_global_factory(Arc::new(MemorySessionFactory))?;
//!
//!     let client = ZkFacade::global()?.client_for_server("zk1:2181", None)?;
//!
//!     client
//!         .create_persistent_or_set_data("app/config", &"v1".to_string(), &StringSerializer)
//!         .await?;
//!     let value: String = client.get("app/config", &StringSerializer).await?;
//!     println!("config: {value}");
//!
//!     client.close()
//! }
//! ```

mod facade;
mod handle;

pub use facade::*;
pub use handle::*;

#[cfg(test)]
mod facade_test;
