//! Environment resolution.
//!
//! Picks the environment label, server list and credential a default
//! handle connects with. Process-wide properties win over property files:
//!
//! | Source (highest first)              | Key                        |
//! |-------------------------------------|----------------------------|
//! | process property                    | `zookeeper.env`            |
//! | `zookeeper.properties`              | `zookeeper.env`            |
//! | process property                    | `${ENV}.zookeeper.server`  |
//! | `zookeeper.properties`              | `${ENV}.zookeeper.server`  |
//! | `zookeeper_servers.properties`      | `${ENV}.zookeeper.server`  |
//! | process property                    | `${ENV}.zookeeper.auth`    |
//! | `zookeeper.properties`              | `${ENV}.zookeeper.auth`    |

mod properties;
mod setting;
pub use properties::*;
pub use setting::*;

#[cfg(test)]
mod env_test;
