//! Subcommand implementations.

pub mod account;
pub mod config;
pub mod entitlement;
pub mod explain;
pub mod forms;
pub mod helpers;
pub mod request;
pub mod snapshot;

pub use account::AccountCommand;
pub use config::ConfigCommand;
pub use entitlement::EntitlementCommand;
pub use request::RequestCommand;
pub use snapshot::SnapshotCommand;
