//! Storage module for wallet registry persistence

pub mod persistence;

pub use persistence::{DeploymentRecord, RegistryLock, Storage, StorageConfig, StorageError};
