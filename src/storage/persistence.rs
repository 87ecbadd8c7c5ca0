//! Wallet registry persistence
//!
//! Saves the multisig registry as JSON with atomic replace and rotating
//! backups, and records where the last deployed wallet lives.

use crate::multisig::{Address, MultisigManager};
use chrono::{DateTime, Utc};
use fs2::FileExt;
use serde::{Deserialize, Serialize};
use std::fs;
use std::io::{self, BufReader, BufWriter, Write};
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Storage errors
#[derive(Error, Debug)]
pub enum StorageError {
    #[error("IO error: {0}")]
    IoError(#[from] io::Error),
    #[error("Serialization error: {0}")]
    SerializationError(#[from] serde_json::Error),
    #[error("Invalid data: {0}")]
    InvalidData(String),
    #[error("Registry is locked by another process: {0:?}")]
    Locked(PathBuf),
}

/// Storage configuration
#[derive(Debug, Clone)]
pub struct StorageConfig {
    pub data_dir: PathBuf,
    /// Registry file name inside `data_dir`
    pub registry_file: String,
    /// Deployment record file name inside `data_dir`
    pub deployment_file: String,
    pub backup_enabled: bool,
    pub max_backups: usize,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            data_dir: PathBuf::from(".multisig_data"),
            registry_file: "wallets.json".to_string(),
            deployment_file: "deployment.json".to_string(),
            backup_enabled: true,
            max_backups: 5,
        }
    }
}

/// Where a deployed wallet lives, for consumption by other tools
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct DeploymentRecord {
    /// Address of the deployed wallet
    pub contract_address: Address,
    /// Address that performed the deployment
    pub owner_address: Address,
    pub deployed_at: DateTime<Utc>,
}

impl DeploymentRecord {
    pub fn new(contract_address: Address, owner_address: Address) -> Self {
        Self {
            contract_address,
            owner_address,
            deployed_at: Utc::now(),
        }
    }
}

/// Exclusive hold on a registry directory, released on drop
#[derive(Debug)]
pub struct RegistryLock {
    _file: fs::File,
    path: PathBuf,
}

impl RegistryLock {
    pub fn path(&self) -> &Path {
        &self.path
    }
}

/// Registry storage manager
pub struct Storage {
    config: StorageConfig,
}

impl Storage {
    /// Create a new storage manager
    pub fn new(config: StorageConfig) -> Result<Self, StorageError> {
        fs::create_dir_all(&config.data_dir)?;
        Ok(Self { config })
    }

    /// Create with default configuration
    pub fn with_defaults() -> Result<Self, StorageError> {
        Self::new(StorageConfig::default())
    }

    pub fn data_dir(&self) -> &Path {
        &self.config.data_dir
    }

    fn registry_path(&self) -> PathBuf {
        self.config.data_dir.join(&self.config.registry_file)
    }

    fn deployment_path(&self) -> PathBuf {
        self.config.data_dir.join(&self.config.deployment_file)
    }

    fn lock_path(&self) -> PathBuf {
        self.config
            .data_dir
            .join(format!("{}.lock", self.config.registry_file))
    }

    fn backup_path(&self, index: usize) -> PathBuf {
        self.config
            .data_dir
            .join(format!("{}.backup.{}", self.config.registry_file, index))
    }

    /// Save the registry to disk
    pub fn save(&self, manager: &MultisigManager) -> Result<(), StorageError> {
        let path = self.registry_path();

        if self.config.backup_enabled && self.config.max_backups > 0 && path.exists() {
            self.rotate_backups()?;
            fs::copy(&path, self.backup_path(0))?;
        }

        // Write to a temporary file, then rename over the old one
        let temp_path = self
            .config
            .data_dir
            .join(format!("{}.tmp", self.config.registry_file));
        write_json(&temp_path, manager)?;
        fs::rename(&temp_path, &path)?;

        log::debug!("Saved {} wallet(s) to {:?}", manager.wallet_count(), path);
        Ok(())
    }

    /// Load the registry from disk
    pub fn load(&self) -> Result<MultisigManager, StorageError> {
        let path = self.registry_path();

        if !path.exists() {
            return Err(StorageError::InvalidData(
                "Wallet registry not found".to_string(),
            ));
        }

        read_registry(&path)
    }

    /// Take the registry lock without waiting
    ///
    /// Whoever loads, mutates and saves the registry must hold this for the
    /// whole sequence.
    pub fn lock(&self) -> Result<RegistryLock, StorageError> {
        let path = self.lock_path();
        let file = fs::OpenOptions::new()
            .create(true)
            .truncate(false)
            .write(true)
            .open(&path)?;

        match file.try_lock_exclusive() {
            Ok(()) => {
                log::debug!("Acquired registry lock {:?}", path);
                Ok(RegistryLock { _file: file, path })
            }
            Err(e) if e.kind() == fs2::lock_contended_error().kind() => {
                Err(StorageError::Locked(path))
            }
            Err(e) => Err(e.into()),
        }
    }

    /// Load the registry, or start an empty one if none was saved yet
    pub fn load_or_default(&self) -> Result<MultisigManager, StorageError> {
        if self.exists() {
            self.load()
        } else {
            Ok(MultisigManager::new())
        }
    }

    /// Check if a saved registry exists
    pub fn exists(&self) -> bool {
        self.registry_path().exists()
    }

    /// Delete the saved registry
    pub fn delete(&self) -> Result<(), StorageError> {
        let path = self.registry_path();
        if path.exists() {
            fs::remove_file(path)?;
        }
        Ok(())
    }

    /// Record the address of a newly deployed wallet
    pub fn save_deployment(&self, record: &DeploymentRecord) -> Result<(), StorageError> {
        let path = self.deployment_path();
        write_json(&path, record)?;
        log::info!("Deployment record written to {:?}", path);
        Ok(())
    }

    /// Read the last deployment record, if any
    pub fn load_deployment(&self) -> Result<Option<DeploymentRecord>, StorageError> {
        let path = self.deployment_path();
        if !path.exists() {
            return Ok(None);
        }
        read_json(&path).map(Some)
    }

    fn rotate_backups(&self) -> Result<(), StorageError> {
        // Delete oldest backup
        let oldest = self.backup_path(self.config.max_backups - 1);
        if oldest.exists() {
            fs::remove_file(&oldest)?;
        }

        // Shift existing backups
        for i in (0..self.config.max_backups - 1).rev() {
            let current = self.backup_path(i);
            if current.exists() {
                fs::rename(&current, self.backup_path(i + 1))?;
            }
        }

        Ok(())
    }

    /// Restore the registry from a backup
    pub fn restore_backup(&self, backup_index: usize) -> Result<MultisigManager, StorageError> {
        let backup_path = self.backup_path(backup_index);

        if !backup_path.exists() {
            return Err(StorageError::InvalidData(format!(
                "Backup {} not found",
                backup_index
            )));
        }

        read_registry(&backup_path)
    }

    /// List available backups
    pub fn list_backups(&self) -> Vec<usize> {
        (0..self.config.max_backups)
            .filter(|&i| self.backup_path(i).exists())
            .collect()
    }
}

/// Write and flush to disk; nothing is reported as saved before `sync_all`
fn write_json<T: Serialize>(path: &Path, value: &T) -> Result<(), StorageError> {
    let file = fs::File::create(path)?;
    let mut writer = BufWriter::new(file);
    serde_json::to_writer_pretty(&mut writer, value)?;
    writer.flush()?;
    writer
        .into_inner()
        .map_err(io::IntoInnerError::into_error)?
        .sync_all()?;
    Ok(())
}

/// Read a registry and check it before anyone can act on it
fn read_registry(path: &Path) -> Result<MultisigManager, StorageError> {
    let manager: MultisigManager = read_json(path)?;
    manager
        .validate()
        .map_err(|e| StorageError::InvalidData(format!("{:?}: {}", path, e)))?;
    Ok(manager)
}

fn read_json<T: for<'de> Deserialize<'de>>(path: &Path) -> Result<T, StorageError> {
    let file = fs::File::open(path)?;
    let reader = BufReader::new(file);
    Ok(serde_json::from_reader(reader)?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::multisig::WalletConfig;

    fn storage_in(dir: &Path, max_backups: usize) -> Storage {
        let config = StorageConfig {
            data_dir: dir.to_path_buf(),
            max_backups,
            ..Default::default()
        };
        Storage::new(config).unwrap()
    }

    fn populated_manager() -> (MultisigManager, Address, Vec<Address>) {
        let owners: Vec<Address> = (0..3)
            .map(|i| Address::derive(format!("owner-{}", i).as_bytes()))
            .collect();
        let mut manager = MultisigManager::new();
        let wallet = manager
            .deploy(
                &owners[0],
                WalletConfig::new(owners.clone(), 2, Some("Ops".to_string())).unwrap(),
            )
            .unwrap();
        manager.deposit(&wallet, &owners[2], 1_000).unwrap();
        manager
            .propose(&wallet, &owners[0], Address::derive(b"to"), 10, vec![1, 2, 3])
            .unwrap();
        manager.confirm(&wallet, &owners[1], 0).unwrap();
        (manager, wallet, owners)
    }

    #[test]
    fn test_save_load_registry() {
        let temp_dir = tempfile::tempdir().unwrap();
        let storage = storage_in(temp_dir.path(), 5);
        let (manager, wallet, owners) = populated_manager();

        assert!(!storage.exists());
        storage.save(&manager).unwrap();
        assert!(storage.exists());

        let loaded = storage.load().unwrap();
        let w = loaded.wallet(&wallet).unwrap();
        assert_eq!(w.description(), "2-of-3");
        assert_eq!(w.config().label.as_deref(), Some("Ops"));
        assert!(w.is_confirmed(0, &owners[1]));
        assert_eq!(w.transaction(0).unwrap().data, vec![1, 2, 3]);
        assert_eq!(loaded.balance(&wallet), 1_000);
    }

    #[test]
    fn test_load_or_default() {
        let temp_dir = tempfile::tempdir().unwrap();
        let storage = storage_in(temp_dir.path(), 5);

        assert!(storage.load().is_err());
        assert_eq!(storage.load_or_default().unwrap().wallet_count(), 0);
    }

    #[test]
    fn test_backup_rotation() {
        let temp_dir = tempfile::tempdir().unwrap();
        let storage = storage_in(temp_dir.path(), 3);
        let (mut manager, wallet, owners) = populated_manager();

        for _ in 0..5 {
            storage.save(&manager).unwrap();
            manager.deposit(&wallet, &owners[0], 1).unwrap();
        }

        assert_eq!(storage.list_backups(), vec![0, 1, 2]);

        // Newest backup is the state before the last save
        let restored = storage.restore_backup(0).unwrap();
        assert_eq!(restored.balance(&wallet), 1_003);
        assert!(storage.restore_backup(7).is_err());
    }

    #[test]
    fn test_backups_disabled() {
        let temp_dir = tempfile::tempdir().unwrap();
        let storage = storage_in(temp_dir.path(), 0);
        let (manager, _, _) = populated_manager();

        storage.save(&manager).unwrap();
        storage.save(&manager).unwrap();
        assert!(storage.list_backups().is_empty());
    }

    #[test]
    fn test_corrupt_registry_rejected() {
        let temp_dir = tempfile::tempdir().unwrap();
        let storage = storage_in(temp_dir.path(), 5);
        fs::write(temp_dir.path().join("wallets.json"), "{not json").unwrap();

        assert!(matches!(
            storage.load(),
            Err(StorageError::SerializationError(_))
        ));
    }

    fn rewrite_registry(dir: &Path, edit: impl FnOnce(&mut serde_json::Value)) {
        let path = dir.join("wallets.json");
        let mut json: serde_json::Value =
            serde_json::from_str(&fs::read_to_string(&path).unwrap()).unwrap();
        edit(&mut json);
        fs::write(&path, serde_json::to_string_pretty(&json).unwrap()).unwrap();
    }

    #[test]
    fn test_duplicate_confirmation_rejected_on_load() {
        let temp_dir = tempfile::tempdir().unwrap();
        let storage = storage_in(temp_dir.path(), 5);
        let (manager, wallet, _) = populated_manager();
        storage.save(&manager).unwrap();

        rewrite_registry(temp_dir.path(), |json| {
            let confirmations = json["wallets"][wallet.to_string()]["transactions"][0]
                ["confirmations"]
                .as_array_mut()
                .unwrap();
            let first = confirmations[0].clone();
            confirmations.push(first);
        });

        assert!(matches!(storage.load(), Err(StorageError::InvalidData(_))));
        assert!(storage.load_or_default().is_err());
    }

    #[test]
    fn test_non_owner_confirmation_rejected_on_load() {
        let temp_dir = tempfile::tempdir().unwrap();
        let storage = storage_in(temp_dir.path(), 5);
        let (manager, wallet, _) = populated_manager();
        storage.save(&manager).unwrap();

        rewrite_registry(temp_dir.path(), |json| {
            json["wallets"][wallet.to_string()]["transactions"][0]["confirmations"][0]["owner"] =
                serde_json::Value::String(Address::derive(b"intruder").to_string());
        });

        assert!(matches!(storage.load(), Err(StorageError::InvalidData(_))));
    }

    #[test]
    fn test_failed_write_keeps_previous_registry() {
        let temp_dir = tempfile::tempdir().unwrap();
        let storage = storage_in(temp_dir.path(), 0);
        let (mut manager, wallet, owners) = populated_manager();
        storage.save(&manager).unwrap();

        // A directory in place of the temp file makes the write fail
        fs::create_dir(temp_dir.path().join("wallets.json.tmp")).unwrap();
        manager.deposit(&wallet, &owners[0], 1).unwrap();
        assert!(storage.save(&manager).is_err());

        assert_eq!(storage.load().unwrap().balance(&wallet), 1_000);
    }

    #[test]
    fn test_save_leaves_no_temp_file() {
        let temp_dir = tempfile::tempdir().unwrap();
        let storage = storage_in(temp_dir.path(), 5);
        let (manager, wallet, _) = populated_manager();

        storage.save(&manager).unwrap();
        assert!(!temp_dir.path().join("wallets.json.tmp").exists());
        assert_eq!(storage.load().unwrap().balance(&wallet), 1_000);
    }

    #[test]
    fn test_registry_lock_is_exclusive() {
        let temp_dir = tempfile::tempdir().unwrap();
        let storage = storage_in(temp_dir.path(), 5);

        let held = storage.lock().unwrap();
        assert!(held.path().ends_with("wallets.json.lock"));
        assert!(matches!(storage.lock(), Err(StorageError::Locked(_))));

        drop(held);
        assert!(storage.lock().is_ok());
    }

    #[test]
    fn test_deployment_record() {
        let temp_dir = tempfile::tempdir().unwrap();
        let storage = storage_in(temp_dir.path(), 5);

        assert_eq!(storage.load_deployment().unwrap(), None);

        let record = DeploymentRecord::new(Address::derive(b"wallet"), Address::derive(b"me"));
        storage.save_deployment(&record).unwrap();

        let loaded = storage.load_deployment().unwrap().unwrap();
        assert_eq!(loaded, record);

        let raw = fs::read_to_string(temp_dir.path().join("deployment.json")).unwrap();
        assert!(raw.contains("contract_address"));
    }

    #[test]
    fn test_delete() {
        let temp_dir = tempfile::tempdir().unwrap();
        let storage = storage_in(temp_dir.path(), 5);
        storage.save(&MultisigManager::new()).unwrap();
        storage.delete().unwrap();
        assert!(!storage.exists());
    }
}
