use std::ffi::OsString;
use std::fs;
use std::path::{Path, PathBuf};

use crate::crypto;
use crate::models::Journal;

/// Overrides the platform data directory when set.
pub const DATA_DIR_ENV: &str = "CYCLECAST_DATA_DIR";
const APP_DIR: &str = "cyclecast";
const JOURNAL_FILE: &str = "journal.ccj";

#[derive(Debug, thiserror::Error)]
pub enum StorageError {
    #[error("crypto error: {0}")]
    Crypto(#[from] crypto::CryptoError),
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
    #[error("data directory not found")]
    NoDataDir,
}

/// Where the journal lives.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoreConfig {
    pub data_dir: PathBuf,
}

impl StoreConfig {
    /// `$CYCLECAST_DATA_DIR`, else the platform local data dir + `cyclecast`.
    pub fn from_env() -> Result<Self, StorageError> {
        Self::resolve(std::env::var_os(DATA_DIR_ENV))
    }

    /// An empty override counts as unset.
    fn resolve(data_dir_override: Option<OsString>) -> Result<Self, StorageError> {
        let data_dir = match data_dir_override {
            Some(dir) if !dir.is_empty() => PathBuf::from(dir),
            _ => dirs::data_local_dir()
                .ok_or(StorageError::NoDataDir)?
                .join(APP_DIR),
        };
        Ok(Self { data_dir })
    }

    pub fn at(data_dir: impl Into<PathBuf>) -> Self {
        Self {
            data_dir: data_dir.into(),
        }
    }
}

/// Encrypted journal file on disk.
#[derive(Debug, Clone)]
pub struct JournalStore {
    path: PathBuf,
}

impl JournalStore {
    pub fn new(config: &StoreConfig) -> Self {
        Self {
            path: config.data_dir.join(JOURNAL_FILE),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Check if a journal exists (i.e., the tracker has been set up before).
    pub fn exists(&self) -> bool {
        self.path.exists()
    }

    /// Save the journal encrypted with the given passphrase.
    ///
    /// Writes a sibling temp file and renames it over the journal, so a crash
    /// mid-write leaves the previous journal intact.
    pub fn save(&self, passphrase: &str, journal: &Journal) -> Result<(), StorageError> {
        if let Some(dir) = self.path.parent() {
            fs::create_dir_all(dir)?;
        }
        let json = zeroize::Zeroizing::new(serde_json::to_vec(journal)?);
        let sealed = crypto::seal(passphrase, &json)?;

        let tmp = self.path.with_extension("tmp");
        fs::write(&tmp, sealed)?;
        fs::rename(&tmp, &self.path)?;
        log::debug!("saved journal with {} days", journal.days.len());
        Ok(())
    }

    /// Load and decrypt the journal with the given passphrase.
    pub fn load(&self, passphrase: &str) -> Result<Journal, StorageError> {
        let sealed = fs::read(&self.path)?;
        let json = crypto::open(passphrase, &sealed)?;
        let journal: Journal = serde_json::from_slice(&json)?;
        Ok(journal)
    }

    /// Delete the journal permanently.
    pub fn wipe(&self) -> Result<(), StorageError> {
        if self.path.exists() {
            fs::remove_file(&self.path)?;
            log::info!("journal wiped at {}", self.path.display());
        }
        Ok(())
    }
}
