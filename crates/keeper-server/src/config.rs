use std::net::{Ipv4Addr, SocketAddr};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use keeper_ledger::Keeper;
use keeper_store::{BusyPolicy, FileStore, FileStoreConfig, InMemoryStore};

use crate::error::{ServerError, ServerResult};

/// Server configuration. Every field has a default, so an empty TOML file
/// is a valid configuration.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct KeeperConfig {
    pub bind_addr: SocketAddr,
    /// Record log backing the ledger. `None` keeps everything in memory.
    pub ledger_path: Option<PathBuf>,
    pub busy_timeout_ms: u64,
    pub busy_retry_ms: u64,
    pub sync_every_write: bool,
    pub allow_cors: bool,
}

impl Default for KeeperConfig {
    fn default() -> Self {
        Self {
            bind_addr: SocketAddr::from((Ipv4Addr::LOCALHOST, 8081)),
            ledger_path: Some(PathBuf::from("keeper.ledger")),
            busy_timeout_ms: 5000,
            busy_retry_ms: 5,
            sync_every_write: true,
            allow_cors: true,
        }
    }
}

impl KeeperConfig {
    pub fn from_toml_str(input: &str) -> ServerResult<Self> {
        toml::from_str(input).map_err(|e| ServerError::Config(e.to_string()))
    }

    pub fn load(path: &Path) -> ServerResult<Self> {
        let input = std::fs::read_to_string(path)?;
        Self::from_toml_str(&input)
    }

    pub fn busy_policy(&self) -> BusyPolicy {
        BusyPolicy {
            timeout: Duration::from_millis(self.busy_timeout_ms),
            retry_interval: Duration::from_millis(self.busy_retry_ms),
        }
    }

    /// Open the ledger this configuration points at.
    pub fn open_keeper(&self) -> ServerResult<Keeper> {
        match &self.ledger_path {
            Some(path) => {
                let store = FileStore::open(
                    path,
                    FileStoreConfig {
                        busy: self.busy_policy(),
                        sync_every_write: self.sync_every_write,
                    },
                )?;
                Ok(Keeper::new(Arc::new(store)))
            }
            None => Ok(Keeper::new(Arc::new(InMemoryStore::new(self.busy_policy())))),
        }
    }
}
