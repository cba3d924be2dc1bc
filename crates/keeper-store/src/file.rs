use std::path::{Path, PathBuf};
use std::sync::{RwLock, RwLockReadGuard, RwLockWriteGuard};

use tracing::{debug, info};

use keeper_types::{
    ActorId, Credential, Envelope, EventStatus, Payload, Sequence, SequenceClock, StatusMask,
};

use crate::error::{StoreError, StoreResult};
use crate::gate::{BusyPolicy, WriteGate};
use crate::log::{LogRecord, RecordLog};
use crate::state::{generate_pairing_key, StoreState};
use crate::traits::{IdentityRegistry, LedgerStore, PairingKeys};

/// Configuration for the [`FileStore`].
#[derive(Clone, Debug)]
pub struct FileStoreConfig {
    pub busy: BusyPolicy,
    /// `fsync` after every record. Off trades durability for latency.
    pub sync_every_write: bool,
}

impl Default for FileStoreConfig {
    fn default() -> Self {
        Self {
            busy: BusyPolicy::default(),
            sync_every_write: true,
        }
    }
}

/// Durable store backed by a single [`RecordLog`].
///
/// Every mutation is written to the log first and applied to the in-memory
/// tables only once the write succeeded. Opening the store replays the log
/// to rebuild the tables.
pub struct FileStore {
    state: RwLock<StoreState>,
    gate: WriteGate<RecordLog>,
    clock: SequenceClock,
    path: PathBuf,
}

impl FileStore {
    pub fn open(path: &Path, config: FileStoreConfig) -> StoreResult<Self> {
        let (log, records) = RecordLog::open(path, config.sync_every_write)?;

        let mut state = StoreState::new();
        let record_count = records.len();
        for record in records {
            apply(&mut state, record)?;
        }

        let clock = SequenceClock::new();
        if let Some(last) = state.max_sequence() {
            clock.observe(last);
        }

        info!(path = %path.display(), records = record_count, "file store opened");

        Ok(Self {
            state: RwLock::new(state),
            gate: WriteGate::new(log, config.busy),
            clock,
            path: path.to_path_buf(),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn read(&self) -> StoreResult<RwLockReadGuard<'_, StoreState>> {
        self.state.read().map_err(|_| StoreError::LockPoisoned)
    }

    fn write(&self) -> StoreResult<RwLockWriteGuard<'_, StoreState>> {
        self.state.write().map_err(|_| StoreError::LockPoisoned)
    }
}

/// Replay one durable record into the tables.
fn apply(state: &mut StoreState, record: LogRecord) -> StoreResult<()> {
    match record {
        LogRecord::Appended { source, events } => {
            let batch = events
                .into_iter()
                .map(|(sequence, bytes)| -> StoreResult<_> {
                    Ok((sequence, Payload::decode(&bytes)?))
                })
                .collect::<StoreResult<Vec<_>>>()?;
            state.insert_batch(source, batch);
        }
        LogRecord::Status { sequence, status } => {
            state.set_status(sequence, EventStatus::from_code(status)?);
        }
        LogRecord::ActorCreated { actor, credential } => {
            state.add_actor(actor);
            if let Some(credential) = credential {
                state.bind(actor, credential);
            }
        }
        LogRecord::CredentialBound { actor, credential } => state.bind(actor, credential),
        LogRecord::PairingIssued { key, actor } => state.issue_pairing(key, actor),
        LogRecord::PairingRedeemed { key } => state.mark_redeemed(&key),
    }
    Ok(())
}

impl LedgerStore for FileStore {
    fn append(&self, source: ActorId, payloads: &[Payload]) -> StoreResult<Vec<Sequence>> {
        if payloads.is_empty() {
            return Ok(Vec::new());
        }

        let encoded = payloads
            .iter()
            .map(Payload::encode)
            .collect::<Result<Vec<_>, _>>()?;

        let mut log = self.gate.acquire()?;
        let sequences = self.clock.tick_batch(payloads.len());

        log.append(&LogRecord::Appended {
            source,
            events: sequences.iter().copied().zip(encoded).collect(),
        })?;

        let batch = sequences.iter().copied().zip(payloads.iter().cloned()).collect();
        self.write()?.insert_batch(source, batch);

        debug!(%source, count = sequences.len(), "batch appended");
        Ok(sequences)
    }

    fn scan(&self, after: Sequence, mask: StatusMask) -> StoreResult<Vec<Envelope>> {
        Ok(self.read()?.scan(after, mask))
    }

    fn set_status(&self, sequence: Sequence, status: EventStatus) -> StoreResult<()> {
        if self.read()?.status_of(sequence)? == status {
            return Ok(());
        }

        let mut log = self.gate.acquire()?;
        if self.read()?.status_of(sequence)? == status {
            return Ok(());
        }

        log.append(&LogRecord::Status {
            sequence,
            status: status.code(),
        })?;
        self.write()?.set_status(sequence, status);
        Ok(())
    }
}

impl IdentityRegistry for FileStore {
    fn resolve(&self, credential: &Credential) -> StoreResult<ActorId> {
        if let Some(actor) = self.read()?.actor_for(credential) {
            return Ok(actor);
        }

        let mut log = self.gate.acquire()?;
        if let Some(actor) = self.read()?.actor_for(credential) {
            return Ok(actor);
        }

        let actor = self.read()?.next_actor();
        log.append(&LogRecord::ActorCreated {
            actor,
            credential: Some(credential.clone()),
        })?;

        let mut state = self.write()?;
        state.add_actor(actor);
        state.bind(actor, credential.clone());

        debug!(%actor, %credential, "actor created");
        Ok(actor)
    }

    fn lookup(&self, credential: &Credential) -> StoreResult<Option<ActorId>> {
        Ok(self.read()?.actor_for(credential))
    }

    fn bind(&self, actor: ActorId, credential: &Credential) -> StoreResult<()> {
        let mut log = self.gate.acquire()?;
        if !self.read()?.check_bind(actor, credential)? {
            return Ok(());
        }

        log.append(&LogRecord::CredentialBound {
            actor,
            credential: credential.clone(),
        })?;
        self.write()?.bind(actor, credential.clone());

        debug!(%actor, %credential, "credential bound");
        Ok(())
    }

    fn create_actor(&self) -> StoreResult<ActorId> {
        let mut log = self.gate.acquire()?;
        let actor = self.read()?.next_actor();
        log.append(&LogRecord::ActorCreated {
            actor,
            credential: None,
        })?;
        self.write()?.add_actor(actor);
        Ok(actor)
    }

    fn actor_exists(&self, actor: ActorId) -> StoreResult<bool> {
        Ok(self.read()?.actor_exists(actor))
    }
}

impl PairingKeys for FileStore {
    fn issue(&self, actor: ActorId) -> StoreResult<String> {
        let mut log = self.gate.acquire()?;
        let key = {
            let state = self.read()?;
            if !state.actor_exists(actor) {
                return Err(StoreError::UnknownActor(actor));
            }
            let mut key = generate_pairing_key();
            while state.has_pairing(&key) {
                key = generate_pairing_key();
            }
            key
        };

        log.append(&LogRecord::PairingIssued {
            key: key.clone(),
            actor,
        })?;
        self.write()?.issue_pairing(key.clone(), actor);
        Ok(key)
    }

    fn redeem(&self, key: &str) -> StoreResult<ActorId> {
        let mut log = self.gate.acquire()?;
        let actor = self.read()?.check_redeem(key)?;

        log.append(&LogRecord::PairingRedeemed { key: key.into() })?;
        self.write()?.mark_redeemed(key);
        Ok(actor)
    }
}
