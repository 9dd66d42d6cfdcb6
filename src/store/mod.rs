//! Record storage.
//!
//! A [`DataStore`] keeps the expenses, production records and sales of
//! each owner and publishes a fresh [`RecordSet`] snapshot whenever they
//! change. Two backends exist: an in-memory store and a JSON file store.
//! Which one is used is decided once, by [`open`], from configuration.

pub mod json_file;
pub mod memory;

pub use json_file::JsonFileStore;
pub use memory::MemoryStore;

use crate::config::{Backend, StoreConfig};
use crate::models::{NewRecord, Owner, Record, RecordKind, RecordSet};
use futures::stream::{self, BoxStream, StreamExt};
use std::collections::hash_map::Entry;
use std::collections::HashMap;
use std::sync::Mutex;
use thiserror::Error;
use tokio::sync::watch;
use tracing::info;

/// Errors raised by a store.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Failed to (de)serialize records: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Invalid {kind} record: {reason}")]
    Validation { kind: RecordKind, reason: String },

    #[error("No {kind} with id '{id}' for owner '{owner}'")]
    NotFound {
        kind: RecordKind,
        id: String,
        owner: Owner,
    },
}

/// Storage capability consumed by the dashboard.
pub trait DataStore: Send + Sync {
    /// Short backend name for logs and report metadata.
    fn backend_name(&self) -> &'static str;

    /// Current records of an owner.
    fn snapshot(&self, owner: &Owner) -> Result<RecordSet, StoreError>;

    /// Stream of snapshots: the current one first, then one per change.
    fn subscribe(&self, owner: &Owner) -> Result<BoxStream<'static, RecordSet>, StoreError>;

    /// Validate and store a new record. Returns the assigned id.
    fn add(&self, owner: &Owner, record: NewRecord) -> Result<String, StoreError>;

    /// Delete a record by kind and id.
    fn delete(&self, owner: &Owner, kind: RecordKind, id: &str) -> Result<(), StoreError>;

    /// Re-read the backing storage and publish if it changed.
    ///
    /// Returns `true` when subscribers were notified.
    fn refresh(&self, owner: &Owner) -> Result<bool, StoreError>;
}

/// Open the store selected by configuration.
pub fn open(config: &StoreConfig) -> Result<Box<dyn DataStore>, StoreError> {
    match config.backend {
        Backend::Memory => {
            info!("Using in-memory store");
            Ok(Box::new(MemoryStore::new()))
        }
        Backend::Json => {
            info!("Using JSON store at {}", config.data_dir.display());
            Ok(Box::new(JsonFileStore::new(config.data_dir.clone())?))
        }
    }
}

/// Generate a new record id.
pub fn generate_id() -> String {
    format!("{:016x}", rand::random::<u64>())
}

/// Validate a payload and turn it into a stored record.
pub(crate) fn prepare_record(
    owner: &Owner,
    record: NewRecord,
) -> Result<(String, Record), StoreError> {
    record.validate().map_err(|reason| StoreError::Validation {
        kind: record.kind(),
        reason,
    })?;

    let id = generate_id();
    let stored = record.into_record(id.clone(), owner.clone());
    Ok((id, stored))
}

/// Wrap a watch receiver into a snapshot stream.
///
/// Every item is an owned clone, so consumers never observe a collection
/// while it is being mutated.
pub fn snapshot_stream(receiver: watch::Receiver<RecordSet>) -> BoxStream<'static, RecordSet> {
    stream::unfold((receiver, true), |(mut receiver, first)| async move {
        if !first && receiver.changed().await.is_err() {
            return None;
        }
        let snapshot = receiver.borrow_and_update().clone();
        Some((snapshot, (receiver, false)))
    })
    .boxed()
}

/// One watch channel per owner, created on first use.
#[derive(Default)]
pub(crate) struct OwnerChannels {
    senders: Mutex<HashMap<Owner, watch::Sender<RecordSet>>>,
}

impl OwnerChannels {
    /// Run `f` with the owner's sender, creating it from `init` if needed.
    pub(crate) fn with_sender<R>(
        &self,
        owner: &Owner,
        init: impl FnOnce() -> Result<RecordSet, StoreError>,
        f: impl FnOnce(&watch::Sender<RecordSet>) -> Result<R, StoreError>,
    ) -> Result<R, StoreError> {
        let mut senders = self.senders.lock().unwrap_or_else(|e| e.into_inner());

        let sender = match senders.entry(owner.clone()) {
            Entry::Occupied(entry) => entry.into_mut(),
            Entry::Vacant(entry) => {
                let (sender, _) = watch::channel(init()?);
                entry.insert(sender)
            }
        };

        f(sender)
    }
}
