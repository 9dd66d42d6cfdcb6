//! JSON file store.
//!
//! Each owner's records live in `<data_dir>/<owner>.json`:
//!
//! ```json
//! { "expenses": [...], "production": [...], "sales": [...] }
//! ```
//!
//! Records are read leniently: bad numeric fields become zero and records
//! with an unreadable date are skipped, both with a warning. Skipped
//! entries are written back untouched on the next save.

use super::{prepare_record, snapshot_stream, DataStore, OwnerChannels, StoreError};
use crate::models::{Expense, NewRecord, Owner, ProductionRecord, RecordKind, RecordSet, Sale};
use futures::stream::BoxStream;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::path::PathBuf;
use tracing::{debug, warn};

/// On-disk layout before per-record validation.
#[derive(Debug, Default, Serialize, Deserialize)]
struct RawRecordFile {
    #[serde(default)]
    expenses: Vec<Value>,
    #[serde(default)]
    production: Vec<Value>,
    #[serde(default)]
    sales: Vec<Value>,
}

/// An owner's file: the records that could be read, plus the raw entries
/// that could not.
#[derive(Debug, Default)]
struct OwnerFile {
    records: RecordSet,
    skipped: RawRecordFile,
}

/// Store persisting one JSON file per owner.
pub struct JsonFileStore {
    data_dir: PathBuf,
    channels: OwnerChannels,
}

impl JsonFileStore {
    /// Create the store, creating `data_dir` if it does not exist.
    pub fn new(data_dir: PathBuf) -> Result<Self, StoreError> {
        std::fs::create_dir_all(&data_dir)?;
        Ok(Self {
            data_dir,
            channels: OwnerChannels::default(),
        })
    }

    /// Path of the file holding an owner's records.
    ///
    /// ASCII letters, digits and `-` are kept; every other byte is written
    /// as `_XX` hex, so distinct owners never share a file.
    pub fn owner_path(&self, owner: &Owner) -> PathBuf {
        let mut file_stem = String::with_capacity(owner.as_str().len());
        for byte in owner.as_str().bytes() {
            if byte.is_ascii_alphanumeric() || byte == b'-' {
                file_stem.push(char::from(byte));
            } else {
                file_stem.push_str(&format!("_{:02X}", byte));
            }
        }
        self.data_dir.join(format!("{}.json", file_stem))
    }

    /// Read an owner's records from disk. A missing file is an empty set.
    fn load(&self, owner: &Owner) -> Result<RecordSet, StoreError> {
        Ok(self.read_file(owner)?.records)
    }

    fn read_file(&self, owner: &Owner) -> Result<OwnerFile, StoreError> {
        let path = self.owner_path(owner);
        if !path.exists() {
            return Ok(OwnerFile::default());
        }

        let content = std::fs::read_to_string(&path)?;
        if content.trim().is_empty() {
            return Ok(OwnerFile::default());
        }

        let raw: RawRecordFile = serde_json::from_str(&content)?;
        let (expenses, skipped_expenses) =
            parse_records::<Expense>(raw.expenses, owner, RecordKind::Expense);
        let (production, skipped_production) =
            parse_records::<ProductionRecord>(raw.production, owner, RecordKind::Production);
        let (sales, skipped_sales) = parse_records::<Sale>(raw.sales, owner, RecordKind::Sale);

        let mut records = RecordSet {
            expenses,
            production,
            sales,
        };
        records.sort_newest_first();

        debug!("Loaded {} records from {}", records.len(), path.display());
        Ok(OwnerFile {
            records,
            skipped: RawRecordFile {
                expenses: skipped_expenses,
                production: skipped_production,
                sales: skipped_sales,
            },
        })
    }

    /// Write an owner's file, replacing it atomically.
    fn save(&self, owner: &Owner, file: &OwnerFile) -> Result<(), StoreError> {
        let path = self.owner_path(owner);
        let tmp_path = path.with_extension("json.tmp");

        let raw = RawRecordFile {
            expenses: to_values(&file.records.expenses, &file.skipped.expenses)?,
            production: to_values(&file.records.production, &file.skipped.production)?,
            sales: to_values(&file.records.sales, &file.skipped.sales)?,
        };

        let content = serde_json::to_string_pretty(&raw)?;
        std::fs::write(&tmp_path, content)?;
        std::fs::rename(&tmp_path, &path)?;

        debug!("Saved {} records to {}", file.records.len(), path.display());
        Ok(())
    }

    /// Load, apply `change`, save and publish.
    fn update<R>(
        &self,
        owner: &Owner,
        change: impl FnOnce(&mut RecordSet) -> Result<R, StoreError>,
    ) -> Result<R, StoreError> {
        self.channels.with_sender(
            owner,
            || self.load(owner),
            |sender| {
                let mut file = self.read_file(owner)?;
                let result = change(&mut file.records)?;
                self.save(owner, &file)?;
                sender.send_replace(file.records);
                Ok(result)
            },
        )
    }
}

/// Parse raw records. Entries that cannot be read or belong to another
/// owner are returned separately, unchanged.
fn parse_records<T: DeserializeOwned + OwnedRecord>(
    raw: Vec<Value>,
    owner: &Owner,
    kind: RecordKind,
) -> (Vec<T>, Vec<Value>) {
    let mut records = Vec::new();
    let mut skipped = Vec::new();

    for value in raw {
        match serde_json::from_value::<T>(value.clone()) {
            Ok(record) if record.owner() == owner => records.push(record),
            Ok(record) => {
                warn!(
                    "Skipping {} owned by '{}' in file of '{}'",
                    kind,
                    record.owner(),
                    owner
                );
                skipped.push(value);
            }
            Err(e) => {
                warn!("Skipping unreadable {} record: {}", kind, e);
                skipped.push(value);
            }
        }
    }

    (records, skipped)
}

/// Serialize records, followed by the raw entries kept from the last load.
fn to_values<T: Serialize>(records: &[T], kept: &[Value]) -> Result<Vec<Value>, StoreError> {
    let mut values = records
        .iter()
        .map(serde_json::to_value)
        .collect::<Result<Vec<_>, _>>()?;
    values.extend(kept.iter().cloned());
    Ok(values)
}

trait OwnedRecord {
    fn owner(&self) -> &Owner;
}

impl OwnedRecord for Expense {
    fn owner(&self) -> &Owner {
        &self.owner
    }
}

impl OwnedRecord for ProductionRecord {
    fn owner(&self) -> &Owner {
        &self.owner
    }
}

impl OwnedRecord for Sale {
    fn owner(&self) -> &Owner {
        &self.owner
    }
}

impl DataStore for JsonFileStore {
    fn backend_name(&self) -> &'static str {
        "json"
    }

    fn snapshot(&self, owner: &Owner) -> Result<RecordSet, StoreError> {
        self.load(owner)
    }

    fn subscribe(&self, owner: &Owner) -> Result<BoxStream<'static, RecordSet>, StoreError> {
        let current = self.load(owner)?;
        let initial = current.clone();
        self.channels.with_sender(
            owner,
            move || Ok(initial),
            |sender| {
                sender.send_if_modified(|set| replace_if_changed(set, current));
                Ok(snapshot_stream(sender.subscribe()))
            },
        )
    }

    fn add(&self, owner: &Owner, record: NewRecord) -> Result<String, StoreError> {
        let (id, stored) = prepare_record(owner, record)?;

        self.update(owner, |set| {
            set.insert(stored);
            Ok(())
        })?;

        debug!("Added record {} for {}", id, owner);
        Ok(id)
    }

    fn delete(&self, owner: &Owner, kind: RecordKind, id: &str) -> Result<(), StoreError> {
        self.update(owner, |set| {
            if set.remove(kind, id) {
                Ok(())
            } else {
                Err(StoreError::NotFound {
                    kind,
                    id: id.to_string(),
                    owner: owner.clone(),
                })
            }
        })?;

        debug!("Deleted {} {} for {}", kind, id, owner);
        Ok(())
    }

    fn refresh(&self, owner: &Owner) -> Result<bool, StoreError> {
        let current = self.load(owner)?;
        let initial = current.clone();
        self.channels.with_sender(
            owner,
            move || Ok(initial),
            |sender| Ok(sender.send_if_modified(|set| replace_if_changed(set, current))),
        )
    }
}

fn replace_if_changed(set: &mut RecordSet, current: RecordSet) -> bool {
    if *set == current {
        false
    } else {
        *set = current;
        true
    }
}
