//! In-memory store.
//!
//! Records live only as long as the process. Every owner starts empty.

use super::{prepare_record, snapshot_stream, DataStore, OwnerChannels, StoreError};
use crate::models::{NewRecord, Owner, RecordKind, RecordSet};
use futures::stream::BoxStream;
use tracing::debug;

/// Store that keeps records in the per-owner watch channels themselves.
#[derive(Default)]
pub struct MemoryStore {
    channels: OwnerChannels,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

fn empty() -> Result<RecordSet, StoreError> {
    Ok(RecordSet::default())
}

impl DataStore for MemoryStore {
    fn backend_name(&self) -> &'static str {
        "memory"
    }

    fn snapshot(&self, owner: &Owner) -> Result<RecordSet, StoreError> {
        self.channels
            .with_sender(owner, empty, |sender| Ok(sender.borrow().clone()))
    }

    fn subscribe(&self, owner: &Owner) -> Result<BoxStream<'static, RecordSet>, StoreError> {
        self.channels
            .with_sender(owner, empty, |sender| Ok(snapshot_stream(sender.subscribe())))
    }

    fn add(&self, owner: &Owner, record: NewRecord) -> Result<String, StoreError> {
        let (id, stored) = prepare_record(owner, record)?;

        self.channels.with_sender(owner, empty, |sender| {
            sender.send_modify(|set| set.insert(stored));
            Ok(())
        })?;

        debug!("Added record {} for {}", id, owner);
        Ok(id)
    }

    fn delete(&self, owner: &Owner, kind: RecordKind, id: &str) -> Result<(), StoreError> {
        let removed = self.channels.with_sender(owner, empty, |sender| {
            Ok(sender.send_if_modified(|set| set.remove(kind, id)))
        })?;

        if !removed {
            return Err(StoreError::NotFound {
                kind,
                id: id.to_string(),
                owner: owner.clone(),
            });
        }

        debug!("Deleted {} {} for {}", kind, id, owner);
        Ok(())
    }

    fn refresh(&self, _owner: &Owner) -> Result<bool, StoreError> {
        Ok(false)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{parse_date, ExpenseCategory, NewExpense, NewProduction, NewSale};
    use futures::StreamExt;
    use rust_decimal_macros::dec;

    fn feed_expense() -> NewRecord {
        NewRecord::Expense(NewExpense {
            category: ExpenseCategory::Feed,
            description: "Ração Postura Premium".to_string(),
            cost: dec!(150.00),
            date: parse_date("2023-10-01").unwrap(),
        })
    }

    fn production(date: &str, eggs: u64) -> NewRecord {
        NewRecord::Production(NewProduction {
            date: parse_date(date).unwrap(),
            eggs_produced: eggs,
            feed_consumed_kg: dec!(15),
        })
    }

    #[test]
    fn test_add_and_snapshot() {
        let store = MemoryStore::new();
        let owner = Owner::from("farm");

        let id = store.add(&owner, feed_expense()).unwrap();
        store.add(&owner, production("2023-10-01", 120)).unwrap();
        store.add(&owner, production("2023-10-03", 130)).unwrap();

        let snapshot = store.snapshot(&owner).unwrap();
        assert_eq!(snapshot.expenses.len(), 1);
        assert_eq!(snapshot.expenses[0].id, id);
        assert_eq!(snapshot.expenses[0].owner, owner);
        assert_eq!(snapshot.production.len(), 2);
        assert_eq!(snapshot.production[0].eggs_produced, 130);
    }

    #[test]
    fn test_owners_are_isolated() {
        let store = MemoryStore::new();
        let alice = Owner::from("alice");
        let bob = Owner::from("bob");

        store.add(&alice, feed_expense()).unwrap();

        assert_eq!(store.snapshot(&alice).unwrap().len(), 1);
        assert!(store.snapshot(&bob).unwrap().is_empty());
    }

    #[test]
    fn test_delete() {
        let store = MemoryStore::new();
        let owner = Owner::from("farm");
        let id = store.add(&owner, feed_expense()).unwrap();

        assert!(matches!(
            store.delete(&owner, RecordKind::Sale, &id),
            Err(StoreError::NotFound { .. })
        ));
        store.delete(&owner, RecordKind::Expense, &id).unwrap();
        assert!(store.snapshot(&owner).unwrap().is_empty());
        assert!(store.delete(&owner, RecordKind::Expense, &id).is_err());
    }

    #[test]
    fn test_delete_other_owner_not_found() {
        let store = MemoryStore::new();
        let id = store.add(&Owner::from("alice"), feed_expense()).unwrap();

        let result = store.delete(&Owner::from("bob"), RecordKind::Expense, &id);
        assert!(matches!(result, Err(StoreError::NotFound { .. })));
        assert_eq!(store.snapshot(&Owner::from("alice")).unwrap().len(), 1);
    }

    #[test]
    fn test_add_rejects_invalid_record() {
        let store = MemoryStore::new();
        let owner = Owner::from("farm");
        let sale = NewRecord::Sale(NewSale {
            date: parse_date("2023-10-01").unwrap(),
            quantity: 10,
            value: dec!(-8),
            client: None,
        });

        let result = store.add(&owner, sale);
        assert!(matches!(
            result,
            Err(StoreError::Validation {
                kind: RecordKind::Sale,
                ..
            })
        ));
        assert!(store.snapshot(&owner).unwrap().is_empty());
    }

    #[test]
    fn test_subscribe_emits_current_then_changes() {
        let store = MemoryStore::new();
        let owner = Owner::from("farm");
        store.add(&owner, production("2023-10-01", 120)).unwrap();

        let mut snapshots = store.subscribe(&owner).unwrap();

        tokio_test::block_on(async {
            let first = snapshots.next().await.unwrap();
            assert_eq!(first.production.len(), 1);

            store.add(&owner, production("2023-10-01", 30)).unwrap();
            let second = snapshots.next().await.unwrap();
            assert_eq!(second.production.len(), 2);

            // Earlier snapshots are unaffected by later writes.
            assert_eq!(first.production.len(), 1);
        });
    }
}
