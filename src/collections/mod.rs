//! Named color collections persisted as one JSON record per store key.
//!
//! The record's lifecycle is `Absent -> Initialized -> Mutated* -> Absent`:
//! the first [`CollectionStore::load`] writes the default, every change
//! replaces the whole record, and [`CollectionStore::clear`] removes it.

use crate::model::{Collection, StorageRecord};
use crate::storage::{KeyValueStore, Revision};

/// Read-modify-write attempts before giving up on a contended record.
const MAX_SWAP_ATTEMPTS: usize = 3;

#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("stored record under {key:?} is corrupt")]
    CorruptState {
        key: String,
        #[source]
        source: serde_json::Error,
    },
    #[error("record under {key:?} kept changing; gave up after {attempts} attempts")]
    Conflict { key: String, attempts: usize },
    #[error("serialize record")]
    Serialize(#[from] serde_json::Error),
    #[error(transparent)]
    Backend(#[from] anyhow::Error),
}

pub type Result<T> = std::result::Result<T, StoreError>;

pub struct CollectionStore<S> {
    backend: S,
}

impl<S: KeyValueStore> CollectionStore<S> {
    pub fn new(backend: S) -> Self {
        Self { backend }
    }

    /// Load the record under `key`, writing `default` first if nothing is
    /// stored yet.
    pub fn load(&mut self, key: &str, default: StorageRecord) -> Result<StorageRecord> {
        self.load_with_revision(key, default).map(|(record, _)| record)
    }

    /// Like [`load`](Self::load), also returning the revision to pass to
    /// [`replace_if`](Self::replace_if).
    pub fn load_with_revision(
        &mut self,
        key: &str,
        default: StorageRecord,
    ) -> Result<(StorageRecord, Revision)> {
        if let Some(loaded) = self.read(key)? {
            return Ok(loaded);
        }

        tracing::debug!(key, "initialize record");
        let raw = serde_json::to_string(&default)?;
        if self.backend.swap_if(key, None, &raw)? {
            return Ok((default, Revision::of(&raw)));
        }

        // another writer initialized it first; use theirs
        tracing::debug!(key, "record appeared during initialize");
        self.read(key)?.ok_or_else(|| StoreError::Conflict {
            key: key.to_string(),
            attempts: 1,
        })
    }

    fn read(&self, key: &str) -> Result<Option<(StorageRecord, Revision)>> {
        let Some(raw) = self.backend.get(key)? else {
            return Ok(None);
        };
        tracing::debug!(key, bytes = raw.len(), "load record");
        let record = parse(key, &raw)?;
        Ok(Some((record, Revision::of(&raw))))
    }

    /// Raw stored JSON, without initializing or parsing.
    pub fn raw(&self, key: &str) -> Result<Option<String>> {
        Ok(self.backend.get(key)?)
    }

    /// Overwrite the whole record.
    pub fn replace(&mut self, key: &str, record: &StorageRecord) -> Result<()> {
        let raw = serde_json::to_string(record)?;
        tracing::debug!(key, lists = record.item_lists.len(), "replace record");
        self.backend.set(key, &raw)?;
        Ok(())
    }

    /// Overwrite the record only if it is still at `expected`.
    pub fn replace_if(
        &mut self,
        key: &str,
        expected: &Revision,
        record: &StorageRecord,
    ) -> Result<bool> {
        let raw = serde_json::to_string(record)?;
        let swapped = self.backend.swap_if(key, Some(expected), &raw)?;
        tracing::debug!(key, swapped, "conditional replace");
        Ok(swapped)
    }

    pub fn clear(&mut self, key: &str) -> Result<()> {
        tracing::info!(key, "clear record");
        self.backend.remove(key)?;
        Ok(())
    }

    pub fn append_collection(&mut self, key: &str, collection: Collection) -> Result<()> {
        let id = collection.id;
        self.update(key, move |record| record.item_lists.push(collection))?;
        tracing::info!(key, id, "saved collection");
        Ok(())
    }

    /// Drop the collection with `id`. Unknown ids leave the record as is.
    pub fn remove_collection(&mut self, key: &str, id: i64) -> Result<()> {
        self.update(key, |record| record.item_lists.retain(|c| c.id != id))?;
        tracing::info!(key, id, "removed collection");
        Ok(())
    }

    pub fn find_collection(&mut self, key: &str, id: i64) -> Result<Option<Collection>> {
        let record = self.load(key, StorageRecord::default())?;
        Ok(record.find(id).cloned())
    }

    /// Optimistic read-modify-write. `apply` must be deterministic on the
    /// record it is given; it may run once per attempt.
    fn update<F>(&mut self, key: &str, apply: F) -> Result<()>
    where
        F: FnOnce(&mut StorageRecord) + Clone,
    {
        for attempt in 1..=MAX_SWAP_ATTEMPTS {
            let (mut record, rev) = self.load_with_revision(key, StorageRecord::default())?;
            (apply.clone())(&mut record);
            if self.replace_if(key, &rev, &record)? {
                return Ok(());
            }
            tracing::warn!(key, attempt, "record changed underneath, retrying");
        }
        Err(StoreError::Conflict {
            key: key.to_string(),
            attempts: MAX_SWAP_ATTEMPTS,
        })
    }
}

fn parse(key: &str, raw: &str) -> Result<StorageRecord> {
    serde_json::from_str(raw).map_err(|source| {
        tracing::warn!(key, error = %source, "stored record does not parse");
        StoreError::CorruptState {
            key: key.to_string(),
            source,
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::Item;
    use crate::storage::{MemoryStore, SqliteStore};
    use std::cell::RefCell;
    use std::rc::Rc;

    const KEY: &str = "griddemo";

    fn make_collection(id: i64, colors: &[&str]) -> Collection {
        let list: Vec<Item> = colors
            .iter()
            .enumerate()
            .map(|(i, c)| Item::from_color(id * 10 + i as i64, "name", *c))
            .collect();
        Collection {
            id,
            name: format!("list {}", id),
            background_color: colors.first().copied().unwrap_or("#FFFFFF").to_string(),
            background_image: None,
            list,
        }
    }

    fn make_store() -> CollectionStore<MemoryStore> {
        CollectionStore::new(MemoryStore::new())
    }

    #[test]
    fn test_load_initializes_absent_record() {
        let mut store = make_store();
        assert!(store.raw(KEY).unwrap().is_none());

        let rec = store.load(KEY, StorageRecord::default()).unwrap();
        assert!(rec.item_lists.is_empty());
        assert_eq!(store.raw(KEY).unwrap().as_deref(), Some(r#"{"itemLists":[]}"#));
    }

    #[test]
    fn test_load_writes_given_default() {
        let mut store = make_store();
        let default = StorageRecord {
            item_lists: vec![make_collection(1, &["#111111"])],
        };
        assert_eq!(store.load(KEY, default.clone()).unwrap(), default);
        // now stored, a different default is ignored
        assert_eq!(store.load(KEY, StorageRecord::default()).unwrap(), default);
    }

    #[test]
    fn test_replace_then_load_round_trips() {
        let mut store = make_store();
        let mut c = make_collection(5, &["#ABCDEF", "#123456"]);
        c.background_image = Some("linear-gradient(90deg, #ABCDEF 0%, #123456 100%)".into());
        c.list[0].position = Some(12.5);
        let rec = StorageRecord {
            item_lists: vec![c, make_collection(6, &[])],
        };

        store.replace(KEY, &rec).unwrap();
        assert_eq!(store.load(KEY, StorageRecord::default()).unwrap(), rec);
    }

    #[test]
    fn test_clear_resets_to_default() {
        let mut store = make_store();
        store
            .append_collection(KEY, make_collection(1, &["#111111"]))
            .unwrap();

        store.clear(KEY).unwrap();
        assert!(store.raw(KEY).unwrap().is_none());

        let default = StorageRecord {
            item_lists: vec![make_collection(9, &["#999999"])],
        };
        assert_eq!(store.load(KEY, default.clone()).unwrap(), default);
    }

    #[test]
    fn test_append_then_find() {
        let mut store = make_store();
        let c = make_collection(42, &["#FF0000", "#00FF00"]);
        store.append_collection(KEY, make_collection(1, &["#000000"])).unwrap();
        store.append_collection(KEY, c.clone()).unwrap();

        assert_eq!(store.find_collection(KEY, 42).unwrap(), Some(c));
        assert_eq!(store.find_collection(KEY, 7).unwrap(), None);

        let ids: Vec<_> = store
            .load(KEY, StorageRecord::default())
            .unwrap()
            .item_lists
            .iter()
            .map(|c| c.id)
            .collect();
        assert_eq!(ids, [1, 42]);
    }

    #[test]
    fn test_remove_collection() {
        let mut store = make_store();
        store.append_collection(KEY, make_collection(1, &["#111111"])).unwrap();
        store.append_collection(KEY, make_collection(2, &["#222222"])).unwrap();

        store.remove_collection(KEY, 1).unwrap();
        let rec = store.load(KEY, StorageRecord::default()).unwrap();
        assert_eq!(rec.item_lists.len(), 1);
        assert_eq!(rec.item_lists[0].id, 2);
    }

    #[test]
    fn test_remove_unknown_id_keeps_content() {
        let mut store = make_store();
        store.append_collection(KEY, make_collection(1, &["#111111"])).unwrap();
        let before = store.load(KEY, StorageRecord::default()).unwrap();

        store.remove_collection(KEY, 404).unwrap();
        assert_eq!(store.load(KEY, StorageRecord::default()).unwrap(), before);
    }

    #[test]
    fn test_remove_on_absent_record_initializes() {
        let mut store = make_store();
        store.remove_collection(KEY, 1).unwrap();
        assert_eq!(store.raw(KEY).unwrap().as_deref(), Some(r#"{"itemLists":[]}"#));
    }

    #[test]
    fn test_corrupt_record_is_an_error() {
        let mut backend = MemoryStore::new();
        backend.set(KEY, "{not json").unwrap();
        let mut store = CollectionStore::new(backend);

        let err = store.load(KEY, StorageRecord::default()).unwrap_err();
        assert!(matches!(err, StoreError::CorruptState { ref key, .. } if key == KEY));
        // the bad value is left for inspection
        assert_eq!(store.raw(KEY).unwrap().as_deref(), Some("{not json"));

        // appends refuse to overwrite it
        assert!(store.append_collection(KEY, make_collection(1, &[])).is_err());
    }

    #[test]
    fn test_legacy_shape_is_corrupt() {
        let mut backend = MemoryStore::new();
        // an older revision stored lists without names or backgrounds
        backend
            .set(KEY, r#"{"itemLists":[{"id":1,"list":[]}]}"#)
            .unwrap();
        let mut store = CollectionStore::new(backend);
        assert!(matches!(
            store.load(KEY, StorageRecord::default()),
            Err(StoreError::CorruptState { .. })
        ));
    }

    #[test]
    fn test_keys_are_independent() {
        let mut store = make_store();
        store.append_collection("a", make_collection(1, &["#111111"])).unwrap();
        assert!(store.find_collection("b", 1).unwrap().is_none());
        assert!(store.find_collection("a", 1).unwrap().is_some());
    }

    #[test]
    fn test_plain_load_replace_loses_updates() {
        // Two writers sharing one backend, both using unconditional replace:
        // the second write silently drops the first one's collection.
        let mut store = make_store();
        let mut first = store.load(KEY, StorageRecord::default()).unwrap();
        let mut second = store.load(KEY, StorageRecord::default()).unwrap();

        first.item_lists.push(make_collection(1, &["#111111"]));
        store.replace(KEY, &first).unwrap();
        second.item_lists.push(make_collection(2, &["#222222"]));
        store.replace(KEY, &second).unwrap();

        assert!(store.find_collection(KEY, 1).unwrap().is_none());
        assert!(store.find_collection(KEY, 2).unwrap().is_some());
    }

    /// Several handles onto one in-memory backend.
    #[derive(Clone, Default)]
    struct Shared(Rc<RefCell<MemoryStore>>);

    impl KeyValueStore for Shared {
        fn get(&self, key: &str) -> anyhow::Result<Option<String>> {
            self.0.borrow().get(key)
        }

        fn set(&mut self, key: &str, value: &str) -> anyhow::Result<()> {
            self.0.borrow_mut().set(key, value)
        }

        fn remove(&mut self, key: &str) -> anyhow::Result<()> {
            self.0.borrow_mut().remove(key)
        }
    }

    /// Runs `before_write` once, right before the first write goes through.
    struct Interleaved {
        inner: Shared,
        before_write: Option<Box<dyn FnOnce()>>,
    }

    impl Interleaved {
        fn run_hook(&mut self) {
            if let Some(hook) = self.before_write.take() {
                hook();
            }
        }
    }

    impl KeyValueStore for Interleaved {
        fn get(&self, key: &str) -> anyhow::Result<Option<String>> {
            self.inner.get(key)
        }

        fn set(&mut self, key: &str, value: &str) -> anyhow::Result<()> {
            self.run_hook();
            self.inner.set(key, value)
        }

        fn remove(&mut self, key: &str) -> anyhow::Result<()> {
            self.run_hook();
            self.inner.remove(key)
        }

        fn swap_if(
            &mut self,
            key: &str,
            expected: Option<&Revision>,
            value: &str,
        ) -> anyhow::Result<bool> {
            self.run_hook();
            self.inner.swap_if(key, expected, value)
        }
    }

    #[test]
    fn test_append_keeps_collection_written_during_initialize() {
        let shared = Shared::default();
        let other = shared.clone();
        let mut a = CollectionStore::new(Interleaved {
            inner: shared.clone(),
            before_write: Some(Box::new(move || {
                // a second writer appends after a saw the key absent
                let mut b = CollectionStore::new(other);
                b.append_collection(KEY, make_collection(2, &["#222222"]))
                    .unwrap();
            })),
        });

        a.append_collection(KEY, make_collection(1, &["#111111"])).unwrap();

        let mut check = CollectionStore::new(shared);
        let ids: Vec<_> = check
            .load(KEY, StorageRecord::default())
            .unwrap()
            .item_lists
            .iter()
            .map(|c| c.id)
            .collect();
        assert_eq!(ids, [2, 1]);
    }

    #[test]
    fn test_load_uses_record_written_during_initialize() {
        let shared = Shared::default();
        let other = shared.clone();
        let mut a = CollectionStore::new(Interleaved {
            inner: shared,
            before_write: Some(Box::new(move || {
                let mut b = CollectionStore::new(other);
                b.append_collection(KEY, make_collection(7, &["#777777"]))
                    .unwrap();
            })),
        });

        let rec = a.load(KEY, StorageRecord::default()).unwrap();
        assert_eq!(rec.item_lists.len(), 1);
        assert_eq!(rec.item_lists[0].id, 7);
    }

    #[test]
    fn test_replace_if_rejects_stale_revision() {
        let mut store = make_store();
        let (mut rec, rev) = store
            .load_with_revision(KEY, StorageRecord::default())
            .unwrap();

        store.append_collection(KEY, make_collection(1, &["#111111"])).unwrap();

        rec.item_lists.push(make_collection(2, &["#222222"]));
        assert!(!store.replace_if(KEY, &rev, &rec).unwrap());
        assert!(store.find_collection(KEY, 1).unwrap().is_some());
        assert!(store.find_collection(KEY, 2).unwrap().is_none());
    }

    #[test]
    fn test_appends_from_two_connections_are_kept() {
        let path = std::env::temp_dir()
            .join(format!(
                "griddemo-collections-{}-{}",
                std::process::id(),
                time::OffsetDateTime::now_utc().unix_timestamp_nanos()
            ))
            .join("db.sqlite3");
        let mut a = CollectionStore::new(SqliteStore::open(&path).unwrap());
        let mut b = CollectionStore::new(SqliteStore::open(&path).unwrap());

        a.append_collection(KEY, make_collection(1, &["#111111"])).unwrap();
        b.append_collection(KEY, make_collection(2, &["#222222"])).unwrap();
        a.append_collection(KEY, make_collection(3, &["#333333"])).unwrap();

        let ids: Vec<_> = b
            .load(KEY, StorageRecord::default())
            .unwrap()
            .item_lists
            .iter()
            .map(|c| c.id)
            .collect();
        assert_eq!(ids, [1, 2, 3]);

        drop(a);
        drop(b);
        if let Some(dir) = path.parent() {
            let _ = std::fs::remove_dir_all(dir);
        }
    }
}
