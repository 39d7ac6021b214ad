//! File-based storage implementation
//!
//! One JSON file per record category, each wrapped in a versioned envelope.
//! Writes go to a uniquely named temp file that is then renamed over the
//! target, so a crash leaves either the old or the new contents.

use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tokio::sync::Mutex;

use crate::application::errors::StorageError;
use crate::domain::traits::{Category, Record, Snapshot, Store};

/// Layout version written into every file
pub const FORMAT_VERSION: u32 = 1;

#[derive(Debug, Serialize, Deserialize)]
struct Envelope<T> {
    version: u32,
    data: T,
}

/// JSON file-based store
pub struct JsonStore {
    base_path: PathBuf,
    // one writer at a time keeps concurrent saves of a category ordered
    write_lock: Mutex<()>,
}

impl JsonStore {
    pub fn new(base_path: impl Into<PathBuf>) -> Self {
        Self {
            base_path: base_path.into(),
            write_lock: Mutex::new(()),
        }
    }

    pub async fn init(&self) -> Result<(), StorageError> {
        tokio::fs::create_dir_all(&self.base_path).await?;
        Ok(())
    }

    pub fn base_path(&self) -> &Path {
        &self.base_path
    }

    pub fn path_for(&self, category: Category) -> PathBuf {
        self.base_path.join(format!("{}.json", category))
    }

    /// Read one category, falling back to the default on any problem
    async fn read_category<T>(&self, category: Category) -> T
    where
        T: DeserializeOwned + Default,
    {
        let path = self.path_for(category);
        let content = match tokio::fs::read_to_string(&path).await {
            Ok(content) => content,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                tracing::debug!("No {} data yet at {}", category, path.display());
                return T::default();
            }
            Err(e) => {
                tracing::warn!("Failed to read {}: {}, starting empty", path.display(), e);
                return T::default();
            }
        };

        match serde_json::from_str::<Envelope<T>>(&content) {
            Ok(envelope) if envelope.version == FORMAT_VERSION => envelope.data,
            Ok(envelope) => {
                tracing::warn!(
                    "Unsupported {} format version {} in {}, starting empty",
                    category,
                    envelope.version,
                    path.display()
                );
                T::default()
            }
            Err(e) => {
                tracing::warn!("Malformed {}: {}, starting empty", path.display(), e);
                T::default()
            }
        }
    }

    async fn write_category<T: Serialize>(&self, category: Category, data: &T) -> Result<(), StorageError> {
        let envelope = Envelope {
            version: FORMAT_VERSION,
            data,
        };
        let content = serde_json::to_string_pretty(&envelope)?;

        let path = self.path_for(category);
        let temp_path = self
            .base_path
            .join(format!("{}.{}.tmp", category, uuid::Uuid::new_v4().simple()));

        let _guard = self.write_lock.lock().await;
        if let Err(e) = write_and_sync(&temp_path, content.as_bytes()).await {
            let _ = tokio::fs::remove_file(&temp_path).await;
            return Err(e);
        }
        if let Err(e) = tokio::fs::rename(&temp_path, &path).await {
            let _ = tokio::fs::remove_file(&temp_path).await;
            return Err(e.into());
        }

        tracing::debug!("Saved {} to {}", category, path.display());
        Ok(())
    }
}

async fn write_and_sync(path: &Path, bytes: &[u8]) -> Result<(), StorageError> {
    use tokio::io::AsyncWriteExt;

    let mut file = tokio::fs::File::create(path).await?;
    file.write_all(bytes).await?;
    file.write_all(b"\n").await?;
    file.sync_all().await?;
    Ok(())
}

#[async_trait]
impl Store for JsonStore {
    async fn load(&self) -> Snapshot {
        Snapshot {
            config: self.read_category(Category::Config).await,
            locks: self.read_category(Category::Locks).await,
            bans: self.read_category(Category::Bans).await,
            mutes: self.read_category(Category::Mutes).await,
            rules: self.read_category(Category::Rules).await,
        }
    }

    async fn save(&self, record: Record) -> Result<(), StorageError> {
        let category = record.category();
        match &record {
            Record::Config(config) => self.write_category(category, config).await,
            Record::Locks(locks) => self.write_category(category, locks).await,
            Record::Bans(bans) => self.write_category(category, bans).await,
            Record::Mutes(mutes) => self.write_category(category, mutes).await,
            Record::Rules(rules) => self.write_category(category, rules).await,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::entities::{BotConfig, ThreadId, ThreadLocks, UserId};
    use std::collections::{BTreeMap, BTreeSet};

    async fn store() -> (tempfile::TempDir, JsonStore) {
        let dir = tempfile::tempdir().unwrap();
        let store = JsonStore::new(dir.path().join("data"));
        store.init().await.unwrap();
        (dir, store)
    }

    async fn save_all(store: &JsonStore, snapshot: &Snapshot) {
        if let Some(config) = &snapshot.config {
            store.save(Record::Config(config.clone())).await.unwrap();
        }
        store.save(Record::Locks(snapshot.locks.clone())).await.unwrap();
        store.save(Record::Bans(snapshot.bans.clone())).await.unwrap();
        store.save(Record::Mutes(snapshot.mutes.clone())).await.unwrap();
        store.save(Record::Rules(snapshot.rules.clone())).await.unwrap();
    }

    #[tokio::test]
    async fn test_roundtrip_empty() {
        let (_dir, store) = store().await;
        assert_eq!(store.load().await, Snapshot::default());

        save_all(&store, &Snapshot::default()).await;
        assert_eq!(store.load().await, Snapshot::default());
    }

    #[tokio::test]
    async fn test_roundtrip_single_entry() {
        let (_dir, store) = store().await;
        let snapshot = Snapshot {
            config: Some(BotConfig::new("100", Some("!")).unwrap()),
            locks: BTreeMap::from([(
                ThreadId::from("T1"),
                ThreadLocks {
                    name: Some("Study Group".into()),
                    ..Default::default()
                },
            )]),
            bans: BTreeSet::from([UserId::from("U9")]),
            mutes: BTreeSet::from([ThreadId::from("T1")]),
            rules: BTreeMap::from([(ThreadId::from("T1"), "be kind".to_string())]),
        };

        save_all(&store, &snapshot).await;
        assert_eq!(store.load().await, snapshot);
    }

    #[tokio::test]
    async fn test_roundtrip_multi_entry_unicode() {
        let (_dir, store) = store().await;
        let snapshot = Snapshot {
            config: Some(BotConfig::new("१००", Some("✨")).unwrap()),
            locks: BTreeMap::from([
                (
                    ThreadId::from("T1"),
                    ThreadLocks {
                        name: Some("🔥 Dost Log 🔥".into()),
                        nickname: Some("ヒーロー".into()),
                        emoji: true,
                        ..Default::default()
                    },
                ),
                (
                    ThreadId::from("T2"),
                    ThreadLocks {
                        photo: true,
                        theme: true,
                        ..Default::default()
                    },
                ),
            ]),
            bans: BTreeSet::from([UserId::from("U9"), UserId::from("U10")]),
            mutes: BTreeSet::from([ThreadId::from("T1"), ThreadId::from("T2")]),
            rules: BTreeMap::from([
                (ThreadId::from("T1"), "नियम: spam मत करो".to_string()),
                (ThreadId::from("T2"), "Règle n°1 : soyez gentils".to_string()),
            ]),
        };

        save_all(&store, &snapshot).await;
        assert_eq!(store.load().await, snapshot);
    }

    #[tokio::test]
    async fn test_malformed_category_loads_empty_without_affecting_others() {
        let (_dir, store) = store().await;
        store
            .save(Record::Bans(BTreeSet::from([UserId::from("U9")])))
            .await
            .unwrap();
        tokio::fs::write(store.path_for(Category::Locks), "{ not json").await.unwrap();
        tokio::fs::write(
            store.path_for(Category::Rules),
            r#"{"version": 99, "data": {"T1": "x"}}"#,
        )
        .await
        .unwrap();

        let snapshot = store.load().await;
        assert!(snapshot.locks.is_empty());
        assert!(snapshot.rules.is_empty());
        assert_eq!(snapshot.bans, BTreeSet::from([UserId::from("U9")]));
    }

    #[tokio::test]
    async fn test_save_leaves_no_temp_files() {
        let (_dir, store) = store().await;
        store.save(Record::Mutes(BTreeSet::from([ThreadId::from("T1")]))).await.unwrap();
        store.save(Record::Mutes(BTreeSet::new())).await.unwrap();

        let mut entries = tokio::fs::read_dir(store.base_path()).await.unwrap();
        let mut names = Vec::new();
        while let Some(entry) = entries.next_entry().await.unwrap() {
            names.push(entry.file_name().to_string_lossy().into_owned());
        }
        assert_eq!(names, vec!["mutes.json".to_string()]);
    }

    #[tokio::test]
    async fn test_file_layout_is_versioned_and_sparse() {
        let (_dir, store) = store().await;
        store
            .save(Record::Locks(BTreeMap::from([(
                ThreadId::from("T1"),
                ThreadLocks {
                    name: Some("Study Group".into()),
                    ..Default::default()
                },
            )])))
            .await
            .unwrap();

        let raw = tokio::fs::read_to_string(store.path_for(Category::Locks)).await.unwrap();
        let value: serde_json::Value = serde_json::from_str(&raw).unwrap();
        assert_eq!(
            value,
            serde_json::json!({ "version": 1, "data": { "T1": { "name": "Study Group" } } })
        );
    }
}
