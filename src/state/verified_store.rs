use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::{debug, info};

use crate::error::{GateError, Result};

const TABLE_VERSION: u32 = 1;

/// A user who completed the OAuth verification flow
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VerifiedUser {
    /// Discord user ID (snowflake as string)
    pub id: String,

    /// `username#discriminator` at verification time
    pub display_name: String,

    /// First successful verification, never updated
    pub verified_at: DateTime<Utc>,
}

impl VerifiedUser {
    pub fn new(id: impl Into<String>, display_name: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            display_name: display_name.into(),
            verified_at: Utc::now(),
        }
    }
}

/// On-disk layout of the verified users table
#[derive(Debug, Clone, Serialize, Deserialize)]
struct UserTable {
    version: u32,
    last_updated: DateTime<Utc>,
    /// Insertion order
    users: Vec<VerifiedUser>,
}

impl Default for UserTable {
    fn default() -> Self {
        Self {
            version: TABLE_VERSION,
            last_updated: Utc::now(),
            users: Vec::new(),
        }
    }
}

impl UserTable {
    fn contains(&self, id: &str) -> bool {
        self.users.iter().any(|u| u.id == id)
    }
}

/// Single-table store of verified users, persisted as JSON
///
/// Every mutation happens under one write lock and is saved before the lock
/// is released, so concurrent callbacks for the same user insert at most once.
#[derive(Debug)]
pub struct VerifiedStore {
    path: Option<PathBuf>,
    table: RwLock<UserTable>,
}

impl VerifiedStore {
    /// Store that is never written to disk
    #[cfg(test)]
    pub fn in_memory() -> Self {
        Self {
            path: None,
            table: RwLock::new(UserTable::default()),
        }
    }

    /// Load from a JSON file, or start empty if it does not exist yet
    pub async fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref().to_path_buf();
        let path_str = path.display().to_string();

        let table = match tokio::fs::read_to_string(&path).await {
            Ok(content) => {
                let table: UserTable =
                    serde_json::from_str(&content).map_err(|e| GateError::StoreParse {
                        path: path_str.clone(),
                        source: e,
                    })?;
                debug!(
                    "Loaded verified users table v{} from {}",
                    table.version, path_str
                );
                table
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                info!("No verified users file at {}, starting empty", path_str);
                UserTable::default()
            }
            Err(e) => {
                return Err(GateError::StoreLoad {
                    path: path_str,
                    source: e,
                })
            }
        };

        Ok(Self {
            path: Some(path),
            table: RwLock::new(table),
        })
    }

    pub async fn exists(&self, id: &str) -> bool {
        self.table.read().await.contains(id)
    }

    pub async fn get(&self, id: &str) -> Option<VerifiedUser> {
        self.table
            .read()
            .await
            .users
            .iter()
            .find(|u| u.id == id)
            .cloned()
    }

    /// Insert a new record, failing with `DuplicateKey` if the id is taken
    pub async fn insert(&self, user: VerifiedUser) -> Result<()> {
        let mut table = self.table.write().await;
        if table.contains(&user.id) {
            return Err(GateError::DuplicateKey { id: user.id });
        }
        self.commit(&mut table, user).await
    }

    /// Insert the record unless one with the same id exists.
    ///
    /// Returns whether the record was inserted. An existing record is left
    /// untouched.
    pub async fn insert_if_absent(&self, user: VerifiedUser) -> Result<bool> {
        match self.insert(user).await {
            Ok(()) => Ok(true),
            Err(GateError::DuplicateKey { .. }) => Ok(false),
            Err(e) => Err(e),
        }
    }

    pub async fn count(&self) -> usize {
        self.table.read().await.users.len()
    }

    /// All records in insertion order
    pub async fn list_all(&self) -> Vec<VerifiedUser> {
        self.table.read().await.users.clone()
    }

    /// Export the whole table as pretty JSON (for download)
    pub async fn export(&self) -> Result<Vec<u8>> {
        let table = self.table.read().await;
        serde_json::to_vec_pretty(&*table).map_err(|e| e.into())
    }

    /// Append and persist; the append is undone if the save fails
    async fn commit(&self, table: &mut UserTable, user: VerifiedUser) -> Result<()> {
        let previous_update = table.last_updated;
        table.users.push(user);
        table.last_updated = Utc::now();

        if let Err(e) = self.save(table).await {
            table.users.pop();
            table.last_updated = previous_update;
            return Err(e);
        }
        Ok(())
    }

    /// Write to a temp file first, then rename over the real one
    async fn save(&self, table: &UserTable) -> Result<()> {
        let Some(path) = &self.path else {
            return Ok(());
        };
        let path_str = path.display().to_string();
        let save_err = |source: std::io::Error| GateError::StoreSave {
            path: path_str.clone(),
            source,
        };

        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            tokio::fs::create_dir_all(parent).await.map_err(save_err)?;
        }

        let content = serde_json::to_string_pretty(table)?;
        let mut temp_path = path.clone().into_os_string();
        temp_path.push(".tmp");

        tokio::fs::write(&temp_path, &content)
            .await
            .map_err(save_err)?;
        tokio::fs::rename(&temp_path, path)
            .await
            .map_err(save_err)?;

        Ok(())
    }
}

pub type SharedVerifiedStore = Arc<VerifiedStore>;

pub fn create_shared_verified_store(store: VerifiedStore) -> SharedVerifiedStore {
    Arc::new(store)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_insert_if_absent_keeps_first_record() {
        let store = VerifiedStore::in_memory();
        let first = VerifiedUser::new("42", "Ann#0001");
        let original_time = first.verified_at;

        assert!(store.insert_if_absent(first).await.unwrap());

        let mut again = VerifiedUser::new("42", "Ann#9999");
        again.verified_at = original_time + chrono::Duration::hours(1);
        assert!(!store.insert_if_absent(again).await.unwrap());

        assert_eq!(store.count().await, 1);
        let stored = store.get("42").await.unwrap();
        assert_eq!(stored.display_name, "Ann#0001");
        assert_eq!(stored.verified_at, original_time);
    }

    #[tokio::test]
    async fn test_insert_rejects_duplicate() {
        let store = VerifiedStore::in_memory();
        store.insert(VerifiedUser::new("1", "a#0001")).await.unwrap();

        let err = store
            .insert(VerifiedUser::new("1", "b#0002"))
            .await
            .unwrap_err();
        assert!(matches!(err, GateError::DuplicateKey { ref id } if id == "1"));
        assert_eq!(store.count().await, 1);
    }

    #[tokio::test]
    async fn test_list_all_in_insertion_order() {
        let store = VerifiedStore::in_memory();
        for id in ["30", "10", "20"] {
            store
                .insert_if_absent(VerifiedUser::new(id, format!("user{}#0001", id)))
                .await
                .unwrap();
        }

        let ids: Vec<String> = store.list_all().await.into_iter().map(|u| u.id).collect();
        assert_eq!(ids, vec!["30", "10", "20"]);
        assert!(store.exists("10").await);
        assert!(!store.exists("40").await);
    }

    #[tokio::test]
    async fn test_concurrent_insert_if_absent_inserts_once() {
        let store = Arc::new(VerifiedStore::in_memory());

        let handles: Vec<_> = (0..16)
            .map(|_| {
                let store = store.clone();
                tokio::spawn(async move {
                    store
                        .insert_if_absent(VerifiedUser::new("42", "Ann#0001"))
                        .await
                        .unwrap()
                })
            })
            .collect();

        let mut inserted = 0;
        for handle in handles {
            if handle.await.unwrap() {
                inserted += 1;
            }
        }

        assert_eq!(inserted, 1);
        assert_eq!(store.count().await, 1);
    }

    #[tokio::test]
    async fn test_persists_and_reloads() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("verified.json");

        let store = VerifiedStore::load(&path).await.unwrap();
        assert_eq!(store.count().await, 0);
        store
            .insert_if_absent(VerifiedUser::new("42", "Ann#0001"))
            .await
            .unwrap();
        store
            .insert_if_absent(VerifiedUser::new("7", "Bob#1234"))
            .await
            .unwrap();
        let before = store.list_all().await;

        let reloaded = VerifiedStore::load(&path).await.unwrap();
        assert_eq!(reloaded.list_all().await, before);
        assert!(!path.with_extension("json.tmp").exists());
    }

    #[tokio::test]
    async fn test_load_rejects_corrupt_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("verified.json");
        std::fs::write(&path, "not json").unwrap();

        let err = VerifiedStore::load(&path).await.unwrap_err();
        assert!(matches!(err, GateError::StoreParse { .. }));
    }

    #[tokio::test]
    async fn test_failed_save_rolls_back() {
        let dir = tempfile::tempdir().unwrap();
        // A directory where the file should be makes the rename fail
        let path = dir.path().join("verified.json");
        std::fs::create_dir(&path).unwrap();
        std::fs::write(path.join("keep"), "x").unwrap();

        let store = VerifiedStore {
            path: Some(path),
            table: RwLock::new(UserTable::default()),
        };
        let result = store
            .insert_if_absent(VerifiedUser::new("42", "Ann#0001"))
            .await;

        assert!(matches!(result, Err(GateError::StoreSave { .. })));
        assert_eq!(store.count().await, 0);
    }

    #[tokio::test]
    async fn test_export_is_json_table() {
        let store = VerifiedStore::in_memory();
        store
            .insert_if_absent(VerifiedUser::new("42", "Ann#0001"))
            .await
            .unwrap();

        let bytes = store.export().await.unwrap();
        let value: serde_json::Value = serde_json::from_slice(&bytes).unwrap();
        assert_eq!(value["version"], 1);
        assert_eq!(value["users"][0]["id"], "42");
        assert_eq!(value["users"][0]["display_name"], "Ann#0001");
    }
}
