use crate::domain::model::{Batch, Collection, RecordKind};
use crate::domain::ports::Storage;
use crate::utils::error::{Result, StatsError};
use serde_json::Value;
use std::io::ErrorKind;

/// Owns reading and writing of collection and batch documents.
///
/// One load per invocation; the caller holds the in-memory copy and hands it
/// back to `save_collection`. Paths are always passed in explicitly.
#[derive(Debug, Clone)]
pub struct CollectionStore<S: Storage> {
    storage: S,
}

impl<S: Storage> CollectionStore<S> {
    pub fn new(storage: S) -> Self {
        Self { storage }
    }

    pub fn storage(&self) -> &S {
        &self.storage
    }

    /// The collection must already exist; it is never created implicitly.
    pub async fn load_collection(&self, kind: RecordKind, path: &str) -> Result<Collection> {
        let bytes = match self.storage.read_file(path).await {
            Ok(bytes) => bytes,
            Err(StatsError::IoError(e)) if e.kind() == ErrorKind::NotFound => {
                return Err(StatsError::MissingCollection {
                    path: path.to_string(),
                })
            }
            Err(e) => return Err(e),
        };

        let value = parse_json(&bytes, path)?;
        let collection = Collection::from_value(kind, value, path)?;
        tracing::debug!("Loaded {} {} from {}", collection.len(), kind, path);
        Ok(collection)
    }

    pub async fn save_collection(&self, path: &str, collection: &Collection) -> Result<()> {
        self.write_json(path, &collection.to_value()).await?;
        tracing::debug!("Saved {} {} to {}", collection.len(), collection.kind, path);
        Ok(())
    }

    /// A batch file that does not exist yet reads as an empty batch.
    pub async fn load_batch(&self, kind: RecordKind, path: &str) -> Result<Batch> {
        let bytes = match self.storage.read_file(path).await {
            Ok(bytes) => bytes,
            Err(StatsError::IoError(e)) if e.kind() == ErrorKind::NotFound => {
                tracing::warn!("No batch file at {}, nothing to merge", path);
                return Ok(Batch::empty(kind));
            }
            Err(e) => return Err(e),
        };

        let value = parse_json(&bytes, path)?;
        Batch::from_value(kind, value, path)
    }

    pub async fn save_batch(&self, path: &str, batch: &Batch, exported_at: String) -> Result<()> {
        self.write_json(path, &batch.to_document(exported_at)).await
    }

    pub async fn reset_batch(&self, kind: RecordKind, path: &str) -> Result<()> {
        self.write_json(path, &Batch::reset_document(kind)).await?;
        tracing::debug!("Reset batch file {}", path);
        Ok(())
    }

    pub async fn write_json(&self, path: &str, value: &Value) -> Result<()> {
        let data = serde_json::to_vec_pretty(value)?;
        self.storage.write_file(path, &data).await
    }
}

pub fn parse_json(bytes: &[u8], source_name: &str) -> Result<Value> {
    serde_json::from_slice(bytes).map_err(|e| StatsError::malformed(source_name, e.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::collections::HashMap;
    use std::sync::Arc;
    use tokio::sync::Mutex;

    #[derive(Clone, Default)]
    struct MockStorage {
        files: Arc<Mutex<HashMap<String, Vec<u8>>>>,
    }

    impl MockStorage {
        async fn put(&self, path: &str, value: Value) {
            let mut files = self.files.lock().await;
            files.insert(path.to_string(), serde_json::to_vec(&value).unwrap());
        }

        async fn get_json(&self, path: &str) -> Option<Value> {
            let files = self.files.lock().await;
            files.get(path).map(|b| serde_json::from_slice(b).unwrap())
        }
    }

    impl Storage for MockStorage {
        async fn read_file(&self, path: &str) -> Result<Vec<u8>> {
            let files = self.files.lock().await;
            files.get(path).cloned().ok_or_else(|| {
                StatsError::IoError(std::io::Error::new(
                    ErrorKind::NotFound,
                    format!("File not found: {}", path),
                ))
            })
        }

        async fn write_file(&self, path: &str, data: &[u8]) -> Result<()> {
            let mut files = self.files.lock().await;
            files.insert(path.to_string(), data.to_vec());
            Ok(())
        }
    }

    #[tokio::test]
    async fn test_missing_collection_is_reported() {
        let store = CollectionStore::new(MockStorage::default());

        let err = store
            .load_collection(RecordKind::Games, "docs/data/detailed_games.json")
            .await
            .unwrap_err();

        assert!(matches!(err, StatsError::MissingCollection { .. }));
    }

    #[tokio::test]
    async fn test_missing_batch_is_empty() {
        let store = CollectionStore::new(MockStorage::default());

        let batch = store
            .load_batch(RecordKind::Logs, "scraper/new_logs.json")
            .await
            .unwrap();

        assert!(batch.is_empty());
    }

    #[tokio::test]
    async fn test_invalid_json_is_malformed_input() {
        let storage = MockStorage::default();
        {
            let mut files = storage.files.lock().await;
            files.insert("new_games.json".to_string(), b"{\"games\": [".to_vec());
        }
        let store = CollectionStore::new(storage);

        let err = store
            .load_batch(RecordKind::Games, "new_games.json")
            .await
            .unwrap_err();

        assert!(matches!(err, StatsError::MalformedInput { .. }));
        assert!(err.to_string().contains("new_games.json"));
    }

    #[tokio::test]
    async fn test_collection_round_trips_through_storage() {
        let storage = MockStorage::default();
        storage
            .put(
                "games.json",
                json!({"exportedAt": "x", "totalGames": 1, "games": [{"tableId": "1", "map": "Map 2"}]}),
            )
            .await;
        let store = CollectionStore::new(storage.clone());

        let collection = store
            .load_collection(RecordKind::Games, "games.json")
            .await
            .unwrap();
        store.save_collection("games.json", &collection).await.unwrap();

        assert_eq!(
            storage.get_json("games.json").await.unwrap(),
            json!({"exportedAt": "x", "totalGames": 1, "games": [{"tableId": "1", "map": "Map 2"}]})
        );
    }

    #[tokio::test]
    async fn test_reset_batch_writes_empty_list() {
        let storage = MockStorage::default();
        storage
            .put("new_logs.json", json!({"logs": [{"tableId": "1"}]}))
            .await;
        let store = CollectionStore::new(storage.clone());

        store
            .reset_batch(RecordKind::Logs, "new_logs.json")
            .await
            .unwrap();

        assert_eq!(
            storage.get_json("new_logs.json").await.unwrap(),
            json!({"logs": []})
        );
    }
}
