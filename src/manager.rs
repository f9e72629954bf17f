use crate::destination::Destination;
use crate::object_store::{ObjectStat, ObjectStore, ObjectStoreError};
use crate::payload::{Payload, PayloadError, Table};
use crate::writer::{ConditionalWriter, WriteError, WriteMode, WriteOutcome};
use thiserror::Error;
use tracing::info;

#[derive(Debug, Error)]
pub enum ManagerError {
    #[error(transparent)]
    Store(#[from] ObjectStoreError),
    #[error("object not found: s3://{bucket}/{key}")]
    NotFound { bucket: String, key: String },
    #[error("object is not a readable table: {0}")]
    Table(#[from] PayloadError),
    #[error(transparent)]
    Write(#[from] WriteError),
}

impl ManagerError {
    fn not_found(destination: &Destination) -> Self {
        ManagerError::NotFound {
            bucket: destination.bucket().to_string(),
            key: destination.key().to_string(),
        }
    }
}

pub type Result<T> = std::result::Result<T, ManagerError>;

/// Bucket and object operations over one store.
pub struct StorageManager {
    store: Box<dyn ObjectStore>,
}

impl StorageManager {
    pub fn new(store: Box<dyn ObjectStore>) -> Self {
        Self { store }
    }

    pub fn store(&self) -> &dyn ObjectStore {
        self.store.as_ref()
    }

    pub fn list_buckets(&self) -> Result<Vec<String>> {
        Ok(self.store.list_buckets()?)
    }

    pub fn create_bucket(&self, name: &str, region: &str) -> Result<()> {
        self.store.create_bucket(name, region)?;
        info!(bucket = name, region, "bucket created");
        Ok(())
    }

    pub fn delete_bucket(&self, name: &str) -> Result<()> {
        self.store.delete_bucket(name)?;
        info!(bucket = name, "bucket deleted");
        Ok(())
    }

    /// Uploads unless the destination already exists.
    pub fn upload(
        &self,
        destination: &Destination,
        payload: Payload,
        mode: WriteMode,
    ) -> Result<WriteOutcome> {
        let writer = ConditionalWriter::new(self.store.as_ref()).with_mode(mode);
        Ok(writer.put(destination, payload)?)
    }

    pub fn download(&self, destination: &Destination) -> Result<Vec<u8>> {
        self.store
            .get(destination.bucket(), destination.key())?
            .ok_or_else(|| ManagerError::not_found(destination))
    }

    /// Downloads a CSV object and parses it, header row first.
    pub fn download_table(&self, destination: &Destination) -> Result<Table> {
        let bytes = self.download(destination)?;
        Ok(Table::from_csv(&bytes)?)
    }

    pub fn delete_object(&self, destination: &Destination) -> Result<()> {
        self.store.delete(destination.bucket(), destination.key())?;
        info!(bucket = destination.bucket(), key = destination.key(), "object deleted");
        Ok(())
    }

    pub fn stat_object(&self, destination: &Destination) -> Result<ObjectStat> {
        self.store
            .stat(destination.bucket(), destination.key())?
            .ok_or_else(|| ManagerError::not_found(destination))
    }

    /// Lists every key under `prefix`, following continuation tokens.
    pub fn list_objects(&self, bucket: &str, prefix: &str) -> Result<Vec<String>> {
        let mut keys = Vec::new();
        let mut continuation = None;
        loop {
            let (page, next) = self.store.list(bucket, prefix, continuation)?;
            keys.extend(page);
            match next {
                Some(token) => continuation = Some(token),
                None => break,
            }
        }
        Ok(keys)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::object_store::IfMatch;
    use crate::object_store::memory::InMemoryStore;

    fn manager() -> StorageManager {
        StorageManager::new(Box::new(InMemoryStore::with_buckets(["reports"])))
    }

    #[test]
    fn test_upload_then_download_table() {
        let manager = manager();
        let dest = Destination::new("reports", "2024/q1.csv");
        let mut table = Table::new(["id", "val"]);
        table.push_row(["1", "10.5"]);
        table.push_row(["2", "7"]);

        let outcome = manager
            .upload(&dest, Payload::Tabular(table.clone()), WriteMode::Unconditional)
            .unwrap();
        assert_eq!(outcome, WriteOutcome::Written);
        assert_eq!(manager.download_table(&dest).unwrap(), table);
    }

    #[test]
    fn test_missing_object_is_not_found() {
        let manager = manager();
        let dest = Destination::new("reports", "nothing.csv");
        assert!(matches!(manager.download(&dest), Err(ManagerError::NotFound { .. })));
        assert!(matches!(manager.stat_object(&dest), Err(ManagerError::NotFound { .. })));
    }

    #[test]
    fn test_download_table_rejects_ragged_csv() {
        let manager = manager();
        manager
            .store()
            .put("reports", "bad.csv", b"a,b\n1\n", IfMatch::Any)
            .unwrap();
        let result = manager.download_table(&Destination::new("reports", "bad.csv"));
        assert!(matches!(result, Err(ManagerError::Table(_))));
    }

    #[test]
    fn test_list_objects_follows_pages() {
        let manager = manager();
        for i in 0..1203 {
            manager
                .store()
                .put("reports", &format!("daily/{i:04}.csv"), b"x", IfMatch::Any)
                .unwrap();
        }
        manager.store().put("reports", "other.csv", b"x", IfMatch::Any).unwrap();

        let keys = manager.list_objects("reports", "daily/").unwrap();
        assert_eq!(keys.len(), 1203);
        assert_eq!(keys.first().map(String::as_str), Some("daily/0000.csv"));
        assert_eq!(keys.last().map(String::as_str), Some("daily/1202.csv"));
    }

    #[test]
    fn test_bucket_operations() {
        let manager = manager();
        manager.create_bucket("archive", "eu-west-1").unwrap();
        assert_eq!(manager.list_buckets().unwrap(), vec!["archive", "reports"]);
        manager.delete_bucket("archive").unwrap();
        assert_eq!(manager.list_buckets().unwrap(), vec!["reports"]);
    }

    #[test]
    fn test_delete_object_then_upload_writes_again() {
        let manager = manager();
        let dest = Destination::new("reports", "a.bin");
        let payload = || Payload::RawBytes(b"abc".to_vec());

        assert_eq!(manager.upload(&dest, payload(), WriteMode::IfAbsent).unwrap(), WriteOutcome::Written);
        assert_eq!(manager.upload(&dest, payload(), WriteMode::IfAbsent).unwrap(), WriteOutcome::Skipped);
        manager.delete_object(&dest).unwrap();
        assert_eq!(manager.upload(&dest, payload(), WriteMode::IfAbsent).unwrap(), WriteOutcome::Written);
        assert_eq!(manager.stat_object(&dest).unwrap().size, 3);
    }
}
