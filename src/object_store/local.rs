use super::{
    IfMatch, ObjectStat, ObjectStore, ObjectStoreError, Result, compute_etag, paginate,
};
use std::fs::{self, File};
use std::io::{ErrorKind, Write};
use std::path::{Component, Path, PathBuf};

use tracing::debug;

/// Stores each bucket as a directory under `root`, objects as files beneath it.
///
/// Conditional puts check then write and are not atomic.
pub struct LocalStore {
    root: PathBuf,
}

impl LocalStore {
    pub fn new<P: AsRef<Path>>(root: P) -> Self {
        Self {
            root: root.as_ref().to_path_buf(),
        }
    }

    fn bucket_path(&self, bucket: &str) -> Result<PathBuf> {
        if bucket.is_empty() || bucket.contains(['/', '\\']) || bucket == "." || bucket == ".." {
            return Err(ObjectStoreError::NoSuchBucket(bucket.to_string()));
        }
        Ok(self.root.join(bucket))
    }

    fn existing_bucket(&self, bucket: &str) -> Result<PathBuf> {
        let path = self.bucket_path(bucket)?;
        if path.is_dir() {
            Ok(path)
        } else {
            Err(ObjectStoreError::NoSuchBucket(bucket.to_string()))
        }
    }

    fn object_path(&self, bucket: &str, key: &str) -> Result<PathBuf> {
        let relative = Path::new(key);
        let escapes = relative
            .components()
            .any(|c| !matches!(c, Component::Normal(_)));
        if key.is_empty() || escapes {
            return Err(ObjectStoreError::InvalidKey(key.to_string()));
        }
        Ok(self.existing_bucket(bucket)?.join(relative))
    }
}

impl ObjectStore for LocalStore {
    fn probe(&self, bucket: &str, key: &str) -> Result<bool> {
        let path = self.object_path(bucket, key)?;
        match fs::metadata(&path) {
            Ok(meta) => Ok(meta.is_file()),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(false),
            Err(e) => Err(ObjectStoreError::Io(e)),
        }
    }

    fn get(&self, bucket: &str, key: &str) -> Result<Option<Vec<u8>>> {
        let path = self.object_path(bucket, key)?;
        match fs::read(&path) {
            Ok(data) => Ok(Some(data)),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(None),
            Err(e) => Err(ObjectStoreError::Io(e)),
        }
    }

    fn put(&self, bucket: &str, key: &str, body: &[u8], cond: IfMatch) -> Result<String> {
        let path = self.object_path(bucket, key)?;

        // Check preconditions
        match cond {
            IfMatch::Any => {}
            IfMatch::Tag(expected_etag) => match self.get(bucket, key)? {
                Some(data) if compute_etag(&data) == expected_etag => {}
                _ => return Err(ObjectStoreError::PreconditionFailed),
            },
            IfMatch::NoneMatch => {
                if self.probe(bucket, key)? {
                    return Err(ObjectStoreError::PreconditionFailed);
                }
            }
        }

        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }

        let mut file = File::create(&path)?;
        file.write_all(body)?;
        debug!(path = %path.display(), bytes = body.len(), "wrote object file");

        Ok(compute_etag(body))
    }

    fn delete(&self, bucket: &str, key: &str) -> Result<()> {
        let path = self.object_path(bucket, key)?;
        match fs::remove_file(&path) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(()),
            Err(e) => Err(ObjectStoreError::Io(e)),
        }
    }

    fn stat(&self, bucket: &str, key: &str) -> Result<Option<ObjectStat>> {
        let path = self.object_path(bucket, key)?;
        let meta = match fs::metadata(&path) {
            Ok(meta) if meta.is_file() => meta,
            Ok(_) => return Ok(None),
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(ObjectStoreError::Io(e)),
        };
        let data = fs::read(&path)?;
        Ok(Some(ObjectStat {
            size: meta.len(),
            last_modified: meta.modified().ok(),
            content_type: None,
            storage_class: None,
            etag: Some(compute_etag(&data)),
        }))
    }

    fn list(
        &self,
        bucket: &str,
        prefix: &str,
        continuation: Option<String>,
    ) -> Result<(Vec<String>, Option<String>)> {
        let bucket_root = self.existing_bucket(bucket)?;
        let mut keys = Vec::new();

        for entry in walkdir::WalkDir::new(&bucket_root)
            .into_iter()
            .filter_map(|e| e.ok())
            .filter(|e| e.file_type().is_file())
        {
            let Ok(rel_path) = entry.path().strip_prefix(&bucket_root) else {
                continue;
            };
            let key = rel_path
                .components()
                .map(|c| c.as_os_str().to_string_lossy())
                .collect::<Vec<_>>()
                .join("/");
            if key.starts_with(prefix) {
                keys.push(key);
            }
        }

        keys.sort();
        Ok(paginate(keys, continuation))
    }

    fn list_buckets(&self) -> Result<Vec<String>> {
        let entries = match fs::read_dir(&self.root) {
            Ok(entries) => entries,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(ObjectStoreError::Io(e)),
        };

        let mut names = Vec::new();
        for entry in entries {
            let entry = entry?;
            if entry.file_type()?.is_dir() {
                names.push(entry.file_name().to_string_lossy().into_owned());
            }
        }
        names.sort();
        Ok(names)
    }

    fn create_bucket(&self, name: &str, _region: &str) -> Result<()> {
        let path = self.bucket_path(name)?;
        fs::create_dir_all(&self.root)?;
        match fs::create_dir(&path) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == ErrorKind::AlreadyExists => Err(ObjectStoreError::service(
                "BucketAlreadyOwnedByYou",
                format!("bucket {name} already exists"),
            )),
            Err(e) => Err(ObjectStoreError::Io(e)),
        }
    }

    fn delete_bucket(&self, name: &str) -> Result<()> {
        let path = self.existing_bucket(name)?;
        let has_objects = walkdir::WalkDir::new(&path)
            .into_iter()
            .filter_map(|e| e.ok())
            .any(|e| e.file_type().is_file());
        if has_objects {
            return Err(ObjectStoreError::service(
                "BucketNotEmpty",
                format!("bucket {name} is not empty"),
            ));
        }
        fs::remove_dir_all(&path)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::object_store::test_helpers::tests::run_object_store_tests;
    use crate::object_store::{IfMatch, ObjectStore};
    use tempfile::TempDir;
    use uuid::Uuid;

    fn setup_store() -> (LocalStore, TempDir) {
        let tmp = TempDir::new().unwrap();
        let store = LocalStore::new(tmp.path());
        store.create_bucket("data", "us-east-1").unwrap();
        (store, tmp)
    }

    #[test]
    fn test_put_and_get() {
        let (store, _tmp) = setup_store();
        let etag = store.put("data", "foo.txt", b"hello", IfMatch::Any).unwrap();
        assert!(!etag.is_empty());

        let data = store.get("data", "foo.txt").unwrap();
        assert_eq!(data, Some(b"hello".to_vec()));
    }

    #[test]
    fn test_get_nonexistent() {
        let (store, _tmp) = setup_store();
        assert_eq!(store.get("data", "nope.txt").unwrap(), None);
        assert!(!store.probe("data", "nope.txt").unwrap());
    }

    #[test]
    fn test_conditional_put_tag_match() {
        let (store, _tmp) = setup_store();
        let etag1 = store.put("data", "bar.txt", b"one", IfMatch::Any).unwrap();

        let etag2 = store.put("data", "bar.txt", b"two", IfMatch::Tag(&etag1)).unwrap();
        assert_ne!(etag1, etag2);

        let data = store.get("data", "bar.txt").unwrap();
        assert_eq!(data, Some(b"two".to_vec()));
    }

    #[test]
    fn test_parent_dirs_created() {
        let (store, tmp) = setup_store();
        let nested_path = "nested/dir/structure/file.txt";
        store.put("data", nested_path, b"deep", IfMatch::Any).unwrap();

        let on_disk = fs::read(tmp.path().join("data").join(nested_path)).unwrap();
        assert_eq!(on_disk, b"deep");

        let (keys, _) = store.list("data", "nested/", None).unwrap();
        assert_eq!(keys, vec![nested_path.to_string()]);
    }

    #[test]
    fn test_rejects_keys_escaping_bucket() {
        let (store, _tmp) = setup_store();
        for key in ["../outside.txt", "/etc/passwd", "a/../../b"] {
            let result = store.put("data", key, b"x", IfMatch::Any);
            assert!(
                matches!(result, Err(ObjectStoreError::InvalidKey(_))),
                "key {key} should be rejected"
            );
        }
    }

    #[test]
    fn test_missing_bucket() {
        let (store, _tmp) = setup_store();
        let result = store.put("absent", "k", b"x", IfMatch::Any);
        assert!(matches!(result, Err(ObjectStoreError::NoSuchBucket(_))));
    }

    #[test]
    fn test_bucket_listing_and_delete() {
        let (store, _tmp) = setup_store();
        store.create_bucket("logs", "eu-west-1").unwrap();
        assert_eq!(store.list_buckets().unwrap(), vec!["data", "logs"]);

        store.put("logs", "a/b.txt", b"x", IfMatch::Any).unwrap();
        assert!(store.delete_bucket("logs").is_err());

        store.delete("logs", "a/b.txt").unwrap();
        store.delete_bucket("logs").unwrap();
        assert_eq!(store.list_buckets().unwrap(), vec!["data"]);
    }

    #[test]
    fn test_stat_matches_put_etag() {
        let (store, _tmp) = setup_store();
        let etag = store.put("data", "s.csv", b"a,b\n1,2\n", IfMatch::Any).unwrap();
        let stat = store.stat("data", "s.csv").unwrap().unwrap();
        assert_eq!(stat.size, 8);
        assert_eq!(stat.etag, Some(etag));
    }

    #[test]
    fn test_local_object_store() {
        let (store, _tmp) = setup_store();
        let prefix = format!("test/{}/", Uuid::new_v4());
        run_object_store_tests(&store, "data", &prefix);
    }
}
