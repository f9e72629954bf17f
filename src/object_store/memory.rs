use super::{
    IfMatch, ObjectStat, ObjectStore, ObjectStoreError, Result, compute_etag, paginate,
};
use std::collections::{BTreeMap, HashMap};
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::SystemTime;

struct StoredObject {
    data: Vec<u8>,
    etag: String,
    last_modified: SystemTime,
}

type Buckets = HashMap<String, BTreeMap<String, StoredObject>>;

#[derive(Clone, Default)]
pub struct InMemoryStore {
    buckets: Arc<Mutex<Buckets>>,
}

impl InMemoryStore {
    pub fn with_buckets<I, S>(names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let store = Self::default();
        {
            let mut buckets = store.lock();
            for name in names {
                buckets.entry(name.into()).or_default();
            }
        }
        store
    }

    // A poisoned lock only means another thread panicked mid-call; the map
    // itself is never left half-updated.
    fn lock(&self) -> MutexGuard<'_, Buckets> {
        self.buckets.lock().unwrap_or_else(|e| e.into_inner())
    }
}

fn bucket<'a>(
    buckets: &'a Buckets,
    name: &str,
) -> Result<&'a BTreeMap<String, StoredObject>> {
    buckets
        .get(name)
        .ok_or_else(|| ObjectStoreError::NoSuchBucket(name.to_string()))
}

fn bucket_mut<'a>(
    buckets: &'a mut Buckets,
    name: &str,
) -> Result<&'a mut BTreeMap<String, StoredObject>> {
    buckets
        .get_mut(name)
        .ok_or_else(|| ObjectStoreError::NoSuchBucket(name.to_string()))
}

impl ObjectStore for InMemoryStore {
    fn probe(&self, bucket_name: &str, key: &str) -> Result<bool> {
        let buckets = self.lock();
        Ok(bucket(&buckets, bucket_name)?.contains_key(key))
    }

    fn get(&self, bucket_name: &str, key: &str) -> Result<Option<Vec<u8>>> {
        let buckets = self.lock();
        Ok(bucket(&buckets, bucket_name)?
            .get(key)
            .map(|obj| obj.data.clone()))
    }

    fn put(&self, bucket_name: &str, key: &str, body: &[u8], cond: IfMatch) -> Result<String> {
        let mut buckets = self.lock();
        let objects = bucket_mut(&mut buckets, bucket_name)?;

        match cond {
            IfMatch::Any => {}
            IfMatch::Tag(expected_etag) => match objects.get(key) {
                Some(obj) if obj.etag == expected_etag => {}
                _ => return Err(ObjectStoreError::PreconditionFailed),
            },
            IfMatch::NoneMatch => {
                if objects.contains_key(key) {
                    return Err(ObjectStoreError::PreconditionFailed);
                }
            }
        }

        let etag = compute_etag(body);
        objects.insert(
            key.to_string(),
            StoredObject {
                data: body.to_vec(),
                etag: etag.clone(),
                last_modified: SystemTime::now(),
            },
        );
        Ok(etag)
    }

    fn delete(&self, bucket_name: &str, key: &str) -> Result<()> {
        let mut buckets = self.lock();
        bucket_mut(&mut buckets, bucket_name)?.remove(key);
        Ok(())
    }

    fn stat(&self, bucket_name: &str, key: &str) -> Result<Option<ObjectStat>> {
        let buckets = self.lock();
        Ok(bucket(&buckets, bucket_name)?.get(key).map(|obj| ObjectStat {
            size: obj.data.len() as u64,
            last_modified: Some(obj.last_modified),
            content_type: None,
            storage_class: None,
            etag: Some(obj.etag.clone()),
        }))
    }

    fn list(
        &self,
        bucket_name: &str,
        prefix: &str,
        continuation: Option<String>,
    ) -> Result<(Vec<String>, Option<String>)> {
        let buckets = self.lock();
        let keys: Vec<String> = bucket(&buckets, bucket_name)?
            .keys()
            .filter(|k| k.starts_with(prefix))
            .cloned()
            .collect();
        Ok(paginate(keys, continuation))
    }

    fn list_buckets(&self) -> Result<Vec<String>> {
        let mut names: Vec<String> = self.lock().keys().cloned().collect();
        names.sort();
        Ok(names)
    }

    fn create_bucket(&self, name: &str, _region: &str) -> Result<()> {
        let mut buckets = self.lock();
        if buckets.contains_key(name) {
            return Err(ObjectStoreError::service(
                "BucketAlreadyOwnedByYou",
                format!("bucket {name} already exists"),
            ));
        }
        buckets.insert(name.to_string(), BTreeMap::new());
        Ok(())
    }

    fn delete_bucket(&self, name: &str) -> Result<()> {
        let mut buckets = self.lock();
        if !bucket(&buckets, name)?.is_empty() {
            return Err(ObjectStoreError::service(
                "BucketNotEmpty",
                format!("bucket {name} is not empty"),
            ));
        }
        buckets.remove(name);
        Ok(())
    }
}
