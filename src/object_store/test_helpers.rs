use super::memory::InMemoryStore;
use super::{IfMatch, ObjectStat, ObjectStore, ObjectStoreError, Result};
use std::sync::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};

/// Forced outcome for [`ScriptedStore::probe`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProbeScript {
    /// Ask the wrapped store.
    Passthrough,
    Found,
    NotFound,
    /// Fail with a service error carrying this code.
    Fail(String),
}

/// Wraps an [`InMemoryStore`], overriding probe results and counting calls.
pub struct ScriptedStore {
    inner: InMemoryStore,
    probe_script: Mutex<ProbeScript>,
    put_error: Mutex<Option<String>>,
    probes: AtomicUsize,
    puts: AtomicUsize,
    last_body: Mutex<Option<Vec<u8>>>,
}

impl ScriptedStore {
    pub fn new(inner: InMemoryStore) -> Self {
        Self {
            inner,
            probe_script: Mutex::new(ProbeScript::Passthrough),
            put_error: Mutex::new(None),
            probes: AtomicUsize::new(0),
            puts: AtomicUsize::new(0),
            last_body: Mutex::new(None),
        }
    }

    pub fn script_probe(&self, script: ProbeScript) {
        *self.probe_script.lock().unwrap_or_else(|e| e.into_inner()) = script;
    }

    /// Makes every following put fail with a service error carrying `code`.
    pub fn fail_puts(&self, code: impl Into<String>) {
        *self.put_error.lock().unwrap_or_else(|e| e.into_inner()) = Some(code.into());
    }

    pub fn probe_calls(&self) -> usize {
        self.probes.load(Ordering::SeqCst)
    }

    pub fn put_calls(&self) -> usize {
        self.puts.load(Ordering::SeqCst)
    }

    pub fn last_body(&self) -> Option<Vec<u8>> {
        self.last_body
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .clone()
    }

    pub fn inner(&self) -> &InMemoryStore {
        &self.inner
    }
}

impl ObjectStore for ScriptedStore {
    fn probe(&self, bucket: &str, key: &str) -> Result<bool> {
        self.probes.fetch_add(1, Ordering::SeqCst);
        let script = self
            .probe_script
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .clone();
        match script {
            ProbeScript::Passthrough => self.inner.probe(bucket, key),
            ProbeScript::Found => Ok(true),
            ProbeScript::NotFound => Ok(false),
            ProbeScript::Fail(code) => Err(ObjectStoreError::service(
                code,
                format!("scripted probe failure for {bucket}/{key}"),
            )),
        }
    }

    fn get(&self, bucket: &str, key: &str) -> Result<Option<Vec<u8>>> {
        self.inner.get(bucket, key)
    }

    fn put(&self, bucket: &str, key: &str, body: &[u8], cond: IfMatch) -> Result<String> {
        self.puts.fetch_add(1, Ordering::SeqCst);
        *self.last_body.lock().unwrap_or_else(|e| e.into_inner()) = Some(body.to_vec());
        let failure = self
            .put_error
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .clone();
        if let Some(code) = failure {
            return Err(ObjectStoreError::service(code, "scripted put failure"));
        }
        self.inner.put(bucket, key, body, cond)
    }

    fn delete(&self, bucket: &str, key: &str) -> Result<()> {
        self.inner.delete(bucket, key)
    }

    fn stat(&self, bucket: &str, key: &str) -> Result<Option<ObjectStat>> {
        self.inner.stat(bucket, key)
    }

    fn list(
        &self,
        bucket: &str,
        prefix: &str,
        continuation: Option<String>,
    ) -> Result<(Vec<String>, Option<String>)> {
        self.inner.list(bucket, prefix, continuation)
    }

    fn list_buckets(&self) -> Result<Vec<String>> {
        self.inner.list_buckets()
    }

    fn create_bucket(&self, name: &str, region: &str) -> Result<()> {
        self.inner.create_bucket(name, region)
    }

    fn delete_bucket(&self, name: &str) -> Result<()> {
        self.inner.delete_bucket(name)
    }
}

pub mod tests {
    use crate::object_store::{IfMatch, ObjectStore, ObjectStoreError};

    // Generic tests for any ObjectStore implementation. `bucket` must exist.
    pub fn run_object_store_tests(store: &dyn ObjectStore, bucket: &str, prefix: &str) {
        // Probe before and after a put
        let key = format!("{}foo.txt", prefix);
        assert!(!store.probe(bucket, &key).unwrap());
        let etag = store.put(bucket, &key, b"hello", IfMatch::Any).unwrap();
        assert!(!etag.is_empty());
        assert!(store.probe(bucket, &key).unwrap());
        let data = store.get(bucket, &key).unwrap();
        assert_eq!(data, Some(b"hello".to_vec()));

        // Conditional put: Tag match
        let etag2 = store.put(bucket, &key, b"world", IfMatch::Tag(&etag)).unwrap();
        assert_ne!(etag, etag2);

        // Conditional put: Tag mismatch
        let result = store.put(bucket, &key, b"fail", IfMatch::Tag("wrong-etag"));
        assert!(matches!(result, Err(ObjectStoreError::PreconditionFailed)));

        // Conditional put: NoneMatch
        let key2 = format!("{}bar.txt", prefix);
        let etag3 = store.put(bucket, &key2, b"new", IfMatch::NoneMatch).unwrap();
        assert!(!etag3.is_empty());
        let result = store.put(bucket, &key2, b"fail", IfMatch::NoneMatch);
        assert!(matches!(result, Err(ObjectStoreError::PreconditionFailed)));
        assert_eq!(store.get(bucket, &key2).unwrap(), Some(b"new".to_vec()));

        // Stat
        let stat = store.stat(bucket, &key2).unwrap().expect("object should exist");
        assert_eq!(stat.size, 3);

        // List
        let (keys, _next) = store.list(bucket, prefix, None).unwrap();
        assert!(keys.contains(&key));
        assert!(keys.contains(&key2));

        // Delete is idempotent
        store.delete(bucket, &key).unwrap();
        store.delete(bucket, &key).unwrap();
        assert!(!store.probe(bucket, &key).unwrap());
        assert!(store.stat(bucket, &key).unwrap().is_none());
        store.delete(bucket, &key2).unwrap();
    }
}
