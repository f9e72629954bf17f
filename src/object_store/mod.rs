pub mod local;
pub mod memory;
pub mod s3;
#[cfg(any(test, feature = "test-helpers"))]
pub mod test_helpers;

use std::io;
use std::time::SystemTime;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum ObjectStoreError {
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),
    #[error("precondition failed")]
    PreconditionFailed,
    #[error("no such bucket: {0}")]
    NoSuchBucket(String),
    #[error("invalid key: {0}")]
    InvalidKey(String),
    #[error("{code}: {message}")]
    Service { code: String, message: String },
    #[error("{0}")]
    Other(String),
}

impl ObjectStoreError {
    pub fn service(code: impl Into<String>, message: impl Into<String>) -> Self {
        ObjectStoreError::Service {
            code: code.into(),
            message: message.into(),
        }
    }

    /// Short machine-readable reason, the service error code when there is one.
    pub fn reason(&self) -> String {
        match self {
            ObjectStoreError::Io(e) => format!("{:?}", e.kind()),
            ObjectStoreError::PreconditionFailed => "PreconditionFailed".to_string(),
            ObjectStoreError::NoSuchBucket(_) => "NoSuchBucket".to_string(),
            ObjectStoreError::InvalidKey(_) => "InvalidKey".to_string(),
            ObjectStoreError::Service { code, .. } => code.clone(),
            ObjectStoreError::Other(msg) => msg.clone(),
        }
    }
}

pub type Result<T> = std::result::Result<T, ObjectStoreError>;

#[derive(Debug, Clone, Default)]
pub enum IfMatch<'a> {
    #[default]
    Any,
    Tag(&'a str),
    NoneMatch,
}

/// Metadata returned by a stat call.
#[derive(Debug, Clone, PartialEq)]
pub struct ObjectStat {
    pub size: u64,
    pub last_modified: Option<SystemTime>,
    pub content_type: Option<String>,
    pub storage_class: Option<String>,
    pub etag: Option<String>,
}

/// Capability interface over a bucketed object store.
///
/// `probe` distinguishes an explicit "not found" (`Ok(false)`) from every
/// other failure (`Err`), which callers must not read as absence.
pub trait ObjectStore {
    fn probe(&self, bucket: &str, key: &str) -> Result<bool>;
    fn get(&self, bucket: &str, key: &str) -> Result<Option<Vec<u8>>>;
    fn put(&self, bucket: &str, key: &str, body: &[u8], cond: IfMatch) -> Result<String>;
    fn delete(&self, bucket: &str, key: &str) -> Result<()>;
    fn stat(&self, bucket: &str, key: &str) -> Result<Option<ObjectStat>>;
    fn list(
        &self,
        bucket: &str,
        prefix: &str,
        continuation: Option<String>,
    ) -> Result<(Vec<String>, Option<String>)>;

    fn list_buckets(&self) -> Result<Vec<String>>;
    fn create_bucket(&self, name: &str, region: &str) -> Result<()>;
    fn delete_bucket(&self, name: &str) -> Result<()>;
}

pub(crate) const PAGE_SIZE: usize = 1000;

pub(crate) fn compute_etag(data: &[u8]) -> String {
    format!("{:x}", md5::compute(data))
}

/// Pages a sorted key list. The continuation token is the last key of the
/// previous page.
pub(crate) fn paginate(
    keys: Vec<String>,
    continuation: Option<String>,
) -> (Vec<String>, Option<String>) {
    let start = match continuation {
        Some(token) => keys.partition_point(|k| k <= &token),
        None => 0,
    };
    let end = (start + PAGE_SIZE).min(keys.len());
    let next_token = if end < keys.len() {
        Some(keys[end - 1].clone())
    } else {
        None
    };
    (keys[start..end].to_vec(), next_token)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_paginate_splits_on_page_size() {
        let keys: Vec<String> = (0..2500).map(|i| format!("k{i:05}")).collect();

        let (page1, next) = paginate(keys.clone(), None);
        assert_eq!(page1.len(), PAGE_SIZE);
        assert_eq!(next.as_deref(), Some("k00999"));

        let (page2, next) = paginate(keys.clone(), next);
        assert_eq!(page2[0], "k01000");
        assert_eq!(page2.len(), PAGE_SIZE);

        let (page3, next) = paginate(keys, next);
        assert_eq!(page3.len(), 500);
        assert!(next.is_none());
    }

    #[test]
    fn test_paginate_past_end_is_empty() {
        let keys = vec!["a".to_string(), "b".to_string()];
        let (page, next) = paginate(keys, Some("z".to_string()));
        assert!(page.is_empty());
        assert!(next.is_none());
    }

    #[test]
    fn test_reason_prefers_service_code() {
        let err = ObjectStoreError::service("AccessDenied", "HeadObject: forbidden");
        assert_eq!(err.reason(), "AccessDenied");
        assert_eq!(ObjectStoreError::NoSuchBucket("b".into()).reason(), "NoSuchBucket");
    }
}
