use std::fmt;
use std::net::IpAddr;

const MAX_KEY_BYTES: usize = 1024;

/// A bucket and key naming one object slot.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Destination {
    bucket: String,
    key: String,
}

impl Destination {
    pub fn new(bucket: impl Into<String>, key: impl Into<String>) -> Self {
        Self {
            bucket: bucket.into(),
            key: key.into(),
        }
    }

    pub fn bucket(&self) -> &str {
        &self.bucket
    }

    pub fn key(&self) -> &str {
        &self.key
    }

    /// Checks bucket naming rules and key length. Returns the reason on failure.
    pub fn validate(&self) -> Result<(), String> {
        validate_bucket(&self.bucket)?;
        if self.key.is_empty() {
            return Err("key must not be empty".to_string());
        }
        if self.key.len() > MAX_KEY_BYTES {
            return Err(format!(
                "key is {} bytes, limit is {MAX_KEY_BYTES}",
                self.key.len()
            ));
        }
        Ok(())
    }
}

impl fmt::Display for Destination {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "s3://{}/{}", self.bucket, self.key)
    }
}

pub fn validate_bucket(bucket: &str) -> Result<(), String> {
    if bucket.is_empty() {
        return Err("bucket must not be empty".to_string());
    }
    if !(3..=63).contains(&bucket.len()) {
        return Err(format!("bucket {bucket:?} must be 3 to 63 characters"));
    }
    let allowed = |c: char| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '.' || c == '-';
    if !bucket.chars().all(allowed) {
        return Err(format!(
            "bucket {bucket:?} may only contain lowercase letters, digits, '.' and '-'"
        ));
    }
    let edge_ok = |c: Option<char>| c.is_some_and(|c| c.is_ascii_alphanumeric());
    if !edge_ok(bucket.chars().next()) || !edge_ok(bucket.chars().last()) {
        return Err(format!(
            "bucket {bucket:?} must start and end with a letter or digit"
        ));
    }
    if bucket.contains("..") {
        return Err(format!("bucket {bucket:?} must not contain \"..\""));
    }
    if bucket.parse::<IpAddr>().is_ok() {
        return Err(format!("bucket {bucket:?} must not be an IP address"));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_valid_destination() {
        let dest = Destination::new("reports", "2024/q1.csv");
        assert!(dest.validate().is_ok());
        assert_eq!(dest.to_string(), "s3://reports/2024/q1.csv");
    }

    #[test]
    fn test_rejects_empty_parts() {
        assert!(Destination::new("", "k").validate().is_err());
        assert!(Destination::new("reports", "").validate().is_err());
    }

    #[test]
    fn test_bucket_rules() {
        for bad in ["ab", "Reports", "under_score", "-lead", "trail.", "a..b", "192.168.0.1", "x".repeat(64).as_str()] {
            assert!(validate_bucket(bad).is_err(), "{bad} should be rejected");
        }
        for good in ["abc", "my.bucket-01", "9lives"] {
            assert!(validate_bucket(good).is_ok(), "{good} should be accepted");
        }
    }

    #[test]
    fn test_key_length_limit() {
        let dest = Destination::new("reports", "k".repeat(MAX_KEY_BYTES + 1));
        assert!(dest.validate().unwrap_err().contains("limit"));
    }
}
