use super::{IfMatch, ObjectStat, ObjectStore, ObjectStoreError, Result, compute_etag};
use crate::config::StoreConfig;
use aws_config::{BehaviorVersion, Region};
use aws_sdk_s3::Client;
use aws_sdk_s3::config::Credentials;
use aws_sdk_s3::config::retry::RetryConfig;
use aws_sdk_s3::error::{DisplayErrorContext, ProvideErrorMetadata, SdkError};
use aws_sdk_s3::operation::get_object::GetObjectError;
use aws_sdk_s3::operation::head_object::HeadObjectError;
use aws_sdk_s3::primitives::ByteStream;
use aws_sdk_s3::types::{BucketLocationConstraint, CreateBucketConfiguration};
use std::time::SystemTime;
use tokio::runtime::Runtime;
use tracing::debug;

/// Region that rejects an explicit location constraint on bucket creation.
const DEFAULT_REGION: &str = "us-east-1";

/// [`ObjectStore`] backed by the AWS SDK. Calls block on an owned runtime, so
/// this type must not be used from inside another tokio runtime.
pub struct S3Store {
    client: Client,
    rt: Runtime,
}

impl S3Store {
    pub fn new(client: Client) -> Result<Self> {
        let rt = tokio::runtime::Builder::new_multi_thread()
            .enable_all()
            .build()?;
        Ok(Self { client, rt })
    }

    /// Builds a client from static credentials.
    pub fn connect(config: &StoreConfig) -> Result<Self> {
        let rt = tokio::runtime::Builder::new_multi_thread()
            .enable_all()
            .build()?;
        let client = rt.block_on(build_client(config));
        Ok(Self { client, rt })
    }
}

async fn build_client(config: &StoreConfig) -> Client {
    let credentials = Credentials::new(
        config.access_key_id(),
        config.secret_access_key(),
        None,
        None,
        "s3manager-static",
    );
    let shared = aws_config::defaults(BehaviorVersion::latest())
        .region(Region::new(config.region().to_string()))
        .credentials_provider(credentials)
        .load()
        .await;

    let mut builder =
        aws_sdk_s3::config::Builder::from(&shared).force_path_style(config.force_path_style());
    if let Some(endpoint) = config.endpoint() {
        builder = builder.endpoint_url(endpoint);
    }
    if let Some(attempts) = config.max_attempts() {
        builder = builder.retry_config(RetryConfig::standard().with_max_attempts(attempts));
    }
    Client::from_conf(builder.build())
}

/// Maps an SDK failure onto the store error taxonomy, keeping the service
/// error code as the reason. HEAD responses carry no body, so the HTTP status
/// stands in when no code was parsed.
///
/// Only 412 means the precondition was evaluated and failed. A 409
/// `ConditionalRequestConflict` stays a service error: S3 asks for a retry and
/// says nothing about whether the object exists.
fn sdk_error<E>(operation: &str, err: SdkError<E>) -> ObjectStoreError
where
    E: ProvideErrorMetadata + std::error::Error + Send + Sync + 'static,
{
    let code = err
        .as_service_error()
        .and_then(|e| e.code())
        .map(str::to_string)
        .or_else(|| {
            err.raw_response()
                .map(|resp| status_code(resp.status().as_u16()))
        });
    let message = format!("{operation}: {}", DisplayErrorContext(&err));

    match code.as_deref() {
        Some("PreconditionFailed") => ObjectStoreError::PreconditionFailed,
        Some(code) => ObjectStoreError::service(code, message),
        None => ObjectStoreError::Other(message),
    }
}

/// Error code S3 would have sent for a body-less error response.
fn status_code(status: u16) -> String {
    match status {
        400 => "BadRequest".to_string(),
        403 => "AccessDenied".to_string(),
        404 => "NotFound".to_string(),
        412 => "PreconditionFailed".to_string(),
        other => format!("HTTP {other}"),
    }
}

fn quoted(etag: &str) -> String {
    if etag.starts_with('"') {
        etag.to_string()
    } else {
        format!("\"{etag}\"")
    }
}

impl ObjectStore for S3Store {
    fn probe(&self, bucket: &str, key: &str) -> Result<bool> {
        let result = self
            .rt
            .block_on(self.client.head_object().bucket(bucket).key(key).send());

        match result {
            Ok(_) => Ok(true),
            Err(err)
                if err
                    .as_service_error()
                    .is_some_and(HeadObjectError::is_not_found) =>
            {
                Ok(false)
            }
            Err(err) => Err(sdk_error("HeadObject", err)),
        }
    }

    fn get(&self, bucket: &str, key: &str) -> Result<Option<Vec<u8>>> {
        self.rt.block_on(async {
            let resp = self.client.get_object().bucket(bucket).key(key).send().await;

            match resp {
                Ok(obj) => {
                    let data = obj
                        .body
                        .collect()
                        .await
                        .map_err(|e| ObjectStoreError::Other(format!("S3 body error: {e}")))?;
                    Ok(Some(data.into_bytes().to_vec()))
                }
                Err(err)
                    if err
                        .as_service_error()
                        .is_some_and(GetObjectError::is_no_such_key) =>
                {
                    Ok(None)
                }
                Err(err) => Err(sdk_error("GetObject", err)),
            }
        })
    }

    fn put(&self, bucket: &str, key: &str, body: &[u8], cond: IfMatch) -> Result<String> {
        let request = self
            .client
            .put_object()
            .bucket(bucket)
            .key(key)
            .body(ByteStream::from(body.to_vec()));
        let request = match cond {
            IfMatch::Any => request,
            IfMatch::Tag(expected_etag) => request.if_match(quoted(expected_etag)),
            IfMatch::NoneMatch => request.if_none_match("*"),
        };

        let resp = self
            .rt
            .block_on(request.send())
            .map_err(|e| sdk_error("PutObject", e))?;
        debug!(bucket, key, bytes = body.len(), "put object");

        // S3 returns ETag as a quoted string
        Ok(resp
            .e_tag()
            .map(|s| s.trim_matches('"').to_string())
            .unwrap_or_else(|| compute_etag(body)))
    }

    fn delete(&self, bucket: &str, key: &str) -> Result<()> {
        self.rt
            .block_on(self.client.delete_object().bucket(bucket).key(key).send())
            .map_err(|e| sdk_error("DeleteObject", e))?;
        Ok(())
    }

    fn stat(&self, bucket: &str, key: &str) -> Result<Option<ObjectStat>> {
        let result = self
            .rt
            .block_on(self.client.head_object().bucket(bucket).key(key).send());

        let head = match result {
            Ok(head) => head,
            Err(err)
                if err
                    .as_service_error()
                    .is_some_and(HeadObjectError::is_not_found) =>
            {
                return Ok(None);
            }
            Err(err) => return Err(sdk_error("HeadObject", err)),
        };

        Ok(Some(ObjectStat {
            size: head
                .content_length()
                .and_then(|len| u64::try_from(len).ok())
                .unwrap_or(0),
            last_modified: head
                .last_modified()
                .and_then(|dt| SystemTime::try_from(*dt).ok()),
            content_type: head.content_type().map(str::to_string),
            storage_class: head.storage_class().map(|c| c.as_str().to_string()),
            etag: head.e_tag().map(|s| s.trim_matches('"').to_string()),
        }))
    }

    fn list(
        &self,
        bucket: &str,
        prefix: &str,
        continuation: Option<String>,
    ) -> Result<(Vec<String>, Option<String>)> {
        let mut req = self.client.list_objects_v2().bucket(bucket).prefix(prefix);
        if let Some(token) = continuation {
            req = req.continuation_token(token);
        }

        let resp = self
            .rt
            .block_on(req.send())
            .map_err(|e| sdk_error("ListObjectsV2", e))?;

        let keys = resp
            .contents()
            .iter()
            .filter_map(|obj| obj.key().map(|s| s.to_string()))
            .collect::<Vec<_>>();

        let next_token = resp.next_continuation_token().map(|s| s.to_string());

        Ok((keys, next_token))
    }

    fn list_buckets(&self) -> Result<Vec<String>> {
        let resp = self
            .rt
            .block_on(self.client.list_buckets().send())
            .map_err(|e| sdk_error("ListBuckets", e))?;

        Ok(resp
            .buckets()
            .iter()
            .filter_map(|b| b.name().map(str::to_string))
            .collect())
    }

    fn create_bucket(&self, name: &str, region: &str) -> Result<()> {
        let mut req = self.client.create_bucket().bucket(name);
        if !region.is_empty() && !region.eq_ignore_ascii_case(DEFAULT_REGION) {
            let constraint = CreateBucketConfiguration::builder()
                .location_constraint(BucketLocationConstraint::from(region))
                .build();
            req = req.create_bucket_configuration(constraint);
        }

        self.rt
            .block_on(req.send())
            .map_err(|e| sdk_error("CreateBucket", e))?;
        debug!(bucket = name, region, "created bucket");
        Ok(())
    }

    fn delete_bucket(&self, name: &str) -> Result<()> {
        self.rt
            .block_on(self.client.delete_bucket().bucket(name).send())
            .map_err(|e| sdk_error("DeleteBucket", e))?;
        Ok(())
    }
}
