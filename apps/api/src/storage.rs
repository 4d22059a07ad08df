//! Object-store helpers. Uploads land here, derived artifacts (jd.json,
//! analysis.json) are written here, and the event router relocates raw
//! drops into their per-entity folders.

use anyhow::{anyhow, Result};
use aws_sdk_s3::primitives::ByteStream;
use aws_sdk_s3::Client as S3Client;
use serde::de::DeserializeOwned;
use serde::Serialize;
use tracing::info;

/// Downloads an object's raw bytes.
pub async fn download(s3: &S3Client, bucket: &str, key: &str) -> Result<Vec<u8>> {
    let out = s3
        .get_object()
        .bucket(bucket)
        .key(key)
        .send()
        .await
        .map_err(|e| anyhow!("get s3://{bucket}/{key} failed: {e}"))?;
    let data = out
        .body
        .collect()
        .await
        .map_err(|e| anyhow!("reading body of s3://{bucket}/{key} failed: {e}"))?;
    Ok(data.into_bytes().to_vec())
}

/// Fetches and deserializes a JSON object. `None` when the key is absent,
/// which callers treat as "not produced yet", not as an error.
pub async fn get_json<T: DeserializeOwned>(
    s3: &S3Client,
    bucket: &str,
    key: &str,
) -> Result<Option<T>> {
    let out = match s3.get_object().bucket(bucket).key(key).send().await {
        Ok(out) => out,
        Err(err) => {
            let service_err = err.into_service_error();
            if service_err.is_no_such_key() {
                return Ok(None);
            }
            return Err(anyhow!("get s3://{bucket}/{key} failed: {service_err}"));
        }
    };
    let data = out
        .body
        .collect()
        .await
        .map_err(|e| anyhow!("reading body of s3://{bucket}/{key} failed: {e}"))?;
    let value = serde_json::from_slice(&data.into_bytes())
        .map_err(|e| anyhow!("s3://{bucket}/{key} is not valid JSON: {e}"))?;
    Ok(Some(value))
}

/// Serializes `value` and writes it in one put. A single put is atomic from
/// the reader's point of view; re-runs overwrite by key, last write wins.
pub async fn put_json<T: Serialize>(
    s3: &S3Client,
    bucket: &str,
    key: &str,
    value: &T,
) -> Result<()> {
    let body = serde_json::to_vec_pretty(value)?;
    s3.put_object()
        .bucket(bucket)
        .key(key)
        .body(ByteStream::from(body))
        .content_type("application/json")
        .send()
        .await
        .map_err(|e| anyhow!("put s3://{bucket}/{key} failed: {e}"))?;
    info!("Saved s3://{bucket}/{key}");
    Ok(())
}

/// Lists object keys under a prefix, skipping folder markers.
pub async fn list_keys(s3: &S3Client, bucket: &str, prefix: &str) -> Result<Vec<String>> {
    let out = s3
        .list_objects_v2()
        .bucket(bucket)
        .prefix(prefix)
        .send()
        .await
        .map_err(|e| anyhow!("list s3://{bucket}/{prefix} failed: {e}"))?;
    Ok(out
        .contents()
        .iter()
        .filter_map(|o| o.key())
        .filter(|k| !k.ends_with('/'))
        .map(str::to_owned)
        .collect())
}

/// Cheap presence check (HEAD). Lets the event router distinguish "already
/// relocated by an earlier delivery" from "upload vanished".
pub async fn exists(s3: &S3Client, bucket: &str, key: &str) -> Result<bool> {
    match s3.head_object().bucket(bucket).key(key).send().await {
        Ok(_) => Ok(true),
        Err(err) => {
            let service_err = err.into_service_error();
            if service_err.is_not_found() {
                Ok(false)
            } else {
                Err(anyhow!("head s3://{bucket}/{key} failed: {service_err}"))
            }
        }
    }
}

/// Moves an object (copy + delete). Used to relocate raw uploads into their
/// allocated entity folders; safe to re-apply because the copy target is
/// keyed by the idempotently resolved ID.
pub async fn relocate(s3: &S3Client, bucket: &str, from: &str, to: &str) -> Result<()> {
    s3.copy_object()
        .bucket(bucket)
        .copy_source(format!("{bucket}/{from}"))
        .key(to)
        .send()
        .await
        .map_err(|e| anyhow!("copy s3://{bucket}/{from} -> {to} failed: {e}"))?;
    s3.delete_object()
        .bucket(bucket)
        .key(from)
        .send()
        .await
        .map_err(|e| anyhow!("delete s3://{bucket}/{from} failed: {e}"))?;
    info!("Relocated s3://{bucket}/{from} -> {to}");
    Ok(())
}
