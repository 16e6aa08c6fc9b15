//! 上传媒体到对象存储，并生成限时访问链接。

#[cfg(test)]
pub mod memory;
pub mod s3;

use crate::error::AppError;
use async_trait::async_trait;
use base64::{Engine as _, engine::general_purpose};
use std::time::Duration;
use thiserror::Error;

const KEY_PREFIX: &str = "uploads";
const FALLBACK_BASENAME: &str = "upload";

#[derive(Debug, Error)]
#[error("{0}")]
pub struct StoreError(pub String);

/// 对象存储后端。生产环境为 S3，测试中使用内存实现。
#[async_trait]
pub trait ObjectStore: Send + Sync {
    async fn put_object(
        &self,
        bucket: &str,
        key: &str,
        bytes: Vec<u8>,
        content_type: &str,
    ) -> Result<(), StoreError>;

    async fn presign_get(&self, bucket: &str, key: &str, ttl: Duration)
    -> Result<String, StoreError>;
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoredMedia {
    pub bucket: String,
    pub key: String,
    pub retrieval_url: String,
}

/// `uploads/<ts>-<basename>`：去掉目录部分，防止路径穿越。
pub fn object_key(filename: &str, timestamp: i64) -> String {
    let basename = filename
        .rsplit(['/', '\\'])
        .next()
        .filter(|s| !s.is_empty())
        .unwrap_or(FALLBACK_BASENAME);
    format!("{KEY_PREFIX}/{timestamp}-{basename}")
}

pub fn content_type_for(filename: &str) -> String {
    mime_guess::from_path(filename)
        .first_or_octet_stream()
        .essence_str()
        .to_string()
}

/// 解码 base64 媒体；兼容前端直接提交的 data URL 以及按 76 列折行的编码。
pub fn decode_media(payload: &str) -> Result<Vec<u8>, AppError> {
    let payload = payload.trim();
    let payload = match payload.split_once(";base64,") {
        Some((prefix, rest)) if prefix.starts_with("data:") => rest,
        _ => payload,
    };
    let compact: String = payload.split_ascii_whitespace().collect();

    general_purpose::STANDARD
        .decode(compact)
        .map_err(|_| AppError::invalid_input("Invalid base64 payload provided"))
}

pub async fn upload_media(
    store: &dyn ObjectStore,
    bucket: &str,
    ttl: Duration,
    payload: &str,
    filename: &str,
    timestamp: i64,
) -> Result<StoredMedia, AppError> {
    let bytes = decode_media(payload)?;
    let content_type = content_type_for(filename);
    let key = object_key(filename, timestamp);

    tracing::info!(
        bucket,
        key = %key,
        content_type = %content_type,
        size = bytes.len(),
        "上传媒体"
    );

    store
        .put_object(bucket, &key, bytes, &content_type)
        .await
        .map_err(|e| AppError::storage(e.to_string()))?;

    let retrieval_url = store
        .presign_get(bucket, &key, ttl)
        .await
        .map_err(|e| AppError::storage(e.to_string()))?;

    Ok(StoredMedia {
        bucket: bucket.to_string(),
        key,
        retrieval_url,
    })
}

#[cfg(test)]
mod tests {
    use super::memory::MemoryStore;
    use super::*;

    #[test]
    fn object_key_strips_directories() {
        assert_eq!(object_key("a/b/photo.png", 1700000000), "uploads/1700000000-photo.png");
        assert_eq!(object_key("../../etc/passwd", 5), "uploads/5-passwd");
        assert_eq!(object_key(r"C:\Users\me\clip.mp4", 7), "uploads/7-clip.mp4");
        assert_eq!(object_key("engine.jpg", 9), "uploads/9-engine.jpg");
        assert_eq!(object_key("a/ photo.png", 9), "uploads/9- photo.png");
    }

    #[test]
    fn object_key_falls_back_when_basename_is_empty() {
        assert_eq!(object_key("dir/", 3), "uploads/3-upload");
        assert_eq!(object_key("", 3), "uploads/3-upload");
    }

    #[test]
    fn test_content_type_for() {
        assert_eq!(content_type_for("photo.png"), "image/png");
        assert_eq!(content_type_for("photo.JPG"), "image/jpeg");
        assert_eq!(content_type_for("clip.mp4"), "video/mp4");
        assert_eq!(content_type_for("noext"), "application/octet-stream");
        assert_eq!(content_type_for("blob.zzzunknown"), "application/octet-stream");
    }

    #[test]
    fn decode_accepts_plain_and_data_url() {
        assert_eq!(decode_media("aGVsbG8=").unwrap(), b"hello");
        assert_eq!(decode_media("  aGVsbG8=\n").unwrap(), b"hello");
        assert_eq!(
            decode_media("data:image/png;base64,aGVsbG8=").unwrap(),
            b"hello"
        );
    }

    #[test]
    fn decode_accepts_line_wrapped_payload() {
        let bytes: Vec<u8> = (0..120u8).collect();
        let encoded = general_purpose::STANDARD.encode(&bytes);
        let wrapped = encoded
            .as_bytes()
            .chunks(76)
            .map(|line| std::str::from_utf8(line).unwrap())
            .collect::<Vec<_>>()
            .join("\n");
        assert!(wrapped.contains('\n'));
        assert_eq!(decode_media(&wrapped).unwrap(), bytes);
        assert_eq!(decode_media(&wrapped.replace('\n', "\r\n")).unwrap(), bytes);
    }

    #[test]
    fn decode_rejects_garbage() {
        let err = decode_media("not base64!!").unwrap_err();
        assert!(matches!(err, AppError::InvalidInput(_)));
        assert_eq!(err.to_string(), "Invalid base64 payload provided");
    }

    #[tokio::test]
    async fn upload_writes_once_and_presigns() {
        let store = MemoryStore::new();
        let media = upload_media(
            &store,
            "diag-bucket",
            Duration::from_secs(3600),
            "aGVsbG8=",
            "photos/engine.png",
            1234,
        )
        .await
        .unwrap();

        assert_eq!(media.bucket, "diag-bucket");
        assert_eq!(media.key, "uploads/1234-engine.png");
        assert_eq!(
            media.retrieval_url,
            "memory://diag-bucket/uploads/1234-engine.png?expires_in=3600"
        );

        let puts = store.puts();
        assert_eq!(puts.len(), 1);
        assert_eq!(puts[0].bytes, b"hello");
        assert_eq!(puts[0].content_type, "image/png");
    }

    #[tokio::test]
    async fn invalid_payload_never_reaches_the_store() {
        let store = MemoryStore::new();
        let err = upload_media(
            &store,
            "diag-bucket",
            Duration::from_secs(60),
            "%%%",
            "a.png",
            1,
        )
        .await
        .unwrap_err();

        assert!(matches!(err, AppError::InvalidInput(_)));
        assert!(store.puts().is_empty());
    }

    #[tokio::test]
    async fn store_failures_surface_as_storage_errors() {
        let store = MemoryStore::failing("AccessDenied: bucket policy");
        let err = upload_media(
            &store,
            "diag-bucket",
            Duration::from_secs(60),
            "aGVsbG8=",
            "a.png",
            1,
        )
        .await
        .unwrap_err();

        assert!(matches!(err, AppError::Storage(_)));
        assert!(err.to_string().contains("AccessDenied"));
    }
}
