use super::{ObjectStore, StoreError};
use async_trait::async_trait;
use aws_sdk_s3::error::DisplayErrorContext;
use aws_sdk_s3::presigning::PresigningConfig;
use aws_sdk_s3::primitives::ByteStream;
use std::time::Duration;

#[derive(Debug, Clone)]
pub struct S3Store {
    client: aws_sdk_s3::Client,
}

impl S3Store {
    /// 使用默认凭证链（环境变量 / Lambda 执行角色）构建客户端。
    pub async fn from_env() -> Self {
        let sdk_cfg = aws_config::load_defaults(aws_config::BehaviorVersion::latest()).await;
        Self {
            client: aws_sdk_s3::Client::new(&sdk_cfg),
        }
    }
}

#[async_trait]
impl ObjectStore for S3Store {
    async fn put_object(
        &self,
        bucket: &str,
        key: &str,
        bytes: Vec<u8>,
        content_type: &str,
    ) -> Result<(), StoreError> {
        self.client
            .put_object()
            .bucket(bucket)
            .key(key)
            .body(ByteStream::from(bytes))
            .content_type(content_type)
            .send()
            .await
            .map_err(|e| StoreError(format!("S3 PutObject 失败: {}", DisplayErrorContext(&e))))?;
        Ok(())
    }

    async fn presign_get(
        &self,
        bucket: &str,
        key: &str,
        ttl: Duration,
    ) -> Result<String, StoreError> {
        let presign_cfg = PresigningConfig::expires_in(ttl)
            .map_err(|e| StoreError(format!("无效的预签名有效期: {e}")))?;
        let presigned = self
            .client
            .get_object()
            .bucket(bucket)
            .key(key)
            .presigned(presign_cfg)
            .await
            .map_err(|e| StoreError(format!("S3 预签名失败: {}", DisplayErrorContext(&e))))?;
        Ok(presigned.uri().to_string())
    }
}
