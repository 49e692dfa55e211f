//! # S3互換ストレージ実装
//!
//! AWS S3, MinIO, Cloudflare R2 等のS3互換APIを使用する
//! [`ObjectStore`]実装。

use super::{CompletedPart, ObjectStore};
use crate::config::RelayConfig;
use crate::error::RelayError;

/// S3互換ストレージによる[`ObjectStore`]実装。
pub struct S3ObjectStore {
    bucket: s3::Bucket,
}

impl S3ObjectStore {
    pub fn new(bucket: s3::Bucket) -> Self {
        Self { bucket }
    }

    /// 設定からバケットを初期化する。
    ///
    /// `endpoint`が設定されている場合はパススタイルのカスタムリージョンを使う。
    /// 静的キーがない場合は環境変数・プロファイル・インスタンスメタデータの順に
    /// 認証情報を探索する。
    pub fn from_config(config: &RelayConfig) -> anyhow::Result<Self> {
        let region = match &config.endpoint {
            Some(endpoint) => s3::Region::Custom {
                region: config.region.clone(),
                endpoint: endpoint.clone(),
            },
            None => config
                .region
                .parse::<s3::Region>()
                .map_err(|e| anyhow::anyhow!("不正なリージョン {}: {e}", config.region))?,
        };

        let credentials = match (&config.access_key, &config.secret_key) {
            (Some(access_key), Some(secret_key)) => s3::creds::Credentials::new(
                Some(access_key.as_str()),
                Some(secret_key.as_str()),
                None,
                None,
                None,
            )?,
            _ => s3::creds::Credentials::default()?,
        };

        let bucket = s3::Bucket::new(&config.bucket, region, credentials)?;
        let bucket = if config.endpoint.is_some() {
            bucket.with_path_style()
        } else {
            bucket
        };

        tracing::info!(
            bucket = %config.bucket,
            region = %config.region,
            endpoint = ?config.endpoint,
            "ストレージクライアントを初期化"
        );

        Ok(Self::new(*bucket))
    }
}

#[async_trait::async_trait]
impl ObjectStore for S3ObjectStore {
    async fn put_object(
        &self,
        key: &str,
        content_type: &str,
        data: Vec<u8>,
    ) -> Result<(), RelayError> {
        self.bucket
            .put_object_with_content_type(key, &data, content_type)
            .await
            .map_err(|e| RelayError::Storage(format!("PutObject失敗 ({key}): {e}")))?;
        Ok(())
    }

    async fn create_multipart_upload(
        &self,
        key: &str,
        content_type: &str,
    ) -> Result<String, RelayError> {
        let response = self
            .bucket
            .initiate_multipart_upload(key, content_type)
            .await
            .map_err(|e| RelayError::Storage(format!("マルチパートアップロード開始失敗 ({key}): {e}")))?;
        Ok(response.upload_id)
    }

    async fn upload_part(
        &self,
        key: &str,
        upload_id: &str,
        part_number: u32,
        data: Vec<u8>,
    ) -> Result<CompletedPart, RelayError> {
        // content_typeはパート送信では使われない
        let part = self
            .bucket
            .put_multipart_chunk(data, key, part_number, upload_id, "application/octet-stream")
            .await
            .map_err(|e| {
                RelayError::Upload(format!("パート{part_number}の送信に失敗 ({key}): {e}"))
            })?;
        Ok(CompletedPart {
            part_number: part.part_number,
            etag: part.etag,
        })
    }

    async fn complete_multipart_upload(
        &self,
        key: &str,
        upload_id: &str,
        parts: Vec<CompletedPart>,
    ) -> Result<(), RelayError> {
        let parts = parts
            .into_iter()
            .map(|p| s3::serde_types::Part {
                part_number: p.part_number,
                etag: p.etag,
            })
            .collect();
        self.bucket
            .complete_multipart_upload(key, upload_id, parts)
            .await
            .map_err(|e| RelayError::Upload(format!("マルチパートアップロード完了失敗 ({key}): {e}")))?;
        Ok(())
    }

    async fn abort_multipart_upload(&self, key: &str, upload_id: &str) -> Result<(), RelayError> {
        self.bucket
            .abort_upload(key, upload_id)
            .await
            .map_err(|e| RelayError::Storage(format!("マルチパートアップロード中止失敗 ({key}): {e}")))
    }

    async fn presign_get(&self, key: &str, expiry_secs: u32) -> Result<String, RelayError> {
        self.bucket
            .presign_get(key, expiry_secs, None)
            .await
            .map_err(|e| RelayError::Presign(format!("署名付きダウンロードURL生成失敗: {e}")))
    }
}
