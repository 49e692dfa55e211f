//! # オブジェクトストレージ
//!
//! アップロード先ストレージの抽象インターフェース。
//! S3互換ストレージ実装は `s3` サブモジュールを参照。

pub mod s3;

pub use s3::S3ObjectStore;

use crate::error::RelayError;

/// 送信完了したパート。完了リクエストに渡す。
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CompletedPart {
    /// パート番号（1始まり）
    pub part_number: u32,
    /// ストレージが返したETag
    pub etag: String,
}

/// アップロード先ストレージの抽象インターフェース。
///
/// プロセス全体で一つのインスタンスを共有するため`Send + Sync`。
/// AWS S3, MinIO, Cloudflare R2 等のS3互換APIや、テスト用のインメモリ実装を差し替えられる。
#[async_trait::async_trait]
pub trait ObjectStore: Send + Sync {
    /// 1リクエストでオブジェクトを保存する。パートサイズ未満のペイロード用。
    async fn put_object(
        &self,
        key: &str,
        content_type: &str,
        data: Vec<u8>,
    ) -> Result<(), RelayError>;

    /// マルチパートアップロードを開始し、アップロードIDを返す。
    async fn create_multipart_upload(
        &self,
        key: &str,
        content_type: &str,
    ) -> Result<String, RelayError>;

    /// 1パートを送信する。
    async fn upload_part(
        &self,
        key: &str,
        upload_id: &str,
        part_number: u32,
        data: Vec<u8>,
    ) -> Result<CompletedPart, RelayError>;

    /// パート番号順に並んだパート一覧でアップロードを完了する。
    async fn complete_multipart_upload(
        &self,
        key: &str,
        upload_id: &str,
        parts: Vec<CompletedPart>,
    ) -> Result<(), RelayError>;

    /// アップロードを中止し、送信済みパートを破棄する。
    async fn abort_multipart_upload(&self, key: &str, upload_id: &str) -> Result<(), RelayError>;

    /// GET用の署名付きURLを生成する。オブジェクトの存在確認は行わない。
    async fn presign_get(&self, key: &str, expiry_secs: u32) -> Result<String, RelayError>;
}
