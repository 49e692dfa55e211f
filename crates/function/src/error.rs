//! # Relay エラー型
//!
//! 取得・アップロード・署名付きURL生成の各段階で共通のエラー型。

use relay_types::RawErrorBody;

/// Relayエラー型。
#[derive(Debug, thiserror::Error)]
pub enum RelayError {
    /// オリジンへの接続に失敗（DNS、接続拒否、タイムアウト、不正なURL）
    #[error("オリジンへのリクエストに失敗: {0}")]
    Fetch(String),
    /// オリジンのレスポンスボディ読み取りに失敗
    #[error("オリジンのレスポンスボディ読み取りに失敗: {0}")]
    OriginBody(String),
    /// ストレージ操作に失敗
    #[error("ストレージ操作に失敗: {0}")]
    Storage(String),
    /// マルチパートアップロードに失敗
    #[error("アップロードに失敗: {0}")]
    Upload(String),
    /// 署名付きURL生成に失敗
    #[error("署名付きURL生成に失敗: {0}")]
    Presign(String),
    /// 内部エラー
    #[error("内部エラー: {0}")]
    Internal(String),
}

impl RelayError {
    /// エラー種別を表す安定した識別子。
    pub fn error_type(&self) -> &'static str {
        match self {
            RelayError::Fetch(_) => "FetchError",
            RelayError::OriginBody(_) => "OriginBodyError",
            RelayError::Storage(_) => "StorageError",
            RelayError::Upload(_) => "UploadError",
            RelayError::Presign(_) => "PresignError",
            RelayError::Internal(_) => "InternalError",
        }
    }

    /// エンベロープなしで返すエラー値に変換する。
    pub fn to_raw_body(&self) -> RawErrorBody {
        RawErrorBody {
            error_type: self.error_type().to_string(),
            error_message: self.to_string(),
        }
    }
}
