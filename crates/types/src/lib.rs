//! # Origin Relay 共有型定義
//!
//! 関数の呼び出しイベントとレスポンスのワイヤ形式をRust構造体として提供する。
//!
//! ## ワイヤ形式
//! - 入力: `{"url": "..."}`
//! - 成功/失敗レスポンス: `{"statusCode": 200, "body": "{\"message\":\"...\"}"}`
//! - アップロード失敗: `{"errorType": "...", "errorMessage": "..."}`（エンベロープなし）

use serde::{Deserialize, Serialize};

// ---------------------------------------------------------------------------
// 呼び出しイベント
// ---------------------------------------------------------------------------

/// 関数の呼び出しイベント。
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InvocationRequest {
    /// 取得対象の絶対URL
    pub url: String,
}

// ---------------------------------------------------------------------------
// レスポンス
// ---------------------------------------------------------------------------

/// `body`にシリアライズされるメッセージ。
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResponseMessage {
    pub message: String,
}

/// `{statusCode, body}`形式のレスポンスエンベロープ。
/// `body`はJSON文字列としてシリアライズ済みの[`ResponseMessage`]。
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InvocationResponse {
    #[serde(rename = "statusCode")]
    pub status_code: u16,
    pub body: String,
}

impl InvocationResponse {
    /// 任意のステータスコードとメッセージからレスポンスを構築する。
    pub fn new(status_code: u16, message: impl Into<String>) -> Self {
        let body = serde_json::json!({ "message": message.into() }).to_string();
        Self { status_code, body }
    }

    /// 署名付きURLを返す成功レスポンス（200）。
    pub fn success(signed_url: impl Into<String>) -> Self {
        Self::new(200, signed_url)
    }

    /// 失敗レスポンス（500）。
    pub fn failure(message: impl Into<String>) -> Self {
        Self::new(500, message)
    }

    /// `body`を[`ResponseMessage`]としてパースする。
    pub fn message(&self) -> Result<ResponseMessage, serde_json::Error> {
        serde_json::from_str(&self.body)
    }
}

/// エンベロープを経由せずにそのまま返されるエラー値。
///
/// アップロードまたは署名付きURL生成が失敗した場合、関数はこの値を
/// `{statusCode, body}`で包まずに返す。呼び出し側はこの形の違いで
/// 失敗の種類を判別できる。
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RawErrorBody {
    #[serde(rename = "errorType")]
    pub error_type: String,
    #[serde(rename = "errorMessage")]
    pub error_message: String,
}
