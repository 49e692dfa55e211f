//! # オリジン取得
//!
//! 呼び出し元が指定したURLにストリーミングモードでGETを発行する。
//! ボディはバッファリングせず、ステータスとContent-Typeのみを先に公開する。
//!
//! 非200ステータスはエラーにしない。ハンドラがステータスを確認して判断する。
//! 接続レベルの失敗（DNS、接続拒否、タイムアウト、不正なURL）のみ`Err`を返す。

use bytes::Bytes;
use reqwest::header::{HeaderMap, CONTENT_TYPE};

use crate::error::RelayError;

/// Content-Typeが取得できない場合のフォールバック。
pub const DEFAULT_CONTENT_TYPE: &str = "application/octet-stream";

/// チャンク単位でバイト列を読み出すソース。
///
/// ダウンロード側の読み出しを抽象化し、中継タスクから呼び出す。
#[async_trait::async_trait]
pub trait ChunkSource: Send {
    /// 次のチャンクを返す。終端では`None`。
    async fn next_chunk(&mut self) -> Result<Option<Bytes>, RelayError>;
}

#[async_trait::async_trait]
impl ChunkSource for reqwest::Response {
    async fn next_chunk(&mut self) -> Result<Option<Bytes>, RelayError> {
        self.chunk()
            .await
            .map_err(|e| RelayError::OriginBody(e.to_string()))
    }
}

/// ストリーミング状態のオリジンレスポンス。
pub struct OriginResponse {
    /// HTTPステータスコード
    pub status: u16,
    /// 転送先に引き継ぐContent-Type
    pub content_type: String,
    /// 未読のボディ
    pub body: reqwest::Response,
}

impl OriginResponse {
    /// レスポンスの要約（`HTTP/1.1 404 Not Found (url)`形式）。
    pub fn summary(&self) -> String {
        format!(
            "{:?} {} ({})",
            self.body.version(),
            self.body.status(),
            self.body.url()
        )
    }

    /// 失敗メッセージ用にボディを文字列として読み出す。
    ///
    /// `limit`バイトで打ち切る。読み出し中の失敗は読めた分までを返す。
    pub async fn read_text(mut self, limit: usize) -> String {
        let mut buf = Vec::new();
        while buf.len() < limit {
            match self.body.chunk().await {
                Ok(Some(chunk)) => {
                    let take = chunk.len().min(limit - buf.len());
                    buf.extend_from_slice(&chunk[..take]);
                }
                Ok(None) => break,
                Err(e) => {
                    tracing::warn!(error = %e, "エラーレスポンスのボディ読み取りに失敗");
                    break;
                }
            }
        }
        String::from_utf8_lossy(&buf).into_owned()
    }
}

/// ヘッダーからContent-Typeを取り出す。
///
/// ヘッダー名の大文字小文字は区別しない。存在しない、または文字列として
/// 解釈できない場合は[`DEFAULT_CONTENT_TYPE`]を返す。
pub fn content_type_of(headers: &HeaderMap) -> String {
    headers
        .get(CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .unwrap_or(DEFAULT_CONTENT_TYPE)
        .to_string()
}

/// オリジンにGETを発行し、ボディを読まずに返す。
pub async fn fetch_origin(
    client: &reqwest::Client,
    url: &str,
) -> Result<OriginResponse, RelayError> {
    let response = client
        .get(url)
        .send()
        .await
        .map_err(|e| RelayError::Fetch(format!("{url}: {e}")))?;

    let status = response.status().as_u16();
    let content_type = content_type_of(response.headers());

    Ok(OriginResponse {
        status,
        content_type,
        body: response,
    })
}
