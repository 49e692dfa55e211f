//! # リクエストハンドラ
//!
//! 1回の呼び出しを 取得 → アップロード → 署名付きURL発行 の順に処理する。
//!
//! ## 処理フロー
//! 1. オリジンにストリーミングGETを発行
//!    - 接続失敗: `FetchErrorPolicy`に従い、伝播または500レスポンス
//! 2. ステータスが200以外なら、アップロードせずに500レスポンスを返す
//! 3. ボディを中継チャネル経由でマルチパートアップロード
//! 4. 署名付きURLを発行し、200レスポンスを返す
//!
//! ## レスポンス形状の違い
//! アップロードまたは署名付きURL発行の失敗は`{statusCode, body}`で包まず、
//! エラー値をそのまま返す（[`InvocationOutcome::RawError`]）。
//! 既存の呼び出し側がこの形の違いに依存しているため統一しない。

use relay_types::{InvocationRequest, InvocationResponse, RawErrorBody};

use crate::config::{FetchErrorPolicy, RelayState, ERROR_BODY_LIMIT};
use crate::error::RelayError;
use crate::fetch::{fetch_origin, OriginResponse};
use crate::key::generate_object_key;
use crate::presign::presign_download;
use crate::relay::spawn_relay;
use crate::upload::StreamingUploader;

/// 呼び出しの結果。
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InvocationOutcome {
    /// `{statusCode, body}`形式のレスポンス
    Enveloped(InvocationResponse),
    /// エンベロープなしのエラー値
    RawError(RawErrorBody),
}

impl InvocationOutcome {
    /// 関数の戻り値となるJSONに変換する。
    pub fn into_value(self) -> serde_json::Value {
        match self {
            InvocationOutcome::Enveloped(response) => serde_json::json!({
                "statusCode": response.status_code,
                "body": response.body,
            }),
            InvocationOutcome::RawError(raw) => serde_json::json!({
                "errorType": raw.error_type,
                "errorMessage": raw.error_message,
            }),
        }
    }
}

/// 1回の呼び出しを処理する。
///
/// `Err`を返すのは、`FetchErrorPolicy::Propagate`でオリジンへの接続に失敗した場合のみ。
/// それ以外の失敗はすべて`Ok`の中に表現される。
pub async fn handle_invocation(
    state: &RelayState,
    request: InvocationRequest,
) -> Result<InvocationOutcome, RelayError> {
    tracing::info!(url = %request.url, "呼び出しの処理を開始");

    let origin = match fetch_origin(&state.http_client, &request.url).await {
        Ok(origin) => origin,
        Err(e) => {
            tracing::error!(url = %request.url, error = %e, "オリジンへの接続に失敗");
            return match state.config.fetch_error_policy {
                FetchErrorPolicy::Propagate => Err(e),
                FetchErrorPolicy::Envelope => Ok(InvocationOutcome::Enveloped(
                    InvocationResponse::failure(format!("failed to fetch {}: {e}", request.url)),
                )),
            };
        }
    };

    if origin.status != 200 {
        let summary = origin.summary();
        let status = origin.status;
        let data = origin.read_text(ERROR_BODY_LIMIT).await;
        tracing::error!(url = %request.url, status, "オリジンが200以外を返した");
        return Ok(InvocationOutcome::Enveloped(InvocationResponse::failure(
            format!("didn't get a good status response {summary} - {status} - {data}"),
        )));
    }
    tracing::info!(url = %request.url, status = origin.status, "オリジンが応答");

    let object_key = generate_object_key(&request.url);
    match upload_and_presign(state, origin, &object_key).await {
        Ok(signed_url) => Ok(InvocationOutcome::Enveloped(InvocationResponse::success(
            signed_url,
        ))),
        Err(e) => {
            tracing::error!(
                object_key = %object_key,
                error_type = e.error_type(),
                error = %e,
                "アップロードまたは署名付きURL生成に失敗"
            );
            Ok(InvocationOutcome::RawError(e.to_raw_body()))
        }
    }
}

/// ボディをストレージへ流し込み、署名付きURLを返す。
async fn upload_and_presign(
    state: &RelayState,
    origin: OriginResponse,
    object_key: &str,
) -> Result<String, RelayError> {
    tracing::info!(
        object_key = %object_key,
        content_type = %origin.content_type,
        "ストレージへのアップロードを開始"
    );

    let content_type = origin.content_type;
    let (chunks, reader) = spawn_relay(origin.body, state.config.relay_capacity);

    let uploader = StreamingUploader::new(state.config.part_size, state.config.queue_depth);
    let outcome = uploader
        .upload(state.store.clone(), object_key, &content_type, chunks)
        .await?;

    // アップロード成功時、読み出しタスクはボディ終端まで読み終えている
    if let Err(e) = reader.await {
        tracing::warn!(error = %e, "読み出しタスクの終了待ちに失敗");
    }

    tracing::info!(
        object_key = %outcome.key,
        parts = outcome.parts,
        bytes = outcome.bytes,
        "アップロード完了"
    );

    presign_download(state, &outcome.key).await
}
