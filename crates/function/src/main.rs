//! # Origin Relay Function エントリポイント
//!
//! 関数ランタイムからイベント `{"url": "..."}` を受け取り、
//! [`relay_function::handle_invocation`] の結果をJSONで返す。

use std::sync::Arc;

use lambda_runtime::{service_fn, Error, LambdaEvent};
use relay_function::{build_state, handle_invocation, init_tracing, RelayConfig, RelayState};
use relay_types::InvocationRequest;

async fn function_handler(
    state: &RelayState,
    event: LambdaEvent<InvocationRequest>,
) -> Result<serde_json::Value, Error> {
    tracing::info!(request_id = %event.context.request_id, "イベントを受信");
    // Errはオリジンへの接続失敗（伝播ポリシー時）のみ。ランタイムの失敗処理に任せる。
    let outcome = handle_invocation(state, event.payload).await?;
    Ok(outcome.into_value())
}

#[tokio::main]
async fn main() -> Result<(), Error> {
    init_tracing();

    let config = RelayConfig::from_env()?;
    tracing::info!(
        bucket = %config.bucket,
        region = %config.region,
        fetch_error_policy = ?config.fetch_error_policy,
        "設定を読み込み"
    );

    // ストレージクライアントはプロセス全体で一つだけ作り、全呼び出しで共有する
    let state = Arc::new(build_state(config)?);

    lambda_runtime::run(service_fn(move |event: LambdaEvent<InvocationRequest>| {
        let state = state.clone();
        async move { function_handler(&state, event).await }
    }))
    .await
}
