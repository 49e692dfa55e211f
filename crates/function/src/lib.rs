//! # Origin Relay Function
//!
//! 指定URLのファイルをオリジンからオブジェクトストレージへストリーミング転送し、
//! 期限付きの署名付きダウンロードURLを返す関数。
//!
//! ## 構成
//! - `key`: URLからオブジェクトキーを導出
//! - `fetch`: オリジンへのストリーミングGET
//! - `relay`: ダウンロードとアップロードを結ぶ容量制限付きチャネル
//! - `upload`: マルチパートアップロード（送信中パート数に上限）
//! - `presign`: 署名付きURL発行
//! - `handler`: 上記を順に呼び出し、結果をレスポンスに変換

pub mod config;
pub mod error;
pub mod fetch;
pub mod handler;
pub mod key;
pub mod presign;
pub mod relay;
pub mod storage;
pub mod upload;

#[cfg(test)]
mod test_helpers;

pub use config::{FetchErrorPolicy, RelayConfig, RelayState};
pub use error::RelayError;
pub use handler::{handle_invocation, InvocationOutcome};

/// ログ出力を初期化する。`RUST_LOG`が未設定の場合は`info`。
///
/// 出力先は標準エラー。タイムスタンプはログ基盤側で付与されるため出力しない。
pub fn init_tracing() {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_ansi(false)
        .without_time()
        .init();
}

/// 設定からストレージとHTTPクライアントを構築し、共有状態を返す。
/// プロセス起動時に一度だけ呼ぶ。
pub fn build_state(config: RelayConfig) -> anyhow::Result<RelayState> {
    let store = storage::S3ObjectStore::from_config(&config)?;
    let http_client = reqwest::Client::builder()
        .build()
        .map_err(|e| anyhow::anyhow!("HTTPクライアントの構築に失敗: {e}"))?;
    Ok(RelayState::new(config, http_client, std::sync::Arc::new(store)))
}
