//! # 署名付きURL発行
//!
//! アップロード完了後、匿名でのGETを許可する期限付きURLを発行する。
//! 発行時にオブジェクトの存在は確認しない。存在しないキーのURLは取得時に失敗する。

use crate::config::RelayState;
use crate::error::RelayError;

/// `key`に対する署名付きダウンロードURLを発行する。
/// 有効期限は設定値（既定3600秒）。
pub async fn presign_download(state: &RelayState, key: &str) -> Result<String, RelayError> {
    tracing::info!(object_key = %key, expiry_secs = state.config.presign_expiry_secs, "署名付きURLを生成");
    state
        .store
        .presign_get(key, state.config.presign_expiry_secs)
        .await
}
