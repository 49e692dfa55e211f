//! # ダウンロード→アップロード中継
//!
//! ダウンロード側の読み出しタスクとアップロード側を容量制限付きチャネルで結ぶ。
//!
//! ## バックプレッシャー
//! チャネルが満杯の間、読み出しタスクは`send`で待機し、次のチャンクを読まない。
//! アップロード側が遅れるとダウンロードも止まり、メモリ上のチャンク数は
//! チャネル容量 + 1 を超えない。
//!
//! ## 順序
//! チャンクは受信順にチャネルへ送られ、受信側も同じ順で取り出す。

use bytes::Bytes;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

use crate::error::RelayError;
use crate::fetch::ChunkSource;

/// アップロード側が受け取るチャンクの受信端。
pub type ChunkReceiver = mpsc::Receiver<Result<Bytes, RelayError>>;

/// 読み出しタスクを起動し、受信端を返す。
///
/// 読み出しエラーはチャネルに流してから終了する。受信端が破棄されると
/// 次の送信で検知して読み出しを止める。
pub fn spawn_relay<S>(mut source: S, capacity: usize) -> (ChunkReceiver, JoinHandle<u64>)
where
    S: ChunkSource + 'static,
{
    let (tx, rx) = mpsc::channel(capacity.max(1));

    let handle = tokio::spawn(async move {
        let mut relayed: u64 = 0;
        loop {
            match source.next_chunk().await {
                Ok(Some(chunk)) => {
                    if chunk.is_empty() {
                        continue;
                    }
                    let len = chunk.len() as u64;
                    if tx.send(Ok(chunk)).await.is_err() {
                        tracing::debug!(relayed, "受信側が終了したため中継を停止");
                        break;
                    }
                    relayed += len;
                }
                Ok(None) => {
                    tracing::debug!(relayed, "オリジンのボディを読み終えた");
                    break;
                }
                Err(e) => {
                    tracing::warn!(error = %e, relayed, "オリジンのボディ読み取りに失敗");
                    let _ = tx.send(Err(e)).await;
                    break;
                }
            }
        }
        relayed
    });

    (rx, handle)
}
