//! # ストリーミングアップローダー
//!
//! 中継チャネルから受け取ったチャンクをパートサイズ単位にまとめ、
//! マルチパートアップロードで1つのオブジェクトとして保存する。
//!
//! ## メモリ上限
//! 送信中のパートは最大`queue_depth`個。上限に達すると最も早く終わった
//! パートを待ってから次を送る。組み立て中のパートを含めても
//! ピークは概ね (queue_depth + 1) × part_size。
//!
//! ## 失敗時
//! どのパートが失敗しても、送信中のパートを打ち切ってアップロードを中止し、
//! 送信済みパートを破棄する。不完全なマルチパートアップロードは残さない。
//!
//! ## 小さなペイロード
//! 最初のパートが埋まる前にストリームが終わった場合はマルチパートを開始せず、
//! 1リクエストで保存する。

use std::sync::Arc;

use tokio::task::JoinSet;

use crate::error::RelayError;
use crate::relay::ChunkReceiver;
use crate::storage::{CompletedPart, ObjectStore};

/// アップロード結果のメタデータ。
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UploadOutcome {
    /// 保存先キー
    pub key: String,
    /// マルチパートを使った場合のアップロードID
    pub upload_id: Option<String>,
    /// 送信したパート数（単発PUTの場合は0）
    pub parts: u32,
    /// 保存したバイト数
    pub bytes: u64,
}

/// パートサイズと同時送信数を保持するアップローダー。
#[derive(Debug, Clone, Copy)]
pub struct StreamingUploader {
    part_size: usize,
    queue_depth: usize,
}

impl StreamingUploader {
    pub fn new(part_size: usize, queue_depth: usize) -> Self {
        Self {
            part_size: part_size.max(1),
            queue_depth: queue_depth.max(1),
        }
    }

    /// チャネルの内容をすべて`key`に保存する。
    pub async fn upload(
        &self,
        store: Arc<dyn ObjectStore>,
        key: &str,
        content_type: &str,
        mut chunks: ChunkReceiver,
    ) -> Result<UploadOutcome, RelayError> {
        let mut buffer: Vec<u8> = Vec::with_capacity(self.part_size);
        let mut session: Option<UploadSession> = None;
        let mut total: u64 = 0;

        let streamed: Result<(), RelayError> = async {
            while let Some(chunk) = chunks.recv().await {
                let mut chunk = chunk?;
                total += chunk.len() as u64;

                while !chunk.is_empty() {
                    let take = chunk.len().min(self.part_size - buffer.len());
                    buffer.extend_from_slice(&chunk.split_to(take));

                    if buffer.len() == self.part_size {
                        let part = std::mem::replace(&mut buffer, Vec::with_capacity(self.part_size));
                        if session.is_none() {
                            session = Some(
                                UploadSession::begin(
                                    store.clone(),
                                    key,
                                    content_type,
                                    self.queue_depth,
                                )
                                .await?,
                            );
                        }
                        if let Some(active) = session.as_mut() {
                            active.submit(part).await?;
                        }
                    }
                }
            }
            Ok::<(), RelayError>(())
        }
        .await;

        // 以降はチャンクを読まないので、読み出し側を止める
        drop(chunks);

        if let Err(e) = streamed {
            if let Some(active) = session {
                active.abort().await;
            }
            return Err(e);
        }

        match session {
            None => {
                tracing::info!(object_key = %key, bytes = total, "単発PUTで保存");
                store.put_object(key, content_type, buffer).await?;
                Ok(UploadOutcome {
                    key: key.to_string(),
                    upload_id: None,
                    parts: 0,
                    bytes: total,
                })
            }
            Some(mut active) => {
                let finished: Result<(), RelayError> = async {
                    if !buffer.is_empty() {
                        active.submit(buffer).await?;
                    }
                    active.drain().await
                }
                .await;

                match finished {
                    Ok(()) => active.complete(total).await,
                    Err(e) => {
                        active.abort().await;
                        Err(e)
                    }
                }
            }
        }
    }
}

/// 1つの(bucket, key)に紐づくマルチパートアップロード。
struct UploadSession {
    store: Arc<dyn ObjectStore>,
    key: String,
    upload_id: String,
    queue_depth: usize,
    next_part_number: u32,
    in_flight: JoinSet<Result<CompletedPart, RelayError>>,
    completed: Vec<CompletedPart>,
}

impl UploadSession {
    async fn begin(
        store: Arc<dyn ObjectStore>,
        key: &str,
        content_type: &str,
        queue_depth: usize,
    ) -> Result<Self, RelayError> {
        let upload_id = store.create_multipart_upload(key, content_type).await?;
        tracing::info!(object_key = %key, upload_id = %upload_id, "マルチパートアップロードを開始");

        Ok(Self {
            store,
            key: key.to_string(),
            upload_id,
            queue_depth,
            next_part_number: 1,
            in_flight: JoinSet::new(),
            completed: Vec::new(),
        })
    }

    /// パートを送信キューに入れる。キューが満杯なら1つ終わるまで待つ。
    async fn submit(&mut self, data: Vec<u8>) -> Result<(), RelayError> {
        while self.in_flight.len() >= self.queue_depth {
            self.join_one().await?;
        }

        let part_number = self.next_part_number;
        self.next_part_number += 1;

        let store = self.store.clone();
        let key = self.key.clone();
        let upload_id = self.upload_id.clone();
        tracing::debug!(object_key = %key, part_number, bytes = data.len(), "パートを送信");

        self.in_flight.spawn(async move {
            store.upload_part(&key, &upload_id, part_number, data).await
        });
        Ok(())
    }

    async fn join_one(&mut self) -> Result<(), RelayError> {
        match self.in_flight.join_next().await {
            Some(joined) => {
                let part = joined
                    .map_err(|e| RelayError::Upload(format!("パート送信タスクが異常終了: {e}")))??;
                tracing::debug!(object_key = %self.key, part_number = part.part_number, "パート送信完了");
                self.completed.push(part);
                Ok(())
            }
            None => Ok(()),
        }
    }

    async fn drain(&mut self) -> Result<(), RelayError> {
        while !self.in_flight.is_empty() {
            self.join_one().await?;
        }
        Ok(())
    }

    async fn complete(mut self, bytes: u64) -> Result<UploadOutcome, RelayError> {
        self.completed.sort_by_key(|p| p.part_number);
        let parts = self.completed.len() as u32;

        let completed = self
            .store
            .complete_multipart_upload(&self.key, &self.upload_id, self.completed.clone())
            .await;
        if let Err(e) = completed {
            self.abort().await;
            return Err(e);
        }

        tracing::info!(object_key = %self.key, parts, bytes, "マルチパートアップロード完了");
        Ok(UploadOutcome {
            key: self.key,
            upload_id: Some(self.upload_id),
            parts,
            bytes,
        })
    }

    /// 送信中のパートを打ち切り、アップロードを中止する。
    /// 中止自体の失敗はログに残し、元のエラーを優先する。
    async fn abort(mut self) {
        self.in_flight.abort_all();
        while self.in_flight.join_next().await.is_some() {}

        match self
            .store
            .abort_multipart_upload(&self.key, &self.upload_id)
            .await
        {
            Ok(()) => tracing::warn!(
                object_key = %self.key,
                upload_id = %self.upload_id,
                "マルチパートアップロードを中止し送信済みパートを破棄"
            ),
            Err(e) => tracing::error!(
                object_key = %self.key,
                upload_id = %self.upload_id,
                error = %e,
                "マルチパートアップロードの中止に失敗"
            ),
        }
    }
}
