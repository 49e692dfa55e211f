//! # テスト用共通ヘルパー
//!
//! モックオリジンサーバー、インメモリストレージ、チャンクソースを提供する。

use std::collections::{BTreeMap, HashMap, VecDeque};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use bytes::Bytes;

use crate::config::{RelayConfig, RelayState};
use crate::error::RelayError;
use crate::fetch::ChunkSource;
use crate::storage::{CompletedPart, ObjectStore};

/// `/files/report.pdf`が返すボディの長さ（テスト用パートサイズの数倍）
pub const LARGE_BODY_LEN: usize = 300 * 1024 + 5;

/// テスト用パートサイズ
pub const TEST_PART_SIZE: usize = 64 * 1024;

/// 位置ごとに異なる値を持つバイト列。並び替えや欠落を検出できる。
pub fn patterned(len: usize) -> Vec<u8> {
    (0..len).map(|i| ((i * 31 + i / 251) % 256) as u8).collect()
}

/// テスト用モックオリジンを起動し、ベースURLを返す。
pub async fn start_mock_origin() -> String {
    use axum::body::Body;
    use axum::http::{header, StatusCode};
    use axum::response::{IntoResponse, Response};
    use axum::routing::get;

    let app = axum::Router::new()
        .route(
            "/files/report.pdf",
            get(|| async {
                (
                    [(header::CONTENT_TYPE, "application/pdf")],
                    patterned(LARGE_BODY_LEN),
                )
            }),
        )
        .route(
            "/big/archive.bin",
            get(|| async {
                (
                    [(header::CONTENT_TYPE, "application/zip")],
                    patterned(12 * 1024 * 1024 + 17),
                )
            }),
        )
        .route(
            "/missing.pdf",
            get(|| async { (StatusCode::NOT_FOUND, "no such file") }),
        )
        .route(
            "/error-page",
            get(|| async { (StatusCode::SERVICE_UNAVAILABLE, "x".repeat(1000)).into_response() }),
        )
        .route(
            "/untyped/blob",
            get(|| async { Response::new(Body::from("untyped body")) }),
        )
        .route("/dir/", get(|| async { "directory listing" }));

    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let port = listener.local_addr().unwrap().port();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });
    tokio::time::sleep(Duration::from_millis(50)).await;
    format!("http://127.0.0.1:{port}")
}

/// 接続を受け付けないローカルURLを返す。
pub async fn unused_local_url() -> String {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let port = listener.local_addr().unwrap().port();
    drop(listener);
    format!("http://127.0.0.1:{port}/file.bin")
}

/// テスト用RelayStateを構築するヘルパー（小さいパートサイズ）
pub fn test_state(store: Arc<MemoryObjectStore>) -> RelayState {
    test_state_with(
        store,
        RelayConfig {
            part_size: TEST_PART_SIZE,
            ..RelayConfig::default()
        },
    )
}

pub fn test_state_with(store: Arc<MemoryObjectStore>, config: RelayConfig) -> RelayState {
    RelayState::new(config, reqwest::Client::new(), store)
}

// ---------------------------------------------------------------------------
// チャンクソース
// ---------------------------------------------------------------------------

/// 事前に用意したチャンクを順に返すソース。
pub struct VecSource {
    chunks: VecDeque<Bytes>,
    reads: Arc<AtomicUsize>,
    fail_after: Option<usize>,
}

impl VecSource {
    pub fn new(chunks: Vec<Bytes>) -> Self {
        Self {
            chunks: chunks.into(),
            reads: Arc::new(AtomicUsize::new(0)),
            fail_after: None,
        }
    }

    /// `n`チャンク返した後に読み出しエラーを返す。
    pub fn failing_after(mut self, n: usize) -> Self {
        self.fail_after = Some(n);
        self
    }

    /// 読み出し回数のカウンタ
    pub fn reads(&self) -> Arc<AtomicUsize> {
        self.reads.clone()
    }
}

#[async_trait::async_trait]
impl ChunkSource for VecSource {
    async fn next_chunk(&mut self) -> Result<Option<Bytes>, RelayError> {
        let done = self.reads.fetch_add(1, Ordering::SeqCst);
        if self.fail_after == Some(done) {
            return Err(RelayError::OriginBody("接続がリセットされた".to_string()));
        }
        Ok(self.chunks.pop_front())
    }
}

// ---------------------------------------------------------------------------
// インメモリストレージ
// ---------------------------------------------------------------------------

/// 保存済みオブジェクト。
#[derive(Debug, Clone)]
pub struct StoredObject {
    pub data: Vec<u8>,
    pub content_type: String,
    /// 組み立てに使ったパート番号（単発PUTの場合は空）
    pub part_numbers: Vec<u32>,
}

struct PendingUpload {
    key: String,
    content_type: String,
    parts: BTreeMap<u32, Vec<u8>>,
}

#[derive(Default)]
struct Inner {
    objects: HashMap<String, StoredObject>,
    uploads: HashMap<String, PendingUpload>,
    aborted: Vec<String>,
    created: usize,
}

/// テスト用のインメモリObjectStore。
/// 送信中パート数のピークと中止されたアップロードを記録する。
pub struct MemoryObjectStore {
    inner: Mutex<Inner>,
    in_flight: Arc<AtomicUsize>,
    peak: AtomicUsize,
    fail_part: Option<u32>,
    fail_presign: bool,
    part_delay: Duration,
}

impl Default for MemoryObjectStore {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryObjectStore {
    pub fn new() -> Self {
        Self {
            inner: Mutex::new(Inner::default()),
            in_flight: Arc::new(AtomicUsize::new(0)),
            peak: AtomicUsize::new(0),
            fail_part: None,
            fail_presign: false,
            part_delay: Duration::from_millis(1),
        }
    }

    /// 指定番号のパート送信を失敗させる。
    pub fn failing_part(mut self, part_number: u32) -> Self {
        self.fail_part = Some(part_number);
        self
    }

    pub fn failing_presign(mut self) -> Self {
        self.fail_presign = true;
        self
    }

    pub fn with_part_delay_ms(mut self, ms: u64) -> Self {
        self.part_delay = Duration::from_millis(ms);
        self
    }

    pub fn object(&self, key: &str) -> Option<StoredObject> {
        self.inner.lock().unwrap().objects.get(key).cloned()
    }

    pub fn keys(&self) -> Vec<String> {
        let mut keys: Vec<String> = self.inner.lock().unwrap().objects.keys().cloned().collect();
        keys.sort();
        keys
    }

    /// 開始されたマルチパートアップロードの数
    pub fn created_uploads(&self) -> usize {
        self.inner.lock().unwrap().created
    }

    /// 完了も中止もされていないアップロードの数
    pub fn open_uploads(&self) -> usize {
        self.inner.lock().unwrap().uploads.len()
    }

    pub fn aborted_uploads(&self) -> Vec<String> {
        self.inner.lock().unwrap().aborted.clone()
    }

    pub fn peak_in_flight(&self) -> usize {
        self.peak.load(Ordering::SeqCst)
    }
}

/// 送信中カウンタをスコープ終了時に戻す。
struct InFlightGuard(Arc<AtomicUsize>);

impl Drop for InFlightGuard {
    fn drop(&mut self) {
        self.0.fetch_sub(1, Ordering::SeqCst);
    }
}

#[async_trait::async_trait]
impl ObjectStore for MemoryObjectStore {
    async fn put_object(
        &self,
        key: &str,
        content_type: &str,
        data: Vec<u8>,
    ) -> Result<(), RelayError> {
        self.inner.lock().unwrap().objects.insert(
            key.to_string(),
            StoredObject {
                data,
                content_type: content_type.to_string(),
                part_numbers: Vec::new(),
            },
        );
        Ok(())
    }

    async fn create_multipart_upload(
        &self,
        key: &str,
        content_type: &str,
    ) -> Result<String, RelayError> {
        let mut inner = self.inner.lock().unwrap();
        inner.created += 1;
        let upload_id = format!("upload-{}", inner.created);
        inner.uploads.insert(
            upload_id.clone(),
            PendingUpload {
                key: key.to_string(),
                content_type: content_type.to_string(),
                parts: BTreeMap::new(),
            },
        );
        Ok(upload_id)
    }

    async fn upload_part(
        &self,
        key: &str,
        upload_id: &str,
        part_number: u32,
        data: Vec<u8>,
    ) -> Result<CompletedPart, RelayError> {
        let current = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        let _guard = InFlightGuard(self.in_flight.clone());
        self.peak.fetch_max(current, Ordering::SeqCst);

        tokio::time::sleep(self.part_delay).await;

        if self.fail_part == Some(part_number) {
            return Err(RelayError::Upload(format!(
                "パート{part_number}の送信に失敗 ({key}): 500 InternalError"
            )));
        }

        let mut inner = self.inner.lock().unwrap();
        let upload = inner
            .uploads
            .get_mut(upload_id)
            .ok_or_else(|| RelayError::Storage(format!("NoSuchUpload: {upload_id}")))?;
        upload.parts.insert(part_number, data);
        Ok(CompletedPart {
            part_number,
            etag: format!("\"etag-{part_number}\""),
        })
    }

    async fn complete_multipart_upload(
        &self,
        key: &str,
        upload_id: &str,
        parts: Vec<CompletedPart>,
    ) -> Result<(), RelayError> {
        let mut inner = self.inner.lock().unwrap();
        let upload = inner
            .uploads
            .remove(upload_id)
            .ok_or_else(|| RelayError::Storage(format!("NoSuchUpload: {upload_id}")))?;
        assert_eq!(upload.key, key);

        let mut data = Vec::new();
        let mut part_numbers = Vec::new();
        for part in &parts {
            let bytes = upload.parts.get(&part.part_number).ok_or_else(|| {
                RelayError::Upload(format!("InvalidPart: {}", part.part_number))
            })?;
            assert_eq!(part.etag, format!("\"etag-{}\"", part.part_number));
            data.extend_from_slice(bytes);
            part_numbers.push(part.part_number);
        }

        inner.objects.insert(
            key.to_string(),
            StoredObject {
                data,
                content_type: upload.content_type,
                part_numbers,
            },
        );
        Ok(())
    }

    async fn abort_multipart_upload(&self, _key: &str, upload_id: &str) -> Result<(), RelayError> {
        let mut inner = self.inner.lock().unwrap();
        inner.uploads.remove(upload_id);
        inner.aborted.push(upload_id.to_string());
        Ok(())
    }

    async fn presign_get(&self, key: &str, expiry_secs: u32) -> Result<String, RelayError> {
        if self.fail_presign {
            return Err(RelayError::Presign("認証情報が取得できない".to_string()));
        }
        Ok(format!(
            "https://testing-lambda-to-s3.s3.mock.amazonaws.com/{key}\
             ?X-Amz-Algorithm=AWS4-HMAC-SHA256&X-Amz-Expires={expiry_secs}&X-Amz-Signature=test"
        ))
    }
}
