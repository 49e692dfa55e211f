//! # Relay設定・共有状態
//!
//! 環境変数からの設定読み込みと、呼び出し間で共有される状態の定義。

use std::sync::Arc;

use crate::storage::ObjectStore;

/// アップロード先バケット名（固定）。
pub const BUCKET: &str = "testing-lambda-to-s3";

/// マルチパートアップロードのパートサイズ（5 MiB）。
pub const PART_SIZE: usize = 5 * 1024 * 1024;

/// 同時に送信中とするパート数の上限。
pub const QUEUE_DEPTH: usize = 4;

/// 署名付きURLの有効期限（秒）。
pub const PRESIGN_EXPIRY_SECS: u32 = 3600;

/// ダウンロードとアップロードを結ぶチャネルの容量（チャンク数）。
pub const RELAY_CAPACITY: usize = 8;

/// 非200レスポンスのボディをメッセージに含める際の上限（バイト）。
pub const ERROR_BODY_LIMIT: usize = 64 * 1024;

/// オリジンへの接続失敗時の扱い。
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum FetchErrorPolicy {
    /// ハンドラ外へエラーを伝播し、ランタイムの失敗処理に任せる。
    #[default]
    Propagate,
    /// 500レスポンスとして返す。
    Envelope,
}

impl std::str::FromStr for FetchErrorPolicy {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "propagate" => Ok(Self::Propagate),
            "envelope" => Ok(Self::Envelope),
            other => Err(anyhow::anyhow!(
                "FETCH_ERROR_POLICYは propagate または envelope である必要があります: {other}"
            )),
        }
    }
}

/// Relayの設定。コールドスタート時に一度だけ読み込む。
#[derive(Debug, Clone)]
pub struct RelayConfig {
    /// ストレージのリージョン
    pub region: String,
    /// S3互換ストレージのエンドポイント（MinIO, R2等）。Noneの場合はAWS S3。
    pub endpoint: Option<String>,
    /// 静的なアクセスキー。Noneの場合は標準の認証情報チェーンを使用する。
    pub access_key: Option<String>,
    /// 静的なシークレットキー
    pub secret_key: Option<String>,
    /// アップロード先バケット
    pub bucket: String,
    /// パートサイズ（バイト）
    pub part_size: usize,
    /// 同時送信パート数の上限
    pub queue_depth: usize,
    /// 中継チャネルの容量
    pub relay_capacity: usize,
    /// 署名付きURLの有効期限（秒）
    pub presign_expiry_secs: u32,
    /// オリジン接続失敗時の扱い
    pub fetch_error_policy: FetchErrorPolicy,
}

impl Default for RelayConfig {
    fn default() -> Self {
        Self {
            region: "us-east-1".to_string(),
            endpoint: None,
            access_key: None,
            secret_key: None,
            bucket: BUCKET.to_string(),
            part_size: PART_SIZE,
            queue_depth: QUEUE_DEPTH,
            relay_capacity: RELAY_CAPACITY,
            presign_expiry_secs: PRESIGN_EXPIRY_SECS,
            fetch_error_policy: FetchErrorPolicy::default(),
        }
    }
}

impl RelayConfig {
    /// 環境変数から構築する。
    pub fn from_env() -> anyhow::Result<Self> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// 任意のキー検索関数から構築する。
    pub fn from_lookup<F>(lookup: F) -> anyhow::Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let non_empty = |name: &str| lookup(name).filter(|v| !v.trim().is_empty());

        let region = non_empty("AWS_DEFAULT_REGION")
            .or_else(|| non_empty("AWS_REGION"))
            .unwrap_or_else(|| "us-east-1".to_string());

        let fetch_error_policy = non_empty("FETCH_ERROR_POLICY")
            .map(|v| v.parse::<FetchErrorPolicy>())
            .transpose()?
            .unwrap_or_default();

        let access_key = non_empty("S3_ACCESS_KEY");
        let secret_key = non_empty("S3_SECRET_KEY");
        if access_key.is_some() != secret_key.is_some() {
            anyhow::bail!("S3_ACCESS_KEYとS3_SECRET_KEYは両方設定する必要があります");
        }

        Ok(Self {
            region,
            endpoint: non_empty("S3_ENDPOINT"),
            access_key,
            secret_key,
            fetch_error_policy,
            ..Self::default()
        })
    }
}

/// 呼び出し間で共有される状態。
///
/// プロセス起動時に一度だけ構築し、各呼び出しには参照で渡す。
/// 呼び出し中に変更されることはない。
pub struct RelayState {
    pub config: RelayConfig,
    /// オリジン取得用HTTPクライアント
    pub http_client: reqwest::Client,
    /// アップロード先ストレージ（トレイトで抽象化）
    pub store: Arc<dyn ObjectStore>,
}

impl RelayState {
    pub fn new(config: RelayConfig, http_client: reqwest::Client, store: Arc<dyn ObjectStore>) -> Self {
        Self {
            config,
            http_client,
            store,
        }
    }
}
