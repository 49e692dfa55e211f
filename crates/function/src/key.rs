//! # オブジェクトキー生成
//!
//! 入力URLのファイル名とランダムなUUIDからストレージキーを導出する。
//! キー形式: `{uuid}-{filename}`

/// URLからファイル名を抽出する。
///
/// クエリ文字列（`?`以降）を除去し、最後の`/`区切りセグメントを返す。
/// 末尾が`/`のURLでは空文字列になる。
pub fn derive_filename(url: &str) -> &str {
    let base = url.split('?').next().unwrap_or(url);
    base.rsplit('/').next().unwrap_or(base)
}

/// URLからユニークなオブジェクトキーを生成する。
///
/// ランダム成分（UUID v4）により、同一URLに対する繰り返し呼び出しでも
/// 調整なしで衝突しない。
pub fn generate_object_key(url: &str) -> String {
    format!("{}-{}", uuid::Uuid::new_v4(), derive_filename(url))
}
