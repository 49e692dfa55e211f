//! # Origin Relay CLI
//!
//! 関数ランタイムを介さずに、同じ設定・同じハンドラで1回の呼び出しを実行する。
//!
//! ## コマンド
//! - `relay-cli invoke --url <URL>` — 呼び出し結果のJSONを標準出力に出力
//! - `relay-cli key --url <URL>` — 導出されるオブジェクトキーを出力

use clap::{Parser, Subcommand};
use relay_function::key::{derive_filename, generate_object_key};
use relay_function::{build_state, handle_invocation, init_tracing, RelayConfig};
use relay_types::InvocationRequest;

#[derive(Parser)]
#[command(name = "relay-cli", about = "Origin Relay CLI", version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// URLを取得してストレージへ転送し、結果のJSONを出力する
    Invoke {
        /// 取得対象の絶対URL
        #[arg(long)]
        url: String,
    },
    /// URLから導出されるオブジェクトキーを出力する
    Key {
        #[arg(long)]
        url: String,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    init_tracing();

    match cli.command {
        Commands::Invoke { url } => {
            let state = build_state(RelayConfig::from_env()?)?;
            let outcome = handle_invocation(&state, InvocationRequest { url }).await?;
            println!("{}", serde_json::to_string_pretty(&outcome.into_value())?);
        }
        Commands::Key { url } => {
            if derive_filename(&url).is_empty() {
                tracing::warn!("URLが/で終わるため、ファイル名部分が空になります");
            }
            println!("{}", generate_object_key(&url));
        }
    }

    Ok(())
}
