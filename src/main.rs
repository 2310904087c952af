//! # 流加培養バイオリアクターの多重忠実度PINNサンプルプログラム
//!
//! `burn` フレームワークを使用して、Monodモデルに従う流加培養バイオリアクターの
//! 時間発展を区間ごとのPINNで近似し、それらを継ぎ合わせて1つの区分的モデルを
//! 構築するサンプルです。
//!
//! `clap` クレートを利用して、コマンドラインから`simulate`（参照解の生成）、
//! `train`（学習）、`infer`（推論と比較チャートの出力）の機能を個別に実行できます。
//!
//! ## 使い方
//!
//! ### 参照解の生成
//! ```bash
//! cargo run --release -- simulate
//! ```
//!
//! ### 学習
//! ```bash
//! cargo run --release -- train
//! ```
//!
//! ### 推論
//! ```bash
//! cargo run --release -- infer
//! ```

use bioreactor_pinn::cli::{Cli, Commands};
use bioreactor_pinn::{inference, reference, training};
use clap::Parser;

/// プログラムのエントリーポイント。
///
/// コマンドライン引数を解析し、各サブコマンドの処理に振り分けます。
fn main() {
    let cli = Cli::parse();

    let result = match &cli.command {
        Commands::Simulate => reference::run(),
        Commands::Train => training::run(),
        Commands::Infer => inference::run(),
    };

    if let Err(e) = result {
        eprintln!("エラー: {}", e);
        std::process::exit(1);
    }
}
