use clap::{Parser, Subcommand};

/// clapでコマンドラインの構造を定義します。
#[derive(Parser, Debug)]
#[command(author, version, about = "A multifidelity Physics-Informed Neural Network (PINN) bioreactor example with Burn", long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

/// 実行するサブコマンドを定義します（simulate、train、infer）。
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// RK4でODEの参照解を計算し、CSVファイルに保存します
    Simulate,
    /// 多重忠実度PINNモデルを学習し、結果をファイルに保存します
    Train,
    /// 保存されたモデルを読み込み、ODE参照解と比較したチャートを出力します
    Infer,
}
