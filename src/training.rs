use crate::MODEL_FILENAME;
use crate::bioreactor::{DELTA_T, INITIAL_STATE, MonodKinetics, N_INTERVALS, STATE_DIM};
use crate::linspace;
use crate::model::SubNetwork;
use crate::multifidelity::MultiNetwork;
use crate::pinn::{initial_condition_loss, residual_loss};
use burn::backend::{Autodiff, NdArray};
use burn::module::Module;
use burn::optim::{AdamConfig, GradientsParams, Optimizer};
use burn::record::{FullPrecisionSettings, NamedMpkFileRecorder};
use burn::tensor::Tensor;
use plotters::prelude::*;
use std::time::Instant;

type MyBackend = Autodiff<NdArray<f32>>;

/// 区間ごとのコロケーション点の数
const N_COLLOCATION: usize = 100;

/// 最初の区間でのADAMの最大エポック数
const N_EPOCHS_INI: usize = 5_000;

/// ADAMの最小エポック数
const N_EPOCHS_MIN: usize = 500;

/// エポック数の減衰時定数
const EPOCH_TAU: f64 = 3.0;

/// ADAMの初期学習率
const LEARNING_RATE: f64 = 1e-3;

/// 仕上げ段階のエポック数
const REFINE_EPOCHS: usize = 1_000;

/// 仕上げ段階の学習率
const REFINE_LEARNING_RATE: f64 = 1e-4;

/// 初期条件の損失に掛けるペナルティ係数
const INITIAL_PENALTY: f64 = 5e8;

/// 残差の方程式ごとの重み
const WEIGHTS_RESIDUAL: [f64; STATE_DIM] = [1.0, 1.0, 1.0, 1.0];

/// 損失を記録するエポック間隔
const LOG_INTERVAL: usize = 200;

/// 区間番号に応じたADAMのエポック数を返します。
///
/// 逐次学習では前の区間の重みを引き継ぐため、エポック数を指数的に減衰させ、
/// 下限で打ち切ります。
pub fn epoch_decay(iteration: usize) -> usize {
    if iteration < 100 {
        let n_epochs = N_EPOCHS_INI as f64 * (-(iteration as f64) / EPOCH_TAU).exp();
        n_epochs.max(N_EPOCHS_MIN as f64) as usize
    } else {
        N_EPOCHS_MIN
    }
}

/// `train`サブコマンドを実行します。
///
/// 区間ごとにサブネットワークを学習し、区分的モデルとして保存します。
pub fn run() -> Result<(), Box<dyn std::error::Error>> {
    let device = Default::default();
    let kinetics = MonodKinetics::default();

    // --- コロケーション点の準備（全区間で共通の局所時刻グリッド）---
    let time_values: Vec<f32> = linspace(0.0, DELTA_T, N_COLLOCATION)
        .into_iter()
        .map(|t| t as f32)
        .collect();
    let time_train = Tensor::<MyBackend, 1>::from_floats(time_values.as_slice(), &device)
        .reshape([N_COLLOCATION, 1]);

    let mut state_t = INITIAL_STATE;
    let mut net = SubNetwork::<MyBackend>::new(&device);
    let mut workers = Vec::with_capacity(N_INTERVALS);

    let mut total_loss_history = Vec::new();
    let mut residual_loss_history = Vec::new();
    let training_start = Instant::now();

    println!("学習を開始します (流加培養バイオリアクター / Monodモデル) - バックエンド: NdArray (CPU)");

    for interval in 0..N_INTERVALS {
        let n_epochs = epoch_decay(interval);
        println!(
            "--- 区間 {}/{} (開始時刻 {:.1} h, ADAMエポック数 {}) ---",
            interval + 1,
            N_INTERVALS,
            interval as f64 * DELTA_T,
            n_epochs
        );

        net = fit_stage(
            net,
            &kinetics,
            time_train.clone(),
            state_t,
            n_epochs,
            LEARNING_RATE,
            &mut total_loss_history,
            &mut residual_loss_history,
        );

        // 学習率を下げて再度最適化し、残差を詰める
        net = fit_stage(
            net,
            &kinetics,
            time_train.clone(),
            state_t,
            REFINE_EPOCHS,
            REFINE_LEARNING_RATE,
            &mut total_loss_history,
            &mut residual_loss_history,
        );

        // 区間終端の予測値を次の区間の初期条件として引き継ぐ
        let approximated = net
            .forward(time_train.clone())
            .into_data()
            .to_vec::<f32>()
            .unwrap();
        let last = &approximated[(N_COLLOCATION - 1) * STATE_DIM..];
        for i in 0..STATE_DIM {
            state_t[i] = last[i] as f64;
        }
        println!(
            "=> 区間終端の状態: X={:.4}, P={:.4}, S={:.4}, V={:.4}",
            state_t[0], state_t[1], state_t[2], state_t[3]
        );

        // 現在の重みは次の区間の初期値としてそのまま引き継ぐ
        workers.push(net.clone());
    }

    let training_duration = training_start.elapsed();
    println!("学習が完了しました。");
    println!("=> 学習時間: {:.2?}", training_duration);

    // --- 結果の保存と描画 ---
    plot_loss_history(&total_loss_history, &residual_loss_history)?;
    println!("=> 損失グラフを 'loss_graph.png' に保存しました。");

    let multi_net = MultiNetwork::new(workers, DELTA_T);

    println!("学習済みモデルを保存中...");
    match multi_net.save_file(
        MODEL_FILENAME,
        &NamedMpkFileRecorder::<FullPrecisionSettings>::new(),
    ) {
        Ok(_) => (),
        Err(e) => return Err(Box::new(e)),
    };
    println!("=> モデルを '{}' に保存しました。", MODEL_FILENAME);

    Ok(())
}

/// 1つの最適化段階を実行し、学習後のネットワークを返します。
fn fit_stage(
    mut net: SubNetwork<MyBackend>,
    kinetics: &MonodKinetics,
    time_train: Tensor<MyBackend, 2>,
    initial_state: [f64; STATE_DIM],
    n_epochs: usize,
    learning_rate: f64,
    total_loss_history: &mut Vec<f32>,
    residual_loss_history: &mut Vec<f32>,
) -> SubNetwork<MyBackend> {
    let device = time_train.device();
    let mut optim = AdamConfig::new().init();

    for epoch in 1..=n_epochs {
        let loss_residual = residual_loss(&net, kinetics, time_train.clone(), WEIGHTS_RESIDUAL);
        let loss_initial = initial_condition_loss(&net, initial_state, &device);
        let total_loss = loss_residual.clone() + loss_initial.mul_scalar(INITIAL_PENALTY);

        if epoch % LOG_INTERVAL == 0 {
            let total_val = total_loss.clone().into_scalar();
            let residual_val = loss_residual.into_scalar();
            total_loss_history.push(total_val);
            residual_loss_history.push(residual_val);
            println!(
                "[Epoch {}] Total Loss: {:.6}, Residual Loss: {:.6}",
                epoch, total_val, residual_val
            );
        }

        let grads = total_loss.backward();
        let grads = GradientsParams::from_grads(grads, &net);
        net = optim.step(learning_rate, net, grads);
    }
    net
}

/// 学習過程の損失をグラフとしてPNGファイルに出力します。
fn plot_loss_history(
    total_loss_hist: &[f32],
    residual_loss_hist: &[f32],
) -> Result<(), Box<dyn std::error::Error>> {
    if total_loss_hist.is_empty() {
        return Ok(());
    }
    let root = BitMapBackend::new("loss_graph.png", (800, 600)).into_drawing_area();
    root.fill(&WHITE)?;
    let max_log_loss = total_loss_hist
        .iter()
        .fold(f32::MIN, |acc, &v| acc.max(v.log10()));
    let min_log_loss = residual_loss_hist
        .iter()
        .fold(f32::MAX, |acc, &v| acc.min(v.log10()))
        - 0.5;
    let mut chart = ChartBuilder::on(&root)
        .caption("Loss History", ("sans-serif", 40).into_font())
        .margin(10)
        .x_label_area_size(40)
        .y_label_area_size(50)
        .build_cartesian_2d(0..total_loss_hist.len(), min_log_loss..max_log_loss)?;
    chart
        .configure_mesh()
        .y_desc("Loss (log10 scale)")
        .x_desc("Epochs (x200)")
        .draw()?;
    chart
        .draw_series(LineSeries::new(
            total_loss_hist
                .iter()
                .enumerate()
                .map(|(i, &val)| (i, val.log10())),
            &RED,
        ))?
        .label("Total Loss")
        .legend(|(x, y)| PathElement::new(vec![(x, y), (x + 20, y)], &RED));
    chart
        .draw_series(LineSeries::new(
            residual_loss_hist
                .iter()
                .enumerate()
                .map(|(i, &val)| (i, val.log10())),
            &BLUE,
        ))?
        .label("Residual Loss")
        .legend(|(x, y)| PathElement::new(vec![(x, y), (x + 20, y)], &BLUE));
    chart
        .configure_series_labels()
        .background_style(&WHITE.mix(0.8))
        .border_style(&BLACK)
        .draw()?;
    root.present()?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn epoch_decay_starts_at_the_full_budget() {
        assert_eq!(epoch_decay(0), N_EPOCHS_INI);
    }

    #[test]
    fn epoch_decay_is_monotonically_nonincreasing() {
        for i in 1..20 {
            assert!(epoch_decay(i) <= epoch_decay(i - 1));
        }
    }

    #[test]
    fn epoch_decay_is_clamped_to_the_floor() {
        assert_eq!(epoch_decay(50), N_EPOCHS_MIN);
        assert_eq!(epoch_decay(150), N_EPOCHS_MIN);
    }
}
