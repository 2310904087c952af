use crate::bioreactor::{DELTA_T, N_INTERVALS, STATE_DIM, T_MAX};
use crate::multifidelity::MultiNetwork;
use crate::reference::{self, OdeRecord};
use crate::{MODEL_FILENAME, REFERENCE_CSV, linspace};
use burn::backend::NdArray;
use burn::module::Module;
use burn::record::{FullPrecisionSettings, NamedMpkFileRecorder};
use plotters::prelude::*;
use std::path::Path;
use std::time::Instant;

type MyBackend = NdArray<f32>;

/// 評価する時刻の数
const N_EVAL: usize = 1000;

/// 参照CSVを間引く間隔
const FILTER_SCALE: usize = 50;

const CONCENTRATION_CHART: &str = "Bioreactor_ODE_PINN_Concentration_Comparison.png";
const VOLUME_CHART: &str = "Bioreactor_ODE_PINN_Volume_Comparison.png";

/// `infer`サブコマンドを実行します。
///
/// 保存された区分的モデルを読み込み、参照用のODE解と比較したチャートを出力します。
pub fn run() -> Result<(), Box<dyn std::error::Error>> {
    let device = Default::default();

    if !Path::new(MODEL_FILENAME).exists() {
        return Err(format!(
            "モデルファイル '{}' が見つかりません。\n最初に 'train' コマンドでモデルを学習・保存してください。",
            MODEL_FILENAME
        )
        .into());
    }
    if !Path::new(REFERENCE_CSV).exists() {
        return Err(format!(
            "参照CSV '{}' が見つかりません。\n最初に 'simulate' コマンドでODE解を生成してください。",
            REFERENCE_CSV
        )
        .into());
    }

    println!("保存済みモデルを '{}' からロード中...", MODEL_FILENAME);
    let multi_net = match MultiNetwork::<MyBackend>::init(N_INTERVALS, DELTA_T, &device).load_file(
        MODEL_FILENAME,
        &NamedMpkFileRecorder::<FullPrecisionSettings>::new(),
        &device,
    ) {
        Ok(loaded_model) => loaded_model,
        Err(e) => return Err(Box::new(e)),
    };

    println!("\n推論を実行します - バックエンド: NdArray (CPU)");
    let inference_start = Instant::now();
    let time_plot = linspace(0.0, T_MAX, N_EVAL);
    let approximated = multi_net.eval(&time_plot, &device);
    let inference_duration = inference_start.elapsed();
    println!(
        "推論が完了しました。評価点数: {}, 区間数: {}",
        approximated.len(),
        multi_net.n_intervals()
    );
    println!("=> 推論時間: {:.2?}", inference_duration);

    let ode_results = reference::read_csv(REFERENCE_CSV)?;
    let ode_sampled: Vec<&OdeRecord> = ode_results.iter().step_by(FILTER_SCALE).collect();

    plot_concentration_comparison(&time_plot, &approximated, &ode_sampled)?;
    plot_volume_comparison(&time_plot, &approximated, &ode_sampled)?;
    println!(
        "=> チャートを '{}' と '{}' に保存しました。",
        CONCENTRATION_CHART, VOLUME_CHART
    );

    Ok(())
}

/// 濃度（菌体・生産物・基質）の比較チャートを出力します。
fn plot_concentration_comparison(
    time: &[f64],
    pinn: &[[f32; STATE_DIM]],
    ode: &[&OdeRecord],
) -> Result<(), Box<dyn std::error::Error>> {
    let root = BitMapBackend::new(CONCENTRATION_CHART, (800, 600)).into_drawing_area();
    root.fill(&WHITE)?;

    let mut y_max = 0.0f64;
    for record in ode {
        y_max = y_max.max(record.cell).max(record.product).max(record.substrate);
    }
    for state in pinn {
        y_max = y_max.max(state[0] as f64).max(state[1] as f64).max(state[2] as f64);
    }

    let mut chart = ChartBuilder::on(&root)
        .caption("Bioreactor ODE vs PINN (Concentration)", ("sans-serif", 30).into_font())
        .margin(10)
        .x_label_area_size(40)
        .y_label_area_size(50)
        .build_cartesian_2d(0.0..T_MAX, 0.0..y_max * 1.05)?;
    chart
        .configure_mesh()
        .x_desc("Time [hr]")
        .y_desc("Concentration [g/liter]")
        .draw()?;

    chart
        .draw_series(
            ode.iter()
                .map(|r| Circle::new((r.time, r.cell), 3, RED.filled())),
        )?
        .label("ODE - Cell Conc.")
        .legend(|(x, y)| Circle::new((x + 10, y), 3, RED.filled()));
    chart
        .draw_series(
            ode.iter()
                .map(|r| Circle::new((r.time, r.product), 3, BLUE.filled())),
        )?
        .label("ODE - Product Conc.")
        .legend(|(x, y)| Circle::new((x + 10, y), 3, BLUE.filled()));
    chart
        .draw_series(
            ode.iter()
                .map(|r| Circle::new((r.time, r.substrate), 3, GREEN.filled())),
        )?
        .label("ODE - Substrate Conc.")
        .legend(|(x, y)| Circle::new((x + 10, y), 3, GREEN.filled()));

    chart
        .draw_series(LineSeries::new(
            time.iter().zip(pinn).map(|(&t, s)| (t, s[0] as f64)),
            &RED,
        ))?
        .label("PINN - Cell Conc.")
        .legend(|(x, y)| PathElement::new(vec![(x, y), (x + 20, y)], &RED));
    chart
        .draw_series(LineSeries::new(
            time.iter().zip(pinn).map(|(&t, s)| (t, s[1] as f64)),
            &BLUE,
        ))?
        .label("PINN - Product Conc.")
        .legend(|(x, y)| PathElement::new(vec![(x, y), (x + 20, y)], &BLUE));
    chart
        .draw_series(LineSeries::new(
            time.iter().zip(pinn).map(|(&t, s)| (t, s[2] as f64)),
            &GREEN,
        ))?
        .label("PINN - Substrate Conc.")
        .legend(|(x, y)| PathElement::new(vec![(x, y), (x + 20, y)], &GREEN));

    chart
        .configure_series_labels()
        .background_style(&WHITE.mix(0.8))
        .border_style(&BLACK)
        .draw()?;
    root.present()?;
    Ok(())
}

/// 培養液体積の比較チャートを出力します。
fn plot_volume_comparison(
    time: &[f64],
    pinn: &[[f32; STATE_DIM]],
    ode: &[&OdeRecord],
) -> Result<(), Box<dyn std::error::Error>> {
    let root = BitMapBackend::new(VOLUME_CHART, (800, 600)).into_drawing_area();
    root.fill(&WHITE)?;

    let mut y_max = 0.0f64;
    for record in ode {
        y_max = y_max.max(record.volume);
    }
    for state in pinn {
        y_max = y_max.max(state[3] as f64);
    }

    let mut chart = ChartBuilder::on(&root)
        .caption("Bioreactor ODE vs PINN (Volume)", ("sans-serif", 30).into_font())
        .margin(10)
        .x_label_area_size(40)
        .y_label_area_size(50)
        .build_cartesian_2d(0.0..T_MAX, 0.0..y_max * 1.05)?;
    chart
        .configure_mesh()
        .x_desc("Time [hr]")
        .y_desc("Volume [liter]")
        .draw()?;

    chart
        .draw_series(
            ode.iter()
                .map(|r| Circle::new((r.time, r.volume), 3, MAGENTA.filled())),
        )?
        .label("ODE - Volume [liter]")
        .legend(|(x, y)| Circle::new((x + 10, y), 3, MAGENTA.filled()));
    chart
        .draw_series(LineSeries::new(
            time.iter().zip(pinn).map(|(&t, s)| (t, s[3] as f64)),
            &MAGENTA,
        ))?
        .label("PINN - Volume [liter]")
        .legend(|(x, y)| PathElement::new(vec![(x, y), (x + 20, y)], &MAGENTA));

    chart
        .configure_series_labels()
        .background_style(&WHITE.mix(0.8))
        .border_style(&BLACK)
        .draw()?;
    root.present()?;
    Ok(())
}
