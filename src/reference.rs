//! RK4による参照用ODE解の計算とCSV入出力。

use crate::REFERENCE_CSV;
use crate::bioreactor::{INITIAL_STATE, MonodKinetics, STATE_DIM, T_MAX};
use serde::{Deserialize, Serialize};
use std::path::Path;

/// 参照解の時間刻み幅（hour）
pub const REFERENCE_DT: f64 = 0.01;

/// 参照CSVの1行分のレコード。
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OdeRecord {
    #[serde(rename = "Time")]
    pub time: f64,
    #[serde(rename = "Cell Conc.")]
    pub cell: f64,
    #[serde(rename = "Product Conc.")]
    pub product: f64,
    #[serde(rename = "Substrate Conc.")]
    pub substrate: f64,
    #[serde(rename = "Volume [liter]")]
    pub volume: f64,
}

/// 古典的な4次のRunge-Kutta法で1ステップ進めます。
fn rk4_step(kinetics: &MonodKinetics, state: [f64; STATE_DIM], dt: f64) -> [f64; STATE_DIM] {
    let shift = |base: [f64; STATE_DIM], slope: [f64; STATE_DIM], factor: f64| {
        let mut out = base;
        for i in 0..STATE_DIM {
            out[i] += slope[i] * factor;
        }
        out
    };
    let k1 = kinetics.rhs(state);
    let k2 = kinetics.rhs(shift(state, k1, dt / 2.0));
    let k3 = kinetics.rhs(shift(state, k2, dt / 2.0));
    let k4 = kinetics.rhs(shift(state, k3, dt));
    let mut next = state;
    for i in 0..STATE_DIM {
        next[i] += dt / 6.0 * (k1[i] + 2.0 * k2[i] + 2.0 * k3[i] + k4[i]);
    }
    next
}

/// 初期状態から時間範囲全体を積分し、各時刻のレコードを返します。
pub fn solve(kinetics: &MonodKinetics, t_max: f64, dt: f64) -> Vec<OdeRecord> {
    let n_steps = (t_max / dt).round() as usize;
    let mut state = INITIAL_STATE;
    let mut records = Vec::with_capacity(n_steps + 1);
    records.push(record_at(0.0, state));
    for step in 1..=n_steps {
        state = rk4_step(kinetics, state, dt);
        records.push(record_at(step as f64 * dt, state));
    }
    records
}

fn record_at(time: f64, state: [f64; STATE_DIM]) -> OdeRecord {
    OdeRecord {
        time,
        cell: state[0],
        product: state[1],
        substrate: state[2],
        volume: state[3],
    }
}

/// レコード列をCSVファイルに書き出します。
pub fn write_csv(
    path: impl AsRef<Path>,
    records: &[OdeRecord],
) -> Result<(), Box<dyn std::error::Error>> {
    let mut writer = csv::Writer::from_path(path)?;
    for record in records {
        writer.serialize(record)?;
    }
    writer.flush()?;
    Ok(())
}

/// CSVファイルからレコード列を読み込みます。
pub fn read_csv(path: impl AsRef<Path>) -> Result<Vec<OdeRecord>, Box<dyn std::error::Error>> {
    let mut reader = csv::Reader::from_path(path)?;
    let mut records = Vec::new();
    for record in reader.deserialize() {
        records.push(record?);
    }
    Ok(records)
}

/// `simulate`サブコマンドを実行します。
///
/// RK4で参照用のODE解を計算し、CSVファイルに保存します。
pub fn run() -> Result<(), Box<dyn std::error::Error>> {
    let kinetics = MonodKinetics::default();
    println!("参照用ODE解を計算します (RK4, dt = {} h)", REFERENCE_DT);
    let records = solve(&kinetics, T_MAX, REFERENCE_DT);
    write_csv(REFERENCE_CSV, &records)?;
    println!("=> {}件のレコードを '{}' に保存しました。", records.len(), REFERENCE_CSV);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn volume_grows_linearly_with_the_feed() {
        let kinetics = MonodKinetics::default();
        let records = solve(&kinetics, T_MAX, REFERENCE_DT);
        let last = records.last().unwrap();
        assert!((last.time - T_MAX).abs() < 1e-9);
        // dV/dt = F なので体積は厳密に線形に増加する
        assert!((last.volume - (1.0 + 0.05 * T_MAX)).abs() < 1e-6);
    }

    #[test]
    fn cells_grow_while_substrate_depletes() {
        let kinetics = MonodKinetics::default();
        let records = solve(&kinetics, T_MAX, REFERENCE_DT);
        let first = records.first().unwrap();
        let last = records.last().unwrap();
        assert!(last.cell > first.cell);
        assert!(last.product > first.product);
        assert!(last.substrate < first.substrate);
        assert!(last.substrate >= 0.0);
    }

    #[test]
    fn csv_round_trip_preserves_records() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("ode.csv");
        let kinetics = MonodKinetics::default();
        let records = solve(&kinetics, 1.0, 0.1);
        write_csv(&path, &records).unwrap();
        let loaded = read_csv(&path).unwrap();
        assert_eq!(loaded.len(), records.len());
        for (a, b) in loaded.iter().zip(&records) {
            assert!((a.time - b.time).abs() < 1e-12);
            assert!((a.substrate - b.substrate).abs() < 1e-12);
            assert!((a.volume - b.volume).abs() < 1e-12);
        }
    }
}
