use crate::bioreactor::STATE_DIM;
use crate::model::SubNetwork;
use burn::module::Module;
use burn::prelude::Backend;
use burn::tensor::Tensor;

/// 区間ごとのサブネットワークを継ぎ合わせた区分的モデル。
///
/// 評価時は入力時刻が属する区間を求め、区間の開始時刻を差し引いた
/// 局所時刻をその区間のサブネットワークに渡します。区間は連続かつ
/// 重複せず、区間の境界は直前の区間に属します。
#[derive(Module, Debug)]
pub struct MultiNetwork<B: Backend> {
    workers: Vec<SubNetwork<B>>,
    delta_t: f64,
}

impl<B: Backend> MultiNetwork<B> {
    /// 学習済みのサブネットワーク列から区分的モデルを構築します。
    pub fn new(workers: Vec<SubNetwork<B>>, delta_t: f64) -> Self {
        Self { workers, delta_t }
    }

    /// 未学習のサブネットワークで初期化した区分的モデルを構築します。
    ///
    /// 保存済みレコードを読み込む際の受け皿として使用します。
    pub fn init(n_intervals: usize, delta_t: f64, device: &B::Device) -> Self {
        let workers = (0..n_intervals).map(|_| SubNetwork::new(device)).collect();
        Self { workers, delta_t }
    }

    /// サブネットワークの数を返します。
    pub fn n_intervals(&self) -> usize {
        self.workers.len()
    }

    /// 時刻tが属する区間の番号を返します。
    pub fn interval_index(&self, t: f64) -> usize {
        let raw = t / self.delta_t;
        let index = if raw > 0.0 {
            (raw - 1e-13).floor() as usize
        } else {
            0
        };
        index.min(self.workers.len().saturating_sub(1))
    }

    /// 各時刻を担当するサブネットワークで評価し、状態ベクトルの列を返します。
    pub fn eval(&self, times: &[f64], device: &B::Device) -> Vec<[f32; STATE_DIM]> {
        times
            .iter()
            .map(|&t| {
                let index = self.interval_index(t);
                let local_t = (t - self.delta_t * index as f64) as f32;
                let input =
                    Tensor::<B, 1>::from_floats([local_t].as_slice(), device).reshape([1, 1]);
                let values = self.workers[index]
                    .forward(input)
                    .into_data()
                    .to_vec::<f32>()
                    .unwrap();
                [values[0], values[1], values[2], values[3]]
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use burn::backend::NdArray;

    type TestBackend = NdArray<f32>;

    #[test]
    fn interval_boundaries_belong_to_the_preceding_interval() {
        let device = Default::default();
        let multi = MultiNetwork::<TestBackend>::init(3, 1.0, &device);
        assert_eq!(multi.interval_index(0.0), 0);
        assert_eq!(multi.interval_index(0.5), 0);
        assert_eq!(multi.interval_index(1.0), 0);
        assert_eq!(multi.interval_index(1.5), 1);
        assert_eq!(multi.interval_index(2.0), 1);
        assert_eq!(multi.interval_index(3.0), 2);
    }

    #[test]
    fn interval_index_clamps_beyond_the_horizon() {
        let device = Default::default();
        let multi = MultiNetwork::<TestBackend>::init(3, 1.0, &device);
        assert_eq!(multi.interval_index(3.7), 2);
    }

    #[test]
    fn eval_returns_one_state_row_per_query_time() {
        let device = Default::default();
        let multi = MultiNetwork::<TestBackend>::init(2, 1.0, &device);
        let states = multi.eval(&[0.0, 0.25, 1.75], &device);
        assert_eq!(states.len(), 3);
        assert!(states.iter().flatten().all(|v| v.is_finite()));
    }

    #[test]
    fn eval_shifts_query_times_into_local_coordinates() {
        let device = Default::default();
        let multi = MultiNetwork::<TestBackend>::init(2, 1.0, &device);
        // 同じ局所時刻に写る2点は同じサブネットワークで評価されるため一致する
        let states = multi.eval(&[0.25, 1.25], &device);
        let direct = multi.eval(&[0.25], &device);
        assert_eq!(states[0], direct[0]);
        assert_ne!(states[0], states[1]);
    }
}
