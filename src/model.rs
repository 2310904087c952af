use crate::bioreactor::STATE_DIM;
use burn::module::Module;
use burn::nn::{Linear, LinearConfig, Tanh};
use burn::prelude::Backend;
use burn::tensor::Tensor;

/// 隠れ層の数
pub const DEPTH: usize = 3;

/// 隠れ層のユニット数
pub const WIDTH: usize = 50;

/// 1つの時間区間を担当するサブネットワーク。
///
/// 時刻tを入力とし、その時点の状態ベクトル（X_C, P_C, S_C, Vol）を予測します。
/// 2つのエンコーダが生成する特徴量u, vを隠れ層の活性zで凸結合する
/// 改良型の全結合ネットワークで、出力には成分ごとのスケール係数を掛けます。
#[derive(Module, Debug)]
pub struct SubNetwork<B: Backend> {
    encoder_u: Linear<B>,
    encoder_v: Linear<B>,
    hidden: Vec<Linear<B>>,
    output: Linear<B>,
    activation: Tanh,
    scale_factors: Tensor<B, 1>,
}

impl<B: Backend> SubNetwork<B> {
    /// 新しいサブネットワークを初期化します。
    pub fn new(device: &B::Device) -> Self {
        Self::with_scale_factors([1.0; STATE_DIM], device)
    }

    /// 出力のスケール係数を指定してサブネットワークを初期化します。
    pub fn with_scale_factors(scale_factors: [f64; STATE_DIM], device: &B::Device) -> Self {
        let encoder_u = LinearConfig::new(1, WIDTH).init(device);
        let encoder_v = LinearConfig::new(1, WIDTH).init(device);
        let mut hidden = Vec::new();
        hidden.push(LinearConfig::new(1, WIDTH).init(device));
        for _ in 1..DEPTH {
            hidden.push(LinearConfig::new(WIDTH, WIDTH).init(device));
        }
        let output = LinearConfig::new(WIDTH, STATE_DIM).init(device);
        let factors: Vec<f32> = scale_factors.iter().map(|&s| s as f32).collect();
        Self {
            encoder_u,
            encoder_v,
            hidden,
            output,
            activation: Tanh::new(),
            scale_factors: Tensor::from_floats(factors.as_slice(), device),
        }
    }

    /// モデルの順伝播を実行します。
    ///
    /// 入力は形状 [n, 1] の時刻テンソル、出力は形状 [n, 4] の状態テンソルです。
    pub fn forward(&self, input: Tensor<B, 2>) -> Tensor<B, 2> {
        let u = self.activation.forward(self.encoder_u.forward(input.clone()));
        let v = self.activation.forward(self.encoder_v.forward(input.clone()));
        let mut state = input;
        for linear in &self.hidden {
            let z = self.activation.forward(linear.forward(state));
            state = (Tensor::ones_like(&z) - z.clone()) * u.clone() + z * v.clone();
        }
        let out = self.output.forward(state);
        out * self.scale_factors.clone().unsqueeze::<2>()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use burn::backend::NdArray;

    type TestBackend = NdArray<f32>;

    #[test]
    fn forward_maps_time_batch_to_state_batch() {
        let device = Default::default();
        let net = SubNetwork::<TestBackend>::new(&device);
        let input = Tensor::<TestBackend, 1>::from_floats([0.0, 0.5, 1.0].as_slice(), &device)
            .reshape([3, 1]);
        let output = net.forward(input);
        assert_eq!(output.dims(), [3, STATE_DIM]);
    }

    #[test]
    fn scale_factors_rescale_every_output_component() {
        let device = Default::default();
        let net = SubNetwork::<TestBackend>::with_scale_factors([0.0; STATE_DIM], &device);
        let input =
            Tensor::<TestBackend, 1>::from_floats([0.25].as_slice(), &device).reshape([1, 1]);
        let values = net.forward(input).into_data().to_vec::<f32>().unwrap();
        assert!(values.iter().all(|v| *v == 0.0));
    }
}
