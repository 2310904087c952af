use crate::bioreactor::{MonodKinetics, STATE_DIM};
use crate::model::SubNetwork;
use burn::nn::loss::{MseLoss, Reduction};
use burn::tensor::Tensor;
use burn::tensor::backend::AutodiffBackend;

/// 指定した出力成分の時間微分を自動微分で計算します。
pub fn time_derivative<B: AutodiffBackend>(
    model: &SubNetwork<B>,
    time: Tensor<B, 2>,
    output_index: usize,
) -> Tensor<B, 2> {
    let n = time.dims()[0];
    let time_grad = time.require_grad();
    let prediction = model.forward(time_grad.clone());
    let grads = prediction
        .slice([0..n, output_index..output_index + 1])
        .sum()
        .backward();
    let derivative = time_grad.grad(&grads).unwrap();
    Tensor::from_inner(derivative)
}

/// 物理残差の損失を計算します。
///
/// Monodモデルの各方程式について残差（方程式の各項を移項した結果、0になるべき値）を
/// 計算し、方程式ごとの二乗平均平方根誤差を重み付きで合計して返します。
pub fn residual_loss<B: AutodiffBackend>(
    model: &SubNetwork<B>,
    kinetics: &MonodKinetics,
    time: Tensor<B, 2>,
    weights: [f64; STATE_DIM],
) -> Tensor<B, 1> {
    let n = time.dims()[0];
    let d_cell = time_derivative(model, time.clone(), 0);
    let d_product = time_derivative(model, time.clone(), 1);
    let d_substrate = time_derivative(model, time.clone(), 2);
    let d_volume = time_derivative(model, time.clone(), 3);

    let prediction = model.forward(time);
    let cell = prediction.clone().slice([0..n, 0..1]);
    let product = prediction.clone().slice([0..n, 1..2]);
    let substrate = prediction.clone().slice([0..n, 2..3]);
    let volume = prediction.slice([0..n, 3..4]);

    // (mumax*S/(Ks + S))*X
    let growth = substrate
        .clone()
        .mul_scalar(kinetics.mumax)
        .div(substrate.clone().add_scalar(kinetics.ks))
        .mul(cell.clone());

    let rhs_cell = growth.clone() - cell.mul_scalar(kinetics.flow_rate).div(volume.clone());
    let rhs_product =
        growth.clone().mul_scalar(kinetics.ypx) - product.mul_scalar(kinetics.flow_rate).div(volume.clone());
    let rhs_substrate = substrate
        .mul_scalar(-1.0)
        .add_scalar(kinetics.sf)
        .mul_scalar(kinetics.flow_rate)
        .div(volume.clone())
        - growth.mul_scalar(1.0 / kinetics.yxs);
    let rhs_volume = Tensor::ones_like(&volume).mul_scalar(kinetics.flow_rate);

    rmse(d_cell - rhs_cell).mul_scalar(weights[0])
        + rmse(d_product - rhs_product).mul_scalar(weights[1])
        + rmse(d_substrate - rhs_substrate).mul_scalar(weights[2])
        + rmse(d_volume - rhs_volume).mul_scalar(weights[3])
}

/// 区間開始時刻での予測と初期条件とのずれを損失として計算します。
pub fn initial_condition_loss<B: AutodiffBackend>(
    model: &SubNetwork<B>,
    initial_state: [f64; STATE_DIM],
    device: &B::Device,
) -> Tensor<B, 1> {
    let t0 = Tensor::<B, 2>::zeros([1, 1], device);
    let prediction = model.forward(t0);
    let state: Vec<f32> = initial_state.iter().map(|&s| s as f32).collect();
    let target = Tensor::<B, 1>::from_floats(state.as_slice(), device).reshape([1, STATE_DIM]);
    MseLoss::new()
        .forward(prediction, target, Reduction::Mean)
        .sqrt()
}

fn rmse<B: AutodiffBackend>(residual: Tensor<B, 2>) -> Tensor<B, 1> {
    let zeros = Tensor::zeros_like(&residual);
    MseLoss::new()
        .forward(residual, zeros, Reduction::Mean)
        .sqrt()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bioreactor::INITIAL_STATE;
    use burn::backend::{Autodiff, NdArray};

    type TestBackend = Autodiff<NdArray<f32>>;

    fn time_grid(device: &<TestBackend as burn::prelude::Backend>::Device) -> Tensor<TestBackend, 2> {
        let values: Vec<f32> = (0..8).map(|i| i as f32 / 8.0).collect();
        Tensor::<TestBackend, 1>::from_floats(values.as_slice(), device).reshape([8, 1])
    }

    #[test]
    fn time_derivative_of_constant_network_is_zero() {
        let device = Default::default();
        let net = SubNetwork::<TestBackend>::with_scale_factors([0.0; STATE_DIM], &device);
        let derivative = time_derivative(&net, time_grid(&device), 0);
        let values = derivative.into_data().to_vec::<f32>().unwrap();
        assert!(values.iter().all(|v| v.abs() < 1e-6));
    }

    #[test]
    fn residual_loss_is_finite_and_nonnegative() {
        let device = Default::default();
        let net = SubNetwork::<TestBackend>::new(&device);
        let kinetics = MonodKinetics::default();
        let loss = residual_loss(&net, &kinetics, time_grid(&device), [1.0; STATE_DIM])
            .into_scalar();
        assert!(loss.is_finite());
        assert!(loss >= 0.0);
    }

    #[test]
    fn initial_condition_loss_vanishes_when_prediction_matches() {
        let device = Default::default();
        // スケール係数0のネットワークは恒等的に0を出力する
        let net = SubNetwork::<TestBackend>::with_scale_factors([0.0; STATE_DIM], &device);
        let loss = initial_condition_loss(&net, [0.0; STATE_DIM], &device).into_scalar();
        assert!(loss.abs() < 1e-6);
        let loss = initial_condition_loss(&net, INITIAL_STATE, &device).into_scalar();
        assert!(loss > 0.0);
    }
}
