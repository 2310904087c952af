//! 流加培養バイオリアクターの反応速度論（Monodモデル）。
//!
//! 状態ベクトルは菌体濃度 X_C、生産物濃度 P_C、基質濃度 S_C（いずれも g/liter）と
//! 培養液体積 Vol（liter）の4成分です。

/// 状態ベクトルの次元数（X_C, P_C, S_C, Vol）
pub const STATE_DIM: usize = 4;

/// シミュレーションの時間範囲（hour）
pub const T_MAX: f64 = 72.0;

/// 時間範囲を分割する区間数
pub const N_INTERVALS: usize = 72;

/// 1区間の長さ（hour）
pub const DELTA_T: f64 = T_MAX / N_INTERVALS as f64;

/// 初期状態 [X0, P0, S0, V0]
pub const INITIAL_STATE: [f64; STATE_DIM] = [0.05, 0.00, 10.00, 1.00];

/// Monodモデルの反応速度定数。
#[derive(Debug, Clone)]
pub struct MonodKinetics {
    /// 最大比増殖速度（1/hour）
    pub mumax: f64,
    /// 半飽和定数（g/liter）
    pub ks: f64,
    /// 基質に対する菌体の収率（g/g）
    pub yxs: f64,
    /// 菌体に対する生産物の収率（g/g）
    pub ypx: f64,
    /// 供給基質濃度（g/liter）
    pub sf: f64,
    /// 供給流量（liter/hour）
    pub flow_rate: f64,
}

impl Default for MonodKinetics {
    fn default() -> Self {
        Self {
            mumax: 0.20,
            ks: 1.00,
            yxs: 0.5,
            ypx: 0.2,
            sf: 10.0,
            flow_rate: 0.05,
        }
    }
}

impl MonodKinetics {
    /// 基質濃度に対する比増殖速度 mumax * S / (Ks + S) を計算します。
    pub fn growth_rate(&self, substrate: f64) -> f64 {
        self.mumax * substrate / (self.ks + substrate)
    }

    /// Monodモデルの常微分方程式の右辺を計算します。
    ///
    /// - dX/dt = -F*X/V + mu(S)*X
    /// - dP/dt = -F*P/V + Ypx*mu(S)*X
    /// - dS/dt =  F*(Sf-S)/V - mu(S)*X/Yxs
    /// - dV/dt =  F
    pub fn rhs(&self, state: [f64; STATE_DIM]) -> [f64; STATE_DIM] {
        let [cell, product, substrate, volume] = state;
        let growth = self.growth_rate(substrate) * cell;
        [
            -self.flow_rate * cell / volume + growth,
            -self.flow_rate * product / volume + self.ypx * growth,
            self.flow_rate * (self.sf - substrate) / volume - growth / self.yxs,
            self.flow_rate,
        ]
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn growth_rate_follows_monod_form() {
        let kinetics = MonodKinetics::default();
        assert_eq!(kinetics.growth_rate(0.0), 0.0);
        assert!((kinetics.growth_rate(10.0) - 0.20 * 10.0 / 11.0).abs() < 1e-12);
        // 基質が豊富でも最大比増殖速度は超えない
        assert!(kinetics.growth_rate(1e9) < kinetics.mumax);
    }

    #[test]
    fn rhs_matches_hand_computed_values_at_initial_state() {
        let kinetics = MonodKinetics::default();
        let derivative = kinetics.rhs(INITIAL_STATE);
        let growth = 0.20 * 10.0 / 11.0 * 0.05;
        assert!((derivative[0] - (-0.05 * 0.05 / 1.0 + growth)).abs() < 1e-12);
        assert!((derivative[1] - 0.2 * growth).abs() < 1e-12);
        assert!((derivative[2] - (0.05 * (10.0 - 10.0) / 1.0 - growth / 0.5)).abs() < 1e-12);
        assert!((derivative[3] - 0.05).abs() < 1e-12);
    }

    #[test]
    fn intervals_cover_the_time_horizon_exactly() {
        assert!((DELTA_T * N_INTERVALS as f64 - T_MAX).abs() < 1e-12);
    }
}
