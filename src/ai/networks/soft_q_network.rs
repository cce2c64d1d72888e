use burn::nn::{Linear, LinearConfig, Relu};
use burn::prelude::*;

use crate::env::{ACTION_COUNT, OBSERVATION_SIZE};

/// Soft Q-value network for CartPole.
///
/// ```text
/// Input:  [batch, 4]
/// FC1:    4 -> 64, ReLU
/// FC2:    64 -> 256, ReLU
/// FC3:    256 -> 2  (soft Q-values, one per push direction)
/// ```
#[derive(Module, Debug)]
pub struct SoftQNetwork<B: Backend> {
    fc1: Linear<B>,
    fc2: Linear<B>,
    fc3: Linear<B>,
    relu: Relu,
}

#[derive(Config, Debug)]
pub struct SoftQNetworkConfig {
    pub input_size: usize,
    pub hidden_sizes: [usize; 2],
    pub output_size: usize,
}

impl Default for SoftQNetworkConfig {
    fn default() -> Self {
        SoftQNetworkConfig {
            input_size: OBSERVATION_SIZE,
            hidden_sizes: [64, 256],
            output_size: ACTION_COUNT,
        }
    }
}

impl SoftQNetworkConfig {
    pub fn init<B: Backend>(&self, device: &B::Device) -> SoftQNetwork<B> {
        let [h1, h2] = self.hidden_sizes;
        SoftQNetwork {
            fc1: LinearConfig::new(self.input_size, h1).init(device),
            fc2: LinearConfig::new(h1, h2).init(device),
            fc3: LinearConfig::new(h2, self.output_size).init(device),
            relu: Relu::new(),
        }
    }
}

impl<B: Backend> SoftQNetwork<B> {
    /// Forward pass: input [batch, 4] -> output [batch, 2] soft Q-values.
    pub fn forward(&self, input: Tensor<B, 2>) -> Tensor<B, 2> {
        let x = self.relu.forward(self.fc1.forward(input));
        let x = self.relu.forward(self.fc2.forward(x));
        self.fc3.forward(x)
    }
}

/// Soft state value `V(s) = alpha * log(sum_a exp(Q(s, a) / alpha))`.
///
/// Input [batch, actions] -> output [batch, 1]. The row maximum is factored
/// out before exponentiating.
pub fn soft_value<B: Backend>(q_values: Tensor<B, 2>, alpha: f32) -> Tensor<B, 2> {
    let scaled = q_values.div_scalar(alpha);
    let max = scaled.clone().max_dim(1);
    let log_sum_exp = (scaled - max.clone()).exp().sum_dim(1).log() + max;
    log_sum_exp.mul_scalar(alpha)
}

#[cfg(test)]
mod tests {
    use super::*;
    use burn::backend::NdArray;
    use burn::tensor::TensorData;

    type TestBackend = NdArray<f32>;

    #[test]
    fn test_network_output_shape() {
        let device = Default::default();
        let network = SoftQNetworkConfig::default().init::<TestBackend>(&device);

        let input = Tensor::zeros([16, 4], &device);
        let output = network.forward(input);
        assert_eq!(output.shape().dims, [16, 2]);
    }

    #[test]
    fn test_network_custom_hidden_sizes() {
        let device = Default::default();
        let config = SoftQNetworkConfig {
            hidden_sizes: [8, 8],
            ..Default::default()
        };
        let network = config.init::<TestBackend>(&device);
        let output = network.forward(Tensor::zeros([1, 4], &device));
        assert_eq!(output.shape().dims, [1, 2]);
    }

    #[test]
    fn test_soft_value_matches_log_sum_exp() {
        let device = Default::default();
        let q = Tensor::<TestBackend, 1>::from_data(
            TensorData::from([1.0f32, 3.0, -2.0, 0.5].as_slice()),
            &device,
        )
        .reshape([2, 2]);
        let v: Vec<f32> = soft_value(q, 4.0).into_data().to_vec().unwrap();

        let expected = |a: f32, b: f32| 4.0 * ((a / 4.0).exp() + (b / 4.0).exp()).ln();
        assert!((v[0] - expected(1.0, 3.0)).abs() < 1e-5);
        assert!((v[1] - expected(-2.0, 0.5)).abs() < 1e-5);
    }

    #[test]
    fn test_soft_value_bounds() {
        let device = Default::default();
        let q = Tensor::<TestBackend, 1>::from_data(
            TensorData::from([10.0f32, 9.0].as_slice()),
            &device,
        )
        .reshape([1, 2]);
        let v: Vec<f32> = soft_value(q, 4.0).into_data().to_vec().unwrap();
        // max(q) <= V <= max(q) + alpha * ln(|A|)
        assert!(v[0] >= 10.0);
        assert!(v[0] <= 10.0 + 4.0 * 2.0f32.ln() + 1e-5);
    }

    #[test]
    fn test_soft_value_large_q_is_finite() {
        let device = Default::default();
        let q = Tensor::<TestBackend, 1>::from_data(
            TensorData::from([5000.0f32, 4990.0].as_slice()),
            &device,
        )
        .reshape([1, 2]);
        let v: Vec<f32> = soft_value(q, 1.0).into_data().to_vec().unwrap();
        assert!(v[0].is_finite());
        assert!((v[0] - 5000.0).abs() < 1e-2);
    }
}
