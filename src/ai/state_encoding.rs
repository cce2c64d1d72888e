use burn::prelude::*;
use burn::tensor::TensorData;

use crate::env::{Observation, OBSERVATION_SIZE};

/// Encode a single observation as a tensor of shape [1, 4].
pub fn encode_observation<B: Backend>(observation: &Observation, device: &B::Device) -> Tensor<B, 2> {
    Tensor::<B, 1>::from_data(TensorData::from(observation.as_slice()), device)
        .reshape([1, OBSERVATION_SIZE as i32])
}

/// Encode multiple observations as a batched tensor of shape [batch, 4].
pub fn encode_observations_batch<B: Backend>(
    observations: &[Observation],
    device: &B::Device,
) -> Tensor<B, 2> {
    let batch_size = observations.len();
    let mut flat = Vec::with_capacity(batch_size * OBSERVATION_SIZE);
    for obs in observations {
        flat.extend_from_slice(obs);
    }
    Tensor::<B, 1>::from_data(TensorData::from(flat.as_slice()), device)
        .reshape([batch_size as i32, OBSERVATION_SIZE as i32])
}

/// Encode a column of scalars as a tensor of shape [batch, 1].
pub fn encode_column<B: Backend>(values: &[f32], device: &B::Device) -> Tensor<B, 2> {
    Tensor::<B, 1>::from_data(TensorData::from(values), device).reshape([values.len() as i32, 1])
}

/// One-hot action mask of shape [batch, action_count].
pub fn encode_action_mask<B: Backend>(
    actions: &[usize],
    action_count: usize,
    device: &B::Device,
) -> Tensor<B, 2> {
    let mut mask = vec![0.0f32; actions.len() * action_count];
    for (i, &a) in actions.iter().enumerate() {
        mask[i * action_count + a] = 1.0;
    }
    Tensor::<B, 1>::from_data(TensorData::from(mask.as_slice()), device)
        .reshape([actions.len() as i32, action_count as i32])
}
