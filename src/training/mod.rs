//! Training infrastructure: episode loop, replay buffer, metrics collection,
//! scalar logs, and dashboard message types for live TUI updates.

pub mod dashboard_msg;
pub mod episode;
pub mod metrics;
pub mod replay_buffer;
pub mod scalar_log;
pub mod trainer;
