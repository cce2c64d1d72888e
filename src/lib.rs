//! # Soft Q-Learning on CartPole
//!
//! Trains a small feed-forward network to approximate soft Q-values for the
//! cart-pole balancing task, using a Boltzmann policy, a replay buffer and a
//! periodically synced target network. Built on the Burn ML framework with a
//! Ratatui training dashboard.
//!
//! ## Modules
//!
//! - [`env`]: CartPole simulation and the `Environment` trait
//! - [`ai`]: agent traits, the Soft Q-Learning agent, networks, state encoding
//! - [`training`]: episode loop, replay buffer, metrics, scalar logs
//! - [`checkpoint`]: model persistence and versioning
//! - [`ui`]: terminal training dashboard
//! - [`config`]: TOML configuration loading and validation
//! - [`logging`]: tracing subscriber setup
//! - [`error`]: structured error types

#![recursion_limit = "256"]

pub mod ai;
pub mod checkpoint;
pub mod config;
pub mod env;
pub mod error;
pub mod logging;
pub mod training;
pub mod ui;
