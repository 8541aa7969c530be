//! navsim-agents: the driving-agent contract and its training adapter.
//!
//! Agents turn an [`AgentInput`](common::AgentInput) into a future ego
//! [`Trajectory`](common::Trajectory). Trainable agents also expose targets,
//! a loss and an optimizer so the [`training`] runtime can fit them.

pub mod agent;
pub mod common;
pub mod config;
pub mod error;
pub mod tensor;
pub mod training;
