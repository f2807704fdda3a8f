//! The agent runtime seam and the Streaming Execution Bridge.
//!
//! [`AgentRuntime`] wraps LLM providers behind a typed streaming interface;
//! models route by name prefix (`claude-` to Anthropic, `gpt-` to OpenAI,
//! anything else fails). The [`ExecutionBridge`] gives every execution a
//! persistent id *before* output begins streaming and multicasts ordered
//! chunk / completed / failed notices to subscribers; cancelling a
//! subscription suppresses subsequent notices without aborting the
//! in-flight call.
//!
//! # Main types
//!
//! - [`AgentRuntime`] / [`ProviderRouter`] — The consumed LLM interface.
//! - [`ExecutionBridge`] / [`ExecutionHandle`] — Identified streaming.
//! - [`SubscriberHub`] — Per-execution and per-project fan-out.

/// The execution bridge.
pub mod bridge;
/// Runtime configuration.
pub mod config;
/// Provider clients and model-prefix routing.
pub mod providers;
/// The runtime trait and stream event types.
pub mod runtime;
/// Subscriber fan-out.
pub mod subscribers;

pub use bridge::{ExecutionBridge, ExecutionHandle};
pub use config::RuntimeConfig;
pub use providers::ProviderRouter;
pub use runtime::{AgentRuntime, ExecutionOutcome, ExecutionRequest, StreamEvent};
pub use subscribers::{ExecutionNotice, ProjectNotice, SubscriberHub, Subscription};
