//! QC workflow stages.
//!
//! Run initiation, check execution, aggregation, and result publishing over a
//! shared summary store.

#![warn(missing_docs)]

pub mod error;
pub mod evaluator;
pub mod registry;
pub mod initiator;
pub mod executor;
pub mod aggregator;
pub mod publisher;
pub mod config;
pub mod pipeline;

#[cfg(test)]
mod test_support;

pub use error::{QcError, Result};
pub use evaluator::{CheckEvaluator, CommandEvaluator, StaticEvaluator};
pub use registry::{CheckRegistry, RegisteredCheck};
pub use initiator::{Clock, RunInitiator, StartRequest, SystemClock};
pub use executor::CheckExecutor;
pub use aggregator::{Aggregation, Aggregator, Divergence, StoreObservation};
pub use publisher::{
    ConsoleNotifier, LogNotifier, Notifier, ResultPublisher, TopicRouter, WebhookNotifier,
};
pub use config::{
    ChannelConfig, CheckConfig, EvaluatorConfig, NotificationConfig, QcConfig, StoreBackend,
    StoreConfig,
};
pub use pipeline::{Pipeline, RunOutcome};
