// Fieldline Automation Engine
//
// Evaluates organization-defined automation flows (a trigger plus an ordered
// pipeline of delay/condition/action blocks) against domain events emitted by
// the rest of the product. Events enter through the Dispatcher, which hands
// them to the FlowEngine on a bounded worker pool; executors perform the side
// effects (email, notifications, invoicing, webhooks, ...) against an injected
// store client.

pub mod actions;
pub mod config;
pub mod dispatch;
pub mod engine;
pub mod error;
pub mod events;
pub mod models;
pub mod resume;
pub mod store;
pub mod template;

pub use actions::ActionResult;
pub use config::Config;
pub use dispatch::{Dispatcher, DispatcherConfig};
pub use engine::{FlowEngine, ProcessSummary};
pub use events::{AutomationEvent, EventCategory, EventType};
pub use resume::{ContinuationSweeper, ResumeConfig};
pub use store::{AutomationStore, MemoryStore, PostgresStore};
