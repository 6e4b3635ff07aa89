//! Event substrate for an event-driven trading simulation.
//!
//! ```text
//! ┌─────────────┐  enqueue   ┌──────────────┐  dequeue   ┌─────────────┐
//! │  Producing  │───────────►│  EventQueue  │───────────►│  Consuming  │
//! │    stage    │  (stamps   │    (FIFO)    │  (seq      │    stage    │
//! └─────────────┘   seq)     └──────────────┘   order)   └─────────────┘
//! ```
//!
//! Stages (DataHandler, Strategy, Portfolio, ExecutionHandler, RiskManager,
//! Accounting, ...) live outside this crate; they only share the event
//! taxonomy in [`events`] and the ordering guarantee of [`queue`].

pub mod codec;
pub mod error;
pub mod events;
pub mod logging;
pub mod queue;

pub use error::{EventError, Result};
pub use events::{Event, EventId, EventPayload, EventType, Stage, Timestamp};
pub use queue::{EventQueue, QueueConfig, SharedEventQueue};
