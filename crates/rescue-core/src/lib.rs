//! Dispatch coordination core for the Rescue engine.
//!
//! Owns the call lifecycle, the one-call-to-one-vehicle assignment rule,
//! and the fanout that carries every committed change to the dispatch
//! consoles and to the bound responder.
//!
//! # Modules
//!
//! - [`config`] -- Configuration loading from `rescue-config.yaml`.
//! - [`coordinator`] -- [`DispatchEngine`], the entry point for every
//!   mutation and snapshot read.
//! - [`error`] -- [`DispatchError`] and the caller-facing [`ErrorKind`].
//! - [`facilities`] -- Read-only mirror of hospital capacity.
//! - [`fanout`] -- Audiences, subscriptions, and the resync filter.
//! - [`lifecycle`] -- Call status chain and the call table.
//! - [`query`] -- Call filters for list and snapshot reads.
//! - [`registry`] -- Vehicles and responders.
//!
//! [`DispatchEngine`]: coordinator::DispatchEngine
//! [`DispatchError`]: error::DispatchError
//! [`ErrorKind`]: error::ErrorKind

pub mod config;
pub mod coordinator;
pub mod error;
pub mod facilities;
pub mod fanout;
pub mod lifecycle;
pub mod query;
pub mod registry;

pub use coordinator::{Assignment, DispatchEngine, DispatchOrder};
pub use error::{DispatchError, ErrorKind};
pub use facilities::CapacityReport;
pub use fanout::{Audience, Delivery, FanoutHub, Feed, ResyncFilter, Subscription};
pub use lifecycle::StatusDetails;
pub use query::CallFilter;
