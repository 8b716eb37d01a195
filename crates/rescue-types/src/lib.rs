//! Shared type definitions for the Rescue dispatch coordination engine.
//!
//! This crate is the single source of truth for the data that crosses
//! component and process boundaries: calls, vehicles, responders,
//! facilities, fanout events, and the live-channel protocol. Types flow
//! downstream to `TypeScript` via `ts-rs` for the dispatch console and the
//! field application.
//!
//! # Modules
//!
//! - [`ids`] -- Type-safe identifiers
//! - [`enums`] -- Status, priority, availability, and event enumerations
//! - [`structs`] -- Entity structs and the call intake payload
//! - [`events`] -- Fanout events, snapshots, and live-channel frames

pub mod enums;
pub mod events;
pub mod ids;
pub mod structs;

// Re-export all public types at crate root for convenience.
pub use enums::{
    CallStatus, CapacityLevel, EmergencyCategory, EventAction, EventKind, Priority, Role,
    UnitType, VehicleState,
};
pub use events::{
    ClientMessage, DispatchEvent, EntityKey, EventPayload, ServerMessage, Snapshot,
};
pub use ids::{CallId, DispatcherId, EventId, FacilityId, ResponderId, VehicleId};
pub use structs::{Call, Facility, Location, NewCall, PatientInfo, Position, Responder, Vehicle};
