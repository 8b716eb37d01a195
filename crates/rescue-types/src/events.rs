//! Fanout events, snapshots, and the live-channel wire protocol.
//!
//! A [`DispatchEvent`] is produced for every committed state change. Live
//! channels translate events into [`ServerMessage`] frames; clients speak
//! [`ClientMessage`].

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use ts_rs::TS;

use crate::enums::{EventAction, EventKind};
use crate::ids::{CallId, EventId, FacilityId, ResponderId, VehicleId};
use crate::structs::{Call, Facility, Vehicle};

// ---------------------------------------------------------------------------
// Events
// ---------------------------------------------------------------------------

/// The entity carried by an event, at the revision it was committed.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS)]
#[serde(tag = "entity", content = "data", rename_all = "snake_case")]
#[ts(export, export_to = "bindings/")]
pub enum EventPayload {
    /// A call snapshot.
    Call(Box<Call>),
    /// A vehicle snapshot.
    Vehicle(Box<Vehicle>),
    /// A facility snapshot.
    Facility(Box<Facility>),
}

/// Key identifying the entity an event or snapshot row describes.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum EntityKey {
    /// A call.
    Call(CallId),
    /// A vehicle.
    Vehicle(VehicleId),
    /// A facility.
    Facility(FacilityId),
}

impl EventPayload {
    /// Key of the entity this payload describes.
    pub fn key(&self) -> EntityKey {
        match self {
            Self::Call(call) => EntityKey::Call(call.id),
            Self::Vehicle(vehicle) => EntityKey::Vehicle(vehicle.id.clone()),
            Self::Facility(facility) => EntityKey::Facility(facility.id),
        }
    }

    /// Revision of the entity carried by this payload.
    pub const fn revision(&self) -> u64 {
        match self {
            Self::Call(call) => call.revision,
            Self::Vehicle(vehicle) => vehicle.revision,
            Self::Facility(facility) => facility.revision,
        }
    }

    /// The event kind matching this payload.
    pub const fn kind(&self) -> EventKind {
        match self {
            Self::Call(_) => EventKind::EmergencyUpdate,
            Self::Vehicle(_) => EventKind::VehicleUpdate,
            Self::Facility(_) => EventKind::FacilityUpdate,
        }
    }
}

/// A committed state change, routed by the fanout hub.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS)]
#[ts(export, export_to = "bindings/")]
pub struct DispatchEvent {
    /// Event identity.
    pub id: EventId,
    /// Which entity type changed.
    pub kind: EventKind,
    /// What happened.
    pub action: EventAction,
    /// The entity after the change.
    pub payload: EventPayload,
    /// When the event was emitted.
    pub emitted_at: DateTime<Utc>,
}

impl DispatchEvent {
    /// Build an event for `payload`; the kind is derived from the payload.
    pub fn new(action: EventAction, payload: EventPayload) -> Self {
        Self {
            id: EventId::new(),
            kind: payload.kind(),
            action,
            payload,
            emitted_at: Utc::now(),
        }
    }

    /// The responder whose audience mirrors this event, if any.
    ///
    /// Only call events are mirrored, and only to the responder bound to
    /// that call.
    pub fn responder(&self) -> Option<ResponderId> {
        match &self.payload {
            EventPayload::Call(call) => call.responder,
            EventPayload::Vehicle(_) | EventPayload::Facility(_) => None,
        }
    }
}

// ---------------------------------------------------------------------------
// Snapshot
// ---------------------------------------------------------------------------

/// Full current-state read used for page loads and live-channel resync.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, TS)]
#[ts(export, export_to = "bindings/")]
pub struct Snapshot {
    /// Calls matching the requested filter, newest first.
    pub calls: Vec<Call>,
    /// Vehicles with their current state.
    pub fleet: Vec<Vehicle>,
    /// Facility capacity mirror.
    pub facilities: Vec<Facility>,
    /// When the snapshot was assembled.
    pub taken_at: Option<DateTime<Utc>>,
}

impl Snapshot {
    /// Every entity in the snapshot with its revision.
    pub fn revisions(&self) -> impl Iterator<Item = (EntityKey, u64)> + '_ {
        let calls = self
            .calls
            .iter()
            .map(|c| (EntityKey::Call(c.id), c.revision));
        let fleet = self
            .fleet
            .iter()
            .map(|v| (EntityKey::Vehicle(v.id.clone()), v.revision));
        let facilities = self
            .facilities
            .iter()
            .map(|f| (EntityKey::Facility(f.id), f.revision));
        calls.chain(fleet).chain(facilities)
    }
}

// ---------------------------------------------------------------------------
// Live-channel protocol
// ---------------------------------------------------------------------------

/// A frame pushed from the server to a live-channel member.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS)]
#[serde(tag = "type", rename_all = "snake_case")]
#[ts(export, export_to = "bindings/")]
pub enum ServerMessage {
    /// Baseline state; always the first frame after connecting.
    Snapshot {
        /// The snapshot.
        data: Snapshot,
    },
    /// A call changed.
    EmergencyUpdate {
        /// What happened.
        event: EventAction,
        /// The call after the change.
        data: Box<Call>,
    },
    /// A vehicle changed.
    VehicleUpdate {
        /// What happened.
        event: EventAction,
        /// The vehicle after the change.
        data: Box<Vehicle>,
    },
    /// A facility changed.
    FacilityUpdate {
        /// What happened.
        event: EventAction,
        /// The facility after the change.
        data: Box<Facility>,
    },
    /// Reply to a client `ping`.
    Pong,
    /// A request from the client could not be served.
    Error {
        /// Human-readable reason.
        message: String,
    },
}

impl From<&DispatchEvent> for ServerMessage {
    fn from(event: &DispatchEvent) -> Self {
        match &event.payload {
            EventPayload::Call(call) => Self::EmergencyUpdate {
                event: event.action,
                data: call.clone(),
            },
            EventPayload::Vehicle(vehicle) => Self::VehicleUpdate {
                event: event.action,
                data: vehicle.clone(),
            },
            EventPayload::Facility(facility) => Self::FacilityUpdate {
                event: event.action,
                data: facility.clone(),
            },
        }
    }
}

/// A frame sent by a live-channel member.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, TS)]
#[serde(tag = "type", rename_all = "snake_case")]
#[ts(export, export_to = "bindings/")]
pub enum ClientMessage {
    /// Liveness probe; answered with `pong`.
    Ping,
    /// Ask for a fresh snapshot.
    GetInitialData,
}
