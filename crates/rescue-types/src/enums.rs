//! Enumeration types for the dispatch engine.
//!
//! Wire names are `SCREAMING_SNAKE_CASE`, matching the status codes that
//! dispatch consoles and field devices already display.

use serde::{Deserialize, Serialize};
use ts_rs::TS;

// ---------------------------------------------------------------------------
// Call status
// ---------------------------------------------------------------------------

/// Lifecycle status of an emergency call.
///
/// The forward chain is `RECEIVED -> DISPATCHED -> EN_ROUTE -> ON_SCENE ->
/// TRANSPORTING -> AT_HOSPITAL -> CLOSED`. `CANCELLED` is a second terminal
/// state reachable from any non-terminal status through an explicit cancel.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, TS)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
#[ts(export, export_to = "bindings/")]
pub enum CallStatus {
    /// Call taken, no unit assigned yet.
    Received,
    /// A vehicle has been bound to the call.
    Dispatched,
    /// The unit is travelling to the scene.
    EnRoute,
    /// The unit has arrived on scene.
    OnScene,
    /// The patient is being transported.
    Transporting,
    /// The patient has been handed over at the facility.
    AtHospital,
    /// The call is complete.
    Closed,
    /// The call was withdrawn before completion.
    Cancelled,
}

impl CallStatus {
    /// The forward chain, in order.
    pub const CHAIN: [Self; 7] = [
        Self::Received,
        Self::Dispatched,
        Self::EnRoute,
        Self::OnScene,
        Self::Transporting,
        Self::AtHospital,
        Self::Closed,
    ];

    /// The immediate successor on the forward chain, if any.
    pub const fn successor(self) -> Option<Self> {
        match self {
            Self::Received => Some(Self::Dispatched),
            Self::Dispatched => Some(Self::EnRoute),
            Self::EnRoute => Some(Self::OnScene),
            Self::OnScene => Some(Self::Transporting),
            Self::Transporting => Some(Self::AtHospital),
            Self::AtHospital => Some(Self::Closed),
            Self::Closed | Self::Cancelled => None,
        }
    }

    /// Whether no further transition is accepted from this status.
    pub const fn is_terminal(self) -> bool {
        matches!(self, Self::Closed | Self::Cancelled)
    }

    /// Awaiting assignment.
    pub const fn is_pending(self) -> bool {
        matches!(self, Self::Received)
    }

    /// A unit is committed and the incident is in progress.
    pub const fn is_active(self) -> bool {
        matches!(
            self,
            Self::Dispatched | Self::EnRoute | Self::OnScene | Self::Transporting
        )
    }

    /// Patient delivered or call finished.
    pub const fn is_completed(self) -> bool {
        matches!(self, Self::AtHospital | Self::Closed | Self::Cancelled)
    }

    /// Display label used by consoles.
    pub const fn label(self) -> &'static str {
        match self {
            Self::Received => "Received",
            Self::Dispatched => "Dispatched",
            Self::EnRoute => "En Route",
            Self::OnScene => "On Scene",
            Self::Transporting => "Transporting",
            Self::AtHospital => "At Hospital",
            Self::Closed => "Closed",
            Self::Cancelled => "Cancelled",
        }
    }
}

impl core::fmt::Display for CallStatus {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(self.label())
    }
}

// ---------------------------------------------------------------------------
// Priority and category
// ---------------------------------------------------------------------------

/// Informational call priority. Ordered `LOW < MEDIUM < HIGH < CRITICAL`.
///
/// Priority never drives scheduling automatically; dispatchers use it to
/// sort their queue.
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, TS,
)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
#[ts(export, export_to = "bindings/")]
pub enum Priority {
    /// Non-urgent.
    Low,
    /// Default priority for new calls.
    #[default]
    Medium,
    /// Urgent.
    High,
    /// Life-threatening.
    Critical,
}

/// Category of emergency reported by the caller.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, TS)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
#[ts(export, export_to = "bindings/")]
pub enum EmergencyCategory {
    /// General medical emergency.
    Medical,
    /// Injury from external force.
    Trauma,
    /// Cardiac arrest or chest pain.
    Cardiac,
    /// Suspected stroke.
    Stroke,
    /// Respiratory distress.
    Respiratory,
    /// Fire with casualties.
    Fire,
    /// Anything else.
    Other,
}

// ---------------------------------------------------------------------------
// Vehicles and facilities
// ---------------------------------------------------------------------------

/// Availability state of a vehicle.
///
/// `ASSIGNED` holds exactly when the vehicle has a bound call.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, TS)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
#[ts(export, export_to = "bindings/")]
pub enum VehicleState {
    /// Ready to be bound to a call.
    Available,
    /// Bound to a call.
    Assigned,
    /// Withdrawn from service (maintenance, crew change).
    OutOfService,
}

/// Capability class of an ambulance.
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, TS,
)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
#[ts(export, export_to = "bindings/")]
pub enum UnitType {
    /// Basic life support.
    #[default]
    Basic,
    /// Advanced life support.
    Advanced,
    /// Critical care transport.
    Critical,
}

/// Emergency department load reported by a facility.
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, TS,
)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
#[ts(export, export_to = "bindings/")]
pub enum CapacityLevel {
    /// Plenty of room.
    #[default]
    Low,
    /// Normal load.
    Moderate,
    /// Near capacity.
    High,
    /// Diverting.
    Full,
}

// ---------------------------------------------------------------------------
// Fanout
// ---------------------------------------------------------------------------

/// Which entity an event describes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, TS)]
#[ts(export, export_to = "bindings/")]
pub enum EventKind {
    /// A call changed.
    EmergencyUpdate,
    /// A vehicle changed.
    VehicleUpdate,
    /// A facility changed.
    FacilityUpdate,
}

/// What happened to the entity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, TS)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
#[ts(export, export_to = "bindings/")]
pub enum EventAction {
    /// The entity was created.
    New,
    /// The entity's status or assignment changed.
    StatusChange,
    /// A vehicle reported a new position.
    LocationUpdate,
    /// A facility reported new capacity.
    CapacityUpdate,
}

/// Role of an authenticated operator, as asserted by the auth collaborator.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, TS)]
#[serde(rename_all = "snake_case")]
#[ts(export, export_to = "bindings/")]
pub enum Role {
    /// Console operator; sees every call and may dispatch.
    Dispatcher,
    /// Field crew member; sees only their own assignment.
    Responder,
}

impl core::str::FromStr for Role {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "dispatcher" => Ok(Self::Dispatcher),
            "responder" | "paramedic" => Ok(Self::Responder),
            other => Err(format!("unknown role: {other}")),
        }
    }
}
