//! Core entity structs: calls, vehicles, responders, facilities.
//!
//! These are plain data. Mutation rules (who may change which field, and
//! when) live in `rescue-core`; nothing here enforces them.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use ts_rs::TS;
use validator::Validate;

use crate::enums::{CallStatus, CapacityLevel, EmergencyCategory, Priority, UnitType, VehicleState};
use crate::ids::{CallId, DispatcherId, FacilityId, ResponderId, VehicleId};

// ---------------------------------------------------------------------------
// Location
// ---------------------------------------------------------------------------

/// Where the incident is, as reported by the caller.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, TS, Validate)]
#[ts(export, export_to = "bindings/")]
pub struct Location {
    /// Street address or landmark description.
    #[validate(length(min = 1, max = 200))]
    pub address: String,
    /// Latitude in decimal degrees, if the caller's device supplied one.
    #[validate(range(min = -90.0, max = 90.0))]
    pub latitude: Option<f64>,
    /// Longitude in decimal degrees, if the caller's device supplied one.
    #[validate(range(min = -180.0, max = 180.0))]
    pub longitude: Option<f64>,
}

/// Last position reported by a vehicle.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS)]
#[ts(export, export_to = "bindings/")]
pub struct Position {
    /// Latitude in decimal degrees.
    pub latitude: f64,
    /// Longitude in decimal degrees.
    pub longitude: f64,
    /// When the position was reported.
    pub reported_at: DateTime<Utc>,
}

// ---------------------------------------------------------------------------
// Call
// ---------------------------------------------------------------------------

/// Patient details gathered on scene.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export, export_to = "bindings/")]
pub struct PatientInfo {
    /// Patient name, if known.
    pub name: Option<String>,
    /// Patient age in years, if known.
    pub age: Option<u32>,
    /// Free-text condition assessment.
    pub condition: Option<String>,
}

/// An emergency call tracked from receipt to closure.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS)]
#[ts(export, export_to = "bindings/")]
pub struct Call {
    /// Immutable call identity.
    pub id: CallId,
    /// Human-readable reference (`CALL-XXXXXXXX`).
    pub reference: String,
    /// Current lifecycle status.
    pub status: CallStatus,
    /// Informational priority.
    pub priority: Priority,
    /// Reported emergency category.
    pub category: EmergencyCategory,
    /// Caller's name.
    pub caller_name: String,
    /// Caller's callback number.
    pub caller_phone: String,
    /// Free-text description of the emergency.
    pub description: String,
    /// Incident location.
    pub location: Location,
    /// First-entry time of every status the call has been in.
    pub timestamps: BTreeMap<CallStatus, DateTime<Utc>>,
    /// Vehicle bound at dispatch.
    pub vehicle: Option<VehicleId>,
    /// Responder bound at dispatch.
    pub responder: Option<ResponderId>,
    /// Dispatcher who authorized the assignment.
    pub dispatcher: Option<DispatcherId>,
    /// Patient details.
    pub patient: PatientInfo,
    /// Receiving facility chosen by the crew.
    pub hospital_destination: Option<String>,
    /// Incremented on every committed change.
    pub revision: u64,
    /// When the call was taken.
    pub created_at: DateTime<Utc>,
    /// When the call last changed.
    pub updated_at: DateTime<Utc>,
}

impl Call {
    /// When the call first entered `status`, if it ever did.
    pub fn entered_at(&self, status: CallStatus) -> Option<DateTime<Utc>> {
        self.timestamps.get(&status).copied()
    }
}

/// Intake payload for a new call.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS, Validate)]
#[ts(export, export_to = "bindings/")]
pub struct NewCall {
    /// Caller's name.
    #[validate(length(min = 1, max = 100))]
    pub caller_name: String,
    /// Caller's callback number.
    #[validate(length(min = 3, max = 20))]
    pub caller_phone: String,
    /// Reported emergency category.
    pub category: EmergencyCategory,
    /// Free-text description.
    #[validate(length(min = 1, max = 4000))]
    pub description: String,
    /// Incident location.
    #[validate(nested)]
    pub location: Location,
    /// Priority assigned by the call taker; defaults to `MEDIUM`.
    #[serde(default)]
    pub priority: Option<Priority>,
}

// ---------------------------------------------------------------------------
// Vehicle and responder
// ---------------------------------------------------------------------------

/// A dispatchable ambulance.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS)]
#[ts(export, export_to = "bindings/")]
pub struct Vehicle {
    /// Unit designator.
    pub id: VehicleId,
    /// Capability class.
    pub unit_type: UnitType,
    /// Availability state.
    pub state: VehicleState,
    /// The call this vehicle is bound to. Present exactly when `ASSIGNED`.
    pub bound_call: Option<CallId>,
    /// The responder crewing the current assignment.
    pub bound_responder: Option<ResponderId>,
    /// Last reported position.
    pub position: Option<Position>,
    /// Incremented on every committed change.
    pub revision: u64,
    /// When the vehicle last changed.
    pub updated_at: DateTime<Utc>,
}

/// Field personnel who can be bound to a call.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export, export_to = "bindings/")]
pub struct Responder {
    /// Responder identity.
    pub id: ResponderId,
    /// Display name.
    pub name: String,
    /// Opted in to receive new assignments.
    pub available: bool,
    /// The call this responder is currently working, if any.
    pub active_call: Option<CallId>,
}

// ---------------------------------------------------------------------------
// Facility
// ---------------------------------------------------------------------------

/// A receiving hospital, mirrored read-only from the capacity collaborator.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export, export_to = "bindings/")]
pub struct Facility {
    /// Facility identity.
    pub id: FacilityId,
    /// Facility name.
    pub name: String,
    /// Street address.
    pub address: String,
    /// Licensed beds.
    pub total_beds: u32,
    /// Beds currently free.
    pub available_beds: u32,
    /// Emergency department load.
    pub capacity: CapacityLevel,
    /// Incremented on every capacity report.
    pub revision: u64,
    /// When capacity was last reported.
    pub updated_at: DateTime<Utc>,
}
