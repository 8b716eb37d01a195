//! Error types for the dispatch core.
//!
//! Every fallible core operation returns [`DispatchError`]. A failed
//! operation leaves all state exactly as it was before the call.
//! [`DispatchError::kind`] collapses the variants into the caller-facing
//! taxonomy used by the HTTP surface.

use rescue_types::{CallId, CallStatus, FacilityId, ResponderId, VehicleId, VehicleState};

/// Caller-facing error classes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// A referenced entity does not exist. Never retried.
    NotFound,
    /// The resource is committed elsewhere. The caller may retry with a
    /// different resource.
    Conflict,
    /// The requested status change violates the lifecycle.
    InvalidTransition,
    /// The call is terminal and accepts no further changes.
    TerminalState,
    /// The request itself is malformed.
    InvalidInput,
}

/// Errors raised by the lifecycle machine, registry, and coordinator.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum DispatchError {
    /// No call with this id.
    #[error("call not found: {0}")]
    CallNotFound(CallId),

    /// No vehicle with this unit designator.
    #[error("vehicle not found: {0}")]
    VehicleNotFound(VehicleId),

    /// No responder with this id.
    #[error("responder not found: {0}")]
    ResponderNotFound(ResponderId),

    /// No facility with this id.
    #[error("facility not found: {0}")]
    FacilityNotFound(FacilityId),

    /// The vehicle is not in a state that admits the request.
    #[error("vehicle {vehicle} is {state:?}")]
    VehicleUnavailable {
        /// The vehicle.
        vehicle: VehicleId,
        /// Its current state.
        state: VehicleState,
    },

    /// The responder has not opted in to new assignments.
    #[error("responder {0} is not accepting assignments")]
    ResponderUnavailable(ResponderId),

    /// The responder already holds an active assignment.
    #[error("responder {responder} is already assigned to call {call}")]
    ResponderBusy {
        /// The responder.
        responder: ResponderId,
        /// The call they are working.
        call: CallId,
    },

    /// A vehicle with this unit designator is already registered.
    #[error("vehicle already registered: {0}")]
    DuplicateVehicle(VehicleId),

    /// A responder with this id is already registered.
    #[error("responder already registered: {0}")]
    DuplicateResponder(ResponderId),

    /// The target status is not the immediate successor of the current one.
    #[error("cannot transition from {from:?} to {to:?}")]
    InvalidTransition {
        /// Current status.
        from: CallStatus,
        /// Requested status.
        to: CallStatus,
    },

    /// The call is closed or cancelled.
    #[error("call {call} is in terminal state {status:?}")]
    TerminalState {
        /// The call.
        call: CallId,
        /// Its terminal status.
        status: CallStatus,
    },

    /// Availability may only be toggled between `AVAILABLE` and
    /// `OUT_OF_SERVICE`; `ASSIGNED` is entered only by binding.
    #[error("availability {0:?} cannot be set directly")]
    InvalidAvailability(VehicleState),

    /// The request failed validation.
    #[error("invalid input: {0}")]
    InvalidInput(String),
}

impl DispatchError {
    /// The caller-facing class of this error.
    pub const fn kind(&self) -> ErrorKind {
        match self {
            Self::CallNotFound(_)
            | Self::VehicleNotFound(_)
            | Self::ResponderNotFound(_)
            | Self::FacilityNotFound(_) => ErrorKind::NotFound,
            Self::VehicleUnavailable { .. }
            | Self::ResponderUnavailable(_)
            | Self::ResponderBusy { .. }
            | Self::DuplicateVehicle(_)
            | Self::DuplicateResponder(_) => ErrorKind::Conflict,
            Self::InvalidTransition { .. } => ErrorKind::InvalidTransition,
            Self::TerminalState { .. } => ErrorKind::TerminalState,
            Self::InvalidAvailability(_) | Self::InvalidInput(_) => ErrorKind::InvalidInput,
        }
    }
}

impl From<validator::ValidationErrors> for DispatchError {
    fn from(errors: validator::ValidationErrors) -> Self {
        Self::InvalidInput(errors.to_string())
    }
}

/// Convenience alias for core results.
pub type Result<T> = core::result::Result<T, DispatchError>;
