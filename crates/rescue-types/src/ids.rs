//! Type-safe identifier wrappers.
//!
//! Calls, responders, dispatchers, facilities, and events are identified by
//! UUID v7 (time-ordered) newtypes so identifiers cannot be mixed at compile
//! time. Vehicles are the exception: they are identified by their unit
//! designator (for example `AMB-001`), which is what crews and dispatchers
//! actually use on the radio.

use serde::{Deserialize, Serialize};
use ts_rs::TS;
use uuid::Uuid;

/// Generates a newtype wrapper around [`Uuid`] with standard derives.
macro_rules! define_id {
    (
        $(#[$meta:meta])*
        $name:ident
    ) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, TS)]
        #[ts(export, export_to = "bindings/")]
        pub struct $name(pub Uuid);

        impl $name {
            /// Create a new identifier using UUID v7 (time-ordered).
            pub fn new() -> Self {
                Self(Uuid::now_v7())
            }

            /// Return the inner [`Uuid`] value.
            pub const fn into_inner(self) -> Uuid {
                self.0
            }
        }

        impl Default for $name {
            fn default() -> Self {
                Self::new()
            }
        }

        impl core::fmt::Display for $name {
            fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
                write!(f, "{}", self.0)
            }
        }

        impl core::str::FromStr for $name {
            type Err = uuid::Error;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                Uuid::parse_str(s).map(Self)
            }
        }

        impl From<Uuid> for $name {
            fn from(id: Uuid) -> Self {
                Self(id)
            }
        }

        impl From<$name> for Uuid {
            fn from(id: $name) -> Self {
                id.0
            }
        }
    };
}

define_id! {
    /// Unique identifier for an emergency call. Generated once at intake.
    CallId
}

define_id! {
    /// Unique identifier for a field responder (paramedic).
    ResponderId
}

define_id! {
    /// Unique identifier for a dispatcher who authorized an assignment.
    DispatcherId
}

define_id! {
    /// Unique identifier for a receiving facility (hospital).
    FacilityId
}

define_id! {
    /// Unique identifier for a fanout event.
    EventId
}

impl CallId {
    /// Human-readable call reference in the form `CALL-XXXXXXXX`.
    ///
    /// Derived from the low 32 bits of the UUID, which are random in a v7
    /// UUID, so references of calls opened in the same second still differ.
    pub fn reference(self) -> String {
        let low = u32::try_from(self.0.as_u128() & 0xFFFF_FFFF).unwrap_or_default();
        format!("CALL-{low:08X}")
    }
}

/// Unit designator of a dispatchable vehicle (e.g. `AMB-001`).
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, TS)]
#[serde(transparent)]
#[ts(export, export_to = "bindings/")]
pub struct VehicleId(pub String);

impl VehicleId {
    /// Create a vehicle identifier from a unit designator.
    pub fn new(unit: impl Into<String>) -> Self {
        Self(unit.into())
    }

    /// Borrow the unit designator.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl core::fmt::Display for VehicleId {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for VehicleId {
    fn from(unit: &str) -> Self {
        Self(unit.to_owned())
    }
}

impl From<String> for VehicleId {
    fn from(unit: String) -> Self {
        Self(unit)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn call_reference_has_fixed_shape() {
        let id = CallId::new();
        let reference = id.reference();
        assert!(reference.starts_with("CALL-"));
        assert_eq!(reference.len(), 13);
        assert!(
            reference
                .trim_start_matches("CALL-")
                .chars()
                .all(|c| c.is_ascii_hexdigit() && !c.is_ascii_lowercase())
        );
    }

    #[test]
    fn call_reference_is_stable() {
        let id = CallId::new();
        assert_eq!(id.reference(), id.reference());
    }

    #[test]
    fn id_parses_from_display() {
        let id = ResponderId::new();
        let parsed: Result<ResponderId, _> = id.to_string().parse();
        assert_eq!(parsed.ok(), Some(id));
    }

    #[test]
    fn vehicle_id_serializes_as_plain_string() {
        let id = VehicleId::new("AMB-001");
        let json = serde_json::to_string(&id).ok();
        assert_eq!(json.as_deref(), Some("\"AMB-001\""));
    }
}
