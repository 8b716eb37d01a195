//! Resource registry: the fleet and the field crews.
//!
//! Vehicles live behind per-vehicle mutexes so unrelated units never
//! contend. The state-changing operations ([`set_availability`],
//! [`report_position`], [`ResourceRegistry::bind`],
//! [`ResourceRegistry::release`]) act on a vehicle the caller has already
//! locked; the coordinator owns lock acquisition so it can hold the call and
//! the vehicle across one check-bind-transition unit.
//!
//! Invariant maintained by every operation here: a vehicle is `ASSIGNED`
//! exactly when it has a bound call.

use std::collections::BTreeMap;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use rescue_types::{CallId, Position, Responder, ResponderId, UnitType, Vehicle, VehicleId, VehicleState};
use tokio::sync::{Mutex, RwLock};
use tracing::debug;

use crate::error::{DispatchError, Result};

/// Shared handle to one vehicle's mutex.
pub(crate) type VehicleHandle = Arc<Mutex<Vehicle>>;

/// Fleet and responder tables.
#[derive(Debug, Default)]
pub struct ResourceRegistry {
    vehicles: RwLock<BTreeMap<VehicleId, VehicleHandle>>,
    responders: Mutex<BTreeMap<ResponderId, Responder>>,
}

impl ResourceRegistry {
    /// Create an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    // -----------------------------------------------------------------------
    // Vehicles
    // -----------------------------------------------------------------------

    /// Register a vehicle as `AVAILABLE`.
    ///
    /// # Errors
    ///
    /// [`DispatchError::DuplicateVehicle`] if the designator is taken.
    pub async fn register(
        &self,
        id: VehicleId,
        unit_type: UnitType,
        now: DateTime<Utc>,
    ) -> Result<Vehicle> {
        let mut vehicles = self.vehicles.write().await;
        if vehicles.contains_key(&id) {
            return Err(DispatchError::DuplicateVehicle(id));
        }
        let vehicle = Vehicle {
            id: id.clone(),
            unit_type,
            state: VehicleState::Available,
            bound_call: None,
            bound_responder: None,
            position: None,
            revision: 1,
            updated_at: now,
        };
        vehicles.insert(id, Arc::new(Mutex::new(vehicle.clone())));
        Ok(vehicle)
    }

    /// Look up a vehicle's handle.
    pub(crate) async fn handle(&self, id: &VehicleId) -> Result<VehicleHandle> {
        self.vehicles
            .read()
            .await
            .get(id)
            .cloned()
            .ok_or_else(|| DispatchError::VehicleNotFound(id.clone()))
    }

    /// Current state of one vehicle.
    pub async fn vehicle(&self, id: &VehicleId) -> Result<Vehicle> {
        let handle = self.handle(id).await?;
        let vehicle = handle.lock().await.clone();
        Ok(vehicle)
    }

    /// Every vehicle, ordered by designator.
    pub async fn fleet(&self) -> Vec<Vehicle> {
        let handles: Vec<VehicleHandle> = self.vehicles.read().await.values().cloned().collect();
        let mut fleet = Vec::with_capacity(handles.len());
        for handle in handles {
            fleet.push(handle.lock().await.clone());
        }
        fleet
    }

    /// Bind a locked vehicle, and optionally a responder, to `call`.
    ///
    /// The vehicle must be `AVAILABLE`; this is the only admission check for
    /// vehicle reuse. A named responder must exist, be opted in, and hold no
    /// other assignment. On any error neither the vehicle nor the responder
    /// is touched.
    pub(crate) async fn bind(
        &self,
        vehicle: &mut Vehicle,
        call: CallId,
        responder: Option<ResponderId>,
        now: DateTime<Utc>,
    ) -> Result<()> {
        if vehicle.state != VehicleState::Available {
            return Err(DispatchError::VehicleUnavailable {
                vehicle: vehicle.id.clone(),
                state: vehicle.state,
            });
        }

        let mut responders = self.responders.lock().await;
        if let Some(responder_id) = responder {
            let crew = responders
                .get_mut(&responder_id)
                .ok_or(DispatchError::ResponderNotFound(responder_id))?;
            if let Some(active) = crew.active_call {
                return Err(DispatchError::ResponderBusy {
                    responder: responder_id,
                    call: active,
                });
            }
            if !crew.available {
                return Err(DispatchError::ResponderUnavailable(responder_id));
            }
            crew.active_call = Some(call);
        }

        vehicle.state = VehicleState::Assigned;
        vehicle.bound_call = Some(call);
        vehicle.bound_responder = responder;
        touch(vehicle, now);
        debug!(vehicle = %vehicle.id, call = %call, "vehicle bound");
        Ok(())
    }

    /// Release a locked vehicle and its responder from their call.
    ///
    /// Idempotent: an unbound vehicle is left as it is and `None` returned.
    /// Otherwise returns the call the vehicle was bound to.
    pub(crate) async fn release(&self, vehicle: &mut Vehicle, now: DateTime<Utc>) -> Option<CallId> {
        let call = vehicle.bound_call.take()?;
        if let Some(responder_id) = vehicle.bound_responder.take() {
            let mut responders = self.responders.lock().await;
            if let Some(crew) = responders.get_mut(&responder_id) {
                if crew.active_call == Some(call) {
                    crew.active_call = None;
                }
            }
        }
        vehicle.state = VehicleState::Available;
        touch(vehicle, now);
        debug!(vehicle = %vehicle.id, call = %call, "vehicle released");
        Some(call)
    }

    // -----------------------------------------------------------------------
    // Responders
    // -----------------------------------------------------------------------

    /// Register a responder.
    ///
    /// # Errors
    ///
    /// [`DispatchError::DuplicateResponder`] if the id is taken.
    pub async fn register_responder(
        &self,
        id: ResponderId,
        name: String,
        available: bool,
    ) -> Result<Responder> {
        let mut responders = self.responders.lock().await;
        if responders.contains_key(&id) {
            return Err(DispatchError::DuplicateResponder(id));
        }
        let responder = Responder {
            id,
            name,
            available,
            active_call: None,
        };
        responders.insert(id, responder.clone());
        Ok(responder)
    }

    /// Opt a responder in to or out of new assignments.
    ///
    /// Opting out does not affect an assignment already held.
    pub async fn set_responder_available(&self, id: ResponderId, available: bool) -> Result<Responder> {
        let mut responders = self.responders.lock().await;
        let responder = responders
            .get_mut(&id)
            .ok_or(DispatchError::ResponderNotFound(id))?;
        responder.available = available;
        Ok(responder.clone())
    }

    /// Current state of one responder.
    pub async fn responder(&self, id: ResponderId) -> Result<Responder> {
        self.responders
            .lock()
            .await
            .get(&id)
            .cloned()
            .ok_or(DispatchError::ResponderNotFound(id))
    }

    /// Every responder, ordered by id.
    pub async fn responders(&self) -> Vec<Responder> {
        self.responders.lock().await.values().cloned().collect()
    }
}

/// Toggle a locked vehicle between `AVAILABLE` and `OUT_OF_SERVICE`.
///
/// Returns whether anything changed. `ASSIGNED` cannot be requested, and an
/// assigned vehicle cannot be withdrawn until its call releases it.
pub(crate) fn set_availability(vehicle: &mut Vehicle, state: VehicleState, now: DateTime<Utc>) -> Result<bool> {
    if state == VehicleState::Assigned {
        return Err(DispatchError::InvalidAvailability(state));
    }
    if vehicle.state == VehicleState::Assigned {
        return Err(DispatchError::VehicleUnavailable {
            vehicle: vehicle.id.clone(),
            state: vehicle.state,
        });
    }
    if vehicle.state == state {
        return Ok(false);
    }
    vehicle.state = state;
    touch(vehicle, now);
    Ok(true)
}

/// Record a position report on a locked vehicle.
pub(crate) fn report_position(
    vehicle: &mut Vehicle,
    latitude: f64,
    longitude: f64,
    now: DateTime<Utc>,
) -> Result<()> {
    if !(-90.0..=90.0).contains(&latitude) || !(-180.0..=180.0).contains(&longitude) {
        return Err(DispatchError::InvalidInput(format!(
            "position out of range: ({latitude}, {longitude})"
        )));
    }
    vehicle.position = Some(Position {
        latitude,
        longitude,
        reported_at: now,
    });
    touch(vehicle, now);
    Ok(())
}

fn touch(vehicle: &mut Vehicle, now: DateTime<Utc>) {
    vehicle.revision = vehicle.revision.saturating_add(1);
    vehicle.updated_at = now;
}

#[cfg(test)]
mod tests {
    use super::*;

    fn assigned_iff_bound(vehicle: &Vehicle) -> bool {
        (vehicle.state == VehicleState::Assigned) == vehicle.bound_call.is_some()
    }

    async fn registry_with(unit: &str) -> (ResourceRegistry, VehicleHandle) {
        let registry = ResourceRegistry::new();
        let id = VehicleId::new(unit);
        registry.register(id.clone(), UnitType::Basic, Utc::now()).await.ok();
        let handle = registry.handle(&id).await;
        assert!(handle.is_ok());
        let handle = handle.unwrap_or_else(|_| Arc::new(Mutex::new(blank(unit))));
        (registry, handle)
    }

    fn blank(unit: &str) -> Vehicle {
        Vehicle {
            id: VehicleId::new(unit),
            unit_type: UnitType::Basic,
            state: VehicleState::Available,
            bound_call: None,
            bound_responder: None,
            position: None,
            revision: 1,
            updated_at: Utc::now(),
        }
    }

    #[tokio::test]
    async fn duplicate_vehicle_rejected() {
        let (registry, _) = registry_with("AMB-001").await;
        let again = registry
            .register(VehicleId::new("AMB-001"), UnitType::Advanced, Utc::now())
            .await;
        assert_eq!(again, Err(DispatchError::DuplicateVehicle(VehicleId::new("AMB-001"))));
    }

    #[tokio::test]
    async fn bind_then_release_round_trip() {
        let (registry, handle) = registry_with("AMB-001").await;
        let call = CallId::new();
        let mut vehicle = handle.lock().await;

        assert!(registry.bind(&mut vehicle, call, None, Utc::now()).await.is_ok());
        assert_eq!(vehicle.state, VehicleState::Assigned);
        assert_eq!(vehicle.bound_call, Some(call));
        assert!(assigned_iff_bound(&vehicle));

        assert_eq!(registry.release(&mut vehicle, Utc::now()).await, Some(call));
        assert_eq!(vehicle.state, VehicleState::Available);
        assert!(assigned_iff_bound(&vehicle));
    }

    #[tokio::test]
    async fn second_bind_conflicts_and_changes_nothing() {
        let (registry, handle) = registry_with("AMB-001").await;
        let first = CallId::new();
        let mut vehicle = handle.lock().await;
        registry.bind(&mut vehicle, first, None, Utc::now()).await.ok();
        let before = vehicle.clone();

        let err = registry.bind(&mut vehicle, CallId::new(), None, Utc::now()).await;
        assert!(matches!(err, Err(DispatchError::VehicleUnavailable { .. })));
        assert_eq!(*vehicle, before);
    }

    #[tokio::test]
    async fn release_is_idempotent() {
        let (registry, handle) = registry_with("AMB-001").await;
        let mut vehicle = handle.lock().await;
        let before = vehicle.clone();
        assert_eq!(registry.release(&mut vehicle, Utc::now()).await, None);
        assert_eq!(*vehicle, before);
    }

    #[tokio::test]
    async fn busy_responder_leaves_vehicle_untouched() {
        let (registry, handle) = registry_with("AMB-001").await;
        registry.register(VehicleId::new("AMB-002"), UnitType::Basic, Utc::now()).await.ok();
        let crew = ResponderId::new();
        registry.register_responder(crew, "Fatmata Sesay".into(), true).await.ok();

        let other = registry.handle(&VehicleId::new("AMB-002")).await;
        assert!(other.is_ok());
        if let Ok(other) = other {
            let mut other = other.lock().await;
            assert!(registry.bind(&mut other, CallId::new(), Some(crew), Utc::now()).await.is_ok());
        }

        let mut vehicle = handle.lock().await;
        let before = vehicle.clone();
        let err = registry.bind(&mut vehicle, CallId::new(), Some(crew), Utc::now()).await;
        assert!(matches!(err, Err(DispatchError::ResponderBusy { .. })));
        assert_eq!(*vehicle, before);
    }

    #[tokio::test]
    async fn opted_out_responder_cannot_be_bound() {
        let (registry, handle) = registry_with("AMB-001").await;
        let crew = ResponderId::new();
        registry.register_responder(crew, "Ibrahim Conteh".into(), false).await.ok();
        let mut vehicle = handle.lock().await;
        let err = registry.bind(&mut vehicle, CallId::new(), Some(crew), Utc::now()).await;
        assert_eq!(err, Err(DispatchError::ResponderUnavailable(crew)));
        assert_eq!(vehicle.state, VehicleState::Available);
    }

    #[tokio::test]
    async fn release_frees_the_responder() {
        let (registry, handle) = registry_with("AMB-001").await;
        let crew = ResponderId::new();
        registry.register_responder(crew, "Fatmata Sesay".into(), true).await.ok();
        let call = CallId::new();
        let mut vehicle = handle.lock().await;
        registry.bind(&mut vehicle, call, Some(crew), Utc::now()).await.ok();
        assert_eq!(registry.responder(crew).await.ok().and_then(|r| r.active_call), Some(call));

        registry.release(&mut vehicle, Utc::now()).await;
        assert_eq!(registry.responder(crew).await.ok().and_then(|r| r.active_call), None);
        assert_eq!(vehicle.bound_responder, None);
    }

    #[test]
    fn availability_cannot_be_set_to_assigned() {
        let mut vehicle = blank("AMB-001");
        let err = set_availability(&mut vehicle, VehicleState::Assigned, Utc::now());
        assert_eq!(err, Err(DispatchError::InvalidAvailability(VehicleState::Assigned)));
        assert!(assigned_iff_bound(&vehicle));
    }

    #[test]
    fn assigned_vehicle_cannot_go_out_of_service() {
        let mut vehicle = blank("AMB-001");
        vehicle.state = VehicleState::Assigned;
        vehicle.bound_call = Some(CallId::new());
        let err = set_availability(&mut vehicle, VehicleState::OutOfService, Utc::now());
        assert!(matches!(err, Err(DispatchError::VehicleUnavailable { .. })));
        assert_eq!(vehicle.state, VehicleState::Assigned);
    }

    #[test]
    fn availability_toggle_reports_change() {
        let mut vehicle = blank("AMB-001");
        assert_eq!(set_availability(&mut vehicle, VehicleState::OutOfService, Utc::now()), Ok(true));
        assert_eq!(vehicle.revision, 2);
        assert_eq!(set_availability(&mut vehicle, VehicleState::OutOfService, Utc::now()), Ok(false));
        assert_eq!(vehicle.revision, 2);
    }

    #[test]
    fn position_validated() {
        let mut vehicle = blank("AMB-001");
        assert!(report_position(&mut vehicle, 8.48, -13.23, Utc::now()).is_ok());
        assert!(vehicle.position.is_some());
        assert!(report_position(&mut vehicle, 95.0, 0.0, Utc::now()).is_err());
        assert!(report_position(&mut vehicle, f64::NAN, 0.0, Utc::now()).is_err());
        assert_eq!(vehicle.revision, 2);
    }
}
