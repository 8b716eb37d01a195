//! The dispatch engine: assignment coordination and the single entry point
//! for every mutation.
//!
//! [`DispatchEngine`] composes the call table, the resource registry, the
//! facility directory, and the fanout hub. It is the only component that
//! changes a call's bound vehicle and a vehicle's bound call together.
//!
//! # Locking
//!
//! Locks are always taken in the order call, then vehicle, then the
//! responder table (inside the registry). A mutation holds its call lock
//! from validation through commit and event publication, so events for one
//! call are enqueued in commit order. Publication is an in-memory enqueue;
//! no socket I/O happens while a lock is held.

use chrono::{DateTime, Utc};
use rescue_types::{
    Call, CallId, CallStatus, DispatchEvent, DispatcherId, EventAction, EventPayload, Facility, FacilityId,
    NewCall, Responder, ResponderId, Snapshot, UnitType, Vehicle, VehicleId, VehicleState,
};
use tracing::{info, warn};
use validator::Validate;

use crate::error::Result;
use crate::facilities::{CapacityReport, FacilityDirectory};
use crate::fanout::FanoutHub;
use crate::lifecycle::{self, Binding, CallBook, StatusDetails};
use crate::query::CallFilter;
use crate::registry::{self, ResourceRegistry};

/// A dispatcher's instruction to commit a vehicle to a call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DispatchOrder {
    /// The vehicle to bind.
    pub vehicle: VehicleId,
    /// The responder crewing it, if named.
    pub responder: Option<ResponderId>,
    /// The dispatcher authorizing the assignment.
    pub dispatcher: DispatcherId,
}

/// The result of a successful dispatch.
#[derive(Debug, Clone, PartialEq)]
pub struct Assignment {
    /// The call, now `DISPATCHED`.
    pub call: Call,
    /// The vehicle, now `ASSIGNED` to the call.
    pub vehicle: Vehicle,
}

/// The dispatch coordination engine.
#[derive(Debug)]
pub struct DispatchEngine {
    calls: CallBook,
    registry: ResourceRegistry,
    facilities: FacilityDirectory,
    hub: FanoutHub,
}

impl DispatchEngine {
    /// Create an engine with empty tables, publishing through `hub`.
    pub fn new(hub: FanoutHub) -> Self {
        Self {
            calls: CallBook::new(),
            registry: ResourceRegistry::new(),
            facilities: FacilityDirectory::new(),
            hub,
        }
    }

    /// The fanout hub live channels subscribe to.
    pub const fn hub(&self) -> &FanoutHub {
        &self.hub
    }

    // -----------------------------------------------------------------------
    // Calls
    // -----------------------------------------------------------------------

    /// Open a call in `RECEIVED` and announce it to the dispatch audience.
    pub async fn create_call(&self, intake: NewCall) -> Result<Call> {
        intake.validate()?;
        let call = lifecycle::open(intake, Utc::now());
        let handle = self.calls.insert(call).await;
        let call = handle.lock().await;
        info!(call = %call.id, reference = %call.reference, priority = ?call.priority, "call received");
        self.emit(EventAction::New, EventPayload::Call(Box::new(call.clone())));
        Ok(call.clone())
    }

    /// Bind a vehicle (and optionally a responder) to a `RECEIVED` call and
    /// enter `DISPATCHED`.
    ///
    /// # Errors
    ///
    /// - not found if the call or vehicle does not exist
    /// - [`TerminalState`] if the call is closed or cancelled
    /// - [`InvalidTransition`] if it was already dispatched
    /// - a conflict if the vehicle or responder is committed elsewhere
    ///
    /// On error, no call, vehicle, or responder state has changed.
    ///
    /// [`TerminalState`]: crate::error::DispatchError::TerminalState
    /// [`InvalidTransition`]: crate::error::DispatchError::InvalidTransition
    pub async fn dispatch(&self, call_id: CallId, order: DispatchOrder) -> Result<Assignment> {
        let call_handle = self.calls.handle(call_id).await?;
        let mut call = call_handle.lock().await;
        lifecycle::validate_dispatch(&call)?;

        let vehicle_handle = self.registry.handle(&order.vehicle).await?;
        let mut vehicle = vehicle_handle.lock().await;
        let before = vehicle.clone();
        let now = Utc::now();

        self.registry
            .bind(&mut vehicle, call_id, order.responder, now)
            .await?;

        let binding = Binding {
            vehicle: order.vehicle,
            responder: order.responder,
            dispatcher: order.dispatcher,
        };
        if let Err(err) = lifecycle::dispatch(&mut call, binding, now) {
            self.registry.release(&mut vehicle, now).await;
            *vehicle = before;
            return Err(err);
        }

        info!(
            call = %call.id,
            vehicle = %vehicle.id,
            responder = ?call.responder,
            dispatcher = ?call.dispatcher,
            "call dispatched"
        );
        self.emit(
            EventAction::StatusChange,
            EventPayload::Call(Box::new(call.clone())),
        );
        self.emit(
            EventAction::StatusChange,
            EventPayload::Vehicle(Box::new(vehicle.clone())),
        );
        Ok(Assignment {
            call: call.clone(),
            vehicle: vehicle.clone(),
        })
    }

    /// Advance a call to the next status on the chain, applying the crew's
    /// field updates. Reaching `CLOSED` releases the vehicle and responder.
    pub async fn advance(
        &self,
        call_id: CallId,
        to: CallStatus,
        details: StatusDetails,
    ) -> Result<Call> {
        let handle = self.calls.handle(call_id).await?;
        let mut call = handle.lock().await;
        let from = call.status;
        let now = Utc::now();
        lifecycle::advance(&mut call, to, details, now)?;

        info!(call = %call.id, from = %from, to = %to, "call advanced");
        self.emit(
            EventAction::StatusChange,
            EventPayload::Call(Box::new(call.clone())),
        );
        if call.status.is_terminal() {
            self.release_binding(&call, now).await;
        }
        Ok(call.clone())
    }

    /// Withdraw a call that has not yet closed. Any bound vehicle and
    /// responder are released.
    pub async fn cancel(&self, call_id: CallId) -> Result<Call> {
        let handle = self.calls.handle(call_id).await?;
        let mut call = handle.lock().await;
        let from = call.status;
        let now = Utc::now();
        lifecycle::cancel(&mut call, now)?;

        info!(call = %call.id, from = %from, "call cancelled");
        self.emit(
            EventAction::StatusChange,
            EventPayload::Call(Box::new(call.clone())),
        );
        self.release_binding(&call, now).await;
        Ok(call.clone())
    }

    /// Release the vehicle bound to a terminal call. Runs under the call
    /// lock.
    async fn release_binding(&self, call: &Call, now: DateTime<Utc>) {
        let Some(vehicle_id) = call.vehicle.as_ref() else {
            return;
        };
        let handle = match self.registry.handle(vehicle_id).await {
            Ok(handle) => handle,
            Err(err) => {
                warn!(call = %call.id, error = %err, "bound vehicle missing on release");
                return;
            }
        };
        let mut vehicle = handle.lock().await;
        if vehicle.bound_call != Some(call.id) {
            return;
        }
        if self.registry.release(&mut vehicle, now).await.is_some() {
            info!(call = %call.id, vehicle = %vehicle.id, "vehicle released");
            self.emit(
                EventAction::StatusChange,
                EventPayload::Vehicle(Box::new(vehicle.clone())),
            );
        }
    }

    /// One call.
    pub async fn call(&self, id: CallId) -> Result<Call> {
        self.calls.get(id).await
    }

    /// Calls matching `filter`, newest first.
    pub async fn calls(&self, filter: CallFilter) -> Vec<Call> {
        self.calls.list(filter).await
    }

    /// Number of calls ever opened, terminal ones included.
    pub async fn call_count(&self) -> usize {
        self.calls.len().await
    }

    // -----------------------------------------------------------------------
    // Fleet
    // -----------------------------------------------------------------------

    /// Add a vehicle to the fleet as `AVAILABLE`.
    pub async fn register_vehicle(&self, id: VehicleId, unit_type: UnitType) -> Result<Vehicle> {
        let vehicle = self.registry.register(id, unit_type, Utc::now()).await?;
        info!(vehicle = %vehicle.id, unit_type = ?vehicle.unit_type, "vehicle registered");
        self.emit(
            EventAction::New,
            EventPayload::Vehicle(Box::new(vehicle.clone())),
        );
        Ok(vehicle)
    }

    /// Put a vehicle in or out of service.
    pub async fn set_vehicle_availability(
        &self,
        id: &VehicleId,
        state: VehicleState,
    ) -> Result<Vehicle> {
        let handle = self.registry.handle(id).await?;
        let mut vehicle = handle.lock().await;
        if registry::set_availability(&mut vehicle, state, Utc::now())? {
            info!(vehicle = %vehicle.id, state = ?vehicle.state, "vehicle availability changed");
            self.emit(
                EventAction::StatusChange,
                EventPayload::Vehicle(Box::new(vehicle.clone())),
            );
        }
        Ok(vehicle.clone())
    }

    /// Record a vehicle's position report.
    pub async fn report_position(
        &self,
        id: &VehicleId,
        latitude: f64,
        longitude: f64,
    ) -> Result<Vehicle> {
        let handle = self.registry.handle(id).await?;
        let mut vehicle = handle.lock().await;
        registry::report_position(&mut vehicle, latitude, longitude, Utc::now())?;
        self.emit(
            EventAction::LocationUpdate,
            EventPayload::Vehicle(Box::new(vehicle.clone())),
        );
        Ok(vehicle.clone())
    }

    /// One vehicle.
    pub async fn vehicle(&self, id: &VehicleId) -> Result<Vehicle> {
        self.registry.vehicle(id).await
    }

    /// The whole fleet, ordered by designator.
    pub async fn fleet(&self) -> Vec<Vehicle> {
        self.registry.fleet().await
    }

    // -----------------------------------------------------------------------
    // Responders
    // -----------------------------------------------------------------------

    /// Add a responder.
    pub async fn register_responder(
        &self,
        id: ResponderId,
        name: String,
        available: bool,
    ) -> Result<Responder> {
        let responder = self.registry.register_responder(id, name, available).await?;
        info!(responder = %responder.id, name = %responder.name, "responder registered");
        Ok(responder)
    }

    /// Opt a responder in to or out of new assignments.
    pub async fn set_responder_available(
        &self,
        id: ResponderId,
        available: bool,
    ) -> Result<Responder> {
        let responder = self.registry.set_responder_available(id, available).await?;
        info!(responder = %id, available, "responder availability changed");
        Ok(responder)
    }

    /// One responder.
    pub async fn responder(&self, id: ResponderId) -> Result<Responder> {
        self.registry.responder(id).await
    }

    /// Every responder.
    pub async fn responders(&self) -> Vec<Responder> {
        self.registry.responders().await
    }

    // -----------------------------------------------------------------------
    // Facilities
    // -----------------------------------------------------------------------

    /// Mirror a facility reported by the capacity collaborator.
    pub async fn upsert_facility(&self, facility: Facility) -> Result<Facility> {
        let facility = self.facilities.upsert(facility).await?;
        info!(facility = %facility.id, name = %facility.name, "facility mirrored");
        self.emit(
            EventAction::New,
            EventPayload::Facility(Box::new(facility.clone())),
        );
        Ok(facility)
    }

    /// Apply a capacity report.
    pub async fn update_facility_capacity(
        &self,
        id: FacilityId,
        report: CapacityReport,
    ) -> Result<Facility> {
        let facility = self
            .facilities
            .update_capacity(id, report, Utc::now())
            .await?;
        info!(
            facility = %facility.id,
            available_beds = facility.available_beds,
            capacity = ?facility.capacity,
            "facility capacity updated"
        );
        self.emit(
            EventAction::CapacityUpdate,
            EventPayload::Facility(Box::new(facility.clone())),
        );
        Ok(facility)
    }

    /// One mirrored facility.
    pub async fn facility(&self, id: FacilityId) -> Result<Facility> {
        self.facilities.get(id).await
    }

    /// Every mirrored facility.
    pub async fn facilities(&self) -> Vec<Facility> {
        self.facilities.list().await
    }

    // -----------------------------------------------------------------------
    // Snapshots
    // -----------------------------------------------------------------------

    /// Current state for the dispatch audience.
    pub async fn snapshot(&self, filter: CallFilter) -> Snapshot {
        Snapshot {
            calls: self.calls.list(filter).await,
            fleet: self.registry.fleet().await,
            facilities: self.facilities.list().await,
            taken_at: Some(Utc::now()),
        }
    }

    /// Current state for one responder: their active call, its vehicle, and
    /// the facility mirror.
    pub async fn responder_snapshot(&self, id: ResponderId) -> Result<Snapshot> {
        let responder = self.registry.responder(id).await?;
        let mut snapshot = Snapshot {
            facilities: self.facilities.list().await,
            taken_at: Some(Utc::now()),
            ..Snapshot::default()
        };
        let Some(call_id) = responder.active_call else {
            return Ok(snapshot);
        };
        let call = self.calls.get(call_id).await?;
        if let Some(vehicle_id) = call.vehicle.as_ref() {
            snapshot.fleet.push(self.registry.vehicle(vehicle_id).await?);
        }
        snapshot.calls.push(call);
        Ok(snapshot)
    }

    fn emit(&self, action: EventAction, payload: EventPayload) {
        self.hub.publish(DispatchEvent::new(action, payload));
    }
}

impl Default for DispatchEngine {
    fn default() -> Self {
        Self::new(FanoutHub::default())
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;
    use std::time::Duration;

    use rescue_types::{EmergencyCategory, EventKind, Location};

    use super::*;
    use crate::error::DispatchError;
    use crate::fanout::{Feed, ResyncFilter, Subscription};

    fn intake(caller: &str) -> NewCall {
        NewCall {
            caller_name: caller.to_owned(),
            caller_phone: String::from("+23276111111"),
            category: EmergencyCategory::Cardiac,
            description: String::from("Chest pain"),
            location: Location {
                address: String::from("15 Siaka Stevens Street"),
                latitude: Some(8.485),
                longitude: Some(-13.231),
            },
            priority: None,
        }
    }

    fn order(vehicle: &str, responder: Option<ResponderId>) -> DispatchOrder {
        DispatchOrder {
            vehicle: VehicleId::new(vehicle),
            responder,
            dispatcher: DispatcherId::new(),
        }
    }

    async fn engine_with_fleet() -> (DispatchEngine, ResponderId) {
        let engine = DispatchEngine::new(FanoutHub::new(64));
        engine.register_vehicle(VehicleId::new("AMB-001"), UnitType::Advanced).await.ok();
        engine.register_vehicle(VehicleId::new("AMB-002"), UnitType::Basic).await.ok();
        let crew = ResponderId::new();
        engine.register_responder(crew, "Fatmata Sesay".into(), true).await.ok();
        (engine, crew)
    }

    async fn open(engine: &DispatchEngine, caller: &str) -> CallId {
        let call = engine.create_call(intake(caller)).await;
        assert!(call.is_ok(), "{call:?}");
        call.map_or_else(|_| CallId::new(), |c| c.id)
    }

    async fn next_event(sub: &mut Subscription) -> Option<Arc<DispatchEvent>> {
        tokio::time::timeout(Duration::from_millis(50), sub.recv())
            .await
            .ok()
            .flatten()
            .and_then(|feed| match feed {
                Feed::Event(event) => Some(event),
                Feed::Lagged(_) => None,
            })
    }

    async fn drive_to(engine: &DispatchEngine, call: CallId, target: CallStatus) {
        for status in CallStatus::CHAIN.iter().skip(2) {
            let advanced = engine.advance(call, *status, StatusDetails::default()).await;
            assert!(advanced.is_ok(), "{advanced:?}");
            if *status == target {
                return;
            }
        }
    }

    fn assigned_iff_bound(vehicle: &Vehicle) -> bool {
        (vehicle.state == VehicleState::Assigned) == vehicle.bound_call.is_some()
    }

    #[tokio::test]
    async fn create_call_announces_new() {
        let (engine, _) = engine_with_fleet().await;
        let mut console = engine.hub().subscribe_dispatch();
        let id = open(&engine, "Mary Johnson").await;

        let event = next_event(&mut console).await;
        assert_eq!(event.as_ref().map(|e| e.action), Some(EventAction::New));
        assert_eq!(event.as_ref().map(|e| e.kind), Some(EventKind::EmergencyUpdate));
        let call = engine.call(id).await;
        assert_eq!(call.map(|c| c.status), Ok(CallStatus::Received));
    }

    #[tokio::test]
    async fn invalid_intake_rejected() {
        let (engine, _) = engine_with_fleet().await;
        let result = engine.create_call(intake("")).await;
        assert!(matches!(result, Err(DispatchError::InvalidInput(_))));
        assert!(engine.calls(CallFilter::All).await.is_empty());
    }

    #[tokio::test]
    async fn dispatch_binds_and_notifies_both_audiences() {
        let (engine, crew) = engine_with_fleet().await;
        let c1 = open(&engine, "Mary Johnson").await;
        let mut console = engine.hub().subscribe_dispatch();
        let mut field = engine.hub().subscribe_responder(crew);

        let assignment = engine.dispatch(c1, order("AMB-001", Some(crew))).await;
        assert!(assignment.is_ok(), "{assignment:?}");

        let call = engine.call(c1).await;
        assert_eq!(call.as_ref().map(|c| c.status), Ok(CallStatus::Dispatched));
        let v1 = engine.vehicle(&VehicleId::new("AMB-001")).await;
        assert_eq!(v1.as_ref().map(|v| v.state), Ok(VehicleState::Assigned));
        assert_eq!(v1.as_ref().map(|v| v.bound_call), Ok(Some(c1)));

        let first = next_event(&mut console).await;
        assert_eq!(first.as_ref().map(|e| e.kind), Some(EventKind::EmergencyUpdate));
        assert_eq!(first.as_ref().map(|e| e.action), Some(EventAction::StatusChange));
        let second = next_event(&mut console).await;
        assert_eq!(second.map(|e| e.kind), Some(EventKind::VehicleUpdate));

        let mirrored = next_event(&mut field).await;
        assert_eq!(mirrored.as_ref().map(|e| e.kind), Some(EventKind::EmergencyUpdate));
        assert_eq!(mirrored.as_ref().map(|e| e.action), Some(EventAction::StatusChange));
        assert!(next_event(&mut field).await.is_none());
    }

    #[tokio::test]
    async fn busy_vehicle_conflicts_and_changes_nothing() {
        let (engine, _) = engine_with_fleet().await;
        let c1 = open(&engine, "Mary Johnson").await;
        let c2 = open(&engine, "Ahmed Kamara").await;
        assert!(engine.dispatch(c1, order("AMB-001", None)).await.is_ok());
        let v1_before = engine.vehicle(&VehicleId::new("AMB-001")).await;
        let c2_before = engine.call(c2).await;

        let err = engine.dispatch(c2, order("AMB-001", None)).await;
        assert!(matches!(err, Err(DispatchError::VehicleUnavailable { .. })));
        assert_eq!(engine.vehicle(&VehicleId::new("AMB-001")).await, v1_before);
        assert_eq!(engine.call(c2).await, c2_before);
        assert_eq!(
            engine.call(c2).await.map(|c| c.status),
            Ok(CallStatus::Received)
        );
    }

    #[tokio::test]
    async fn concurrent_dispatches_to_one_vehicle_admit_exactly_one() {
        let (engine, _) = engine_with_fleet().await;
        let engine = Arc::new(engine);
        let c1 = open(&engine, "Mary Johnson").await;
        let c2 = open(&engine, "Ahmed Kamara").await;

        let a = tokio::spawn({
            let engine = Arc::clone(&engine);
            async move { engine.dispatch(c1, order("AMB-001", None)).await }
        });
        let b = tokio::spawn({
            let engine = Arc::clone(&engine);
            async move { engine.dispatch(c2, order("AMB-001", None)).await }
        });
        let (a, b) = tokio::join!(a, b);
        let outcomes = [a.ok().map(|r| r.is_ok()), b.ok().map(|r| r.is_ok())];
        assert_eq!(outcomes.iter().filter(|o| **o == Some(true)).count(), 1);

        let vehicle = engine.vehicle(&VehicleId::new("AMB-001")).await;
        assert!(vehicle.as_ref().is_ok_and(assigned_iff_bound));
    }

    #[tokio::test]
    async fn dispatching_twice_is_invalid_transition() {
        let (engine, _) = engine_with_fleet().await;
        let c1 = open(&engine, "Mary Johnson").await;
        assert!(engine.dispatch(c1, order("AMB-001", None)).await.is_ok());
        let err = engine.dispatch(c1, order("AMB-002", None)).await;
        assert!(matches!(err, Err(DispatchError::InvalidTransition { .. })));
        let v2 = engine.vehicle(&VehicleId::new("AMB-002")).await;
        assert_eq!(v2.map(|v| v.state), Ok(VehicleState::Available));
    }

    #[tokio::test]
    async fn advance_cannot_dispatch() {
        let (engine, _) = engine_with_fleet().await;
        let c1 = open(&engine, "Mary Johnson").await;
        let err = engine
            .advance(c1, CallStatus::Dispatched, StatusDetails::default())
            .await;
        assert!(matches!(err, Err(DispatchError::InvalidTransition { .. })));
    }

    #[tokio::test]
    async fn skipping_leaves_no_timestamp() {
        let (engine, _) = engine_with_fleet().await;
        let c1 = open(&engine, "Mary Johnson").await;
        let err = engine
            .advance(c1, CallStatus::EnRoute, StatusDetails::default())
            .await;
        assert_eq!(
            err,
            Err(DispatchError::InvalidTransition {
                from: CallStatus::Received,
                to: CallStatus::EnRoute,
            })
        );
        let call = engine.call(c1).await;
        assert_eq!(call.map(|c| c.entered_at(CallStatus::EnRoute)), Ok(None));
    }

    #[tokio::test]
    async fn closing_releases_vehicle_and_responder() {
        let (engine, crew) = engine_with_fleet().await;
        let c1 = open(&engine, "Mary Johnson").await;
        assert!(engine.dispatch(c1, order("AMB-001", Some(crew))).await.is_ok());
        drive_to(&engine, c1, CallStatus::Closed).await;

        let call = engine.call(c1).await;
        assert_eq!(call.as_ref().map(|c| c.status), Ok(CallStatus::Closed));
        assert_eq!(
            call.as_ref().map(|c| c.timestamps.len()),
            Ok(CallStatus::CHAIN.len())
        );
        let v1 = engine.vehicle(&VehicleId::new("AMB-001")).await;
        assert_eq!(v1.as_ref().map(|v| v.state), Ok(VehicleState::Available));
        assert!(v1.as_ref().is_ok_and(assigned_iff_bound));
        let responder = engine.responder(crew).await;
        assert_eq!(responder.map(|r| r.active_call), Ok(None));
    }

    #[tokio::test]
    async fn closed_call_rejects_all_changes() {
        let (engine, _) = engine_with_fleet().await;
        let c1 = open(&engine, "Mary Johnson").await;
        assert!(engine.dispatch(c1, order("AMB-001", None)).await.is_ok());
        drive_to(&engine, c1, CallStatus::Closed).await;
        let before = engine.call(c1).await;

        let advance = engine
            .advance(c1, CallStatus::EnRoute, StatusDetails::default())
            .await;
        assert!(matches!(advance, Err(DispatchError::TerminalState { .. })));
        let dispatch = engine.dispatch(c1, order("AMB-002", None)).await;
        assert!(matches!(dispatch, Err(DispatchError::TerminalState { .. })));
        let cancel = engine.cancel(c1).await;
        assert!(matches!(cancel, Err(DispatchError::TerminalState { .. })));

        assert_eq!(engine.call(c1).await, before);
        let v2 = engine.vehicle(&VehicleId::new("AMB-002")).await;
        assert_eq!(v2.map(|v| v.state), Ok(VehicleState::Available));
    }

    #[tokio::test]
    async fn cancel_releases_binding() {
        let (engine, crew) = engine_with_fleet().await;
        let c1 = open(&engine, "Mary Johnson").await;
        assert!(engine.dispatch(c1, order("AMB-001", Some(crew))).await.is_ok());
        let mut field = engine.hub().subscribe_responder(crew);

        let cancelled = engine.cancel(c1).await;
        assert_eq!(cancelled.as_ref().map(|c| c.status), Ok(CallStatus::Cancelled));
        assert!(
            cancelled
                .as_ref()
                .is_ok_and(|c| c.entered_at(CallStatus::Cancelled).is_some())
        );
        let v1 = engine.vehicle(&VehicleId::new("AMB-001")).await;
        assert_eq!(v1.map(|v| v.state), Ok(VehicleState::Available));

        // The crew still hears about the call they were bound to.
        let event = next_event(&mut field).await;
        assert_eq!(
            event.and_then(|e| match &e.payload {
                EventPayload::Call(call) => Some(call.status),
                EventPayload::Vehicle(_) | EventPayload::Facility(_) => None,
            }),
            Some(CallStatus::Cancelled)
        );
    }

    #[tokio::test]
    async fn cancel_before_dispatch() {
        let (engine, _) = engine_with_fleet().await;
        let c1 = open(&engine, "Mary Johnson").await;
        let cancelled = engine.cancel(c1).await;
        assert_eq!(cancelled.map(|c| c.vehicle), Ok(None));
    }

    #[tokio::test]
    async fn late_member_gets_snapshot_not_replay() {
        let (engine, crew) = engine_with_fleet().await;
        let c1 = open(&engine, "Mary Johnson").await;
        assert!(engine.dispatch(c1, order("AMB-001", Some(crew))).await.is_ok());
        drive_to(&engine, c1, CallStatus::OnScene).await;

        let mut console = engine.hub().subscribe_dispatch();
        let snapshot = engine.snapshot(CallFilter::Open).await;
        let mut filter = ResyncFilter::from_snapshot(&snapshot);

        let row = snapshot.calls.iter().find(|c| c.id == c1);
        assert_eq!(row.map(|c| c.status), Some(CallStatus::OnScene));
        assert!(next_event(&mut console).await.is_none());

        let advanced = engine
            .advance(c1, CallStatus::Transporting, StatusDetails::default())
            .await;
        assert!(advanced.is_ok());
        let event = next_event(&mut console).await;
        assert!(event.as_ref().is_some_and(|e| filter.admit(e)));
    }

    #[tokio::test]
    async fn events_queued_before_snapshot_are_filtered() {
        let (engine, _) = engine_with_fleet().await;
        let mut console = engine.hub().subscribe_dispatch();
        let c1 = open(&engine, "Mary Johnson").await;
        assert!(engine.dispatch(c1, order("AMB-001", None)).await.is_ok());
        assert!(
            engine
                .advance(c1, CallStatus::EnRoute, StatusDetails::default())
                .await
                .is_ok()
        );

        let snapshot = engine.snapshot(CallFilter::Open).await;
        let mut filter = ResyncFilter::from_snapshot(&snapshot);
        let mut replayed = 0_u32;
        while let Some(event) = next_event(&mut console).await {
            if filter.admit(&event) {
                replayed = replayed.saturating_add(1);
            }
        }
        assert_eq!(replayed, 0);

        assert!(
            engine
                .advance(c1, CallStatus::OnScene, StatusDetails::default())
                .await
                .is_ok()
        );
        let fresh = next_event(&mut console).await;
        assert!(fresh.as_ref().is_some_and(|e| filter.admit(e)));
    }

    #[tokio::test]
    async fn responder_snapshot_scoped_to_assignment() {
        let (engine, crew) = engine_with_fleet().await;
        let c1 = open(&engine, "Mary Johnson").await;
        let _other = open(&engine, "Ahmed Kamara").await;

        let idle = engine.responder_snapshot(crew).await;
        assert_eq!(idle.as_ref().map(|s| s.calls.len()), Ok(0));

        assert!(engine.dispatch(c1, order("AMB-002", Some(crew))).await.is_ok());
        let scoped = engine.responder_snapshot(crew).await;
        assert_eq!(
            scoped.as_ref().map(|s| s.calls.iter().map(|c| c.id).collect::<Vec<_>>()),
            Ok(vec![c1])
        );
        assert_eq!(
            scoped.as_ref().map(|s| s.fleet.iter().map(|v| v.id.clone()).collect::<Vec<_>>()),
            Ok(vec![VehicleId::new("AMB-002")])
        );

        let stranger = engine.responder_snapshot(ResponderId::new()).await;
        assert!(matches!(stranger, Err(DispatchError::ResponderNotFound(_))));
    }

    #[tokio::test]
    async fn out_of_service_vehicle_cannot_be_dispatched() {
        let (engine, _) = engine_with_fleet().await;
        let id = VehicleId::new("AMB-002");
        let withdrawn = engine
            .set_vehicle_availability(&id, VehicleState::OutOfService)
            .await;
        assert_eq!(withdrawn.map(|v| v.state), Ok(VehicleState::OutOfService));

        let c1 = open(&engine, "Mary Johnson").await;
        let err = engine.dispatch(c1, order("AMB-002", None)).await;
        assert!(matches!(err, Err(DispatchError::VehicleUnavailable { .. })));
    }

    #[tokio::test]
    async fn unknown_entities_are_not_found() {
        let (engine, _) = engine_with_fleet().await;
        let missing = CallId::new();
        let err = engine.dispatch(missing, order("AMB-001", None)).await;
        assert_eq!(err, Err(DispatchError::CallNotFound(missing)));

        let c1 = open(&engine, "Mary Johnson").await;
        let err = engine.dispatch(c1, order("AMB-999", None)).await;
        assert_eq!(err, Err(DispatchError::VehicleNotFound(VehicleId::new("AMB-999"))));
        assert_eq!(engine.call(c1).await.map(|c| c.status), Ok(CallStatus::Received));
    }

    #[tokio::test]
    async fn position_report_broadcasts_location_update() {
        let (engine, _) = engine_with_fleet().await;
        let mut console = engine.hub().subscribe_dispatch();
        let moved = engine
            .report_position(&VehicleId::new("AMB-001"), 8.47, -13.22)
            .await;
        assert!(moved.as_ref().is_ok_and(|v| v.position.is_some()));
        let event = next_event(&mut console).await;
        assert_eq!(event.map(|e| e.action), Some(EventAction::LocationUpdate));
    }

    #[tokio::test]
    async fn capacity_report_broadcasts_capacity_update() {
        let engine = DispatchEngine::default();
        let facility = engine
            .upsert_facility(Facility {
                id: FacilityId::new(),
                name: String::from("Connaught Hospital"),
                address: String::from("Percival Street"),
                total_beds: 300,
                available_beds: 45,
                capacity: rescue_types::CapacityLevel::Moderate,
                revision: 0,
                updated_at: Utc::now(),
            })
            .await;
        let id = facility.map_or_else(|_| FacilityId::new(), |f| f.id);
        let mut console = engine.hub().subscribe_dispatch();

        let report = CapacityReport {
            available_beds: 0,
            capacity: rescue_types::CapacityLevel::Full,
        };
        assert!(engine.update_facility_capacity(id, report).await.is_ok());
        let event = next_event(&mut console).await;
        assert_eq!(event.map(|e| e.action), Some(EventAction::CapacityUpdate));
    }
}
