//! REST API endpoint handlers.
//!
//! Handlers resolve the caller's [`Actor`], run the capability check, and
//! delegate to the [`DispatchEngine`](rescue_core::DispatchEngine).
//! Mutations run on a spawned task and are awaited, so a client that hangs
//! up mid-request never cancels a half-applied change.
//!
//! # Endpoints
//!
//! | Method | Path | Who | Description |
//! |--------|------|-----|-------------|
//! | `GET` | `/health` | anyone | Liveness, call count, audience sizes |
//! | `POST` | `/api/calls` | anyone | Take a new call |
//! | `GET` | `/api/calls` | dispatcher | List calls (`?status=`) |
//! | `GET` | `/api/calls/{id}` | dispatcher, bound responder | One call |
//! | `POST` | `/api/calls/{id}/dispatch` | dispatcher | Assign a vehicle |
//! | `PATCH` | `/api/calls/{id}/status` | dispatcher, bound responder | Advance status |
//! | `POST` | `/api/calls/{id}/cancel` | dispatcher | Cancel a call |
//! | `GET` | `/api/snapshot` | dispatcher | Full snapshot (`?filter=`) |
//! | `GET` | `/api/vehicles` | dispatcher | Fleet |
//! | `GET` | `/api/vehicles/{id}` | any actor | One vehicle |
//! | `POST` | `/api/vehicles/{id}/availability` | dispatcher | In/out of service |
//! | `POST` | `/api/vehicles/{id}/position` | dispatcher, crewing responder | Position report |
//! | `GET` | `/api/responders` | dispatcher | Responders |
//! | `POST` | `/api/responders/{id}/availability` | dispatcher, self | Opt in/out |
//! | `GET` | `/api/facilities` | any actor | Facility capacity |
//! | `GET` | `/api/facilities/{id}` | any actor | One facility |
//! | `POST` | `/api/facilities/{id}/capacity` | dispatcher | Capacity report |

use core::future::Future;
use core::str::FromStr;
use std::sync::Arc;

use axum::Json;
use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::response::IntoResponse;
use rescue_core::{CallFilter, CapacityReport, DispatchError, DispatchOrder, StatusDetails};
use rescue_types::{
    CallId, CallStatus, CapacityLevel, FacilityId, NewCall, ResponderId, VehicleId, VehicleState,
};
use serde::Deserialize;

use crate::auth::Actor;
use crate::error::ApiError;
use crate::state::AppState;

// ---------------------------------------------------------------------------
// Request bodies and query parameters
// ---------------------------------------------------------------------------

/// Query parameters for list and snapshot reads.
#[derive(Debug, Default, Deserialize)]
pub struct FilterQuery {
    /// `open`, `active`, `pending`, `completed`, `all`, or a status name.
    pub status: Option<String>,
    /// Alias of `status` used by the snapshot endpoint.
    pub filter: Option<String>,
}

impl FilterQuery {
    fn call_filter(&self, fallback: CallFilter) -> Result<CallFilter, ApiError> {
        self.status
            .as_deref()
            .or(self.filter.as_deref())
            .map_or(Ok(fallback), |raw| raw.parse().map_err(ApiError::InvalidQuery))
    }
}

/// Body of `POST /api/calls/{id}/dispatch`.
#[derive(Debug, Deserialize)]
pub struct DispatchRequest {
    /// Unit designator of the vehicle to assign.
    pub vehicle_id: VehicleId,
    /// Responder crewing the vehicle.
    #[serde(default)]
    pub responder_id: Option<ResponderId>,
}

/// Body of `PATCH /api/calls/{id}/status`.
#[derive(Debug, Deserialize)]
pub struct StatusUpdateRequest {
    /// Target status.
    pub status: CallStatus,
    /// Patient name.
    #[serde(default)]
    pub patient_name: Option<String>,
    /// Patient age in years.
    #[serde(default)]
    pub patient_age: Option<u32>,
    /// Condition assessment.
    #[serde(default)]
    pub patient_condition: Option<String>,
    /// Receiving facility.
    #[serde(default)]
    pub hospital_destination: Option<String>,
}

/// Body of `POST /api/vehicles/{id}/availability`.
#[derive(Debug, Deserialize)]
pub struct VehicleAvailabilityRequest {
    /// `AVAILABLE` or `OUT_OF_SERVICE`.
    pub state: VehicleState,
}

/// Body of `POST /api/vehicles/{id}/position`.
#[derive(Debug, Deserialize)]
pub struct PositionRequest {
    /// Latitude in decimal degrees.
    pub latitude: f64,
    /// Longitude in decimal degrees.
    pub longitude: f64,
}

/// Body of `POST /api/responders/{id}/availability`.
#[derive(Debug, Deserialize)]
pub struct ResponderAvailabilityRequest {
    /// Opt in to new assignments.
    pub available: bool,
}

/// Body of `POST /api/facilities/{id}/capacity`.
#[derive(Debug, Deserialize)]
pub struct CapacityRequest {
    /// Beds currently free.
    pub available_beds: u32,
    /// Emergency department load.
    pub capacity: CapacityLevel,
}

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

fn parse_id<T: FromStr<Err = uuid::Error>>(raw: &str) -> Result<T, ApiError> {
    raw.parse()
        .map_err(|e| ApiError::InvalidId(format!("{raw}: {e}")))
}

/// Run a mutation to completion on its own task.
async fn detached<T, F>(mutation: F) -> Result<T, ApiError>
where
    T: Send + 'static,
    F: Future<Output = Result<T, DispatchError>> + Send + 'static,
{
    tokio::spawn(mutation)
        .await
        .map_err(|e| ApiError::Internal(format!("mutation task failed: {e}")))?
        .map_err(ApiError::from)
}

// ---------------------------------------------------------------------------
// Health
// ---------------------------------------------------------------------------

/// Liveness probe with call volume and live-channel audience sizes.
pub async fn health(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    let calls = state.engine.call_count().await;
    let hub = state.engine.hub();
    Json(serde_json::json!({
        "status": "ok",
        "calls": calls,
        "dispatch_members": hub.dispatch_members(),
        "responder_audiences": hub.responder_audiences(),
    }))
}

// ---------------------------------------------------------------------------
// Calls
// ---------------------------------------------------------------------------

/// Take a new call. Open to the public intake line; no identity needed.
pub async fn create_call(
    State(state): State<Arc<AppState>>,
    Json(intake): Json<NewCall>,
) -> Result<impl IntoResponse, ApiError> {
    let engine = Arc::clone(&state.engine);
    let call = detached(async move { engine.create_call(intake).await }).await?;
    Ok((StatusCode::CREATED, Json(call)))
}

/// List calls, newest first.
///
/// # Query Parameters
///
/// - `status`: a bucket (`open`, `active`, `pending`, `completed`, `all`)
///   or an exact status (default: `all`)
pub async fn list_calls(
    State(state): State<Arc<AppState>>,
    actor: Actor,
    Query(params): Query<FilterQuery>,
) -> Result<impl IntoResponse, ApiError> {
    actor.dispatcher()?;
    let filter = params.call_filter(CallFilter::All)?;
    let calls = state.engine.calls(filter).await;
    Ok(Json(serde_json::json!({
        "count": calls.len(),
        "calls": calls,
    })))
}

/// One call.
pub async fn get_call(
    State(state): State<Arc<AppState>>,
    actor: Actor,
    Path(id): Path<String>,
) -> Result<impl IntoResponse, ApiError> {
    let call = state.engine.call(parse_id::<CallId>(&id)?).await?;
    actor.authorize_call(&call)?;
    Ok(Json(call))
}

/// Assign a vehicle, and optionally a responder, to a call.
pub async fn dispatch_call(
    State(state): State<Arc<AppState>>,
    actor: Actor,
    Path(id): Path<String>,
    Json(body): Json<DispatchRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let dispatcher = actor.dispatcher()?;
    let call_id = parse_id::<CallId>(&id)?;
    let order = DispatchOrder {
        vehicle: body.vehicle_id,
        responder: body.responder_id,
        dispatcher,
    };
    let engine = Arc::clone(&state.engine);
    let assignment = detached(async move { engine.dispatch(call_id, order).await }).await?;
    Ok(Json(serde_json::json!({
        "call": assignment.call,
        "vehicle": assignment.vehicle,
    })))
}

/// Advance a call along the status chain.
pub async fn update_status(
    State(state): State<Arc<AppState>>,
    actor: Actor,
    Path(id): Path<String>,
    Json(body): Json<StatusUpdateRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let call_id = parse_id::<CallId>(&id)?;
    let call = state.engine.call(call_id).await?;
    actor.authorize_call(&call)?;

    let details = StatusDetails {
        patient_name: body.patient_name,
        patient_age: body.patient_age,
        patient_condition: body.patient_condition,
        hospital_destination: body.hospital_destination,
    };
    let to = body.status;
    let engine = Arc::clone(&state.engine);
    let call = detached(async move { engine.advance(call_id, to, details).await }).await?;
    Ok(Json(call))
}

/// Cancel a call that has not closed.
pub async fn cancel_call(
    State(state): State<Arc<AppState>>,
    actor: Actor,
    Path(id): Path<String>,
) -> Result<impl IntoResponse, ApiError> {
    actor.dispatcher()?;
    let call_id = parse_id::<CallId>(&id)?;
    let engine = Arc::clone(&state.engine);
    let call = detached(async move { engine.cancel(call_id).await }).await?;
    Ok(Json(call))
}

/// Calls, fleet, and facilities in one read.
///
/// # Query Parameters
///
/// - `filter`: same values as `GET /api/calls` (default: `open`)
pub async fn snapshot(
    State(state): State<Arc<AppState>>,
    actor: Actor,
    Query(params): Query<FilterQuery>,
) -> Result<impl IntoResponse, ApiError> {
    actor.dispatcher()?;
    let filter = params.call_filter(CallFilter::Open)?;
    Ok(Json(state.engine.snapshot(filter).await))
}

// ---------------------------------------------------------------------------
// Vehicles
// ---------------------------------------------------------------------------

/// The whole fleet.
pub async fn list_vehicles(
    State(state): State<Arc<AppState>>,
    actor: Actor,
) -> Result<impl IntoResponse, ApiError> {
    actor.dispatcher()?;
    let fleet = state.engine.fleet().await;
    Ok(Json(serde_json::json!({
        "count": fleet.len(),
        "vehicles": fleet,
    })))
}

/// One vehicle.
pub async fn get_vehicle(
    State(state): State<Arc<AppState>>,
    _actor: Actor,
    Path(id): Path<String>,
) -> Result<impl IntoResponse, ApiError> {
    Ok(Json(state.engine.vehicle(&VehicleId::new(id)).await?))
}

/// Put a vehicle in or out of service.
pub async fn set_vehicle_availability(
    State(state): State<Arc<AppState>>,
    actor: Actor,
    Path(id): Path<String>,
    Json(body): Json<VehicleAvailabilityRequest>,
) -> Result<impl IntoResponse, ApiError> {
    actor.dispatcher()?;
    let engine = Arc::clone(&state.engine);
    let vehicle_id = VehicleId::new(id);
    let vehicle = detached(async move {
        engine
            .set_vehicle_availability(&vehicle_id, body.state)
            .await
    })
    .await?;
    Ok(Json(vehicle))
}

/// Record a position report from a vehicle's crew device.
///
/// Responders may only report for the vehicle they are crewing.
pub async fn report_position(
    State(state): State<Arc<AppState>>,
    actor: Actor,
    Path(id): Path<String>,
    Json(body): Json<PositionRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let vehicle_id = VehicleId::new(id);
    let vehicle = state.engine.vehicle(&vehicle_id).await?;
    actor.authorize_vehicle(&vehicle)?;

    let engine = Arc::clone(&state.engine);
    let vehicle = detached(async move {
        engine
            .report_position(&vehicle_id, body.latitude, body.longitude)
            .await
    })
    .await?;
    Ok(Json(vehicle))
}

// ---------------------------------------------------------------------------
// Responders
// ---------------------------------------------------------------------------

/// Every responder.
pub async fn list_responders(
    State(state): State<Arc<AppState>>,
    actor: Actor,
) -> Result<impl IntoResponse, ApiError> {
    actor.dispatcher()?;
    let responders = state.engine.responders().await;
    Ok(Json(serde_json::json!({
        "count": responders.len(),
        "responders": responders,
    })))
}

/// Opt a responder in to or out of new assignments.
pub async fn set_responder_availability(
    State(state): State<Arc<AppState>>,
    actor: Actor,
    Path(id): Path<String>,
    Json(body): Json<ResponderAvailabilityRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let responder_id = parse_id::<ResponderId>(&id)?;
    actor.authorize_responder(responder_id)?;
    let engine = Arc::clone(&state.engine);
    let responder = detached(async move {
        engine
            .set_responder_available(responder_id, body.available)
            .await
    })
    .await?;
    Ok(Json(responder))
}

// ---------------------------------------------------------------------------
// Facilities
// ---------------------------------------------------------------------------

/// Facility capacity mirror.
pub async fn list_facilities(
    State(state): State<Arc<AppState>>,
    _actor: Actor,
) -> Result<impl IntoResponse, ApiError> {
    let facilities = state.engine.facilities().await;
    Ok(Json(serde_json::json!({
        "count": facilities.len(),
        "facilities": facilities,
    })))
}

/// One facility.
pub async fn get_facility(
    State(state): State<Arc<AppState>>,
    _actor: Actor,
    Path(id): Path<String>,
) -> Result<impl IntoResponse, ApiError> {
    let facility = state.engine.facility(parse_id::<FacilityId>(&id)?).await?;
    Ok(Json(facility))
}

/// Apply a capacity report on behalf of the facility collaborator.
pub async fn update_capacity(
    State(state): State<Arc<AppState>>,
    actor: Actor,
    Path(id): Path<String>,
    Json(body): Json<CapacityRequest>,
) -> Result<impl IntoResponse, ApiError> {
    actor.dispatcher()?;
    let facility_id = parse_id::<FacilityId>(&id)?;
    let report = CapacityReport {
        available_beds: body.available_beds,
        capacity: body.capacity,
    };
    let engine = Arc::clone(&state.engine);
    let facility =
        detached(async move { engine.update_facility_capacity(facility_id, report).await })
            .await?;
    Ok(Json(facility))
}
