//! Caller identity and capability checks.
//!
//! Authentication happens upstream. The auth collaborator forwards the
//! verified identity in two headers, `x-actor-role` (`dispatcher` or
//! `responder`) and `x-actor-id` (a UUID), and [`Actor`] extracts them.
//! Every capability check runs here, once, before the core is invoked.

use axum::extract::FromRequestParts;
use axum::http::request::Parts;
use rescue_types::{Call, DispatcherId, ResponderId, Role, Vehicle};
use uuid::Uuid;

use crate::error::ApiError;

/// Header carrying the caller's role.
pub const ROLE_HEADER: &str = "x-actor-role";

/// Header carrying the caller's identity.
pub const ID_HEADER: &str = "x-actor-id";

/// The authenticated caller.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Actor {
    /// Asserted role.
    pub role: Role,
    /// Asserted identity.
    pub id: Uuid,
}

impl Actor {
    /// The caller as a dispatcher, or `Forbidden`.
    pub fn dispatcher(&self) -> Result<DispatcherId, ApiError> {
        match self.role {
            Role::Dispatcher => Ok(DispatcherId::from(self.id)),
            Role::Responder => Err(ApiError::Forbidden("dispatcher role required".to_owned())),
        }
    }

    /// The caller as a responder, or `Forbidden`.
    pub fn responder(&self) -> Result<ResponderId, ApiError> {
        match self.role {
            Role::Responder => Ok(ResponderId::from(self.id)),
            Role::Dispatcher => Err(ApiError::Forbidden("responder role required".to_owned())),
        }
    }

    /// Whether the caller may see and update `call`.
    ///
    /// Dispatchers may act on any call. A responder may act only on a call
    /// they are bound to; the binding never changes after dispatch.
    pub fn authorize_call(&self, call: &Call) -> Result<(), ApiError> {
        match self.role {
            Role::Dispatcher => Ok(()),
            Role::Responder if call.responder == Some(ResponderId::from(self.id)) => Ok(()),
            Role::Responder => Err(ApiError::Forbidden(format!(
                "responder is not assigned to call {}",
                call.reference
            ))),
        }
    }

    /// Whether the caller may report for `vehicle`: any dispatcher, or the
    /// responder crewing its current assignment.
    pub fn authorize_vehicle(&self, vehicle: &Vehicle) -> Result<(), ApiError> {
        match self.role {
            Role::Dispatcher => Ok(()),
            Role::Responder if vehicle.bound_responder == Some(ResponderId::from(self.id)) => {
                Ok(())
            }
            Role::Responder => Err(ApiError::Forbidden(format!(
                "responder is not crewing vehicle {}",
                vehicle.id
            ))),
        }
    }

    /// Whether the caller may change `responder`'s availability: the
    /// responder themselves, or any dispatcher.
    pub fn authorize_responder(&self, responder: ResponderId) -> Result<(), ApiError> {
        match self.role {
            Role::Dispatcher => Ok(()),
            Role::Responder if responder == ResponderId::from(self.id) => Ok(()),
            Role::Responder => Err(ApiError::Forbidden(
                "responders may only change their own availability".to_owned(),
            )),
        }
    }
}

impl<S: Send + Sync> FromRequestParts<S> for Actor {
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        let header = |name: &str| {
            parts
                .headers
                .get(name)
                .and_then(|value| value.to_str().ok())
                .map(str::to_owned)
                .ok_or_else(|| ApiError::Unauthorized(format!("missing {name} header")))
        };
        let role: Role = header(ROLE_HEADER)?
            .parse()
            .map_err(ApiError::Unauthorized)?;
        let id = Uuid::parse_str(&header(ID_HEADER)?)
            .map_err(|e| ApiError::Unauthorized(format!("invalid {ID_HEADER}: {e}")))?;
        Ok(Self { role, id })
    }
}
