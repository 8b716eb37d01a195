//! Startup registration of the fleet, crews, and facilities listed in the
//! `seed` section of the configuration.

use chrono::Utc;
use rescue_core::DispatchEngine;
use rescue_core::config::SeedConfig;
use rescue_core::error::Result;
use rescue_types::{Facility, VehicleId};
use tracing::debug;

/// Counts of resources registered by [`seed_engine`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SeedReport {
    /// Vehicles registered.
    pub vehicles: usize,
    /// Responders registered.
    pub responders: usize,
    /// Facilities mirrored.
    pub facilities: usize,
}

/// Register every seeded resource with `engine`.
///
/// Fails on the first duplicate or invalid entry.
pub async fn seed_engine(engine: &DispatchEngine, seed: &SeedConfig) -> Result<SeedReport> {
    let mut report = SeedReport::default();

    for vehicle in &seed.vehicles {
        engine
            .register_vehicle(VehicleId::new(vehicle.id.as_str()), vehicle.unit_type)
            .await?;
        report.vehicles = report.vehicles.saturating_add(1);
    }

    for responder in &seed.responders {
        let id = responder.id.unwrap_or_default();
        engine
            .register_responder(id, responder.name.clone(), responder.available)
            .await?;
        debug!(responder = %id, name = %responder.name, "seeded responder");
        report.responders = report.responders.saturating_add(1);
    }

    for facility in &seed.facilities {
        engine
            .upsert_facility(Facility {
                id: facility.id.unwrap_or_default(),
                name: facility.name.clone(),
                address: facility.address.clone(),
                total_beds: facility.total_beds,
                available_beds: facility.available_beds.unwrap_or(facility.total_beds),
                capacity: facility.capacity,
                revision: 0,
                updated_at: Utc::now(),
            })
            .await?;
        report.facilities = report.facilities.saturating_add(1);
    }

    Ok(report)
}
