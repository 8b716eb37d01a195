//! Facility directory: a read-only mirror of hospital capacity.
//!
//! Capacity bookkeeping belongs to an external collaborator. The directory
//! only stores what that collaborator last reported, so dispatchers and
//! crews can pick a receiving facility.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use rescue_types::{CapacityLevel, Facility, FacilityId};
use tokio::sync::RwLock;

use crate::error::{DispatchError, Result};

/// A capacity report from the facility collaborator.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CapacityReport {
    /// Beds currently free.
    pub available_beds: u32,
    /// Emergency department load.
    pub capacity: CapacityLevel,
}

/// Facility capacity mirror.
#[derive(Debug, Default)]
pub struct FacilityDirectory {
    facilities: RwLock<BTreeMap<FacilityId, Facility>>,
}

impl FacilityDirectory {
    /// Create an empty directory.
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert or replace a facility's static details and capacity.
    ///
    /// A replaced facility keeps its revision sequence.
    pub async fn upsert(&self, mut facility: Facility) -> Result<Facility> {
        check_beds(facility.available_beds, facility.total_beds)?;
        let mut facilities = self.facilities.write().await;
        let revision = facilities
            .get(&facility.id)
            .map_or(1, |existing| existing.revision.saturating_add(1));
        facility.revision = revision;
        facilities.insert(facility.id, facility.clone());
        Ok(facility)
    }

    /// Apply a capacity report.
    ///
    /// # Errors
    ///
    /// [`DispatchError::FacilityNotFound`] for an unknown facility,
    /// [`DispatchError::InvalidInput`] if more beds are free than exist.
    pub async fn update_capacity(
        &self,
        id: FacilityId,
        report: CapacityReport,
        now: DateTime<Utc>,
    ) -> Result<Facility> {
        let mut facilities = self.facilities.write().await;
        let facility = facilities
            .get_mut(&id)
            .ok_or(DispatchError::FacilityNotFound(id))?;
        check_beds(report.available_beds, facility.total_beds)?;
        facility.available_beds = report.available_beds;
        facility.capacity = report.capacity;
        facility.revision = facility.revision.saturating_add(1);
        facility.updated_at = now;
        Ok(facility.clone())
    }

    /// One facility.
    pub async fn get(&self, id: FacilityId) -> Result<Facility> {
        self.facilities
            .read()
            .await
            .get(&id)
            .cloned()
            .ok_or(DispatchError::FacilityNotFound(id))
    }

    /// Every facility, ordered by name.
    pub async fn list(&self) -> Vec<Facility> {
        let mut facilities: Vec<Facility> = self.facilities.read().await.values().cloned().collect();
        facilities.sort_by(|a, b| a.name.cmp(&b.name));
        facilities
    }
}

fn check_beds(available: u32, total: u32) -> Result<()> {
    if available > total {
        return Err(DispatchError::InvalidInput(format!(
            "available beds ({available}) exceed total beds ({total})"
        )));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn connaught() -> Facility {
        Facility {
            id: FacilityId::new(),
            name: String::from("Connaught Hospital"),
            address: String::from("Percival Street, Freetown"),
            total_beds: 300,
            available_beds: 45,
            capacity: CapacityLevel::Moderate,
            revision: 0,
            updated_at: Utc::now(),
        }
    }

    #[tokio::test]
    async fn capacity_report_bumps_revision() {
        let directory = FacilityDirectory::new();
        let facility = directory.upsert(connaught()).await;
        assert_eq!(facility.as_ref().map(|f| f.revision), Ok(1));
        let id = connaught_id(&facility);

        let report = CapacityReport {
            available_beds: 3,
            capacity: CapacityLevel::High,
        };
        let updated = directory.update_capacity(id, report, Utc::now()).await;
        assert_eq!(updated.as_ref().map(|f| f.revision), Ok(2));
        assert_eq!(updated.as_ref().map(|f| f.capacity), Ok(CapacityLevel::High));
    }

    #[tokio::test]
    async fn overfull_report_rejected() {
        let directory = FacilityDirectory::new();
        let facility = directory.upsert(connaught()).await;
        let id = connaught_id(&facility);
        let report = CapacityReport {
            available_beds: 301,
            capacity: CapacityLevel::Low,
        };
        let err = directory.update_capacity(id, report, Utc::now()).await;
        assert!(matches!(err, Err(DispatchError::InvalidInput(_))));
        assert_eq!(directory.get(id).await.map(|f| f.available_beds), Ok(45));
    }

    #[tokio::test]
    async fn unknown_facility_not_found() {
        let directory = FacilityDirectory::new();
        let id = FacilityId::new();
        let report = CapacityReport {
            available_beds: 0,
            capacity: CapacityLevel::Full,
        };
        assert_eq!(
            directory.update_capacity(id, report, Utc::now()).await,
            Err(DispatchError::FacilityNotFound(id))
        );
    }

    fn connaught_id(facility: &Result<Facility>) -> FacilityId {
        facility.as_ref().map_or_else(|_| FacilityId::new(), |f| f.id)
    }
}
