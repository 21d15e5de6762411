use chrono::Duration;
use std::sync::Arc;
use transita_catalog::availability::AvailabilityManager;
use transita_catalog::fleet::FleetRegistry;
use transita_order::booking::BookingFinalizer;
use transita_order::payment::PaymentGateway;
use transita_order::reservation::ReservationManager;
use transita_shared::Clock;

use crate::app_config::BusinessRules;

/// Shared handles behind every route handler. Cheap to clone; all the
/// managers are reference-counted.
#[derive(Clone)]
pub struct AppState {
    pub fleet: Arc<FleetRegistry>,
    pub availability: Arc<AvailabilityManager>,
    pub reservations: Arc<ReservationManager>,
    pub finalizer: Arc<BookingFinalizer>,
    pub business_rules: BusinessRules,
}

impl AppState {
    /// Wires the manager stack onto one clock and gateway. Tests pass a
    /// `ManualClock` here to drive TTL expiry deterministically.
    pub fn build(
        clock: Arc<dyn Clock>,
        gateway: Arc<dyn PaymentGateway>,
        business_rules: BusinessRules,
    ) -> Self {
        let fleet = Arc::new(FleetRegistry::new());
        let availability = Arc::new(AvailabilityManager::new(fleet.clone(), clock.clone()));
        let reservations = Arc::new(ReservationManager::with_ttl(
            availability.clone(),
            clock.clone(),
            Duration::seconds(business_rules.reservation_ttl_seconds as i64),
        ));
        let finalizer = Arc::new(BookingFinalizer::new(
            reservations.clone(),
            gateway,
            clock,
        ));
        Self {
            fleet,
            availability,
            reservations,
            finalizer,
            business_rules,
        }
    }
}
