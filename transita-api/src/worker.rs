use std::sync::Arc;
use std::time::Duration;
use transita_order::booking::BookingFinalizer;
use transita_order::reservation::ReservationManager;

/// Background expiry sweep: reclaims lapsed holds, then cancels pending
/// bookings whose reservation lapsed underneath them. Runs until the
/// process exits.
pub async fn start_expiry_sweeper(
    reservations: Arc<ReservationManager>,
    finalizer: Arc<BookingFinalizer>,
    period: Duration,
) {
    let mut ticker = tokio::time::interval(period);
    tracing::info!(period_secs = period.as_secs(), "expiry sweeper started");
    loop {
        ticker.tick().await;
        let expired = reservations.sweep_expired();
        let reconciled = finalizer.reconcile_expired();
        if expired > 0 || reconciled > 0 {
            tracing::info!(expired, reconciled, "expiry sweep pass");
        }
    }
}
