//! Background jobs.
//!
//! The reservation sweeper runs on a fixed interval, independently of
//! request handling. A failed sweep is logged and retried at the next
//! tick; it never takes the process down.

use crate::services::reservations::ReservationService;
use chrono::Utc;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::MissedTickBehavior;
use tracing::{debug, error, info};

pub async fn run_reservation_sweeper(service: Arc<ReservationService>, interval: Duration) {
    info!(interval_secs = interval.as_secs(), "reservation sweeper started");

    let mut ticker = tokio::time::interval(interval);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
    // The first tick fires immediately; skip it so startup stays quiet.
    ticker.tick().await;

    loop {
        ticker.tick().await;
        match service.sweep_overdue(Utc::now()).await {
            Ok(0) => debug!("sweep found nothing overdue"),
            Ok(cancelled) => info!(cancelled, "sweep cancelled overdue reservations"),
            Err(e) => error!(error = %e, "reservation sweep failed; will retry next tick"),
        }
    }
}
