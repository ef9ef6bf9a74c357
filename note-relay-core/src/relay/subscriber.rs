//! Bus subscriber loop feeding remote messages into the relay

use super::service::RelayService;
use crate::bus::Subscription;
use tokio::sync::broadcast::error::RecvError;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

/// Consume every record on `subscription` until the bus closes.
///
/// Malformed records are dropped by [`RelayService::consume_record`];
/// nothing a peer sends can stop the loop.
pub fn spawn_subscriber(service: RelayService, mut subscription: Subscription) -> JoinHandle<()> {
    tokio::spawn(async move {
        info!("Subscribed to remote topic {}", subscription.topic());
        loop {
            match subscription.recv().await {
                Ok(record) => {
                    if service.consume_record(&record).is_err() {
                        debug!("Skipped record on {}", record.topic);
                    }
                }
                Err(RecvError::Lagged(skipped)) => {
                    warn!(
                        "Subscriber on {} lagged, {} records skipped",
                        subscription.topic(),
                        skipped
                    );
                }
                Err(RecvError::Closed) => break,
            }
        }
        info!("Subscriber on {} stopped", subscription.topic());
    })
}
