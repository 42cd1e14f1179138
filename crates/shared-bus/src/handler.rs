//! # Handler Loop
//!
//! The generic consume loop every service runs per subscription: receive a
//! delivery, apply it, settle it. Transient failures nack the delivery so
//! the bus redelivers; permanent failures ack and drop, since replaying a
//! validation error can never succeed.

use crate::bus::{InMemoryEventBus, Subscription};
use crate::events::MarketEvent;
use crate::outbox::Outbox;
use async_trait::async_trait;
use shared_types::MarketError;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tracing::{debug, info, warn};

/// Base delay between redelivery attempts, scaled linearly by attempt.
const REDELIVERY_BACKOFF: Duration = Duration::from_millis(25);

/// A service-side event handler.
///
/// Implementations hold the service's replica stores and stage any derived
/// events on their [`Outbox`]; the loop flushes it after each ack.
#[async_trait]
pub trait EventHandler: Send + Sync {
    /// Service name, used in logs.
    fn service_name(&self) -> &'static str;

    /// The outbox holding events derived during handling.
    fn outbox(&self) -> &Outbox;

    /// Apply one event to local state.
    async fn handle_event(&self, event: &MarketEvent) -> Result<(), MarketError>;
}

/// Run a handler loop until the bus closes or shutdown is signalled.
pub async fn run_event_loop(
    mut subscription: Subscription,
    handler: Arc<dyn EventHandler>,
    bus: Arc<InMemoryEventBus>,
    mut shutdown: watch::Receiver<bool>,
) {
    let service = handler.service_name();
    info!(service, "event loop started");

    loop {
        let delivery = tokio::select! {
            delivery = subscription.recv() => match delivery {
                Some(delivery) => delivery,
                None => break,
            },
            _ = shutdown.changed() => {
                if *shutdown.borrow() {
                    break;
                }
                continue;
            }
        };

        if delivery.attempt() > 1 {
            tokio::time::sleep(REDELIVERY_BACKOFF * (delivery.attempt() - 1)).await;
        }

        let kind = delivery.event().kind();
        match handler.handle_event(delivery.event()).await {
            Ok(()) => {
                debug!(service, kind, attempt = delivery.attempt(), "event applied");
                delivery.ack();
                if let Err(err) = handler.outbox().drain(bus.as_ref()).await {
                    warn!(service, kind, %err, "outbox drain failed, will retry");
                }
            }
            Err(err) if err.is_transient() => {
                warn!(
                    service,
                    kind,
                    attempt = delivery.attempt(),
                    %err,
                    "transient failure, requesting redelivery"
                );
                delivery.nack();
            }
            Err(err) => {
                warn!(service, kind, %err, "event rejected");
                delivery.ack();
            }
        }
    }

    info!(service, "event loop stopped");
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bus::EventPublisher;
    use crate::events::EventFilter;
    use shared_types::entities::{Role, UserReplica};
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::time::Duration;
    use tokio::time::timeout;
    use uuid::Uuid;

    struct FlakyHandler {
        outbox: Outbox,
        calls: AtomicU32,
        fail_first: u32,
    }

    #[async_trait]
    impl EventHandler for FlakyHandler {
        fn service_name(&self) -> &'static str {
            "flaky"
        }

        fn outbox(&self) -> &Outbox {
            &self.outbox
        }

        async fn handle_event(&self, _event: &MarketEvent) -> Result<(), MarketError> {
            let call = self.calls.fetch_add(1, Ordering::SeqCst) + 1;
            if call <= self.fail_first {
                Err(MarketError::NotFound("replica not yet populated".into()))
            } else {
                Ok(())
            }
        }
    }

    struct RejectingHandler {
        outbox: Outbox,
        calls: AtomicU32,
    }

    #[async_trait]
    impl EventHandler for RejectingHandler {
        fn service_name(&self) -> &'static str {
            "rejecting"
        }

        fn outbox(&self) -> &Outbox {
            &self.outbox
        }

        async fn handle_event(&self, _event: &MarketEvent) -> Result<(), MarketError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Err(MarketError::Validation("malformed".into()))
        }
    }

    fn user_added() -> MarketEvent {
        MarketEvent::UserAdded {
            user: UserReplica::new(Uuid::new_v4(), "amy", Role::Customer),
        }
    }

    #[tokio::test]
    async fn transient_failures_are_retried_until_success() {
        let bus = Arc::new(InMemoryEventBus::new());
        let subscription = bus.subscribe(EventFilter::all());
        let handler = Arc::new(FlakyHandler {
            outbox: Outbox::new(),
            calls: AtomicU32::new(0),
            fail_first: 2,
        });
        let (shutdown_tx, shutdown_rx) = watch::channel(false);

        let loop_handle = tokio::spawn(run_event_loop(
            subscription,
            Arc::clone(&handler) as Arc<dyn EventHandler>,
            Arc::clone(&bus),
            shutdown_rx,
        ));

        bus.publish(user_added()).await.unwrap();

        timeout(Duration::from_secs(2), async {
            while handler.calls.load(Ordering::SeqCst) < 3 {
                tokio::time::sleep(Duration::from_millis(10)).await;
            }
        })
        .await
        .expect("handler never succeeded");

        shutdown_tx.send(true).unwrap();
        loop_handle.await.unwrap();
        assert_eq!(handler.calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn permanent_failures_are_dropped_without_retry() {
        let bus = Arc::new(InMemoryEventBus::new());
        let subscription = bus.subscribe(EventFilter::all());
        let handler = Arc::new(RejectingHandler {
            outbox: Outbox::new(),
            calls: AtomicU32::new(0),
        });
        let (shutdown_tx, shutdown_rx) = watch::channel(false);

        let loop_handle = tokio::spawn(run_event_loop(
            subscription,
            Arc::clone(&handler) as Arc<dyn EventHandler>,
            Arc::clone(&bus),
            shutdown_rx,
        ));

        bus.publish(user_added()).await.unwrap();
        tokio::time::sleep(Duration::from_millis(150)).await;

        shutdown_tx.send(true).unwrap();
        loop_handle.await.unwrap();
        assert_eq!(handler.calls.load(Ordering::SeqCst), 1);
    }
}
