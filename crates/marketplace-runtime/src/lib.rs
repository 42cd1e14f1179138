//! # Marketplace Runtime
//!
//! Builds the in-memory event bus, constructs all services around one
//! shared token secret, subscribes each to the topics it consumes, and
//! runs the handler loops until shutdown.
//!
//! ```text
//!                         ┌──────────────┐
//!   authentication ──────→│              │─────→ product   [U P O]
//!   (authority, no sub)   │  event bus   │─────→ moderation [P]
//!                         │  4 topics    │─────→ order     [U P O C]
//!   service outboxes ────→│  U P O C     │─────→ cart      [U P C]
//!   (pumped on interval)  │              │─────→ coupons   [U P C]
//!                         └──────────────┘─────→ payout    [U P O]
//! ```

pub mod config;

pub use config::{ConfigError, RuntimeConfig};

use shared_bus::{EventFilter, EventHandler, EventTopic, InMemoryEventBus, Outbox};
use shared_types::TokenSigner;
use std::sync::Arc;
use svc_authentication::AuthenticationService;
use svc_cart::CartService;
use svc_coupons::CouponService;
use svc_moderation::ModerationHandler;
use svc_order::OrderService;
use svc_payout::PayoutService;
use svc_product::ProductService;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::info;

/// All services wired to one bus.
pub struct MarketRuntime {
    pub bus: Arc<InMemoryEventBus>,
    pub authentication: Arc<AuthenticationService>,
    pub product: Arc<ProductService>,
    pub moderation: Arc<ModerationHandler>,
    pub order: Arc<OrderService>,
    pub cart: Arc<CartService>,
    pub coupons: Arc<CouponService>,
    pub payout: Arc<PayoutService>,
    config: RuntimeConfig,
    shutdown_tx: watch::Sender<bool>,
    shutdown_rx: watch::Receiver<bool>,
    tasks: Vec<JoinHandle<()>>,
}

impl MarketRuntime {
    /// Construct every service. Nothing is subscribed or spawned yet.
    #[must_use]
    pub fn new(config: RuntimeConfig) -> Self {
        let bus = Arc::new(InMemoryEventBus::with_capacity(config.channel_capacity));
        let signer = TokenSigner::new(config.token_secret.clone());
        let verifier = signer.verifier();
        let (shutdown_tx, shutdown_rx) = watch::channel(false);

        Self {
            bus,
            authentication: Arc::new(AuthenticationService::new(signer)),
            product: Arc::new(ProductService::new(verifier.clone())),
            moderation: Arc::new(ModerationHandler::new()),
            order: Arc::new(OrderService::new(verifier.clone())),
            cart: Arc::new(CartService::new(verifier.clone())),
            coupons: Arc::new(CouponService::new(verifier.clone())),
            payout: Arc::new(PayoutService::new(verifier)),
            config,
            shutdown_tx,
            shutdown_rx,
            tasks: Vec::new(),
        }
    }

    /// Subscribe every consumer and spawn its handler loop, plus the
    /// outbox pumps that flush operation-staged events onto the bus.
    pub fn start(&mut self) {
        use EventTopic::{Coupon, Order, Product, User};

        self.spawn_loop(
            Arc::clone(&self.product) as Arc<dyn EventHandler>,
            EventFilter::topics(vec![User, Product, Order]),
        );
        self.spawn_loop(
            Arc::clone(&self.moderation) as Arc<dyn EventHandler>,
            EventFilter::topics(vec![Product]),
        );
        self.spawn_loop(
            Arc::clone(&self.order) as Arc<dyn EventHandler>,
            EventFilter::topics(vec![User, Product, Order, Coupon]),
        );
        self.spawn_loop(
            Arc::clone(&self.cart) as Arc<dyn EventHandler>,
            EventFilter::topics(vec![User, Product, Coupon]),
        );
        self.spawn_loop(
            Arc::clone(&self.coupons) as Arc<dyn EventHandler>,
            EventFilter::topics(vec![User, Product, Coupon]),
        );
        self.spawn_loop(
            Arc::clone(&self.payout) as Arc<dyn EventHandler>,
            EventFilter::topics(vec![User, Product, Order]),
        );

        // Operations stage events without touching the bus; these pumps
        // publish them. The authentication service has no handler loop,
        // so its pump is the only thing that ever flushes it.
        for service in [
            PumpTarget::new("authentication", Arc::clone(&self.authentication)),
            PumpTarget::new("product", Arc::clone(&self.product)),
            PumpTarget::new("order", Arc::clone(&self.order)),
            PumpTarget::new("cart", Arc::clone(&self.cart)),
            PumpTarget::new("coupons", Arc::clone(&self.coupons)),
        ] {
            self.spawn_pump(service);
        }
        info!(subscribers = self.bus.subscriber_count(), "marketplace runtime started");
    }

    /// Signal shutdown and wait for every loop to stop.
    pub async fn shutdown(mut self) {
        info!("shutting down");
        let _ = self.shutdown_tx.send(true);
        for task in self.tasks.drain(..) {
            let _ = task.await;
        }
    }

    fn spawn_loop(&mut self, handler: Arc<dyn EventHandler>, filter: EventFilter) {
        let subscription = self.bus.subscribe(filter);
        let bus = Arc::clone(&self.bus);
        let shutdown = self.shutdown_rx.clone();
        self.tasks.push(tokio::spawn(shared_bus::run_event_loop(
            subscription,
            handler,
            bus,
            shutdown,
        )));
    }

    fn spawn_pump(&mut self, target: PumpTarget) {
        let bus = Arc::clone(&self.bus);
        let mut shutdown = self.shutdown_rx.clone();
        let interval = self.config.outbox_pump_interval;
        self.tasks.push(tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            loop {
                tokio::select! {
                    _ = ticker.tick() => {
                        if let Err(err) = target.outbox().drain(bus.as_ref()).await {
                            tracing::warn!(service = target.name, %err, "outbox pump failed");
                        }
                    }
                    _ = shutdown.changed() => {
                        if *shutdown.borrow() {
                            // Final flush so nothing staged is lost.
                            let _ = target.outbox().drain(bus.as_ref()).await;
                            break;
                        }
                    }
                }
            }
        }));
    }
}

/// An outbox owner whose staged events are flushed on an interval.
struct PumpTarget {
    name: &'static str,
    source: PumpSource,
}

enum PumpSource {
    Authentication(Arc<AuthenticationService>),
    Handler(Arc<dyn EventHandler>),
}

impl PumpTarget {
    fn new(name: &'static str, source: impl Into<PumpSource>) -> Self {
        Self {
            name,
            source: source.into(),
        }
    }

    fn outbox(&self) -> &Outbox {
        match &self.source {
            PumpSource::Authentication(svc) => svc.outbox(),
            PumpSource::Handler(handler) => handler.outbox(),
        }
    }
}

impl From<Arc<AuthenticationService>> for PumpSource {
    fn from(svc: Arc<AuthenticationService>) -> Self {
        Self::Authentication(svc)
    }
}

impl From<Arc<ProductService>> for PumpSource {
    fn from(svc: Arc<ProductService>) -> Self {
        Self::Handler(svc)
    }
}

impl From<Arc<OrderService>> for PumpSource {
    fn from(svc: Arc<OrderService>) -> Self {
        Self::Handler(svc)
    }
}

impl From<Arc<CartService>> for PumpSource {
    fn from(svc: Arc<CartService>) -> Self {
        Self::Handler(svc)
    }
}

impl From<Arc<CouponService>> for PumpSource {
    fn from(svc: Arc<CouponService>) -> Self {
        Self::Handler(svc)
    }
}
