//! Event handler: `ModerateProduct` in, `ProductModerated` out.

use crate::moderate::moderate_name;
use async_trait::async_trait;
use shared_bus::{EventHandler, MarketEvent, Outbox};
use shared_types::MarketError;
use tracing::info;

/// Stateless moderation consumer.
pub struct ModerationHandler {
    outbox: Outbox,
}

impl ModerationHandler {
    #[must_use]
    pub fn new() -> Self {
        Self {
            outbox: Outbox::new(),
        }
    }
}

impl Default for ModerationHandler {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl EventHandler for ModerationHandler {
    fn service_name(&self) -> &'static str {
        "moderation"
    }

    fn outbox(&self) -> &Outbox {
        &self.outbox
    }

    async fn handle_event(&self, event: &MarketEvent) -> Result<(), MarketError> {
        // The requested status is advisory; the verdict here is final.
        if let MarketEvent::ModerateProduct {
            token,
            product_id,
            name,
            ..
        } = event
        {
            let verdict = moderate_name(name);
            info!(product = %product_id, name, ?verdict, "product moderated");
            self.outbox.stage(MarketEvent::ProductModerated {
                token: token.clone(),
                product_id: *product_id,
                status: verdict,
            });
        }
        Ok(())
    }
}
