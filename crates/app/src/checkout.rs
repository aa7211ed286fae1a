use chrono::{DateTime, Utc};
use metrics::counter;
use thiserror::Error;
use tracing::{info, warn};

use gestularia_core::pricing::{CheckoutInput, OrderDraft, PricingError};
use gestularia_core::types::{Order, OrderStatus};
use gestularia_storage::{Database, OrderError, ProductError};

/// Prices and persists storefront orders and applies owner status changes.
#[derive(Clone)]
pub struct OrderService {
    database: Database,
}

impl OrderService {
    pub fn new(database: Database) -> Self {
        Self { database }
    }

    /// Validates the cart, prices it from the catalog and stores it atomically.
    pub async fn create_order(
        &self,
        input: CheckoutInput,
        now: DateTime<Utc>,
    ) -> Result<Order, CheckoutError> {
        let draft = OrderDraft::validate(input).map_err(rejected)?;

        let catalog = self
            .database
            .products()
            .find_many_in_store(draft.store_id(), &draft.product_ids())
            .await?;
        let priced = draft.price(&catalog).map_err(rejected)?;

        let order = self.database.orders().create(&priced, now).await?;

        counter!("orders_created_total").increment(1);
        info!(
            stage = "orders",
            order_id = %order.id,
            store_id = %order.store_id,
            items = order.items.len(),
            total = %order.total,
            "order created"
        );
        Ok(order)
    }

    /// Sets the status of an order owned by `store_id`.
    ///
    /// Orders of other stores are reported exactly like missing ones.
    pub async fn update_status(
        &self,
        store_id: &str,
        order_id: &str,
        status: OrderStatus,
        now: DateTime<Utc>,
    ) -> Result<Order, CheckoutError> {
        let order = self
            .database
            .orders()
            .update_status(store_id, order_id, status, now)
            .await?
            .ok_or(CheckoutError::OrderNotFound)?;

        counter!("order_status_updates_total", "status" => status.as_str()).increment(1);
        info!(stage = "orders", order_id = %order.id, status = %status, "order status updated");
        Ok(order)
    }
}

fn rejected(err: PricingError) -> CheckoutError {
    counter!("order_rejections_total", "reason" => err.reason()).increment(1);
    warn!(stage = "orders", reason = err.reason(), error = %err, "order rejected");
    CheckoutError::Pricing(err)
}

#[derive(Debug, Error)]
pub enum CheckoutError {
    #[error(transparent)]
    Pricing(#[from] PricingError),
    #[error("order not found")]
    OrderNotFound,
    #[error("failed to load products: {0}")]
    Products(#[from] ProductError),
    #[error("failed to persist order: {0}")]
    Orders(#[from] OrderError),
}
