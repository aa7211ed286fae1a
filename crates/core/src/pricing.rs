//! Server-side order pricing.
//!
//! Totals are always derived from the catalog prices current at checkout.
//! Nothing price related is ever taken from the visitor's request.

use std::collections::{HashMap, HashSet};

use rust_decimal::Decimal;
use thiserror::Error;

use crate::types::{CustomerDetails, Product};
use crate::validation::non_blank;

/// A requested cart line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OrderLine {
    pub product_id: String,
    pub quantity: u32,
}

/// Raw checkout input before validation.
#[derive(Debug, Clone, Default)]
pub struct CheckoutInput {
    pub store_id: Option<String>,
    pub customer_name: Option<String>,
    pub customer_email: Option<String>,
    pub customer_phone: Option<String>,
    pub notes: Option<String>,
    pub items: Vec<(Option<String>, i64)>,
}

/// Validated checkout request, ready to be priced against the catalog.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OrderDraft {
    store_id: String,
    customer: CustomerDetails,
    lines: Vec<OrderLine>,
}

/// A line with the unit price frozen at checkout time.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PricedLine {
    pub product_id: String,
    pub quantity: u32,
    pub unit_price: Decimal,
}

/// Fully priced order, the only shape accepted by the order repository.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PricedOrder {
    pub store_id: String,
    pub customer: CustomerDetails,
    pub lines: Vec<PricedLine>,
    pub total: Decimal,
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PricingError {
    #[error("store, customer name, customer email and at least one item are required")]
    MissingFields,
    #[error("quantity for product {product_id} must be a positive integer (got {quantity})")]
    InvalidQuantity { product_id: String, quantity: i64 },
    #[error("one or more products were not found in this store")]
    ProductNotFoundOrForeign,
    #[error("order total is out of range")]
    TotalOverflow,
}

impl PricingError {
    /// Stable label for metrics.
    pub fn reason(&self) -> &'static str {
        match self {
            Self::MissingFields => "missing_fields",
            Self::InvalidQuantity { .. } => "invalid_quantity",
            Self::ProductNotFoundOrForeign => "product_not_found",
            Self::TotalOverflow => "total_overflow",
        }
    }
}

impl OrderDraft {
    /// Checks required fields and quantities.
    pub fn validate(input: CheckoutInput) -> Result<Self, PricingError> {
        let store_id = non_blank(input.store_id.as_deref()).ok_or(PricingError::MissingFields)?;
        let name = non_blank(input.customer_name.as_deref()).ok_or(PricingError::MissingFields)?;
        let email =
            non_blank(input.customer_email.as_deref()).ok_or(PricingError::MissingFields)?;
        if input.items.is_empty() {
            return Err(PricingError::MissingFields);
        }

        let mut lines = Vec::with_capacity(input.items.len());
        for (product_id, quantity) in input.items {
            let product_id =
                non_blank(product_id.as_deref()).ok_or(PricingError::MissingFields)?;
            let quantity = u32::try_from(quantity)
                .ok()
                .filter(|quantity| *quantity > 0)
                .ok_or_else(|| PricingError::InvalidQuantity {
                    product_id: product_id.clone(),
                    quantity,
                })?;
            lines.push(OrderLine {
                product_id,
                quantity,
            });
        }

        Ok(Self {
            store_id,
            customer: CustomerDetails {
                name,
                email,
                phone: non_blank(input.customer_phone.as_deref()),
                notes: non_blank(input.notes.as_deref()),
            },
            lines,
        })
    }

    pub fn store_id(&self) -> &str {
        &self.store_id
    }

    /// Distinct product ids in first-seen order.
    pub fn product_ids(&self) -> Vec<&str> {
        let mut seen = HashSet::new();
        self.lines
            .iter()
            .map(|line| line.product_id.as_str())
            .filter(|id| seen.insert(*id))
            .collect()
    }

    /// Prices every line with the current catalog price.
    ///
    /// `catalog` is expected to hold the products fetched by
    /// `id IN product_ids() AND store_id = store_id()`. Products from other
    /// stores are ignored here as well, so a mismatch always surfaces as
    /// [`PricingError::ProductNotFoundOrForeign`].
    pub fn price(self, catalog: &[Product]) -> Result<PricedOrder, PricingError> {
        let by_id: HashMap<&str, &Product> = catalog
            .iter()
            .filter(|product| product.store_id == self.store_id)
            .map(|product| (product.id.as_str(), product))
            .collect();

        let requested = self.product_ids();
        if requested.iter().filter(|id| by_id.contains_key(*id)).count() != requested.len() {
            return Err(PricingError::ProductNotFoundOrForeign);
        }

        let mut total = Decimal::ZERO;
        let mut lines = Vec::with_capacity(self.lines.len());
        for line in self.lines {
            let product = by_id
                .get(line.product_id.as_str())
                .ok_or(PricingError::ProductNotFoundOrForeign)?;
            let line_total = product
                .price
                .checked_mul(Decimal::from(line.quantity))
                .ok_or(PricingError::TotalOverflow)?;
            total = total
                .checked_add(line_total)
                .ok_or(PricingError::TotalOverflow)?;
            lines.push(PricedLine {
                product_id: line.product_id,
                quantity: line.quantity,
                unit_price: product.price,
            });
        }

        Ok(PricedOrder {
            store_id: self.store_id,
            customer: self.customer,
            lines,
            total,
        })
    }
}
