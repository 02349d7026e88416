//! Orders and their line items.
//!
//! Money is rounded to cents at each derived step, in a fixed order:
//! subtotal, then tax, then total. Reproducing a run bit-for-bit
//! depends on that order.

use crate::{
    config::PricingConfig,
    error::{SimError, SimResult},
    types::{round2, Channel, EntityId, OrderStatus, PaymentMethod},
};
use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};

const CENT_EPSILON: f64 = 1e-9;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OrderItem {
    pub item_id: EntityId,
    pub order_id: EntityId,
    pub product_id: EntityId,
    pub quantity: u32,
    /// Catalog price at the moment of purchase.
    pub unit_price: f64,
}

impl OrderItem {
    pub fn new(
        item_id: EntityId,
        order_id: EntityId,
        product_id: EntityId,
        quantity: u32,
        unit_price: f64,
    ) -> SimResult<Self> {
        if quantity < 1 {
            return Err(SimError::invalid_record("order_item", format!("#{item_id} quantity 0")));
        }
        if !(unit_price.is_finite() && unit_price > 0.0) {
            return Err(SimError::invalid_record(
                "order_item",
                format!("#{item_id} unit price {unit_price}"),
            ));
        }
        Ok(Self { item_id, order_id, product_id, quantity, unit_price })
    }

    pub fn line_total(&self) -> f64 {
        self.quantity as f64 * self.unit_price
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct OrderTotals {
    pub subtotal: f64,
    pub tax: f64,
    pub shipping: f64,
    pub total: f64,
}

impl OrderTotals {
    pub fn from_subtotal(raw_subtotal: f64, pricing: &PricingConfig) -> Self {
        let subtotal = round2(raw_subtotal);
        let tax = round2(subtotal * pricing.tax_rate);
        let shipping = if subtotal > pricing.free_shipping_threshold {
            0.0
        } else {
            pricing.shipping_fee
        };
        let total = round2(subtotal + tax + shipping);
        Self { subtotal, tax, shipping, total }
    }

    pub fn for_items(items: &[OrderItem], pricing: &PricingConfig) -> Self {
        Self::from_subtotal(items.iter().map(OrderItem::line_total).sum(), pricing)
    }

    /// Check that tax, shipping and total follow from the subtotal.
    pub fn reconcile(&self, pricing: &PricingConfig) -> Result<(), String> {
        let expected = Self::from_subtotal(self.subtotal, pricing);
        if (self.tax - expected.tax).abs() > CENT_EPSILON {
            return Err(format!("tax {} != {}", self.tax, expected.tax));
        }
        if (self.shipping - expected.shipping).abs() > CENT_EPSILON {
            return Err(format!("shipping {} != {}", self.shipping, expected.shipping));
        }
        let total = round2(self.subtotal + self.tax + self.shipping);
        if (self.total - total).abs() > CENT_EPSILON {
            return Err(format!("total {} != {}", self.total, total));
        }
        Ok(())
    }
}

/// Everything about an order except its money.
#[derive(Debug, Clone, PartialEq)]
pub struct OrderHeader {
    pub order_id: EntityId,
    pub customer_id: EntityId,
    pub status: OrderStatus,
    pub payment_method: PaymentMethod,
    pub channel: Channel,
    pub session_id: String,
    pub created_at: NaiveDateTime,
    pub completed_at: NaiveDateTime,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Order {
    pub order_id: EntityId,
    pub customer_id: EntityId,
    pub subtotal: f64,
    pub tax: f64,
    pub shipping: f64,
    pub total: f64,
    pub status: OrderStatus,
    pub payment_method: PaymentMethod,
    pub channel: Channel,
    pub session_id: String,
    pub created_at: NaiveDateTime,
    pub completed_at: NaiveDateTime,
}

impl Order {
    /// Rejects totals that do not reconcile under `pricing`.
    pub fn new(header: OrderHeader, totals: OrderTotals, pricing: &PricingConfig) -> SimResult<Self> {
        totals
            .reconcile(pricing)
            .map_err(|detail| SimError::invalid_record("order", format!("#{}: {detail}", header.order_id)))?;
        if header.completed_at < header.created_at {
            return Err(SimError::invalid_record(
                "order",
                format!("#{} completed before it was created", header.order_id),
            ));
        }
        Ok(Self {
            order_id: header.order_id,
            customer_id: header.customer_id,
            subtotal: totals.subtotal,
            tax: totals.tax,
            shipping: totals.shipping,
            total: totals.total,
            status: header.status,
            payment_method: header.payment_method,
            channel: header.channel,
            session_id: header.session_id,
            created_at: header.created_at,
            completed_at: header.completed_at,
        })
    }

    /// Price an order from its lines. Every line must point at this order.
    pub fn from_items(
        header: OrderHeader,
        items: &[OrderItem],
        pricing: &PricingConfig,
    ) -> SimResult<Self> {
        if items.is_empty() {
            return Err(SimError::invalid_record("order", format!("#{} has no items", header.order_id)));
        }
        if let Some(stray) = items.iter().find(|i| i.order_id != header.order_id) {
            return Err(SimError::invalid_record(
                "order",
                format!("item #{} belongs to order #{}, not #{}", stray.item_id, stray.order_id, header.order_id),
            ));
        }
        Self::new(header, OrderTotals::for_items(items, pricing), pricing)
    }

    pub fn totals(&self) -> OrderTotals {
        OrderTotals {
            subtotal: self.subtotal,
            tax: self.tax,
            shipping: self.shipping,
            total: self.total,
        }
    }

    /// Whether `subtotal` equals the cent-rounded sum of `items`.
    pub fn matches_items<'a>(&self, items: impl IntoIterator<Item = &'a OrderItem>) -> bool {
        let sum: f64 = items.into_iter().map(OrderItem::line_total).sum();
        (self.subtotal - round2(sum)).abs() <= CENT_EPSILON
    }
}
