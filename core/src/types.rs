//! Shared primitive types used across generation and transformation.

use crate::error::{SimError, SimResult};
use serde::{Deserialize, Serialize};

/// Identifier of any integer-keyed raw entity (customer, product, order, ...).
pub type EntityId = i64;

/// The canonical run identifier.
pub type RunId = String;

/// Timestamp layout shared by every raw table.
pub const TIMESTAMP_FORMAT: &str = "%Y-%m-%dT%H:%M:%S";

/// Closed vocabulary stored as text in the raw tables.
pub trait Label: Sized + Copy + 'static {
    const ALL: &'static [Self];
    const KIND: &'static str;

    fn as_str(&self) -> &'static str;

    fn parse(s: &str) -> SimResult<Self> {
        Self::ALL
            .iter()
            .copied()
            .find(|v| v.as_str() == s)
            .ok_or_else(|| SimError::invalid_record(Self::KIND, format!("unknown value '{s}'")))
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[serde(rename_all = "snake_case")]
pub enum Channel {
    Organic,
    PaidSearch,
    SocialMedia,
    Email,
    Referral,
    Direct,
}

impl Label for Channel {
    const ALL: &'static [Self] = &[
        Self::Organic,
        Self::PaidSearch,
        Self::SocialMedia,
        Self::Email,
        Self::Referral,
        Self::Direct,
    ];
    const KIND: &'static str = "channel";

    fn as_str(&self) -> &'static str {
        match self {
            Self::Organic => "organic",
            Self::PaidSearch => "paid_search",
            Self::SocialMedia => "social_media",
            Self::Email => "email",
            Self::Referral => "referral",
            Self::Direct => "direct",
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum Device {
    Desktop,
    Mobile,
    Tablet,
}

impl Label for Device {
    const ALL: &'static [Self] = &[Self::Desktop, Self::Mobile, Self::Tablet];
    const KIND: &'static str = "device";

    fn as_str(&self) -> &'static str {
        match self {
            Self::Desktop => "desktop",
            Self::Mobile => "mobile",
            Self::Tablet => "tablet",
        }
    }
}

/// Funnel event kinds, declared in stage order.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[serde(rename_all = "snake_case")]
pub enum EventKind {
    PageView,
    ProductView,
    AddToCart,
    CheckoutStart,
    CheckoutAbandon,
    CheckoutComplete,
}

impl EventKind {
    /// Position in the funnel; the two checkout outcomes share a rank.
    pub fn stage_rank(&self) -> u8 {
        match self {
            Self::PageView => 0,
            Self::ProductView => 1,
            Self::AddToCart => 2,
            Self::CheckoutStart => 3,
            Self::CheckoutAbandon | Self::CheckoutComplete => 4,
        }
    }

    pub fn carries_product(&self) -> bool {
        matches!(self, Self::ProductView | Self::AddToCart)
    }
}

impl Label for EventKind {
    const ALL: &'static [Self] = &[
        Self::PageView,
        Self::ProductView,
        Self::AddToCart,
        Self::CheckoutStart,
        Self::CheckoutAbandon,
        Self::CheckoutComplete,
    ];
    const KIND: &'static str = "event_type";

    fn as_str(&self) -> &'static str {
        match self {
            Self::PageView => "page_view",
            Self::ProductView => "product_view",
            Self::AddToCart => "add_to_cart",
            Self::CheckoutStart => "checkout_start",
            Self::CheckoutAbandon => "checkout_abandon",
            Self::CheckoutComplete => "checkout_complete",
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum OrderStatus {
    Delivered,
    Shipped,
    Processing,
    Pending,
}

impl Label for OrderStatus {
    const ALL: &'static [Self] = &[Self::Delivered, Self::Shipped, Self::Processing, Self::Pending];
    const KIND: &'static str = "order_status";

    fn as_str(&self) -> &'static str {
        match self {
            Self::Delivered => "delivered",
            Self::Shipped => "shipped",
            Self::Processing => "processing",
            Self::Pending => "pending",
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum PaymentMethod {
    CreditCard,
    DebitCard,
    Paypal,
    ApplePay,
}

impl Label for PaymentMethod {
    const ALL: &'static [Self] = &[Self::CreditCard, Self::DebitCard, Self::Paypal, Self::ApplePay];
    const KIND: &'static str = "payment_method";

    fn as_str(&self) -> &'static str {
        match self {
            Self::CreditCard => "credit_card",
            Self::DebitCard => "debit_card",
            Self::Paypal => "paypal",
            Self::ApplePay => "apple_pay",
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum Variant {
    Control,
    Treatment,
}

impl Label for Variant {
    const ALL: &'static [Self] = &[Self::Control, Self::Treatment];
    const KIND: &'static str = "variant";

    fn as_str(&self) -> &'static str {
        match self {
            Self::Control => "control",
            Self::Treatment => "treatment",
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum MetricKind {
    ConversionRate,
    AvgOrderValue,
}

impl Label for MetricKind {
    const ALL: &'static [Self] = &[Self::ConversionRate, Self::AvgOrderValue];
    const KIND: &'static str = "metric";

    fn as_str(&self) -> &'static str {
        match self {
            Self::ConversionRate => "conversion_rate",
            Self::AvgOrderValue => "avg_order_value",
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum TestStatus {
    Completed,
    Running,
}

impl Label for TestStatus {
    const ALL: &'static [Self] = &[Self::Completed, Self::Running];
    const KIND: &'static str = "test_status";

    fn as_str(&self) -> &'static str {
        match self {
            Self::Completed => "completed",
            Self::Running => "running",
        }
    }
}

/// Round half away from zero to cents.
pub fn round2(x: f64) -> f64 {
    (x * 100.0).round() / 100.0
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn labels_round_trip_through_text() {
        for c in Channel::ALL {
            assert_eq!(Channel::parse(c.as_str()).unwrap(), *c);
        }
        for k in EventKind::ALL {
            assert_eq!(EventKind::parse(k.as_str()).unwrap(), *k);
        }
        assert!(matches!(
            Variant::parse("holdout"),
            Err(SimError::InvalidRecord { entity: "variant", .. })
        ));
    }

    #[test]
    fn serde_names_match_stored_labels() {
        let json = serde_json::to_string(&Channel::PaidSearch).unwrap();
        assert_eq!(json, format!("\"{}\"", Channel::PaidSearch.as_str()));
    }

    #[test]
    fn round2_rounds_to_cents() {
        assert_eq!(round2(14.3968), 14.40);
        assert_eq!(round2(194.355_000_1), 194.36);
        assert_eq!(round2(0.0), 0.0);
    }
}
