//! Fixed product catalog. No randomness: every run sees the same shelf.

use crate::{
    clock::SimClock,
    error::{SimError, SimResult},
    types::EntityId,
};
use chrono::{Duration, NaiveDateTime};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Product {
    pub product_id: EntityId,
    pub name: String,
    pub category: String,
    pub price: f64,
    pub compare_at_price: Option<f64>,
    pub created_at: NaiveDateTime,
}

impl Product {
    pub fn new(
        product_id: EntityId,
        name: impl Into<String>,
        category: impl Into<String>,
        price: f64,
        compare_at_price: Option<f64>,
        created_at: NaiveDateTime,
    ) -> SimResult<Self> {
        if !(price.is_finite() && price > 0.0) {
            return Err(SimError::invalid_record("product", format!("price {price} for #{product_id}")));
        }
        if let Some(compare) = compare_at_price {
            if compare <= price {
                return Err(SimError::invalid_record(
                    "product",
                    format!("compare-at {compare} not above price {price} for #{product_id}"),
                ));
            }
        }
        Ok(Self {
            product_id,
            name: name.into(),
            category: category.into(),
            price,
            compare_at_price,
            created_at,
        })
    }
}

/// (name, category, price, compare-at price)
const CATALOG: &[(&str, &str, f64, Option<f64>)] = &[
    ("Wireless Bluetooth Headphones", "electronics", 89.99, Some(129.99)),
    ("Smart Fitness Watch", "electronics", 199.99, None),
    ("USB-C Hub 7-in-1", "electronics", 49.99, Some(69.99)),
    ("Mechanical Keyboard RGB", "electronics", 129.99, None),
    ("4K Webcam Pro", "electronics", 79.99, None),
    ("Organic Cotton T-Shirt", "clothing", 29.99, None),
    ("Slim Fit Chinos", "clothing", 59.99, None),
    ("Merino Wool Sweater", "clothing", 89.99, Some(119.99)),
    ("Running Jacket Waterproof", "clothing", 149.99, None),
    ("Ceramic Pour-Over Coffee Set", "home", 44.99, None),
    ("Bamboo Desk Organizer", "home", 34.99, None),
    ("Scented Soy Candle Set", "home", 24.99, None),
    ("LED Smart Lamp", "home", 54.99, Some(79.99)),
    ("Vitamin C Serum", "beauty", 38.99, None),
    ("Natural Lip Balm Pack", "beauty", 14.99, None),
    ("Yoga Mat Premium 6mm", "sports", 39.99, None),
    ("Resistance Bands Set", "sports", 19.99, None),
    ("Stainless Steel Water Bottle", "sports", 27.99, None),
    ("Data Science from Scratch", "books", 39.99, None),
    ("Designing Data-Intensive Apps", "books", 44.99, None),
    ("The Lean Startup", "books", 16.99, None),
    ("Atomic Habits", "books", 18.99, None),
    ("Portable Charger 20000mAh", "electronics", 35.99, Some(49.99)),
    ("Noise Cancelling Earbuds", "electronics", 69.99, None),
    ("Cotton Hoodie Oversized", "clothing", 44.99, None),
];

pub const CATALOG_SIZE: usize = CATALOG.len();

/// Build the catalog. Products are listed 0–90 days before the
/// history window opens, spread by their position on the list.
pub fn generate_catalog(clock: &SimClock) -> SimResult<Vec<Product>> {
    let opened = clock.history_start();
    CATALOG
        .iter()
        .enumerate()
        .map(|(i, (name, category, price, compare))| {
            let listed_days_early = (i as i64 * 37) % 91;
            Product::new(
                i as EntityId + 1,
                *name,
                *category,
                *price,
                *compare,
                opened - Duration::days(listed_days_early),
            )
        })
        .collect()
}
