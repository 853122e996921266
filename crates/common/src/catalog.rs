//! Catalog entities consumed by the order workflows.
//!
//! Products and users are owned by the catalog/account subsystems; this
//! core reads them by id and mutates only `Product::stock`, and only
//! through the store's reservation operations.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::money::Money;
use crate::types::{ProductId, UserId};

/// A purchasable catalog product.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Product {
    pub id: ProductId,
    pub name: String,
    pub price: Money,
    pub discount_price: Option<Money>,
    /// Units available for reservation. Never negative.
    pub stock: u32,
    pub created_at: DateTime<Utc>,
}

impl Product {
    /// Returns the price an order line should snapshot right now:
    /// the discount price when one is set and positive, else the list price.
    pub fn unit_price(&self) -> Money {
        match self.discount_price {
            Some(p) if p.is_positive() => p,
            _ => self.price,
        }
    }
}

/// A registered user, as far as this core needs to know one.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct User {
    pub id: UserId,
    pub name: String,
    pub email: String,
    pub created_at: DateTime<Utc>,
}
