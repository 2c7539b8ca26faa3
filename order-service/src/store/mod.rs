mod postgres;

#[cfg(test)]
pub mod memory;

pub use postgres::{DbPool, PgStore};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use shared::*;
use uuid::Uuid;

#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("duplicate record: {0}")]
    Duplicate(String),

    #[error("record not found: {0}")]
    Missing(String),

    #[error(transparent)]
    Backend(#[from] anyhow::Error),
}

pub type StoreResult<T> = Result<T, StoreError>;

/// Which orders a caller is allowed to list.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OrderScope {
    All,
    Customer(Uuid),
    RestaurantOwner(Uuid),
    /// Orders assigned to the courier plus ready orders nobody has claimed.
    DeliveryPerson(Uuid),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct OrderFilter {
    pub status: Option<OrderStatus>,
    pub limit: i64,
}

impl OrderScope {
    pub fn admits(&self, order: &Order, restaurant_owner: Option<Uuid>) -> bool {
        match *self {
            OrderScope::All => true,
            OrderScope::Customer(id) => order.customer_id == id,
            OrderScope::RestaurantOwner(id) => restaurant_owner == Some(id),
            OrderScope::DeliveryPerson(id) => {
                order.delivery_person_id == Some(id)
                    || (order.delivery_person_id.is_none() && order.status == OrderStatus::Ready)
            }
        }
    }
}

#[async_trait]
pub trait Store: Send + Sync {
    async fn insert_restaurant(&self, restaurant: &Restaurant) -> StoreResult<()>;

    async fn find_restaurant(&self, id: Uuid) -> StoreResult<Option<Restaurant>>;

    async fn restaurant_rating_summary(&self, restaurant_id: Uuid) -> StoreResult<RatingSummary>;

    async fn insert_order(&self, order: &Order) -> StoreResult<()>;

    async fn find_order(&self, id: Uuid) -> StoreResult<Option<Order>>;

    async fn find_order_by_batch(&self, batch_number: &str) -> StoreResult<Option<Order>>;

    async fn batch_number_exists(&self, batch_number: &str) -> StoreResult<bool>;

    /// Newest first.
    async fn list_orders(&self, scope: OrderScope, filter: OrderFilter) -> StoreResult<Vec<Order>>;

    /// Persists the mutable fields of an existing order. Never writes
    /// `ratings`, which only the review operations maintain.
    async fn save_order(&self, order: &Order) -> StoreResult<()>;

    async fn find_review(&self, customer_id: Uuid, order_id: Uuid) -> StoreResult<Option<Review>>;

    /// Finds the caller's review for `order`, creates it if absent, applies
    /// `submission` and mirrors the result onto the order, all atomically.
    async fn upsert_review(
        &self,
        order: &Order,
        submission: &RatingSubmission,
        now: DateTime<Utc>,
    ) -> StoreResult<Review>;

    /// Deletes the review and clears the order's ratings atomically.
    /// Returns false when there was no review.
    async fn delete_review(
        &self,
        customer_id: Uuid,
        order_id: Uuid,
        now: DateTime<Utc>,
    ) -> StoreResult<bool>;
}
