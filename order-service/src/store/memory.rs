use async_trait::async_trait;
use chrono::{DateTime, Utc};
use shared::*;
use std::collections::HashMap;
use std::sync::Mutex;
use uuid::Uuid;

use super::{OrderFilter, OrderScope, Store, StoreError, StoreResult};

#[derive(Default)]
struct Tables {
    restaurants: HashMap<Uuid, Restaurant>,
    orders: HashMap<Uuid, Order>,
    reviews: HashMap<(Uuid, Uuid), Review>,
}

/// In-process store used by tests. One lock covers all tables, which gives
/// the same atomicity the Postgres transactions do.
#[derive(Default)]
pub struct MemoryStore {
    tables: Mutex<Tables>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, Tables> {
        self.tables.lock().unwrap_or_else(|e| e.into_inner())
    }

    pub fn review_count(&self) -> usize {
        self.lock().reviews.len()
    }
}

#[async_trait]
impl Store for MemoryStore {
    async fn insert_restaurant(&self, restaurant: &Restaurant) -> StoreResult<()> {
        let mut tables = self.lock();
        if tables.restaurants.contains_key(&restaurant.id) {
            return Err(StoreError::Duplicate(format!("restaurant {}", restaurant.id)));
        }
        tables.restaurants.insert(restaurant.id, restaurant.clone());
        Ok(())
    }

    async fn find_restaurant(&self, id: Uuid) -> StoreResult<Option<Restaurant>> {
        Ok(self.lock().restaurants.get(&id).cloned())
    }

    async fn restaurant_rating_summary(&self, restaurant_id: Uuid) -> StoreResult<RatingSummary> {
        let tables = self.lock();
        let scores: Vec<f64> = tables
            .reviews
            .values()
            .filter(|r| r.restaurant_id == restaurant_id)
            .filter_map(|r| r.restaurant.as_ref().map(|e| f64::from(e.score)))
            .collect();

        let count = scores.len() as i64;
        let average = (count > 0)
            .then(|| (scores.iter().sum::<f64>() / count as f64 * 100.0).round() / 100.0);
        Ok(RatingSummary { average, count })
    }

    async fn insert_order(&self, order: &Order) -> StoreResult<()> {
        let mut tables = self.lock();
        if tables
            .orders
            .values()
            .any(|o| o.batch_number == order.batch_number)
        {
            return Err(StoreError::Duplicate(format!(
                "batch number {}",
                order.batch_number
            )));
        }
        tables.orders.insert(order.id, order.clone());
        Ok(())
    }

    async fn find_order(&self, id: Uuid) -> StoreResult<Option<Order>> {
        Ok(self.lock().orders.get(&id).cloned())
    }

    async fn find_order_by_batch(&self, batch_number: &str) -> StoreResult<Option<Order>> {
        Ok(self
            .lock()
            .orders
            .values()
            .find(|o| o.batch_number == batch_number)
            .cloned())
    }

    async fn batch_number_exists(&self, batch_number: &str) -> StoreResult<bool> {
        Ok(self
            .lock()
            .orders
            .values()
            .any(|o| o.batch_number == batch_number))
    }

    async fn list_orders(&self, scope: OrderScope, filter: OrderFilter) -> StoreResult<Vec<Order>> {
        let tables = self.lock();
        let mut orders: Vec<Order> = tables
            .orders
            .values()
            .filter(|o| {
                let owner = tables.restaurants.get(&o.restaurant_id).map(|r| r.owner_id);
                scope.admits(o, owner)
            })
            .filter(|o| filter.status.map_or(true, |s| o.status == s))
            .cloned()
            .collect();

        orders.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        orders.truncate(usize::try_from(filter.limit).unwrap_or(0));
        Ok(orders)
    }

    async fn save_order(&self, order: &Order) -> StoreResult<()> {
        let mut tables = self.lock();
        match tables.orders.get_mut(&order.id) {
            Some(stored) => {
                let ratings = stored.ratings.take();
                *stored = Order {
                    ratings,
                    ..order.clone()
                };
                Ok(())
            }
            None => Err(StoreError::Missing(format!("order {}", order.id))),
        }
    }

    async fn find_review(&self, customer_id: Uuid, order_id: Uuid) -> StoreResult<Option<Review>> {
        Ok(self.lock().reviews.get(&(customer_id, order_id)).cloned())
    }

    async fn upsert_review(
        &self,
        order: &Order,
        submission: &RatingSubmission,
        now: DateTime<Utc>,
    ) -> StoreResult<Review> {
        let mut tables = self.lock();
        let key = (order.customer_id, order.id);

        let mut review = tables
            .reviews
            .get(&key)
            .cloned()
            .unwrap_or_else(|| Review::for_order(order, now));
        review.apply(submission, now);

        let stored = tables
            .orders
            .get_mut(&order.id)
            .ok_or_else(|| StoreError::Missing(format!("order {}", order.id)))?;
        stored.ratings = Some(review.ratings());
        stored.updated_at = now;

        tables.reviews.insert(key, review.clone());
        Ok(review)
    }

    async fn delete_review(
        &self,
        customer_id: Uuid,
        order_id: Uuid,
        now: DateTime<Utc>,
    ) -> StoreResult<bool> {
        let mut tables = self.lock();
        if tables.reviews.remove(&(customer_id, order_id)).is_none() {
            return Ok(false);
        }
        if let Some(order) = tables.orders.get_mut(&order_id) {
            order.ratings = None;
            order.updated_at = now;
        }
        Ok(true)
    }
}
