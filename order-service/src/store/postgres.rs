use anyhow::anyhow;
use async_trait::async_trait;
use bigdecimal::BigDecimal;
use chrono::{DateTime, Utc};
use diesel::dsl::{avg, count, exists};
use diesel::prelude::*;
use diesel::result::{DatabaseErrorKind, Error as DieselError};
use diesel_async::pooled_connection::bb8::Pool;
use diesel_async::pooled_connection::PoolError;
use diesel_async::{AsyncConnection, AsyncPgConnection, RunQueryDsl};
use num_traits::ToPrimitive;
use shared::*;
use tracing::debug;
use uuid::Uuid;

use super::{OrderFilter, OrderScope, Store, StoreError, StoreResult};
use crate::models::*;
use crate::schema::*;

pub type DbPool = Pool<AsyncPgConnection>;

#[derive(Clone)]
pub struct PgStore {
    pool: DbPool,
}

impl PgStore {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }
}

impl From<DieselError> for StoreError {
    fn from(err: DieselError) -> Self {
        match err {
            DieselError::DatabaseError(DatabaseErrorKind::UniqueViolation, info) => {
                StoreError::Duplicate(info.message().to_string())
            }
            other => StoreError::Backend(other.into()),
        }
    }
}

impl From<bb8::RunError<PoolError>> for StoreError {
    fn from(err: bb8::RunError<PoolError>) -> Self {
        StoreError::Backend(anyhow!("connection pool: {}", err))
    }
}

fn to_json<T: serde::Serialize>(value: &T) -> StoreResult<serde_json::Value> {
    serde_json::to_value(value).map_err(|e| StoreError::Backend(e.into()))
}

#[async_trait]
impl Store for PgStore {
    async fn insert_restaurant(&self, restaurant: &Restaurant) -> StoreResult<()> {
        let mut conn = self.pool.get().await?;

        diesel::insert_into(restaurants::table)
            .values(&DbRestaurant::from(restaurant))
            .execute(&mut conn)
            .await?;

        Ok(())
    }

    async fn find_restaurant(&self, id: Uuid) -> StoreResult<Option<Restaurant>> {
        let mut conn = self.pool.get().await?;

        let row = restaurants::table
            .find(id)
            .select(DbRestaurant::as_select())
            .first(&mut conn)
            .await
            .optional()?;

        Ok(row.map(Restaurant::from))
    }

    async fn restaurant_rating_summary(&self, restaurant_id: Uuid) -> StoreResult<RatingSummary> {
        let mut conn = self.pool.get().await?;

        let (average, count): (Option<BigDecimal>, i64) = reviews::table
            .filter(reviews::restaurant_id.eq(restaurant_id))
            .filter(reviews::restaurant_rating.is_not_null())
            .select((
                avg(reviews::restaurant_rating),
                count(reviews::restaurant_rating),
            ))
            .get_result(&mut conn)
            .await?;

        Ok(RatingSummary {
            average: average
                .and_then(|a| a.to_f64())
                .map(|a| (a * 100.0).round() / 100.0),
            count,
        })
    }

    async fn insert_order(&self, order: &Order) -> StoreResult<()> {
        let row = DbOrder::try_from(order)?;
        let mut conn = self.pool.get().await?;

        diesel::insert_into(orders::table)
            .values(&row)
            .execute(&mut conn)
            .await?;

        Ok(())
    }

    async fn find_order(&self, id: Uuid) -> StoreResult<Option<Order>> {
        let mut conn = self.pool.get().await?;

        let row = orders::table
            .find(id)
            .select(DbOrder::as_select())
            .first(&mut conn)
            .await
            .optional()?;

        Ok(row.map(Order::try_from).transpose()?)
    }

    async fn find_order_by_batch(&self, batch_number: &str) -> StoreResult<Option<Order>> {
        let mut conn = self.pool.get().await?;

        let row = orders::table
            .filter(orders::batch_number.eq(batch_number))
            .select(DbOrder::as_select())
            .first(&mut conn)
            .await
            .optional()?;

        Ok(row.map(Order::try_from).transpose()?)
    }

    async fn batch_number_exists(&self, batch_number: &str) -> StoreResult<bool> {
        let mut conn = self.pool.get().await?;

        let taken = diesel::select(exists(
            orders::table.filter(orders::batch_number.eq(batch_number)),
        ))
        .get_result::<bool>(&mut conn)
        .await?;

        Ok(taken)
    }

    async fn list_orders(&self, scope: OrderScope, filter: OrderFilter) -> StoreResult<Vec<Order>> {
        let mut conn = self.pool.get().await?;

        let mut query = orders::table
            .inner_join(restaurants::table)
            .select(DbOrder::as_select())
            .order(orders::created_at.desc())
            .limit(filter.limit)
            .into_boxed();

        query = match scope {
            OrderScope::All => query,
            OrderScope::Customer(id) => query.filter(orders::customer_id.eq(id)),
            OrderScope::RestaurantOwner(id) => query.filter(restaurants::owner_id.eq(id)),
            OrderScope::DeliveryPerson(id) => query.filter(
                orders::delivery_person_id.eq(id).or(orders::status
                    .eq(OrderStatus::Ready.as_str())
                    .and(orders::delivery_person_id.is_null())),
            ),
        };

        if let Some(status) = filter.status {
            query = query.filter(orders::status.eq(status.as_str()));
        }

        let rows = query.load::<DbOrder>(&mut conn).await?;
        debug!("Loaded {} orders for {:?}", rows.len(), scope);

        rows.into_iter()
            .map(|row| Order::try_from(row).map_err(StoreError::from))
            .collect()
    }

    async fn save_order(&self, order: &Order) -> StoreResult<()> {
        let changes = OrderChanges::try_from(order)?;
        let mut conn = self.pool.get().await?;

        let updated = diesel::update(orders::table.find(order.id))
            .set(&changes)
            .execute(&mut conn)
            .await?;

        if updated == 0 {
            return Err(StoreError::Missing(format!("order {}", order.id)));
        }
        Ok(())
    }

    async fn find_review(&self, customer_id: Uuid, order_id: Uuid) -> StoreResult<Option<Review>> {
        let mut conn = self.pool.get().await?;

        let row = reviews::table
            .filter(reviews::customer_id.eq(customer_id))
            .filter(reviews::order_id.eq(order_id))
            .select(DbReview::as_select())
            .first(&mut conn)
            .await
            .optional()?;

        Ok(row.map(Review::try_from).transpose()?)
    }

    async fn upsert_review(
        &self,
        order: &Order,
        submission: &RatingSubmission,
        now: DateTime<Utc>,
    ) -> StoreResult<Review> {
        let mut conn = self.pool.get().await?;
        upsert_review_tx(&mut conn, order.clone(), submission.clone(), now).await
    }

    async fn delete_review(
        &self,
        customer_id: Uuid,
        order_id: Uuid,
        now: DateTime<Utc>,
    ) -> StoreResult<bool> {
        let mut conn = self.pool.get().await?;
        delete_review_tx(&mut conn, customer_id, order_id, now).await
    }
}

async fn upsert_review_tx(
    conn: &mut AsyncPgConnection,
    order: Order,
    submission: RatingSubmission,
    now: DateTime<Utc>,
) -> StoreResult<Review> {
    conn.transaction::<_, StoreError, _>(|conn| {
        Box::pin(async move {
            let existing = reviews::table
                .filter(reviews::customer_id.eq(order.customer_id))
                .filter(reviews::order_id.eq(order.id))
                .select(DbReview::as_select())
                .for_update()
                .first(conn)
                .await
                .optional()?;

            let is_new = existing.is_none();
            let mut review = match existing {
                Some(row) => Review::try_from(row)?,
                None => Review::for_order(&order, now),
            };
            review.apply(&submission, now);
            let row = DbReview::from(&review);

            if is_new {
                diesel::insert_into(reviews::table)
                    .values(&row)
                    .execute(conn)
                    .await?;
            } else {
                diesel::update(reviews::table.find(review.id))
                    .set(&row)
                    .execute(conn)
                    .await?;
            }

            let ratings = to_json(&review.ratings())?;
            let updated = diesel::update(orders::table.find(order.id))
                .set((
                    orders::ratings.eq(Some(ratings)),
                    orders::updated_at.eq(now),
                ))
                .execute(conn)
                .await?;
            if updated == 0 {
                return Err(StoreError::Missing(format!("order {}", order.id)));
            }

            Ok(review)
        })
    })
    .await
}

async fn delete_review_tx(
    conn: &mut AsyncPgConnection,
    customer_id: Uuid,
    order_id: Uuid,
    now: DateTime<Utc>,
) -> StoreResult<bool> {
    conn.transaction::<_, StoreError, _>(|conn| {
        Box::pin(async move {
            let deleted = diesel::delete(
                reviews::table
                    .filter(reviews::customer_id.eq(customer_id))
                    .filter(reviews::order_id.eq(order_id)),
            )
            .execute(conn)
            .await?;

            if deleted == 0 {
                return Ok(false);
            }

            diesel::update(orders::table.find(order_id))
                .set((
                    orders::ratings.eq(None::<serde_json::Value>),
                    orders::updated_at.eq(now),
                ))
                .execute(conn)
                .await?;

            Ok(true)
        })
    })
    .await
}
