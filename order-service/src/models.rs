use anyhow::{anyhow, Result};
use bigdecimal::BigDecimal;
use chrono::{DateTime, Utc};
use diesel::prelude::*;
use num_traits::ToPrimitive;
use shared::*;
use uuid::Uuid;

#[derive(Debug, Clone, Queryable, Selectable, Insertable)]
#[diesel(table_name = crate::schema::orders)]
#[diesel(check_for_backend(diesel::pg::Pg))]
pub struct DbOrder {
    pub id: Uuid,
    pub customer_id: Uuid,
    pub restaurant_id: Uuid,
    pub delivery_person_id: Option<Uuid>,
    pub items: serde_json::Value,
    pub delivery_address: serde_json::Value,
    pub payment_method: String,
    pub special_instructions: Option<String>,
    pub subtotal: BigDecimal,
    pub delivery_fee: BigDecimal,
    pub tax: BigDecimal,
    pub discount: BigDecimal,
    pub total_amount: BigDecimal,
    pub status: String,
    pub batch_number: String,
    pub order_timeline: serde_json::Value,
    pub batch_tracking: serde_json::Value,
    pub ratings: Option<serde_json::Value>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Columns an order update may touch. Everything else is fixed at checkout,
/// and `ratings` belongs to the review transactions.
#[derive(Debug, Clone, AsChangeset)]
#[diesel(table_name = crate::schema::orders)]
#[diesel(treat_none_as_null = true)]
pub struct OrderChanges {
    pub delivery_person_id: Option<Uuid>,
    pub status: String,
    pub order_timeline: serde_json::Value,
    pub batch_tracking: serde_json::Value,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Queryable, Selectable, Insertable)]
#[diesel(table_name = crate::schema::restaurants)]
#[diesel(check_for_backend(diesel::pg::Pg))]
pub struct DbRestaurant {
    pub id: Uuid,
    pub owner_id: Uuid,
    pub name: String,
    pub address: Option<String>,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Queryable, Selectable, Insertable, AsChangeset)]
#[diesel(table_name = crate::schema::reviews)]
#[diesel(check_for_backend(diesel::pg::Pg))]
#[diesel(treat_none_as_null = true)]
pub struct DbReview {
    pub id: Uuid,
    pub customer_id: Uuid,
    pub order_id: Uuid,
    pub restaurant_id: Uuid,
    pub delivery_person_id: Option<Uuid>,
    pub order_amount: BigDecimal,
    pub batch_number: String,
    pub restaurant_rating: Option<i16>,
    pub restaurant_comment: Option<String>,
    pub restaurant_rated_at: Option<DateTime<Utc>>,
    pub delivery_rating: Option<i16>,
    pub delivery_comment: Option<String>,
    pub delivery_rated_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

pub fn money_to_decimal(money: Money) -> BigDecimal {
    (BigDecimal::from(money.cents()) / BigDecimal::from(100)).with_scale(2)
}

pub fn decimal_to_money(value: &BigDecimal) -> Result<Money> {
    (value.clone() * BigDecimal::from(100))
        .round(0)
        .to_i64()
        .map(Money::from_cents)
        .ok_or_else(|| anyhow!("amount out of range: {}", value))
}

impl TryFrom<&Order> for DbOrder {
    type Error = anyhow::Error;

    fn try_from(order: &Order) -> Result<Self, Self::Error> {
        Ok(Self {
            id: order.id,
            customer_id: order.customer_id,
            restaurant_id: order.restaurant_id,
            delivery_person_id: order.delivery_person_id,
            items: serde_json::to_value(&order.items)?,
            delivery_address: serde_json::to_value(&order.delivery_address)?,
            payment_method: order.payment_method.as_str().to_string(),
            special_instructions: order.special_instructions.clone(),
            subtotal: money_to_decimal(order.totals.subtotal),
            delivery_fee: money_to_decimal(order.totals.delivery_fee),
            tax: money_to_decimal(order.totals.tax),
            discount: money_to_decimal(order.totals.discount),
            total_amount: money_to_decimal(order.totals.total_amount),
            status: order.status.as_str().to_string(),
            batch_number: order.batch_number.clone(),
            order_timeline: serde_json::to_value(&order.timeline)?,
            batch_tracking: serde_json::to_value(&order.batch_tracking)?,
            ratings: order.ratings.as_ref().map(serde_json::to_value).transpose()?,
            created_at: order.created_at,
            updated_at: order.updated_at,
        })
    }
}

impl TryFrom<&Order> for OrderChanges {
    type Error = anyhow::Error;

    fn try_from(order: &Order) -> Result<Self, Self::Error> {
        Ok(Self {
            delivery_person_id: order.delivery_person_id,
            status: order.status.as_str().to_string(),
            order_timeline: serde_json::to_value(&order.timeline)?,
            batch_tracking: serde_json::to_value(&order.batch_tracking)?,
            updated_at: order.updated_at,
        })
    }
}

impl TryFrom<DbOrder> for Order {
    type Error = anyhow::Error;

    fn try_from(row: DbOrder) -> Result<Self, Self::Error> {
        let payment_method = PaymentMethod::parse(&row.payment_method)
            .ok_or_else(|| anyhow!("unknown payment method: {}", row.payment_method))?;

        Ok(Self {
            id: row.id,
            customer_id: row.customer_id,
            restaurant_id: row.restaurant_id,
            delivery_person_id: row.delivery_person_id,
            items: serde_json::from_value(row.items)?,
            delivery_address: serde_json::from_value(row.delivery_address)?,
            payment_method,
            special_instructions: row.special_instructions,
            totals: OrderTotals {
                subtotal: decimal_to_money(&row.subtotal)?,
                delivery_fee: decimal_to_money(&row.delivery_fee)?,
                tax: decimal_to_money(&row.tax)?,
                discount: decimal_to_money(&row.discount)?,
                total_amount: decimal_to_money(&row.total_amount)?,
            },
            status: row.status.parse()?,
            batch_number: row.batch_number,
            timeline: serde_json::from_value(row.order_timeline)?,
            batch_tracking: serde_json::from_value(row.batch_tracking)?,
            ratings: row.ratings.map(serde_json::from_value).transpose()?,
            created_at: row.created_at,
            updated_at: row.updated_at,
        })
    }
}

impl From<&Restaurant> for DbRestaurant {
    fn from(restaurant: &Restaurant) -> Self {
        Self {
            id: restaurant.id,
            owner_id: restaurant.owner_id,
            name: restaurant.name.clone(),
            address: restaurant.address.clone(),
            is_active: restaurant.is_active,
            created_at: restaurant.created_at,
            updated_at: restaurant.updated_at,
        }
    }
}

impl From<DbRestaurant> for Restaurant {
    fn from(row: DbRestaurant) -> Self {
        Self {
            id: row.id,
            owner_id: row.owner_id,
            name: row.name,
            address: row.address,
            is_active: row.is_active,
            created_at: row.created_at,
            updated_at: row.updated_at,
        }
    }
}

impl From<&Review> for DbReview {
    fn from(review: &Review) -> Self {
        let (restaurant_rating, restaurant_comment, restaurant_rated_at) =
            split_entry(review.restaurant.as_ref());
        let (delivery_rating, delivery_comment, delivery_rated_at) =
            split_entry(review.delivery.as_ref());

        Self {
            id: review.id,
            customer_id: review.customer_id,
            order_id: review.order_id,
            restaurant_id: review.restaurant_id,
            delivery_person_id: review.delivery_person_id,
            order_amount: money_to_decimal(review.order_amount),
            batch_number: review.batch_number.clone(),
            restaurant_rating,
            restaurant_comment,
            restaurant_rated_at,
            delivery_rating,
            delivery_comment,
            delivery_rated_at,
            created_at: review.created_at,
            updated_at: review.updated_at,
        }
    }
}

impl TryFrom<DbReview> for Review {
    type Error = anyhow::Error;

    fn try_from(row: DbReview) -> Result<Self, Self::Error> {
        Ok(Self {
            id: row.id,
            customer_id: row.customer_id,
            order_id: row.order_id,
            restaurant_id: row.restaurant_id,
            delivery_person_id: row.delivery_person_id,
            order_amount: decimal_to_money(&row.order_amount)?,
            batch_number: row.batch_number,
            restaurant: join_entry(
                row.restaurant_rating,
                row.restaurant_comment,
                row.restaurant_rated_at,
            )?,
            delivery: join_entry(row.delivery_rating, row.delivery_comment, row.delivery_rated_at)?,
            created_at: row.created_at,
            updated_at: row.updated_at,
        })
    }
}

fn split_entry(
    entry: Option<&RatingEntry>,
) -> (Option<i16>, Option<String>, Option<DateTime<Utc>>) {
    match entry {
        Some(e) => (Some(i16::from(e.score)), e.comment.clone(), Some(e.rated_at)),
        None => (None, None, None),
    }
}

fn join_entry(
    score: Option<i16>,
    comment: Option<String>,
    rated_at: Option<DateTime<Utc>>,
) -> Result<Option<RatingEntry>> {
    match (score, rated_at) {
        (Some(score), Some(rated_at)) => Ok(Some(RatingEntry {
            score: u8::try_from(score)?,
            comment,
            rated_at,
        })),
        (None, _) => Ok(None),
        (Some(_), None) => Err(anyhow!("rating without timestamp")),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_money_decimal_conversion() {
        let money = Money::from_cents(7252);
        let decimal = money_to_decimal(money);
        assert_eq!(decimal.to_string(), "72.52");
        assert_eq!(decimal_to_money(&decimal).unwrap(), money);
    }

    #[test]
    fn test_review_row_keeps_missing_side_empty() {
        let now = Utc::now();
        let review = Review {
            id: Uuid::new_v4(),
            customer_id: Uuid::new_v4(),
            order_id: Uuid::new_v4(),
            restaurant_id: Uuid::new_v4(),
            delivery_person_id: None,
            order_amount: Money::from_cents(1999),
            batch_number: "BATCH-Q1W2E3".to_string(),
            restaurant: Some(RatingEntry {
                score: 4,
                comment: None,
                rated_at: now,
            }),
            delivery: None,
            created_at: now,
            updated_at: now,
        };

        let row = DbReview::from(&review);
        assert_eq!(row.restaurant_rating, Some(4));
        assert_eq!(row.delivery_rating, None);

        let back = Review::try_from(row).unwrap();
        assert_eq!(back, review);
    }
}
