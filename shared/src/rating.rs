use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::order::{check_len, Order};
use crate::pricing::Money;
use crate::status::OrderStatus;

pub const MIN_SCORE: u8 = 1;
pub const MAX_SCORE: u8 = 5;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RatingEntry {
    pub score: u8,
    pub comment: Option<String>,
    pub rated_at: DateTime<Utc>,
}

/// Ratings mirrored onto the order.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrderRatings {
    pub restaurant: Option<RatingEntry>,
    pub delivery: Option<RatingEntry>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RatingInput {
    pub score: u8,
    #[serde(default)]
    pub comment: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RatingSubmission {
    #[serde(default)]
    pub restaurant: Option<RatingInput>,
    #[serde(default)]
    pub delivery: Option<RatingInput>,
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum RatingError {
    #[error("order belongs to another customer")]
    NotOwner,

    #[error("only delivered orders can be rated, order is {0}")]
    NotDelivered(OrderStatus),

    #[error("order has no delivery person to rate")]
    NoDeliveryPerson,

    #[error("submission must include a restaurant or delivery rating")]
    EmptySubmission,

    #[error("score {0} is outside 1..=5")]
    ScoreOutOfRange(u8),

    #[error("comment is too long")]
    CommentTooLong,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Review {
    pub id: Uuid,
    pub customer_id: Uuid,
    pub order_id: Uuid,
    pub restaurant_id: Uuid,
    pub delivery_person_id: Option<Uuid>,
    pub order_amount: Money,
    pub batch_number: String,
    pub restaurant: Option<RatingEntry>,
    pub delivery: Option<RatingEntry>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl RatingInput {
    fn validate(&self) -> Result<(), RatingError> {
        if !(MIN_SCORE..=MAX_SCORE).contains(&self.score) {
            return Err(RatingError::ScoreOutOfRange(self.score));
        }
        check_len("comment", self.comment.as_deref()).map_err(|_| RatingError::CommentTooLong)
    }

    fn entry(&self, at: DateTime<Utc>) -> RatingEntry {
        RatingEntry {
            score: self.score,
            comment: self.comment.clone(),
            rated_at: at,
        }
    }
}

impl RatingSubmission {
    pub fn validate(&self) -> Result<(), RatingError> {
        if self.restaurant.is_none() && self.delivery.is_none() {
            return Err(RatingError::EmptySubmission);
        }
        if let Some(input) = &self.restaurant {
            input.validate()?;
        }
        if let Some(input) = &self.delivery {
            input.validate()?;
        }
        Ok(())
    }
}

/// Decides whether `customer_id` may rate `order` with `submission`.
pub fn check_eligibility(
    order: &Order,
    customer_id: Uuid,
    submission: &RatingSubmission,
) -> Result<(), RatingError> {
    if order.customer_id != customer_id {
        return Err(RatingError::NotOwner);
    }
    if order.status != OrderStatus::Delivered {
        return Err(RatingError::NotDelivered(order.status));
    }
    submission.validate()?;
    if submission.delivery.is_some() && order.delivery_person_id.is_none() {
        return Err(RatingError::NoDeliveryPerson);
    }
    Ok(())
}

impl Review {
    /// Starts an empty review carrying the order's denormalized fields.
    pub fn for_order(order: &Order, now: DateTime<Utc>) -> Self {
        Self {
            id: Uuid::new_v4(),
            customer_id: order.customer_id,
            order_id: order.id,
            restaurant_id: order.restaurant_id,
            delivery_person_id: order.delivery_person_id,
            order_amount: order.totals.total_amount,
            batch_number: order.batch_number.clone(),
            restaurant: None,
            delivery: None,
            created_at: now,
            updated_at: now,
        }
    }

    /// Overwrites only the ratings present in `submission`.
    pub fn apply(&mut self, submission: &RatingSubmission, now: DateTime<Utc>) {
        if let Some(input) = &submission.restaurant {
            self.restaurant = Some(input.entry(now));
        }
        if let Some(input) = &submission.delivery {
            self.delivery = Some(input.entry(now));
        }
        self.updated_at = now;
    }

    pub fn ratings(&self) -> OrderRatings {
        OrderRatings {
            restaurant: self.restaurant.clone(),
            delivery: self.delivery.clone(),
        }
    }
}
