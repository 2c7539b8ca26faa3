use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::pricing::{LineItem, OrderTotals};
use crate::rating::OrderRatings;
use crate::status::{OrderStatus, OrderTimeline, TransitionError};

const MAX_TEMPERATURE_CELSIUS: f64 = 120.0;
const MIN_TEMPERATURE_CELSIUS: f64 = -40.0;
const MAX_NOTE_LEN: usize = 500;

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ValidationError {
    #[error("{0} must not be empty")]
    Empty(&'static str),

    #[error("{field} is longer than {max} characters")]
    TooLong { field: &'static str, max: usize },

    #[error("temperature {0} is outside the accepted range")]
    TemperatureOutOfRange(String),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DeliveryAddress {
    pub street: String,
    pub city: String,
    pub postal_code: String,
    #[serde(default)]
    pub instructions: Option<String>,
}

impl DeliveryAddress {
    pub fn validate(&self) -> Result<(), ValidationError> {
        if self.street.trim().is_empty() {
            return Err(ValidationError::Empty("street"));
        }
        if self.city.trim().is_empty() {
            return Err(ValidationError::Empty("city"));
        }
        if self.postal_code.trim().is_empty() {
            return Err(ValidationError::Empty("postal_code"));
        }
        check_len("instructions", self.instructions.as_deref())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PaymentMethod {
    CashOnDelivery,
    Card,
    Wallet,
}

impl PaymentMethod {
    pub fn as_str(self) -> &'static str {
        match self {
            PaymentMethod::CashOnDelivery => "cash_on_delivery",
            PaymentMethod::Card => "card",
            PaymentMethod::Wallet => "wallet",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "cash_on_delivery" => Some(PaymentMethod::CashOnDelivery),
            "card" => Some(PaymentMethod::Card),
            "wallet" => Some(PaymentMethod::Wallet),
            _ => None,
        }
    }
}

/// Restaurant-entered traceability data.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct BatchTracking {
    pub quality_checked: Option<bool>,
    pub temperature_celsius: Option<f64>,
    pub packed_by: Option<String>,
    pub notes: Option<String>,
    pub updated_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct BatchTrackingUpdate {
    #[serde(default)]
    pub quality_checked: Option<bool>,
    #[serde(default)]
    pub temperature_celsius: Option<f64>,
    #[serde(default)]
    pub packed_by: Option<String>,
    #[serde(default)]
    pub notes: Option<String>,
}

impl BatchTrackingUpdate {
    pub fn validate(&self) -> Result<(), ValidationError> {
        if let Some(t) = self.temperature_celsius {
            if !t.is_finite() || !(MIN_TEMPERATURE_CELSIUS..=MAX_TEMPERATURE_CELSIUS).contains(&t) {
                return Err(ValidationError::TemperatureOutOfRange(t.to_string()));
            }
        }
        check_len("packed_by", self.packed_by.as_deref())?;
        check_len("notes", self.notes.as_deref())
    }

    pub fn is_empty(&self) -> bool {
        self.quality_checked.is_none()
            && self.temperature_celsius.is_none()
            && self.packed_by.is_none()
            && self.notes.is_none()
    }
}

impl BatchTracking {
    /// Overwrites only the fields present in `update`.
    pub fn apply(&mut self, update: &BatchTrackingUpdate, at: DateTime<Utc>) {
        if let Some(v) = update.quality_checked {
            self.quality_checked = Some(v);
        }
        if let Some(v) = update.temperature_celsius {
            self.temperature_celsius = Some(v);
        }
        if let Some(v) = &update.packed_by {
            self.packed_by = Some(v.clone());
        }
        if let Some(v) = &update.notes {
            self.notes = Some(v.clone());
        }
        self.updated_at = Some(at);
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Order {
    pub id: Uuid,
    pub customer_id: Uuid,
    pub restaurant_id: Uuid,
    pub delivery_person_id: Option<Uuid>,
    pub items: Vec<LineItem>,
    pub delivery_address: DeliveryAddress,
    pub payment_method: PaymentMethod,
    pub special_instructions: Option<String>,
    pub totals: OrderTotals,
    pub status: OrderStatus,
    pub batch_number: String,
    pub timeline: OrderTimeline,
    pub batch_tracking: BatchTracking,
    pub ratings: Option<OrderRatings>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Checkout input after authorization and pricing.
#[derive(Debug, Clone)]
pub struct NewOrder {
    pub customer_id: Uuid,
    pub restaurant_id: Uuid,
    pub items: Vec<LineItem>,
    pub delivery_address: DeliveryAddress,
    pub payment_method: PaymentMethod,
    pub special_instructions: Option<String>,
    pub totals: OrderTotals,
}

impl Order {
    pub fn place(new: NewOrder, batch_number: String, now: DateTime<Utc>) -> Self {
        Self {
            id: Uuid::new_v4(),
            customer_id: new.customer_id,
            restaurant_id: new.restaurant_id,
            delivery_person_id: None,
            items: new.items,
            delivery_address: new.delivery_address,
            payment_method: new.payment_method,
            special_instructions: new.special_instructions,
            totals: new.totals,
            status: OrderStatus::Pending,
            batch_number,
            timeline: OrderTimeline::started(now),
            batch_tracking: BatchTracking::default(),
            ratings: None,
            created_at: now,
            updated_at: now,
        }
    }

    /// Moves the order to `target` through the transition table and stamps
    /// the timeline.
    pub fn advance(&mut self, target: OrderStatus, now: DateTime<Utc>) -> Result<(), TransitionError> {
        self.status = self.status.transition(target)?;
        self.timeline.stamp(target, now);
        self.updated_at = now;
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Restaurant {
    pub id: Uuid,
    pub owner_id: Uuid,
    pub name: String,
    pub address: Option<String>,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Aggregate of restaurant scores across reviews.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct RatingSummary {
    pub average: Option<f64>,
    pub count: i64,
}

pub fn check_len(field: &'static str, value: Option<&str>) -> Result<(), ValidationError> {
    match value {
        Some(v) if v.chars().count() > MAX_NOTE_LEN => Err(ValidationError::TooLong {
            field,
            max: MAX_NOTE_LEN,
        }),
        _ => Ok(()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pricing::{Money, PricingPolicy};
    use chrono::Duration;

    fn new_order() -> NewOrder {
        let items = vec![LineItem {
            menu_item_id: Uuid::new_v4(),
            name: "Pad Thai".to_string(),
            quantity: 2,
            unit_price: Money::from_cents(1150),
        }];
        let totals = PricingPolicy::default().totals(&items, Money::ZERO).unwrap();
        NewOrder {
            customer_id: Uuid::new_v4(),
            restaurant_id: Uuid::new_v4(),
            items,
            delivery_address: DeliveryAddress {
                street: "1 Main St".to_string(),
                city: "Springfield".to_string(),
                postal_code: "12345".to_string(),
                instructions: None,
            },
            payment_method: PaymentMethod::Card,
            special_instructions: None,
            totals,
        }
    }

    #[test]
    fn test_place_starts_pending() {
        let now = Utc::now();
        let order = Order::place(new_order(), "BATCH-AAAAAA".to_string(), now);
        assert_eq!(order.status, OrderStatus::Pending);
        assert_eq!(order.timeline.placed_at, Some(now));
        assert!(order.ratings.is_none());
    }

    #[test]
    fn test_advance_stamps_timeline() {
        let now = Utc::now();
        let mut order = Order::place(new_order(), "BATCH-AAAAAA".to_string(), now);
        let later = now + Duration::minutes(3);

        order.advance(OrderStatus::Confirmed, later).unwrap();

        assert_eq!(order.status, OrderStatus::Confirmed);
        assert_eq!(order.timeline.confirmed_at, Some(later));
        assert_eq!(order.updated_at, later);
        assert!(order.advance(OrderStatus::Delivered, later).is_err());
        assert_eq!(order.status, OrderStatus::Confirmed);
    }

    #[test]
    fn test_batch_tracking_partial_update() {
        let now = Utc::now();
        let mut tracking = BatchTracking {
            packed_by: Some("Ana".to_string()),
            ..BatchTracking::default()
        };
        let update = BatchTrackingUpdate {
            temperature_celsius: Some(63.5),
            ..BatchTrackingUpdate::default()
        };

        update.validate().unwrap();
        tracking.apply(&update, now);

        assert_eq!(tracking.packed_by.as_deref(), Some("Ana"));
        assert_eq!(tracking.temperature_celsius, Some(63.5));
        assert_eq!(tracking.updated_at, Some(now));
    }

    #[test]
    fn test_rejects_implausible_temperature() {
        let update = BatchTrackingUpdate {
            temperature_celsius: Some(400.0),
            ..BatchTrackingUpdate::default()
        };
        assert!(matches!(
            update.validate(),
            Err(ValidationError::TemperatureOutOfRange(_))
        ));
    }

    #[test]
    fn test_address_requires_street() {
        let mut address = new_order().delivery_address;
        address.street = "  ".to_string();
        assert_eq!(address.validate(), Err(ValidationError::Empty("street")));
    }
}
