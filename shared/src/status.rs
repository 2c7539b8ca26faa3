use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OrderStatus {
    Pending,
    Confirmed,
    Preparing,
    Ready,
    PickedByDelivery,
    OutForDelivery,
    Delivered,
    Cancelled,
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum TransitionError {
    #[error("order is already {0}")]
    Terminal(OrderStatus),

    #[error("cannot move order from {from} to {to}")]
    Illegal { from: OrderStatus, to: OrderStatus },
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown order status: {0}")]
pub struct UnknownStatus(pub String);

impl OrderStatus {
    pub const ALL: [OrderStatus; 8] = [
        OrderStatus::Pending,
        OrderStatus::Confirmed,
        OrderStatus::Preparing,
        OrderStatus::Ready,
        OrderStatus::PickedByDelivery,
        OrderStatus::OutForDelivery,
        OrderStatus::Delivered,
        OrderStatus::Cancelled,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            OrderStatus::Pending => "pending",
            OrderStatus::Confirmed => "confirmed",
            OrderStatus::Preparing => "preparing",
            OrderStatus::Ready => "ready",
            OrderStatus::PickedByDelivery => "picked_by_delivery",
            OrderStatus::OutForDelivery => "out_for_delivery",
            OrderStatus::Delivered => "delivered",
            OrderStatus::Cancelled => "cancelled",
        }
    }

    pub fn is_terminal(self) -> bool {
        matches!(self, OrderStatus::Delivered | OrderStatus::Cancelled)
    }

    /// Statuses reachable in a single step. This table is the only place
    /// order progression is defined.
    pub fn allowed_targets(self) -> &'static [OrderStatus] {
        use OrderStatus::*;
        match self {
            Pending => &[Confirmed, Cancelled],
            Confirmed => &[Preparing, Cancelled],
            Preparing => &[Ready, Cancelled],
            Ready => &[PickedByDelivery, Cancelled],
            PickedByDelivery => &[OutForDelivery, Cancelled],
            OutForDelivery => &[Delivered, Cancelled],
            Delivered | Cancelled => &[],
        }
    }

    pub fn can_transition_to(self, target: OrderStatus) -> bool {
        self.allowed_targets().contains(&target)
    }

    /// Validates a move from `self` to `target`.
    pub fn transition(self, target: OrderStatus) -> Result<OrderStatus, TransitionError> {
        if self.is_terminal() {
            return Err(TransitionError::Terminal(self));
        }
        if !self.can_transition_to(target) {
            return Err(TransitionError::Illegal {
                from: self,
                to: target,
            });
        }
        Ok(target)
    }
}

impl fmt::Display for OrderStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for OrderStatus {
    type Err = UnknownStatus;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        OrderStatus::ALL
            .into_iter()
            .find(|status| status.as_str() == s)
            .ok_or_else(|| UnknownStatus(s.to_string()))
    }
}

/// First time an order reached each status.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct OrderTimeline {
    pub placed_at: Option<DateTime<Utc>>,
    pub confirmed_at: Option<DateTime<Utc>>,
    pub preparing_at: Option<DateTime<Utc>>,
    pub ready_at: Option<DateTime<Utc>>,
    pub picked_up_at: Option<DateTime<Utc>>,
    pub out_for_delivery_at: Option<DateTime<Utc>>,
    pub delivered_at: Option<DateTime<Utc>>,
    pub cancelled_at: Option<DateTime<Utc>>,
}

impl OrderTimeline {
    pub fn started(at: DateTime<Utc>) -> Self {
        Self {
            placed_at: Some(at),
            ..Self::default()
        }
    }

    fn slot_mut(&mut self, status: OrderStatus) -> &mut Option<DateTime<Utc>> {
        match status {
            OrderStatus::Pending => &mut self.placed_at,
            OrderStatus::Confirmed => &mut self.confirmed_at,
            OrderStatus::Preparing => &mut self.preparing_at,
            OrderStatus::Ready => &mut self.ready_at,
            OrderStatus::PickedByDelivery => &mut self.picked_up_at,
            OrderStatus::OutForDelivery => &mut self.out_for_delivery_at,
            OrderStatus::Delivered => &mut self.delivered_at,
            OrderStatus::Cancelled => &mut self.cancelled_at,
        }
    }

    pub fn get(&self, status: OrderStatus) -> Option<DateTime<Utc>> {
        match status {
            OrderStatus::Pending => self.placed_at,
            OrderStatus::Confirmed => self.confirmed_at,
            OrderStatus::Preparing => self.preparing_at,
            OrderStatus::Ready => self.ready_at,
            OrderStatus::PickedByDelivery => self.picked_up_at,
            OrderStatus::OutForDelivery => self.out_for_delivery_at,
            OrderStatus::Delivered => self.delivered_at,
            OrderStatus::Cancelled => self.cancelled_at,
        }
    }

    /// Records `at` for `status` unless the slot is already filled.
    pub fn stamp(&mut self, status: OrderStatus, at: DateTime<Utc>) {
        let slot = self.slot_mut(status);
        if slot.is_none() {
            *slot = Some(at);
        }
    }
}
