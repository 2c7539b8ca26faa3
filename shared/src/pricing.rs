use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;
use std::ops::{Add, Sub};
use uuid::Uuid;

/// An amount of money in integer cents. Serialized as a decimal number of
/// currency units (`12.99`).
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Money(i64);

impl Money {
    pub const ZERO: Money = Money(0);
    /// Largest amount an order column stores (`NUMERIC(12, 2)`).
    pub const MAX: Money = Money(999_999_999_999);

    pub fn from_cents(cents: i64) -> Self {
        Money(cents)
    }

    /// Rounds a currency amount to the nearest cent. Returns `None` for
    /// non-finite or out of range values.
    pub fn from_major(amount: f64) -> Option<Self> {
        if !amount.is_finite() {
            return None;
        }
        let cents = (amount * 100.0).round();
        if cents.abs() >= i64::MAX as f64 {
            return None;
        }
        Some(Money(cents as i64))
    }

    pub fn cents(self) -> i64 {
        self.0
    }

    pub fn as_major(self) -> f64 {
        self.0 as f64 / 100.0
    }

    pub fn is_negative(self) -> bool {
        self.0 < 0
    }

    pub fn checked_mul(self, quantity: u32) -> Option<Money> {
        self.0.checked_mul(i64::from(quantity)).map(Money)
    }

    pub fn checked_add(self, rhs: Money) -> Option<Money> {
        self.0.checked_add(rhs.0).map(Money)
    }
}

impl Add for Money {
    type Output = Money;

    fn add(self, rhs: Money) -> Money {
        Money(self.0 + rhs.0)
    }
}

impl Sub for Money {
    type Output = Money;

    fn sub(self, rhs: Money) -> Money {
        Money(self.0 - rhs.0)
    }
}

impl fmt::Display for Money {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let sign = if self.0 < 0 { "-" } else { "" };
        let abs = self.0.unsigned_abs();
        write!(f, "{}{}.{:02}", sign, abs / 100, abs % 100)
    }
}

impl Serialize for Money {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_f64(self.as_major())
    }
}

impl<'de> Deserialize<'de> for Money {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let amount = f64::deserialize(deserializer)?;
        Money::from_major(amount)
            .ok_or_else(|| serde::de::Error::custom(format!("invalid amount: {}", amount)))
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LineItem {
    pub menu_item_id: Uuid,
    pub name: String,
    pub quantity: u32,
    pub unit_price: Money,
}

impl LineItem {
    pub fn line_total(&self) -> Option<Money> {
        self.unit_price.checked_mul(self.quantity)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrderTotals {
    pub subtotal: Money,
    pub delivery_fee: Money,
    pub tax: Money,
    pub discount: Money,
    pub total_amount: Money,
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum PricingError {
    #[error("order must contain at least one item")]
    NoItems,

    #[error("item {0} has zero quantity")]
    ZeroQuantity(String),

    #[error("item {0} has a negative price")]
    NegativePrice(String),

    #[error("discount cannot be negative")]
    NegativeDiscount,

    #[error("discount {discount} exceeds order amount {gross}")]
    DiscountTooLarge { discount: Money, gross: Money },

    #[error("order amount overflow")]
    Overflow,

    #[error("order amount {0} exceeds the maximum of {max}", max = Money::MAX)]
    TooLarge(Money),
}

/// Fees applied on top of the item subtotal at checkout.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PricingPolicy {
    pub delivery_fee: Money,
    /// Tax rate in basis points of the subtotal (500 = 5%).
    pub tax_rate_bps: u32,
}

impl Default for PricingPolicy {
    fn default() -> Self {
        Self {
            delivery_fee: Money::from_cents(4000),
            tax_rate_bps: 500,
        }
    }
}

impl PricingPolicy {
    /// Tax on `subtotal`, rounded half-up to the cent.
    pub fn tax_on(&self, subtotal: Money) -> Option<Money> {
        let scaled = subtotal.cents().checked_mul(i64::from(self.tax_rate_bps))?;
        Some(Money::from_cents((scaled + 5_000).div_euclid(10_000)))
    }

    pub fn totals(&self, items: &[LineItem], discount: Money) -> Result<OrderTotals, PricingError> {
        if items.is_empty() {
            return Err(PricingError::NoItems);
        }
        if discount.is_negative() {
            return Err(PricingError::NegativeDiscount);
        }

        let mut subtotal = Money::ZERO;
        for item in items {
            if item.quantity == 0 {
                return Err(PricingError::ZeroQuantity(item.name.clone()));
            }
            if item.unit_price.is_negative() {
                return Err(PricingError::NegativePrice(item.name.clone()));
            }
            let line = item.line_total().ok_or(PricingError::Overflow)?;
            subtotal = subtotal.checked_add(line).ok_or(PricingError::Overflow)?;
        }

        let tax = self.tax_on(subtotal).ok_or(PricingError::Overflow)?;
        let gross = subtotal
            .checked_add(self.delivery_fee)
            .and_then(|m| m.checked_add(tax))
            .ok_or(PricingError::Overflow)?;
        if gross > Money::MAX {
            return Err(PricingError::TooLarge(gross));
        }
        if discount > gross {
            return Err(PricingError::DiscountTooLarge { discount, gross });
        }

        Ok(OrderTotals {
            subtotal,
            delivery_fee: self.delivery_fee,
            tax,
            discount,
            total_amount: gross - discount,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn item(name: &str, price: f64, quantity: u32) -> LineItem {
        LineItem {
            menu_item_id: Uuid::new_v4(),
            name: name.to_string(),
            quantity,
            unit_price: Money::from_major(price).unwrap(),
        }
    }

    #[test]
    fn test_checkout_example_total() {
        let policy = PricingPolicy::default();
        let items = vec![item("Burger", 12.99, 1), item("Fries", 8.99, 2)];

        let totals = policy.totals(&items, Money::ZERO).unwrap();

        assert_eq!(totals.subtotal, Money::from_cents(3097));
        assert_eq!(totals.delivery_fee, Money::from_cents(4000));
        assert_eq!(totals.tax, Money::from_cents(155));
        assert_eq!(totals.total_amount, Money::from_cents(7252));
        // 12.99 + 17.98 + 40 + 0.05 * 30.97 = 72.5185
        assert!((totals.total_amount.as_major() - 72.5185).abs() < 0.01);
    }

    #[test]
    fn test_total_is_sum_of_parts() {
        let policy = PricingPolicy {
            delivery_fee: Money::from_cents(250),
            tax_rate_bps: 825,
        };
        let items = vec![item("Soup", 6.49, 3), item("Bread", 1.25, 4)];
        let discount = Money::from_cents(300);

        let totals = policy.totals(&items, discount).unwrap();

        assert_eq!(
            totals.total_amount,
            totals.subtotal + totals.delivery_fee + totals.tax - totals.discount
        );
    }

    #[test]
    fn test_rejects_empty_and_zero_quantity() {
        let policy = PricingPolicy::default();
        assert_eq!(policy.totals(&[], Money::ZERO), Err(PricingError::NoItems));
        assert_eq!(
            policy.totals(&[item("Tea", 2.0, 0)], Money::ZERO),
            Err(PricingError::ZeroQuantity("Tea".to_string()))
        );
    }

    #[test]
    fn test_discount_cannot_exceed_gross() {
        let policy = PricingPolicy::default();
        let result = policy.totals(&[item("Tea", 2.0, 1)], Money::from_cents(100_000));
        assert!(matches!(result, Err(PricingError::DiscountTooLarge { .. })));
    }

    #[test]
    fn test_rejects_amounts_beyond_storage() {
        let policy = PricingPolicy::default();
        let pricey = LineItem {
            menu_item_id: Uuid::new_v4(),
            name: "Truffle crate".to_string(),
            quantity: 2,
            unit_price: Money::from_cents(500_000_000_000),
        };
        assert!(matches!(
            policy.totals(&[pricey.clone()], Money::ZERO),
            Err(PricingError::TooLarge(_))
        ));

        let at_limit = LineItem {
            quantity: 1,
            unit_price: Money::from_cents(Money::MAX.cents() - 4000),
            ..pricey
        };
        let no_tax = PricingPolicy {
            tax_rate_bps: 0,
            ..policy
        };
        assert_eq!(no_tax.totals(&[at_limit], Money::ZERO).unwrap().total_amount, Money::MAX);
    }

    #[test]
    fn test_money_display_and_json() {
        assert_eq!(Money::from_cents(7252).to_string(), "72.52");
        assert_eq!(Money::from_cents(-5).to_string(), "-0.05");
        assert_eq!(serde_json::to_string(&Money::from_cents(1299)).unwrap(), "12.99");
        let parsed: Money = serde_json::from_str("8.99").unwrap();
        assert_eq!(parsed, Money::from_cents(899));
    }
}
