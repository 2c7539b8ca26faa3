use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::status::OrderStatus;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    Customer,
    RestaurantOwner,
    DeliveryPerson,
    Admin,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Resource {
    Orders,
    Reviews,
    Restaurants,
    PermissionLog,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Action {
    Create,
    Read,
    Update,
    Delete,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Decision {
    Allow,
    Deny,
}

impl Decision {
    pub fn is_allowed(self) -> bool {
        self == Decision::Allow
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown role: {0}")]
pub struct UnknownRole(pub String);

use Action::*;

const ALL_ACTIONS: &[Action] = &[Create, Read, Update, Delete];

const PERMISSIONS: &[(Role, Resource, &[Action])] = &[
    (Role::Customer, Resource::Orders, &[Create, Read, Delete]),
    (Role::Customer, Resource::Reviews, ALL_ACTIONS),
    (Role::Customer, Resource::Restaurants, &[Read]),
    (Role::RestaurantOwner, Resource::Orders, &[Read, Update]),
    (Role::RestaurantOwner, Resource::Reviews, &[Read]),
    (Role::RestaurantOwner, Resource::Restaurants, &[Create, Read, Update]),
    (Role::DeliveryPerson, Resource::Orders, &[Read, Update]),
    (Role::DeliveryPerson, Resource::Reviews, &[Read]),
    (Role::DeliveryPerson, Resource::Restaurants, &[Read]),
    (Role::Admin, Resource::Orders, ALL_ACTIONS),
    (Role::Admin, Resource::Reviews, ALL_ACTIONS),
    (Role::Admin, Resource::Restaurants, ALL_ACTIONS),
    (Role::Admin, Resource::PermissionLog, &[Read]),
];

/// Looks up `(role, resource)` in the static permission table.
pub fn check(role: Role, resource: Resource, action: Action) -> Decision {
    let allowed = PERMISSIONS
        .iter()
        .find(|(r, res, _)| *r == role && *res == resource)
        .is_some_and(|(_, _, actions)| actions.contains(&action));

    if allowed {
        Decision::Allow
    } else {
        Decision::Deny
    }
}

/// Which order statuses a role may set through an order update.
pub fn may_set_status(role: Role, status: OrderStatus) -> bool {
    match role {
        Role::Admin => true,
        Role::RestaurantOwner => matches!(
            status,
            OrderStatus::Confirmed
                | OrderStatus::Preparing
                | OrderStatus::Ready
                | OrderStatus::Cancelled
        ),
        Role::DeliveryPerson => matches!(
            status,
            OrderStatus::PickedByDelivery | OrderStatus::OutForDelivery | OrderStatus::Delivered
        ),
        Role::Customer => false,
    }
}

impl Role {
    pub const ALL: [Role; 4] = [
        Role::Customer,
        Role::RestaurantOwner,
        Role::DeliveryPerson,
        Role::Admin,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            Role::Customer => "customer",
            Role::RestaurantOwner => "restaurant_owner",
            Role::DeliveryPerson => "delivery_person",
            Role::Admin => "admin",
        }
    }

    pub fn level(self) -> u8 {
        match self {
            Role::Customer => 1,
            Role::DeliveryPerson => 2,
            Role::RestaurantOwner => 3,
            Role::Admin => 10,
        }
    }

    pub fn is_at_least(self, other: Role) -> bool {
        self.level() >= other.level()
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Role {
    type Err = UnknownRole;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Role::ALL
            .into_iter()
            .find(|role| role.as_str() == s)
            .ok_or_else(|| UnknownRole(s.to_string()))
    }
}

impl fmt::Display for Resource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Resource::Orders => "orders",
            Resource::Reviews => "reviews",
            Resource::Restaurants => "restaurants",
            Resource::PermissionLog => "permission_log",
        };
        f.write_str(name)
    }
}

impl fmt::Display for Action {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Action::Create => "create",
            Action::Read => "read",
            Action::Update => "update",
            Action::Delete => "delete",
        };
        f.write_str(name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_admin_is_allowed_everything_on_orders() {
        for action in ALL_ACTIONS {
            assert_eq!(check(Role::Admin, Resource::Orders, *action), Decision::Allow);
        }
    }

    #[test]
    fn test_customer_cannot_update_orders() {
        assert_eq!(check(Role::Customer, Resource::Orders, Update), Decision::Deny);
        assert!(check(Role::Customer, Resource::Orders, Delete).is_allowed());
    }

    #[test]
    fn test_missing_table_row_denies() {
        assert_eq!(
            check(Role::DeliveryPerson, Resource::PermissionLog, Read),
            Decision::Deny
        );
        assert_eq!(
            check(Role::RestaurantOwner, Resource::Reviews, Delete),
            Decision::Deny
        );
    }

    #[test]
    fn test_status_gate_by_role() {
        assert!(may_set_status(Role::RestaurantOwner, OrderStatus::Ready));
        assert!(!may_set_status(Role::RestaurantOwner, OrderStatus::Delivered));
        assert!(may_set_status(Role::DeliveryPerson, OrderStatus::Delivered));
        assert!(!may_set_status(Role::DeliveryPerson, OrderStatus::Cancelled));
        assert!(!may_set_status(Role::Customer, OrderStatus::Cancelled));
        assert!(may_set_status(Role::Admin, OrderStatus::Confirmed));
    }

    #[test]
    fn test_role_levels() {
        assert!(Role::Admin.is_at_least(Role::RestaurantOwner));
        assert!(!Role::Customer.is_at_least(Role::DeliveryPerson));
        assert_eq!("delivery_person".parse::<Role>(), Ok(Role::DeliveryPerson));
        assert!("courier".parse::<Role>().is_err());
    }
}
