use chrono::{Duration, Utc};
use shared::*;
use std::sync::Arc;
use uuid::Uuid;

use crate::api::AppState;
use crate::audit::PermissionAuditLog;
use crate::auth::{AuthUser, TokenSigner};
use crate::batch::BatchNumberGenerator;
use crate::service::{CreateOrder, OrderService, OrderUpdate};
use crate::store::memory::MemoryStore;
use crate::store::Store;

pub const TEST_SECRET: &str = "order-service-test-secret";

pub struct Harness {
    pub store: Arc<MemoryStore>,
    pub audit: Arc<PermissionAuditLog>,
    pub service: Arc<OrderService>,
    pub tokens: Arc<TokenSigner>,
}

impl Harness {
    pub fn new() -> Self {
        Self::with_generator(BatchNumberGenerator::with_seed("BATCH", 1).expect("test prefix"))
    }

    pub fn with_generator(generator: BatchNumberGenerator) -> Self {
        let store = Arc::new(MemoryStore::new());
        let audit = Arc::new(PermissionAuditLog::new(50));
        let service = Arc::new(OrderService::new(
            store.clone(),
            generator,
            PricingPolicy::default(),
            audit.clone(),
        ));
        let tokens = Arc::new(
            TokenSigner::new(TEST_SECRET, Duration::hours(1), Duration::days(7))
                .expect("test signer"),
        );
        Self {
            store,
            audit,
            service,
            tokens,
        }
    }

    pub fn state(&self) -> AppState {
        AppState {
            service: self.service.clone(),
            tokens: self.tokens.clone(),
        }
    }

    pub fn token_for(&self, user: &AuthUser) -> String {
        self.tokens
            .issue(user.user_id, user.role)
            .expect("token issue")
    }

    pub async fn restaurant_owned_by(&self, owner: &AuthUser) -> Restaurant {
        let now = Utc::now();
        let restaurant = Restaurant {
            id: Uuid::new_v4(),
            owner_id: owner.user_id,
            name: "Golden Wok".to_string(),
            address: Some("12 Harbour Rd".to_string()),
            is_active: true,
            created_at: now,
            updated_at: now,
        };
        self.store
            .insert_restaurant(&restaurant)
            .await
            .expect("insert restaurant");
        restaurant
    }

    pub async fn place_order(&self, customer: &AuthUser, restaurant: &Restaurant) -> Order {
        self.service
            .create_order(customer, checkout(restaurant.id))
            .await
            .expect("create order")
            .order
    }

    /// Walks an order through every status up to delivered, the way staff
    /// and a courier would.
    pub async fn deliver(&self, order: &Order, owner: &AuthUser, courier: &AuthUser) -> Order {
        for status in [
            OrderStatus::Confirmed,
            OrderStatus::Preparing,
            OrderStatus::Ready,
        ] {
            self.service
                .update_order(owner, order.id, status_update(status))
                .await
                .expect("restaurant status update");
        }
        let mut last = None;
        for status in [
            OrderStatus::PickedByDelivery,
            OrderStatus::OutForDelivery,
            OrderStatus::Delivered,
        ] {
            last = Some(
                self.service
                    .update_order(courier, order.id, status_update(status))
                    .await
                    .expect("delivery status update")
                    .order,
            );
        }
        last.expect("delivered order")
    }
}

pub fn user(role: Role) -> AuthUser {
    AuthUser {
        user_id: Uuid::new_v4(),
        role,
    }
}

pub fn status_update(status: OrderStatus) -> OrderUpdate {
    OrderUpdate {
        status: Some(status),
        ..OrderUpdate::default()
    }
}

/// Two burgers' worth of checkout: 12.99 x1 and 8.99 x2.
pub fn checkout(restaurant_id: Uuid) -> CreateOrder {
    CreateOrder {
        customer_id: None,
        restaurant_id,
        items: vec![
            LineItem {
                menu_item_id: Uuid::new_v4(),
                name: "Classic Burger".to_string(),
                quantity: 1,
                unit_price: Money::from_cents(1299),
            },
            LineItem {
                menu_item_id: Uuid::new_v4(),
                name: "Loaded Fries".to_string(),
                quantity: 2,
                unit_price: Money::from_cents(899),
            },
        ],
        delivery_address: DeliveryAddress {
            street: "221B Baker St".to_string(),
            city: "London".to_string(),
            postal_code: "NW1 6XE".to_string(),
            instructions: Some("Ring twice".to_string()),
        },
        payment_method: PaymentMethod::Card,
        special_instructions: None,
        discount: None,
    }
}

pub fn restaurant_rating(score: u8) -> RatingSubmission {
    RatingSubmission {
        restaurant: Some(RatingInput {
            score,
            comment: Some("Hot and fresh".to_string()),
        }),
        delivery: None,
    }
}
