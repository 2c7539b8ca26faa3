use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use shared::access::{self, may_set_status};
use shared::batch::normalize;
use shared::order::check_len;
use shared::rating::check_eligibility;
use shared::*;
use std::sync::Arc;
use tracing::info;
use uuid::Uuid;

use crate::audit::{PermissionAuditEntry, PermissionAuditLog};
use crate::auth::AuthUser;
use crate::batch::BatchNumberGenerator;
use crate::error::ApiError;
use crate::store::{OrderFilter, OrderScope, Store};

pub const DEFAULT_LIST_LIMIT: i64 = 50;
pub const MAX_LIST_LIMIT: i64 = 200;

#[derive(Debug, Clone, Deserialize)]
pub struct CreateOrder {
    /// Only admins place orders on behalf of another customer.
    #[serde(default)]
    pub customer_id: Option<Uuid>,
    pub restaurant_id: Uuid,
    pub items: Vec<LineItem>,
    pub delivery_address: DeliveryAddress,
    pub payment_method: PaymentMethod,
    #[serde(default)]
    pub special_instructions: Option<String>,
    #[serde(default)]
    pub discount: Option<Money>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct OrderUpdate {
    #[serde(default)]
    pub status: Option<OrderStatus>,
    #[serde(default)]
    pub batch_tracking: Option<BatchTrackingUpdate>,
    #[serde(default)]
    pub delivery_person_id: Option<Uuid>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct CreateRestaurant {
    #[serde(default)]
    pub owner_id: Option<Uuid>,
    pub name: String,
    #[serde(default)]
    pub address: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RestaurantRef {
    pub id: Uuid,
    pub name: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct OrderView {
    #[serde(flatten)]
    pub order: Order,
    pub restaurant: Option<RestaurantRef>,
}

/// What anyone holding a batch number may see.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BatchTrace {
    pub batch_number: String,
    pub status: OrderStatus,
    pub restaurant: Option<RestaurantRef>,
    pub timeline: OrderTimeline,
    pub batch_tracking: BatchTracking,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RestaurantView {
    #[serde(flatten)]
    pub restaurant: Restaurant,
    pub rating: RatingSummary,
}

impl From<&Restaurant> for RestaurantRef {
    fn from(restaurant: &Restaurant) -> Self {
        Self {
            id: restaurant.id,
            name: restaurant.name.clone(),
        }
    }
}

pub struct OrderService {
    store: Arc<dyn Store>,
    batches: BatchNumberGenerator,
    pricing: PricingPolicy,
    audit: Arc<PermissionAuditLog>,
}

fn scope_for(caller: &AuthUser) -> OrderScope {
    match caller.role {
        Role::Customer => OrderScope::Customer(caller.user_id),
        Role::RestaurantOwner => OrderScope::RestaurantOwner(caller.user_id),
        Role::DeliveryPerson => OrderScope::DeliveryPerson(caller.user_id),
        Role::Admin => OrderScope::All,
    }
}

impl OrderService {
    pub fn new(
        store: Arc<dyn Store>,
        batches: BatchNumberGenerator,
        pricing: PricingPolicy,
        audit: Arc<PermissionAuditLog>,
    ) -> Self {
        Self {
            store,
            batches,
            pricing,
            audit,
        }
    }

    fn authorize(&self, caller: &AuthUser, resource: Resource, action: Action) -> Result<(), ApiError> {
        let decision = access::check(caller.role, resource, action);
        self.audit.record(PermissionAuditEntry {
            at: Utc::now(),
            user_id: caller.user_id,
            role: caller.role,
            resource,
            action,
            decision,
        });

        if decision.is_allowed() {
            Ok(())
        } else {
            Err(ApiError::Forbidden(format!(
                "{} may not {} {}",
                caller.role, action, resource
            )))
        }
    }

    async fn load_order(&self, id: Uuid) -> Result<Order, ApiError> {
        self.store
            .find_order(id)
            .await?
            .ok_or_else(|| ApiError::NotFound(format!("order {}", id)))
    }

    /// Applies the caller's ownership scope to a single order and returns its
    /// restaurant.
    async fn ensure_visible(&self, caller: &AuthUser, order: &Order) -> Result<Option<Restaurant>, ApiError> {
        let restaurant = self.store.find_restaurant(order.restaurant_id).await?;
        let owner = restaurant.as_ref().map(|r| r.owner_id);
        if !scope_for(caller).admits(order, owner) {
            return Err(ApiError::Forbidden(format!(
                "order {} belongs to another account",
                order.id
            )));
        }
        Ok(restaurant)
    }

    fn view(order: Order, restaurant: Option<&Restaurant>) -> OrderView {
        OrderView {
            order,
            restaurant: restaurant.map(RestaurantRef::from),
        }
    }

    pub async fn create_order(&self, caller: &AuthUser, input: CreateOrder) -> Result<OrderView, ApiError> {
        self.authorize(caller, Resource::Orders, Action::Create)?;

        let customer_id = match (caller.role, input.customer_id) {
            (Role::Admin, Some(id)) => id,
            (Role::Admin, None) => {
                return Err(ApiError::Validation(
                    "customer_id is required when ordering for a customer".to_string(),
                ))
            }
            (_, Some(id)) if id != caller.user_id => {
                return Err(ApiError::Forbidden(
                    "cannot place orders for another customer".to_string(),
                ))
            }
            _ => caller.user_id,
        };

        let restaurant = self
            .store
            .find_restaurant(input.restaurant_id)
            .await?
            .ok_or_else(|| ApiError::NotFound(format!("restaurant {}", input.restaurant_id)))?;
        if !restaurant.is_active {
            return Err(ApiError::Validation(format!(
                "restaurant {} is not accepting orders",
                restaurant.name
            )));
        }

        input.delivery_address.validate()?;
        check_len("special_instructions", input.special_instructions.as_deref())?;
        if input.items.iter().any(|item| item.name.trim().is_empty()) {
            return Err(ValidationError::Empty("item name").into());
        }

        let totals = self
            .pricing
            .totals(&input.items, input.discount.unwrap_or(Money::ZERO))?;
        let batch_number = self.batches.assign(self.store.as_ref()).await?;

        let order = Order::place(
            NewOrder {
                customer_id,
                restaurant_id: restaurant.id,
                items: input.items,
                delivery_address: input.delivery_address,
                payment_method: input.payment_method,
                special_instructions: input.special_instructions,
                totals,
            },
            batch_number,
            Utc::now(),
        );
        self.store.insert_order(&order).await?;

        info!(
            "Order {} placed by {} at {} with batch {} for {}",
            order.id, customer_id, restaurant.id, order.batch_number, order.totals.total_amount
        );
        Ok(Self::view(order, Some(&restaurant)))
    }

    pub async fn list_orders(
        &self,
        caller: &AuthUser,
        status: Option<OrderStatus>,
        limit: Option<i64>,
    ) -> Result<Vec<Order>, ApiError> {
        self.authorize(caller, Resource::Orders, Action::Read)?;

        let filter = OrderFilter {
            status,
            limit: limit.unwrap_or(DEFAULT_LIST_LIMIT).clamp(1, MAX_LIST_LIMIT),
        };
        Ok(self.store.list_orders(scope_for(caller), filter).await?)
    }

    pub async fn get_order(&self, caller: &AuthUser, id: Uuid) -> Result<OrderView, ApiError> {
        self.authorize(caller, Resource::Orders, Action::Read)?;

        let order = self.load_order(id).await?;
        let restaurant = self.ensure_visible(caller, &order).await?;
        Ok(Self::view(order, restaurant.as_ref()))
    }

    pub async fn update_order(
        &self,
        caller: &AuthUser,
        id: Uuid,
        update: OrderUpdate,
    ) -> Result<OrderView, ApiError> {
        self.authorize(caller, Resource::Orders, Action::Update)?;

        if update.status.is_none() && update.batch_tracking.is_none() && update.delivery_person_id.is_none() {
            return Err(ApiError::Validation("nothing to update".to_string()));
        }

        let mut order = self.load_order(id).await?;
        let restaurant = self.ensure_visible(caller, &order).await?;
        let now = Utc::now();
        let staff = matches!(caller.role, Role::Admin | Role::RestaurantOwner);

        if caller.role == Role::DeliveryPerson && order.delivery_person_id != Some(caller.user_id) {
            let claiming = order.delivery_person_id.is_none()
                && order.status == OrderStatus::Ready
                && update.status == Some(OrderStatus::PickedByDelivery);
            if !claiming {
                return Err(ApiError::Forbidden(format!(
                    "order {} is not assigned to you",
                    order.id
                )));
            }
        }

        if let Some(tracking) = &update.batch_tracking {
            if !staff {
                return Err(ApiError::Forbidden(
                    "only restaurant staff may edit batch tracking".to_string(),
                ));
            }
            tracking.validate()?;
            if !tracking.is_empty() {
                order.batch_tracking.apply(tracking, now);
                order.updated_at = now;
            }
        }

        if let Some(delivery_person_id) = update.delivery_person_id {
            if !staff {
                return Err(ApiError::Forbidden(
                    "only restaurant staff may assign deliveries".to_string(),
                ));
            }
            if order.status.is_terminal() {
                return Err(ApiError::Conflict(format!("order is already {}", order.status)));
            }
            order.delivery_person_id = Some(delivery_person_id);
            order.updated_at = now;
        }

        if let Some(target) = update.status.filter(|s| *s != order.status) {
            if !may_set_status(caller.role, target) {
                return Err(ApiError::Forbidden(format!(
                    "{} may not set status {}",
                    caller.role, target
                )));
            }
            let from = order.status;
            order.advance(target, now)?;
            if caller.role == Role::DeliveryPerson && order.delivery_person_id.is_none() {
                order.delivery_person_id = Some(caller.user_id);
            }
            info!("Order {} moved from {} to {} by {}", order.id, from, target, caller.user_id);
        }

        self.store.save_order(&order).await?;
        Ok(Self::view(order, restaurant.as_ref()))
    }

    pub async fn cancel_order(&self, caller: &AuthUser, id: Uuid) -> Result<OrderView, ApiError> {
        self.authorize(caller, Resource::Orders, Action::Delete)?;

        let mut order = self.load_order(id).await?;
        let restaurant = self.ensure_visible(caller, &order).await?;

        order.advance(OrderStatus::Cancelled, Utc::now())?;
        self.store.save_order(&order).await?;

        info!("Order {} cancelled by {}", order.id, caller.user_id);
        Ok(Self::view(order, restaurant.as_ref()))
    }

    /// Public lookup; reveals no customer data.
    pub async fn trace_batch(&self, batch_number: &str) -> Result<BatchTrace, ApiError> {
        let batch_number = normalize(batch_number);
        let order = self
            .store
            .find_order_by_batch(&batch_number)
            .await?
            .ok_or_else(|| ApiError::NotFound(format!("batch {}", batch_number)))?;
        let restaurant = self.store.find_restaurant(order.restaurant_id).await?;

        Ok(BatchTrace {
            batch_number: order.batch_number,
            status: order.status,
            restaurant: restaurant.as_ref().map(RestaurantRef::from),
            timeline: order.timeline,
            batch_tracking: order.batch_tracking,
            created_at: order.created_at,
        })
    }

    pub async fn get_rating(&self, caller: &AuthUser, order_id: Uuid) -> Result<Review, ApiError> {
        self.authorize(caller, Resource::Reviews, Action::Read)?;

        let order = self.load_order(order_id).await?;
        self.ensure_visible(caller, &order).await?;
        self.store
            .find_review(order.customer_id, order.id)
            .await?
            .ok_or_else(|| ApiError::NotFound(format!("review for order {}", order.id)))
    }

    pub async fn submit_rating(
        &self,
        caller: &AuthUser,
        order_id: Uuid,
        submission: RatingSubmission,
    ) -> Result<Review, ApiError> {
        self.authorize(caller, Resource::Reviews, Action::Create)?;

        let order = self.load_order(order_id).await?;
        check_eligibility(&order, caller.user_id, &submission)?;

        let review = self
            .store
            .upsert_review(&order, &submission, Utc::now())
            .await?;
        info!("Review {} saved for order {}", review.id, order.id);
        Ok(review)
    }

    pub async fn delete_rating(&self, caller: &AuthUser, order_id: Uuid) -> Result<(), ApiError> {
        self.authorize(caller, Resource::Reviews, Action::Delete)?;

        let order = self.load_order(order_id).await?;
        if order.customer_id != caller.user_id && caller.role != Role::Admin {
            return Err(ApiError::Forbidden(format!(
                "order {} belongs to another customer",
                order.id
            )));
        }

        if !self
            .store
            .delete_review(order.customer_id, order.id, Utc::now())
            .await?
        {
            return Err(ApiError::NotFound(format!("review for order {}", order.id)));
        }
        info!("Review for order {} deleted by {}", order.id, caller.user_id);
        Ok(())
    }

    pub async fn create_restaurant(
        &self,
        caller: &AuthUser,
        input: CreateRestaurant,
    ) -> Result<Restaurant, ApiError> {
        self.authorize(caller, Resource::Restaurants, Action::Create)?;

        let owner_id = match input.owner_id {
            Some(id) if caller.role == Role::Admin => id,
            Some(id) if id != caller.user_id => {
                return Err(ApiError::Forbidden(
                    "cannot create restaurants for another owner".to_string(),
                ))
            }
            _ => caller.user_id,
        };
        if input.name.trim().is_empty() {
            return Err(ValidationError::Empty("name").into());
        }
        check_len("address", input.address.as_deref())?;

        let now = Utc::now();
        let restaurant = Restaurant {
            id: Uuid::new_v4(),
            owner_id,
            name: input.name.trim().to_string(),
            address: input.address,
            is_active: true,
            created_at: now,
            updated_at: now,
        };
        self.store.insert_restaurant(&restaurant).await?;

        info!("Restaurant {} created for owner {}", restaurant.id, owner_id);
        Ok(restaurant)
    }

    pub async fn get_restaurant(&self, caller: &AuthUser, id: Uuid) -> Result<RestaurantView, ApiError> {
        self.authorize(caller, Resource::Restaurants, Action::Read)?;

        let restaurant = self
            .store
            .find_restaurant(id)
            .await?
            .ok_or_else(|| ApiError::NotFound(format!("restaurant {}", id)))?;
        let rating = self.store.restaurant_rating_summary(id).await?;
        Ok(RestaurantView { restaurant, rating })
    }

    pub fn permission_log(
        &self,
        caller: &AuthUser,
        limit: Option<usize>,
    ) -> Result<Vec<PermissionAuditEntry>, ApiError> {
        self.authorize(caller, Resource::PermissionLog, Action::Read)?;
        Ok(self.audit.recent(limit.unwrap_or(100).min(self.audit.capacity())))
    }

    pub fn batch_prefix(&self) -> &str {
        self.batches.prefix()
    }
}
