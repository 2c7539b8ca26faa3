//! Domain types for the order service: order status machine, role
//! permissions, pricing, batch numbers and rating rules. Nothing here
//! touches I/O.

pub mod access;
pub mod batch;
pub mod order;
pub mod pricing;
pub mod rating;
pub mod status;

pub use access::{Action, Decision, Resource, Role};
pub use order::{
    BatchTracking, BatchTrackingUpdate, DeliveryAddress, NewOrder, Order, PaymentMethod,
    RatingSummary, Restaurant, ValidationError,
};
pub use pricing::{LineItem, Money, OrderTotals, PricingError, PricingPolicy};
pub use rating::{OrderRatings, RatingEntry, RatingError, RatingInput, RatingSubmission, Review};
pub use status::{OrderStatus, OrderTimeline, TransitionError};
