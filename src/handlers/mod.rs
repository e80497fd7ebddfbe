pub mod auth;
pub mod common;
pub mod orders;
pub mod payments;
pub mod products;
pub mod subscriptions;
pub mod users;
pub mod webhooks;
