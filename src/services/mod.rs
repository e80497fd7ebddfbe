pub mod clerk;
pub mod directus;
pub mod orders;
pub mod products;
pub mod stripe;
pub mod subscriptions;
pub mod users;
