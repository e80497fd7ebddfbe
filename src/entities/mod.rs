pub mod order;
pub mod order_item;
pub mod product;
pub mod seller_profile;
pub mod subscription;
pub mod user;
pub mod webhook_event;
