pub mod carts;
pub mod catalog;
pub mod content;
pub mod coupons;
pub mod inventory;
pub mod notifications;
pub mod orders;
pub mod payments;
pub mod reviews;
pub mod users;
pub mod wishlist;
