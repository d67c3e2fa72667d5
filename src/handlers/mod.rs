pub mod auth;
pub mod banners;
pub mod brands;
pub mod carts;
pub mod categories;
pub mod common;
pub mod coupons;
pub mod orders;
pub mod products;
pub mod reviews;
pub mod testimonials;
pub mod users;
pub mod wishlists;
