pub mod admin;
pub mod banner;
pub mod brand;
pub mod cart;
pub mod cart_item;
pub mod category;
pub mod coupon;
pub mod order;
pub mod order_item;
pub mod password_reset_otp;
pub mod product;
pub mod review;
pub mod testimonial;
pub mod user;
pub mod wishlist_item;

pub use admin::Entity as Admin;
pub use banner::Entity as Banner;
pub use brand::Entity as Brand;
pub use cart::Entity as Cart;
pub use cart_item::Entity as CartItem;
pub use category::Entity as Category;
pub use coupon::Entity as Coupon;
pub use order::Entity as Order;
pub use order_item::Entity as OrderItem;
pub use password_reset_otp::Entity as PasswordResetOtp;
pub use product::Entity as Product;
pub use review::Entity as Review;
pub use testimonial::Entity as Testimonial;
pub use user::Entity as User;
pub use wishlist_item::Entity as WishlistItem;
