pub mod admin;
pub mod cart;
pub mod cart_item;
pub mod category;
pub mod order;
pub mod order_item;
pub mod payment;
pub mod product;
pub mod review;
pub mod shipping_info;
pub mod user;
