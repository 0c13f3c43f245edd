pub mod accounts;
pub mod carts;
pub mod catalog;
pub mod orders;
pub mod payments;
pub mod paystack;
pub mod reviews;
