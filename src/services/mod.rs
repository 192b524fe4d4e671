pub mod cart;
pub mod email;
pub mod orders;
pub mod paypal;
