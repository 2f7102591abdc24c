/// Buyer-side commerce: the cart, the checkout form gate and checkout submission
pub mod cart_service;
pub mod checkout_service;
pub mod checkout_validator;

pub use cart_service::{AddToCartInput, CartLineView, CartService, CartSummary};
pub use checkout_service::{CheckoutOutcome, CheckoutRequest, CheckoutService};
pub use checkout_validator::CheckoutForm;
