//! Typed rows for the marketplace tables.

pub mod cart_line;
pub mod order;
pub mod order_item;
pub mod payment_reconciliation;
pub mod product;
