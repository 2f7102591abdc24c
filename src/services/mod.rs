// Cart, checkout form and order submission
pub mod commerce;

// Gateway payments and order materialization
pub mod payments;
