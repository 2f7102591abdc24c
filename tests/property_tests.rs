//! Property-based tests for cart pricing, checkout grouping and the payment gate.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use chrono::Utc;
use marketplace_api::{
    entities::{cart_line, order::PaymentMethod, product},
    errors::ServiceError,
    events::EventSender,
    repositories::{CartStore, PricedCartLine},
    services::{
        commerce::{
            cart_service::cart_total, checkout_service::build_payload, AddToCartInput,
            CartService, CheckoutForm,
        },
        payments::{
            gateway::{GatewayInitRequest, GatewayTransaction},
            InitiatePaymentRequest, PaymentAuthorization, PaymentGateway,
            PaymentInitiationService,
        },
    },
};
use proptest::prelude::*;
use serde_json::json;
use tokio::sync::mpsc;
use uuid::Uuid;

const CEILING: i64 = 10_000_000;

/// Cart store kept in memory, keyed by (owner, product)
#[derive(Default)]
struct MemoryCarts {
    products: HashMap<Uuid, product::Model>,
    lines: Mutex<Vec<cart_line::Model>>,
}

impl MemoryCarts {
    fn with_products(products: &[product::Model]) -> Self {
        Self {
            products: products.iter().map(|p| (p.id, p.clone())).collect(),
            lines: Mutex::new(Vec::new()),
        }
    }
}

#[async_trait]
impl CartStore for MemoryCarts {
    async fn find_product(&self, product_id: Uuid) -> Result<Option<product::Model>, ServiceError> {
        Ok(self.products.get(&product_id).cloned())
    }

    async fn priced_lines(&self, user_id: Uuid) -> Result<Vec<PricedCartLine>, ServiceError> {
        Ok(self
            .lines
            .lock()
            .unwrap()
            .iter()
            .filter(|l| l.user_id == user_id)
            .map(|l| PricedCartLine {
                line: l.clone(),
                product: self.products[&l.product_id].clone(),
            })
            .collect())
    }

    async fn add_quantity(
        &self,
        user_id: Uuid,
        product_id: Uuid,
        quantity: i32,
    ) -> Result<cart_line::Model, ServiceError> {
        let mut lines = self.lines.lock().unwrap();
        if let Some(line) = lines
            .iter_mut()
            .find(|l| l.user_id == user_id && l.product_id == product_id)
        {
            line.quantity += quantity;
            return Ok(line.clone());
        }
        let now = Utc::now();
        let line = cart_line::Model {
            id: Uuid::new_v4(),
            user_id,
            product_id,
            quantity,
            created_at: now,
            updated_at: now,
        };
        lines.push(line.clone());
        Ok(line)
    }

    async fn set_quantity(
        &self,
        user_id: Uuid,
        product_id: Uuid,
        quantity: i32,
    ) -> Result<Option<cart_line::Model>, ServiceError> {
        let mut lines = self.lines.lock().unwrap();
        Ok(lines
            .iter_mut()
            .find(|l| l.user_id == user_id && l.product_id == product_id)
            .map(|line| {
                line.quantity = quantity;
                line.clone()
            }))
    }

    async fn remove_line(&self, user_id: Uuid, product_id: Uuid) -> Result<u64, ServiceError> {
        let mut lines = self.lines.lock().unwrap();
        let before = lines.len();
        lines.retain(|l| !(l.user_id == user_id && l.product_id == product_id));
        Ok((before - lines.len()) as u64)
    }

    async fn clear(&self, user_id: Uuid) -> Result<u64, ServiceError> {
        let mut lines = self.lines.lock().unwrap();
        let before = lines.len();
        lines.retain(|l| l.user_id != user_id);
        Ok((before - lines.len()) as u64)
    }
}

/// Gateway that must never be reached
struct UnreachableGateway;

#[async_trait]
impl PaymentGateway for UnreachableGateway {
    fn method(&self) -> PaymentMethod {
        PaymentMethod::Paystack
    }

    async fn initialize(
        &self,
        _request: &GatewayInitRequest,
    ) -> Result<PaymentAuthorization, ServiceError> {
        panic!("validation must reject before the gateway is called")
    }

    async fn verify(&self, _reference: &str) -> Result<GatewayTransaction, ServiceError> {
        panic!("validation must reject before the gateway is called")
    }
}

fn catalog(prices: &[(u8, i64)]) -> Vec<product::Model> {
    let vendors: Vec<Uuid> = (0..4).map(|_| Uuid::new_v4()).collect();
    let now = Utc::now();
    prices
        .iter()
        .enumerate()
        .map(|(i, (vendor, price))| product::Model {
            id: Uuid::new_v4(),
            vendor_id: vendors[*vendor as usize % vendors.len()],
            name: format!("Product {}", i),
            price_minor: *price,
            is_active: true,
            created_at: now,
            updated_at: now,
        })
        .collect()
}

#[derive(Debug, Clone)]
enum CartOp {
    Add(usize, i32),
    Set(usize, i32),
    Remove(usize),
    Clear,
}

fn cart_op() -> impl Strategy<Value = CartOp> {
    prop_oneof![
        4 => (0usize..6, 1i32..20).prop_map(|(p, q)| CartOp::Add(p, q)),
        2 => (0usize..6, 1i32..20).prop_map(|(p, q)| CartOp::Set(p, q)),
        2 => (0usize..6).prop_map(CartOp::Remove),
        1 => Just(CartOp::Clear),
    ]
}

fn price_table() -> impl Strategy<Value = Vec<(u8, i64)>> {
    prop::collection::vec((0u8..4, 1i64..5_000_000), 6)
}

fn runtime() -> tokio::runtime::Runtime {
    tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
        .expect("test runtime")
}

fn checkout_form() -> CheckoutForm {
    CheckoutForm {
        first_name: "Ada".into(),
        last_name: "Obi".into(),
        email: "buyer@example.com".into(),
        phone: "08012345678".into(),
        address: "12 Marina Road, Lagos Island".into(),
        city: "Lagos".into(),
        state: "Lagos".into(),
        notes: None,
    }
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(200))]

    #[test]
    fn cart_total_matches_quantity_times_price(
        prices in price_table(),
        ops in prop::collection::vec(cart_op(), 1..40),
    ) {
        let products = catalog(&prices);
        let rt = runtime();
        let (tx, _rx) = mpsc::channel(1024);
        let service = CartService::new(
            Arc::new(MemoryCarts::with_products(&products)),
            Arc::new(EventSender::new(tx)),
        );
        let buyer = Uuid::new_v4();
        let mut model: HashMap<Uuid, i32> = HashMap::new();

        for op in ops {
            match op {
                CartOp::Add(p, q) => {
                    let product_id = products[p].id;
                    rt.block_on(service.add_item(buyer, AddToCartInput { product_id, quantity: q }))
                        .expect("add item");
                    *model.entry(product_id).or_insert(0) += q;
                }
                CartOp::Set(p, q) => {
                    let product_id = products[p].id;
                    let result = rt.block_on(service.update_quantity(buyer, product_id, q));
                    if let std::collections::hash_map::Entry::Occupied(mut e) = model.entry(product_id) {
                        prop_assert!(result.is_ok());
                        e.insert(q);
                    } else {
                        prop_assert!(matches!(result, Err(ServiceError::NotFound(_))));
                    }
                }
                CartOp::Remove(p) => {
                    let product_id = products[p].id;
                    let result = rt.block_on(service.remove_item(buyer, product_id));
                    prop_assert_eq!(result.is_ok(), model.remove(&product_id).is_some());
                }
                CartOp::Clear => {
                    rt.block_on(service.clear(buyer)).expect("clear cart");
                    model.clear();
                }
            }
        }

        let expected_total: i64 = model
            .iter()
            .map(|(id, qty)| {
                let price = products.iter().find(|p| p.id == *id).unwrap().price_minor;
                price * i64::from(*qty)
            })
            .sum();
        let expected_count: i64 = model.values().map(|q| i64::from(*q)).sum();

        let summary = rt.block_on(service.summary(buyer)).expect("summary");
        prop_assert_eq!(summary.total_minor, expected_total);
        prop_assert_eq!(summary.item_count, expected_count);
        prop_assert_eq!(summary.items.len(), model.len());
    }

    #[test]
    fn checkout_payload_partitions_cart_by_vendor(
        prices in price_table(),
        quantities in prop::collection::vec(1i32..10, 1..6),
    ) {
        let products = catalog(&prices);
        let buyer = Uuid::new_v4();
        let now = Utc::now();
        let lines: Vec<PricedCartLine> = quantities
            .iter()
            .zip(products.iter())
            .map(|(qty, product)| PricedCartLine {
                line: cart_line::Model {
                    id: Uuid::new_v4(),
                    user_id: buyer,
                    product_id: product.id,
                    quantity: *qty,
                    created_at: now,
                    updated_at: now,
                },
                product: product.clone(),
            })
            .collect();

        let payload = build_payload(buyer, &checkout_form(), &lines, PaymentMethod::Cod)
            .expect("payload");

        prop_assert_eq!(payload.total_amount_minor, cart_total(&lines));
        prop_assert!(payload.check_totals().is_ok());

        let mut distinct_vendors: Vec<Uuid> = lines.iter().map(|l| l.product.vendor_id).collect();
        distinct_vendors.sort();
        distinct_vendors.dedup();
        prop_assert_eq!(payload.vendors.len(), distinct_vendors.len());

        for vendor in &payload.vendors {
            prop_assert!(vendor
                .lines
                .iter()
                .all(|l| products.iter().any(|p| p.id == l.product_id && p.vendor_id == vendor.vendor_id)));
        }
        prop_assert_eq!(payload.product_ids().len(), lines.len());
    }

    #[test]
    fn out_of_range_amounts_never_pass_validation(
        amount in prop_oneof![i64::MIN..=0i64, (CEILING + 1)..i64::MAX],
    ) {
        let (tx, _rx) = mpsc::channel(16);
        let service = PaymentInitiationService::new(
            Arc::new(UnreachableGateway),
            Arc::new(MemoryCarts::default()),
            Arc::new(EventSender::new(tx)),
            CEILING,
            "/payment/callback",
        );
        let request = InitiatePaymentRequest {
            amount: Some(amount.into()),
            email: Some("buyer@example.com".into()),
            reference: Some("order_1700000000000".into()),
            order_data: Some(json!({})),
        };

        let result = service.validate(request);
        prop_assert!(matches!(result, Err(ServiceError::ValidationError(ref m)) if m == "Invalid amount"));
    }

    #[test]
    fn phone_length_bounds(digits in "[0-9]{0,20}") {
        let mut form = checkout_form();
        form.phone = digits.clone();
        let accepted = form.validated().is_ok();
        prop_assert_eq!(accepted, (10..=15).contains(&digits.len()));
    }
}
