mod common;

use std::sync::{
    atomic::{AtomicUsize, Ordering},
    Arc, Mutex,
};
use std::time::Duration;

use async_trait::async_trait;
use axum::http::{Method, StatusCode};
use common::{body_json, TestApp};
use marketplace_api::{
    errors::ServiceError,
    services::payments::{
        callback::{
            CartView, Navigator, VerificationClient, CART_PATH, MSG_NO_REFERENCE,
            MSG_VERIFY_ERROR, ORDERS_PATH,
        },
        CallbackStatus, PaymentCallback, VerificationOutcome,
    },
};
use uuid::Uuid;

const REDIRECT_DELAY: Duration = Duration::from_millis(3000);

struct ScriptedVerifier {
    answer: Result<VerificationOutcome, String>,
    calls: AtomicUsize,
}

impl ScriptedVerifier {
    fn new(answer: Result<VerificationOutcome, String>) -> Arc<Self> {
        Arc::new(Self {
            answer,
            calls: AtomicUsize::new(0),
        })
    }

    fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl VerificationClient for ScriptedVerifier {
    async fn verify(&self, _reference: &str) -> Result<VerificationOutcome, ServiceError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.answer
            .clone()
            .map_err(ServiceError::InternalError)
    }
}

#[derive(Default)]
struct RecordingCart {
    cleared: AtomicUsize,
}

impl CartView for RecordingCart {
    fn clear(&self) {
        self.cleared.fetch_add(1, Ordering::SeqCst);
    }
}

#[derive(Default)]
struct RecordingNavigator {
    visits: Mutex<Vec<String>>,
}

impl RecordingNavigator {
    fn visits(&self) -> Vec<String> {
        self.visits.lock().unwrap().clone()
    }
}

impl Navigator for RecordingNavigator {
    fn navigate(&self, target: &str) {
        self.visits.lock().unwrap().push(target.to_string());
    }
}

struct Harness {
    verifier: Arc<ScriptedVerifier>,
    cart: Arc<RecordingCart>,
    navigator: Arc<RecordingNavigator>,
    callback: PaymentCallback,
}

fn harness(answer: Result<VerificationOutcome, String>) -> Harness {
    let verifier = ScriptedVerifier::new(answer);
    let cart = Arc::new(RecordingCart::default());
    let navigator = Arc::new(RecordingNavigator::default());
    let callback = PaymentCallback::new(
        verifier.clone(),
        cart.clone(),
        navigator.clone(),
        REDIRECT_DELAY,
    );
    Harness {
        verifier,
        cart,
        navigator,
        callback,
    }
}

fn success(order_id: Uuid) -> VerificationOutcome {
    VerificationOutcome::Success {
        message: "Payment verified and order created".to_string(),
        order_id,
        order_ids: vec![order_id],
    }
}

#[tokio::test]
async fn missing_reference_fails_without_verifying() {
    let mut h = harness(Ok(success(Uuid::new_v4())));

    let view = h.callback.run(None).await.clone();

    assert_eq!(view.status, CallbackStatus::Failed);
    assert_eq!(view.message, MSG_NO_REFERENCE);
    assert_eq!(view.links, vec![CART_PATH.to_string(), ORDERS_PATH.to_string()]);
    assert_eq!(h.verifier.calls(), 0);
    assert_eq!(h.cart.cleared.load(Ordering::SeqCst), 0);
}

#[tokio::test(start_paused = true)]
async fn success_clears_cart_and_navigates_after_delay() {
    let order_id = Uuid::new_v4();
    let mut h = harness(Ok(success(order_id)));

    let view = h.callback.run(Some("order_1700000000000")).await.clone();

    let target = format!("/cart?success=true&orderId={}", order_id);
    assert_eq!(view.status, CallbackStatus::Success);
    assert_eq!(view.order_id, Some(order_id));
    assert_eq!(view.redirect_to.as_deref(), Some(target.as_str()));
    assert_eq!(view.redirect_after_ms, Some(3000));
    assert_eq!(h.cart.cleared.load(Ordering::SeqCst), 1);

    // Nothing happens before the delay has elapsed
    tokio::time::advance(Duration::from_millis(2900)).await;
    tokio::task::yield_now().await;
    assert!(h.navigator.visits().is_empty());

    let redirect = h.callback.take_pending_redirect().expect("redirect scheduled");
    redirect.await.expect("redirect task");
    assert_eq!(h.navigator.visits(), vec![target]);
}

#[tokio::test]
async fn failed_outcome_shows_message_and_links() {
    let mut h = harness(Ok(VerificationOutcome::failed("Payment abandoned")));

    let view = h.callback.run(Some("order_1")).await.clone();

    assert_eq!(view.status, CallbackStatus::Failed);
    assert_eq!(view.message, "Payment abandoned");
    assert_eq!(view.reference.as_deref(), Some("order_1"));
    assert_eq!(view.links, vec![CART_PATH.to_string(), ORDERS_PATH.to_string()]);
    assert!(view.redirect_to.is_none());
    assert!(h.callback.take_pending_redirect().is_none());
    assert_eq!(h.cart.cleared.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn verification_error_shows_support_message() {
    let mut h = harness(Err("connection reset".to_string()));

    let view = h.callback.run(Some("order_1")).await.clone();

    assert_eq!(view.status, CallbackStatus::Failed);
    assert_eq!(view.message, MSG_VERIFY_ERROR);
}

#[tokio::test]
async fn terminal_state_is_not_reentered() {
    let mut h = harness(Ok(VerificationOutcome::failed("Payment failed")));

    h.callback.run(Some("order_1")).await;
    let again = h.callback.run(Some("order_1")).await.clone();

    assert_eq!(again.status, CallbackStatus::Failed);
    assert_eq!(h.verifier.calls(), 1);
}

#[tokio::test]
async fn callback_route_verifies_and_returns_view() {
    let app = TestApp::new().await;
    let product = app.seed_product(Uuid::new_v4(), "Shea butter", 90_000, true).await;
    app.add_to_cart(app.buyer_id, product.id, 1).await;
    let response = app
        .request_as_buyer(
            Method::POST,
            "/api/v1/checkout",
            Some(TestApp::checkout_body("paystack")),
        )
        .await;
    assert_eq!(response.status(), StatusCode::OK);
    let reference = app.gateway.settle_last("success");

    let response = app
        .request(
            Method::GET,
            &format!("/payment/callback?trxref={0}&reference={0}", reference),
            None,
            None,
        )
        .await;
    assert_eq!(response.status(), StatusCode::OK);

    let body = body_json(response).await;
    let order = &app.orders_for(app.buyer_id).await[0];
    assert_eq!(body["status"], "success");
    assert_eq!(body["order_id"], order.id.to_string());
    assert_eq!(
        body["redirect_to"],
        format!("/cart?success=true&orderId={}", order.id)
    );
    assert_eq!(body["redirect_after_ms"], 3000);
    assert!(app.cart_lines(app.buyer_id).await.is_empty());
}

#[tokio::test]
async fn callback_route_without_reference_fails() {
    let app = TestApp::new().await;

    let response = app.request(Method::GET, "/payment/callback", None, None).await;
    assert_eq!(response.status(), StatusCode::OK);

    let body = body_json(response).await;
    assert_eq!(body["status"], "failed");
    assert_eq!(body["message"], MSG_NO_REFERENCE);
    assert!(app.gateway.verify_calls().is_empty());
}

#[tokio::test]
async fn callback_route_accepts_trxref_alone() {
    let app = TestApp::new().await;
    app.gateway
        .settle_with("order_trx_only", "failed", 10_000, None);

    let response = app
        .request(Method::GET, "/payment/callback?trxref=order_trx_only", None, None)
        .await;
    let body = body_json(response).await;
    assert_eq!(body["status"], "failed");
    assert_eq!(body["message"], "Payment failed");
    assert_eq!(app.gateway.verify_calls(), vec!["order_trx_only".to_string()]);
}

#[tokio::test]
async fn blank_reference_falls_back_to_trxref() {
    let app = TestApp::new().await;
    app.gateway
        .settle_with("order_blank_ref", "abandoned", 10_000, None);

    let response = app
        .request(
            Method::GET,
            "/payment/callback?reference=&trxref=order_blank_ref",
            None,
            None,
        )
        .await;
    let body = body_json(response).await;
    assert_eq!(body["status"], "failed");
    assert_eq!(body["message"], "Payment abandoned");
    assert_eq!(app.gateway.verify_calls(), vec!["order_blank_ref".to_string()]);
}
