#![allow(dead_code)]

use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use axum::{
    body::{to_bytes, Body},
    http::{Method, Request},
    response::Response,
    Router,
};
use chrono::Utc;
use marketplace_api::{
    auth::{AuthConfig, AuthService},
    config::AppConfig,
    db,
    entities::{cart_line, order, order_item, payment_reconciliation, product},
    errors::ServiceError,
    events::{self, EventSender},
    handlers::AppServices,
    services::payments::{
        gateway::{GatewayInitRequest, GatewayTransaction},
        PaymentAuthorization, PaymentGateway,
    },
    AppState,
};
use marketplace_api::entities::order::PaymentMethod;
use sea_orm::{ActiveModelTrait, ColumnTrait, EntityTrait, QueryFilter, Set};
use serde_json::{json, Value};
use tempfile::TempDir;
use tokio::sync::mpsc;
use tower::ServiceExt;
use uuid::Uuid;

pub const TEST_JWT_SECRET: &str = "test_secret_key_for_testing_purposes_only_32chars";
pub const TEST_PAYSTACK_SECRET: &str = "sk_test_marketplace_secret";
pub const TEST_ORIGIN: &str = "https://shop.example.com";

/// In-process stand-in for the payment gateway.
///
/// Records every call and answers verification from a per-reference table.
/// References with no configured answer are reported as unknown, the way the
/// gateway rejects references it never issued.
#[derive(Default)]
pub struct FakeGateway {
    initialized: Mutex<Vec<GatewayInitRequest>>,
    verified: Mutex<Vec<String>>,
    verify_answers: Mutex<HashMap<String, Result<GatewayTransaction, String>>>,
    init_failure: Mutex<Option<String>>,
}

impl FakeGateway {
    pub fn init_requests(&self) -> Vec<GatewayInitRequest> {
        self.initialized.lock().unwrap().clone()
    }

    pub fn last_init(&self) -> GatewayInitRequest {
        self.init_requests()
            .pop()
            .expect("gateway was never asked to open a transaction")
    }

    pub fn verify_calls(&self) -> Vec<String> {
        self.verified.lock().unwrap().clone()
    }

    pub fn reject_initialization(&self, message: &str) {
        *self.init_failure.lock().unwrap() = Some(message.to_string());
    }

    pub fn answer_verify(&self, reference: &str, answer: Result<GatewayTransaction, String>) {
        self.verify_answers
            .lock()
            .unwrap()
            .insert(reference.to_string(), answer);
    }

    /// Reports a transaction for `reference` with the given status and amount,
    /// echoing `order_data` as metadata.
    pub fn settle_with(&self, reference: &str, status: &str, amount: i64, order_data: Option<&str>) {
        let metadata = order_data.map(|raw| json!({ "order_data": raw }));
        self.answer_verify(
            reference,
            Ok(GatewayTransaction {
                status: status.to_string(),
                reference: reference.to_string(),
                amount,
                gateway_response: Some(status.to_string()),
                metadata,
            }),
        );
    }

    /// Settles the most recently opened transaction exactly as it was initiated
    pub fn settle_last(&self, status: &str) -> String {
        let init = self.last_init();
        self.settle_with(
            &init.reference,
            status,
            init.amount,
            Some(&init.metadata.order_data),
        );
        init.reference
    }
}

#[async_trait]
impl PaymentGateway for FakeGateway {
    fn method(&self) -> PaymentMethod {
        PaymentMethod::Paystack
    }

    async fn initialize(
        &self,
        request: &GatewayInitRequest,
    ) -> Result<PaymentAuthorization, ServiceError> {
        self.initialized.lock().unwrap().push(request.clone());
        if let Some(message) = self.init_failure.lock().unwrap().clone() {
            return Err(ServiceError::GatewayError(message));
        }
        let access_code = format!("ac_{}", request.reference);
        Ok(PaymentAuthorization {
            authorization_url: format!("https://checkout.paystack.com/{}", access_code),
            access_code,
            reference: request.reference.clone(),
        })
    }

    async fn verify(&self, reference: &str) -> Result<GatewayTransaction, ServiceError> {
        self.verified.lock().unwrap().push(reference.to_string());
        match self.verify_answers.lock().unwrap().get(reference).cloned() {
            Some(Ok(transaction)) => Ok(transaction),
            Some(Err(message)) => Err(ServiceError::GatewayError(message)),
            None => Err(ServiceError::GatewayError(
                "Transaction reference not found".to_string(),
            )),
        }
    }
}

/// Helper harness for spinning up the full router backed by a throwaway SQLite file.
pub struct TestApp {
    router: Router,
    pub state: AppState,
    pub gateway: Arc<FakeGateway>,
    pub buyer_id: Uuid,
    token: String,
    _db_dir: TempDir,
    _event_task: tokio::task::JoinHandle<()>,
}

impl TestApp {
    pub async fn new() -> Self {
        Self::with_config(|_| {}).await
    }

    /// Construct a test application after adjusting the default test configuration
    pub async fn with_config(adjust: impl FnOnce(&mut AppConfig)) -> Self {
        let db_dir = tempfile::tempdir().expect("create temp dir for test database");
        let db_path = db_dir.path().join("marketplace_test.db");

        let mut cfg = AppConfig::new(
            format!("sqlite://{}?mode=rwc", db_path.display()),
            TEST_JWT_SECRET.to_string(),
            TEST_PAYSTACK_SECRET.to_string(),
            "127.0.0.1".to_string(),
            18_080,
            "test".to_string(),
        );
        cfg.db_max_connections = 1;
        cfg.db_min_connections = 1;
        adjust(&mut cfg);

        let pool = db::establish_connection_from_app_config(&cfg)
            .await
            .expect("failed to create test database");
        db::run_migrations(&pool)
            .await
            .expect("failed to run migrations in tests");

        let db_arc = Arc::new(pool);
        let (event_tx, event_rx) = mpsc::channel(256);
        let event_sender = Arc::new(EventSender::new(event_tx));
        let event_task = tokio::spawn(events::process_events(event_rx));

        let gateway = Arc::new(FakeGateway::default());
        let services = AppServices::new(
            db_arc.clone(),
            event_sender.clone(),
            gateway.clone() as Arc<dyn PaymentGateway>,
            &cfg,
        );
        let auth = Arc::new(AuthService::new(AuthConfig::new(
            cfg.jwt_secret.clone(),
            Duration::from_secs(3600),
        )));

        let buyer_id = Uuid::new_v4();
        let token = auth
            .issue_token(buyer_id, Some("buyer@example.com".to_string()))
            .expect("issue buyer token");

        let state = AppState {
            db: db_arc,
            config: Arc::new(cfg),
            event_sender,
            services,
            auth,
        };
        let router = marketplace_api::api_router(state.clone());

        Self {
            router,
            state,
            gateway,
            buyer_id,
            token,
            _db_dir: db_dir,
            _event_task: event_task,
        }
    }

    /// Bearer token for the default buyer
    pub fn token(&self) -> &str {
        &self.token
    }

    pub fn token_for(&self, user_id: Uuid) -> String {
        self.state
            .auth
            .issue_token(user_id, None)
            .expect("issue token for test user")
    }

    /// Send a request against the router with an optional bearer token and extra headers.
    pub async fn request_with_headers(
        &self,
        method: Method,
        uri: &str,
        body: Option<Value>,
        token: Option<&str>,
        headers: &[(&str, &str)],
    ) -> Response {
        let mut builder = Request::builder().method(method).uri(uri);

        if let Some(tok) = token {
            builder = builder.header("authorization", format!("Bearer {}", tok));
        }
        for (name, value) in headers {
            builder = builder.header(*name, *value);
        }

        let body = if let Some(json) = body {
            builder = builder.header("content-type", "application/json");
            Body::from(serde_json::to_vec(&json).expect("failed to serialize json request body"))
        } else {
            Body::empty()
        };

        let request = builder.body(body).expect("failed to build request");
        self.router
            .clone()
            .oneshot(request)
            .await
            .expect("router error during test request")
    }

    pub async fn request(
        &self,
        method: Method,
        uri: &str,
        body: Option<Value>,
        token: Option<&str>,
    ) -> Response {
        self.request_with_headers(method, uri, body, token, &[]).await
    }

    /// Authenticated request as the default buyer, sent from the storefront origin
    pub async fn request_as_buyer(&self, method: Method, uri: &str, body: Option<Value>) -> Response {
        self.request_with_headers(
            method,
            uri,
            body,
            Some(self.token()),
            &[("origin", TEST_ORIGIN)],
        )
        .await
    }

    /// Raw body request, used for signed webhook deliveries
    pub async fn request_raw(
        &self,
        method: Method,
        uri: &str,
        body: Vec<u8>,
        headers: &[(&str, &str)],
    ) -> Response {
        let mut builder = Request::builder().method(method).uri(uri);
        for (name, value) in headers {
            builder = builder.header(*name, *value);
        }
        let request = builder.body(Body::from(body)).expect("failed to build request");
        self.router
            .clone()
            .oneshot(request)
            .await
            .expect("router error during test request")
    }

    pub async fn seed_product(
        &self,
        vendor_id: Uuid,
        name: &str,
        price_minor: i64,
        is_active: bool,
    ) -> product::Model {
        let now = Utc::now();
        product::ActiveModel {
            id: Set(Uuid::new_v4()),
            vendor_id: Set(vendor_id),
            name: Set(name.to_string()),
            price_minor: Set(price_minor),
            is_active: Set(is_active),
            created_at: Set(now),
            updated_at: Set(now),
        }
        .insert(&*self.state.db)
        .await
        .expect("seed product for tests")
    }

    pub async fn add_to_cart(&self, user_id: Uuid, product_id: Uuid, quantity: i32) {
        self.state
            .services
            .cart
            .add_item(
                user_id,
                marketplace_api::services::commerce::AddToCartInput {
                    product_id,
                    quantity,
                },
            )
            .await
            .expect("add item to cart");
    }

    pub async fn cart_lines(&self, user_id: Uuid) -> Vec<cart_line::Model> {
        cart_line::Entity::find()
            .filter(cart_line::Column::UserId.eq(user_id))
            .all(&*self.state.db)
            .await
            .expect("load cart lines")
    }

    pub async fn orders_for(&self, customer_id: Uuid) -> Vec<order::Model> {
        order::Entity::find()
            .filter(order::Column::CustomerId.eq(customer_id))
            .all(&*self.state.db)
            .await
            .expect("load orders")
    }

    pub async fn items_for(&self, order_id: Uuid) -> Vec<order_item::Model> {
        order_item::Entity::find()
            .filter(order_item::Column::OrderId.eq(order_id))
            .all(&*self.state.db)
            .await
            .expect("load order items")
    }

    pub async fn reconciliations(&self, reference: &str) -> Vec<payment_reconciliation::Model> {
        payment_reconciliation::Entity::find()
            .filter(payment_reconciliation::Column::Reference.eq(reference))
            .all(&*self.state.db)
            .await
            .expect("load reconciliations")
    }

    /// A valid checkout body for the given payment method
    pub fn checkout_body(payment_method: &str) -> Value {
        json!({
            "first_name": "Ada",
            "last_name": "Obi",
            "email": "buyer@example.com",
            "phone": "08012345678",
            "address": "12 Marina Road, Lagos Island",
            "city": "Lagos",
            "state": "Lagos",
            "notes": "Call on arrival",
            "payment_method": payment_method,
        })
    }
}

impl Drop for TestApp {
    fn drop(&mut self) {
        self._event_task.abort();
    }
}

/// Reads a response body as JSON
pub async fn body_json(response: Response) -> Value {
    let bytes = to_bytes(response.into_body(), usize::MAX)
        .await
        .expect("read response body");
    serde_json::from_slice(&bytes).expect("response body is json")
}
