use async_trait::async_trait;
use reqwest::{Client, Method, StatusCode};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::time::Duration;
use tracing::{debug, instrument, warn};
use uuid::Uuid;

use crate::errors::ServiceError;

const REQUEST_TIMEOUT_SECS: u64 = 10;

/// Payment gateway abstraction used by the order workflow.
///
/// Amounts are passed in the major unit (naira); the minor-unit (kobo)
/// conversion is an implementation detail of the concrete client.
#[async_trait]
pub trait PaymentGateway: Send + Sync {
    /// Starts a checkout transaction, returning the authorization URL and
    /// gateway reference the customer completes payment against.
    async fn initialize_transaction(
        &self,
        email: &str,
        amount: Decimal,
        callback_url: Option<&str>,
    ) -> Result<InitializedTransaction, ServiceError>;

    /// Checks the state of a transaction by its reference.
    async fn verify_transaction(&self, reference: &str) -> Result<VerifiedTransaction, ServiceError>;

    /// Requests a refund of `amount` against a settled transaction.
    async fn refund_transaction(
        &self,
        reference: &str,
        amount: Decimal,
    ) -> Result<(), ServiceError>;
}

/// Result of a successful transaction initialization
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InitializedTransaction {
    pub authorization_url: String,
    pub access_code: String,
    pub reference: String,
}

/// Result of a transaction verification
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VerifiedTransaction {
    pub reference: String,
    /// Gateway-reported state, "success" when the charge settled
    pub status: String,
    /// Settled amount in the minor unit (kobo)
    pub amount: i64,
}

impl VerifiedTransaction {
    pub fn is_successful(&self) -> bool {
        self.status == "success"
    }
}

/// Envelope every Paystack response arrives in
#[derive(Debug, Deserialize)]
struct PaystackEnvelope {
    status: bool,
    message: String,
    #[serde(default)]
    data: Value,
}

/// HTTP client for the Paystack REST API.
///
/// Converts amounts to kobo exactly once, here at the wire boundary.
#[derive(Debug, Clone)]
pub struct PaystackClient {
    client: Client,
    base_url: String,
    secret_key: String,
}

impl PaystackClient {
    pub fn new(base_url: String, secret_key: String) -> Self {
        let client = Client::builder()
            .timeout(Duration::from_secs(REQUEST_TIMEOUT_SECS))
            .build()
            .unwrap_or_default();

        Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            secret_key,
        }
    }

    /// Converts a major-unit amount to kobo, rounding to whole minor units.
    fn to_minor_units(amount: Decimal) -> i64 {
        use rust_decimal::prelude::ToPrimitive;
        (amount * Decimal::from(100)).round().to_i64().unwrap_or(0)
    }

    #[instrument(skip(self, body))]
    async fn request(
        &self,
        method: Method,
        path: &str,
        body: Option<Value>,
    ) -> Result<PaystackEnvelope, ServiceError> {
        let url = format!("{}{}", self.base_url, path);
        debug!(%url, "gateway request");

        let mut req = self
            .client
            .request(method, &url)
            .bearer_auth(&self.secret_key);
        if let Some(body) = body {
            req = req.json(&body);
        }

        let response = req.send().await.map_err(|e| {
            warn!(error = %e, "gateway transport failure");
            ServiceError::ExternalServiceError(format!("Payment gateway unreachable: {}", e))
        })?;

        let status = response.status();
        let envelope: PaystackEnvelope = response.json().await.map_err(|e| {
            ServiceError::ExternalServiceError(format!("Malformed gateway response: {}", e))
        })?;

        if !envelope.status {
            // Gateway spoke but declined; forward its message
            return Err(ServiceError::PaymentFailed(envelope.message));
        }
        if status == StatusCode::INTERNAL_SERVER_ERROR {
            return Err(ServiceError::ExternalServiceError(envelope.message));
        }

        Ok(envelope)
    }

    /// Raw pass-through call returning the gateway's `data` payload as-is.
    /// Used by the admin gateway endpoints that expose Paystack directly.
    pub async fn passthrough(
        &self,
        method: Method,
        path: &str,
        body: Option<Value>,
    ) -> Result<Value, ServiceError> {
        let envelope = self.request(method, path, body).await?;
        Ok(envelope.data)
    }

    /// Pass-through variant of initialize returning the raw gateway payload.
    pub async fn initialize_transaction_raw(
        &self,
        email: &str,
        amount: Decimal,
    ) -> Result<Value, ServiceError> {
        let body = json!({
            "email": email,
            "amount": Self::to_minor_units(amount),
        });
        self.passthrough(Method::POST, "/transaction/initialize", Some(body))
            .await
    }

    /// Pass-through variant of verify returning the raw gateway payload.
    pub async fn verify_transaction_raw(&self, reference: &str) -> Result<Value, ServiceError> {
        self.passthrough(
            Method::GET,
            &format!("/transaction/verify/{}", reference),
            None,
        )
        .await
    }

    pub async fn list_transactions(&self) -> Result<Value, ServiceError> {
        self.passthrough(Method::GET, "/transaction", None).await
    }

    pub async fn fetch_transaction(&self, id: &str) -> Result<Value, ServiceError> {
        self.passthrough(Method::GET, &format!("/transaction/{}", id), None)
            .await
    }

    pub async fn charge_authorization(
        &self,
        email: &str,
        amount: Decimal,
        authorization_code: &str,
    ) -> Result<Value, ServiceError> {
        let body = json!({
            "email": email,
            "amount": Self::to_minor_units(amount),
            "authorization_code": authorization_code,
        });
        self.passthrough(Method::POST, "/transaction/charge_authorization", Some(body))
            .await
    }

    pub async fn transaction_timeline(&self, id_or_reference: &str) -> Result<Value, ServiceError> {
        self.passthrough(
            Method::GET,
            &format!("/transaction/timeline/{}", id_or_reference),
            None,
        )
        .await
    }

    pub async fn transaction_totals(&self) -> Result<Value, ServiceError> {
        self.passthrough(Method::GET, "/transaction/totals", None)
            .await
    }

    pub async fn export_transactions(&self) -> Result<Value, ServiceError> {
        self.passthrough(Method::GET, "/transaction/export", None)
            .await
    }
}

#[async_trait]
impl PaymentGateway for PaystackClient {
    async fn initialize_transaction(
        &self,
        email: &str,
        amount: Decimal,
        callback_url: Option<&str>,
    ) -> Result<InitializedTransaction, ServiceError> {
        let mut body = json!({
            "email": email,
            "amount": Self::to_minor_units(amount),
            "reference": Uuid::new_v4().to_string(),
        });
        if let Some(url) = callback_url {
            body["callback_url"] = json!(url);
        }

        let envelope = self
            .request(Method::POST, "/transaction/initialize", Some(body))
            .await?;

        serde_json::from_value(envelope.data).map_err(|e| {
            ServiceError::ExternalServiceError(format!("Malformed gateway response: {}", e))
        })
    }

    async fn verify_transaction(
        &self,
        reference: &str,
    ) -> Result<VerifiedTransaction, ServiceError> {
        let envelope = self
            .request(
                Method::GET,
                &format!("/transaction/verify/{}", reference),
                None,
            )
            .await?;

        serde_json::from_value(envelope.data).map_err(|e| {
            ServiceError::ExternalServiceError(format!("Malformed gateway response: {}", e))
        })
    }

    async fn refund_transaction(
        &self,
        reference: &str,
        amount: Decimal,
    ) -> Result<(), ServiceError> {
        let body = json!({
            "transaction": reference,
            "amount": Self::to_minor_units(amount),
        });

        self.request(Method::POST, "/refund", Some(body)).await?;
        Ok(())
    }
}
