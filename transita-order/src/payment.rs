use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum PaymentOutcome {
    Succeeded,
    Failed,
}

/// A checkout session opened with the gateway. The customer is
/// redirected to `payment_url`; the gateway later reports the outcome
/// for `reference` on the callback surface.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PaymentSession {
    pub reference: String,
    pub payment_url: String,
    pub amount: i32,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, thiserror::Error)]
pub enum PaymentError {
    #[error("payment gateway rejected the request: {0}")]
    Rejected(String),

    #[error("payment gateway unreachable: {0}")]
    Unreachable(String),
}

/// External payment collaborator. Only the request/response contract
/// matters here; redirect mechanics live with the provider.
#[async_trait]
pub trait PaymentGateway: Send + Sync {
    async fn initiate(
        &self,
        amount: i32,
        reservation_id: Uuid,
    ) -> Result<PaymentSession, PaymentError>;
}

/// Gateway stand-in for development and tests: always opens a session,
/// never settles on its own.
pub struct SandboxGateway {
    base_url: String,
}

impl SandboxGateway {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into(),
        }
    }
}

#[async_trait]
impl PaymentGateway for SandboxGateway {
    async fn initiate(
        &self,
        amount: i32,
        reservation_id: Uuid,
    ) -> Result<PaymentSession, PaymentError> {
        if amount <= 0 {
            return Err(PaymentError::Rejected(
                "amount must be positive".to_string(),
            ));
        }
        let reference = format!("pay_{}", Uuid::new_v4().simple());
        tracing::debug!(%reservation_id, %reference, amount, "sandbox payment session opened");
        Ok(PaymentSession {
            payment_url: format!("{}/checkout/{}", self.base_url, reference),
            reference,
            amount,
            created_at: Utc::now(),
        })
    }
}
