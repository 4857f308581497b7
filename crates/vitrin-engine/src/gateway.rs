//! # Payment Gateway Seam
//!
//! Trait abstraction over the external payment gateway plus the production
//! HTTP implementation and a mock for tests.
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                     Gateway Adapter                                     │
//! │                                                                         │
//! │  PaymentService ──► Arc<dyn PaymentGateway> ──┬──► HttpPaymentGateway  │
//! │                                               │    (reqwest, bounded   │
//! │                                               │     timeout)           │
//! │                                               └──► MockGateway (tests) │
//! │                                                                         │
//! │  Declined  = definitive "payment failed" → order is canceled           │
//! │  Transport = ambiguous (timeout, 5xx)    → order stays pending;        │
//! │              the next callback retries the idempotent verify           │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::debug;

/// Errors from the external payment gateway.
#[derive(Debug, Error)]
pub enum GatewayError {
    /// The gateway answered and declined the payment. Definitive.
    #[error("Payment declined by gateway (code {code})")]
    Declined { code: i64 },

    /// Network failure, non-2xx response, or timeout. Ambiguous: the
    /// engine leaves its own state unchanged and never assumes success.
    #[error("Gateway transport failure: {0}")]
    Transport(String),

    /// The gateway answered with a body the adapter cannot interpret.
    #[error("Malformed gateway response: {0}")]
    InvalidResponse(String),
}

impl From<reqwest::Error> for GatewayError {
    fn from(err: reqwest::Error) -> Self {
        GatewayError::Transport(err.to_string())
    }
}

/// What the engine sends when opening a payment session.
#[derive(Debug, Clone, Serialize)]
pub struct SessionRequest {
    pub order_id: String,
    pub amount_cents: i64,
    pub description: String,
    pub callback_url: String,
}

/// A freshly opened payment session.
#[derive(Debug, Clone, Deserialize)]
pub struct Session {
    /// Opaque token identifying this session at the gateway.
    pub authority_token: String,
    /// Where the customer is sent to pay.
    pub redirect_url: String,
}

/// A successfully verified payment.
#[derive(Debug, Clone, Deserialize)]
pub struct Settlement {
    /// The gateway's settlement reference, recorded on the order.
    pub settlement_ref: String,
}

/// The external payment gateway.
///
/// Implementations must bound every call with a timeout; a hung gateway
/// must not hold an engine transaction open.
#[async_trait]
pub trait PaymentGateway: Send + Sync {
    /// Opens a payment session for an order.
    async fn request_session(&self, request: &SessionRequest) -> Result<Session, GatewayError>;

    /// Verifies a callback's authority token against the expected amount.
    async fn verify(
        &self,
        authority_token: &str,
        amount_cents: i64,
    ) -> Result<Settlement, GatewayError>;

    /// The redirect URL for an existing session token. Used when a session
    /// request repeats for an order that already holds a token.
    fn redirect_url(&self, authority_token: &str) -> String;
}

// =============================================================================
// HTTP Implementation
// =============================================================================

#[derive(Debug, Deserialize)]
struct GatewaySessionBody {
    code: i64,
    authority: Option<String>,
}

#[derive(Debug, Deserialize)]
struct GatewayVerifyBody {
    code: i64,
    ref_id: Option<String>,
}

/// Production gateway adapter speaking JSON over HTTPS.
#[derive(Debug, Clone)]
pub struct HttpPaymentGateway {
    client: reqwest::Client,
    base_url: String,
    merchant_id: String,
}

impl HttpPaymentGateway {
    /// Success code in the gateway's response envelope.
    const CODE_OK: i64 = 100;

    /// Creates an adapter with a bounded per-request timeout.
    pub fn new(
        base_url: impl Into<String>,
        merchant_id: impl Into<String>,
        timeout: Duration,
    ) -> Result<Self, GatewayError> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(GatewayError::from)?;

        Ok(HttpPaymentGateway {
            client,
            base_url: base_url.into(),
            merchant_id: merchant_id.into(),
        })
    }
}

#[async_trait]
impl PaymentGateway for HttpPaymentGateway {
    async fn request_session(&self, request: &SessionRequest) -> Result<Session, GatewayError> {
        debug!(order_id = %request.order_id, "Requesting payment session");

        let response = self
            .client
            .post(format!("{}/payment/request", self.base_url))
            .json(&serde_json::json!({
                "merchant_id": self.merchant_id,
                "amount": request.amount_cents,
                "description": request.description,
                "callback_url": request.callback_url,
                "order_id": request.order_id,
            }))
            .send()
            .await?
            .error_for_status()
            .map_err(GatewayError::from)?;

        let body: GatewaySessionBody = response
            .json()
            .await
            .map_err(|e| GatewayError::InvalidResponse(e.to_string()))?;

        if body.code != Self::CODE_OK {
            return Err(GatewayError::Declined { code: body.code });
        }
        let authority = body
            .authority
            .ok_or_else(|| GatewayError::InvalidResponse("missing authority".into()))?;

        let redirect_url = self.redirect_url(&authority);
        Ok(Session {
            authority_token: authority,
            redirect_url,
        })
    }

    async fn verify(
        &self,
        authority_token: &str,
        amount_cents: i64,
    ) -> Result<Settlement, GatewayError> {
        debug!("Verifying payment with gateway");

        let response = self
            .client
            .post(format!("{}/payment/verify", self.base_url))
            .json(&serde_json::json!({
                "merchant_id": self.merchant_id,
                "authority": authority_token,
                "amount": amount_cents,
            }))
            .send()
            .await?
            .error_for_status()
            .map_err(GatewayError::from)?;

        let body: GatewayVerifyBody = response
            .json()
            .await
            .map_err(|e| GatewayError::InvalidResponse(e.to_string()))?;

        if body.code != Self::CODE_OK {
            return Err(GatewayError::Declined { code: body.code });
        }
        let settlement_ref = body
            .ref_id
            .ok_or_else(|| GatewayError::InvalidResponse("missing ref_id".into()))?;

        Ok(Settlement { settlement_ref })
    }

    fn redirect_url(&self, authority_token: &str) -> String {
        format!("{}/payment/start/{}", self.base_url, authority_token)
    }
}

// =============================================================================
// Mock Implementation
// =============================================================================

/// How the mock answers `verify`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MockVerifyBehavior {
    /// Verify succeeds with a settlement reference.
    Succeed,
    /// Verify reports a definitive decline.
    Decline,
    /// Verify fails with a transport error (timeout).
    Timeout,
}

/// In-process gateway for tests and local demos. Issues deterministic
/// tokens and counts calls so tests can assert single-shot behavior.
pub struct MockGateway {
    behavior: std::sync::Mutex<MockVerifyBehavior>,
    session_calls: std::sync::atomic::AtomicU64,
    verify_calls: std::sync::atomic::AtomicU64,
}

impl MockGateway {
    pub fn new() -> Self {
        MockGateway {
            behavior: std::sync::Mutex::new(MockVerifyBehavior::Succeed),
            session_calls: std::sync::atomic::AtomicU64::new(0),
            verify_calls: std::sync::atomic::AtomicU64::new(0),
        }
    }

    pub fn set_verify_behavior(&self, behavior: MockVerifyBehavior) {
        *self.behavior.lock().unwrap() = behavior;
    }

    pub fn session_calls(&self) -> u64 {
        self.session_calls.load(std::sync::atomic::Ordering::SeqCst)
    }

    pub fn verify_calls(&self) -> u64 {
        self.verify_calls.load(std::sync::atomic::Ordering::SeqCst)
    }
}

impl Default for MockGateway {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl PaymentGateway for MockGateway {
    async fn request_session(&self, request: &SessionRequest) -> Result<Session, GatewayError> {
        self.session_calls
            .fetch_add(1, std::sync::atomic::Ordering::SeqCst);

        let token = format!("AUTH-{}", request.order_id);
        Ok(Session {
            redirect_url: self.redirect_url(&token),
            authority_token: token,
        })
    }

    async fn verify(
        &self,
        authority_token: &str,
        _amount_cents: i64,
    ) -> Result<Settlement, GatewayError> {
        self.verify_calls
            .fetch_add(1, std::sync::atomic::Ordering::SeqCst);

        match *self.behavior.lock().unwrap() {
            MockVerifyBehavior::Succeed => Ok(Settlement {
                settlement_ref: format!("REF-{authority_token}"),
            }),
            MockVerifyBehavior::Decline => Err(GatewayError::Declined { code: -21 }),
            MockVerifyBehavior::Timeout => {
                Err(GatewayError::Transport("simulated timeout".into()))
            }
        }
    }

    fn redirect_url(&self, authority_token: &str) -> String {
        format!("mock://pay/{authority_token}")
    }
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_mock_issues_deterministic_tokens() {
        let gateway = MockGateway::new();
        let session = gateway
            .request_session(&SessionRequest {
                order_id: "o-1".into(),
                amount_cents: 150_000,
                description: "Order o-1".into(),
                callback_url: "http://localhost/callback".into(),
            })
            .await
            .unwrap();

        assert_eq!(session.authority_token, "AUTH-o-1");
        assert_eq!(gateway.session_calls(), 1);
    }

    #[tokio::test]
    async fn test_mock_decline_and_timeout() {
        let gateway = MockGateway::new();

        gateway.set_verify_behavior(MockVerifyBehavior::Decline);
        assert!(matches!(
            gateway.verify("AUTH-o-1", 1).await,
            Err(GatewayError::Declined { .. })
        ));

        gateway.set_verify_behavior(MockVerifyBehavior::Timeout);
        assert!(matches!(
            gateway.verify("AUTH-o-1", 1).await,
            Err(GatewayError::Transport(_))
        ));
    }
}
