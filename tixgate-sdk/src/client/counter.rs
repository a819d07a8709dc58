//! Counter API client (POS terminal / gate device → Tixgate server).
//!
//! All requests use body-signed HMAC-SHA256 authentication via
//! [`SignedObject`].

use reqwest::Client;
use url::Url;

use super::ClientError;
use crate::objects::purchase::{PurchaseReceipt, PurchaseRequest, TicketLookupRequest, TicketSummary};
use crate::objects::verify::{ScanOutcome, ScanRequest};
use crate::objects::{AssignRequest, AssignmentResponse, CancelAssignmentRequest};
use crate::signature::{SIGNATURE_HEADER, Signature, SignedObject};

/// Typed HTTP client for the Tixgate **Counter API**.
///
/// Used by POS terminals at the sales counter and scanning devices at the
/// gate. Every request body is signed with
/// `HMAC-SHA256("{timestamp}.{json}", counter_secret)`.
#[derive(Debug, Clone)]
pub struct CounterClient {
    http: Client,
    base_url: Url,
    secret: Vec<u8>,
}

impl CounterClient {
    /// Create a new `CounterClient`.
    ///
    /// * `base_url` – root URL of the Tixgate server.
    /// * `counter_secret` – the shared HMAC secret for body signing.
    pub fn new(base_url: Url, counter_secret: impl Into<Vec<u8>>) -> Self {
        Self {
            http: Client::new(),
            base_url,
            secret: counter_secret.into(),
        }
    }

    /// Replace the default `reqwest::Client` with a custom one (e.g. to
    /// configure timeouts or a proxy).
    pub fn with_http_client(mut self, client: Client) -> Self {
        self.http = client;
        self
    }

    /// `POST /api/v1/sales/purchase` – purchase tickets for a session.
    pub async fn purchase(&self, req: PurchaseRequest) -> Result<PurchaseReceipt, ClientError> {
        self.post_signed("/api/v1/sales/purchase", req).await
    }

    /// `POST /api/v1/sales/tickets/lookup` – look up a ticket by code.
    pub async fn lookup_ticket(&self, req: TicketLookupRequest) -> Result<TicketSummary, ClientError> {
        self.post_signed("/api/v1/sales/tickets/lookup", req).await
    }

    /// `POST /api/v1/gate/scan` – verify a scanned code at the gate.
    pub async fn scan(&self, req: ScanRequest) -> Result<ScanOutcome, ClientError> {
        self.post_signed("/api/v1/gate/scan", req).await
    }

    /// `POST /api/v1/assignments` – assign a paid ticket to a new attendee.
    pub async fn assign(&self, req: AssignRequest) -> Result<AssignmentResponse, ClientError> {
        self.post_signed("/api/v1/assignments", req).await
    }

    /// `POST /api/v1/assignments/cancel` – cancel an active assignment.
    pub async fn cancel_assignment(
        &self,
        req: CancelAssignmentRequest,
    ) -> Result<AssignmentResponse, ClientError> {
        self.post_signed("/api/v1/assignments/cancel", req).await
    }

    async fn post_signed<B, R>(&self, path: &str, body: B) -> Result<R, ClientError>
    where
        B: Signature,
        R: serde::de::DeserializeOwned,
    {
        let signed = SignedObject::new(body, &self.secret).map_err(ClientError::Json)?;
        let url = self.base_url.join(path)?;

        let resp = self
            .http
            .post(url)
            .header(SIGNATURE_HEADER, signed.to_header())
            .header(reqwest::header::CONTENT_TYPE, "application/json")
            .body(signed.json)
            .send()
            .await?;

        let status = resp.status();
        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            return Err(ClientError::Api { status, body });
        }

        Ok(resp.json::<R>().await?)
    }
}
