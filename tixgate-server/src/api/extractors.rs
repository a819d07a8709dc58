//! Custom Axum extractors for request authentication.
//!
//! Provides:
//! - `SignedBody<T>` — verifies the `Tixgate-Signature` header against a
//!   signed JSON body (used by the Sales, Gate and Assignment APIs).
//! - `GatewaySigned<T>` — same scheme keyed with the gateway secret
//!   (used by the settlement callback).
//! - `AdminAuth` — verifies the `Tixgate-Admin-Authorization` header
//!   against the stored argon2 hash (used by the Admin API).
//!
//! All cryptographic operations are delegated to [`tixgate_sdk::signature`].

use axum::{
    extract::{FromRequest, FromRequestParts, Request},
    http::{StatusCode, request::Parts},
    response::{IntoResponse, Response},
};
use tixgate_sdk::signature::{
    ADMIN_AUTH_HEADER, SIGNATURE_HEADER, Signature, SignatureError, SignedObject,
};

use crate::state::AppState;

// ---------------------------------------------------------------------------
// SignedBody — counter authentication via signed JSON body
// ---------------------------------------------------------------------------

/// An Axum extractor that verifies the `Tixgate-Signature` header and
/// deserializes + authenticates the JSON request body.
///
/// # Header format
///
/// ```text
/// Tixgate-Signature: {unix_timestamp}.{base64_signature}
/// ```
///
/// The signature is computed as `HMAC-SHA256("{timestamp}.{json_body}", counter_secret)`.
pub struct SignedBody<T: Signature>(pub T);

/// Errors that can occur during signed-body verification.
#[derive(Debug, thiserror::Error)]
pub enum SignedBodyError {
    #[error("missing Tixgate-Signature header")]
    MissingHeader,
    #[error("invalid Tixgate-Signature header format")]
    InvalidHeader,
    #[error("invalid signature encoding")]
    InvalidBase64,
    #[error("failed to read request body")]
    BodyReadError,
    #[error("invalid JSON body: {0}")]
    JsonError(serde_json::Error),
    #[error("signature verification failed")]
    VerificationFailed,
}

impl From<SignatureError> for SignedBodyError {
    fn from(err: SignatureError) -> Self {
        match err {
            SignatureError::InvalidFormat => Self::InvalidHeader,
            SignatureError::InvalidBase64 => Self::InvalidBase64,
            SignatureError::Json(e) => Self::JsonError(e),
            SignatureError::SignatureMismatch | SignatureError::Expired => Self::VerificationFailed,
        }
    }
}

impl IntoResponse for SignedBodyError {
    fn into_response(self) -> Response {
        let (status, message) = match self {
            SignedBodyError::MissingHeader => {
                (StatusCode::UNAUTHORIZED, "missing Tixgate-Signature header")
            }
            SignedBodyError::InvalidHeader => (
                StatusCode::BAD_REQUEST,
                "invalid Tixgate-Signature header format",
            ),
            SignedBodyError::InvalidBase64 => {
                (StatusCode::BAD_REQUEST, "invalid signature encoding")
            }
            SignedBodyError::BodyReadError => {
                (StatusCode::BAD_REQUEST, "failed to read request body")
            }
            SignedBodyError::JsonError(_) => (StatusCode::BAD_REQUEST, "invalid JSON body"),
            SignedBodyError::VerificationFailed => {
                (StatusCode::UNAUTHORIZED, "signature verification failed")
            }
        };
        (status, message).into_response()
    }
}

/// Read out the raw body and the signature header from a request.
async fn signed_parts(req: Request) -> Result<(String, String), SignedBodyError> {
    let header_value = req
        .headers()
        .get(SIGNATURE_HEADER)
        .ok_or(SignedBodyError::MissingHeader)?
        .to_str()
        .map_err(|_| SignedBodyError::InvalidHeader)?
        .to_owned();

    let body_bytes = axum::body::to_bytes(req.into_body(), 1024 * 1024)
        .await
        .map_err(|_| SignedBodyError::BodyReadError)?;

    let json =
        String::from_utf8(body_bytes.to_vec()).map_err(|_| SignedBodyError::BodyReadError)?;

    Ok((header_value, json))
}

impl<T: Signature + Send> FromRequest<AppState> for SignedBody<T> {
    type Rejection = SignedBodyError;

    async fn from_request(req: Request, state: &AppState) -> Result<Self, Self::Rejection> {
        let (header_value, json) = signed_parts(req).await?;
        let signed = SignedObject::<T>::from_header_and_body(&header_value, json)?;

        let counter = state.config.counter.read().await;
        let verified_body = signed.verify(counter.secret_bytes())?;
        drop(counter);

        Ok(SignedBody(verified_body))
    }
}

// ---------------------------------------------------------------------------
// GatewaySigned — settlement callback authentication
// ---------------------------------------------------------------------------

/// Same signed-body scheme as [`SignedBody`], keyed with the gateway
/// secret instead of the counter secret.
pub struct GatewaySigned<T: Signature>(pub T);

impl<T: Signature + Send> FromRequest<AppState> for GatewaySigned<T> {
    type Rejection = SignedBodyError;

    async fn from_request(req: Request, state: &AppState) -> Result<Self, Self::Rejection> {
        let (header_value, json) = signed_parts(req).await?;
        let signed = SignedObject::<T>::from_header_and_body(&header_value, json)?;

        let gateway = state.config.gateway.read().await;
        let verified_body = signed.verify(gateway.secret_bytes())?;
        drop(gateway);

        Ok(GatewaySigned(verified_body))
    }
}

// ---------------------------------------------------------------------------
// AdminAuth — Admin API authentication via plaintext secret header
// ---------------------------------------------------------------------------

/// An Axum extractor that verifies the `Tixgate-Admin-Authorization`
/// header against the stored argon2 hash of the admin secret.
pub struct AdminAuth;

/// Errors returned by the [`AdminAuth`] extractor.
#[derive(Debug)]
pub enum AdminAuthError {
    MissingHeader,
    InvalidHeader,
    WrongSecret,
}

impl IntoResponse for AdminAuthError {
    fn into_response(self) -> Response {
        let (status, message) = match self {
            AdminAuthError::MissingHeader => (
                StatusCode::UNAUTHORIZED,
                "missing Tixgate-Admin-Authorization header",
            ),
            AdminAuthError::InvalidHeader => {
                (StatusCode::BAD_REQUEST, "invalid authorization header")
            }
            AdminAuthError::WrongSecret => (StatusCode::UNAUTHORIZED, "wrong admin secret"),
        };
        (status, message).into_response()
    }
}

impl FromRequestParts<AppState> for AdminAuth {
    type Rejection = AdminAuthError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        let presented = parts
            .headers
            .get(ADMIN_AUTH_HEADER)
            .ok_or(AdminAuthError::MissingHeader)?
            .to_str()
            .map_err(|_| AdminAuthError::InvalidHeader)?;

        let admin = state.config.admin.read().await;
        if !admin.verify_secret(presented) {
            drop(admin);
            return Err(AdminAuthError::WrongSecret);
        }
        drop(admin);

        Ok(AdminAuth)
    }
}
