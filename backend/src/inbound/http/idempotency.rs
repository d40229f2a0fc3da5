//! Resolving the idempotency key for a registration request.

use actix_web::http::header::HeaderMap;
use serde_json::json;

use crate::domain::Error;
use crate::domain::idempotency::{IdempotencyKey, IdempotencyKeyValidationError};
use crate::domain::registration::RegistrationRequest;

/// HTTP header name for idempotency keys.
pub const IDEMPOTENCY_KEY_HEADER: &str = "Idempotency-Key";

/// Response header set when a stored outcome is replayed.
pub const IDEMPOTENT_REPLAYED_HEADER: &str = "Idempotent-Replayed";

/// Extract the idempotency key from request headers.
pub fn extract_idempotency_key(
    headers: &HeaderMap,
) -> Result<Option<IdempotencyKey>, IdempotencyKeyValidationError> {
    let Some(header_value) = headers.get(IDEMPOTENCY_KEY_HEADER) else {
        return Ok(None);
    };

    let key_str = header_value
        .to_str()
        .map_err(|_| IdempotencyKeyValidationError::InvalidCharacters)?;

    IdempotencyKey::new(key_str).map(Some)
}

/// Map idempotency key validation errors to domain errors.
pub fn map_idempotency_key_error(err: IdempotencyKeyValidationError) -> Error {
    let code = match err {
        IdempotencyKeyValidationError::EmptyKey => "empty_key",
        IdempotencyKeyValidationError::TooLong { .. } => "key_too_long",
        IdempotencyKeyValidationError::InvalidCharacters => "invalid_key",
    };
    Error::invalid_request(err.to_string())
        .with_details(json!({ "field": IDEMPOTENCY_KEY_HEADER, "code": code }))
}

/// Use the header key when present, otherwise derive one from the identity
/// fields and the client nonce.
pub fn resolve_idempotency_key(
    headers: &HeaderMap,
    email: &str,
    username: &str,
    client_nonce: Option<&str>,
) -> Result<IdempotencyKey, Error> {
    if let Some(key) = extract_idempotency_key(headers).map_err(map_idempotency_key_error)? {
        return Ok(key);
    }
    match client_nonce.map(str::trim).filter(|nonce| !nonce.is_empty()) {
        Some(nonce) => Ok(RegistrationRequest::derived_key(email, username, nonce)),
        None => Err(Error::invalid_request(
            "an Idempotency-Key header or a clientNonce is required",
        )
        .with_details(json!({ "field": IDEMPOTENCY_KEY_HEADER, "code": "missing_key" }))),
    }
}
