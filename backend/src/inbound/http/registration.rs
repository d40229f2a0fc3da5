//! Registration endpoint.
//!
//! ```text
//! POST /api/v1/users
//! Idempotency-Key: k1
//! {"email":"a@x.com","username":"alice","password":"pw123"}
//! ```

use std::collections::BTreeMap;
use std::fmt;

use actix_web::{HttpRequest, HttpResponse, post, web};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::instrument;
use zeroize::Zeroizing;

use crate::domain::{RegistrationReceipt, RegistrationRequest};
use crate::inbound::http::ApiResult;
use crate::inbound::http::idempotency::{IDEMPOTENT_REPLAYED_HEADER, resolve_idempotency_key};
use crate::inbound::http::state::HttpState;

/// Request body for `POST /api/v1/users`.
#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RegisterUserBody {
    pub email: String,
    pub username: String,
    pub password: String,
    #[serde(default)]
    pub display_attributes: BTreeMap<String, String>,
    #[serde(default)]
    pub client_nonce: Option<String>,
}

impl fmt::Debug for RegisterUserBody {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RegisterUserBody")
            .field("email", &self.email)
            .field("username", &self.username)
            .field("password", &"<redacted>")
            .field("display_attributes", &self.display_attributes)
            .field("client_nonce", &self.client_nonce)
            .finish()
    }
}

/// Response body for a registered (or replayed) account.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RegisteredUserBody {
    pub account_id: String,
    pub created_at: DateTime<Utc>,
}

impl From<&RegistrationReceipt> for RegisteredUserBody {
    fn from(receipt: &RegistrationReceipt) -> Self {
        Self {
            account_id: receipt.account_id.to_string(),
            created_at: receipt.created_at,
        }
    }
}

/// Register a user. Replays answer 200 with `Idempotent-Replayed: true`.
#[post("/users")]
#[instrument(name = "http.register_user", skip_all)]
pub async fn register_user(
    state: web::Data<HttpState>,
    request: HttpRequest,
    payload: web::Json<RegisterUserBody>,
) -> ApiResult<HttpResponse> {
    let body = payload.into_inner();
    let key = resolve_idempotency_key(
        request.headers(),
        &body.email,
        &body.username,
        body.client_nonce.as_deref(),
    )?;
    let receipt = state
        .registration
        .register(RegistrationRequest {
            email: body.email,
            username: body.username,
            raw_password: Zeroizing::new(body.password),
            display_attributes: body.display_attributes,
            idempotency_key: key.into(),
        })
        .await?;

    let mut response = if receipt.replayed {
        HttpResponse::Ok()
    } else {
        HttpResponse::Created()
    };
    if receipt.replayed {
        response.insert_header((IDEMPOTENT_REPLAYED_HEADER, "true"));
    }
    Ok(response.json(RegisteredUserBody::from(&receipt)))
}

#[cfg(test)]
#[path = "registration_tests.rs"]
mod tests;
