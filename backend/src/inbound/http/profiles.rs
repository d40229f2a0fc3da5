//! Profile read endpoint backed by the read-through cache.

use std::collections::BTreeMap;

use actix_web::{get, web};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::json;

use crate::domain::{AccountId, Error, ProfileRecord};
use crate::inbound::http::ApiResult;
use crate::inbound::http::state::HttpState;

/// Public profile representation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProfileBody {
    pub account_id: String,
    pub username: String,
    pub display_attributes: BTreeMap<String, String>,
    pub created_at: DateTime<Utc>,
}

impl From<ProfileRecord> for ProfileBody {
    fn from(profile: ProfileRecord) -> Self {
        Self {
            account_id: profile.account_id.to_string(),
            username: profile.username.as_str().to_owned(),
            display_attributes: profile.display_attributes.as_map().clone(),
            created_at: profile.created_at,
        }
    }
}

/// Fetch a user's public profile.
#[get("/users/{account_id}/profile")]
pub async fn get_profile(
    state: web::Data<HttpState>,
    path: web::Path<String>,
) -> ApiResult<web::Json<ProfileBody>> {
    let account_id = AccountId::new(path.into_inner()).map_err(|err| {
        Error::invalid_request(err.to_string())
            .with_details(json!({ "field": "accountId", "code": "invalid_account_id" }))
    })?;
    let profile = state.profiles.profile(&account_id).await?;
    Ok(web::Json(ProfileBody::from(profile)))
}
