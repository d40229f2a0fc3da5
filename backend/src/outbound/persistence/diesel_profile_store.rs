//! PostgreSQL-backed `ProfileStore` implementation using Diesel ORM.

use std::collections::BTreeMap;

use async_trait::async_trait;
use diesel::prelude::*;
use diesel_async::RunQueryDsl;
use tracing::instrument;

use crate::domain::ports::{ProfileStore, ProfileStoreError};
use crate::domain::{AccountId, DisplayAttributes, ProfileRecord, Username};

use super::error_mapping::{map_basic_diesel_error, map_pool_error, violated_unique_constraint};
use super::models::ProfileRow;
use super::pool::DbPool;
use super::schema::profiles;

/// Name of the unique index on `profiles.username`.
const USERNAME_CONSTRAINT: &str = "profiles_username_key";

/// Diesel-backed implementation of the `ProfileStore` port.
#[derive(Clone)]
pub struct DieselProfileStore {
    pool: DbPool,
}

impl DieselProfileStore {
    /// Create a new store with the given connection pool.
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }
}

fn map_diesel_error(error: diesel::result::Error) -> ProfileStoreError {
    map_basic_diesel_error(error, ProfileStoreError::query, ProfileStoreError::connection)
}

fn map_insert_error(error: diesel::result::Error, record: &ProfileRecord) -> ProfileStoreError {
    match violated_unique_constraint(&error) {
        Some(USERNAME_CONSTRAINT) => ProfileStoreError::duplicate_username(record.username.as_str()),
        Some(_) => ProfileStoreError::duplicate_account(record.account_id.to_string()),
        None => map_diesel_error(error),
    }
}

fn row_to_record(row: ProfileRow) -> Result<ProfileRecord, ProfileStoreError> {
    let corrupt = |what: &str, err: &dyn std::fmt::Display| {
        ProfileStoreError::query(format!("corrupted {what} for {}: {err}", row.account_id))
    };
    let username = Username::new(&row.username).map_err(|err| corrupt("username", &err))?;
    let attributes: BTreeMap<String, String> =
        serde_json::from_value(row.display_attributes.clone())
            .map_err(|err| corrupt("display attributes", &err))?;
    let display_attributes =
        DisplayAttributes::new(attributes).map_err(|err| corrupt("display attributes", &err))?;
    Ok(ProfileRecord {
        account_id: AccountId::from_uuid(row.account_id),
        username,
        display_attributes,
        created_at: row.created_at,
    })
}

fn record_to_row(record: &ProfileRecord) -> Result<ProfileRow, ProfileStoreError> {
    let display_attributes = serde_json::to_value(record.display_attributes.as_map())
        .map_err(|err| ProfileStoreError::query(format!("encode display attributes: {err}")))?;
    Ok(ProfileRow {
        account_id: *record.account_id.as_uuid(),
        username: record.username.as_str().to_owned(),
        display_attributes,
        created_at: record.created_at,
    })
}

#[async_trait]
impl ProfileStore for DieselProfileStore {
    #[instrument(skip_all, fields(account_id = %record.account_id))]
    async fn create(&self, record: &ProfileRecord) -> Result<(), ProfileStoreError> {
        let row = record_to_row(record)?;
        let mut conn = self
            .pool
            .get()
            .await
            .map_err(|err| map_pool_error(err, ProfileStoreError::connection))?;

        diesel::insert_into(profiles::table)
            .values(&row)
            .execute(&mut conn)
            .await
            .map(|_| ())
            .map_err(|err| map_insert_error(err, record))
    }

    async fn find_by_username(
        &self,
        username: &Username,
    ) -> Result<Option<ProfileRecord>, ProfileStoreError> {
        let mut conn = self
            .pool
            .get()
            .await
            .map_err(|err| map_pool_error(err, ProfileStoreError::connection))?;

        let row: Option<ProfileRow> = profiles::table
            .filter(profiles::username.eq(username.as_str()))
            .select(ProfileRow::as_select())
            .first(&mut conn)
            .await
            .optional()
            .map_err(map_diesel_error)?;
        row.map(row_to_record).transpose()
    }

    async fn find_by_account(
        &self,
        account_id: &AccountId,
    ) -> Result<Option<ProfileRecord>, ProfileStoreError> {
        let mut conn = self
            .pool
            .get()
            .await
            .map_err(|err| map_pool_error(err, ProfileStoreError::connection))?;

        let row: Option<ProfileRow> = profiles::table
            .find(*account_id.as_uuid())
            .select(ProfileRow::as_select())
            .first(&mut conn)
            .await
            .optional()
            .map_err(map_diesel_error)?;
        row.map(row_to_record).transpose()
    }

    #[instrument(skip_all, fields(account_id = %account_id))]
    async fn delete(&self, account_id: &AccountId) -> Result<(), ProfileStoreError> {
        let mut conn = self
            .pool
            .get()
            .await
            .map_err(|err| map_pool_error(err, ProfileStoreError::connection))?;

        diesel::delete(profiles::table.find(*account_id.as_uuid()))
            .execute(&mut conn)
            .await
            .map(|_| ())
            .map_err(map_diesel_error)
    }
}
