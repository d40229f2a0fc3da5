//! PostgreSQL-backed `CredentialStore` implementation using Diesel ORM.

use async_trait::async_trait;
use diesel::prelude::*;
use diesel_async::RunQueryDsl;
use tracing::instrument;
use uuid::Uuid;

use crate::domain::ports::{CredentialStore, CredentialStoreError};
use crate::domain::{AccountId, CredentialRecord, EmailAddress, PasswordHash};

use super::error_mapping::{map_basic_diesel_error, map_pool_error, violated_unique_constraint};
use super::models::CredentialRow;
use super::pool::DbPool;
use super::schema::credentials;

/// Name of the unique index on `credentials.email`.
const EMAIL_CONSTRAINT: &str = "credentials_email_key";

/// Diesel-backed implementation of the `CredentialStore` port.
#[derive(Clone)]
pub struct DieselCredentialStore {
    pool: DbPool,
}

impl DieselCredentialStore {
    /// Create a new store with the given connection pool.
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }
}

fn map_diesel_error(error: diesel::result::Error) -> CredentialStoreError {
    map_basic_diesel_error(error, CredentialStoreError::query, CredentialStoreError::connection)
}

fn map_insert_error(error: diesel::result::Error, record: &CredentialRecord) -> CredentialStoreError {
    match violated_unique_constraint(&error) {
        Some(EMAIL_CONSTRAINT) => CredentialStoreError::duplicate_email(record.email.as_str()),
        Some(_) => CredentialStoreError::duplicate_account(record.account_id.to_string()),
        None => map_diesel_error(error),
    }
}

fn row_to_record(row: CredentialRow) -> Result<CredentialRecord, CredentialStoreError> {
    let email = EmailAddress::new(&row.email).map_err(|err| {
        CredentialStoreError::query(format!("corrupted email for {}: {err}", row.account_id))
    })?;
    Ok(CredentialRecord {
        account_id: AccountId::from_uuid(row.account_id),
        email,
        password_hash: PasswordHash::new(row.password_hash),
        created_at: row.created_at,
    })
}

#[async_trait]
impl CredentialStore for DieselCredentialStore {
    #[instrument(skip_all, fields(account_id = %record.account_id))]
    async fn create(&self, record: &CredentialRecord) -> Result<(), CredentialStoreError> {
        let mut conn = self
            .pool
            .get()
            .await
            .map_err(|err| map_pool_error(err, CredentialStoreError::connection))?;

        let row = CredentialRow {
            account_id: *record.account_id.as_uuid(),
            email: record.email.as_str().to_owned(),
            password_hash: record.password_hash.as_str().to_owned(),
            created_at: record.created_at,
        };

        diesel::insert_into(credentials::table)
            .values(&row)
            .execute(&mut conn)
            .await
            .map(|_| ())
            .map_err(|err| map_insert_error(err, record))
    }

    async fn find_by_email(
        &self,
        email: &EmailAddress,
    ) -> Result<Option<CredentialRecord>, CredentialStoreError> {
        let mut conn = self
            .pool
            .get()
            .await
            .map_err(|err| map_pool_error(err, CredentialStoreError::connection))?;

        let row: Option<CredentialRow> = credentials::table
            .filter(credentials::email.eq(email.as_str()))
            .select(CredentialRow::as_select())
            .first(&mut conn)
            .await
            .optional()
            .map_err(map_diesel_error)?;
        row.map(row_to_record).transpose()
    }

    async fn find_by_account(
        &self,
        account_id: &AccountId,
    ) -> Result<Option<CredentialRecord>, CredentialStoreError> {
        let mut conn = self
            .pool
            .get()
            .await
            .map_err(|err| map_pool_error(err, CredentialStoreError::connection))?;

        let row: Option<CredentialRow> = credentials::table
            .find(*account_id.as_uuid())
            .select(CredentialRow::as_select())
            .first(&mut conn)
            .await
            .optional()
            .map_err(map_diesel_error)?;
        row.map(row_to_record).transpose()
    }

    #[instrument(skip_all, fields(account_id = %account_id))]
    async fn delete(&self, account_id: &AccountId) -> Result<(), CredentialStoreError> {
        let mut conn = self
            .pool
            .get()
            .await
            .map_err(|err| map_pool_error(err, CredentialStoreError::connection))?;

        let id: Uuid = *account_id.as_uuid();
        diesel::delete(credentials::table.find(id))
            .execute(&mut conn)
            .await
            .map(|_| ())
            .map_err(map_diesel_error)
    }
}

#[cfg(test)]
mod tests {
    use chrono::Utc;
    use diesel::result::{DatabaseErrorKind, DatabaseErrorInformation, Error as DieselError};
    use rstest::rstest;

    use super::*;

    struct ConstraintInfo(&'static str);

    impl DatabaseErrorInformation for ConstraintInfo {
        fn message(&self) -> &str {
            "duplicate key value violates unique constraint"
        }
        fn details(&self) -> Option<&str> {
            None
        }
        fn hint(&self) -> Option<&str> {
            None
        }
        fn table_name(&self) -> Option<&str> {
            Some("credentials")
        }
        fn column_name(&self) -> Option<&str> {
            None
        }
        fn constraint_name(&self) -> Option<&str> {
            Some(self.0)
        }
        fn statement_position(&self) -> Option<i32> {
            None
        }
    }

    fn record() -> CredentialRecord {
        CredentialRecord {
            account_id: AccountId::random(),
            email: EmailAddress::new("a@x.com").expect("email"),
            password_hash: PasswordHash::new("h"),
            created_at: Utc::now(),
        }
    }

    #[rstest]
    #[case::email(EMAIL_CONSTRAINT, true)]
    #[case::primary_key("credentials_pkey", false)]
    fn unique_violations_are_classified_by_constraint(
        #[case] constraint: &'static str,
        #[case] is_email: bool,
    ) {
        let error = DieselError::DatabaseError(
            DatabaseErrorKind::UniqueViolation,
            Box::new(ConstraintInfo(constraint)),
        );
        let mapped = map_insert_error(error, &record());
        assert_eq!(
            matches!(mapped, CredentialStoreError::DuplicateEmail { .. }),
            is_email
        );
        assert!(!mapped.is_retryable());
    }

    #[rstest]
    fn corrupt_rows_are_reported_as_query_errors() {
        let row = CredentialRow {
            account_id: Uuid::new_v4(),
            email: "not-an-email".to_owned(),
            password_hash: "h".to_owned(),
            created_at: Utc::now(),
        };
        assert!(matches!(
            row_to_record(row),
            Err(CredentialStoreError::Query { .. })
        ));
    }
}
