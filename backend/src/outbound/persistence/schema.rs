//! Diesel table definitions for the PostgreSQL schema.
//!
//! These definitions must match `backend/migrations` exactly. When a
//! migration changes the schema, regenerate them with `diesel print-schema`
//! or update them by hand.

diesel::table! {
    /// Hashed credentials, unique by email (`credentials_email_key`).
    credentials (account_id) {
        account_id -> Uuid,
        #[max_length = 254]
        email -> Varchar,
        password_hash -> Text,
        created_at -> Timestamptz,
    }
}

diesel::table! {
    /// Public profiles, unique by username (`profiles_username_key`).
    profiles (account_id) {
        account_id -> Uuid,
        #[max_length = 32]
        username -> Varchar,
        display_attributes -> Jsonb,
        created_at -> Timestamptz,
    }
}

diesel::table! {
    /// One row per idempotency key.
    ///
    /// `state` is `in_flight` or `terminal`; `outcome` is set exactly when the
    /// state is terminal.
    registration_ledger (idempotency_key) {
        #[max_length = 255]
        idempotency_key -> Varchar,
        #[max_length = 64]
        fingerprint -> Varchar,
        claim_token -> Uuid,
        account_id -> Uuid,
        #[max_length = 16]
        state -> Varchar,
        outcome -> Nullable<Jsonb>,
        started_at -> Timestamptz,
        expires_at -> Timestamptz,
    }
}

diesel::table! {
    reconciliation_flags (account_id) {
        account_id -> Uuid,
        #[max_length = 254]
        email -> Varchar,
        #[max_length = 32]
        reason -> Varchar,
        flagged_at -> Timestamptz,
    }
}

diesel::table! {
    /// Transactional outbox drained by external job workers.
    queued_jobs (id) {
        id -> Uuid,
        #[max_length = 64]
        job_type -> Varchar,
        account_id -> Uuid,
        payload -> Jsonb,
        enqueued_at -> Timestamptz,
    }
}

diesel::allow_tables_to_appear_in_same_query!(
    credentials,
    profiles,
    registration_ledger,
    reconciliation_flags,
    queued_jobs,
);
