//! Side-effect job descriptors handed to the job queue.

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde_json::json;

use super::{AccountId, EmailAddress, Username};

/// Kind of asynchronous side effect.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum JobType {
    /// Send the welcome email to a new account.
    WelcomeEmail,
    /// Emit the signup analytics event.
    SignupAnalytics,
}

impl JobType {
    /// Stable wire name used by queue adapters.
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::WelcomeEmail => "welcome_email",
            Self::SignupAnalytics => "signup_analytics",
        }
    }
}

impl fmt::Display for JobType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Error returned when parsing an unknown job type name.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown job type: {0}")]
pub struct ParseJobTypeError(pub String);

impl FromStr for JobType {
    type Err = ParseJobTypeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "welcome_email" => Ok(Self::WelcomeEmail),
            "signup_analytics" => Ok(Self::SignupAnalytics),
            other => Err(ParseJobTypeError(other.to_owned())),
        }
    }
}

/// Fire-and-forget job owned by the queue once accepted.
#[derive(Debug, Clone, PartialEq)]
pub struct JobDescriptor {
    pub job_type: JobType,
    pub payload: serde_json::Value,
    pub account_id: AccountId,
    pub enqueued_at: DateTime<Utc>,
}

impl JobDescriptor {
    /// Welcome email addressed to the new account.
    pub fn welcome_email(
        account_id: AccountId,
        email: &EmailAddress,
        username: &Username,
        enqueued_at: DateTime<Utc>,
    ) -> Self {
        Self {
            job_type: JobType::WelcomeEmail,
            payload: json!({
                "accountId": account_id.to_string(),
                "email": email.as_str(),
                "username": username.as_str(),
            }),
            account_id,
            enqueued_at,
        }
    }

    /// Analytics event for a completed signup. Carries no contact details.
    pub fn signup_analytics(
        account_id: AccountId,
        registered_at: DateTime<Utc>,
        enqueued_at: DateTime<Utc>,
    ) -> Self {
        Self {
            job_type: JobType::SignupAnalytics,
            payload: json!({
                "accountId": account_id.to_string(),
                "event": "signup_completed",
                "registeredAt": registered_at.to_rfc3339(),
            }),
            account_id,
            enqueued_at,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case(JobType::WelcomeEmail)]
    #[case(JobType::SignupAnalytics)]
    fn job_type_names_parse_back(#[case] job_type: JobType) {
        assert_eq!(job_type.as_str().parse::<JobType>(), Ok(job_type));
    }

    #[test]
    fn unknown_job_type_is_rejected() {
        assert_eq!(
            "reindex".parse::<JobType>(),
            Err(ParseJobTypeError("reindex".to_owned()))
        );
    }

    #[test]
    fn analytics_payload_omits_contact_details() {
        let now = Utc::now();
        let job = JobDescriptor::signup_analytics(AccountId::random(), now, now);
        assert!(job.payload.get("email").is_none());
        assert_eq!(job.payload["event"], "signup_completed");
    }
}
