//! Application-side types: the profile record, its billing subset, the
//! profile query outcome, and the merged user built from both sides.

use std::fmt;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::{AuthUser, UserId};

// ---------------------------------------------------------------------------
// ProfileRecord / BillingRecord
// ---------------------------------------------------------------------------

/// Profile keys written by the external billing-sync process.
pub mod billing_keys {
    pub const CUSTOMER_ID: &str = "stripe_customer_id";
    pub const SUBSCRIPTION_ID: &str = "stripe_subscription_id";
    pub const PRICE_ID: &str = "stripe_price_id";
    pub const SUBSCRIPTION_STATUS: &str = "stripe_subscription_status";
}

/// The application's own record for a user, keyed by identity id.
///
/// Stored as an open JSON object: the schema belongs to the profile store,
/// and this crate only reads the handful of keys it knows about.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ProfileRecord {
    pub fields: Map<String, Value>,
}

impl ProfileRecord {
    /// Wraps an existing field map.
    pub fn new(fields: Map<String, Value>) -> Self {
        Self { fields }
    }

    /// Builds a record from `(key, value)` pairs.
    pub fn from_pairs<K, V>(pairs: impl IntoIterator<Item = (K, V)>) -> Self
    where
        K: Into<String>,
        V: Into<Value>,
    {
        Self {
            fields: pairs
                .into_iter()
                .map(|(k, v)| (k.into(), v.into()))
                .collect(),
        }
    }

    /// Reads a string field. Non-string values count as absent.
    pub fn str_field(&self, key: &str) -> Option<&str> {
        str_field(&self.fields, key)
    }

    /// The billing subset, if the billing-sync process has written any of it.
    pub fn billing(&self) -> Option<BillingRecord> {
        BillingRecord::from_fields(&self.fields)
    }
}

fn str_field<'a>(fields: &'a Map<String, Value>, key: &str) -> Option<&'a str> {
    fields.get(key).and_then(Value::as_str)
}

/// Billing data reconciled from the payment provider. Read-only here.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct BillingRecord {
    pub customer_id: Option<String>,
    pub subscription_id: Option<String>,
    pub price_id: Option<String>,
    pub subscription_status: Option<String>,
}

impl BillingRecord {
    /// Extracts the billing keys from a profile field map.
    ///
    /// Returns `None` when none of the keys are present, so "no billing
    /// record" and "billing record with nothing filled in" can't be
    /// confused downstream.
    pub fn from_fields(fields: &Map<String, Value>) -> Option<Self> {
        let read = |key| str_field(fields, key).map(str::to_string);
        let record = Self {
            customer_id: read(billing_keys::CUSTOMER_ID),
            subscription_id: read(billing_keys::SUBSCRIPTION_ID),
            price_id: read(billing_keys::PRICE_ID),
            subscription_status: read(billing_keys::SUBSCRIPTION_STATUS),
        };
        (record != Self::default()).then_some(record)
    }
}

// ---------------------------------------------------------------------------
// Query results
// ---------------------------------------------------------------------------

/// The profile store's own status vocabulary.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum QueryStatus {
    Idle,
    Loading,
    Success,
    Error,
}

/// One raw update from a profile query handle: `{data, status, error}`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QuerySnapshot {
    pub status: QueryStatus,
    #[serde(default)]
    pub data: Option<ProfileRecord>,
    #[serde(default)]
    pub error: Option<String>,
}

impl QuerySnapshot {
    /// A query that has been issued but hasn't answered yet.
    pub fn loading() -> Self {
        Self {
            status: QueryStatus::Loading,
            data: None,
            error: None,
        }
    }

    /// A successful answer. `None` means no record exists for the key.
    pub fn success(data: Option<ProfileRecord>) -> Self {
        Self {
            status: QueryStatus::Success,
            data,
            error: None,
        }
    }

    /// A failed query.
    pub fn error(message: impl Into<String>) -> Self {
        Self {
            status: QueryStatus::Error,
            data: None,
            error: Some(message.into()),
        }
    }
}

/// The outcome of fetching the profile for one identity id.
#[derive(Debug, Clone, PartialEq, Default)]
pub enum ProfileQueryResult {
    /// Not answered yet.
    #[default]
    Pending,
    /// The store couldn't be reached or rejected the query.
    Failed { reason: String },
    /// The store answered. `None` means the profile hasn't been
    /// provisioned yet; callers treat that as still loading.
    Succeeded(Option<ProfileRecord>),
}

impl From<QuerySnapshot> for ProfileQueryResult {
    fn from(snapshot: QuerySnapshot) -> Self {
        match snapshot.status {
            QueryStatus::Idle | QueryStatus::Loading => Self::Pending,
            QueryStatus::Success => Self::Succeeded(snapshot.data),
            QueryStatus::Error => Self::Failed {
                reason: snapshot
                    .error
                    .unwrap_or_else(|| "profile query failed".to_string()),
            },
        }
    }
}

// ---------------------------------------------------------------------------
// MergedUser
// ---------------------------------------------------------------------------

/// An authenticated user with its profile overlaid.
///
/// `fields` holds the session fields (`id`, `email`, `email_confirmed_at`,
/// `provider`, plus the provider metadata) with every profile field written
/// on top, so the profile wins on a key collision.
#[derive(Debug, Clone, PartialEq)]
pub struct MergedAccount {
    pub id: UserId,
    pub provider: String,
    pub fields: Map<String, Value>,
}

impl MergedAccount {
    /// Unions a session user and a profile record. Profile keys win.
    pub fn new(session: &AuthUser, profile: &ProfileRecord) -> Self {
        let mut fields = session.metadata.clone();
        fields.insert("id".into(), Value::String(session.id.0.clone()));
        fields.insert("email".into(), Value::String(session.email.clone()));
        fields.insert(
            "email_confirmed_at".into(),
            session
                .email_confirmed_at
                .map_or(Value::Null, |at| Value::String(at.to_rfc3339())),
        );
        fields.insert("provider".into(), Value::String(session.provider.clone()));
        fields.extend(
            profile
                .fields
                .iter()
                .map(|(k, v)| (k.clone(), v.clone())),
        );

        Self {
            id: session.id.clone(),
            provider: session.provider.clone(),
            fields,
        }
    }

    /// Reads a string field of the merged view.
    pub fn str_field(&self, key: &str) -> Option<&str> {
        str_field(&self.fields, key)
    }

    /// The user's email, preferring the profile's mirrored copy.
    pub fn email(&self) -> Option<&str> {
        self.str_field("email")
    }

    /// The billing subset of the merged view.
    pub fn billing(&self) -> Option<BillingRecord> {
        BillingRecord::from_fields(&self.fields)
    }
}

/// Session state and profile data combined into one tri-state value.
///
/// `Authenticated` is only ever produced when the session is authenticated
/// AND the profile exists; every in-between situation is `Loading`.
#[derive(Debug, Clone, PartialEq, Default)]
pub enum MergedUser {
    #[default]
    Loading,
    Anonymous,
    Authenticated(MergedAccount),
}

impl fmt::Display for MergedUser {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Loading => write!(f, "loading"),
            Self::Anonymous => write!(f, "anonymous"),
            Self::Authenticated(account) => write!(f, "authenticated({})", account.id),
        }
    }
}

#[cfg(test)]
mod tests {
    use chrono::Utc;
    use serde_json::json;

    use super::*;

    fn auth_user() -> AuthUser {
        let mut metadata = Map::new();
        metadata.insert("full_name".into(), json!("Ada Lovelace"));
        AuthUser {
            id: UserId::new("u-1"),
            email: "ada@example.com".into(),
            email_confirmed_at: Some(Utc::now()),
            provider: "email".into(),
            metadata,
        }
    }

    #[test]
    fn test_query_status_serializes_lowercase() {
        let json = serde_json::to_string(&QuerySnapshot::loading()).unwrap();
        assert!(json.contains("\"status\":\"loading\""));
    }

    #[test]
    fn test_query_result_from_snapshot_maps_each_status() {
        let idle = QuerySnapshot {
            status: QueryStatus::Idle,
            data: None,
            error: None,
        };
        assert_eq!(ProfileQueryResult::from(idle), ProfileQueryResult::Pending);
        assert_eq!(
            ProfileQueryResult::from(QuerySnapshot::loading()),
            ProfileQueryResult::Pending
        );
        assert_eq!(
            ProfileQueryResult::from(QuerySnapshot::success(None)),
            ProfileQueryResult::Succeeded(None)
        );
        assert_eq!(
            ProfileQueryResult::from(QuerySnapshot::error("denied")),
            ProfileQueryResult::Failed {
                reason: "denied".into()
            }
        );
    }

    #[test]
    fn test_query_result_error_without_message_gets_fallback_reason() {
        let snapshot = QuerySnapshot {
            status: QueryStatus::Error,
            data: None,
            error: None,
        };
        assert!(matches!(
            ProfileQueryResult::from(snapshot),
            ProfileQueryResult::Failed { reason } if !reason.is_empty()
        ));
    }

    #[test]
    fn test_billing_absent_when_no_billing_keys() {
        let record = ProfileRecord::from_pairs([("name", "Ada")]);
        assert_eq!(record.billing(), None);
    }

    #[test]
    fn test_billing_reads_stripe_keys() {
        let record = ProfileRecord::from_pairs([
            (billing_keys::PRICE_ID, "price_123"),
            (billing_keys::SUBSCRIPTION_STATUS, "active"),
        ]);

        let billing = record.billing().expect("billing present");

        assert_eq!(billing.price_id.as_deref(), Some("price_123"));
        assert_eq!(billing.subscription_status.as_deref(), Some("active"));
        assert_eq!(billing.customer_id, None);
    }

    #[test]
    fn test_merged_account_profile_wins_on_collision() {
        let profile = ProfileRecord::from_pairs([
            ("email", "new@example.com"),
            ("full_name", "Countess of Lovelace"),
        ]);

        let merged = MergedAccount::new(&auth_user(), &profile);

        assert_eq!(merged.email(), Some("new@example.com"));
        assert_eq!(merged.str_field("full_name"), Some("Countess of Lovelace"));
        assert_eq!(merged.str_field("id"), Some("u-1"));
        assert_eq!(merged.provider, "email");
    }

    #[test]
    fn test_merged_account_keeps_session_fields_without_profile_overlap() {
        let profile = ProfileRecord::from_pairs([("name", "Ada")]);

        let merged = MergedAccount::new(&auth_user(), &profile);

        assert_eq!(merged.email(), Some("ada@example.com"));
        assert_eq!(merged.str_field("name"), Some("Ada"));
        assert!(merged.fields["email_confirmed_at"].is_string());
    }
}
