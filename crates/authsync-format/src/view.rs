//! The formatted user and the pure projection that builds it.

use std::fmt;

use authsync_protocol::{MergedAccount, UserId};
use authsync_provider::PlanLookup;
use serde::{Deserialize, Serialize};

/// The provider name the identity provider uses for email/password accounts.
const EMAIL_PROVIDER: &str = "email";

/// What the application calls email/password accounts.
const PASSWORD_PROVIDER: &str = "password";

/// Subscription statuses that count as a paying (or trialing) customer.
pub const ACTIVE_STATUSES: [&str; 2] = ["active", "trialing"];

// ---------------------------------------------------------------------------
// FormattedUser
// ---------------------------------------------------------------------------

/// The read-only view of a signed-in user handed to the UI layer.
///
/// Never mutated: a change upstream produces a new value.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FormattedUser {
    pub uid: UserId,
    pub email: Option<String>,
    /// Display name: the profile's `name`, else the provider's `full_name`.
    pub name: Option<String>,
    /// Avatar URL from `avatar_url`.
    pub picture: Option<String>,
    /// The provider name as reported by the identity provider.
    pub provider: String,
    /// Provider names in the application's vocabulary.
    pub providers: Vec<String>,
    pub customer_id: Option<String>,
    pub subscription_id: Option<String>,
    pub subscription_status: Option<String>,
    /// Friendly plan name for the subscribed price, if the price is known.
    pub plan_id: Option<String>,
    /// Whether the subscription grants access right now. Never absent:
    /// no billing record means `false`.
    pub plan_is_active: bool,
}

impl fmt::Display for FormattedUser {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.email {
            Some(email) => write!(f, "{} <{}>", self.uid, email),
            None => write!(f, "{}", self.uid),
        }
    }
}

/// Translates a provider name into the application's vocabulary.
///
/// Only `"email"` is renamed (to `"password"`); every other name passes
/// through unchanged.
pub fn provider_label(provider: &str) -> String {
    if provider == EMAIL_PROVIDER {
        PASSWORD_PROVIDER.to_string()
    } else {
        provider.to_string()
    }
}

/// Returns `true` if `status` is one of [`ACTIVE_STATUSES`].
pub fn is_active_status(status: Option<&str>) -> bool {
    status.is_some_and(|s| ACTIVE_STATUSES.contains(&s))
}

/// Projects a merged account into its presentation form.
///
/// Pure: structurally equal inputs give structurally equal outputs.
pub fn format_user<L: PlanLookup + ?Sized>(account: &MergedAccount, plans: &L) -> FormattedUser {
    let owned = |key: &str| account.str_field(key).map(str::to_string);
    let billing = account.billing().unwrap_or_default();

    let plan_id = billing
        .price_id
        .as_deref()
        .and_then(|price| plans.friendly_name(price));
    if let (None, Some(price)) = (&plan_id, &billing.price_id) {
        tracing::warn!(user_id = %account.id, price_id = %price, "unknown price id");
    }

    FormattedUser {
        uid: account.id.clone(),
        email: account.email().map(str::to_string),
        name: owned("name").or_else(|| owned("full_name")),
        picture: owned("avatar_url"),
        provider: account.provider.clone(),
        providers: vec![provider_label(&account.provider)],
        plan_is_active: is_active_status(billing.subscription_status.as_deref()),
        customer_id: billing.customer_id,
        subscription_id: billing.subscription_id,
        subscription_status: billing.subscription_status,
        plan_id,
    }
}

#[cfg(test)]
mod tests {
    use authsync_protocol::{billing_keys, AuthUser, ProfileRecord};
    use chrono::Utc;
    use serde_json::{json, Map};

    use super::*;
    use crate::PlanCatalog;

    // -- Helpers ----------------------------------------------------------

    fn account(provider: &str, metadata: Map<String, serde_json::Value>, profile: ProfileRecord) -> MergedAccount {
        let user = AuthUser {
            id: UserId::new("u-1"),
            email: "ada@example.com".into(),
            email_confirmed_at: Some(Utc::now()),
            provider: provider.into(),
            metadata,
        };
        MergedAccount::new(&user, &profile)
    }

    fn plain(profile: ProfileRecord) -> MergedAccount {
        account("email", Map::new(), profile)
    }

    fn catalog() -> PlanCatalog {
        PlanCatalog::from_pairs([("price_pro", "pro"), ("price_team", "team")])
    }

    fn billed(price: &str, status: &str) -> ProfileRecord {
        ProfileRecord::from_pairs([
            (billing_keys::CUSTOMER_ID, "cus_1"),
            (billing_keys::SUBSCRIPTION_ID, "sub_1"),
            (billing_keys::PRICE_ID, price),
            (billing_keys::SUBSCRIPTION_STATUS, status),
        ])
    }

    // =====================================================================
    // provider_label / is_active_status
    // =====================================================================

    #[test]
    fn test_provider_label_email_becomes_password() {
        assert_eq!(provider_label("email"), "password");
    }

    #[test]
    fn test_provider_label_other_names_pass_through() {
        for name in ["google", "github", "password", "Email"] {
            assert_eq!(provider_label(name), name);
        }
    }

    #[test]
    fn test_is_active_status_allow_list() {
        assert!(is_active_status(Some("active")));
        assert!(is_active_status(Some("trialing")));
        assert!(!is_active_status(Some("canceled")));
        assert!(!is_active_status(Some("past_due")));
        assert!(!is_active_status(Some("")));
        assert!(!is_active_status(None));
    }

    // =====================================================================
    // format_user
    // =====================================================================

    #[test]
    fn test_format_user_identity_fields() {
        let formatted = format_user(
            &plain(ProfileRecord::from_pairs([
                ("name", "Ada"),
                ("avatar_url", "https://cdn.example.com/ada.png"),
            ])),
            &catalog(),
        );

        assert_eq!(formatted.uid, UserId::new("u-1"));
        assert_eq!(formatted.email.as_deref(), Some("ada@example.com"));
        assert_eq!(formatted.name.as_deref(), Some("Ada"));
        assert_eq!(
            formatted.picture.as_deref(),
            Some("https://cdn.example.com/ada.png")
        );
        assert_eq!(formatted.provider, "email");
        assert_eq!(formatted.providers, vec!["password".to_string()]);
    }

    #[test]
    fn test_format_user_name_falls_back_to_full_name() {
        let mut metadata = Map::new();
        metadata.insert("full_name".into(), json!("Ada Lovelace"));

        let formatted = format_user(&account("google", metadata, ProfileRecord::default()), &catalog());

        assert_eq!(formatted.name.as_deref(), Some("Ada Lovelace"));
        assert_eq!(formatted.providers, vec!["google".to_string()]);
    }

    #[test]
    fn test_format_user_profile_email_wins() {
        let formatted = format_user(
            &plain(ProfileRecord::from_pairs([("email", "countess@example.com")])),
            &catalog(),
        );
        assert_eq!(formatted.email.as_deref(), Some("countess@example.com"));
    }

    #[test]
    fn test_format_user_known_price_maps_to_plan() {
        let formatted = format_user(&plain(billed("price_pro", "active")), &catalog());

        assert_eq!(formatted.plan_id.as_deref(), Some("pro"));
        assert!(formatted.plan_is_active);
        assert_eq!(formatted.customer_id.as_deref(), Some("cus_1"));
        assert_eq!(formatted.subscription_id.as_deref(), Some("sub_1"));
        assert_eq!(formatted.subscription_status.as_deref(), Some("active"));
    }

    #[test]
    fn test_format_user_trialing_is_active() {
        let formatted = format_user(&plain(billed("price_team", "trialing")), &catalog());
        assert!(formatted.plan_is_active);
    }

    #[test]
    fn test_format_user_canceled_is_inactive_but_keeps_plan() {
        let formatted = format_user(&plain(billed("price_pro", "canceled")), &catalog());

        assert_eq!(formatted.plan_id.as_deref(), Some("pro"));
        assert!(!formatted.plan_is_active);
    }

    #[test]
    fn test_format_user_unknown_price_has_no_plan() {
        let formatted = format_user(&plain(billed("price_legacy", "active")), &catalog());

        assert_eq!(formatted.plan_id, None);
        assert!(formatted.plan_is_active);
    }

    #[test]
    fn test_format_user_without_billing_has_no_plan_and_is_inactive() {
        let formatted = format_user(&plain(ProfileRecord::from_pairs([("name", "Ada")])), &catalog());

        assert_eq!(formatted.plan_id, None);
        assert_eq!(formatted.customer_id, None);
        assert_eq!(formatted.subscription_status, None);
        assert!(!formatted.plan_is_active);
    }

    #[test]
    fn test_format_user_is_pure() {
        let input = plain(billed("price_pro", "past_due"));
        assert_eq!(format_user(&input, &catalog()), format_user(&input.clone(), &catalog()));
    }

    #[test]
    fn test_formatted_user_display() {
        let formatted = format_user(&plain(ProfileRecord::default()), &catalog());
        assert_eq!(formatted.to_string(), "u-1 <ada@example.com>");
    }
}
