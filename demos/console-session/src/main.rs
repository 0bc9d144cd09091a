//! Walks one user through sign-up, profile provisioning, a subscription,
//! an email change and sign-out, printing what a protected page would
//! render at each step.
//!
//! Run with `RUST_LOG=debug` to see every pipeline transition.

use std::sync::Arc;
use std::time::Duration;

use authsync::prelude::*;
use authsync_protocol::billing_keys;
use serde_json::json;

const CONFIG: &str = r#"{
    "sign_in_path": "/auth/signin",
    "plans": { "price_pro_monthly": "pro", "price_team_monthly": "team" }
}"#;

/// Renders the protected page, or a placeholder.
fn render<N: Navigator>(gate: &mut Gate<N>, user: &CurrentUser) {
    match gate.guard_user(user, |u| {
        format!(
            "{} ({}) via {:?}, plan {:?}, active: {}",
            u.name.as_deref().unwrap_or("unnamed"),
            u.email.as_deref().unwrap_or("-"),
            u.providers,
            u.plan_id,
            u.plan_is_active,
        )
    }) {
        Ok(GateOutcome::Content(page)) => println!("  [page] {page}"),
        Ok(GateOutcome::Placeholder) => println!("  [page] loading..."),
        Err(e) => println!("  [page] error boundary: {e}"),
    }
}

/// Gives the pipeline a moment to settle, then renders.
async fn step<N: Navigator>(label: &str, gate: &mut Gate<N>, coordinator_user: impl Fn() -> CurrentUser) {
    tokio::time::sleep(Duration::from_millis(20)).await;
    println!("{label}");
    render(gate, &coordinator_user());
}

#[tokio::main]
async fn main() -> Result<(), AuthsyncError> {
    authsync::telemetry::init();

    let provider = Arc::new(MemoryIdentityProvider::new());
    let store = Arc::new(MemoryProfileStore::new());

    let coordinator = Coordinator::builder(Arc::clone(&provider), Arc::clone(&store))
        .config(CoordinatorConfig::from_json(CONFIG)?)
        .location("https://app.example.com/dashboard")
        .start();
    let mut gate = coordinator.gate(|to: &str| println!("  [nav] redirect to {to}"));

    step("visitor opens the dashboard", &mut gate, || coordinator.user()).await;

    let user = coordinator.sign_up("ada@example.com", "correct horse").await?;
    step("signed up, profile not provisioned yet", &mut gate, || coordinator.user()).await;

    store.insert(&user.id, ProfileRecord::from_pairs([("name", "Ada")]));
    step("profile provisioned", &mut gate, || coordinator.user()).await;

    store.insert(
        &user.id,
        ProfileRecord::from_pairs([
            ("name", "Ada"),
            (billing_keys::CUSTOMER_ID, "cus_demo"),
            (billing_keys::SUBSCRIPTION_ID, "sub_demo"),
            (billing_keys::PRICE_ID, "price_pro_monthly"),
            (billing_keys::SUBSCRIPTION_STATUS, "trialing"),
        ]),
    );
    step("billing synced", &mut gate, || coordinator.user()).await;
    if let FormattedState::Authenticated(u) = coordinator.user()? {
        println!("  [billing] customer {:?}, status {:?}", u.customer_id, u.subscription_status);
    }

    let changes = json!({ "name": "Ada Lovelace", "avatar_url": "https://cdn.example.com/ada.png" });
    if let serde_json::Value::Object(fields) = changes {
        coordinator.update_profile_fields(fields).await?;
    }
    step("profile edited", &mut gate, || coordinator.user()).await;

    match coordinator.update_email("countess@example.com").await {
        Err(AuthsyncError::Session(SessionError::ConfirmationPending)) => {
            println!("email change requested, check your inbox");
        }
        other => other?,
    }
    provider.confirm_email_change(&user.id);
    step("email change confirmed", &mut gate, || coordinator.user()).await;

    coordinator.sign_out().await?;
    step("signed out", &mut gate, || coordinator.user()).await;
    step("still signed out (no second redirect)", &mut gate, || coordinator.user()).await;

    coordinator.shutdown().await;
    tracing::info!("demo finished");
    Ok(())
}
