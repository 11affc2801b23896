/// Export and deletion endpoints over the in-memory store
///
/// Run with: cargo test -p printcrm-api --test account_routes_test

mod common;

use axum::http::{Method, StatusCode};
use common::{test_config, MemoryContext};
use printcrm_shared::account::store::{EntityKind, StoreOperation};
use printcrm_shared::identity::fixed::DEMO_USER_ID;
use printcrm_shared::identity::FixedIdentityProvider;
use uuid::Uuid;

const EXPORT: &str = "/v1/auth/export-data";
const DELETE: &str = "/v1/auth/delete-account";

/// Customer with one order paid in two instalments and a job card, plus a
/// quotation and a lead
fn seed_account(ctx: &MemoryContext, user_id: Uuid) {
    let customer = ctx.store.add_customer(user_id, "Sharma Prints");
    let order = ctx.store.add_order(customer).unwrap();
    ctx.store.add_payment(order, 20_000).unwrap();
    ctx.store.add_payment(order, 5_000).unwrap();
    ctx.store.add_job_card(order, "Print flex").unwrap();
    ctx.store.add_quotation(customer).unwrap();
    ctx.store.add_lead(customer).unwrap();
}

#[tokio::test]
async fn test_unauthenticated_export_reads_nothing() {
    let ctx = MemoryContext::new(FixedIdentityProvider::signed_out());

    let response = ctx.send(Method::GET, EXPORT).await;

    assert_eq!(response.status, StatusCode::UNAUTHORIZED);
    let body = response.json();
    assert_eq!(body["error"], "User not authenticated");
    assert_eq!(body["code"], "unauthorized");
    assert!(ctx.store.journal().is_empty());
}

#[tokio::test]
async fn test_unauthenticated_delete_touches_nothing() {
    let ctx = MemoryContext::new(FixedIdentityProvider::signed_out());
    seed_account(&ctx, Uuid::new_v4());
    ctx.store.clear_journal();

    let response = ctx.send(Method::DELETE, DELETE).await;

    assert_eq!(response.status, StatusCode::UNAUTHORIZED);
    assert_eq!(response.json()["error"], "User not authenticated");
    assert!(ctx.store.journal().is_empty());
    assert_eq!(ctx.store.count(EntityKind::Customers), 1);
}

#[tokio::test]
async fn test_export_is_pretty_json_attachment() {
    let ctx = MemoryContext::new(FixedIdentityProvider::demo());
    seed_account(&ctx, DEMO_USER_ID);

    let response = ctx.send(Method::GET, EXPORT).await;

    assert_eq!(response.status, StatusCode::OK);
    assert!(response
        .header("content-type")
        .unwrap()
        .starts_with("application/json"));

    let disposition = response.header("content-disposition").unwrap();
    assert!(disposition.starts_with("attachment; filename=\"printcrm-data-export-"));
    assert!(disposition.ends_with(".json\""));
    assert_eq!(response.header("x-export-status"), Some("complete"));
    assert_eq!(response.header("cache-control"), Some("no-store"));

    assert!(response.text().contains("\n  \"export_info\""));

    let body = response.json();
    let totals = &body["export_info"]["total_records"];
    assert_eq!(totals["customers"], 1);
    assert_eq!(totals["orders"], 1);
    assert_eq!(totals["payments"], 2);
    assert_eq!(totals["job_cards"], 1);
    assert_eq!(totals["quotations"], 1);
    assert_eq!(totals["leads"], 1);
    assert_eq!(body["export_info"]["user_email"], "demo@signtrack.com");
    assert_eq!(body["user_profile"]["id"], DEMO_USER_ID.to_string());
    assert_eq!(body["payments"].as_array().unwrap().len(), 2);
}

#[tokio::test]
async fn test_export_filename_uses_configured_prefix_and_export_date() {
    let ctx = MemoryContext::with_config(
        FixedIdentityProvider::demo(),
        test_config(&[("EXPORT_FILENAME_PREFIX", "signtrack")]),
    );

    let response = ctx.send(Method::GET, EXPORT).await;
    let body = response.json();
    let date = &body["export_info"]["exported_at"].as_str().unwrap()[..10];

    assert_eq!(
        response.header("content-disposition").unwrap(),
        format!("attachment; filename=\"signtrack-data-export-{}.json\"", date)
    );
}

#[tokio::test]
async fn test_failed_section_marks_export_partial() {
    let ctx = MemoryContext::new(FixedIdentityProvider::demo());
    seed_account(&ctx, DEMO_USER_ID);
    ctx.store.fail_on(EntityKind::Payments, StoreOperation::Select);

    let response = ctx.send(Method::GET, EXPORT).await;

    assert_eq!(response.status, StatusCode::OK);
    assert_eq!(response.header("x-export-status"), Some("partial"));

    let body = response.json();
    assert_eq!(
        body["export_info"]["incomplete_sections"],
        serde_json::json!(["payments"])
    );
    assert_eq!(body["payments"], serde_json::json!([]));
    assert_eq!(body["export_info"]["total_records"]["orders"], 1);
}

#[tokio::test]
async fn test_delete_account_removes_everything() {
    let ctx = MemoryContext::new(FixedIdentityProvider::demo());
    seed_account(&ctx, DEMO_USER_ID);

    let response = ctx.send(Method::DELETE, DELETE).await;

    assert_eq!(response.status, StatusCode::OK);
    let body = response.json();
    assert_eq!(body["success"], true);
    assert_eq!(
        body["message"],
        "Account and all associated data have been permanently deleted"
    );

    let steps: Vec<&str> = body["steps"]
        .as_array()
        .unwrap()
        .iter()
        .map(|s| s["step"].as_str().unwrap())
        .collect();
    assert_eq!(
        steps,
        vec![
            "payments",
            "job_cards",
            "orders",
            "quotations",
            "leads",
            "customers",
            "identity",
            "session"
        ]
    );
    assert_eq!(body["steps"][0]["status"], "deleted");
    assert_eq!(body["steps"][0]["rows"], 2);

    for kind in EntityKind::ALL {
        assert_eq!(ctx.store.count(kind), 0, "{} should be empty", kind);
    }
    assert!(!ctx.provider.is_present().await);
}

#[tokio::test]
async fn test_second_delete_is_unauthenticated() {
    let ctx = MemoryContext::new(FixedIdentityProvider::demo());
    seed_account(&ctx, DEMO_USER_ID);

    assert_eq!(ctx.send(Method::DELETE, DELETE).await.status, StatusCode::OK);
    ctx.store.clear_journal();

    let again = ctx.send(Method::DELETE, DELETE).await;
    assert_eq!(again.status, StatusCode::UNAUTHORIZED);
    assert_eq!(again.json()["error"], "User not authenticated");

    assert_eq!(ctx.send(Method::GET, EXPORT).await.status, StatusCode::UNAUTHORIZED);
    assert!(ctx.store.journal().is_empty());
}

#[tokio::test]
async fn test_identity_removal_failure_is_generic_500() {
    let ctx = MemoryContext::new(
        FixedIdentityProvider::demo().failing_removal("auth backend timed out"),
    );
    seed_account(&ctx, DEMO_USER_ID);

    let response = ctx.send(Method::DELETE, DELETE).await;

    assert_eq!(response.status, StatusCode::INTERNAL_SERVER_ERROR);
    let body = response.json();
    assert_eq!(body["error"], "Failed to delete user account");
    assert!(!response.text().contains("timed out"));
    assert!(ctx.provider.is_present().await);
}

#[tokio::test]
async fn test_best_effort_reports_failed_step_without_reason() {
    let ctx = MemoryContext::new(FixedIdentityProvider::demo());
    seed_account(&ctx, DEMO_USER_ID);
    ctx.store.fail_on(EntityKind::Leads, StoreOperation::Delete);

    let response = ctx.send(Method::DELETE, DELETE).await;

    assert_eq!(response.status, StatusCode::OK);
    let body = response.json();
    let leads = body["steps"]
        .as_array()
        .unwrap()
        .iter()
        .find(|s| s["step"] == "leads")
        .unwrap();
    assert_eq!(leads["status"], "failed");
    assert!(leads.get("reason").is_none());

    // The customer is still referenced by its lead, so it cannot go either.
    let customers = body["steps"]
        .as_array()
        .unwrap()
        .iter()
        .find(|s| s["step"] == "customers")
        .unwrap();
    assert_eq!(customers["status"], "failed");
    assert_eq!(body["steps"][6]["step"], "identity");
    assert_eq!(body["steps"][6]["status"], "deleted");
}

#[tokio::test]
async fn test_halt_on_failure_keeps_account() {
    let ctx = MemoryContext::with_config(
        FixedIdentityProvider::demo(),
        test_config(&[("DELETION_POLICY", "halt_on_failure")]),
    );
    seed_account(&ctx, DEMO_USER_ID);
    ctx.store.fail_on(EntityKind::Orders, StoreOperation::Delete);

    let response = ctx.send(Method::DELETE, DELETE).await;

    assert_eq!(response.status, StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(response.json()["error"], "Failed to delete user account");
    assert!(ctx.provider.is_present().await);
    assert_eq!(ctx.store.count(EntityKind::Payments), 0);
    assert_eq!(ctx.store.count(EntityKind::Orders), 1);
    assert_eq!(ctx.store.count(EntityKind::Customers), 1);

    ctx.store.clear_failures();
    let retry = ctx.send(Method::DELETE, DELETE).await;
    assert_eq!(retry.status, StatusCode::OK);
    assert_eq!(ctx.store.count(EntityKind::Customers), 0);
}

#[tokio::test]
async fn test_me_returns_profile() {
    let ctx = MemoryContext::new(FixedIdentityProvider::demo());

    let response = ctx.send(Method::GET, "/v1/auth/me").await;

    assert_eq!(response.status, StatusCode::OK);
    let body = response.json();
    assert_eq!(body["email"], "demo@signtrack.com");
    assert_eq!(body["id"], DEMO_USER_ID.to_string());
}

#[tokio::test]
async fn test_protected_resource_requires_identity() {
    let ctx = MemoryContext::new(FixedIdentityProvider::signed_out());

    for uri in ["/v1/customers", "/v1/orders", "/v1/reports/summary"] {
        let response = ctx.send(Method::GET, uri).await;
        assert_eq!(response.status, StatusCode::UNAUTHORIZED, "{}", uri);
        assert_eq!(response.json()["code"], "unauthorized");
    }
}

#[tokio::test]
async fn test_health_reports_unreachable_database() {
    let ctx = MemoryContext::new(FixedIdentityProvider::demo());

    let response = ctx.send(Method::GET, "/health").await;

    assert_eq!(response.status, StatusCode::SERVICE_UNAVAILABLE);
    let body = response.json();
    assert_eq!(body["status"], "degraded");
    assert_eq!(body["database"], "disconnected");
    assert!(body["version"].is_string());
}
