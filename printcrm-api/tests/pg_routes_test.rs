/// End-to-end flows against PostgreSQL with session-backed identities
///
/// Ignored by default; needs a database at DATABASE_URL:
///
/// ```text
/// cargo test -p printcrm-api --test pg_routes_test -- --ignored --test-threads=1
/// ```

mod common;

use axum::http::{Method, StatusCode};
use common::{send, PgContext};
use serde_json::json;
use uuid::Uuid;

const PASSWORD: &str = "Banner#2024";

async fn register(ctx: &PgContext) -> (String, String) {
    let email = format!("{}@printcrm.test", Uuid::new_v4());
    let response = send(
        &ctx.app,
        Method::POST,
        "/v1/auth/register",
        None,
        Some(json!({ "email": email, "password": PASSWORD, "name": "Ravi" })),
    )
    .await;
    assert_eq!(response.status, StatusCode::CREATED, "{}", response.text());

    let token = response.json()["access_token"].as_str().unwrap().to_string();
    (email, token)
}

#[tokio::test]
#[ignore = "requires PostgreSQL"]
async fn test_register_export_delete_flow() {
    let ctx = PgContext::new().await.unwrap();
    let (email, token) = register(&ctx).await;
    let auth = Some(token.as_str());

    let customer = send(
        &ctx.app,
        Method::POST,
        "/v1/customers",
        auth,
        Some(json!({ "name": "Sharma Prints", "phone": "+91 98450 00000" })),
    )
    .await;
    assert_eq!(customer.status, StatusCode::CREATED);
    let customer_id = customer.json()["id"].as_str().unwrap().to_string();

    let order = send(
        &ctx.app,
        Method::POST,
        "/v1/orders",
        auth,
        Some(json!({
            "customer_id": customer_id,
            "product_type": "Flex banner",
            "quantity": 2,
            "total_amount_cents": 40_000,
            "advance_paid_cents": 10_000
        })),
    )
    .await;
    assert_eq!(order.status, StatusCode::CREATED, "{}", order.text());
    let order_json = order.json();
    assert!(order_json["order_number"].as_str().unwrap().starts_with("ORD-"));

    // Advance alone, above the stored total
    let overpaid = send(
        &ctx.app,
        Method::PATCH,
        &format!("/v1/orders/{}", order_json["id"].as_str().unwrap()),
        auth,
        Some(json!({ "advance_paid_cents": 50_000 })),
    )
    .await;
    assert_eq!(overpaid.status, StatusCode::UNPROCESSABLE_ENTITY, "{}", overpaid.text());
    assert_eq!(overpaid.json()["details"][0]["field"], "advance_paid_cents");

    let payment = send(
        &ctx.app,
        Method::POST,
        "/v1/payments",
        auth,
        Some(json!({
            "order_id": order_json["id"],
            "amount_cents": 10_000,
            "method": "upi",
            "status": "completed"
        })),
    )
    .await;
    assert_eq!(payment.status, StatusCode::CREATED, "{}", payment.text());

    // Customer still has an order
    let blocked = send(
        &ctx.app,
        Method::DELETE,
        &format!("/v1/customers/{}", customer_id),
        auth,
        None,
    )
    .await;
    assert_eq!(blocked.status, StatusCode::CONFLICT);

    let export = send(&ctx.app, Method::GET, "/v1/auth/export-data", auth, None).await;
    assert_eq!(export.status, StatusCode::OK);
    assert_eq!(export.header("x-export-status"), Some("complete"));
    let export_json = export.json();
    assert_eq!(export_json["export_info"]["user_email"], email.as_str());
    assert_eq!(export_json["export_info"]["total_records"]["payments"], 1);

    let summary = send(&ctx.app, Method::GET, "/v1/reports/summary", auth, None).await;
    assert_eq!(summary.status, StatusCode::OK);
    let summary = summary.json();
    assert_eq!(summary["total_revenue_cents"], 10_000);
    assert!(summary["previous"].is_null());

    let trend = summary["revenue_by_month"].as_array().unwrap();
    assert_eq!(trend.len(), 12);
    assert_eq!(trend[11]["revenue_cents"], 10_000);
    assert_eq!(trend[0]["revenue_cents"], 0);

    assert_eq!(summary["top_products"][0]["product_type"], "Flex banner");
    assert_eq!(summary["top_products"][0]["orders"], 1);
    assert_eq!(summary["top_products"][0]["share_percent"], 100.0);

    let monthly = send(
        &ctx.app,
        Method::GET,
        "/v1/reports/summary?period=this_month",
        auth,
        None,
    )
    .await
    .json();
    assert_eq!(monthly["total_orders"], 1);
    assert_eq!(monthly["previous"]["total_orders"], 0);
    assert_eq!(monthly["previous"]["total_revenue_cents"], 0);
    assert!(monthly["previous"]["revenue_change_percent"].is_null());
    assert_eq!(monthly["previous"]["period_end"], monthly["period_start"]);

    let deleted = send(&ctx.app, Method::DELETE, "/v1/auth/delete-account", auth, None).await;
    assert_eq!(deleted.status, StatusCode::OK, "{}", deleted.text());
    assert_eq!(deleted.json()["success"], true);

    let me = send(&ctx.app, Method::GET, "/v1/auth/me", auth, None).await;
    assert_eq!(me.status, StatusCode::UNAUTHORIZED);

    let login = send(
        &ctx.app,
        Method::POST,
        "/v1/auth/login",
        None,
        Some(json!({ "email": email, "password": PASSWORD })),
    )
    .await;
    assert_eq!(login.status, StatusCode::UNAUTHORIZED);
}

#[tokio::test]
#[ignore = "requires PostgreSQL"]
async fn test_other_users_records_are_not_found() {
    let ctx = PgContext::new().await.unwrap();
    let (_, owner) = register(&ctx).await;
    let (_, intruder) = register(&ctx).await;

    let customer = send(
        &ctx.app,
        Method::POST,
        "/v1/customers",
        Some(owner.as_str()),
        Some(json!({ "name": "Kumar Graphics" })),
    )
    .await;
    let customer_id = customer.json()["id"].as_str().unwrap().to_string();

    let peek = send(
        &ctx.app,
        Method::GET,
        &format!("/v1/customers/{}", customer_id),
        Some(intruder.as_str()),
        None,
    )
    .await;
    assert_eq!(peek.status, StatusCode::NOT_FOUND);

    let order = send(
        &ctx.app,
        Method::POST,
        "/v1/orders",
        Some(intruder.as_str()),
        Some(json!({
            "customer_id": customer_id,
            "product_type": "Visiting cards",
            "quantity": 500,
            "total_amount_cents": 1_500
        })),
    )
    .await;
    assert_eq!(order.status, StatusCode::NOT_FOUND);

    let list = send(&ctx.app, Method::GET, "/v1/customers", Some(intruder.as_str()), None).await;
    assert_eq!(list.json(), json!([]));
}

#[tokio::test]
#[ignore = "requires PostgreSQL"]
async fn test_logout_revokes_session() {
    let ctx = PgContext::new().await.unwrap();
    let (_, token) = register(&ctx).await;

    let logout = send(&ctx.app, Method::POST, "/v1/auth/logout", Some(token.as_str()), None).await;
    assert_eq!(logout.status, StatusCode::NO_CONTENT);

    let me = send(&ctx.app, Method::GET, "/v1/auth/me", Some(token.as_str()), None).await;
    assert_eq!(me.status, StatusCode::UNAUTHORIZED);
}
