//! End-to-end flows against a live Postgres. Run with
//! `DATABASE_URL=postgres://... cargo test -- --ignored`.

mod common;

use actix_web::http::StatusCode;
use actix_web::{test, web, App};
use bitereserve_server::billing::webhook::sign_payload;
use bitereserve_server::db::models::{Plan, Restaurant, Subscription, SubscriptionStatus};
use bitereserve_server::restaurants::{self, RestaurantDraft};
use bitereserve_server::{configure, maintenance, AppState};
use serde_json::{json, Value};
use uuid::Uuid;

macro_rules! live_app {
    () => {{
        let (state, mailer) = common::live_state().await;
        let app = test::init_service(
            App::new()
                .app_data(web::Data::new(state.clone()))
                .configure(configure),
        )
        .await;
        (app, state, mailer)
    }};
}

macro_rules! call_json {
    ($app:expr, $req:expr) => {{
        let resp = test::call_service(&$app, $req.to_request()).await;
        let status = resp.status();
        let body = test::read_body(resp).await;
        let json: Value = if body.is_empty() {
            Value::Null
        } else {
            serde_json::from_slice(&body).unwrap_or(Value::Null)
        };
        (status, json)
    }};
}

fn bearer(token: &str) -> (&'static str, String) {
    ("Authorization", format!("Bearer {}", token))
}

async fn admin_token(state: &AppState) -> String {
    let email = common::unique_email("admin");
    let admin = state.auth_service.register(&email, "admin password", None).await.unwrap();
    sqlx::query("UPDATE users SET role = 'admin' WHERE id = $1")
        .bind(admin.id)
        .execute(state.db.pool())
        .await
        .unwrap();
    state.auth_service.authenticate(&email, "admin password").await.unwrap()
}

async fn listed_restaurant(state: &AppState) -> Restaurant {
    let draft: RestaurantDraft = serde_json::from_value(json!({
        "name": format!("Trattoria {}", Uuid::new_v4().simple()),
        "city": "Rome",
        "country_code": "IT",
    }))
    .unwrap();
    restaurants::create_restaurant(&state.db, draft).await.unwrap()
}

/// A restaurant whose claim was approved with a fresh Pro trial, plus the
/// owner's token.
async fn owned_restaurant(state: &AppState) -> (Restaurant, String) {
    let restaurant = listed_restaurant(state).await;
    let email = common::unique_email("owner");
    let owner = state.auth_service.register(&email, "owner password", None).await.unwrap();
    state.db.request_claim(restaurant.id, owner.id, None).await.unwrap().unwrap();
    let trial = Subscription::new_trial(restaurant.id, Plan::Pro, 14);
    let (restaurant, _) = state.db.approve_claim(restaurant.id, &trial).await.unwrap().unwrap();
    let token = state.auth_service.authenticate(&email, "owner password").await.unwrap();
    (restaurant, token)
}

fn signed_event(state: &AppState, event: Value) -> test::TestRequest {
    let payload = event.to_string();
    let header = sign_payload(
        payload.as_bytes(),
        &state.config.stripe.webhook_secret,
        chrono::Utc::now().timestamp(),
    )
    .unwrap();
    test::TestRequest::post()
        .uri("/api/webhooks/stripe")
        .insert_header(("Stripe-Signature", header))
        .set_payload(payload)
}

#[test_log::test(actix_web::test)]
#[ignore = "requires DATABASE_URL"]
async fn register_login_logout() {
    let (app, _state, _) = live_app!();
    let email = common::unique_email("owner");

    let (status, body) = call_json!(
        app,
        test::TestRequest::post()
            .uri("/api/auth/register")
            .set_json(json!({ "email": email.to_uppercase(), "password": "correct horse", "display_name": "Owner" }))
    );
    assert_eq!(status, StatusCode::CREATED);
    let token = body["token"].as_str().unwrap().to_string();

    let (status, _) = call_json!(
        app,
        test::TestRequest::post()
            .uri("/api/auth/register")
            .set_json(json!({ "email": email, "password": "correct horse" }))
    );
    assert_eq!(status, StatusCode::CONFLICT);

    let (status, _) = call_json!(
        app,
        test::TestRequest::post()
            .uri("/api/auth/login")
            .set_json(json!({ "email": email, "password": "wrong horse" }))
    );
    assert_eq!(status, StatusCode::UNAUTHORIZED);

    let (status, me) = call_json!(app, test::TestRequest::get().uri("/api/me").insert_header(bearer(&token)));
    assert_eq!(status, StatusCode::OK);
    assert_eq!(me["user"]["email"], email);
    assert!(me["user"].get("password_hash").is_none());
    assert_eq!(me["restaurants"], json!([]));

    let (status, _) = call_json!(
        app,
        test::TestRequest::post().uri("/api/auth/logout").insert_header(bearer(&token))
    );
    assert_eq!(status, StatusCode::OK);

    let (status, _) = call_json!(app, test::TestRequest::get().uri("/api/me").insert_header(bearer(&token)));
    assert_eq!(status, StatusCode::UNAUTHORIZED);
}

#[test_log::test(actix_web::test)]
#[ignore = "requires DATABASE_URL"]
async fn claim_campaign_reservation_and_analytics() {
    let (app, state, mailer) = live_app!();

    // Admin account
    let admin_email = common::unique_email("admin");
    let admin = state
        .auth_service
        .register(&admin_email, "admin password", None)
        .await
        .unwrap();
    sqlx::query("UPDATE users SET role = 'admin' WHERE id = $1")
        .bind(admin.id)
        .execute(state.db.pool())
        .await
        .unwrap();
    let admin_token = state.auth_service.authenticate(&admin_email, "admin password").await.unwrap();

    // Owner account
    let owner_email = common::unique_email("owner");
    state.auth_service.register(&owner_email, "owner password", None).await.unwrap();
    let owner_token = state.auth_service.authenticate(&owner_email, "owner password").await.unwrap();

    // Admin lists a restaurant
    let name = format!("Chez Léon {}", Uuid::new_v4().simple());
    let (status, restaurant) = call_json!(
        app,
        test::TestRequest::post()
            .uri("/api/admin/restaurants")
            .insert_header(bearer(&admin_token))
            .set_json(json!({ "name": name, "city": "Paris", "country": "France" }))
    );
    assert_eq!(status, StatusCode::CREATED);
    let restaurant_id = restaurant["id"].as_str().unwrap().to_string();
    let slug = restaurant["slug"].as_str().unwrap().to_string();
    assert!(slug.starts_with("chez-leon-"));
    assert!(slug.ends_with("-paris"));
    assert!(restaurant["number"].as_str().unwrap().starts_with("BR-FR-"));

    // Owners cannot create restaurants
    let (status, _) = call_json!(
        app,
        test::TestRequest::post()
            .uri("/api/admin/restaurants")
            .insert_header(bearer(&owner_token))
            .set_json(json!({ "name": "Nope" }))
    );
    assert_eq!(status, StatusCode::FORBIDDEN);

    // Claim, duplicate claim, approval
    let claim_uri = format!("/api/restaurants/{}/claim", restaurant_id);
    let (status, _) = call_json!(
        app,
        test::TestRequest::post()
            .uri(&claim_uri)
            .insert_header(bearer(&owner_token))
            .set_json(json!({ "message": "I run the place" }))
    );
    assert_eq!(status, StatusCode::ACCEPTED);

    let (status, _) = call_json!(
        app,
        test::TestRequest::post().uri(&claim_uri).insert_header(bearer(&owner_token))
    );
    assert_eq!(status, StatusCode::CONFLICT);

    let (status, approved) = call_json!(
        app,
        test::TestRequest::post()
            .uri(&format!("/api/admin/claims/{}/approve", restaurant_id))
            .insert_header(bearer(&admin_token))
    );
    assert_eq!(status, StatusCode::OK);
    assert_eq!(approved["is_claimed"], true);
    assert_eq!(approved["claim_status"], "approved");

    let subjects = mailer.subjects();
    assert!(subjects.iter().any(|s| s.starts_with("New claim request")));
    assert!(subjects.iter().any(|s| s.starts_with("You now manage")));

    // Trial entitles the owner to Pro
    let (status, me) = call_json!(app, test::TestRequest::get().uri("/api/me").insert_header(bearer(&owner_token)));
    assert_eq!(status, StatusCode::OK);
    assert_eq!(me["restaurants"][0]["subscription"]["plan"], "pro");
    assert_eq!(me["restaurants"][0]["subscription"]["status"], "trialing");

    // Campaign link and redirect
    let (status, link) = call_json!(
        app,
        test::TestRequest::post()
            .uri(&format!("/api/restaurants/{}/campaigns", restaurant_id))
            .insert_header(bearer(&owner_token))
            .set_json(json!({ "name": "Spring flyer", "source": "flyer" }))
    );
    assert_eq!(status, StatusCode::CREATED);
    let code = link["code"].as_str().unwrap().to_string();
    assert_eq!(code.len(), 8);
    assert!(link["url"].as_str().unwrap().ends_with(&format!("/c/{}", code)));

    let resp = test::call_service(
        &app,
        test::TestRequest::get()
            .uri(&format!("/c/{}", code))
            .insert_header(("User-Agent", "Mozilla/5.0 (iPhone; CPU iPhone OS 17_0 like Mac OS X) Mobile/15E148"))
            .to_request(),
    )
    .await;
    assert_eq!(resp.status(), StatusCode::FOUND);
    let location = resp.headers().get("Location").unwrap().to_str().unwrap().to_string();
    assert!(location.ends_with(&format!("/r/{}?ref={}", slug, code)));

    let (status, _) = call_json!(app, test::TestRequest::get().uri("/c/zzzzzzzz"));
    assert_eq!(status, StatusCode::NOT_FOUND);

    // Public reservation, owner confirms it
    let (status, reservation) = call_json!(
        app,
        test::TestRequest::post()
            .uri(&format!("/api/restaurants/{}/reservations", restaurant_id))
            .set_json(json!({
                "guest_name": "Ada",
                "guest_email": "ada@example.com",
                "party_size": 2,
                "requested_for": "2999-01-01T19:30:00Z"
            }))
    );
    assert_eq!(status, StatusCode::CREATED);
    let reservation_uri = format!("/api/reservations/{}", reservation["id"].as_str().unwrap());

    let (status, _) = call_json!(
        app,
        test::TestRequest::patch()
            .uri(&reservation_uri)
            .insert_header(bearer(&owner_token))
            .set_json(json!({ "status": "pending" }))
    );
    assert_eq!(status, StatusCode::CONFLICT);

    let (status, resolved) = call_json!(
        app,
        test::TestRequest::patch()
            .uri(&reservation_uri)
            .insert_header(bearer(&owner_token))
            .set_json(json!({ "status": "confirmed" }))
    );
    assert_eq!(status, StatusCode::OK);
    assert_eq!(resolved["status"], "confirmed");

    let (status, _) = call_json!(
        app,
        test::TestRequest::patch()
            .uri(&reservation_uri)
            .insert_header(bearer(&owner_token))
            .set_json(json!({ "status": "declined" }))
    );
    assert_eq!(status, StatusCode::CONFLICT);
    assert!(mailer.subjects().iter().any(|s| s.contains("was confirmed")));

    // Analytics sees the reservation request in today's bucket
    let (status, analytics) = call_json!(
        app,
        test::TestRequest::get()
            .uri(&format!("/api/analytics?restaurant_id={}&range=7d", restaurant_id))
            .insert_header(bearer(&owner_token))
    );
    assert_eq!(status, StatusCode::OK);
    assert_eq!(analytics["days"], 7);
    assert_eq!(analytics["report"]["series"].as_array().unwrap().len(), 7);
    assert_eq!(analytics["report"]["totals"]["reservation_requests"], 1);

    let (status, _) = call_json!(
        app,
        test::TestRequest::get()
            .uri("/api/admin/analytics?range=30d")
            .insert_header(bearer(&owner_token))
    );
    assert_eq!(status, StatusCode::FORBIDDEN);

    let (status, platform) = call_json!(
        app,
        test::TestRequest::get()
            .uri("/api/admin/analytics?range=30d")
            .insert_header(bearer(&admin_token))
    );
    assert_eq!(status, StatusCode::OK);
    assert!(platform["report"]["restaurants"].as_u64().unwrap() >= 1);

    tokio_test::assert_ok!(maintenance::run_once(&state).await);
}

#[test_log::test(actix_web::test)]
#[ignore = "requires DATABASE_URL"]
async fn same_name_and_city_get_numbered_slugs() {
    let (_app, state, _) = live_app!();
    let name = format!("Osteria {}", Uuid::new_v4().simple());
    let draft: RestaurantDraft = serde_json::from_value(json!({ "name": name, "city": "Milan" })).unwrap();

    let first = restaurants::create_restaurant(&state.db, draft.clone()).await.unwrap();
    let second = restaurants::create_restaurant(&state.db, draft).await.unwrap();

    assert!(first.slug.ends_with("-milan"));
    assert_eq!(second.slug, format!("{}-2", first.slug));
    assert_ne!(first.number, second.number);
    assert!(first.number.starts_with("BR-XX-"));
}

#[test_log::test(actix_web::test)]
#[ignore = "requires DATABASE_URL"]
async fn notification_emails_are_capped_and_unique() {
    let (app, state, _) = live_app!();
    let (restaurant, token) = owned_restaurant(&state).await;
    let uri = format!("/api/restaurants/{}/emails", restaurant.id);

    for n in 0..5 {
        let (status, _) = call_json!(
            app,
            test::TestRequest::post()
                .uri(&uri)
                .insert_header(bearer(&token))
                .set_json(json!({ "email": format!("host{}@example.com", n) }))
        );
        assert_eq!(status, StatusCode::CREATED);
    }

    let (status, _) = call_json!(
        app,
        test::TestRequest::post()
            .uri(&uri)
            .insert_header(bearer(&token))
            .set_json(json!({ "email": "HOST0@example.com" }))
    );
    assert_eq!(status, StatusCode::CONFLICT);

    let (status, _) = call_json!(
        app,
        test::TestRequest::post()
            .uri(&uri)
            .insert_header(bearer(&token))
            .set_json(json!({ "email": "host5@example.com" }))
    );
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, emails) = call_json!(app, test::TestRequest::get().uri(&uri).insert_header(bearer(&token)));
    assert_eq!(status, StatusCode::OK);
    assert_eq!(emails.as_array().unwrap().len(), 5);
}

#[test_log::test(actix_web::test)]
#[ignore = "requires DATABASE_URL"]
async fn free_plan_allows_a_single_campaign_link() {
    let (app, state, _) = live_app!();
    let (restaurant, token) = owned_restaurant(&state).await;
    sqlx::query("UPDATE subscriptions SET plan = 'free', status = 'canceled' WHERE restaurant_id = $1")
        .bind(restaurant.id)
        .execute(state.db.pool())
        .await
        .unwrap();
    let uri = format!("/api/restaurants/{}/campaigns", restaurant.id);

    let (status, _) = call_json!(
        app,
        test::TestRequest::post()
            .uri(&uri)
            .insert_header(bearer(&token))
            .set_json(json!({ "name": "Window sticker" }))
    );
    assert_eq!(status, StatusCode::CREATED);

    let (status, body) = call_json!(
        app,
        test::TestRequest::post()
            .uri(&uri)
            .insert_header(bearer(&token))
            .set_json(json!({ "name": "Instagram bio" }))
    );
    assert_eq!(status, StatusCode::PAYMENT_REQUIRED);
    assert!(body["error"]["message"].as_str().unwrap().contains("free"));
}

#[test_log::test(actix_web::test)]
#[ignore = "requires DATABASE_URL"]
async fn lapsed_trial_is_stored_as_free() {
    let (app, state, _) = live_app!();
    let (restaurant, token) = owned_restaurant(&state).await;
    sqlx::query("UPDATE subscriptions SET trial_ends_at = NOW() - INTERVAL '1 day' WHERE restaurant_id = $1")
        .bind(restaurant.id)
        .execute(state.db.pool())
        .await
        .unwrap();

    let (status, me) = call_json!(app, test::TestRequest::get().uri("/api/me").insert_header(bearer(&token)));
    assert_eq!(status, StatusCode::OK);
    assert_eq!(me["restaurants"][0]["subscription"]["plan"], "free");

    let stored = state.db.get_subscription(restaurant.id).await.unwrap().unwrap();
    assert_eq!(stored.plan, Plan::Free);
    assert_eq!(stored.status, SubscriptionStatus::Canceled);
}

#[test_log::test(actix_web::test)]
#[ignore = "requires DATABASE_URL"]
async fn stripe_events_drive_the_subscription() {
    let (app, state, _) = live_app!();
    let (restaurant, _) = owned_restaurant(&state).await;
    let customer = format!("cus_{}", Uuid::new_v4().simple());
    let subscription = format!("sub_{}", Uuid::new_v4().simple());

    let (status, body) = call_json!(
        app,
        signed_event(&state, json!({
            "id": "evt_checkout",
            "type": "checkout.session.completed",
            "data": {"object": {
                "client_reference_id": restaurant.id.to_string(),
                "customer": customer,
                "subscription": subscription,
                "metadata": {"plan": "business"}
            }}
        }))
    );
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["outcome"], "checkout_completed");
    let stored = state.db.get_subscription(restaurant.id).await.unwrap().unwrap();
    assert_eq!(stored.plan, Plan::Business);
    assert_eq!(stored.status, SubscriptionStatus::Active);
    assert_eq!(stored.stripe_customer_id.as_deref(), Some(customer.as_str()));
    assert!(stored.trial_ends_at.is_none());

    let (status, body) = call_json!(
        app,
        signed_event(&state, json!({
            "id": "evt_updated",
            "type": "customer.subscription.updated",
            "data": {"object": {
                "id": subscription,
                "status": "active",
                "current_period_end": 1_900_000_000,
                "items": {"data": [{"price": {"id": "price_pro"}}]}
            }}
        }))
    );
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["outcome"], "subscription_updated");
    let stored = state.db.get_subscription(restaurant.id).await.unwrap().unwrap();
    assert_eq!(stored.plan, Plan::Pro);
    assert_eq!(stored.current_period_end.map(|t| t.timestamp()), Some(1_900_000_000));

    let (status, _) = call_json!(
        app,
        signed_event(&state, json!({
            "id": "evt_failed",
            "type": "invoice.payment_failed",
            "data": {"object": {"customer": customer}}
        }))
    );
    assert_eq!(status, StatusCode::OK);
    let stored = state.db.get_subscription(restaurant.id).await.unwrap().unwrap();
    assert_eq!(stored.status, SubscriptionStatus::PastDue);
    assert_eq!(stored.plan, Plan::Pro);

    let (status, body) = call_json!(
        app,
        signed_event(&state, json!({
            "id": "evt_deleted",
            "type": "customer.subscription.deleted",
            "data": {"object": {"id": subscription, "status": "canceled"}}
        }))
    );
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["outcome"], "subscription_deleted");
    let stored = state.db.get_subscription(restaurant.id).await.unwrap().unwrap();
    assert_eq!(stored.plan, Plan::Free);
    assert_eq!(stored.status, SubscriptionStatus::Canceled);
    assert!(stored.stripe_subscription_id.is_none());
}

#[test_log::test(actix_web::test)]
#[ignore = "requires DATABASE_URL"]
async fn rejected_claims_notify_and_unknown_ids_are_not_found() {
    let (app, state, mailer) = live_app!();
    let admin = admin_token(&state).await;
    let restaurant = listed_restaurant(&state).await;

    let email = common::unique_email("claimant");
    state.auth_service.register(&email, "claimant password", None).await.unwrap();
    let token = state.auth_service.authenticate(&email, "claimant password").await.unwrap();

    let (status, _) = call_json!(
        app,
        test::TestRequest::post()
            .uri(&format!("/api/restaurants/{}/claim", restaurant.id))
            .insert_header(bearer(&token))
    );
    assert_eq!(status, StatusCode::ACCEPTED);

    let reject_uri = format!("/api/admin/claims/{}/reject", restaurant.id);
    let (status, rejected) = call_json!(
        app,
        test::TestRequest::post().uri(&reject_uri).insert_header(bearer(&admin))
    );
    assert_eq!(status, StatusCode::OK);
    assert_eq!(rejected["claim_status"], "rejected");
    assert_eq!(rejected["is_claimed"], false);
    assert!(mailer
        .subjects()
        .contains(&format!("Your claim for {}", restaurant.name)));

    let (status, _) = call_json!(
        app,
        test::TestRequest::post().uri(&reject_uri).insert_header(bearer(&admin))
    );
    assert_eq!(status, StatusCode::CONFLICT);

    let missing = Uuid::new_v4();
    for action in ["approve", "reject"] {
        let (status, _) = call_json!(
            app,
            test::TestRequest::post()
                .uri(&format!("/api/admin/claims/{}/{}", missing, action))
                .insert_header(bearer(&admin))
        );
        assert_eq!(status, StatusCode::NOT_FOUND);
    }
}

#[test_log::test(actix_web::test)]
#[ignore = "requires DATABASE_URL"]
async fn approval_over_existing_subscription_starts_no_trial() {
    let (app, state, mailer) = live_app!();
    let admin = admin_token(&state).await;
    let restaurant = listed_restaurant(&state).await;
    let customer = format!("cus_{}", Uuid::new_v4().simple());
    state.db.set_stripe_customer(restaurant.id, &customer).await.unwrap();

    let email = common::unique_email("claimant");
    let owner = state.auth_service.register(&email, "claimant password", None).await.unwrap();
    state.db.request_claim(restaurant.id, owner.id, None).await.unwrap().unwrap();

    let (status, _) = call_json!(
        app,
        test::TestRequest::post()
            .uri(&format!("/api/admin/claims/{}/approve", restaurant.id))
            .insert_header(bearer(&admin))
    );
    assert_eq!(status, StatusCode::OK);

    let stored = state.db.get_subscription(restaurant.id).await.unwrap().unwrap();
    assert_eq!(stored.plan, Plan::Free);
    assert!(stored.trial_ends_at.is_none());

    let approval = mailer
        .sent
        .lock()
        .unwrap()
        .iter()
        .find(|m| m.subject.starts_with("You now manage") && m.to == vec![email.clone()])
        .cloned()
        .unwrap();
    assert!(!approval.text.contains("trial"));
}
