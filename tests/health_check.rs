mod common;

use actix_web::{test, web, App};
use bitereserve_server::{configure, Settings};
use chrono::DateTime;

#[actix_web::test]
async fn test_health_check() {
    let config = Settings::new_for_test().expect("Failed to load test config");
    let (state, _) = common::lazy_state(config);

    let app = test::init_service(
        App::new()
            .app_data(web::Data::new(state))
            .configure(configure),
    )
    .await;

    let req = test::TestRequest::get().uri("/health").to_request();
    let resp = test::call_service(&app, req).await;
    assert!(resp.status().is_success());

    let body = test::read_body(resp).await;
    let json: serde_json::Value = serde_json::from_slice(&body).unwrap();

    assert_eq!(json["status"], "healthy");
    // The lazy pool has not opened a connection yet
    assert_eq!(json["database"]["total_connections"], 0);
    assert!(DateTime::parse_from_rfc3339(json["timestamp"].as_str().unwrap()).is_ok());
}
