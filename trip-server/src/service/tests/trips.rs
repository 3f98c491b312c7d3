//! Itinerary generation and history

use actix_web::http::StatusCode;
use actix_web::{App, test};
use assert_json_diff::assert_json_eq;
use serde_json::{Value, json};

use crate::model::Model;
use crate::service;
use crate::service::tests::{generate_req, history_req, register_req, send, token, trip};

#[actix_web::test]
async fn generate_and_read_back() {
    let model = Model::test().await.unwrap();
    let app = test::init_service(App::new().configure(service::configure(model))).await;

    let req = register_req("alice@example.com", "pw123").to_request();
    let (status, body) = send(&app, req).await;
    let alice = token(status, body);

    let trip = trip("2025-01-01", "2025-01-03");
    let req = generate_req(&alice.access_token, trip).to_request();
    let (status, generated) = send(&app, req).await;
    assert_eq!(status, StatusCode::OK, "{generated}");

    let dates: Vec<_> = generated["days"]
        .as_array()
        .unwrap()
        .iter()
        .map(|day| day["date"].as_str().unwrap().to_owned())
        .collect();
    assert_eq!(dates, ["2025-01-01", "2025-01-02", "2025-01-03"]);

    let req = history_req(&alice.access_token, "?limit=1").to_request();
    let (status, history) = send(&app, req).await;
    assert_eq!(status, StatusCode::OK, "{history}");

    let records = history["history"].as_array().unwrap();
    assert_eq!(records.len(), 1);
    assert_eq!(records[0]["request"]["origin"], "Hà Nội");
    assert_json_eq!(records[0]["response"], generated);
    assert!(records[0].get("user_id").is_none());
}

#[actix_web::test]
async fn day_plan_shape() {
    let model = Model::test().await.unwrap();
    let app = test::init_service(App::new().configure(service::configure(model))).await;

    let req = register_req("alice@example.com", "pw123").to_request();
    let (status, body) = send(&app, req).await;
    let alice = token(status, body);

    let trip = trip("2025-01-01", "2025-01-01");
    let req = generate_req(&alice.access_token, trip).to_request();
    let (status, generated) = send(&app, req).await;
    assert_eq!(status, StatusCode::OK);

    assert_json_eq!(
        generated,
        json!({
            "days": [{
                "date": "2025-01-01",
                "morning": {
                    "time": "08:00",
                    "title": "Arrive in Đà Nẵng",
                    "explain": "Travel from Hà Nội and settle in.",
                },
                "afternoon": {
                    "time": "13:00",
                    "title": "Afternoon of beach",
                    "explain": "Spend the afternoon on beach around Đà Nẵng.",
                },
                "evening": {
                    "time": "18:00",
                    "title": "Dinner & Nightlife",
                    "explain": "Try local cuisine.",
                },
            }]
        })
    );
}

#[actix_web::test]
async fn invalid_dates_leave_no_history() {
    let model = Model::test().await.unwrap();
    let app = test::init_service(App::new().configure(service::configure(model))).await;

    let req = register_req("alice@example.com", "pw123").to_request();
    let (status, body) = send(&app, req).await;
    let alice = token(status, body);

    let cases = [
        ("2025-01-03", "2025-01-01"),
        ("2025-13-01", "2025-13-02"),
        ("yesterday", "2025-01-02"),
        ("2025-02-29", "2025-03-01"),
    ];

    for (start, end) in cases {
        let req = generate_req(&alice.access_token, trip(start, end)).to_request();
        let (status, body) = send(&app, req).await;
        assert_eq!(status, StatusCode::BAD_REQUEST, "{start}..{end}");
        let detail = body["detail"].as_str().unwrap();
        assert!(detail.starts_with("Invalid date range"), "{detail}");
    }

    let req = history_req(&alice.access_token, "").to_request();
    let (status, history) = send(&app, req).await;
    assert_eq!(status, StatusCode::OK);
    assert_json_eq!(history, json!({ "history": [] }));
}

#[actix_web::test]
async fn malformed_trip_request() {
    let model = Model::test().await.unwrap();
    let app = test::init_service(App::new().configure(service::configure(model))).await;

    let req = register_req("alice@example.com", "pw123").to_request();
    let (status, body) = send(&app, req).await;
    let alice = token(status, body);

    let mut unknown_pace = trip("2025-01-01", "2025-01-02");
    unknown_pace["pace"] = json!("frantic");
    let mut missing_destination = trip("2025-01-01", "2025-01-02");
    missing_destination
        .as_object_mut()
        .unwrap()
        .remove("destination");

    for trip in [unknown_pace, missing_destination] {
        let req = generate_req(&alice.access_token, trip).to_request();
        let (status, body) = send(&app, req).await;
        assert_eq!(status, StatusCode::BAD_REQUEST, "{body}");
    }

    // Interests are optional
    let mut no_interests = trip("2025-01-01", "2025-01-02");
    no_interests.as_object_mut().unwrap().remove("interests");
    let req = generate_req(&alice.access_token, no_interests).to_request();
    let (status, body) = send(&app, req).await;
    assert_eq!(status, StatusCode::OK, "{body}");
    assert_eq!(body["days"][0]["afternoon"]["title"], "Museum visit");
}

#[actix_web::test]
async fn history_is_private() {
    let model = Model::test().await.unwrap();
    let app = test::init_service(App::new().configure(service::configure(model))).await;

    let req = register_req("alice@example.com", "pw123").to_request();
    let (status, body) = send(&app, req).await;
    let alice = token(status, body);
    let req = register_req("bob@example.com", "pw456").to_request();
    let (status, body) = send(&app, req).await;
    let bob = token(status, body);
    assert_ne!(alice.user_id, bob.user_id);

    for (user, start, end) in [
        (&alice, "2025-01-01", "2025-01-02"),
        (&bob, "2025-02-01", "2025-02-05"),
        (&alice, "2025-03-01", "2025-03-01"),
    ] {
        let req = generate_req(&user.access_token, trip(start, end)).to_request();
        let (status, _) = send(&app, req).await;
        assert_eq!(status, StatusCode::OK);
    }

    let start_dates = |history: &Value| -> Vec<String> {
        history["history"]
            .as_array()
            .unwrap()
            .iter()
            .map(|record| record["request"]["start_date"].as_str().unwrap().to_owned())
            .collect()
    };

    let (_, history) = send(&app, history_req(&alice.access_token, "").to_request()).await;
    assert_eq!(start_dates(&history), ["2025-03-01", "2025-01-01"]);

    let (_, history) = send(&app, history_req(&bob.access_token, "").to_request()).await;
    assert_eq!(start_dates(&history), ["2025-02-01"]);
}

#[actix_web::test]
async fn history_limit_is_lenient() {
    let model = Model::test().await.unwrap();
    let app = test::init_service(App::new().configure(service::configure(model))).await;

    let req = register_req("alice@example.com", "pw123").to_request();
    let (status, body) = send(&app, req).await;
    let alice = token(status, body);

    for _ in 0..3 {
        let trip = trip("2025-01-01", "2025-01-02");
        let (status, _) = send(&app, generate_req(&alice.access_token, trip).to_request()).await;
        assert_eq!(status, StatusCode::OK);
    }

    for (query, expected) in [
        ("", 3),
        ("?limit=2", 2),
        ("?limit=0", 3),
        ("?limit=-1", 3),
        ("?limit=many", 3),
        ("?limit=100000", 3),
        ("?limit=99999999999999999999", 3),
    ] {
        let req = history_req(&alice.access_token, query).to_request();
        let (status, history) = send(&app, req).await;
        assert_eq!(status, StatusCode::OK, "{query}");
        assert_eq!(history["history"].as_array().unwrap().len(), expected, "{query}");
    }
}
