//! End-to-end tests of the HTTP ingress: webhook classification and
//! routing, note lookup and search, review-queue lifecycle, and the
//! webhook guards (shared secret, rate limit).

use std::sync::Arc;

use axum::body::Body;
use axum::http::{Request, StatusCode};
use axum::Router;
use http_body_util::BodyExt;
use serde_json::{json, Value};
use tempfile::TempDir;
use tower::ServiceExt;

use memo_router::actions::HandlerContext;
use memo_router::config::Config;
use memo_router::crm::{FileVisitStore, StaticCrm, StaticVisitStore, VisitStore};
use memo_router::index::NoteIndex;
use memo_router::journal::Journal;
use memo_router::models::{ContactRef, Visit};
use memo_router::notify::LogNotifier;
use memo_router::review::ReviewQueue;
use memo_router::server::{router, AppState};

fn contact(id: &str, name: &str) -> ContactRef {
    ContactRef {
        id: id.to_string(),
        name: name.to_string(),
    }
}

fn visit(id: &str, name: &str) -> Visit {
    Visit {
        id: id.to_string(),
        business_name: name.to_string(),
        address: None,
        zip: None,
        crm_url: None,
    }
}

fn app(
    tmp: &TempDir,
    secret: Option<&str>,
    contacts: Vec<ContactRef>,
    visits: Vec<Visit>,
) -> Router {
    app_with_store(tmp, secret, contacts, Arc::new(StaticVisitStore { visits }))
}

fn app_with_store(
    tmp: &TempDir,
    secret: Option<&str>,
    contacts: Vec<ContactRef>,
    visits: Arc<dyn VisitStore>,
) -> Router {
    let mut cfg = Config::minimal();
    cfg.data.dir = tmp.path().join("data");
    cfg.journal.dir = tmp.path().join("journal");
    cfg.server.webhook_secret = secret.map(String::from);
    let cfg = Arc::new(cfg);

    let index = NoteIndex::load(&cfg.data.index_file()).unwrap();
    let queue = ReviewQueue::load(&cfg.data.queue_file()).unwrap();
    let handlers = HandlerContext::with_ports(
        cfg.clone(),
        Arc::new(StaticCrm { contacts }),
        Arc::new(LogNotifier),
        Journal::new(&cfg.journal.dir),
    );
    let state = AppState::with_parts(cfg, index, queue, visits, handlers);
    router(state)
}

async fn send(
    app: &Router,
    method: &str,
    uri: &str,
    body: Option<Value>,
    headers: &[(&str, &str)],
) -> (StatusCode, Value) {
    let mut builder = Request::builder().method(method).uri(uri);
    for (name, value) in headers {
        builder = builder.header(*name, *value);
    }
    let request = match body {
        Some(body) => builder
            .header("content-type", "application/json")
            .body(Body::from(body.to_string()))
            .unwrap(),
        None => builder.body(Body::empty()).unwrap(),
    };

    let response = app.clone().oneshot(request).await.unwrap();
    let status = response.status();
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    let value = if bytes.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(&bytes).unwrap()
    };
    (status, value)
}

fn memo_payload(recording_id: &str, summary: &str) -> Value {
    json!({
        "recording_id": recording_id,
        "summary": summary,
        "transcription": "",
        "timestamp": "2026-03-04T10:00:00Z",
    })
}

#[tokio::test]
async fn personal_memo_is_classified_stored_and_retrievable() {
    let tmp = TempDir::new().unwrap();
    let app = app(&tmp, None, vec![], vec![]);

    let payload = memo_payload("rec_1", "PERSONAL: Call dentist tomorrow");
    let (status, body) = send(&app, "POST", "/webhook", Some(payload), &[]).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["success"], true);
    assert_eq!(body["bucket"], "PERSONAL");
    assert_eq!(body["recordingId"], "rec_1");

    let hash = body["hash"].as_str().unwrap();
    assert!(hash.starts_with("p-"));
    assert_eq!(hash.len(), 9);
    assert_eq!(body["referenceUrl"], format!("/notes/{}", hash));

    let effects = body["actions"]["effects"].as_array().unwrap();
    assert!(effects.iter().all(|e| e["success"] == true));

    let (status, body) = send(&app, "GET", &format!("/notes/{}", hash), None, &[]).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["note"]["bucket"], "PERSONAL");
    assert_eq!(body["note"]["recordingId"], "rec_1");
}

#[tokio::test]
async fn comcast_memo_routes_with_packages_and_interest() {
    let tmp = TempDir::new().unwrap();
    let app = app(&tmp, None, vec![contact("c9", "Rainier Pizza")], vec![]);

    let payload = memo_payload(
        "rec_2",
        "Visited Rainier Pizza on 6th Ave, owner interested in triple play",
    );
    let (status, body) = send(&app, "POST", "/webhook", Some(payload), &[]).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["bucket"], "COMCAST");
    assert_eq!(body["actions"]["businessName"], "Rainier Pizza");
    assert_eq!(body["actions"]["packages"], json!(["Triple Play"]));
    assert_eq!(body["actions"]["interest"], "Hot Lead");
    // A matched contact means no review entry.
    assert!(body.get("review").is_none());

    let (_, reviews) = send(&app, "GET", "/reviews", None, &[]).await;
    assert_eq!(reviews["count"], 0);
}

#[tokio::test]
async fn memo_without_text_is_rejected_and_not_stored() {
    let tmp = TempDir::new().unwrap();
    let app = app(&tmp, None, vec![], vec![]);

    let payload = json!({ "recording_id": "rec_3", "timestamp": "2026-03-04T10:00:00Z" });
    let (status, body) = send(&app, "POST", "/webhook", Some(payload), &[]).await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"]["code"], "bad_request");

    let (_, health) = send(&app, "GET", "/health", None, &[]).await;
    assert_eq!(health["notes"], 0);
}

#[tokio::test]
async fn webhook_secret_is_enforced() {
    let tmp = TempDir::new().unwrap();
    let app = app(&tmp, Some("s3cret"), vec![], vec![]);

    let (status, body) = send(
        &app,
        "POST",
        "/webhook",
        Some(memo_payload("rec_4", "PERSONAL: buy milk")),
        &[],
    )
    .await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body["error"]["code"], "unauthorized");

    let (status, _) = send(
        &app,
        "POST",
        "/webhook",
        Some(memo_payload("rec_4", "PERSONAL: buy milk")),
        &[("x-webhook-secret", "s3cret")],
    )
    .await;
    assert_eq!(status, StatusCode::OK);
}

#[tokio::test]
async fn webhook_rate_limit_blocks_the_eleventh_request() {
    let tmp = TempDir::new().unwrap();
    let app = app(&tmp, None, vec![], vec![]);

    for i in 0..10 {
        let payload = memo_payload(&format!("rec_{}", i), "PERSONAL: Call dentist");
        let (status, _) = send(&app, "POST", "/webhook", Some(payload), &[]).await;
        assert_eq!(status, StatusCode::OK, "request {} should pass", i + 1);
    }

    let payload = memo_payload("rec_10", "PERSONAL: Call dentist");
    let (status, body) = send(&app, "POST", "/webhook", Some(payload), &[]).await;
    assert_eq!(status, StatusCode::TOO_MANY_REQUESTS);
    assert_eq!(body["error"]["code"], "rate_limited");

    // A different client identity still passes.
    let payload = memo_payload("rec_11", "PERSONAL: Call dentist");
    let (status, _) = send(
        &app,
        "POST",
        "/webhook",
        Some(payload),
        &[("x-client-id", "other")],
    )
    .await;
    assert_eq!(status, StatusCode::OK);
}

#[tokio::test]
async fn unmatched_comcast_memo_enqueues_review_with_suggestions() {
    let tmp = TempDir::new().unwrap();
    let app = app(
        &tmp,
        None,
        vec![],
        vec![visit("v1", "Harbor Pizza"), visit("v2", "Pizza Palace")],
    );

    let payload = memo_payload("rec_5", "COMCAST: pizza shop owner wants gigabit");
    let (status, body) = send(&app, "POST", "/webhook", Some(payload), &[]).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["actions"]["needsReview"], true);
    // Two scored candidates: more than one match needs a human decision.
    assert_eq!(body["review"]["reason"], "multiple_matches");
    assert_eq!(body["review"]["suggestedMatches"], 2);

    let (_, reviews) = send(&app, "GET", "/reviews", None, &[]).await;
    assert_eq!(reviews["count"], 1);
    assert_eq!(reviews["reviews"][0]["status"], "pending");
    assert_eq!(
        reviews["reviews"][0]["suggestedMatches"]
            .as_array()
            .unwrap()
            .len(),
        2
    );
}

#[tokio::test]
async fn single_candidate_enqueues_as_low_confidence() {
    let tmp = TempDir::new().unwrap();
    let app = app(&tmp, None, vec![], vec![visit("v1", "Harbor Pizza")]);

    let payload = memo_payload("rec_lc", "COMCAST: pizza shop owner wants gigabit");
    let (status, body) = send(&app, "POST", "/webhook", Some(payload), &[]).await;

    assert_eq!(status, StatusCode::OK);
    // One scored candidate is a likely but unconfirmed match.
    assert_eq!(body["review"]["reason"], "low_confidence");
    assert_eq!(body["review"]["suggestedMatches"], 1);

    let (_, reviews) = send(&app, "GET", "/reviews", None, &[]).await;
    assert_eq!(
        reviews["reviews"][0]["suggestedMatches"][0]["businessName"],
        "Harbor Pizza"
    );
}

#[tokio::test]
async fn visit_pool_failure_still_enqueues_with_error_reason() {
    let tmp = TempDir::new().unwrap();
    let store = Arc::new(FileVisitStore::new(tmp.path().join("missing-visits.json")));
    let app = app_with_store(&tmp, None, vec![], store);

    let payload = memo_payload("rec_err", "COMCAST: pizza shop owner wants gigabit");
    let (status, body) = send(&app, "POST", "/webhook", Some(payload), &[]).await;

    // The fetch failure does not fail the request or drop the note.
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["review"]["reason"], "error");
    assert_eq!(body["review"]["suggestedMatches"], 0);

    let (_, reviews) = send(&app, "GET", "/reviews", None, &[]).await;
    assert_eq!(reviews["count"], 1);
    assert!(reviews["reviews"][0]["suggestedMatches"]
        .as_array()
        .unwrap()
        .is_empty());
}

#[tokio::test]
async fn redelivered_memo_is_not_enqueued_twice() {
    let tmp = TempDir::new().unwrap();
    let app = app(&tmp, None, vec![], vec![visit("v1", "Harbor Pizza")]);

    let payload = memo_payload("rec_6", "COMCAST: pizza shop owner wants gigabit");
    let (_, first) = send(&app, "POST", "/webhook", Some(payload.clone()), &[]).await;
    assert!(first.get("review").is_some());

    // Same recording and timestamp map to the same hash.
    let (status, second) = send(&app, "POST", "/webhook", Some(payload), &[]).await;
    assert_eq!(status, StatusCode::OK);
    assert!(second.get("review").is_none());

    let (_, stats) = send(&app, "GET", "/reviews/stats", None, &[]).await;
    assert_eq!(stats["total"], 1);
    assert_eq!(stats["pending"], 1);
}

#[tokio::test]
async fn review_assignment_lifecycle() {
    let tmp = TempDir::new().unwrap();
    let app = app(&tmp, None, vec![], vec![visit("v1", "Harbor Pizza")]);

    let payload = memo_payload("rec_7", "COMCAST: stopped by a pizza place, owner interested");
    let (_, body) = send(&app, "POST", "/webhook", Some(payload), &[]).await;
    let review_id = body["review"]["reviewId"].as_str().unwrap().to_string();
    let hash = body["hash"].as_str().unwrap().to_string();

    let (status, assigned) = send(
        &app,
        "POST",
        &format!("/reviews/{}/assign", review_id),
        Some(json!({ "visitId": "v1", "businessName": "Harbor Pizza" })),
        &[],
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(assigned["review"]["status"], "assigned");
    assert_eq!(assigned["review"]["assignedTo"]["businessName"], "Harbor Pizza");

    let (_, stats) = send(&app, "GET", "/reviews/stats", None, &[]).await;
    assert_eq!(stats["pending"], 0);
    assert_eq!(stats["assigned"], 1);

    // The assigned note is now reachable through the business view.
    let (status, notes) = send(&app, "GET", "/businesses/Harbor%20Pizza/notes", None, &[]).await;
    assert_eq!(status, StatusCode::OK);
    assert!(notes["results"]
        .as_array()
        .unwrap()
        .iter()
        .any(|n| n["hash"] == hash.as_str()));
}

#[tokio::test]
async fn review_dismissal_and_unknown_ids() {
    let tmp = TempDir::new().unwrap();
    let app = app(&tmp, None, vec![], vec![]);

    let payload = memo_payload("rec_8", "COMCAST: unknown storefront, no details");
    let (_, body) = send(&app, "POST", "/webhook", Some(payload), &[]).await;
    assert_eq!(body["review"]["reason"], "no_match");
    let review_id = body["review"]["reviewId"].as_str().unwrap().to_string();

    let (status, dismissed) = send(
        &app,
        "POST",
        &format!("/reviews/{}/dismiss", review_id),
        None,
        &[],
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(dismissed["review"]["status"], "dismissed");

    let (status, body) = send(&app, "POST", "/reviews/review-nope/dismiss", None, &[]).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["error"]["code"], "not_found");

    let (status, _) = send(
        &app,
        "POST",
        "/reviews/review-nope/assign",
        Some(json!({ "visitId": "v1", "businessName": "X" })),
        &[],
    )
    .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn search_and_recent_endpoints() {
    let tmp = TempDir::new().unwrap();
    let app = app(&tmp, None, vec![], vec![]);

    for (id, summary) in [
        ("rec_a", "PERSONAL: Call dentist tomorrow"),
        ("rec_b", "PERSONAL: buy milk"),
        ("rec_c", "TTL: Follow up with Trina about the campaign"),
    ] {
        let (status, _) = send(&app, "POST", "/webhook", Some(memo_payload(id, summary)), &[]).await;
        assert_eq!(status, StatusCode::OK);
    }

    let (status, body) = send(&app, "GET", "/notes/search?q=dentist", None, &[]).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["count"], 1);
    assert_eq!(body["results"][0]["recordingId"], "rec_a");

    let (status, body) = send(
        &app,
        "GET",
        "/notes/search?q=trina&bucket=TTL",
        None,
        &[],
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["count"], 1);

    let (status, body) = send(&app, "GET", "/notes/search", None, &[]).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"]["code"], "bad_request");

    let (status, body) = send(&app, "GET", "/notes/search?q=milk&bucket=zzz", None, &[]).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"]["code"], "bad_request");

    let (status, body) = send(&app, "GET", "/notes/recent?limit=2", None, &[]).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["count"], 2);

    let (status, body) = send(&app, "GET", "/notes/p-0000000", None, &[]).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["error"]["code"], "not_found");
}

#[tokio::test]
async fn health_reports_counts() {
    let tmp = TempDir::new().unwrap();
    let app = app(&tmp, None, vec![], vec![]);

    let (status, body) = send(&app, "GET", "/health", None, &[]).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "ok");
    assert_eq!(body["notes"], 0);
    assert_eq!(body["pendingReviews"], 0);

    let payload = memo_payload("rec_h", "PERSONAL: buy milk");
    send(&app, "POST", "/webhook", Some(payload), &[]).await;

    let (_, body) = send(&app, "GET", "/health", None, &[]).await;
    assert_eq!(body["notes"], 1);
}
