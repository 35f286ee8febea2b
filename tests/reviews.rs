//! Company review tests: one review per reviewer, no self-reviews.

mod common;

use axum::http::StatusCode;
use common::app;
use serde_json::json;

#[tokio::test]
async fn candidate_reviews_company() {
    let app = app().await;
    let employer = app.create_employer("rev_emp").await;
    let candidate = app.create_candidate("rev_cand").await;

    let resp = app
        .post_json(
            &format!("/companies/{}/reviews", employer.profile_id),
            json!({ "rating": 4, "review_text": "Solid interview process." }),
            Some(&candidate.access_token),
        )
        .await;
    assert_eq!(resp.status, StatusCode::CREATED);
    let body = resp.json();
    assert_eq!(body["rating"], 4);
    assert!(body["reviewer_name"]
        .as_str()
        .unwrap_or("")
        .starts_with("Testrev_cand"));

    // Reviews are publicly listable.
    let resp = app
        .get(&format!("/companies/{}/reviews", employer.profile_id), None)
        .await;
    assert_eq!(resp.status, StatusCode::OK);
    assert_eq!(resp.json().as_array().map(|r| r.len()), Some(1));

    // The public company page carries the average rating.
    let resp = app
        .get(&format!("/companies/{}", employer.profile_id), None)
        .await;
    assert_eq!(resp.status, StatusCode::OK);
    assert_eq!(resp.json()["average_rating"], 4.0);
}

#[tokio::test]
async fn second_review_conflicts() {
    let app = app().await;
    let employer = app.create_employer("rev_dup_emp").await;
    let candidate = app.create_candidate("rev_dup_cand").await;

    let resp = app
        .post_json(
            &format!("/companies/{}/reviews", employer.profile_id),
            json!({ "rating": 5, "review_text": "Great." }),
            Some(&candidate.access_token),
        )
        .await;
    assert_eq!(resp.status, StatusCode::CREATED);

    let resp = app
        .post_json(
            &format!("/companies/{}/reviews", employer.profile_id),
            json!({ "rating": 1, "review_text": "Changed my mind." }),
            Some(&candidate.access_token),
        )
        .await;
    assert_eq!(resp.status, StatusCode::CONFLICT);
}

#[tokio::test]
async fn cannot_review_own_company() {
    let app = app().await;
    let employer = app.create_employer("rev_self").await;

    let resp = app
        .post_json(
            &format!("/companies/{}/reviews", employer.profile_id),
            json!({ "rating": 5, "review_text": "We are great." }),
            Some(&employer.access_token),
        )
        .await;
    assert_eq!(resp.status, StatusCode::FORBIDDEN);
}

#[tokio::test]
async fn rating_out_of_range_rejected() {
    let app = app().await;
    let employer = app.create_employer("rev_range_emp").await;
    let candidate = app.create_candidate("rev_range_cand").await;

    for rating in [0, 6] {
        let resp = app
            .post_json(
                &format!("/companies/{}/reviews", employer.profile_id),
                json!({ "rating": rating }),
                Some(&candidate.access_token),
            )
            .await;
        assert_eq!(resp.status, StatusCode::BAD_REQUEST, "rating {}", rating);
    }
}

#[tokio::test]
async fn employer_lists_received_reviews() {
    let app = app().await;
    let employer = app.create_employer("rev_recv_emp").await;
    let alice = app.create_candidate("rev_recv_a").await;
    let bob = app.create_candidate("rev_recv_b").await;

    for (candidate, rating) in [(&alice, 5), (&bob, 3)] {
        let resp = app
            .post_json(
                &format!("/companies/{}/reviews", employer.profile_id),
                json!({ "rating": rating, "review_text": "Review." }),
                Some(&candidate.access_token),
            )
            .await;
        assert_eq!(resp.status, StatusCode::CREATED);
    }

    let resp = app
        .get("/reviews/received", Some(&employer.access_token))
        .await;
    assert_eq!(resp.status, StatusCode::OK);
    assert_eq!(resp.json().as_array().map(|r| r.len()), Some(2));
}

#[tokio::test]
async fn review_unknown_company_is_404() {
    let app = app().await;
    let candidate = app.create_candidate("rev_404").await;

    let resp = app
        .post_json(
            &format!("/companies/{}/reviews", uuid::Uuid::new_v4()),
            json!({ "rating": 3 }),
            Some(&candidate.access_token),
        )
        .await;
    assert_eq!(resp.status, StatusCode::NOT_FOUND);
}
