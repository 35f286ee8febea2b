//! Application lifecycle tests: applying, listing, status transitions, and
//! withdrawal.

mod common;

use axum::http::StatusCode;
use common::{app, TestApp, TestUser};
use serde_json::json;

async fn post_active_job(app: &TestApp, employer: &TestUser, suffix: &str) -> String {
    let skill = app.create_skill(&format!("app-skill-{}", suffix)).await;
    let resp = app
        .post_json(
            "/jobs",
            app.job_payload(&format!("Role {}", suffix), skill, "active"),
            Some(&employer.access_token),
        )
        .await;
    assert_eq!(resp.status, StatusCode::CREATED);
    resp.json()["id"].as_str().expect("job id").to_string()
}

#[tokio::test]
async fn candidate_applies_once() {
    let app = app().await;
    let employer = app.create_employer("apply_emp").await;
    let candidate = app.create_candidate("apply_cand").await;
    let job_id = post_active_job(app, &employer, "apply").await;

    let resp = app
        .post_json(
            &format!("/jobs/{}/apply", job_id),
            json!({ "cover_letter": "Hello", "expected_salary": 80000 }),
            Some(&candidate.access_token),
        )
        .await;
    assert_eq!(resp.status, StatusCode::CREATED);
    let body = resp.json();
    assert_eq!(body["status"], "pending");
    assert_eq!(body["expected_salary"], 80000);

    // Applying again to the same job conflicts.
    let resp = app
        .post_json(
            &format!("/jobs/{}/apply", job_id),
            json!({ "cover_letter": "Hello again" }),
            Some(&candidate.access_token),
        )
        .await;
    assert_eq!(resp.status, StatusCode::CONFLICT);

    // The applications counter moved exactly once.
    let count: i32 =
        sqlx::query_scalar("SELECT applications_count FROM job_postings WHERE id = $1::uuid")
            .bind(&job_id)
            .fetch_one(app.pool())
            .await
            .expect("count");
    assert_eq!(count, 1);
}

#[tokio::test]
async fn cannot_apply_to_draft_job() {
    let app = app().await;
    let employer = app.create_employer("apply_draft_emp").await;
    let candidate = app.create_candidate("apply_draft_cand").await;
    let skill = app.create_skill("apply-draft-skill").await;

    let resp = app
        .post_json(
            "/jobs",
            app.job_payload("Unpublished", skill, "draft"),
            Some(&employer.access_token),
        )
        .await;
    let job_id = resp.json()["id"].as_str().expect("job id").to_string();

    let resp = app
        .post_json(
            &format!("/jobs/{}/apply", job_id),
            json!({}),
            Some(&candidate.access_token),
        )
        .await;
    assert_eq!(resp.status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn employer_cannot_apply() {
    let app = app().await;
    let employer = app.create_employer("apply_emp_self").await;
    let job_id = post_active_job(app, &employer, "emp_self").await;

    let resp = app
        .post_json(
            &format!("/jobs/{}/apply", job_id),
            json!({}),
            Some(&employer.access_token),
        )
        .await;
    assert_eq!(resp.status, StatusCode::FORBIDDEN);
}

#[tokio::test]
async fn application_notifies_employer() {
    let app = app().await;
    let employer = app.create_employer("apply_notif_emp").await;
    let candidate = app.create_candidate("apply_notif_cand").await;
    let job_id = post_active_job(app, &employer, "notif").await;

    let resp = app
        .post_json(
            &format!("/jobs/{}/apply", job_id),
            json!({}),
            Some(&candidate.access_token),
        )
        .await;
    assert_eq!(resp.status, StatusCode::CREATED);

    let resp = app
        .get("/notifications", Some(&employer.access_token))
        .await;
    assert_eq!(resp.status, StatusCode::OK);
    let body = resp.json();
    assert!(body["unread_count"].as_i64().unwrap_or(0) >= 1);
    let notifications = body["notifications"].as_array().cloned().unwrap_or_default();
    assert!(notifications
        .iter()
        .any(|n| n["notification_type"] == "application"));
}

#[tokio::test]
async fn marking_notification_read_clears_unread_count() {
    let app = app().await;
    let employer = app.create_employer("notif_read_emp").await;
    let candidate = app.create_candidate("notif_read_cand").await;
    let job_id = post_active_job(app, &employer, "notif_read").await;

    let resp = app
        .post_json(
            &format!("/jobs/{}/apply", job_id),
            json!({}),
            Some(&candidate.access_token),
        )
        .await;
    assert_eq!(resp.status, StatusCode::CREATED);

    let resp = app
        .get("/notifications", Some(&employer.access_token))
        .await;
    let body = resp.json();
    assert_eq!(body["unread_count"], 1);
    let notification_id = body["notifications"][0]["id"]
        .as_str()
        .expect("notification id")
        .to_string();

    let resp = app
        .post_json(
            &format!("/notifications/{}/mark-read", notification_id),
            json!({}),
            Some(&employer.access_token),
        )
        .await;
    assert_eq!(resp.status, StatusCode::NO_CONTENT);

    let resp = app
        .get("/notifications", Some(&employer.access_token))
        .await;
    assert_eq!(resp.json()["unread_count"], 0);

    // Someone else's notification is not reachable.
    let resp = app
        .post_json(
            &format!("/notifications/{}/mark-read", notification_id),
            json!({}),
            Some(&candidate.access_token),
        )
        .await;
    assert_eq!(resp.status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn role_scoped_listings() {
    let app = app().await;
    let employer = app.create_employer("list_emp").await;
    let candidate = app.create_candidate("list_cand").await;
    let job_id = post_active_job(app, &employer, "list").await;

    let resp = app
        .post_json(
            &format!("/jobs/{}/apply", job_id),
            json!({}),
            Some(&candidate.access_token),
        )
        .await;
    assert_eq!(resp.status, StatusCode::CREATED);

    let resp = app
        .get("/applications", Some(&candidate.access_token))
        .await;
    assert_eq!(resp.status, StatusCode::OK);
    let items = resp.json()["items"].as_array().cloned().unwrap_or_default();
    assert_eq!(items.len(), 1);
    assert_eq!(items[0]["job_title"], "Role list");

    let resp = app
        .get("/applications", Some(&employer.access_token))
        .await;
    assert_eq!(resp.status, StatusCode::OK);
    let items = resp.json()["items"].as_array().cloned().unwrap_or_default();
    assert_eq!(items.len(), 1);
    assert!(items[0]["candidate_name"]
        .as_str()
        .unwrap_or("")
        .starts_with("Testlist_cand"));
}

#[tokio::test]
async fn status_transitions_follow_state_machine() {
    let app = app().await;
    let employer = app.create_employer("status_emp").await;
    let candidate = app.create_candidate("status_cand").await;
    let job_id = post_active_job(app, &employer, "status").await;

    let resp = app
        .post_json(
            &format!("/jobs/{}/apply", job_id),
            json!({}),
            Some(&candidate.access_token),
        )
        .await;
    let application_id = resp.json()["id"].as_str().expect("application id").to_string();

    // pending -> accepted skips review and must be rejected.
    let resp = app
        .patch_json(
            &format!("/applications/{}/status", application_id),
            json!({ "status": "accepted" }),
            Some(&employer.access_token),
        )
        .await;
    assert_eq!(resp.status, StatusCode::BAD_REQUEST);

    // pending -> reviewed -> interview -> accepted is legal.
    for status in ["reviewed", "interview", "accepted"] {
        let resp = app
            .patch_json(
                &format!("/applications/{}/status", application_id),
                json!({ "status": status }),
                Some(&employer.access_token),
            )
            .await;
        assert_eq!(resp.status, StatusCode::OK, "transition to {}", status);
        assert_eq!(resp.json()["status"], status);
    }

    // accepted is terminal.
    let resp = app
        .patch_json(
            &format!("/applications/{}/status", application_id),
            json!({ "status": "rejected" }),
            Some(&employer.access_token),
        )
        .await;
    assert_eq!(resp.status, StatusCode::BAD_REQUEST);

    // Every hop was recorded.
    let resp = app
        .get(
            &format!("/applications/{}", application_id),
            Some(&employer.access_token),
        )
        .await;
    assert_eq!(resp.status, StatusCode::OK);
    let history = resp.json()["status_history"]
        .as_array()
        .cloned()
        .unwrap_or_default();
    assert_eq!(history.len(), 3);
    assert_eq!(history[0]["new_status"], "reviewed");
    assert_eq!(history[2]["new_status"], "accepted");
}

#[tokio::test]
async fn status_change_notifies_candidate() {
    let app = app().await;
    let employer = app.create_employer("status_notif_emp").await;
    let candidate = app.create_candidate("status_notif_cand").await;
    let job_id = post_active_job(app, &employer, "status_notif").await;

    let resp = app
        .post_json(
            &format!("/jobs/{}/apply", job_id),
            json!({}),
            Some(&candidate.access_token),
        )
        .await;
    let application_id = resp.json()["id"].as_str().expect("application id").to_string();

    let resp = app
        .patch_json(
            &format!("/applications/{}/status", application_id),
            json!({ "status": "shortlisted" }),
            Some(&employer.access_token),
        )
        .await;
    assert_eq!(resp.status, StatusCode::OK);

    let resp = app
        .get("/notifications", Some(&candidate.access_token))
        .await;
    let notifications = resp.json()["notifications"]
        .as_array()
        .cloned()
        .unwrap_or_default();
    assert!(notifications
        .iter()
        .any(|n| n["notification_type"] == "application_status"));
}

#[tokio::test]
async fn only_owning_employer_changes_status() {
    let app = app().await;
    let employer = app.create_employer("status_own_emp").await;
    let intruder = app.create_employer("status_own_other").await;
    let candidate = app.create_candidate("status_own_cand").await;
    let job_id = post_active_job(app, &employer, "status_own").await;

    let resp = app
        .post_json(
            &format!("/jobs/{}/apply", job_id),
            json!({}),
            Some(&candidate.access_token),
        )
        .await;
    let application_id = resp.json()["id"].as_str().expect("application id").to_string();

    let resp = app
        .patch_json(
            &format!("/applications/{}/status", application_id),
            json!({ "status": "reviewed" }),
            Some(&intruder.access_token),
        )
        .await;
    assert_eq!(resp.status, StatusCode::FORBIDDEN);
}

#[tokio::test]
async fn withdraw_is_terminal() {
    let app = app().await;
    let employer = app.create_employer("withdraw_emp").await;
    let candidate = app.create_candidate("withdraw_cand").await;
    let job_id = post_active_job(app, &employer, "withdraw").await;

    let resp = app
        .post_json(
            &format!("/jobs/{}/apply", job_id),
            json!({}),
            Some(&candidate.access_token),
        )
        .await;
    let application_id = resp.json()["id"].as_str().expect("application id").to_string();

    let resp = app
        .post_json(
            &format!("/applications/{}/withdraw", application_id),
            json!({}),
            Some(&candidate.access_token),
        )
        .await;
    assert_eq!(resp.status, StatusCode::OK);
    let body = resp.json();
    assert_eq!(body["status"], "withdrawn");
    assert_eq!(body["is_withdrawn"], true);

    // Withdrawing twice conflicts.
    let resp = app
        .post_json(
            &format!("/applications/{}/withdraw", application_id),
            json!({}),
            Some(&candidate.access_token),
        )
        .await;
    assert_eq!(resp.status, StatusCode::CONFLICT);

    // The employer cannot revive a withdrawn application.
    let resp = app
        .patch_json(
            &format!("/applications/{}/status", application_id),
            json!({ "status": "reviewed" }),
            Some(&employer.access_token),
        )
        .await;
    assert_eq!(resp.status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn withdraw_refreshes_employer_listing() {
    let app = app().await;
    let employer = app.create_employer("withdraw_cache_emp").await;
    let candidate = app.create_candidate("withdraw_cache_cand").await;
    let job_id = post_active_job(app, &employer, "withdraw_cache").await;

    let resp = app
        .post_json(
            &format!("/jobs/{}/apply", job_id),
            json!({}),
            Some(&candidate.access_token),
        )
        .await;
    let application_id = resp.json()["id"].as_str().expect("application id").to_string();

    // Prime the employer's cached listing.
    let resp = app
        .get("/applications", Some(&employer.access_token))
        .await;
    let items = resp.json()["items"].as_array().cloned().unwrap_or_default();
    assert_eq!(items[0]["status"], "pending");

    let resp = app
        .post_json(
            &format!("/applications/{}/withdraw", application_id),
            json!({}),
            Some(&candidate.access_token),
        )
        .await;
    assert_eq!(resp.status, StatusCode::OK);

    // The withdrawal is visible to the employer right away, not after a TTL.
    let resp = app
        .get("/applications", Some(&employer.access_token))
        .await;
    let items = resp.json()["items"].as_array().cloned().unwrap_or_default();
    assert_eq!(items[0]["status"], "withdrawn");
}

#[tokio::test]
async fn candidate_cannot_see_strangers_application() {
    let app = app().await;
    let employer = app.create_employer("priv_emp").await;
    let candidate = app.create_candidate("priv_cand").await;
    let snoop = app.create_candidate("priv_snoop").await;
    let job_id = post_active_job(app, &employer, "priv").await;

    let resp = app
        .post_json(
            &format!("/jobs/{}/apply", job_id),
            json!({}),
            Some(&candidate.access_token),
        )
        .await;
    let application_id = resp.json()["id"].as_str().expect("application id").to_string();

    let resp = app
        .get(
            &format!("/applications/{}", application_id),
            Some(&snoop.access_token),
        )
        .await;
    assert_eq!(resp.status, StatusCode::FORBIDDEN);
}

#[tokio::test]
async fn resume_url_requires_attached_resume() {
    let app = app().await;
    let employer = app.create_employer("resume_emp").await;
    let candidate = app.create_candidate("resume_cand").await;
    let job_id = post_active_job(app, &employer, "resume").await;

    let resp = app
        .post_json(
            &format!("/jobs/{}/apply", job_id),
            json!({}),
            Some(&candidate.access_token),
        )
        .await;
    let application_id = resp.json()["id"].as_str().expect("application id").to_string();

    let resp = app
        .get(
            &format!("/applications/{}/resume-url", application_id),
            Some(&employer.access_token),
        )
        .await;
    assert_eq!(resp.status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn resume_url_presigned_for_employer() {
    let app = app().await;
    let employer = app.create_employer("resume2_emp").await;
    let candidate = app.create_candidate("resume2_cand").await;
    let job_id = post_active_job(app, &employer, "resume2").await;

    let resp = app
        .post_json(
            &format!("/jobs/{}/apply", job_id),
            json!({ "resume_key": format!("resumes/{}/cv.pdf", candidate.id) }),
            Some(&candidate.access_token),
        )
        .await;
    assert_eq!(resp.status, StatusCode::CREATED);
    let application_id = resp.json()["id"].as_str().expect("application id").to_string();
    assert_eq!(resp.json()["has_resume"], true);

    let resp = app
        .get(
            &format!("/applications/{}/resume-url", application_id),
            Some(&employer.access_token),
        )
        .await;
    assert_eq!(resp.status, StatusCode::OK);
    let url = resp.json()["url"].as_str().unwrap_or("").to_string();
    assert!(url.contains("X-Amz-Signature"));

    // The candidate side never gets the presign endpoint.
    let resp = app
        .get(
            &format!("/applications/{}/resume-url", application_id),
            Some(&candidate.access_token),
        )
        .await;
    assert_eq!(resp.status, StatusCode::FORBIDDEN);
}
