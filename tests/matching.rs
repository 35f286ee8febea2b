//! Skill-based job matching: who gets alerted when a job goes active, and
//! the once-per-(candidate, job) guarantee.

mod common;

use axum::http::StatusCode;
use common::app;
use serde_json::json;
use uuid::Uuid;

async fn job_alert_count(app: &common::TestApp, candidate_profile_id: Uuid) -> i64 {
    sqlx::query_scalar(
        "SELECT COUNT(*) FROM job_notifications WHERE candidate_id = $1",
    )
    .bind(candidate_profile_id)
    .fetch_one(app.pool())
    .await
    .expect("job_notifications count")
}

#[tokio::test]
async fn publishing_active_job_alerts_matching_candidates() {
    let app = app().await;
    let employer = app.create_employer("match_emp").await;
    let matching = app.create_candidate("match_yes").await;
    let non_matching = app.create_candidate("match_no").await;

    let rust = app.create_skill("match-rust").await;
    let cobol = app.create_skill("match-cobol").await;
    app.add_candidate_skill(matching.profile_id, rust).await;
    app.add_candidate_skill(non_matching.profile_id, cobol).await;

    let resp = app
        .post_json(
            "/jobs",
            app.job_payload("Rust Engineer match", rust, "active"),
            Some(&employer.access_token),
        )
        .await;
    assert_eq!(resp.status, StatusCode::CREATED);

    assert_eq!(job_alert_count(app, matching.profile_id).await, 1);
    assert_eq!(job_alert_count(app, non_matching.profile_id).await, 0);

    // The matching candidate also got an in-app alert naming the skill.
    let resp = app
        .get("/notifications", Some(&matching.access_token))
        .await;
    let notifications = resp.json()["notifications"]
        .as_array()
        .cloned()
        .unwrap_or_default();
    let alert = notifications
        .iter()
        .find(|n| n["notification_type"] == "job_alert")
        .expect("job_alert notification");
    assert!(alert["content"]
        .as_str()
        .unwrap_or("")
        .contains("match-rust"));
}

#[tokio::test]
async fn optional_skills_do_not_trigger_matching() {
    let app = app().await;
    let employer = app.create_employer("match_opt_emp").await;
    let candidate = app.create_candidate("match_opt_cand").await;

    let required = app.create_skill("match-opt-required").await;
    let optional = app.create_skill("match-opt-nice").await;
    app.add_candidate_skill(candidate.profile_id, optional).await;

    let resp = app
        .post_json(
            "/jobs",
            json!({
                "title": "Picky Role",
                "description": "We are hiring.",
                "employment_type": "full_time",
                "location_type": "remote",
                "experience_level": "senior",
                "status": "active",
                "skills": [
                    { "skill_id": required, "is_required": true },
                    { "skill_id": optional, "is_required": false },
                ],
            }),
            Some(&employer.access_token),
        )
        .await;
    assert_eq!(resp.status, StatusCode::CREATED);

    // Holding only the nice-to-have skill is not a match.
    assert_eq!(job_alert_count(app, candidate.profile_id).await, 0);
}

#[tokio::test]
async fn active_job_without_required_skills_matches_nobody() {
    let app = app().await;
    let employer = app.create_employer("match_none_emp").await;
    let candidate = app.create_candidate("match_none_cand").await;

    let optional = app.create_skill("match-none-nice").await;
    app.add_candidate_skill(candidate.profile_id, optional).await;

    // No skills at all: publishing still succeeds, matching is a no-op.
    let resp = app
        .post_json(
            "/jobs",
            json!({
                "title": "Generalist Role",
                "description": "We are hiring.",
                "employment_type": "full_time",
                "location_type": "remote",
                "experience_level": "intermediate",
                "status": "active",
                "skills": [],
            }),
            Some(&employer.access_token),
        )
        .await;
    assert_eq!(resp.status, StatusCode::CREATED);
    assert_eq!(job_alert_count(app, candidate.profile_id).await, 0);

    // Optional-only skill sets behave the same way.
    let resp = app
        .post_json(
            "/jobs",
            json!({
                "title": "Easygoing Role",
                "description": "We are hiring.",
                "employment_type": "full_time",
                "location_type": "remote",
                "experience_level": "intermediate",
                "status": "active",
                "skills": [{ "skill_id": optional, "is_required": false }],
            }),
            Some(&employer.access_token),
        )
        .await;
    assert_eq!(resp.status, StatusCode::CREATED);
    assert_eq!(job_alert_count(app, candidate.profile_id).await, 0);
}

#[tokio::test]
async fn draft_jobs_do_not_alert() {
    let app = app().await;
    let employer = app.create_employer("match_draft_emp").await;
    let candidate = app.create_candidate("match_draft_cand").await;

    let skill = app.create_skill("match-draft-skill").await;
    app.add_candidate_skill(candidate.profile_id, skill).await;

    let resp = app
        .post_json(
            "/jobs",
            app.job_payload("Quiet Role", skill, "draft"),
            Some(&employer.access_token),
        )
        .await;
    assert_eq!(resp.status, StatusCode::CREATED);

    assert_eq!(job_alert_count(app, candidate.profile_id).await, 0);
}

#[tokio::test]
async fn inactive_users_are_skipped() {
    let app = app().await;
    let employer = app.create_employer("match_inactive_emp").await;
    let candidate = app.create_candidate("match_inactive_cand").await;

    let skill = app.create_skill("match-inactive-skill").await;
    app.add_candidate_skill(candidate.profile_id, skill).await;

    sqlx::query("UPDATE users SET is_active = false WHERE id = $1")
        .bind(candidate.id)
        .execute(app.pool())
        .await
        .expect("deactivate user");

    let resp = app
        .post_json(
            "/jobs",
            app.job_payload("Ghost Role", skill, "active"),
            Some(&employer.access_token),
        )
        .await;
    assert_eq!(resp.status, StatusCode::CREATED);

    assert_eq!(job_alert_count(app, candidate.profile_id).await, 0);
}

#[tokio::test]
async fn repeated_matching_pass_is_idempotent() {
    let app = app().await;
    let employer = app.create_employer("match_idem_emp").await;
    let candidate = app.create_candidate("match_idem_cand").await;

    let skill = app.create_skill("match-idem-skill").await;
    app.add_candidate_skill(candidate.profile_id, skill).await;

    let resp = app
        .post_json(
            "/jobs",
            app.job_payload("Idempotent Role", skill, "active"),
            Some(&employer.access_token),
        )
        .await;
    assert_eq!(resp.status, StatusCode::CREATED);
    let job_id: Uuid =
        serde_json::from_value(resp.json()["id"].clone()).expect("job id");

    assert_eq!(job_alert_count(app, candidate.profile_id).await, 1);

    // Re-running the whole pass (e.g. a retried trigger) records nothing new.
    use vela::app::matching::MatchingService;
    use vela::app::notifications::NotificationService;

    let jobs = vela::app::jobs::JobService::new(app.state.db.clone());
    let job = jobs
        .get_job(job_id)
        .await
        .expect("load job")
        .expect("job exists");
    let matching = MatchingService::new(
        app.state.db.clone(),
        NotificationService::new(app.state.db.clone(), app.state.cache.clone()),
        app.state.mailer.clone(),
    );
    let notified = matching
        .notify_matching_candidates(&job)
        .await
        .expect("matching pass");
    assert_eq!(notified, 0);

    assert_eq!(job_alert_count(app, candidate.profile_id).await, 1);

    // Only one in-app job_alert for this candidate as well.
    let alerts: i64 = sqlx::query_scalar(
        "SELECT COUNT(*) FROM notifications \
         WHERE user_id = $1 AND notification_type = 'job_alert'",
    )
    .bind(candidate.id)
    .fetch_one(app.pool())
    .await
    .expect("notifications count");
    assert_eq!(alerts, 1);
}

#[tokio::test]
async fn activating_a_draft_later_does_not_rerun_matching() {
    let app = app().await;
    let employer = app.create_employer("match_late_emp").await;
    let candidate = app.create_candidate("match_late_cand").await;

    let skill = app.create_skill("match-late-skill").await;
    app.add_candidate_skill(candidate.profile_id, skill).await;

    let resp = app
        .post_json(
            "/jobs",
            app.job_payload("Late Role", skill, "draft"),
            Some(&employer.access_token),
        )
        .await;
    let job_id = resp.json()["id"].as_str().expect("job id").to_string();

    // Flipping the draft to active is a plain update; alerts only fire on
    // creation of an active posting.
    let resp = app
        .patch_json(
            &format!("/jobs/{}", job_id),
            json!({ "status": "active" }),
            Some(&employer.access_token),
        )
        .await;
    assert_eq!(resp.status, StatusCode::OK);
    assert!(resp.json()["posted_at"].is_string());

    assert_eq!(job_alert_count(app, candidate.profile_id).await, 0);
}
