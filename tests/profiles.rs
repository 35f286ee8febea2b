//! Candidate and employer profile tests, including nested collection
//! replacement semantics.

mod common;

use axum::http::StatusCode;
use common::app;
use serde_json::json;

#[tokio::test]
async fn candidate_profile_roundtrip() {
    let app = app().await;
    let user = app.create_candidate("prof_rt").await;

    let resp = app.get("/profiles/me", Some(&user.access_token)).await;
    assert_eq!(resp.status, StatusCode::OK);
    let body = resp.json();
    assert_eq!(body["email"], user.email);
    assert_eq!(body["skills"], json!([]));

    let resp = app
        .patch_json(
            "/profiles/me",
            json!({
                "headline": "Backend engineer",
                "about": "Ten years of services.",
                "github": "https://github.com/example",
            }),
            Some(&user.access_token),
        )
        .await;
    assert_eq!(resp.status, StatusCode::OK);
    let body = resp.json();
    assert_eq!(body["headline"], "Backend engineer");
    assert_eq!(body["github"], "https://github.com/example");

    // Untouched fields survive partial updates.
    let resp = app
        .patch_json(
            "/profiles/me",
            json!({ "phone": "+1 555 0100" }),
            Some(&user.access_token),
        )
        .await;
    assert_eq!(resp.status, StatusCode::OK);
    assert_eq!(resp.json()["headline"], "Backend engineer");
}

#[tokio::test]
async fn candidate_skills_replace_wholesale() {
    let app = app().await;
    let user = app.create_candidate("prof_skills").await;
    let rust = app.create_skill("prof-skill-rust").await;
    let sql = app.create_skill("prof-skill-sql").await;
    let go = app.create_skill("prof-skill-go").await;

    let resp = app
        .patch_json(
            "/profiles/me",
            json!({ "skill_ids": [rust, sql] }),
            Some(&user.access_token),
        )
        .await;
    assert_eq!(resp.status, StatusCode::OK);
    assert_eq!(resp.json()["skills"].as_array().map(|s| s.len()), Some(2));

    // A later update replaces the set, it does not append.
    let resp = app
        .patch_json(
            "/profiles/me",
            json!({ "skill_ids": [go] }),
            Some(&user.access_token),
        )
        .await;
    assert_eq!(resp.status, StatusCode::OK);
    let skills = resp.json()["skills"].as_array().cloned().unwrap_or_default();
    assert_eq!(skills.len(), 1);
    assert_eq!(skills[0]["name"], "prof-skill-go");
}

#[tokio::test]
async fn education_entries_replaced_on_update() {
    let app = app().await;
    let user = app.create_candidate("prof_edu").await;

    let resp = app
        .patch_json(
            "/profiles/me",
            json!({
                "education": [
                    { "level": "bachelor", "institution": "State University",
                      "field_of_study": "CS", "start_date": "2015-09-01", "end_date": "2019-06-01" },
                    { "level": "master", "institution": "Tech Institute",
                      "field_of_study": "CS", "start_date": "2019-09-01" }
                ]
            }),
            Some(&user.access_token),
        )
        .await;
    assert_eq!(resp.status, StatusCode::OK);
    assert_eq!(resp.json()["education"].as_array().map(|e| e.len()), Some(2));

    let resp = app
        .patch_json(
            "/profiles/me",
            json!({
                "education": [
                    { "level": "master", "institution": "Tech Institute", "field_of_study": "CS" }
                ]
            }),
            Some(&user.access_token),
        )
        .await;
    assert_eq!(resp.status, StatusCode::OK);
    let education = resp.json()["education"].as_array().cloned().unwrap_or_default();
    assert_eq!(education.len(), 1);
    assert_eq!(education[0]["institution"], "Tech Institute");
}

#[tokio::test]
async fn employer_profile_update() {
    let app = app().await;
    let user = app.create_employer("prof_emp").await;

    let resp = app
        .patch_json(
            "/profiles/me",
            json!({
                "company_name": "Vela Labs",
                "industry": "Software",
                "city": "Lyon",
                "country": "France",
            }),
            Some(&user.access_token),
        )
        .await;
    assert_eq!(resp.status, StatusCode::OK);
    let body = resp.json();
    assert_eq!(body["company_name"], "Vela Labs");
    assert_eq!(body["city"], "Lyon");
}

#[tokio::test]
async fn company_page_is_public() {
    let app = app().await;
    let employer = app.create_employer("prof_public").await;

    let resp = app
        .get(&format!("/companies/{}", employer.profile_id), None)
        .await;
    assert_eq!(resp.status, StatusCode::OK);
    assert_eq!(resp.json()["company_name"], "Acme prof_public");
}

#[tokio::test]
async fn profile_requires_auth() {
    let app = app().await;

    let resp = app.get("/profiles/me", None).await;
    assert_eq!(resp.status, StatusCode::UNAUTHORIZED);
}
