mod common;

use common::{MemoryRepository, seed_user, spawn_app, state_with};
use chapterwise_api::MockStorageService;
use serde_json::{Value, json};
use std::sync::Arc;
use uuid::Uuid;

async fn spawn_default_app() -> (Arc<MemoryRepository>, String) {
    let repo = Arc::new(MemoryRepository::new());
    let address = spawn_app(state_with(repo.clone(), MockStorageService::new())).await;
    (repo, address)
}

#[tokio::test]
async fn health_check_works() {
    let (_repo, address) = spawn_default_app().await;
    let client = reqwest::Client::new();

    let response = client
        .get(format!("{address}/health"))
        .send()
        .await
        .expect("Failed to execute request.");

    assert_eq!(response.status(), 200);
    assert_eq!(response.text().await.unwrap(), "ok");
}

#[tokio::test]
async fn register_login_and_me_round_trip_over_http() {
    let (_repo, address) = spawn_default_app().await;
    let client = reqwest::Client::new();
    let email = format!("journey-{}@example.com", Uuid::new_v4());

    let response = client
        .post(format!("{address}/auth/register"))
        .json(&json!({
            "email": email,
            "password": "correct-horse-battery",
            "full_name": "Journey Tester",
            "role": "student"
        }))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), 201);

    let response = client
        .post(format!("{address}/auth/login"))
        .json(&json!({ "email": email, "password": "correct-horse-battery" }))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), 200);
    let body: Value = response.json().await.unwrap();
    let token = body["token"].as_str().unwrap().to_string();
    assert_eq!(body["user"]["email"], email.as_str());

    let response = client
        .get(format!("{address}/auth/me"))
        .bearer_auth(&token)
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), 200);
    let me: Value = response.json().await.unwrap();
    assert_eq!(me["email"], email.as_str());
    assert_eq!(me["role"], "student");
}

#[tokio::test]
async fn requests_without_credentials_are_refused() {
    let (_repo, address) = spawn_default_app().await;
    let client = reqwest::Client::new();

    let response = client
        .get(format!("{address}/auth/me"))
        .send()
        .await
        .unwrap();

    assert_eq!(response.status(), 401);
    let body: Value = response.json().await.unwrap();
    assert_eq!(body["error"], "missing authorization header");
}

#[tokio::test]
async fn admin_routes_refuse_non_admins() {
    let (repo, address) = spawn_default_app().await;
    let student = seed_user(&repo, "student", true).await;
    let client = reqwest::Client::new();

    let response = client
        .get(format!("{address}/admin/stats"))
        .header("x-user-id", student.id.to_string())
        .send()
        .await
        .unwrap();

    assert_eq!(response.status(), 403);
    let body: Value = response.json().await.unwrap();
    assert_eq!(body["error"], "admin access required");
}

#[tokio::test]
async fn progress_routes_404_with_an_error_body_for_unknown_courses() {
    let (repo, address) = spawn_default_app().await;
    let student = seed_user(&repo, "student", true).await;
    let client = reqwest::Client::new();

    let response = client
        .get(format!("{address}/progress/course/{}", Uuid::new_v4()))
        .header("x-user-id", student.id.to_string())
        .send()
        .await
        .unwrap();

    assert_eq!(response.status(), 404);
    let body: Value = response.json().await.unwrap();
    assert_eq!(body["error"], "course not found");
}

/// End-to-end walkthrough of the platform roles over real HTTP: an admin
/// approves a mentor, the mentor authors and staffs a course, a student walks
/// the chapter sequence and earns the certificate.
#[tokio::test]
async fn full_learning_journey_over_http() {
    let (repo, address) = spawn_default_app().await;
    let admin = seed_user(&repo, "admin", true).await;
    let client = reqwest::Client::new();

    // A self-registered mentor starts out unapproved.
    let response = client
        .post(format!("{address}/auth/register"))
        .json(&json!({
            "email": format!("mentor-{}@example.com", Uuid::new_v4()),
            "password": "mentor-password",
            "full_name": "Morgan Mentor",
            "role": "mentor"
        }))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), 201);
    let mentor: Value = response.json().await.unwrap();
    let mentor_id = mentor["id"].as_str().unwrap().to_string();
    assert_eq!(mentor["is_approved"], false);

    // Authoring is shut until an admin signs off.
    let response = client
        .post(format!("{address}/courses"))
        .header("x-user-id", &mentor_id)
        .json(&json!({ "title": "Intro to Databases", "description": "Tables and joins" }))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), 403);

    let response = client
        .put(format!("{address}/admin/users/{mentor_id}/approve-mentor"))
        .header("x-user-id", admin.id.to_string())
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), 200);

    // Course and two chapters.
    let response = client
        .post(format!("{address}/courses"))
        .header("x-user-id", &mentor_id)
        .json(&json!({ "title": "Intro to Databases", "description": "Tables and joins" }))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), 201);
    let course: Value = response.json().await.unwrap();
    let course_id = course["id"].as_str().unwrap().to_string();

    let mut chapter_ids = Vec::new();
    for title in ["Relational model", "Joins"] {
        let response = client
            .post(format!("{address}/courses/{course_id}/chapters"))
            .header("x-user-id", &mentor_id)
            .json(&json!({ "title": title, "description": "..." }))
            .send()
            .await
            .unwrap();
        assert_eq!(response.status(), 201);
        let chapter: Value = response.json().await.unwrap();
        chapter_ids.push(chapter["id"].as_str().unwrap().to_string());
    }

    // Student joins and is staffed onto the course by the mentor.
    let response = client
        .post(format!("{address}/auth/register"))
        .json(&json!({
            "email": format!("student-{}@example.com", Uuid::new_v4()),
            "password": "student-password",
            "full_name": "Sam Student",
            "role": "student"
        }))
        .send()
        .await
        .unwrap();
    let student: Value = response.json().await.unwrap();
    let student_id = student["id"].as_str().unwrap().to_string();

    let response = client
        .post(format!("{address}/courses/{course_id}/assignments"))
        .header("x-user-id", &mentor_id)
        .json(&json!({ "student_ids": [student_id] }))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), 200);
    let outcome: Value = response.json().await.unwrap();
    assert_eq!(outcome["assigned"], 1);

    // The second chapter is locked until the first is done.
    let response = client
        .post(format!("{address}/progress/{}/complete", chapter_ids[1]))
        .header("x-user-id", &student_id)
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), 403);

    let response = client
        .post(format!("{address}/progress/{}/complete", chapter_ids[0]))
        .header("x-user-id", &student_id)
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), 200);
    let progress: Value = response.json().await.unwrap();
    assert_eq!(progress["completion"]["percentage"], 50.0);

    let response = client
        .post(format!("{address}/progress/{}/complete", chapter_ids[1]))
        .header("x-user-id", &student_id)
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), 200);
    let progress: Value = response.json().await.unwrap();
    assert_eq!(progress["completion"]["is_complete"], true);

    // Full completion earns the certificate.
    let response = client
        .get(format!("{address}/certificates/{course_id}"))
        .header("x-user-id", &student_id)
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), 200);
    let certificate: Value = response.json().await.unwrap();
    assert_eq!(certificate["course_id"].as_str().unwrap(), course_id);

    let response = client
        .get(format!("{address}/certificates/my"))
        .header("x-user-id", &student_id)
        .send()
        .await
        .unwrap();
    let wall: Value = response.json().await.unwrap();
    assert_eq!(wall.as_array().unwrap().len(), 1);
    assert_eq!(wall[0]["course_title"], "Intro to Databases");

    // The public catalog reflects the new course without any credentials.
    let response = client
        .get(format!("{address}/courses"))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), 200);
    let catalog: Value = response.json().await.unwrap();
    assert_eq!(catalog.as_array().unwrap().len(), 1);
    assert_eq!(catalog[0]["mentor_name"], "Morgan Mentor");
    assert_eq!(catalog[0]["total_chapters"], 2);
}
