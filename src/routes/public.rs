use crate::{AppState, handlers};
use axum::{
    Router,
    routing::{get, post},
};

/// Public Router Module
///
/// Defines endpoints that are **unauthenticated** and accessible to any client
/// (anonymous or logged-in): the health probe, the identity gateway
/// (registration and login), and the read-only course catalog.
///
/// Security Mandate:
/// Nothing here may expose chapter content or per-student data. The catalog
/// listing is limited to course summaries (title, description, mentor name,
/// chapter count); everything beyond that sits behind the authenticated router.
pub fn public_routes() -> Router<AppState> {
    Router::new()
        // GET /health
        // A simple, unauthenticated endpoint used for monitoring and load balancer checks.
        // Returns "ok" immediately to verify the service is running and responsive.
        .route("/health", get(|| async { "ok" }))
        // POST /auth/register
        // Creates a student or mentor account. Mentors start unapproved and
        // must wait for an admin before they can author courses.
        .route("/auth/register", post(handlers::register))
        // POST /auth/login
        // Verifies credentials and issues the bearer token used by every
        // protected endpoint.
        .route("/auth/login", post(handlers::login))
        // GET /courses
        // Lists the public catalog: all courses with mentor names and chapter
        // counts, but no chapter content.
        .route("/courses", get(handlers::list_courses))
}
