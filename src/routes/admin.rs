use crate::{AppState, handlers};
use axum::{
    Router,
    routing::{get, put},
};

/// Admin Router Module
///
/// Defines the routes exclusively accessible to users with the 'admin' role:
/// the mentor approval queue and platform analytics. Nested under `/admin`
/// by the top-level router.
///
/// Access Control:
/// Every handler takes the `AuthUser` extractor, so an unauthenticated request
/// is rejected with 401 before the handler body runs, and each handler then
/// explicitly requires `role='admin'` before touching the repository.
pub fn admin_routes() -> Router<AppState> {
    Router::new()
        // GET /admin/stats
        // Core dashboard counters: users by role, pending approvals, courses,
        // chapters, enrollments, completions and issued certificates.
        .route("/stats", get(handlers::admin_stats))
        // GET /admin/users
        // The full user list for oversight.
        .route("/users", get(handlers::admin_users))
        // GET /admin/mentors/pending
        // Mentors who registered and are waiting for approval.
        .route("/mentors/pending", get(handlers::pending_mentors))
        // PUT /admin/users/{id}/approve-mentor
        // Grants authoring rights to a mentor account.
        .route(
            "/users/{id}/approve-mentor",
            put(handlers::approve_mentor),
        )
        // PUT /admin/users/{id}/reject-mentor
        // Declines a pending mentor or revokes an existing approval.
        .route(
            "/users/{id}/reject-mentor",
            put(handlers::reject_mentor),
        )
}
