use crate::{AppState, handlers};
use axum::{
    Router,
    routing::{delete, get, post, put},
};

/// Authenticated Router Module
///
/// Defines the routes accessible to any user who has successfully passed the
/// authentication layer. All three roles land here; the finer-grained checks
/// (student-only progress, approved-mentor authoring, ownership, enrollment)
/// are enforced per-handler.
///
/// Access Control Strategy:
/// Every handler in this module relies on the `AuthUser` extractor middleware being present
/// on the router layer above this module. This guarantees that all handlers receive a
/// validated `AuthUser` struct containing the user's ID, role and approval flag, which is
/// then used for the role, ownership and enrollment checks.
pub fn authenticated_routes() -> Router<AppState> {
    Router::<AppState>::new()
        // GET /auth/me
        // Retrieves the currently authenticated user's profile record.
        .route("/auth/me", get(handlers::get_me))
        // --- Course Catalog (role-dependent views) ---
        // GET /courses/my
        // The student's enrolled courses. Registered before /courses/{id} in
        // reading order, though axum matches static segments first anyway.
        .route("/courses/my", get(handlers::my_courses))
        // GET /courses/mine
        // The mentor's own courses, including ones without chapters yet.
        .route("/courses/mine", get(handlers::mentor_courses))
        // POST /courses
        // Creates a course owned by the calling mentor. Requires approval.
        .route("/courses", post(handlers::create_course))
        // GET/PUT/DELETE /courses/{id}
        // Detail view (enrolled student, owner or admin; locked chapters are
        // served without media URLs to students), plus owner-only mutation.
        .route(
            "/courses/{id}",
            get(handlers::get_course_detail)
                .put(handlers::update_course)
                .delete(handlers::delete_course),
        )
        // --- Chapter Authoring (owner-only) ---
        // POST /courses/{id}/chapters
        // Appends a chapter; the server assigns the next sequence_order.
        .route("/courses/{id}/chapters", post(handlers::create_chapter))
        // PUT/DELETE /courses/{id}/chapters/{chapter_id}
        // Edit content fields, or delete and renumber the rest of the course.
        .route(
            "/courses/{id}/chapters/{chapter_id}",
            put(handlers::update_chapter).delete(handlers::delete_chapter),
        )
        // --- Enrollment (owner-only) ---
        // POST /courses/{id}/assignments
        // Batch-enrolls students with per-item outcomes.
        .route("/courses/{id}/assignments", post(handlers::assign_students))
        // DELETE /courses/{id}/assignments/{student_id}
        // Unenrolls one student and purges their progress in the course.
        .route(
            "/courses/{id}/assignments/{student_id}",
            delete(handlers::unassign_student),
        )
        // GET /courses/{id}/students
        // The roster, for the owning mentor or an admin.
        .route("/courses/{id}/students", get(handlers::course_students))
        // --- Progress (student-only) ---
        // POST /progress/{chapter_id}/complete
        // The single mutating transition of the completion state machine.
        .route(
            "/progress/{chapter_id}/complete",
            post(handlers::complete_chapter),
        )
        // GET /progress/my[?course_id=]
        // Completion summaries across enrolled courses.
        .route("/progress/my", get(handlers::my_progress))
        // GET /progress/course/{course_id}
        // Aggregate plus per-chapter unlock flags, derived on every read.
        .route("/progress/course/{course_id}", get(handlers::course_progress))
        // DELETE /progress/course/{course_id}/reset
        // Full-course reset; the only way back from completed.
        .route(
            "/progress/course/{course_id}/reset",
            delete(handlers::reset_progress),
        )
        // --- Certificates (student-only) ---
        // GET /certificates/my
        // Everything the student has earned.
        .route("/certificates/my", get(handlers::my_certificates))
        // GET /certificates/{course_id}/status
        // Eligibility verdict with the current percentage.
        .route(
            "/certificates/{course_id}/status",
            get(handlers::certificate_status),
        )
        // GET /certificates/{course_id}
        // Issue-or-fetch: mints on the first eligible call, then always
        // returns the same record.
        .route("/certificates/{course_id}", get(handlers::get_certificate))
        // --- Media Pipeline (approved mentors) ---
        // POST /uploads/presigned
        // Initiates the secure media upload pipeline. Generates a short-lived
        // presigned S3 URL which allows the client to upload video/image/PDF
        // chapter media directly to storage, bypassing the application server.
        .route("/uploads/presigned", post(handlers::get_presigned_url))
}
