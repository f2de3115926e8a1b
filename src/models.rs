use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use ts_rs::TS;
use utoipa::ToSchema;
use uuid::Uuid;

use crate::progress::CompletionSummary;

// --- Core Application Schemas (Mapped to Database) ---

/// User
///
/// The canonical identity record stored in the `users` table, minus the password
/// hash (which never leaves the repository layer; see `UserCredentials`).
/// `role` is one of 'student', 'mentor', 'admin' and is immutable after
/// registration. `is_approved` only carries meaning for mentors: authoring is
/// blocked until an admin flips it.
#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema, FromRow, Default)]
#[ts(export)]
pub struct User {
    pub id: Uuid,
    pub email: String,
    pub full_name: String,
    // The RBAC field: 'student', 'mentor' or 'admin'.
    pub role: String,
    pub is_approved: bool,
    #[ts(type = "string")]
    pub created_at: DateTime<Utc>,
}

/// UserCredentials
///
/// Internal row used by the login flow only: the `users` record including the
/// stored password hash. Never serialized into a response.
#[derive(Debug, Clone, FromRow)]
pub struct UserCredentials {
    pub id: Uuid,
    pub email: String,
    pub full_name: String,
    pub role: String,
    pub is_approved: bool,
    pub created_at: DateTime<Utc>,
    pub password_hash: String,
}

impl From<UserCredentials> for User {
    fn from(row: UserCredentials) -> Self {
        User {
            id: row.id,
            email: row.email,
            full_name: row.full_name,
            role: row.role,
            is_approved: row.is_approved,
            created_at: row.created_at,
        }
    }
}

/// NewUser
///
/// Internal insert payload assembled by the registration handler once the
/// password has been hashed and the role validated.
#[derive(Debug, Clone)]
pub struct NewUser {
    pub email: String,
    pub password_hash: String,
    pub full_name: String,
    pub role: String,
    pub is_approved: bool,
}

/// Course
///
/// A course record from the `courses` table. Owned by exactly one mentor;
/// exists independently of its chapters.
#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema, FromRow, Default)]
#[ts(export)]
pub struct Course {
    pub id: Uuid,
    // FK to users.id (the owning mentor).
    pub mentor_id: Uuid,
    pub title: String,
    pub description: String,
    #[ts(type = "string")]
    pub created_at: DateTime<Utc>,
    #[ts(type = "string")]
    pub updated_at: DateTime<Utc>,
}

/// CourseSummary
///
/// Catalog projection of a course: the course row joined with the mentor's
/// name and the chapter count. Used by the public listing and the student's
/// enrolled-courses view.
#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema, FromRow, Default)]
#[ts(export)]
pub struct CourseSummary {
    pub id: Uuid,
    pub title: String,
    pub description: String,
    // Loaded via a JOIN with users.
    pub mentor_name: String,
    pub total_chapters: i64,
    #[ts(type = "string")]
    pub created_at: DateTime<Utc>,
}

/// Chapter
///
/// A chapter belonging to exactly one course. `sequence_order` is a strictly
/// positive integer forming a dense 1..N ordering within the course; it is
/// assigned at creation (append-only) and rewritten only by the delete-reindex
/// transaction, never by updates.
#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema, FromRow, Default)]
#[ts(export)]
pub struct Chapter {
    pub id: Uuid,
    pub course_id: Uuid,
    pub title: String,
    pub description: String,
    // Media asset URLs produced by the presigned upload pipeline.
    pub video_url: Option<String>,
    pub pdf_url: Option<String>,
    pub sequence_order: i32,
    #[ts(type = "string")]
    pub created_at: DateTime<Utc>,
    #[ts(type = "string")]
    pub updated_at: DateTime<Utc>,
}

/// Progress
///
/// A (student, chapter) completion record from the `progress` table. Rows are
/// created on first completion; the unique (student_id, chapter_id) constraint
/// is what makes the completion race resolve to a single winner. The unlock
/// state is *not* stored here: it is derived on every read (see `progress`).
#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema, FromRow, Default)]
#[ts(export)]
pub struct Progress {
    pub id: Uuid,
    pub student_id: Uuid,
    pub chapter_id: Uuid,
    pub completed: bool,
    pub completed_at: Option<DateTime<Utc>>,
}

/// Certificate
///
/// One per (student, course), created lazily the first time a fully-completed
/// course is queried for a certificate. Immutable once issued.
#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema, FromRow, Default)]
#[ts(export)]
pub struct Certificate {
    pub id: Uuid,
    pub student_id: Uuid,
    pub course_id: Uuid,
    #[ts(type = "string")]
    pub issued_at: DateTime<Utc>,
}

/// CertificateView
///
/// List projection of a certificate joined with its course title.
#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema, FromRow, Default)]
#[ts(export)]
pub struct CertificateView {
    pub id: Uuid,
    pub course_id: Uuid,
    pub course_title: String,
    #[ts(type = "string")]
    pub issued_at: DateTime<Utc>,
}

/// EnrolledStudent
///
/// Roster projection for mentors/admins: a student enrolled in a course.
#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema, FromRow, Default)]
#[ts(export)]
pub struct EnrolledStudent {
    pub id: Uuid,
    pub email: String,
    pub full_name: String,
    #[ts(type = "string")]
    pub assigned_at: DateTime<Utc>,
}

/// ProgressAggregateRow
///
/// Internal row produced by the per-enrollment aggregate query (chapter and
/// completion counts grouped by course). The percentage is computed in Rust,
/// not SQL, so the rounding rule lives in exactly one place.
#[derive(Debug, Clone, FromRow)]
pub struct ProgressAggregateRow {
    pub course_id: Uuid,
    pub course_title: String,
    pub total_chapters: i64,
    pub completed_chapters: i64,
}

// --- Request Payloads (Input Schemas) ---

/// RegisterRequest
///
/// Input payload for the public registration endpoint (POST /auth/register).
/// `role` must be 'student' or 'mentor'; admins are seeded, never registered.
#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema)]
#[ts(export)]
pub struct RegisterRequest {
    pub email: String,
    pub password: String,
    pub full_name: String,
    pub role: String,
}

/// LoginRequest
#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema)]
#[ts(export)]
pub struct LoginRequest {
    pub email: String,
    pub password: String,
}

/// CreateCourseRequest
#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema, Default)]
#[ts(export)]
pub struct CreateCourseRequest {
    pub title: String,
    pub description: String,
}

/// UpdateCourseRequest
///
/// Partial update payload. Uses `Option<T>` plus
/// `#[serde(skip_serializing_if = "Option::is_none")]` so only provided fields
/// travel in the JSON payload; the repository applies them via COALESCE.
#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema, Default)]
#[ts(export)]
pub struct UpdateCourseRequest {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

/// CreateChapterRequest
///
/// Input for POST /courses/{id}/chapters. The sequence_order is *not* part of
/// the payload: it is assigned server-side as max(existing)+1.
#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema, Default)]
#[ts(export)]
pub struct CreateChapterRequest {
    pub title: String,
    pub description: String,
    pub video_url: Option<String>,
    pub pdf_url: Option<String>,
}

/// UpdateChapterRequest
///
/// Mutates title/description/media URLs only; there is deliberately no way to
/// touch `sequence_order` through this payload.
#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema, Default)]
#[ts(export)]
pub struct UpdateChapterRequest {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub video_url: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub pdf_url: Option<String>,
}

/// AssignStudentsRequest
///
/// Batch enrollment payload for POST /courses/{id}/assignments.
#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema, Default)]
#[ts(export)]
pub struct AssignStudentsRequest {
    pub student_ids: Vec<Uuid>,
}

/// PresignedUrlRequest
///
/// Input payload for requesting a short-lived S3 upload URL (POST /uploads/presigned).
/// The server uses these fields to set security constraints on the generated URL.
#[derive(Debug, Clone, Deserialize, Serialize, ToSchema, TS, Default)]
#[ts(export)]
pub struct PresignedUrlRequest {
    /// The original filename, used to derive the file extension.
    #[schema(example = "intro_lecture.mp4")]
    pub filename: String,
    /// The MIME type, used to constrain the S3 upload to the allowed type (security).
    #[schema(example = "video/mp4")]
    pub file_type: String,
}

// --- Response Schemas (Output) ---

/// LoginResponse
///
/// Bearer token plus the resolved profile, returned by POST /auth/login.
#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema, Default)]
#[ts(export)]
pub struct LoginResponse {
    pub token: String,
    pub user: User,
}

/// MessageResponse
///
/// Plain confirmation body for operations whose only output is "it happened"
/// (progress reset, mentor approval).
#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema, Default)]
#[ts(export)]
pub struct MessageResponse {
    pub message: String,
}

/// PresignedUrlResponse
///
/// Output schema containing the secure, temporary URL for client-to-cloud file transfer.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema, TS, Default)]
#[ts(export)]
pub struct PresignedUrlResponse {
    /// The time-limited URL for the PUT request.
    pub upload_url: String,
    /// The S3 object key where the file will be stored (referenced by chapter media URLs).
    pub resource_key: String,
}

/// CourseDetail
///
/// A course with its ordered chapter list (GET /courses/{id}). For enrolled
/// students the handler blanks the media URLs of locked chapters before the
/// payload leaves the server; owners and admins always see everything.
#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema, Default)]
#[ts(export)]
pub struct CourseDetail {
    pub course: Course,
    pub chapters: Vec<Chapter>,
}

/// ChapterProgressView
///
/// One chapter of a course as seen by a particular student: the catalog fields
/// plus the derived `is_unlocked`/`is_completed` flags. The flags are computed
/// from the ordered chapter list and the student's completion set on every
/// read; they are never persisted.
#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema, Default)]
#[ts(export)]
pub struct ChapterProgressView {
    pub chapter_id: Uuid,
    pub title: String,
    pub sequence_order: i32,
    pub is_unlocked: bool,
    pub is_completed: bool,
    pub completed_at: Option<DateTime<Utc>>,
}

/// CourseProgressSummary
///
/// Aggregate completion state of one enrolled course (GET /progress/my).
#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema, Default)]
#[ts(export)]
pub struct CourseProgressSummary {
    pub course_id: Uuid,
    pub course_title: String,
    pub completion: CompletionSummary,
}

/// CourseProgressDetail
///
/// Aggregate plus the ordered per-chapter unlock view
/// (GET /progress/course/{courseId}).
#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema, Default)]
#[ts(export)]
pub struct CourseProgressDetail {
    pub course_id: Uuid,
    pub course_title: String,
    pub completion: CompletionSummary,
    pub chapters: Vec<ChapterProgressView>,
}

/// CompleteChapterResponse
///
/// Result of POST /progress/{chapterId}/complete: the upserted record plus the
/// course-wide completion numbers after this write.
#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema, Default)]
#[ts(export)]
pub struct CompleteChapterResponse {
    pub message: String,
    pub progress: Progress,
    pub completion: CompletionSummary,
}

/// EligibilityResponse
///
/// Certificate eligibility verdict (GET /certificates/{courseId}/status).
/// Eligible iff the student is enrolled, the course has at least one chapter,
/// and every chapter is completed.
#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema, Default)]
#[ts(export)]
pub struct EligibilityResponse {
    pub eligible: bool,
    pub percentage: f64,
    pub message: String,
}

/// AssignmentOutcome
///
/// Per-item result of the batch enrollment operation. Items that cannot be
/// enrolled (unknown user, wrong role, already assigned) are skipped with a
/// reason while the remaining items commit together.
#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema, Default)]
#[ts(export)]
pub struct AssignmentOutcome {
    pub student_id: Uuid,
    // "assigned" | "skipped"
    pub status: String,
    pub reason: Option<String>,
}

/// AssignStudentsResponse
#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema, Default)]
#[ts(export)]
pub struct AssignStudentsResponse {
    pub assigned: usize,
    pub skipped: usize,
    pub results: Vec<AssignmentOutcome>,
}

/// AdminStats
///
/// Output schema for the administrative analytics dashboard (GET /admin/stats).
#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema, Default)]
#[ts(export)]
pub struct AdminStats {
    pub total_students: i64,
    pub total_mentors: i64,
    /// Mentors awaiting approval.
    pub pending_mentors: i64,
    pub total_courses: i64,
    pub total_chapters: i64,
    pub total_enrollments: i64,
    pub chapters_completed: i64,
    pub certificates_issued: i64,
}
