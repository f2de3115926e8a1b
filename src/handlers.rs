use crate::{
    AppState,
    auth::{self, AuthUser},
    error::ApiError,
    models::{
        AdminStats, AssignStudentsRequest, AssignStudentsResponse, Certificate, CertificateView,
        Chapter, CompleteChapterResponse, Course, CourseDetail, CourseProgressDetail,
        CourseProgressSummary, CourseSummary, CreateChapterRequest, CreateCourseRequest,
        EligibilityResponse, EnrolledStudent, LoginRequest, LoginResponse, MessageResponse,
        NewUser, PresignedUrlRequest, PresignedUrlResponse, Progress, RegisterRequest,
        UpdateChapterRequest, UpdateCourseRequest, User,
    },
    progress::{self, ChapterState, CompletionSummary, GateDenied},
    repository::RepositoryError,
    storage,
};
use axum::{
    Json,
    extract::{Path, Query, State},
    http::StatusCode,
};
use chrono::{DateTime, Utc};
use serde::Deserialize;
use std::collections::{HashMap, HashSet};
use uuid::Uuid;

// --- Filter Structs ---

/// ProgressFilter
///
/// Accepted query parameters for GET /progress/my. Without `course_id` the
/// endpoint reports every enrolled course; with it, just that one.
#[derive(Deserialize, utoipa::IntoParams)]
pub struct ProgressFilter {
    /// Optional narrowing to a single enrolled course.
    pub course_id: Option<Uuid>,
}

// --- Shared helpers ---

/// Resolves a course and enforces that the caller is its approved-mentor
/// owner. The existence check runs first so a missing course is a 404 while
/// someone else's course is a 403.
async fn owned_course(
    state: &AppState,
    user: &AuthUser,
    course_id: Uuid,
) -> Result<Course, ApiError> {
    auth::require_approved_mentor(user)?;
    let course = state
        .repo
        .get_course(course_id)
        .await?
        .ok_or_else(|| ApiError::NotFound("course not found".into()))?;
    if course.mentor_id != user.id {
        return Err(ApiError::Forbidden("not the owner of this course".into()));
    }
    Ok(course)
}

/// Resolves a course the student is enrolled in, for progress operations.
/// A missing course is 404; an existing course without enrollment is 403.
async fn enrolled_course(
    state: &AppState,
    user: &AuthUser,
    course_id: Uuid,
) -> Result<Course, ApiError> {
    auth::require_student(user)?;
    let course = state
        .repo
        .get_course(course_id)
        .await?
        .ok_or_else(|| ApiError::NotFound("course not found".into()))?;
    if !state.repo.is_enrolled(course_id, user.id).await? {
        return Err(ApiError::Forbidden("not enrolled in this course".into()));
    }
    Ok(course)
}

fn completed_ids(rows: &[Progress]) -> HashSet<Uuid> {
    rows.iter()
        .filter(|p| p.completed)
        .map(|p| p.chapter_id)
        .collect()
}

fn completed_at_map(rows: &[Progress]) -> HashMap<Uuid, DateTime<Utc>> {
    rows.iter()
        .filter(|p| p.completed)
        .filter_map(|p| p.completed_at.map(|t| (p.chapter_id, t)))
        .collect()
}

// --- Auth Handlers ---

/// register
///
/// [Public Route] Creates a student or mentor account. The password is hashed
/// with Argon2 before it reaches the repository; the plaintext never leaves
/// this handler. Mentors start unapproved and wait for an admin; students are
/// active immediately. Admin accounts are seeded, never registered.
#[utoipa::path(
    post,
    path = "/auth/register",
    request_body = RegisterRequest,
    responses(
        (status = 201, description = "Registered", body = User),
        (status = 400, description = "Invalid input"),
        (status = 409, description = "Email already registered")
    )
)]
pub async fn register(
    State(state): State<AppState>,
    Json(payload): Json<RegisterRequest>,
) -> Result<(StatusCode, Json<User>), ApiError> {
    let email = payload.email.trim().to_lowercase();
    if email.is_empty() || !email.contains('@') {
        return Err(ApiError::Validation("a valid email is required".into()));
    }
    if payload.password.len() < 8 {
        return Err(ApiError::Validation(
            "password must be at least 8 characters".into(),
        ));
    }
    let full_name = payload.full_name.trim().to_string();
    if full_name.is_empty() {
        return Err(ApiError::Validation("full_name is required".into()));
    }
    // Only the two self-service roles can be registered.
    if payload.role != "student" && payload.role != "mentor" {
        return Err(ApiError::Validation(
            "role must be 'student' or 'mentor'".into(),
        ));
    }

    let new_user = NewUser {
        email,
        password_hash: auth::hash_password(&payload.password)?,
        full_name,
        role: payload.role.clone(),
        // Mentors need an admin sign-off before they can author.
        is_approved: payload.role == "student",
    };

    let created = state.repo.create_user(new_user).await.map_err(|e| match e {
        RepositoryError::Conflict => ApiError::Conflict("email already registered".into()),
        other => ApiError::Repository(other),
    })?;

    Ok((StatusCode::CREATED, Json(created)))
}

/// login
///
/// [Public Route] Verifies credentials and issues a signed bearer token.
/// Unknown email and wrong password produce the identical 401 so the endpoint
/// cannot be used to probe which addresses have accounts.
#[utoipa::path(
    post,
    path = "/auth/login",
    request_body = LoginRequest,
    responses(
        (status = 200, description = "Logged in", body = LoginResponse),
        (status = 401, description = "Invalid credentials")
    )
)]
pub async fn login(
    State(state): State<AppState>,
    Json(payload): Json<LoginRequest>,
) -> Result<Json<LoginResponse>, ApiError> {
    let email = payload.email.trim().to_lowercase();

    let creds = state
        .repo
        .find_credentials(&email)
        .await?
        .ok_or_else(|| ApiError::Unauthorized("invalid email or password".into()))?;

    if !auth::verify_password(&payload.password, &creds.password_hash) {
        return Err(ApiError::Unauthorized("invalid email or password".into()));
    }

    let token = auth::issue_token(creds.id, &state.config.jwt_secret)?;

    Ok(Json(LoginResponse {
        token,
        user: creds.into(),
    }))
}

/// get_me
///
/// [Authenticated Route] Returns the caller's full profile record.
#[utoipa::path(
    get,
    path = "/auth/me",
    responses((status = 200, description = "Profile", body = User))
)]
pub async fn get_me(
    AuthUser { id, .. }: AuthUser,
    State(state): State<AppState>,
) -> Result<Json<User>, ApiError> {
    let user = state
        .repo
        .get_user(id)
        .await?
        .ok_or_else(|| ApiError::NotFound("user not found".into()))?;
    Ok(Json(user))
}

// --- Catalog Handlers ---

/// list_courses
///
/// [Public Route] The course catalog: every course with its mentor's name and
/// chapter count. Chapter content is not exposed here.
#[utoipa::path(
    get,
    path = "/courses",
    responses((status = 200, description = "Catalog", body = [CourseSummary]))
)]
pub async fn list_courses(
    State(state): State<AppState>,
) -> Result<Json<Vec<CourseSummary>>, ApiError> {
    Ok(Json(state.repo.list_courses().await?))
}

/// my_courses
///
/// [Student Route] The courses the student is enrolled in, newest first.
#[utoipa::path(
    get,
    path = "/courses/my",
    responses((status = 200, description = "Enrolled courses", body = [CourseSummary]))
)]
pub async fn my_courses(
    user: AuthUser,
    State(state): State<AppState>,
) -> Result<Json<Vec<CourseSummary>>, ApiError> {
    auth::require_student(&user)?;
    Ok(Json(state.repo.list_enrolled_courses(user.id).await?))
}

/// mentor_courses
///
/// [Mentor Route] Everything the mentor owns.
#[utoipa::path(
    get,
    path = "/courses/mine",
    responses((status = 200, description = "Owned courses", body = [Course]))
)]
pub async fn mentor_courses(
    user: AuthUser,
    State(state): State<AppState>,
) -> Result<Json<Vec<Course>>, ApiError> {
    auth::require_approved_mentor(&user)?;
    Ok(Json(state.repo.list_courses_by_mentor(user.id).await?))
}

/// get_course_detail
///
/// [Authenticated Route] A course with its ordered chapters. Owners and admins
/// see the full records; enrolled students see locked chapters with their
/// media URLs blanked, so content behind the sequence gate never leaves the
/// server. Anyone else gets the same 404 as for a missing course.
#[utoipa::path(
    get,
    path = "/courses/{id}",
    params(("id" = Uuid, Path, description = "Course ID")),
    responses(
        (status = 200, description = "Course with chapters", body = CourseDetail),
        (status = 404, description = "Not found or not visible")
    )
)]
pub async fn get_course_detail(
    user: AuthUser,
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Json<CourseDetail>, ApiError> {
    let course = state
        .repo
        .get_course(id)
        .await?
        .ok_or_else(|| ApiError::NotFound("course not found".into()))?;
    let mut chapters = state.repo.list_chapters(id).await?;

    let full_view = user.role == "admin" || course.mentor_id == user.id;
    if !full_view {
        // Not-found and not-visible are indistinguishable on purpose.
        if !state.repo.is_enrolled(id, user.id).await? {
            return Err(ApiError::NotFound("course not found".into()));
        }

        let rows = state.repo.get_progress(user.id, id).await?;
        let completed = completed_ids(&rows);
        let states = progress::derive_states(&chapters, &completed);
        for (chapter, chapter_state) in chapters.iter_mut().zip(states) {
            if chapter_state == ChapterState::Locked {
                chapter.video_url = None;
                chapter.pdf_url = None;
            }
        }
    }

    Ok(Json(CourseDetail { course, chapters }))
}

/// create_course
///
/// [Mentor Route] Creates a course owned by the caller. Requires an approved
/// mentor account.
#[utoipa::path(
    post,
    path = "/courses",
    request_body = CreateCourseRequest,
    responses(
        (status = 201, description = "Created", body = Course),
        (status = 403, description = "Not an approved mentor")
    )
)]
pub async fn create_course(
    user: AuthUser,
    State(state): State<AppState>,
    Json(payload): Json<CreateCourseRequest>,
) -> Result<(StatusCode, Json<Course>), ApiError> {
    auth::require_approved_mentor(&user)?;
    if payload.title.trim().is_empty() {
        return Err(ApiError::Validation("title is required".into()));
    }

    let course = state.repo.create_course(user.id, payload).await?;
    Ok((StatusCode::CREATED, Json(course)))
}

/// update_course
///
/// [Mentor Route] Partial update of an owned course's title/description.
#[utoipa::path(
    put,
    path = "/courses/{id}",
    params(("id" = Uuid, Path, description = "Course ID")),
    request_body = UpdateCourseRequest,
    responses(
        (status = 200, description = "Updated", body = Course),
        (status = 403, description = "Not the owner"),
        (status = 404, description = "Not found")
    )
)]
pub async fn update_course(
    user: AuthUser,
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Json(payload): Json<UpdateCourseRequest>,
) -> Result<Json<Course>, ApiError> {
    owned_course(&state, &user, id).await?;
    let updated = state
        .repo
        .update_course(id, user.id, payload)
        .await?
        .ok_or_else(|| ApiError::NotFound("course not found".into()))?;
    Ok(Json(updated))
}

/// delete_course
///
/// [Mentor Route] Deletes an owned course. Chapters, enrollments, progress and
/// certificates cascade away with it.
#[utoipa::path(
    delete,
    path = "/courses/{id}",
    params(("id" = Uuid, Path, description = "Course ID")),
    responses(
        (status = 204, description = "Deleted"),
        (status = 403, description = "Not the owner"),
        (status = 404, description = "Not found")
    )
)]
pub async fn delete_course(
    user: AuthUser,
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<StatusCode, ApiError> {
    owned_course(&state, &user, id).await?;
    if state.repo.delete_course(id, user.id).await? {
        Ok(StatusCode::NO_CONTENT)
    } else {
        Err(ApiError::NotFound("course not found".into()))
    }
}

// --- Chapter Handlers ---

/// create_chapter
///
/// [Mentor Route] Appends a chapter to an owned course. The server assigns
/// `sequence_order = max(existing) + 1`; clients cannot choose a position.
#[utoipa::path(
    post,
    path = "/courses/{id}/chapters",
    params(("id" = Uuid, Path, description = "Course ID")),
    request_body = CreateChapterRequest,
    responses(
        (status = 201, description = "Created", body = Chapter),
        (status = 403, description = "Not the owner")
    )
)]
pub async fn create_chapter(
    user: AuthUser,
    State(state): State<AppState>,
    Path(course_id): Path<Uuid>,
    Json(payload): Json<CreateChapterRequest>,
) -> Result<(StatusCode, Json<Chapter>), ApiError> {
    owned_course(&state, &user, course_id).await?;
    if payload.title.trim().is_empty() {
        return Err(ApiError::Validation("title is required".into()));
    }

    let chapter = state.repo.create_chapter(course_id, payload).await?;
    Ok((StatusCode::CREATED, Json(chapter)))
}

/// update_chapter
///
/// [Mentor Route] Edits a chapter's title, description or media URLs. There is
/// no way to change `sequence_order` here: ordering only changes through
/// append and delete.
#[utoipa::path(
    put,
    path = "/courses/{id}/chapters/{chapter_id}",
    params(
        ("id" = Uuid, Path, description = "Course ID"),
        ("chapter_id" = Uuid, Path, description = "Chapter ID")
    ),
    request_body = UpdateChapterRequest,
    responses(
        (status = 200, description = "Updated", body = Chapter),
        (status = 404, description = "Not found")
    )
)]
pub async fn update_chapter(
    user: AuthUser,
    State(state): State<AppState>,
    Path((course_id, chapter_id)): Path<(Uuid, Uuid)>,
    Json(payload): Json<UpdateChapterRequest>,
) -> Result<Json<Chapter>, ApiError> {
    owned_course(&state, &user, course_id).await?;
    let chapter = state
        .repo
        .update_chapter(chapter_id, course_id, payload)
        .await?
        .ok_or_else(|| ApiError::NotFound("chapter not found".into()))?;
    Ok(Json(chapter))
}

/// delete_chapter
///
/// [Mentor Route] Removes a chapter and renumbers the remainder of the course
/// so the ordering stays dense. Every enrolled student's unlock state shifts
/// accordingly on their next read, since unlocking is always derived.
#[utoipa::path(
    delete,
    path = "/courses/{id}/chapters/{chapter_id}",
    params(
        ("id" = Uuid, Path, description = "Course ID"),
        ("chapter_id" = Uuid, Path, description = "Chapter ID")
    ),
    responses(
        (status = 204, description = "Deleted and renumbered"),
        (status = 404, description = "Not found")
    )
)]
pub async fn delete_chapter(
    user: AuthUser,
    State(state): State<AppState>,
    Path((course_id, chapter_id)): Path<(Uuid, Uuid)>,
) -> Result<StatusCode, ApiError> {
    owned_course(&state, &user, course_id).await?;
    let removed = state
        .repo
        .delete_chapter(chapter_id, course_id)
        .await?
        .ok_or_else(|| ApiError::NotFound("chapter not found".into()))?;

    tracing::info!(%course_id, %chapter_id, sequence_order = removed, "chapter removed, course renumbered");
    Ok(StatusCode::NO_CONTENT)
}

// --- Enrollment Handlers ---

/// assign_students
///
/// [Mentor Route] Batch-enrolls students into an owned course. Each id is
/// reported individually: unknown users, non-students and already-enrolled
/// students are skipped with a reason while the rest are enrolled. A skip
/// never aborts the batch.
#[utoipa::path(
    post,
    path = "/courses/{id}/assignments",
    params(("id" = Uuid, Path, description = "Course ID")),
    request_body = AssignStudentsRequest,
    responses(
        (status = 200, description = "Per-student outcomes", body = AssignStudentsResponse),
        (status = 403, description = "Not the owner")
    )
)]
pub async fn assign_students(
    user: AuthUser,
    State(state): State<AppState>,
    Path(course_id): Path<Uuid>,
    Json(payload): Json<AssignStudentsRequest>,
) -> Result<Json<AssignStudentsResponse>, ApiError> {
    owned_course(&state, &user, course_id).await?;
    if payload.student_ids.is_empty() {
        return Err(ApiError::Validation("student_ids must not be empty".into()));
    }

    let results = state
        .repo
        .assign_students(course_id, &payload.student_ids)
        .await?;

    let assigned = results.iter().filter(|r| r.status == "assigned").count();
    Ok(Json(AssignStudentsResponse {
        assigned,
        skipped: results.len() - assigned,
        results,
    }))
}

/// unassign_student
///
/// [Mentor Route] Removes a student from an owned course. The student's
/// progress in the course is purged with the enrollment; certificates they
/// already earned stay on record.
#[utoipa::path(
    delete,
    path = "/courses/{id}/assignments/{student_id}",
    params(
        ("id" = Uuid, Path, description = "Course ID"),
        ("student_id" = Uuid, Path, description = "Student ID")
    ),
    responses(
        (status = 204, description = "Unassigned"),
        (status = 404, description = "No such assignment")
    )
)]
pub async fn unassign_student(
    user: AuthUser,
    State(state): State<AppState>,
    Path((course_id, student_id)): Path<(Uuid, Uuid)>,
) -> Result<StatusCode, ApiError> {
    owned_course(&state, &user, course_id).await?;
    if state.repo.unassign_student(course_id, student_id).await? {
        Ok(StatusCode::NO_CONTENT)
    } else {
        Err(ApiError::NotFound("assignment not found".into()))
    }
}

/// course_students
///
/// [Mentor/Admin Route] The enrollment roster of a course. Owners see their
/// own courses; admins see any.
#[utoipa::path(
    get,
    path = "/courses/{id}/students",
    params(("id" = Uuid, Path, description = "Course ID")),
    responses((status = 200, description = "Roster", body = [EnrolledStudent]))
)]
pub async fn course_students(
    user: AuthUser,
    State(state): State<AppState>,
    Path(course_id): Path<Uuid>,
) -> Result<Json<Vec<EnrolledStudent>>, ApiError> {
    if user.role == "admin" {
        state
            .repo
            .get_course(course_id)
            .await?
            .ok_or_else(|| ApiError::NotFound("course not found".into()))?;
    } else {
        owned_course(&state, &user, course_id).await?;
    }

    Ok(Json(state.repo.list_course_students(course_id).await?))
}

// --- Progress Handlers ---

/// complete_chapter
///
/// [Student Route] The one client-triggered transition of the completion state
/// machine. The chapter must exist, the student must be enrolled in its
/// course, and the chapter must be the frontier: its predecessor completed and
/// itself not yet completed. On success the response carries the updated
/// record plus the recomputed course percentage.
///
/// Two racing requests for the same chapter both pass the gate, but the
/// guarded upsert lets only one through; the loser receives the same 409 as a
/// plain repeat call.
#[utoipa::path(
    post,
    path = "/progress/{chapter_id}/complete",
    params(("chapter_id" = Uuid, Path, description = "Chapter ID")),
    responses(
        (status = 200, description = "Completed", body = CompleteChapterResponse),
        (status = 403, description = "Locked or not enrolled"),
        (status = 404, description = "Chapter not found"),
        (status = 409, description = "Already completed")
    )
)]
pub async fn complete_chapter(
    user: AuthUser,
    State(state): State<AppState>,
    Path(chapter_id): Path<Uuid>,
) -> Result<Json<CompleteChapterResponse>, ApiError> {
    auth::require_student(&user)?;

    let chapter = state
        .repo
        .get_chapter(chapter_id)
        .await?
        .ok_or_else(|| ApiError::NotFound("chapter not found".into()))?;

    if !state.repo.is_enrolled(chapter.course_id, user.id).await? {
        return Err(ApiError::Forbidden("not enrolled in this course".into()));
    }

    let chapters = state.repo.list_chapters(chapter.course_id).await?;
    let rows = state.repo.get_progress(user.id, chapter.course_id).await?;
    let completed = completed_ids(&rows);

    progress::completion_gate(&chapters, &completed, chapter_id).map_err(|denied| match denied {
        GateDenied::Locked => ApiError::Forbidden("complete the previous chapter first".into()),
        GateDenied::AlreadyCompleted => ApiError::Conflict("chapter already completed".into()),
        GateDenied::UnknownChapter => ApiError::NotFound("chapter not found".into()),
    })?;

    let record = state
        .repo
        .complete_chapter(user.id, chapter_id)
        .await?
        // Gate passed but the row flipped underneath us: a concurrent request won.
        .ok_or_else(|| ApiError::Conflict("chapter already completed".into()))?;

    let completion = CompletionSummary::new(chapters.len() as i64, completed.len() as i64 + 1);

    Ok(Json(CompleteChapterResponse {
        message: "chapter completed".into(),
        progress: record,
        completion,
    }))
}

/// my_progress
///
/// [Student Route] Completion summaries across enrolled courses, optionally
/// narrowed with `?course_id=`. Percentages are computed here from the counts,
/// never stored.
#[utoipa::path(
    get,
    path = "/progress/my",
    params(ProgressFilter),
    responses((status = 200, description = "Summaries", body = [CourseProgressSummary]))
)]
pub async fn my_progress(
    user: AuthUser,
    State(state): State<AppState>,
    Query(filter): Query<ProgressFilter>,
) -> Result<Json<Vec<CourseProgressSummary>>, ApiError> {
    auth::require_student(&user)?;

    let rows = state
        .repo
        .progress_aggregates(user.id, filter.course_id)
        .await?;

    let summaries = rows
        .into_iter()
        .map(|row| CourseProgressSummary {
            course_id: row.course_id,
            course_title: row.course_title,
            completion: CompletionSummary::new(row.total_chapters, row.completed_chapters),
        })
        .collect();

    Ok(Json(summaries))
}

/// course_progress
///
/// [Student Route] The detailed per-chapter view of one enrolled course:
/// aggregate numbers plus every chapter's derived `is_unlocked`/`is_completed`
/// flags in sequence order.
#[utoipa::path(
    get,
    path = "/progress/course/{course_id}",
    params(("course_id" = Uuid, Path, description = "Course ID")),
    responses(
        (status = 200, description = "Per-chapter progress", body = CourseProgressDetail),
        (status = 403, description = "Not enrolled"),
        (status = 404, description = "Course not found")
    )
)]
pub async fn course_progress(
    user: AuthUser,
    State(state): State<AppState>,
    Path(course_id): Path<Uuid>,
) -> Result<Json<CourseProgressDetail>, ApiError> {
    let course = enrolled_course(&state, &user, course_id).await?;

    let chapters = state.repo.list_chapters(course_id).await?;
    let rows = state.repo.get_progress(user.id, course_id).await?;
    let completed_at = completed_at_map(&rows);

    let views = progress::chapter_views(&chapters, &completed_at);
    let completion = CompletionSummary::new(chapters.len() as i64, completed_at.len() as i64);

    Ok(Json(CourseProgressDetail {
        course_id,
        course_title: course.title,
        completion,
        chapters: views,
    }))
}

/// reset_progress
///
/// [Student Route] Full-course reset: deletes every completion record the
/// student holds in the course, returning chapter 1 to unlocked and the rest
/// to locked. There is deliberately no single-chapter uncomplete.
#[utoipa::path(
    delete,
    path = "/progress/course/{course_id}/reset",
    params(("course_id" = Uuid, Path, description = "Course ID")),
    responses(
        (status = 200, description = "Reset", body = MessageResponse),
        (status = 403, description = "Not enrolled")
    )
)]
pub async fn reset_progress(
    user: AuthUser,
    State(state): State<AppState>,
    Path(course_id): Path<Uuid>,
) -> Result<Json<MessageResponse>, ApiError> {
    enrolled_course(&state, &user, course_id).await?;

    let removed = state.repo.reset_progress(user.id, course_id).await?;
    tracing::info!(student_id = %user.id, %course_id, removed, "course progress reset");

    Ok(Json(MessageResponse {
        message: "course progress has been reset".into(),
    }))
}

// --- Certificate Handlers ---

/// my_certificates
///
/// [Student Route] Every certificate the student has earned, newest first.
#[utoipa::path(
    get,
    path = "/certificates/my",
    responses((status = 200, description = "Certificates", body = [CertificateView]))
)]
pub async fn my_certificates(
    user: AuthUser,
    State(state): State<AppState>,
) -> Result<Json<Vec<CertificateView>>, ApiError> {
    auth::require_student(&user)?;
    Ok(Json(state.repo.list_certificates(user.id).await?))
}

/// certificate_status
///
/// [Student Route] Eligibility verdict for a course: eligible once every
/// chapter is completed, and a course without chapters can never qualify.
/// Always 200; the verdict travels in the body.
#[utoipa::path(
    get,
    path = "/certificates/{course_id}/status",
    params(("course_id" = Uuid, Path, description = "Course ID")),
    responses(
        (status = 200, description = "Eligibility", body = EligibilityResponse),
        (status = 404, description = "Course not found")
    )
)]
pub async fn certificate_status(
    user: AuthUser,
    State(state): State<AppState>,
    Path(course_id): Path<Uuid>,
) -> Result<Json<EligibilityResponse>, ApiError> {
    auth::require_student(&user)?;
    state
        .repo
        .get_course(course_id)
        .await?
        .ok_or_else(|| ApiError::NotFound("course not found".into()))?;

    Ok(Json(eligibility(&state, user.id, course_id).await?))
}

/// get_certificate
///
/// [Student Route] Issue-or-fetch. The first call on a fully completed course
/// mints the certificate; every later call returns the identical record, even
/// if progress is reset afterwards. An incomplete course is refused.
#[utoipa::path(
    get,
    path = "/certificates/{course_id}",
    params(("course_id" = Uuid, Path, description = "Course ID")),
    responses(
        (status = 200, description = "Certificate", body = Certificate),
        (status = 403, description = "Not eligible"),
        (status = 404, description = "Course not found")
    )
)]
pub async fn get_certificate(
    user: AuthUser,
    State(state): State<AppState>,
    Path(course_id): Path<Uuid>,
) -> Result<Json<Certificate>, ApiError> {
    auth::require_student(&user)?;
    state
        .repo
        .get_course(course_id)
        .await?
        .ok_or_else(|| ApiError::NotFound("course not found".into()))?;

    // Already minted: immutable, hand it back regardless of current progress.
    if let Some(existing) = state.repo.find_certificate(user.id, course_id).await? {
        return Ok(Json(existing));
    }

    let verdict = eligibility(&state, user.id, course_id).await?;
    if !verdict.eligible {
        return Err(ApiError::Forbidden(verdict.message));
    }

    let cert = state.repo.issue_certificate(user.id, course_id).await?;
    tracing::info!(student_id = %user.id, %course_id, certificate_id = %cert.id, "certificate issued");
    Ok(Json(cert))
}

/// Computes the eligibility verdict from the aggregate counts. Enrollment is
/// part of the verdict rather than an error: a non-enrolled student simply is
/// not eligible.
async fn eligibility(
    state: &AppState,
    student_id: Uuid,
    course_id: Uuid,
) -> Result<EligibilityResponse, ApiError> {
    if !state.repo.is_enrolled(course_id, student_id).await? {
        return Ok(EligibilityResponse {
            eligible: false,
            percentage: 0.0,
            message: "not enrolled in this course".into(),
        });
    }

    let rows = state
        .repo
        .progress_aggregates(student_id, Some(course_id))
        .await?;
    let summary = rows
        .first()
        .map(|row| CompletionSummary::new(row.total_chapters, row.completed_chapters))
        .unwrap_or_default();

    let response = if summary.total_chapters == 0 {
        EligibilityResponse {
            eligible: false,
            percentage: 0.0,
            message: "course has no chapters yet".into(),
        }
    } else if summary.is_complete {
        EligibilityResponse {
            eligible: true,
            percentage: summary.percentage,
            message: "eligible for a certificate".into(),
        }
    } else {
        EligibilityResponse {
            eligible: false,
            percentage: summary.percentage,
            message: "course not fully completed".into(),
        }
    };
    Ok(response)
}

// --- Upload Handlers ---

/// get_presigned_url
///
/// [Mentor Route] Generates a temporary, secure URL for direct client-to-cloud upload
/// of chapter media.
///
/// *Security*: The URL is short-lived, constrained to the declared media type,
/// and the object key is a server-generated UUID under the `chapters/` prefix,
/// so heavy media uploads bypass the application server without letting the
/// client choose where bytes land.
#[utoipa::path(
    post,
    path = "/uploads/presigned",
    request_body = PresignedUrlRequest,
    responses(
        (status = 200, description = "Signed URL", body = PresignedUrlResponse),
        (status = 400, description = "Unsupported media type")
    )
)]
pub async fn get_presigned_url(
    user: AuthUser,
    State(state): State<AppState>,
    Json(payload): Json<PresignedUrlRequest>,
) -> Result<Json<PresignedUrlResponse>, ApiError> {
    auth::require_approved_mentor(&user)?;

    if payload.filename.trim().is_empty() {
        return Err(ApiError::Validation("filename is required".into()));
    }
    if !storage::allowed_media_type(&payload.file_type) {
        return Err(ApiError::Validation(
            "file_type must be a video, image or PDF media type".into(),
        ));
    }

    let object_key = storage::media_object_key(&payload.filename);

    let upload_url = state
        .storage
        .get_presigned_upload_url(&object_key, &payload.file_type)
        .await
        .map_err(ApiError::Storage)?;

    Ok(Json(PresignedUrlResponse {
        upload_url,
        resource_key: object_key,
    }))
}

// --- Admin Handlers ---

/// admin_stats
///
/// [Admin Route] Core platform counters for the dashboard.
#[utoipa::path(
    get,
    path = "/admin/stats",
    responses((status = 200, description = "Stats", body = AdminStats))
)]
pub async fn admin_stats(
    user: AuthUser,
    State(state): State<AppState>,
) -> Result<Json<AdminStats>, ApiError> {
    auth::require_admin(&user)?;
    Ok(Json(state.repo.get_stats().await?))
}

/// admin_users
///
/// [Admin Route] Every user on the platform, newest first.
#[utoipa::path(
    get,
    path = "/admin/users",
    responses((status = 200, description = "Users", body = [User]))
)]
pub async fn admin_users(
    user: AuthUser,
    State(state): State<AppState>,
) -> Result<Json<Vec<User>>, ApiError> {
    auth::require_admin(&user)?;
    Ok(Json(state.repo.list_users().await?))
}

/// pending_mentors
///
/// [Admin Route] The approval queue: mentors who registered and are waiting.
#[utoipa::path(
    get,
    path = "/admin/mentors/pending",
    responses((status = 200, description = "Pending mentors", body = [User]))
)]
pub async fn pending_mentors(
    user: AuthUser,
    State(state): State<AppState>,
) -> Result<Json<Vec<User>>, ApiError> {
    auth::require_admin(&user)?;
    Ok(Json(state.repo.list_pending_mentors().await?))
}

/// approve_mentor
///
/// [Admin Route] Grants authoring rights to a mentor account.
#[utoipa::path(
    put,
    path = "/admin/users/{id}/approve-mentor",
    params(("id" = Uuid, Path, description = "User ID")),
    responses(
        (status = 200, description = "Approved", body = User),
        (status = 404, description = "No such mentor")
    )
)]
pub async fn approve_mentor(
    user: AuthUser,
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Json<User>, ApiError> {
    auth::require_admin(&user)?;
    let updated = state
        .repo
        .set_mentor_approval(id, true)
        .await?
        .ok_or_else(|| ApiError::NotFound("mentor not found".into()))?;

    tracing::info!(mentor_id = %updated.id, "mentor approved");
    Ok(Json(updated))
}

/// reject_mentor
///
/// [Admin Route] Declines a pending mentor, or revokes approval from an
/// already-approved one. Their existing courses stay in place; they just lose
/// the ability to author until approved again.
#[utoipa::path(
    put,
    path = "/admin/users/{id}/reject-mentor",
    params(("id" = Uuid, Path, description = "User ID")),
    responses(
        (status = 200, description = "Rejected", body = User),
        (status = 404, description = "No such mentor")
    )
)]
pub async fn reject_mentor(
    user: AuthUser,
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Json<User>, ApiError> {
    auth::require_admin(&user)?;
    let updated = state
        .repo
        .set_mentor_approval(id, false)
        .await?
        .ok_or_else(|| ApiError::NotFound("mentor not found".into()))?;

    tracing::info!(mentor_id = %updated.id, "mentor approval revoked");
    Ok(Json(updated))
}
