use crate::models::{
    AdminStats, AssignmentOutcome, Certificate, CertificateView, Chapter, Course, CourseSummary,
    CreateChapterRequest, CreateCourseRequest, EnrolledStudent, NewUser, Progress,
    ProgressAggregateRow, UpdateChapterRequest, UpdateCourseRequest, User, UserCredentials,
};
use async_trait::async_trait;
use sqlx::{PgPool, query_builder::QueryBuilder};
use std::sync::Arc;
use thiserror::Error;
use uuid::Uuid;

/// RepositoryError
///
/// What the persistence layer can report upward. Unique-constraint violations
/// are folded into `Conflict` here so handlers can turn them into 409s without
/// inspecting driver internals; everything else stays wrapped as `Database`
/// and surfaces as an internal error.
#[derive(Debug, Error)]
pub enum RepositoryError {
    /// A row with the same unique key already exists.
    #[error("duplicate record")]
    Conflict,

    #[error(transparent)]
    Database(sqlx::Error),
}

impl From<sqlx::Error> for RepositoryError {
    fn from(e: sqlx::Error) -> Self {
        if let Some(db) = e.as_database_error() {
            if db.is_unique_violation() {
                return RepositoryError::Conflict;
            }
        }
        RepositoryError::Database(e)
    }
}

/// Repository Trait
///
/// Defines the abstract contract for all persistence operations. This is the core
/// of the Repository Abstraction pattern, allowing the handlers to interact with
/// the data layer without knowing the specific implementation (Postgres, Mock, etc.).
///
/// **Send + Sync + async_trait** are required to make the trait object (`Arc<dyn Repository>`)
/// safely shareable and usable across Axum's asynchronous task boundaries.
///
/// Every method returns `Result<_, RepositoryError>`; `Option` inside the `Ok`
/// means "the row you addressed is not there", which handlers map to 404.
#[async_trait]
pub trait Repository: Send + Sync {
    // --- Users / Auth ---
    async fn create_user(&self, user: NewUser) -> Result<User, RepositoryError>;
    async fn get_user(&self, id: Uuid) -> Result<Option<User>, RepositoryError>;
    // Login lookup; the only query that surfaces the password hash.
    async fn find_credentials(&self, email: &str)
    -> Result<Option<UserCredentials>, RepositoryError>;
    async fn list_users(&self) -> Result<Vec<User>, RepositoryError>;
    async fn list_pending_mentors(&self) -> Result<Vec<User>, RepositoryError>;
    // Approve or revoke a mentor. None if the id is not a mentor.
    async fn set_mentor_approval(
        &self,
        user_id: Uuid,
        approved: bool,
    ) -> Result<Option<User>, RepositoryError>;

    // --- Course Catalog ---
    async fn create_course(
        &self,
        mentor_id: Uuid,
        req: CreateCourseRequest,
    ) -> Result<Course, RepositoryError>;
    async fn get_course(&self, id: Uuid) -> Result<Option<Course>, RepositoryError>;
    // Public catalog: every course with mentor name and chapter count.
    async fn list_courses(&self) -> Result<Vec<CourseSummary>, RepositoryError>;
    async fn list_courses_by_mentor(&self, mentor_id: Uuid)
    -> Result<Vec<Course>, RepositoryError>;
    // Owner-scoped partial update (COALESCE semantics).
    async fn update_course(
        &self,
        id: Uuid,
        mentor_id: Uuid,
        req: UpdateCourseRequest,
    ) -> Result<Option<Course>, RepositoryError>;
    // Owner-scoped delete; chapters, progress, assignments and certificates cascade.
    async fn delete_course(&self, id: Uuid, mentor_id: Uuid) -> Result<bool, RepositoryError>;

    // --- Chapters ---
    // Appends at the end of the course: sequence_order = max(existing) + 1,
    // computed inside the insert transaction.
    async fn create_chapter(
        &self,
        course_id: Uuid,
        req: CreateChapterRequest,
    ) -> Result<Chapter, RepositoryError>;
    async fn get_chapter(&self, id: Uuid) -> Result<Option<Chapter>, RepositoryError>;
    // Chapters of a course in sequence_order, which downstream unlock
    // derivation depends on.
    async fn list_chapters(&self, course_id: Uuid) -> Result<Vec<Chapter>, RepositoryError>;
    async fn update_chapter(
        &self,
        id: Uuid,
        course_id: Uuid,
        req: UpdateChapterRequest,
    ) -> Result<Option<Chapter>, RepositoryError>;
    // Deletes and renumbers the remaining chapters in one transaction.
    // Returns the removed chapter's sequence_order.
    async fn delete_chapter(&self, id: Uuid, course_id: Uuid)
    -> Result<Option<i32>, RepositoryError>;

    // --- Enrollment ---
    // Batch assignment with per-item outcomes; valid items commit together,
    // invalid ones are skipped with a reason.
    async fn assign_students(
        &self,
        course_id: Uuid,
        student_ids: &[Uuid],
    ) -> Result<Vec<AssignmentOutcome>, RepositoryError>;
    // Removes the assignment and purges the student's progress in that course.
    async fn unassign_student(
        &self,
        course_id: Uuid,
        student_id: Uuid,
    ) -> Result<bool, RepositoryError>;
    async fn is_enrolled(&self, course_id: Uuid, student_id: Uuid)
    -> Result<bool, RepositoryError>;
    async fn list_course_students(
        &self,
        course_id: Uuid,
    ) -> Result<Vec<EnrolledStudent>, RepositoryError>;
    async fn list_enrolled_courses(
        &self,
        student_id: Uuid,
    ) -> Result<Vec<CourseSummary>, RepositoryError>;

    // --- Progress ---
    // All progress rows of one student within one course.
    async fn get_progress(
        &self,
        student_id: Uuid,
        course_id: Uuid,
    ) -> Result<Vec<Progress>, RepositoryError>;
    // Upsert guarded against repeat completion: None means another request
    // already completed this chapter.
    async fn complete_chapter(
        &self,
        student_id: Uuid,
        chapter_id: Uuid,
    ) -> Result<Option<Progress>, RepositoryError>;
    // Deletes every progress row for (student, course). Returns rows removed.
    async fn reset_progress(&self, student_id: Uuid, course_id: Uuid)
    -> Result<u64, RepositoryError>;
    // Per-course chapter/completion counts for one student, optionally
    // narrowed to a single course.
    async fn progress_aggregates(
        &self,
        student_id: Uuid,
        course_id: Option<Uuid>,
    ) -> Result<Vec<ProgressAggregateRow>, RepositoryError>;

    // --- Certificates ---
    async fn find_certificate(
        &self,
        student_id: Uuid,
        course_id: Uuid,
    ) -> Result<Option<Certificate>, RepositoryError>;
    // Idempotent issue: INSERT .. ON CONFLICT DO NOTHING, then fetch.
    async fn issue_certificate(
        &self,
        student_id: Uuid,
        course_id: Uuid,
    ) -> Result<Certificate, RepositoryError>;
    async fn list_certificates(
        &self,
        student_id: Uuid,
    ) -> Result<Vec<CertificateView>, RepositoryError>;

    // --- Admin ---
    async fn get_stats(&self) -> Result<AdminStats, RepositoryError>;
}

/// RepositoryState
///
/// The concrete type used to share the persistence layer access across the application state.
pub type RepositoryState = Arc<dyn Repository>;

/// PostgresRepository
///
/// The concrete implementation of the `Repository` trait, backed by the PostgreSQL database.
pub struct PostgresRepository {
    pool: PgPool,
}

impl PostgresRepository {
    /// Creates a new repository instance using the initialized connection pool.
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

const USER_COLUMNS: &str = "id, email, full_name, role, is_approved, created_at";
const COURSE_COLUMNS: &str = "id, mentor_id, title, description, created_at, updated_at";
const CHAPTER_COLUMNS: &str =
    "id, course_id, title, description, video_url, pdf_url, sequence_order, created_at, updated_at";
const PROGRESS_COLUMNS: &str = "id, student_id, chapter_id, completed, completed_at";

#[async_trait]
impl Repository for PostgresRepository {
    // --- USERS / AUTH ---

    /// create_user
    ///
    /// Inserts the registration record. The unique index on `email` makes a
    /// duplicate registration come back as `RepositoryError::Conflict`.
    async fn create_user(&self, user: NewUser) -> Result<User, RepositoryError> {
        let query = format!(
            "INSERT INTO users (id, email, password_hash, full_name, role, is_approved) \
             VALUES ($1, $2, $3, $4, $5, $6) RETURNING {USER_COLUMNS}"
        );
        let created = sqlx::query_as::<_, User>(&query)
            .bind(Uuid::new_v4())
            .bind(user.email)
            .bind(user.password_hash)
            .bind(user.full_name)
            .bind(user.role)
            .bind(user.is_approved)
            .fetch_one(&self.pool)
            .await?;
        Ok(created)
    }

    /// get_user
    ///
    /// Retrieves the user record (ID, role, approval) needed for authentication and authorization.
    async fn get_user(&self, id: Uuid) -> Result<Option<User>, RepositoryError> {
        let query = format!("SELECT {USER_COLUMNS} FROM users WHERE id = $1");
        let user = sqlx::query_as::<_, User>(&query)
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;
        Ok(user)
    }

    /// find_credentials
    ///
    /// Login lookup by email, including the stored password hash. The hash never
    /// travels past the login handler.
    async fn find_credentials(
        &self,
        email: &str,
    ) -> Result<Option<UserCredentials>, RepositoryError> {
        let query = format!("SELECT {USER_COLUMNS}, password_hash FROM users WHERE email = $1");
        let creds = sqlx::query_as::<_, UserCredentials>(&query)
            .bind(email)
            .fetch_optional(&self.pool)
            .await?;
        Ok(creds)
    }

    async fn list_users(&self) -> Result<Vec<User>, RepositoryError> {
        let query = format!("SELECT {USER_COLUMNS} FROM users ORDER BY created_at DESC");
        let users = sqlx::query_as::<_, User>(&query)
            .fetch_all(&self.pool)
            .await?;
        Ok(users)
    }

    /// list_pending_mentors
    ///
    /// The admin approval queue: mentors who registered but are not yet approved.
    async fn list_pending_mentors(&self) -> Result<Vec<User>, RepositoryError> {
        let query = format!(
            "SELECT {USER_COLUMNS} FROM users \
             WHERE role = 'mentor' AND is_approved = false ORDER BY created_at ASC"
        );
        let users = sqlx::query_as::<_, User>(&query)
            .fetch_all(&self.pool)
            .await?;
        Ok(users)
    }

    /// set_mentor_approval
    ///
    /// Flips the approval flag. Scoped to `role = 'mentor'` so the endpoint can
    /// never touch students or admins; addressing anyone else yields None.
    async fn set_mentor_approval(
        &self,
        user_id: Uuid,
        approved: bool,
    ) -> Result<Option<User>, RepositoryError> {
        let query = format!(
            "UPDATE users SET is_approved = $2 \
             WHERE id = $1 AND role = 'mentor' RETURNING {USER_COLUMNS}"
        );
        let user = sqlx::query_as::<_, User>(&query)
            .bind(user_id)
            .bind(approved)
            .fetch_optional(&self.pool)
            .await?;
        Ok(user)
    }

    // --- COURSE CATALOG ---

    async fn create_course(
        &self,
        mentor_id: Uuid,
        req: CreateCourseRequest,
    ) -> Result<Course, RepositoryError> {
        let query = format!(
            "INSERT INTO courses (id, mentor_id, title, description) \
             VALUES ($1, $2, $3, $4) RETURNING {COURSE_COLUMNS}"
        );
        let course = sqlx::query_as::<_, Course>(&query)
            .bind(Uuid::new_v4())
            .bind(mentor_id)
            .bind(req.title)
            .bind(req.description)
            .fetch_one(&self.pool)
            .await?;
        Ok(course)
    }

    async fn get_course(&self, id: Uuid) -> Result<Option<Course>, RepositoryError> {
        let query = format!("SELECT {COURSE_COLUMNS} FROM courses WHERE id = $1");
        let course = sqlx::query_as::<_, Course>(&query)
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;
        Ok(course)
    }

    /// list_courses
    ///
    /// The public catalog projection: course, mentor name, chapter count.
    async fn list_courses(&self) -> Result<Vec<CourseSummary>, RepositoryError> {
        let summaries = sqlx::query_as::<_, CourseSummary>(
            r#"
            SELECT c.id, c.title, c.description,
                   u.full_name AS mentor_name,
                   COUNT(ch.id) AS total_chapters,
                   c.created_at
            FROM courses c
            JOIN users u ON u.id = c.mentor_id
            LEFT JOIN chapters ch ON ch.course_id = c.id
            GROUP BY c.id, c.title, c.description, u.full_name, c.created_at
            ORDER BY c.created_at DESC
            "#,
        )
        .fetch_all(&self.pool)
        .await?;
        Ok(summaries)
    }

    /// list_courses_by_mentor
    ///
    /// Everything the mentor owns, newest first.
    async fn list_courses_by_mentor(
        &self,
        mentor_id: Uuid,
    ) -> Result<Vec<Course>, RepositoryError> {
        let query = format!(
            "SELECT {COURSE_COLUMNS} FROM courses WHERE mentor_id = $1 ORDER BY created_at DESC"
        );
        let courses = sqlx::query_as::<_, Course>(&query)
            .bind(mentor_id)
            .fetch_all(&self.pool)
            .await?;
        Ok(courses)
    }

    /// update_course
    ///
    /// Updates a course only if the provided `mentor_id` matches the owner.
    /// Uses the PostgreSQL `COALESCE` function to handle `Option<T>` fields,
    /// only updating a column if the corresponding field in `req` is `Some`.
    async fn update_course(
        &self,
        id: Uuid,
        mentor_id: Uuid,
        req: UpdateCourseRequest,
    ) -> Result<Option<Course>, RepositoryError> {
        let query = format!(
            "UPDATE courses \
             SET title = COALESCE($3, title), \
                 description = COALESCE($4, description), \
                 updated_at = NOW() \
             WHERE id = $1 AND mentor_id = $2 RETURNING {COURSE_COLUMNS}"
        );
        let course = sqlx::query_as::<_, Course>(&query)
            .bind(id)
            .bind(mentor_id)
            .bind(req.title)
            .bind(req.description)
            .fetch_optional(&self.pool)
            .await?;
        Ok(course)
    }

    /// delete_course
    ///
    /// Owner-scoped delete. Chapters, progress rows, assignments and
    /// certificates all go with it via the FK cascades.
    async fn delete_course(&self, id: Uuid, mentor_id: Uuid) -> Result<bool, RepositoryError> {
        let result = sqlx::query("DELETE FROM courses WHERE id = $1 AND mentor_id = $2")
            .bind(id)
            .bind(mentor_id)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }

    // --- CHAPTERS ---

    /// create_chapter
    ///
    /// Appends the chapter at the end of the course. The next sequence_order is
    /// read and the row inserted inside one transaction; if two appends race,
    /// the deferred uniqueness check on (course_id, sequence_order) fails one of
    /// them at commit, which surfaces as a Conflict for the caller to retry.
    async fn create_chapter(
        &self,
        course_id: Uuid,
        req: CreateChapterRequest,
    ) -> Result<Chapter, RepositoryError> {
        let mut tx = self.pool.begin().await?;

        let next_order = sqlx::query_scalar::<_, i32>(
            "SELECT COALESCE(MAX(sequence_order), 0) + 1 FROM chapters WHERE course_id = $1",
        )
        .bind(course_id)
        .fetch_one(&mut *tx)
        .await?;

        let query = format!(
            "INSERT INTO chapters (id, course_id, title, description, video_url, pdf_url, sequence_order) \
             VALUES ($1, $2, $3, $4, $5, $6, $7) RETURNING {CHAPTER_COLUMNS}"
        );
        let chapter = sqlx::query_as::<_, Chapter>(&query)
            .bind(Uuid::new_v4())
            .bind(course_id)
            .bind(req.title)
            .bind(req.description)
            .bind(req.video_url)
            .bind(req.pdf_url)
            .bind(next_order)
            .fetch_one(&mut *tx)
            .await?;

        tx.commit().await?;
        Ok(chapter)
    }

    async fn get_chapter(&self, id: Uuid) -> Result<Option<Chapter>, RepositoryError> {
        let query = format!("SELECT {CHAPTER_COLUMNS} FROM chapters WHERE id = $1");
        let chapter = sqlx::query_as::<_, Chapter>(&query)
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;
        Ok(chapter)
    }

    /// list_chapters
    ///
    /// Chapters of a course in ascending sequence_order. The unlock derivation
    /// relies on this ordering.
    async fn list_chapters(&self, course_id: Uuid) -> Result<Vec<Chapter>, RepositoryError> {
        let query = format!(
            "SELECT {CHAPTER_COLUMNS} FROM chapters \
             WHERE course_id = $1 ORDER BY sequence_order ASC"
        );
        let chapters = sqlx::query_as::<_, Chapter>(&query)
            .bind(course_id)
            .fetch_all(&self.pool)
            .await?;
        Ok(chapters)
    }

    /// update_chapter
    ///
    /// Partial update of title/description/media URLs. sequence_order is
    /// deliberately not reachable from here; only deletion renumbers.
    async fn update_chapter(
        &self,
        id: Uuid,
        course_id: Uuid,
        req: UpdateChapterRequest,
    ) -> Result<Option<Chapter>, RepositoryError> {
        let query = format!(
            "UPDATE chapters \
             SET title = COALESCE($3, title), \
                 description = COALESCE($4, description), \
                 video_url = COALESCE($5, video_url), \
                 pdf_url = COALESCE($6, pdf_url), \
                 updated_at = NOW() \
             WHERE id = $1 AND course_id = $2 RETURNING {CHAPTER_COLUMNS}"
        );
        let chapter = sqlx::query_as::<_, Chapter>(&query)
            .bind(id)
            .bind(course_id)
            .bind(req.title)
            .bind(req.description)
            .bind(req.video_url)
            .bind(req.pdf_url)
            .fetch_optional(&self.pool)
            .await?;
        Ok(chapter)
    }

    /// delete_chapter
    ///
    /// Removes the chapter and shifts every later chapter in the course down by
    /// one, restoring the dense 1..N ordering. Both statements run in one
    /// transaction, and the uniqueness constraint on (course_id, sequence_order)
    /// is deferred to commit, so no reader ever observes a gap or a duplicate.
    /// Progress rows referencing the chapter die via FK cascade.
    async fn delete_chapter(
        &self,
        id: Uuid,
        course_id: Uuid,
    ) -> Result<Option<i32>, RepositoryError> {
        let mut tx = self.pool.begin().await?;

        let removed_order = sqlx::query_scalar::<_, i32>(
            "DELETE FROM chapters WHERE id = $1 AND course_id = $2 RETURNING sequence_order",
        )
        .bind(id)
        .bind(course_id)
        .fetch_optional(&mut *tx)
        .await?;

        let Some(order) = removed_order else {
            tx.rollback().await?;
            return Ok(None);
        };

        sqlx::query(
            "UPDATE chapters SET sequence_order = sequence_order - 1 \
             WHERE course_id = $1 AND sequence_order > $2",
        )
        .bind(course_id)
        .bind(order)
        .execute(&mut *tx)
        .await?;

        tx.commit().await?;
        Ok(Some(order))
    }

    // --- ENROLLMENT ---

    /// assign_students
    ///
    /// Batch enrollment in a single transaction. Each id is checked for
    /// existence and the student role; already-assigned pairs are skipped via
    /// `ON CONFLICT DO NOTHING`. Skips never abort the batch: every outcome is
    /// reported per item and the valid ones commit together.
    async fn assign_students(
        &self,
        course_id: Uuid,
        student_ids: &[Uuid],
    ) -> Result<Vec<AssignmentOutcome>, RepositoryError> {
        let mut tx = self.pool.begin().await?;
        let mut outcomes = Vec::with_capacity(student_ids.len());

        for &student_id in student_ids {
            let role = sqlx::query_scalar::<_, String>("SELECT role FROM users WHERE id = $1")
                .bind(student_id)
                .fetch_optional(&mut *tx)
                .await?;

            let outcome = match role.as_deref() {
                None => AssignmentOutcome {
                    student_id,
                    status: "skipped".into(),
                    reason: Some("user not found".into()),
                },
                Some(role) if role != "student" => AssignmentOutcome {
                    student_id,
                    status: "skipped".into(),
                    reason: Some("user is not a student".into()),
                },
                Some(_) => {
                    let inserted = sqlx::query(
                        "INSERT INTO course_assignments (id, course_id, student_id) \
                         VALUES ($1, $2, $3) \
                         ON CONFLICT (course_id, student_id) DO NOTHING",
                    )
                    .bind(Uuid::new_v4())
                    .bind(course_id)
                    .bind(student_id)
                    .execute(&mut *tx)
                    .await?
                    .rows_affected();

                    if inserted > 0 {
                        AssignmentOutcome {
                            student_id,
                            status: "assigned".into(),
                            reason: None,
                        }
                    } else {
                        AssignmentOutcome {
                            student_id,
                            status: "skipped".into(),
                            reason: Some("already assigned".into()),
                        }
                    }
                }
            };
            outcomes.push(outcome);
        }

        tx.commit().await?;
        Ok(outcomes)
    }

    /// unassign_student
    ///
    /// Removes the enrollment and, in the same transaction, the student's
    /// progress rows in that course. Issued certificates stay: they record a
    /// completion that did happen.
    async fn unassign_student(
        &self,
        course_id: Uuid,
        student_id: Uuid,
    ) -> Result<bool, RepositoryError> {
        let mut tx = self.pool.begin().await?;

        let removed = sqlx::query(
            "DELETE FROM course_assignments WHERE course_id = $1 AND student_id = $2",
        )
        .bind(course_id)
        .bind(student_id)
        .execute(&mut *tx)
        .await?
        .rows_affected();

        if removed == 0 {
            tx.rollback().await?;
            return Ok(false);
        }

        sqlx::query(
            "DELETE FROM progress WHERE student_id = $2 \
             AND chapter_id IN (SELECT id FROM chapters WHERE course_id = $1)",
        )
        .bind(course_id)
        .bind(student_id)
        .execute(&mut *tx)
        .await?;

        tx.commit().await?;
        Ok(true)
    }

    async fn is_enrolled(
        &self,
        course_id: Uuid,
        student_id: Uuid,
    ) -> Result<bool, RepositoryError> {
        let enrolled = sqlx::query_scalar::<_, bool>(
            "SELECT EXISTS(SELECT 1 FROM course_assignments \
             WHERE course_id = $1 AND student_id = $2)",
        )
        .bind(course_id)
        .bind(student_id)
        .fetch_one(&self.pool)
        .await?;
        Ok(enrolled)
    }

    /// list_course_students
    ///
    /// The roster a mentor sees: enrolled students in assignment order.
    async fn list_course_students(
        &self,
        course_id: Uuid,
    ) -> Result<Vec<EnrolledStudent>, RepositoryError> {
        let students = sqlx::query_as::<_, EnrolledStudent>(
            r#"
            SELECT u.id, u.email, u.full_name, a.assigned_at
            FROM course_assignments a
            JOIN users u ON u.id = a.student_id
            WHERE a.course_id = $1
            ORDER BY a.assigned_at ASC
            "#,
        )
        .bind(course_id)
        .fetch_all(&self.pool)
        .await?;
        Ok(students)
    }

    /// list_enrolled_courses
    ///
    /// The student's "my courses" view, newest assignment first.
    async fn list_enrolled_courses(
        &self,
        student_id: Uuid,
    ) -> Result<Vec<CourseSummary>, RepositoryError> {
        let summaries = sqlx::query_as::<_, CourseSummary>(
            r#"
            SELECT c.id, c.title, c.description,
                   u.full_name AS mentor_name,
                   (SELECT COUNT(*) FROM chapters ch WHERE ch.course_id = c.id) AS total_chapters,
                   c.created_at
            FROM course_assignments a
            JOIN courses c ON c.id = a.course_id
            JOIN users u ON u.id = c.mentor_id
            WHERE a.student_id = $1
            ORDER BY a.assigned_at DESC
            "#,
        )
        .bind(student_id)
        .fetch_all(&self.pool)
        .await?;
        Ok(summaries)
    }

    // --- PROGRESS ---

    async fn get_progress(
        &self,
        student_id: Uuid,
        course_id: Uuid,
    ) -> Result<Vec<Progress>, RepositoryError> {
        let rows = sqlx::query_as::<_, Progress>(
            r#"
            SELECT p.id, p.student_id, p.chapter_id, p.completed, p.completed_at
            FROM progress p
            JOIN chapters ch ON ch.id = p.chapter_id
            WHERE p.student_id = $1 AND ch.course_id = $2
            "#,
        )
        .bind(student_id)
        .bind(course_id)
        .fetch_all(&self.pool)
        .await?;
        Ok(rows)
    }

    /// complete_chapter
    ///
    /// The single mutating write of the completion state machine. The upsert
    /// only fires when the existing row is still incomplete, so two racing
    /// completions resolve to one winner: the loser's statement matches no row
    /// and returns None, never a duplicate.
    async fn complete_chapter(
        &self,
        student_id: Uuid,
        chapter_id: Uuid,
    ) -> Result<Option<Progress>, RepositoryError> {
        let query = format!(
            "INSERT INTO progress (id, student_id, chapter_id, completed, completed_at) \
             VALUES ($1, $2, $3, true, NOW()) \
             ON CONFLICT (student_id, chapter_id) DO UPDATE \
                 SET completed = true, completed_at = NOW() \
                 WHERE progress.completed = false \
             RETURNING {PROGRESS_COLUMNS}"
        );
        let progress = sqlx::query_as::<_, Progress>(&query)
            .bind(Uuid::new_v4())
            .bind(student_id)
            .bind(chapter_id)
            .fetch_optional(&self.pool)
            .await?;
        Ok(progress)
    }

    /// reset_progress
    ///
    /// Full-course reset: deletes every progress row of the student in that
    /// course, returning all chapters to their derived initial state.
    async fn reset_progress(
        &self,
        student_id: Uuid,
        course_id: Uuid,
    ) -> Result<u64, RepositoryError> {
        let result = sqlx::query(
            "DELETE FROM progress WHERE student_id = $1 \
             AND chapter_id IN (SELECT id FROM chapters WHERE course_id = $2)",
        )
        .bind(student_id)
        .bind(course_id)
        .execute(&self.pool)
        .await?;
        Ok(result.rows_affected())
    }

    /// progress_aggregates
    ///
    /// Chapter and completion counts per enrolled course, optionally narrowed
    /// to one course. Built with QueryBuilder for the optional filter.
    async fn progress_aggregates(
        &self,
        student_id: Uuid,
        course_id: Option<Uuid>,
    ) -> Result<Vec<ProgressAggregateRow>, RepositoryError> {
        let mut builder: QueryBuilder<sqlx::Postgres> = QueryBuilder::new(
            r#"
            SELECT c.id AS course_id, c.title AS course_title,
                   COUNT(ch.id) AS total_chapters,
                   COUNT(p.id) AS completed_chapters
            FROM course_assignments ca
            JOIN courses c ON c.id = ca.course_id
            LEFT JOIN chapters ch ON ch.course_id = c.id
            LEFT JOIN progress p
                   ON p.chapter_id = ch.id
                  AND p.student_id = ca.student_id
                  AND p.completed = true
            WHERE ca.student_id = "#,
        );
        builder.push_bind(student_id);

        if let Some(course) = course_id {
            builder.push(" AND c.id = ");
            builder.push_bind(course);
        }

        builder.push(" GROUP BY c.id, c.title, ca.assigned_at ORDER BY ca.assigned_at DESC");

        let rows = builder
            .build_query_as::<ProgressAggregateRow>()
            .fetch_all(&self.pool)
            .await?;
        Ok(rows)
    }

    // --- CERTIFICATES ---

    async fn find_certificate(
        &self,
        student_id: Uuid,
        course_id: Uuid,
    ) -> Result<Option<Certificate>, RepositoryError> {
        let cert = sqlx::query_as::<_, Certificate>(
            "SELECT id, student_id, course_id, issued_at FROM certificates \
             WHERE student_id = $1 AND course_id = $2",
        )
        .bind(student_id)
        .bind(course_id)
        .fetch_optional(&self.pool)
        .await?;
        Ok(cert)
    }

    /// issue_certificate
    ///
    /// Idempotent mint: `ON CONFLICT DO NOTHING` then fetch, so the first and
    /// every later call return the identical record.
    async fn issue_certificate(
        &self,
        student_id: Uuid,
        course_id: Uuid,
    ) -> Result<Certificate, RepositoryError> {
        sqlx::query(
            "INSERT INTO certificates (id, student_id, course_id) VALUES ($1, $2, $3) \
             ON CONFLICT (student_id, course_id) DO NOTHING",
        )
        .bind(Uuid::new_v4())
        .bind(student_id)
        .bind(course_id)
        .execute(&self.pool)
        .await?;

        let cert = sqlx::query_as::<_, Certificate>(
            "SELECT id, student_id, course_id, issued_at FROM certificates \
             WHERE student_id = $1 AND course_id = $2",
        )
        .bind(student_id)
        .bind(course_id)
        .fetch_one(&self.pool)
        .await?;
        Ok(cert)
    }

    async fn list_certificates(
        &self,
        student_id: Uuid,
    ) -> Result<Vec<CertificateView>, RepositoryError> {
        let certs = sqlx::query_as::<_, CertificateView>(
            r#"
            SELECT ct.id, ct.course_id, c.title AS course_title, ct.issued_at
            FROM certificates ct
            JOIN courses c ON c.id = ct.course_id
            WHERE ct.student_id = $1
            ORDER BY ct.issued_at DESC
            "#,
        )
        .bind(student_id)
        .fetch_all(&self.pool)
        .await?;
        Ok(certs)
    }

    // --- ADMIN ---

    /// get_stats
    ///
    /// Compiles all counters for the administrative dashboard in a single call.
    async fn get_stats(&self) -> Result<AdminStats, RepositoryError> {
        let total_students =
            sqlx::query_scalar::<_, i64>("SELECT COUNT(*) FROM users WHERE role = 'student'")
                .fetch_one(&self.pool)
                .await?;
        let total_mentors =
            sqlx::query_scalar::<_, i64>("SELECT COUNT(*) FROM users WHERE role = 'mentor'")
                .fetch_one(&self.pool)
                .await?;
        let pending_mentors = sqlx::query_scalar::<_, i64>(
            "SELECT COUNT(*) FROM users WHERE role = 'mentor' AND is_approved = false",
        )
        .fetch_one(&self.pool)
        .await?;
        let total_courses = sqlx::query_scalar::<_, i64>("SELECT COUNT(*) FROM courses")
            .fetch_one(&self.pool)
            .await?;
        let total_chapters = sqlx::query_scalar::<_, i64>("SELECT COUNT(*) FROM chapters")
            .fetch_one(&self.pool)
            .await?;
        let total_enrollments =
            sqlx::query_scalar::<_, i64>("SELECT COUNT(*) FROM course_assignments")
                .fetch_one(&self.pool)
                .await?;
        let chapters_completed =
            sqlx::query_scalar::<_, i64>("SELECT COUNT(*) FROM progress WHERE completed = true")
                .fetch_one(&self.pool)
                .await?;
        let certificates_issued = sqlx::query_scalar::<_, i64>("SELECT COUNT(*) FROM certificates")
            .fetch_one(&self.pool)
            .await?;

        Ok(AdminStats {
            total_students,
            total_mentors,
            pending_mentors,
            total_courses,
            total_chapters,
            total_enrollments,
            chapters_completed,
            certificates_issued,
        })
    }
}
