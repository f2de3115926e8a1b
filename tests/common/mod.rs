#![allow(dead_code)]

use async_trait::async_trait;
use axum::{
    extract::{Path, State},
    response::IntoResponse,
};
use chapterwise_api::{
    AppConfig, AppState, ApiError, MockStorageService, create_router,
    auth::AuthUser,
    handlers,
    models::{
        AdminStats, AssignmentOutcome, Certificate, CertificateView, Chapter, Course,
        CourseSummary, CreateChapterRequest, CreateCourseRequest, EnrolledStudent, NewUser,
        Progress, ProgressAggregateRow, UpdateChapterRequest, UpdateCourseRequest, User,
        UserCredentials,
    },
    repository::{Repository, RepositoryError},
};
use chrono::{DateTime, Utc};
use std::sync::{Arc, Mutex};
use tokio::net::TcpListener;
use uuid::Uuid;

// --- In-Memory Repository ---

// A full, stateful implementation of the Repository trait backed by plain
// vectors behind a mutex. It reproduces the semantics of the Postgres
// implementation (email uniqueness as Conflict, guarded completion upsert,
// delete-and-renumber, per-item assignment outcomes, cascades) so handler
// and router tests run without a database.

#[derive(Clone)]
struct StoredUser {
    user: User,
    password_hash: String,
}

struct Assignment {
    course_id: Uuid,
    student_id: Uuid,
    assigned_at: DateTime<Utc>,
}

#[derive(Default)]
struct Store {
    users: Vec<StoredUser>,
    courses: Vec<Course>,
    chapters: Vec<Chapter>,
    assignments: Vec<Assignment>,
    progress: Vec<Progress>,
    certificates: Vec<Certificate>,
}

impl Store {
    fn chapter_ids_of(&self, course_id: Uuid) -> Vec<Uuid> {
        self.chapters
            .iter()
            .filter(|c| c.course_id == course_id)
            .map(|c| c.id)
            .collect()
    }

    fn summarize(&self, course: &Course) -> CourseSummary {
        CourseSummary {
            id: course.id,
            title: course.title.clone(),
            description: course.description.clone(),
            mentor_name: self
                .users
                .iter()
                .find(|u| u.user.id == course.mentor_id)
                .map(|u| u.user.full_name.clone())
                .unwrap_or_default(),
            total_chapters: self
                .chapters
                .iter()
                .filter(|c| c.course_id == course.id)
                .count() as i64,
            created_at: course.created_at,
        }
    }
}

pub struct MemoryRepository {
    store: Mutex<Store>,
}

impl MemoryRepository {
    pub fn new() -> Self {
        Self {
            store: Mutex::new(Store::default()),
        }
    }
}

impl Default for MemoryRepository {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Repository for MemoryRepository {
    async fn create_user(&self, user: NewUser) -> Result<User, RepositoryError> {
        let mut store = self.store.lock().unwrap();
        if store.users.iter().any(|u| u.user.email == user.email) {
            return Err(RepositoryError::Conflict);
        }
        let created = User {
            id: Uuid::new_v4(),
            email: user.email,
            full_name: user.full_name,
            role: user.role,
            is_approved: user.is_approved,
            created_at: Utc::now(),
        };
        store.users.push(StoredUser {
            user: created.clone(),
            password_hash: user.password_hash,
        });
        Ok(created)
    }

    async fn get_user(&self, id: Uuid) -> Result<Option<User>, RepositoryError> {
        let store = self.store.lock().unwrap();
        Ok(store
            .users
            .iter()
            .find(|u| u.user.id == id)
            .map(|u| u.user.clone()))
    }

    async fn find_credentials(
        &self,
        email: &str,
    ) -> Result<Option<UserCredentials>, RepositoryError> {
        let store = self.store.lock().unwrap();
        Ok(store.users.iter().find(|u| u.user.email == email).map(|u| {
            UserCredentials {
                id: u.user.id,
                email: u.user.email.clone(),
                full_name: u.user.full_name.clone(),
                role: u.user.role.clone(),
                is_approved: u.user.is_approved,
                created_at: u.user.created_at,
                password_hash: u.password_hash.clone(),
            }
        }))
    }

    async fn list_users(&self) -> Result<Vec<User>, RepositoryError> {
        let store = self.store.lock().unwrap();
        Ok(store.users.iter().rev().map(|u| u.user.clone()).collect())
    }

    async fn list_pending_mentors(&self) -> Result<Vec<User>, RepositoryError> {
        let store = self.store.lock().unwrap();
        Ok(store
            .users
            .iter()
            .filter(|u| u.user.role == "mentor" && !u.user.is_approved)
            .map(|u| u.user.clone())
            .collect())
    }

    async fn set_mentor_approval(
        &self,
        user_id: Uuid,
        approved: bool,
    ) -> Result<Option<User>, RepositoryError> {
        let mut store = self.store.lock().unwrap();
        match store
            .users
            .iter_mut()
            .find(|u| u.user.id == user_id && u.user.role == "mentor")
        {
            Some(stored) => {
                stored.user.is_approved = approved;
                Ok(Some(stored.user.clone()))
            }
            None => Ok(None),
        }
    }

    async fn create_course(
        &self,
        mentor_id: Uuid,
        req: CreateCourseRequest,
    ) -> Result<Course, RepositoryError> {
        let mut store = self.store.lock().unwrap();
        let now = Utc::now();
        let course = Course {
            id: Uuid::new_v4(),
            mentor_id,
            title: req.title,
            description: req.description,
            created_at: now,
            updated_at: now,
        };
        store.courses.push(course.clone());
        Ok(course)
    }

    async fn get_course(&self, id: Uuid) -> Result<Option<Course>, RepositoryError> {
        let store = self.store.lock().unwrap();
        Ok(store.courses.iter().find(|c| c.id == id).cloned())
    }

    async fn list_courses(&self) -> Result<Vec<CourseSummary>, RepositoryError> {
        let store = self.store.lock().unwrap();
        Ok(store
            .courses
            .iter()
            .rev()
            .map(|c| store.summarize(c))
            .collect())
    }

    async fn list_courses_by_mentor(
        &self,
        mentor_id: Uuid,
    ) -> Result<Vec<Course>, RepositoryError> {
        let store = self.store.lock().unwrap();
        Ok(store
            .courses
            .iter()
            .rev()
            .filter(|c| c.mentor_id == mentor_id)
            .cloned()
            .collect())
    }

    async fn update_course(
        &self,
        id: Uuid,
        mentor_id: Uuid,
        req: UpdateCourseRequest,
    ) -> Result<Option<Course>, RepositoryError> {
        let mut store = self.store.lock().unwrap();
        match store
            .courses
            .iter_mut()
            .find(|c| c.id == id && c.mentor_id == mentor_id)
        {
            Some(course) => {
                if let Some(title) = req.title {
                    course.title = title;
                }
                if let Some(description) = req.description {
                    course.description = description;
                }
                course.updated_at = Utc::now();
                Ok(Some(course.clone()))
            }
            None => Ok(None),
        }
    }

    async fn delete_course(&self, id: Uuid, mentor_id: Uuid) -> Result<bool, RepositoryError> {
        let mut store = self.store.lock().unwrap();
        let Some(pos) = store
            .courses
            .iter()
            .position(|c| c.id == id && c.mentor_id == mentor_id)
        else {
            return Ok(false);
        };
        store.courses.remove(pos);

        let chapter_ids = store.chapter_ids_of(id);
        store.chapters.retain(|c| c.course_id != id);
        store.assignments.retain(|a| a.course_id != id);
        store.progress.retain(|p| !chapter_ids.contains(&p.chapter_id));
        store.certificates.retain(|c| c.course_id != id);
        Ok(true)
    }

    async fn create_chapter(
        &self,
        course_id: Uuid,
        req: CreateChapterRequest,
    ) -> Result<Chapter, RepositoryError> {
        let mut store = self.store.lock().unwrap();
        let next_order = store
            .chapters
            .iter()
            .filter(|c| c.course_id == course_id)
            .map(|c| c.sequence_order)
            .max()
            .unwrap_or(0)
            + 1;
        let now = Utc::now();
        let chapter = Chapter {
            id: Uuid::new_v4(),
            course_id,
            title: req.title,
            description: req.description,
            video_url: req.video_url,
            pdf_url: req.pdf_url,
            sequence_order: next_order,
            created_at: now,
            updated_at: now,
        };
        store.chapters.push(chapter.clone());
        Ok(chapter)
    }

    async fn get_chapter(&self, id: Uuid) -> Result<Option<Chapter>, RepositoryError> {
        let store = self.store.lock().unwrap();
        Ok(store.chapters.iter().find(|c| c.id == id).cloned())
    }

    async fn list_chapters(&self, course_id: Uuid) -> Result<Vec<Chapter>, RepositoryError> {
        let store = self.store.lock().unwrap();
        let mut chapters: Vec<Chapter> = store
            .chapters
            .iter()
            .filter(|c| c.course_id == course_id)
            .cloned()
            .collect();
        chapters.sort_by_key(|c| c.sequence_order);
        Ok(chapters)
    }

    async fn update_chapter(
        &self,
        id: Uuid,
        course_id: Uuid,
        req: UpdateChapterRequest,
    ) -> Result<Option<Chapter>, RepositoryError> {
        let mut store = self.store.lock().unwrap();
        match store
            .chapters
            .iter_mut()
            .find(|c| c.id == id && c.course_id == course_id)
        {
            Some(chapter) => {
                if let Some(title) = req.title {
                    chapter.title = title;
                }
                if let Some(description) = req.description {
                    chapter.description = description;
                }
                if let Some(video_url) = req.video_url {
                    chapter.video_url = Some(video_url);
                }
                if let Some(pdf_url) = req.pdf_url {
                    chapter.pdf_url = Some(pdf_url);
                }
                chapter.updated_at = Utc::now();
                Ok(Some(chapter.clone()))
            }
            None => Ok(None),
        }
    }

    async fn delete_chapter(
        &self,
        id: Uuid,
        course_id: Uuid,
    ) -> Result<Option<i32>, RepositoryError> {
        let mut store = self.store.lock().unwrap();
        let Some(pos) = store
            .chapters
            .iter()
            .position(|c| c.id == id && c.course_id == course_id)
        else {
            return Ok(None);
        };
        let removed = store.chapters.remove(pos);
        for chapter in store
            .chapters
            .iter_mut()
            .filter(|c| c.course_id == course_id && c.sequence_order > removed.sequence_order)
        {
            chapter.sequence_order -= 1;
        }
        store.progress.retain(|p| p.chapter_id != id);
        Ok(Some(removed.sequence_order))
    }

    async fn assign_students(
        &self,
        course_id: Uuid,
        student_ids: &[Uuid],
    ) -> Result<Vec<AssignmentOutcome>, RepositoryError> {
        let mut store = self.store.lock().unwrap();
        let mut outcomes = Vec::with_capacity(student_ids.len());

        for &student_id in student_ids {
            let role = store
                .users
                .iter()
                .find(|u| u.user.id == student_id)
                .map(|u| u.user.role.clone());

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
                    let already = store
                        .assignments
                        .iter()
                        .any(|a| a.course_id == course_id && a.student_id == student_id);
                    if already {
                        AssignmentOutcome {
                            student_id,
                            status: "skipped".into(),
                            reason: Some("already assigned".into()),
                        }
                    } else {
                        store.assignments.push(Assignment {
                            course_id,
                            student_id,
                            assigned_at: Utc::now(),
                        });
                        AssignmentOutcome {
                            student_id,
                            status: "assigned".into(),
                            reason: None,
                        }
                    }
                }
            };
            outcomes.push(outcome);
        }

        Ok(outcomes)
    }

    async fn unassign_student(
        &self,
        course_id: Uuid,
        student_id: Uuid,
    ) -> Result<bool, RepositoryError> {
        let mut store = self.store.lock().unwrap();
        let Some(pos) = store
            .assignments
            .iter()
            .position(|a| a.course_id == course_id && a.student_id == student_id)
        else {
            return Ok(false);
        };
        store.assignments.remove(pos);

        let chapter_ids = store.chapter_ids_of(course_id);
        store
            .progress
            .retain(|p| !(p.student_id == student_id && chapter_ids.contains(&p.chapter_id)));
        Ok(true)
    }

    async fn is_enrolled(
        &self,
        course_id: Uuid,
        student_id: Uuid,
    ) -> Result<bool, RepositoryError> {
        let store = self.store.lock().unwrap();
        Ok(store
            .assignments
            .iter()
            .any(|a| a.course_id == course_id && a.student_id == student_id))
    }

    async fn list_course_students(
        &self,
        course_id: Uuid,
    ) -> Result<Vec<EnrolledStudent>, RepositoryError> {
        let store = self.store.lock().unwrap();
        Ok(store
            .assignments
            .iter()
            .filter(|a| a.course_id == course_id)
            .filter_map(|a| {
                store.users.iter().find(|u| u.user.id == a.student_id).map(|u| {
                    EnrolledStudent {
                        id: u.user.id,
                        email: u.user.email.clone(),
                        full_name: u.user.full_name.clone(),
                        assigned_at: a.assigned_at,
                    }
                })
            })
            .collect())
    }

    async fn list_enrolled_courses(
        &self,
        student_id: Uuid,
    ) -> Result<Vec<CourseSummary>, RepositoryError> {
        let store = self.store.lock().unwrap();
        Ok(store
            .assignments
            .iter()
            .rev()
            .filter(|a| a.student_id == student_id)
            .filter_map(|a| store.courses.iter().find(|c| c.id == a.course_id))
            .map(|c| store.summarize(c))
            .collect())
    }

    async fn get_progress(
        &self,
        student_id: Uuid,
        course_id: Uuid,
    ) -> Result<Vec<Progress>, RepositoryError> {
        let store = self.store.lock().unwrap();
        let chapter_ids = store.chapter_ids_of(course_id);
        Ok(store
            .progress
            .iter()
            .filter(|p| p.student_id == student_id && chapter_ids.contains(&p.chapter_id))
            .cloned()
            .collect())
    }

    async fn complete_chapter(
        &self,
        student_id: Uuid,
        chapter_id: Uuid,
    ) -> Result<Option<Progress>, RepositoryError> {
        let mut store = self.store.lock().unwrap();
        if let Some(row) = store
            .progress
            .iter_mut()
            .find(|p| p.student_id == student_id && p.chapter_id == chapter_id)
        {
            if row.completed {
                return Ok(None);
            }
            row.completed = true;
            row.completed_at = Some(Utc::now());
            return Ok(Some(row.clone()));
        }

        let row = Progress {
            id: Uuid::new_v4(),
            student_id,
            chapter_id,
            completed: true,
            completed_at: Some(Utc::now()),
        };
        store.progress.push(row.clone());
        Ok(Some(row))
    }

    async fn reset_progress(
        &self,
        student_id: Uuid,
        course_id: Uuid,
    ) -> Result<u64, RepositoryError> {
        let mut store = self.store.lock().unwrap();
        let chapter_ids = store.chapter_ids_of(course_id);
        let before = store.progress.len();
        store
            .progress
            .retain(|p| !(p.student_id == student_id && chapter_ids.contains(&p.chapter_id)));
        Ok((before - store.progress.len()) as u64)
    }

    async fn progress_aggregates(
        &self,
        student_id: Uuid,
        course_id: Option<Uuid>,
    ) -> Result<Vec<ProgressAggregateRow>, RepositoryError> {
        let store = self.store.lock().unwrap();
        Ok(store
            .assignments
            .iter()
            .rev()
            .filter(|a| a.student_id == student_id)
            .filter(|a| course_id.map_or(true, |c| c == a.course_id))
            .filter_map(|a| store.courses.iter().find(|c| c.id == a.course_id))
            .map(|course| {
                let chapter_ids = store.chapter_ids_of(course.id);
                let completed = store
                    .progress
                    .iter()
                    .filter(|p| {
                        p.student_id == student_id
                            && p.completed
                            && chapter_ids.contains(&p.chapter_id)
                    })
                    .count() as i64;
                ProgressAggregateRow {
                    course_id: course.id,
                    course_title: course.title.clone(),
                    total_chapters: chapter_ids.len() as i64,
                    completed_chapters: completed,
                }
            })
            .collect())
    }

    async fn find_certificate(
        &self,
        student_id: Uuid,
        course_id: Uuid,
    ) -> Result<Option<Certificate>, RepositoryError> {
        let store = self.store.lock().unwrap();
        Ok(store
            .certificates
            .iter()
            .find(|c| c.student_id == student_id && c.course_id == course_id)
            .cloned())
    }

    async fn issue_certificate(
        &self,
        student_id: Uuid,
        course_id: Uuid,
    ) -> Result<Certificate, RepositoryError> {
        let mut store = self.store.lock().unwrap();
        if let Some(existing) = store
            .certificates
            .iter()
            .find(|c| c.student_id == student_id && c.course_id == course_id)
        {
            return Ok(existing.clone());
        }
        let cert = Certificate {
            id: Uuid::new_v4(),
            student_id,
            course_id,
            issued_at: Utc::now(),
        };
        store.certificates.push(cert.clone());
        Ok(cert)
    }

    async fn list_certificates(
        &self,
        student_id: Uuid,
    ) -> Result<Vec<CertificateView>, RepositoryError> {
        let store = self.store.lock().unwrap();
        Ok(store
            .certificates
            .iter()
            .rev()
            .filter(|c| c.student_id == student_id)
            .map(|cert| CertificateView {
                id: cert.id,
                course_id: cert.course_id,
                course_title: store
                    .courses
                    .iter()
                    .find(|c| c.id == cert.course_id)
                    .map(|c| c.title.clone())
                    .unwrap_or_default(),
                issued_at: cert.issued_at,
            })
            .collect())
    }

    async fn get_stats(&self) -> Result<AdminStats, RepositoryError> {
        let store = self.store.lock().unwrap();
        Ok(AdminStats {
            total_students: store
                .users
                .iter()
                .filter(|u| u.user.role == "student")
                .count() as i64,
            total_mentors: store
                .users
                .iter()
                .filter(|u| u.user.role == "mentor")
                .count() as i64,
            pending_mentors: store
                .users
                .iter()
                .filter(|u| u.user.role == "mentor" && !u.user.is_approved)
                .count() as i64,
            total_courses: store.courses.len() as i64,
            total_chapters: store.chapters.len() as i64,
            total_enrollments: store.assignments.len() as i64,
            chapters_completed: store.progress.iter().filter(|p| p.completed).count() as i64,
            certificates_issued: store.certificates.len() as i64,
        })
    }
}

// --- Test State and Seed Helpers ---

/// AppState over the in-memory repository, Env::Local so the x-user-id
/// bypass works in router tests.
pub fn state_with(repo: Arc<MemoryRepository>, storage: MockStorageService) -> AppState {
    AppState {
        repo,
        storage: Arc::new(storage),
        config: AppConfig::default(),
    }
}

pub async fn seed_user(repo: &MemoryRepository, role: &str, approved: bool) -> User {
    repo.create_user(NewUser {
        email: format!("{role}-{}@example.com", Uuid::new_v4()),
        password_hash: "seeded-hash".to_string(),
        full_name: format!("{role} user"),
        role: role.to_string(),
        is_approved: approved,
    })
    .await
    .expect("seed user")
}

pub async fn seed_course(repo: &MemoryRepository, mentor_id: Uuid, title: &str) -> Course {
    repo.create_course(
        mentor_id,
        CreateCourseRequest {
            title: title.to_string(),
            description: format!("{title} description"),
        },
    )
    .await
    .expect("seed course")
}

pub async fn seed_chapter(repo: &MemoryRepository, course_id: Uuid, title: &str) -> Chapter {
    repo.create_chapter(
        course_id,
        CreateChapterRequest {
            title: title.to_string(),
            description: format!("{title} notes"),
            video_url: Some(format!("https://media.example.com/{title}.mp4")),
            pdf_url: Some(format!("https://media.example.com/{title}.pdf")),
        },
    )
    .await
    .expect("seed chapter")
}

pub async fn enroll(repo: &MemoryRepository, course_id: Uuid, student_id: Uuid) {
    let outcomes = repo
        .assign_students(course_id, &[student_id])
        .await
        .expect("enroll student");
    assert_eq!(outcomes[0].status, "assigned");
}

pub fn auth_for(user: &User) -> AuthUser {
    AuthUser {
        id: user.id,
        role: user.role.clone(),
        is_approved: user.is_approved,
    }
}

/// Completes every chapter in order through the handler, as a student would.
pub async fn complete_course(state: &AppState, student: &AuthUser, chapters: &[Chapter]) {
    for chapter in chapters {
        handlers::complete_chapter(student.clone(), State(state.clone()), Path(chapter.id))
            .await
            .expect("chapter completion");
    }
}

pub fn status_of(err: ApiError) -> axum::http::StatusCode {
    err.into_response().status()
}

/// Serves the full router on an ephemeral port and returns its base URL.
pub async fn spawn_app(state: AppState) -> String {
    let router = create_router(state);
    let listener = TcpListener::bind("127.0.0.1:0")
        .await
        .expect("failed to bind port");
    let port = listener.local_addr().unwrap().port();

    tokio::spawn(async move {
        axum::serve(listener, router).await.unwrap();
    });

    format!("http://127.0.0.1:{port}")
}
