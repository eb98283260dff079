//! Enrollment records and lesson progress.
//!
//! An enrollment's id is always `{student_id}_{course_id}`, so creating one
//! is a conditional insert and never yields duplicates.

use serde::Serialize;
use serde_json::json;

use crate::auth::{ensure_owner_or_admin, is_admin};
use crate::courses;
use crate::curriculum;
use crate::error::AppError;
use crate::store::{self, keys, DocumentStore, Filter, Key, Record, WriteOp};
use crate::types::{now_rfc3339, Course, CourseStatus, Enrollment, SectionOutline, User};

pub fn enrollment_id(student_id: &str, course_id: &str) -> String {
    format!("{}_{}", student_id, course_id)
}

pub fn new_enrollment(student_id: &str, course_id: &str) -> Enrollment {
    Enrollment {
        enrollment_id: enrollment_id(student_id, course_id),
        student_id: student_id.to_string(),
        course_id: course_id.to_string(),
        progress: 0,
        completed_lessons: Vec::new(),
        last_lesson_id: None,
        enrolled_at: now_rfc3339(),
        completed_at: None,
    }
}

/// Transaction step that inserts a fresh enrollment, failing if one exists.
pub fn create_op(enrollment: &Enrollment) -> Result<WriteOp, AppError> {
    Ok(WriteOp::Create {
        key: enrollment.key(),
        doc: store::encode(enrollment)?,
    })
}

/// Get or create the enrollment for the pair. The flag is `true` when this
/// call created it.
pub async fn enroll(
    store: &dyn DocumentStore,
    student_id: &str,
    course_id: &str,
) -> Result<(Enrollment, bool), AppError> {
    let enrollment = new_enrollment(student_id, course_id);
    let created = store
        .put_if_absent(&enrollment.key(), store::encode(&enrollment)?)
        .await?;
    if created {
        tracing::info!("Enrolled {} in {}", student_id, course_id);
        return Ok((enrollment, true));
    }

    let existing = get_enrollment(store, student_id, course_id).await?;
    Ok((existing, false))
}

/// Enroll without payment. Only free, published courses qualify.
pub async fn enroll_free(
    store: &dyn DocumentStore,
    student: &User,
    course_id: &str,
) -> Result<(Enrollment, bool), AppError> {
    let course = courses::get_course(store, course_id).await?;
    ensure_enrollable(&course, student)?;
    if course.price_cents > 0 {
        return Err(AppError::PaymentRequired(
            "This course must be purchased through checkout".to_string(),
        ));
    }
    enroll(store, &student.user_id, course_id).await
}

pub(crate) fn ensure_enrollable(course: &Course, student: &User) -> Result<(), AppError> {
    if course.status != CourseStatus::Published {
        return Err(AppError::not_found("Course"));
    }
    if course.instructor_id == student.user_id {
        return Err(AppError::BadRequest(
            "Instructors cannot enroll in their own course".to_string(),
        ));
    }
    Ok(())
}

pub async fn find_enrollment(
    store: &dyn DocumentStore,
    student_id: &str,
    course_id: &str,
) -> Result<Option<Enrollment>, AppError> {
    let key = keys::enrollment(&enrollment_id(student_id, course_id));
    Ok(store::load(store, &key).await?)
}

pub async fn get_enrollment(
    store: &dyn DocumentStore,
    student_id: &str,
    course_id: &str,
) -> Result<Enrollment, AppError> {
    find_enrollment(store, student_id, course_id)
        .await?
        .ok_or_else(|| AppError::not_found("Enrollment"))
}

pub async fn list_student_enrollments(
    store: &dyn DocumentStore,
    student_id: &str,
) -> Result<Vec<Enrollment>, AppError> {
    let mut enrollments: Vec<Enrollment> =
        store::scan_as(store, &[Filter::eq("student_id", student_id)]).await?;
    enrollments.sort_by(|a, b| b.enrolled_at.cmp(&a.enrolled_at));
    Ok(enrollments)
}

#[derive(Debug, Serialize)]
pub struct EnrolledCourse {
    pub course: Course,
    pub enrollment: Enrollment,
}

/// The student's courses with their progress, most recent enrollment first.
pub async fn my_courses(
    store: &dyn DocumentStore,
    student_id: &str,
) -> Result<Vec<EnrolledCourse>, AppError> {
    let enrollments = list_student_enrollments(store, student_id).await?;
    let ids: Vec<String> = enrollments.iter().map(|e| e.course_id.clone()).collect();
    let courses = courses::courses_by_ids(store, &ids).await?;

    Ok(enrollments
        .into_iter()
        .filter_map(|enrollment| {
            courses
                .iter()
                .find(|c| c.course_id == enrollment.course_id)
                .cloned()
                .map(|course| EnrolledCourse { course, enrollment })
        })
        .collect())
}

/// A course page: the course, its outline and whether the viewer is enrolled.
#[derive(Debug, Serialize)]
pub struct CourseDetail {
    pub course: Course,
    pub curriculum: Vec<SectionOutline>,
    pub enrolled: bool,
}

/// Video links of locked lectures are only shown to enrolled students, the
/// course owner and admins.
pub async fn course_detail(
    store: &dyn DocumentStore,
    course_id: &str,
    viewer: Option<&User>,
) -> Result<CourseDetail, AppError> {
    let course = courses::get_visible_course(store, course_id, viewer).await?;
    let mut outline = curriculum::curriculum(store, course_id).await?;

    let enrolled = match viewer {
        Some(user) => find_enrollment(store, &user.user_id, course_id).await?.is_some(),
        None => false,
    };
    let privileged = viewer.is_some_and(|u| u.user_id == course.instructor_id || is_admin(u));
    if !enrolled && !privileged {
        curriculum::strip_locked_videos(&mut outline);
    }

    Ok(CourseDetail {
        course,
        curriculum: outline,
        enrolled,
    })
}

/// Percentage of completed lectures, rounded half up and clamped to 0..=100.
pub fn compute_progress(completed: usize, total: usize) -> u8 {
    if total == 0 {
        return 0;
    }
    let rounded = (completed * 200 + total) / (2 * total);
    rounded.min(100) as u8
}

#[derive(Debug, Serialize)]
pub struct LessonCompletion {
    pub enrollment: Enrollment,
    pub next_lecture_id: Option<String>,
}

pub async fn complete_lesson(
    store: &dyn DocumentStore,
    student_id: &str,
    course_id: &str,
    lecture_id: &str,
) -> Result<LessonCompletion, AppError> {
    let enrollment = get_enrollment(store, student_id, course_id).await?;
    let outline = curriculum::curriculum(store, course_id).await?;
    let ordered = curriculum::ordered_lecture_ids(&outline);
    if !ordered.iter().any(|id| id == lecture_id) {
        return Err(AppError::not_found("Lecture"));
    }

    let mut completed = enrollment.completed_lessons.clone();
    if !completed.iter().any(|id| id == lecture_id) {
        completed.push(lecture_id.to_string());
    }
    // Lectures deleted since they were completed stay in the history but
    // no longer count.
    let live = completed.iter().filter(|id| ordered.contains(*id)).count();
    let progress = compute_progress(live, ordered.len());

    let mut patch = store::fields([
        ("completed_lessons", json!(completed)),
        ("progress", json!(progress)),
        ("last_lesson_id", json!(lecture_id)),
    ]);
    if progress == 100 && enrollment.completed_at.is_none() {
        patch.insert("completed_at".to_string(), json!(now_rfc3339()));
        tracing::info!("{} completed course {}", student_id, course_id);
    }

    let doc = store
        .update(&enrollment.key(), patch)
        .await?
        .ok_or_else(|| AppError::not_found("Enrollment"))?;

    Ok(LessonCompletion {
        enrollment: store::decode(doc)?,
        next_lecture_id: curriculum::next_lecture(&ordered, lecture_id),
    })
}

#[derive(Debug, Serialize)]
pub struct StudentProgress {
    pub student_id: String,
    pub name: Option<String>,
    pub progress: u8,
    pub enrolled_at: String,
}

/// Students of a course with their progress, for the owner or an admin.
pub async fn course_students(
    store: &dyn DocumentStore,
    caller: &User,
    course_id: &str,
) -> Result<Vec<StudentProgress>, AppError> {
    let course = courses::get_course(store, course_id).await?;
    ensure_owner_or_admin(caller, &course.instructor_id)?;

    let mut enrollments: Vec<Enrollment> =
        store::scan_as(store, &[Filter::eq("course_id", course_id)]).await?;
    enrollments.sort_by(|a, b| a.enrolled_at.cmp(&b.enrolled_at));

    let user_keys: Vec<Key> = enrollments.iter().map(|e| keys::user(&e.student_id)).collect();
    let users: Vec<User> = store::decode_all(store.batch_get(&user_keys).await?)?;

    Ok(enrollments
        .into_iter()
        .map(|e| StudentProgress {
            name: users
                .iter()
                .find(|u| u.user_id == e.student_id)
                .map(|u| u.name.clone()),
            student_id: e.student_id,
            progress: e.progress,
            enrolled_at: e.enrolled_at,
        })
        .collect())
}
