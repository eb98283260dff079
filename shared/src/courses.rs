use serde_json::{json, Value};

use crate::auth::{self, ensure_owner_or_admin, require_instructor};
use crate::curriculum;
use crate::error::AppError;
use crate::store::{self, keys, Document, DocumentStore, Filter, Key, WriteOp};
use crate::types::{
    now_rfc3339, new_id, Course, CourseStatus, CreateCourseRequest, SearchQuery,
    UpdateCourseRequest, User,
};

pub const DEFAULT_SEARCH_LIMIT: usize = 20;
pub const MAX_SEARCH_LIMIT: usize = 50;
/// Ids per lookup round trip.
pub const IDS_PER_LOOKUP: usize = 30;

fn validate_price(price_cents: i64) -> Result<(), AppError> {
    if price_cents < 0 {
        return Err(AppError::BadRequest("price_cents cannot be negative".to_string()));
    }
    Ok(())
}

pub async fn create_course(
    store: &dyn DocumentStore,
    caller: &User,
    req: CreateCourseRequest,
) -> Result<Course, AppError> {
    require_instructor(caller)?;
    let title = req.title.trim().to_string();
    if title.is_empty() {
        return Err(AppError::BadRequest("Course title is required".to_string()));
    }
    if req.category.trim().is_empty() {
        return Err(AppError::BadRequest("Course category is required".to_string()));
    }
    validate_price(req.price_cents)?;

    let now = now_rfc3339();
    let course = Course {
        course_id: new_id(),
        instructor_id: caller.user_id.clone(),
        title_lower: title.to_lowercase(),
        title,
        description: req.description,
        price_cents: req.price_cents,
        category: req.category,
        status: CourseStatus::Draft,
        thumbnail_url: req.thumbnail_url,
        created_at: now.clone(),
        updated_at: now,
    };
    store::save(store, &course).await?;

    tracing::info!("Course {} created by {}", course.course_id, caller.user_id);
    Ok(course)
}

pub async fn get_course(store: &dyn DocumentStore, course_id: &str) -> Result<Course, AppError> {
    store::load(store, &keys::course(course_id))
        .await?
        .ok_or_else(|| AppError::not_found("Course"))
}

/// Published courses are public; drafts are visible to their owner and admins.
pub async fn get_visible_course(
    store: &dyn DocumentStore,
    course_id: &str,
    viewer: Option<&User>,
) -> Result<Course, AppError> {
    let course = get_course(store, course_id).await?;
    let visible = course.status == CourseStatus::Published
        || viewer.is_some_and(|u| u.user_id == course.instructor_id || auth::is_admin(u));
    if visible {
        Ok(course)
    } else {
        Err(AppError::not_found("Course"))
    }
}

/// Load a course the caller may edit.
pub(crate) async fn load_editable(
    store: &dyn DocumentStore,
    caller: &User,
    course_id: &str,
) -> Result<Course, AppError> {
    let course = get_course(store, course_id).await?;
    ensure_owner_or_admin(caller, &course.instructor_id)?;
    Ok(course)
}

pub async fn update_course(
    store: &dyn DocumentStore,
    caller: &User,
    course_id: &str,
    req: UpdateCourseRequest,
) -> Result<Course, AppError> {
    load_editable(store, caller, course_id).await?;

    let mut patch = Document::new();
    if let Some(title) = req.title {
        let title = title.trim().to_string();
        if title.is_empty() {
            return Err(AppError::BadRequest("Course title cannot be empty".to_string()));
        }
        patch.insert("title_lower".to_string(), Value::String(title.to_lowercase()));
        patch.insert("title".to_string(), Value::String(title));
    }
    if let Some(description) = req.description {
        patch.insert("description".to_string(), Value::String(description));
    }
    if let Some(price_cents) = req.price_cents {
        validate_price(price_cents)?;
        patch.insert("price_cents".to_string(), json!(price_cents));
    }
    if let Some(category) = req.category {
        patch.insert("category".to_string(), Value::String(category));
    }
    if let Some(thumbnail_url) = req.thumbnail_url {
        patch.insert("thumbnail_url".to_string(), Value::String(thumbnail_url));
    }
    patch.insert("updated_at".to_string(), Value::String(now_rfc3339()));

    let doc = store
        .update(&keys::course(course_id), patch)
        .await?
        .ok_or_else(|| AppError::not_found("Course"))?;
    Ok(store::decode(doc)?)
}

/// Delete a course with its sections and lectures. Courses with students
/// cannot be deleted.
pub async fn delete_course(
    store: &dyn DocumentStore,
    caller: &User,
    course_id: &str,
) -> Result<(), AppError> {
    load_editable(store, caller, course_id).await?;

    let enrolled = store
        .scan("enrollment", &[Filter::eq("course_id", course_id)])
        .await?;
    if !enrolled.is_empty() {
        return Err(AppError::Conflict(format!(
            "Course has {} enrolled students",
            enrolled.len()
        )));
    }

    // The course document shares its partition with the children.
    let ops: Vec<WriteOp> = store
        .query(&keys::course_pk(course_id), "")
        .await?
        .iter()
        .filter_map(doc_key)
        .map(|key| WriteOp::Delete { key })
        .collect();

    tracing::info!("Deleting course {} ({} documents)", course_id, ops.len());
    curriculum::delete_in_chunks(store, ops).await
}

fn doc_key(doc: &Document) -> Option<Key> {
    let pk = doc.get(store::PK)?.as_str()?;
    let sk = doc.get(store::SK)?.as_str()?;
    Some(Key::new(pk, sk))
}

pub async fn list_instructor_courses(
    store: &dyn DocumentStore,
    instructor_id: &str,
) -> Result<Vec<Course>, AppError> {
    let mut courses: Vec<Course> =
        store::scan_as(store, &[Filter::eq("instructor_id", instructor_id)]).await?;
    courses.sort_by(|a, b| b.created_at.cmp(&a.created_at));
    Ok(courses)
}

/// Every course, optionally narrowed to one status; oldest first so the
/// moderation queue reads in arrival order.
pub async fn list_courses(
    store: &dyn DocumentStore,
    status: Option<CourseStatus>,
) -> Result<Vec<Course>, AppError> {
    let filters: Vec<Filter> = status
        .map(|s| vec![Filter::eq("status", s.as_str())])
        .unwrap_or_default();
    let mut courses: Vec<Course> = store::scan_as(store, &filters).await?;
    courses.sort_by(|a, b| a.created_at.cmp(&b.created_at));
    Ok(courses)
}

/// Move a draft to `Pending Review`. It needs at least one lecture.
pub async fn submit_for_review(
    store: &dyn DocumentStore,
    caller: &User,
    course_id: &str,
) -> Result<Course, AppError> {
    let course = load_editable(store, caller, course_id).await?;
    if course.status != CourseStatus::Draft {
        return Err(AppError::Conflict(format!(
            "Course is {}, only drafts can be submitted",
            course.status.as_str()
        )));
    }
    let outline = curriculum::curriculum(store, course_id).await?;
    if curriculum::ordered_lecture_ids(&outline).is_empty() {
        return Err(AppError::BadRequest(
            "Add at least one lecture before submitting".to_string(),
        ));
    }
    set_status(store, course_id, CourseStatus::PendingReview).await
}

/// Admin decision: publish, or send back to draft.
pub async fn moderate_course(
    store: &dyn DocumentStore,
    course_id: &str,
    status: CourseStatus,
) -> Result<Course, AppError> {
    if status == CourseStatus::PendingReview {
        return Err(AppError::BadRequest(
            "Moderation sets Published or Draft".to_string(),
        ));
    }
    get_course(store, course_id).await?;
    let course = set_status(store, course_id, status).await?;
    tracing::info!("Course {} moderated to {}", course_id, status.as_str());
    Ok(course)
}

async fn set_status(
    store: &dyn DocumentStore,
    course_id: &str,
    status: CourseStatus,
) -> Result<Course, AppError> {
    let doc = store
        .update(
            &keys::course(course_id),
            store::fields([
                ("status", json!(status)),
                ("updated_at", json!(now_rfc3339())),
            ]),
        )
        .await?
        .ok_or_else(|| AppError::not_found("Course"))?;
    Ok(store::decode(doc)?)
}

/// Published courses whose lower-cased title starts with the query, ordered
/// by title.
pub async fn search_courses(
    store: &dyn DocumentStore,
    query: &SearchQuery,
) -> Result<Vec<Course>, AppError> {
    let limit = query
        .limit
        .unwrap_or(DEFAULT_SEARCH_LIMIT)
        .clamp(1, MAX_SEARCH_LIMIT);

    let mut filters = vec![Filter::eq("status", CourseStatus::Published.as_str())];
    if let Some(q) = query.q.as_deref().map(str::trim).filter(|q| !q.is_empty()) {
        filters.push(Filter::begins_with("title_lower", &q.to_lowercase()));
    }
    if let Some(category) = query.category.as_deref().filter(|c| !c.is_empty()) {
        filters.push(Filter::eq("category", category));
    }

    let mut courses: Vec<Course> = store::scan_as(store, &filters).await?;
    courses.sort_by(|a, b| a.title_lower.cmp(&b.title_lower));
    courses.truncate(limit);
    Ok(courses)
}

/// Fetch courses by id, in the order given. Unknown ids are skipped.
pub async fn courses_by_ids(
    store: &dyn DocumentStore,
    ids: &[String],
) -> Result<Vec<Course>, AppError> {
    let mut unique: Vec<&String> = Vec::with_capacity(ids.len());
    for id in ids {
        if !unique.contains(&id) {
            unique.push(id);
        }
    }

    let mut found = Vec::with_capacity(unique.len());
    for chunk in unique.chunks(IDS_PER_LOOKUP) {
        let keys: Vec<Key> = chunk.iter().map(|id| keys::course(id)).collect();
        let courses: Vec<Course> = store::decode_all(store.batch_get(&keys).await?)?;
        found.extend(courses);
    }

    Ok(unique
        .iter()
        .filter_map(|id| found.iter().find(|c| &&c.course_id == id).cloned())
        .collect())
}
