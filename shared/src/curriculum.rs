//! Sections and lectures of a course.
//!
//! Both are children of the course partition. `order` is the number of
//! siblings that existed when the item was created; there is no reordering.

use std::collections::HashMap;

use crate::courses;
use crate::error::AppError;
use crate::store::{self, keys, DocumentStore, Record, WriteOp, MAX_TRANSACTION_OPS};
use crate::types::{
    new_id, now_rfc3339, CreateLectureRequest, CreateSectionRequest, Lecture, Section,
    SectionOutline, User,
};

pub async fn sections(store: &dyn DocumentStore, course_id: &str) -> Result<Vec<Section>, AppError> {
    let mut sections: Vec<Section> =
        store::query_as(store, &keys::course_pk(course_id), keys::SECTION_PREFIX).await?;
    sections.sort_by(|a, b| (a.order, &a.created_at).cmp(&(b.order, &b.created_at)));
    Ok(sections)
}

async fn section_lectures(
    store: &dyn DocumentStore,
    course_id: &str,
    section_id: &str,
) -> Result<Vec<Lecture>, AppError> {
    Ok(store::query_as(
        store,
        &keys::course_pk(course_id),
        &keys::section_lectures_prefix(section_id),
    )
    .await?)
}

pub async fn add_section(
    store: &dyn DocumentStore,
    caller: &User,
    course_id: &str,
    req: CreateSectionRequest,
) -> Result<Section, AppError> {
    courses::load_editable(store, caller, course_id).await?;
    if req.title.trim().is_empty() {
        return Err(AppError::BadRequest("Section title is required".to_string()));
    }

    let existing = sections(store, course_id).await?;
    let section = Section {
        section_id: new_id(),
        course_id: course_id.to_string(),
        title: req.title,
        order: existing.len() as u32,
        created_at: now_rfc3339(),
    };
    store::save(store, &section).await?;
    Ok(section)
}

pub async fn add_lecture(
    store: &dyn DocumentStore,
    caller: &User,
    course_id: &str,
    section_id: &str,
    req: CreateLectureRequest,
) -> Result<Lecture, AppError> {
    courses::load_editable(store, caller, course_id).await?;
    if req.title.trim().is_empty() {
        return Err(AppError::BadRequest("Lecture title is required".to_string()));
    }
    if store.get(&keys::section(course_id, section_id)).await?.is_none() {
        return Err(AppError::not_found("Section"));
    }

    let siblings = section_lectures(store, course_id, section_id).await?;
    let lecture = Lecture {
        lecture_id: new_id(),
        section_id: section_id.to_string(),
        course_id: course_id.to_string(),
        title: req.title,
        video_url: req.video_url,
        duration_minutes: req.duration_minutes,
        is_preview: req.is_preview,
        order: siblings.len() as u32,
        created_at: now_rfc3339(),
    };
    store::save(store, &lecture).await?;
    Ok(lecture)
}

/// Sections by `order`, each with its lectures by `order`.
pub async fn curriculum(
    store: &dyn DocumentStore,
    course_id: &str,
) -> Result<Vec<SectionOutline>, AppError> {
    let sections = sections(store, course_id).await?;
    let lectures: Vec<Lecture> =
        store::query_as(store, &keys::course_pk(course_id), keys::LECTURE_PREFIX).await?;

    let mut by_section: HashMap<String, Vec<Lecture>> = HashMap::new();
    for lecture in lectures {
        by_section
            .entry(lecture.section_id.clone())
            .or_default()
            .push(lecture);
    }

    Ok(sections
        .into_iter()
        .map(|section| {
            let mut lectures = by_section.remove(&section.section_id).unwrap_or_default();
            lectures.sort_by(|a, b| (a.order, &a.created_at).cmp(&(b.order, &b.created_at)));
            SectionOutline { section, lectures }
        })
        .collect())
}

pub fn ordered_lecture_ids(outline: &[SectionOutline]) -> Vec<String> {
    outline
        .iter()
        .flat_map(|s| s.lectures.iter().map(|l| l.lecture_id.clone()))
        .collect()
}

/// Lecture after `current` in course order.
pub fn next_lecture(ordered: &[String], current: &str) -> Option<String> {
    let position = ordered.iter().position(|id| id == current)?;
    ordered.get(position + 1).cloned()
}

/// Hide video links of non-preview lectures from visitors who are not enrolled.
pub fn strip_locked_videos(outline: &mut [SectionOutline]) {
    for section in outline.iter_mut() {
        for lecture in section.lectures.iter_mut().filter(|l| !l.is_preview) {
            lecture.video_url = None;
        }
    }
}

/// Run deletes in transactions no larger than the store allows.
pub(crate) async fn delete_in_chunks(
    store: &dyn DocumentStore,
    ops: Vec<WriteOp>,
) -> Result<(), AppError> {
    let mut ops = ops;
    while !ops.is_empty() {
        let rest = ops.split_off(ops.len().min(MAX_TRANSACTION_OPS));
        store.transact(ops).await?;
        ops = rest;
    }
    Ok(())
}

pub async fn delete_section(
    store: &dyn DocumentStore,
    caller: &User,
    course_id: &str,
    section_id: &str,
) -> Result<(), AppError> {
    courses::load_editable(store, caller, course_id).await?;
    let section_key = keys::section(course_id, section_id);
    if store.get(&section_key).await?.is_none() {
        return Err(AppError::not_found("Section"));
    }

    let mut ops: Vec<WriteOp> = section_lectures(store, course_id, section_id)
        .await?
        .iter()
        .map(|l| WriteOp::Delete { key: l.key() })
        .collect();
    ops.push(WriteOp::Delete { key: section_key });

    tracing::info!(
        "Deleting section {} of course {} with {} lectures",
        section_id,
        course_id,
        ops.len() - 1
    );
    delete_in_chunks(store, ops).await
}

pub async fn delete_lecture(
    store: &dyn DocumentStore,
    caller: &User,
    course_id: &str,
    section_id: &str,
    lecture_id: &str,
) -> Result<(), AppError> {
    courses::load_editable(store, caller, course_id).await?;
    let key = keys::lecture(course_id, section_id, lecture_id);
    if store.get(&key).await?.is_none() {
        return Err(AppError::not_found("Lecture"));
    }
    store.delete(&key).await?;
    Ok(())
}
