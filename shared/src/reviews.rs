use serde::Serialize;

use crate::courses;
use crate::enrollments;
use crate::error::AppError;
use crate::store::{self, keys, DocumentStore, Filter};
use crate::types::{now_rfc3339, CreateReviewRequest, Review, User};

pub fn review_id(course_id: &str, student_id: &str) -> String {
    format!("{}_{}", course_id, student_id)
}

/// Create or replace the student's review of a course they are enrolled in.
pub async fn submit_review(
    store: &dyn DocumentStore,
    student: &User,
    course_id: &str,
    req: CreateReviewRequest,
) -> Result<Review, AppError> {
    if !(1..=5).contains(&req.rating) {
        return Err(AppError::BadRequest("rating must be between 1 and 5".to_string()));
    }
    courses::get_course(store, course_id).await?;
    if enrollments::find_enrollment(store, &student.user_id, course_id)
        .await?
        .is_none()
    {
        return Err(AppError::Forbidden(
            "Only enrolled students can review a course".to_string(),
        ));
    }

    let review = Review {
        review_id: review_id(course_id, &student.user_id),
        course_id: course_id.to_string(),
        student_id: student.user_id.clone(),
        rating: req.rating,
        comment: req.comment.filter(|c| !c.trim().is_empty()),
        created_at: now_rfc3339(),
    };
    store::save(store, &review).await?;
    Ok(review)
}

pub async fn list_course_reviews(
    store: &dyn DocumentStore,
    course_id: &str,
) -> Result<Vec<Review>, AppError> {
    let mut reviews: Vec<Review> =
        store::scan_as(store, &[Filter::eq("course_id", course_id)]).await?;
    reviews.sort_by(|a, b| b.created_at.cmp(&a.created_at));
    Ok(reviews)
}

#[derive(Debug, Serialize, PartialEq)]
pub struct RatingSummary {
    pub count: usize,
    /// Mean rating rounded to two decimals; 0 when there are no reviews.
    pub average: f64,
    /// Number of reviews per star, index 0 is one star.
    pub distribution: [usize; 5],
}

pub fn rating_summary(reviews: &[Review]) -> RatingSummary {
    let mut distribution = [0usize; 5];
    let mut total = 0u64;
    for review in reviews.iter().filter(|r| (1..=5).contains(&r.rating)) {
        distribution[usize::from(review.rating) - 1] += 1;
        total += u64::from(review.rating);
    }
    let count: usize = distribution.iter().sum();
    let average = if count == 0 {
        0.0
    } else {
        (total as f64 / count as f64 * 100.0).round() / 100.0
    };
    RatingSummary {
        count,
        average,
        distribution,
    }
}

pub async fn delete_review(store: &dyn DocumentStore, review_id: &str) -> Result<(), AppError> {
    let key = keys::review(review_id);
    if store.get(&key).await?.is_none() {
        return Err(AppError::not_found("Review"));
    }
    store.delete(&key).await?;
    tracing::info!("Review {} removed", review_id);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::tests::user;
    use crate::curriculum::tests::seed_course;
    use crate::store::MemoryStore;
    use crate::types::Role;

    fn review(rating: u8) -> Review {
        Review {
            review_id: format!("c1_s{}", rating),
            course_id: "c1".into(),
            student_id: format!("s{}", rating),
            rating,
            comment: None,
            created_at: now_rfc3339(),
        }
    }

    #[test]
    fn summary_counts_stars_and_rounds_average() {
        let reviews = vec![review(5), review(4), review(4)];
        let summary = rating_summary(&reviews);
        assert_eq!(summary.count, 3);
        assert_eq!(summary.average, 4.33);
        assert_eq!(summary.distribution, [0, 0, 0, 2, 1]);
        assert_eq!(rating_summary(&[]).average, 0.0);
    }

    #[tokio::test]
    async fn resubmitting_replaces_the_review() {
        let store = MemoryStore::new();
        let instructor = user("t1", Role::Instructor, true);
        let student = user("s1", Role::Student, false);
        seed_course(&store, &instructor, "c1", 0, &[&["a"]]).await;
        enrollments::enroll(&store, "s1", "c1").await.unwrap();

        for rating in [2, 5] {
            submit_review(
                &store,
                &student,
                "c1",
                CreateReviewRequest {
                    rating,
                    comment: Some("ok".into()),
                },
            )
            .await
            .unwrap();
        }

        let reviews = list_course_reviews(&store, "c1").await.unwrap();
        assert_eq!(reviews.len(), 1);
        assert_eq!(reviews[0].rating, 5);
        assert_eq!(reviews[0].review_id, "c1_s1");
    }

    #[tokio::test]
    async fn review_requires_enrollment_and_valid_rating() {
        let store = MemoryStore::new();
        let instructor = user("t1", Role::Instructor, true);
        let student = user("s1", Role::Student, false);
        seed_course(&store, &instructor, "c1", 0, &[&["a"]]).await;

        let not_enrolled = submit_review(
            &store,
            &student,
            "c1",
            CreateReviewRequest { rating: 4, comment: None },
        )
        .await;
        assert!(matches!(not_enrolled, Err(AppError::Forbidden(_))));

        enrollments::enroll(&store, "s1", "c1").await.unwrap();
        let out_of_range = submit_review(
            &store,
            &student,
            "c1",
            CreateReviewRequest { rating: 6, comment: None },
        )
        .await;
        assert!(matches!(out_of_range, Err(AppError::BadRequest(_))));
    }
}
