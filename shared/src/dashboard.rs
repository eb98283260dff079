use std::collections::BTreeMap;

use serde::Serialize;

use crate::courses;
use crate::error::AppError;
use crate::revenue::{self, net_of_commission, RevenueSummary};
use crate::reviews::{rating_summary, RatingSummary};
use crate::settings;
use crate::store::{self, DocumentStore, Filter};
use crate::types::{
    Course, Enrollment, Payment, PaymentStatus, Payout, PayoutStatus, Review, Role, SupportTicket,
    TicketStatus, User,
};

#[derive(Debug, Serialize, PartialEq)]
pub struct PlatformOverview {
    pub users_by_role: BTreeMap<String, usize>,
    pub pending_instructor_approvals: usize,
    pub courses_by_status: BTreeMap<String, usize>,
    pub total_enrollments: usize,
    pub gross_revenue_cents: i64,
    pub platform_commission_cents: i64,
    pub refunded_cents: i64,
    pub pending_payouts: usize,
    pub pending_payouts_cents: i64,
    pub open_tickets: usize,
}

pub struct PlatformData<'a> {
    pub users: &'a [User],
    pub courses: &'a [Course],
    pub enrollments: usize,
    pub payments: &'a [Payment],
    pub payouts: &'a [Payout],
    pub tickets: &'a [SupportTicket],
}

impl PlatformOverview {
    pub fn compute(data: PlatformData<'_>, commission_rate_bps: u32) -> Self {
        let mut users_by_role = BTreeMap::new();
        for user in data.users {
            *users_by_role.entry(user.role.as_str().to_string()).or_insert(0) += 1;
        }
        let mut courses_by_status = BTreeMap::new();
        for course in data.courses {
            *courses_by_status
                .entry(course.status.as_str().to_string())
                .or_insert(0) += 1;
        }

        let sum = |status: PaymentStatus| -> i64 {
            data.payments
                .iter()
                .filter(|p| p.status == status)
                .map(|p| p.amount_cents)
                .sum()
        };
        let gross_revenue_cents = sum(PaymentStatus::Completed);
        let pending: Vec<&Payout> = data
            .payouts
            .iter()
            .filter(|p| p.status == PayoutStatus::EnAttente)
            .collect();

        Self {
            users_by_role,
            pending_instructor_approvals: data
                .users
                .iter()
                .filter(|u| u.role == Role::Instructor && !u.is_approved)
                .count(),
            courses_by_status,
            total_enrollments: data.enrollments,
            gross_revenue_cents,
            platform_commission_cents: gross_revenue_cents
                - net_of_commission(gross_revenue_cents, commission_rate_bps),
            refunded_cents: sum(PaymentStatus::Refunded),
            pending_payouts: pending.len(),
            pending_payouts_cents: pending.iter().map(|p| p.amount_cents).sum(),
            open_tickets: data
                .tickets
                .iter()
                .filter(|t| t.status != TicketStatus::Closed)
                .count(),
        }
    }
}

pub async fn platform_overview(store: &dyn DocumentStore) -> Result<PlatformOverview, AppError> {
    let settings = settings::global_settings(store).await?;
    let users: Vec<User> = store::scan_as(store, &[]).await?;
    let courses: Vec<Course> = store::scan_as(store, &[]).await?;
    let enrollments = store.scan("enrollment", &[]).await?.len();
    let payments: Vec<Payment> = store::scan_as(store, &[]).await?;
    let payouts: Vec<Payout> = store::scan_as(store, &[]).await?;
    let tickets: Vec<SupportTicket> = store::scan_as(store, &[]).await?;

    Ok(PlatformOverview::compute(
        PlatformData {
            users: &users,
            courses: &courses,
            enrollments,
            payments: &payments,
            payouts: &payouts,
            tickets: &tickets,
        },
        settings.commission_rate_bps,
    ))
}

#[derive(Debug, Serialize)]
pub struct CourseStats {
    pub course: Course,
    pub students: usize,
    pub average_progress: u8,
    pub completions: usize,
    pub rating: RatingSummary,
}

#[derive(Debug, Serialize)]
pub struct InstructorDashboard {
    pub courses: Vec<CourseStats>,
    pub revenue: RevenueSummary,
}

pub fn course_stats(course: Course, enrollments: &[Enrollment], reviews: &[Review]) -> CourseStats {
    let students = enrollments.len();
    let total: usize = enrollments.iter().map(|e| usize::from(e.progress)).sum();
    let average_progress = if students == 0 {
        0
    } else {
        ((total * 2 + students) / (2 * students)).min(100) as u8
    };
    CourseStats {
        course,
        students,
        average_progress,
        completions: enrollments.iter().filter(|e| e.progress == 100).count(),
        rating: rating_summary(reviews),
    }
}

pub async fn instructor_dashboard(
    store: &dyn DocumentStore,
    instructor_id: &str,
) -> Result<InstructorDashboard, AppError> {
    let courses = courses::list_instructor_courses(store, instructor_id).await?;
    let ids: Vec<serde_json::Value> = courses
        .iter()
        .map(|c| serde_json::Value::String(c.course_id.clone()))
        .collect();

    let (enrollments, reviews): (Vec<Enrollment>, Vec<Review>) = if ids.is_empty() {
        (Vec::new(), Vec::new())
    } else {
        (
            store::scan_as(store, &[Filter::one_of("course_id", ids.clone())]).await?,
            store::scan_as(store, &[Filter::one_of("course_id", ids)]).await?,
        )
    };

    let stats = courses
        .into_iter()
        .map(|course| {
            let course_enrollments: Vec<Enrollment> = enrollments
                .iter()
                .filter(|e| e.course_id == course.course_id)
                .cloned()
                .collect();
            let course_reviews: Vec<Review> = reviews
                .iter()
                .filter(|r| r.course_id == course.course_id)
                .cloned()
                .collect();
            course_stats(course, &course_enrollments, &course_reviews)
        })
        .collect();

    Ok(InstructorDashboard {
        courses: stats,
        revenue: revenue::instructor_revenue(store, instructor_id).await?,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::tests::user;
    use crate::courses::tests::course;
    use crate::enrollments;
    use crate::revenue::tests::{payment, payout};
    use crate::store::MemoryStore;
    use crate::types::CourseStatus;

    #[test]
    fn overview_counts_by_role_and_status() {
        let users = vec![
            user("a", Role::Admin, false),
            user("t", Role::Instructor, true),
            user("u", Role::Instructor, false),
            user("s", Role::Student, false),
        ];
        let courses = vec![
            course("c1", "t", 0),
            Course {
                status: CourseStatus::Draft,
                ..course("c2", "t", 0)
            },
        ];
        let payments = vec![
            payment("p1", "c1", "s", 10_000, PaymentStatus::Completed),
            payment("p2", "c1", "s", 2_000, PaymentStatus::Refunded),
        ];
        let payouts = vec![
            payout("o1", 5_000, PayoutStatus::EnAttente),
            payout("o2", 1_000, PayoutStatus::Valide),
        ];

        let overview = PlatformOverview::compute(
            PlatformData {
                users: &users,
                courses: &courses,
                enrollments: 3,
                payments: &payments,
                payouts: &payouts,
                tickets: &[],
            },
            1500,
        );
        assert_eq!(overview.users_by_role["instructor"], 2);
        assert_eq!(overview.pending_instructor_approvals, 1);
        assert_eq!(overview.courses_by_status["Draft"], 1);
        assert_eq!(overview.gross_revenue_cents, 10_000);
        assert_eq!(overview.platform_commission_cents, 1_500);
        assert_eq!(overview.refunded_cents, 2_000);
        assert_eq!(overview.pending_payouts, 1);
        assert_eq!(overview.pending_payouts_cents, 5_000);
    }

    #[tokio::test]
    async fn instructor_dashboard_groups_students_per_course() {
        let store = MemoryStore::new();
        store::save(&store, &course("c1", "t1", 0)).await.unwrap();
        store::save(&store, &course("c2", "t1", 0)).await.unwrap();
        store::save(&store, &course("other", "t2", 0)).await.unwrap();
        enrollments::enroll(&store, "s1", "c1").await.unwrap();
        enrollments::enroll(&store, "s2", "c1").await.unwrap();
        enrollments::enroll(&store, "s3", "other").await.unwrap();

        let dashboard = instructor_dashboard(&store, "t1").await.unwrap();
        assert_eq!(dashboard.courses.len(), 2);
        let c1 = dashboard
            .courses
            .iter()
            .find(|s| s.course.course_id == "c1")
            .unwrap();
        assert_eq!(c1.students, 2);
        assert_eq!(c1.average_progress, 0);
        assert_eq!(dashboard.revenue.gross_cents, 0);
    }
}
