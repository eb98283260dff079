//! Instructor earnings.
//!
//! `available = round(gross * (1 - commission)) - committed payouts`, where
//! gross counts completed payments only and committed payouts are the pending
//! and approved ones. Amounts are cents, the commission is basis points.

use std::collections::{BTreeMap, BTreeSet};

use serde::Serialize;

use crate::courses;
use crate::error::AppError;
use crate::payments;
use crate::payouts;
use crate::settings::{self, MAX_BPS};
use crate::store::DocumentStore;
use crate::types::{Payment, PaymentStatus, Payout};

/// Amount left after the platform commission, rounded half up to the cent.
pub fn net_of_commission(gross_cents: i64, commission_rate_bps: u32) -> i64 {
    let keep = i64::from(MAX_BPS.saturating_sub(commission_rate_bps));
    let scale = i64::from(MAX_BPS);
    (gross_cents * keep + scale / 2).div_euclid(scale)
}

#[derive(Debug, Serialize, Clone, PartialEq)]
pub struct CourseRevenue {
    pub course_id: String,
    pub title: Option<String>,
    pub students: usize,
    pub gross_cents: i64,
}

#[derive(Debug, Serialize, Clone, PartialEq)]
pub struct RevenueSummary {
    pub gross_cents: i64,
    pub commission_rate_bps: u32,
    pub commission_cents: i64,
    pub net_cents: i64,
    pub committed_payouts_cents: i64,
    pub available_cents: i64,
    pub per_course: Vec<CourseRevenue>,
}

impl RevenueSummary {
    pub fn compute(payments: &[Payment], payouts: &[Payout], commission_rate_bps: u32) -> Self {
        let mut courses: BTreeMap<&str, (BTreeSet<&str>, i64)> = BTreeMap::new();
        let mut gross_cents = 0;
        for payment in payments.iter().filter(|p| p.status == PaymentStatus::Completed) {
            gross_cents += payment.amount_cents;
            let entry = courses.entry(payment.course_id.as_str()).or_default();
            entry.0.insert(payment.student_id.as_str());
            entry.1 += payment.amount_cents;
        }

        let net_cents = net_of_commission(gross_cents, commission_rate_bps);
        let committed_payouts_cents: i64 = payouts
            .iter()
            .filter(|p| p.status.is_committed())
            .map(|p| p.amount_cents)
            .sum();

        Self {
            gross_cents,
            commission_rate_bps,
            commission_cents: gross_cents - net_cents,
            net_cents,
            committed_payouts_cents,
            available_cents: net_cents - committed_payouts_cents,
            per_course: courses
                .into_iter()
                .map(|(course_id, (students, gross))| CourseRevenue {
                    course_id: course_id.to_string(),
                    title: None,
                    students: students.len(),
                    gross_cents: gross,
                })
                .collect(),
        }
    }
}

pub async fn instructor_revenue(
    store: &dyn DocumentStore,
    instructor_id: &str,
) -> Result<RevenueSummary, AppError> {
    let settings = settings::global_settings(store).await?;
    let payments = payments::list_instructor_payments(store, instructor_id).await?;
    let payouts = payouts::list_instructor_payouts(store, instructor_id).await?;

    let mut summary = RevenueSummary::compute(&payments, &payouts, settings.commission_rate_bps);

    let ids: Vec<String> = summary.per_course.iter().map(|c| c.course_id.clone()).collect();
    let courses = courses::courses_by_ids(store, &ids).await?;
    for entry in summary.per_course.iter_mut() {
        entry.title = courses
            .iter()
            .find(|c| c.course_id == entry.course_id)
            .map(|c| c.title.clone());
    }
    Ok(summary)
}
