use base64::{engine::general_purpose, Engine as _};
use hmac::{Hmac, Mac};
use serde::Serialize;
use sha2::Sha256;

use crate::courses;
use crate::enrollments::{self, ensure_enrollable};
use crate::error::AppError;
use crate::store::{self, DocumentStore, Filter, StoreError};
use crate::types::{new_id, now_rfc3339, Enrollment, Payment, PaymentStatus, User};

type HmacSha256 = Hmac<Sha256>;

/// Stand-in for a card processor. Charges succeed whenever a secret key is
/// configured; the receipt is an HMAC-SHA256 signature over the charge.
#[derive(Debug, Clone)]
pub struct PaymentGateway {
    secret_key: Option<String>,
}

impl PaymentGateway {
    pub fn new(secret_key: Option<String>) -> Self {
        Self { secret_key }
    }

    pub fn is_configured(&self) -> bool {
        self.secret_key.is_some()
    }

    fn sign(secret: &str, payment_id: &str, amount_cents: i64, student_id: &str) -> Result<String, AppError> {
        let message = format!("{}:{}:{}", payment_id, amount_cents, student_id);
        let mut mac = HmacSha256::new_from_slice(secret.as_bytes())
            .map_err(|e| AppError::Gateway(format!("invalid secret key: {}", e)))?;
        mac.update(message.as_bytes());
        Ok(general_purpose::STANDARD.encode(mac.finalize().into_bytes()))
    }

    /// Charge and return the receipt signature.
    pub fn charge(&self, payment_id: &str, amount_cents: i64, student_id: &str) -> Result<String, AppError> {
        let secret = self
            .secret_key
            .as_deref()
            .ok_or_else(|| AppError::Gateway("payment gateway is not configured".to_string()))?;
        Self::sign(secret, payment_id, amount_cents, student_id)
    }

    pub fn verify(&self, payment: &Payment) -> bool {
        let (Some(secret), Some(signature)) = (self.secret_key.as_deref(), payment.receipt_signature.as_deref())
        else {
            return false;
        };
        Self::sign(secret, &payment.payment_id, payment.amount_cents, &payment.student_id)
            .is_ok_and(|expected| expected == signature)
    }
}

#[derive(Debug, Serialize)]
pub struct CheckoutResult {
    /// Absent for free courses.
    pub payment: Option<Payment>,
    pub enrollment: Enrollment,
}

/// Buy a published course. The completed payment and the enrollment are
/// written in one transaction.
pub async fn checkout(
    store: &dyn DocumentStore,
    gateway: &PaymentGateway,
    currency: &str,
    student: &User,
    course_id: &str,
) -> Result<CheckoutResult, AppError> {
    let course = courses::get_course(store, course_id).await?;
    ensure_enrollable(&course, student)?;
    if enrollments::find_enrollment(store, &student.user_id, course_id)
        .await?
        .is_some()
    {
        return Err(AppError::Conflict("Already enrolled in this course".to_string()));
    }

    if course.price_cents == 0 {
        let (enrollment, _) = enrollments::enroll(store, &student.user_id, course_id).await?;
        return Ok(CheckoutResult {
            payment: None,
            enrollment,
        });
    }

    let mut payment = Payment {
        payment_id: new_id(),
        student_id: student.user_id.clone(),
        course_id: course.course_id.clone(),
        instructor_id: course.instructor_id.clone(),
        amount_cents: course.price_cents,
        currency: currency.to_string(),
        status: PaymentStatus::Pending,
        receipt_signature: None,
        created_at: now_rfc3339(),
        refunded_at: None,
    };

    match gateway.charge(&payment.payment_id, payment.amount_cents, &payment.student_id) {
        Ok(signature) => {
            payment.status = PaymentStatus::Completed;
            payment.receipt_signature = Some(signature);
        }
        Err(err) => {
            payment.status = PaymentStatus::Failed;
            store::save(store, &payment).await?;
            return Err(err);
        }
    }

    let enrollment = enrollments::new_enrollment(&student.user_id, course_id);
    let ops = vec![
        enrollments::create_op(&enrollment)?,
        store::put_op(&payment)?,
    ];
    match store.transact(ops).await {
        Ok(()) => {}
        Err(StoreError::TransactionCancelled(reason)) => {
            tracing::warn!("Checkout for {} cancelled: {}", enrollment.enrollment_id, reason);
            return Err(AppError::Conflict("Already enrolled in this course".to_string()));
        }
        Err(err) => return Err(err.into()),
    }

    tracing::info!(
        "Payment {} of {} {} completed for course {}",
        payment.payment_id,
        payment.amount_cents,
        payment.currency,
        course_id
    );
    Ok(CheckoutResult {
        payment: Some(payment),
        enrollment,
    })
}

pub async fn list_student_payments(
    store: &dyn DocumentStore,
    student_id: &str,
) -> Result<Vec<Payment>, AppError> {
    let mut payments: Vec<Payment> =
        store::scan_as(store, &[Filter::eq("student_id", student_id)]).await?;
    payments.sort_by(|a, b| b.created_at.cmp(&a.created_at));
    Ok(payments)
}

pub async fn list_instructor_payments(
    store: &dyn DocumentStore,
    instructor_id: &str,
) -> Result<Vec<Payment>, AppError> {
    let mut payments: Vec<Payment> =
        store::scan_as(store, &[Filter::eq("instructor_id", instructor_id)]).await?;
    payments.sort_by(|a, b| b.created_at.cmp(&a.created_at));
    Ok(payments)
}
