//! Refunds resolve a support ticket: the student's payment for the ticket's
//! course is marked refunded, the enrollment is removed and the ticket is
//! closed, all in one transaction.

use serde::Serialize;
use serde_json::json;

use crate::enrollments::enrollment_id;
use crate::error::AppError;
use crate::store::{self, keys, DocumentStore, Filter, Record, WriteOp};
use crate::tickets::{self, SYSTEM_SENDER};
use crate::types::{now_rfc3339, Payment, PaymentStatus, SupportTicket, TicketStatus};

#[derive(Debug, Serialize)]
pub struct RefundOutcome {
    pub payment: Payment,
    pub ticket: SupportTicket,
}

/// Select the single completed payment a refund applies to.
pub fn refundable_payment(mut payments: Vec<Payment>) -> Result<Payment, AppError> {
    payments.retain(|p| p.status == PaymentStatus::Completed);
    match payments.len() {
        0 => Err(AppError::NotFound(
            "No completed payment found for this course".to_string(),
        )),
        1 => Ok(payments.remove(0)),
        n => Err(AppError::Conflict(format!(
            "{} completed payments match this course, refund them manually",
            n
        ))),
    }
}

pub async fn process_refund(store: &dyn DocumentStore, ticket_id: &str) -> Result<RefundOutcome, AppError> {
    let mut ticket = tickets::get_ticket(store, ticket_id).await?;
    if ticket.status == TicketStatus::Closed {
        return Err(AppError::Conflict("Ticket is already closed".to_string()));
    }
    let course_id = ticket
        .course_id
        .clone()
        .ok_or_else(|| AppError::BadRequest("Ticket does not reference a course".to_string()))?;

    let candidates: Vec<Payment> = store::scan_as(
        store,
        &[
            Filter::eq("student_id", ticket.user_id.as_str()),
            Filter::eq("course_id", course_id.as_str()),
            Filter::eq("status", PaymentStatus::Completed.as_str()),
        ],
    )
    .await?;
    let mut payment = refundable_payment(candidates)?;

    let now = now_rfc3339();
    let notice = tickets::message_for(
        &ticket,
        SYSTEM_SENDER,
        &format!(
            "Refund of {} {} issued. Access to the course has been removed.",
            payment.amount_cents, payment.currency
        ),
        &now,
    );

    store
        .transact(vec![
            WriteOp::Update {
                key: payment.key(),
                fields: store::fields([
                    ("status", json!(PaymentStatus::Refunded)),
                    ("refunded_at", json!(now)),
                ]),
            },
            WriteOp::Delete {
                key: keys::enrollment(&enrollment_id(&ticket.user_id, &course_id)),
            },
            WriteOp::Update {
                key: ticket.key(),
                fields: store::fields([
                    ("status", json!(TicketStatus::Closed)),
                    ("updated_at", json!(now)),
                ]),
            },
            store::put_op(&notice)?,
        ])
        .await?;

    tracing::info!(
        "Refunded payment {} ({} cents) for ticket {}",
        payment.payment_id,
        payment.amount_cents,
        ticket_id
    );

    payment.status = PaymentStatus::Refunded;
    payment.refunded_at = Some(now.clone());
    ticket.status = TicketStatus::Closed;
    ticket.updated_at = now;
    Ok(RefundOutcome { payment, ticket })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::tests::user;
    use crate::enrollments;
    use crate::revenue::tests::payment;
    use crate::store::MemoryStore;
    use crate::tickets::tests::request;
    use crate::types::{Role, TicketCategory};

    async fn refund_ticket(store: &MemoryStore, course_id: &str) -> SupportTicket {
        let student = user("s1", Role::Student, false);
        tickets::open_ticket(store, &student, request(TicketCategory::Refund, Some(course_id)))
            .await
            .unwrap()
    }

    #[tokio::test]
    async fn refund_updates_payment_enrollment_and_ticket() {
        let store = MemoryStore::new();
        store::save(&store, &payment("p1", "c1", "s1", 4_900, PaymentStatus::Completed))
            .await
            .unwrap();
        enrollments::enroll(&store, "s1", "c1").await.unwrap();
        let ticket = refund_ticket(&store, "c1").await;

        let outcome = process_refund(&store, &ticket.ticket_id).await.unwrap();
        assert_eq!(outcome.payment.status, PaymentStatus::Refunded);

        let stored: Payment = store::load(&store, &keys::payment("p1")).await.unwrap().unwrap();
        assert_eq!(stored.status, PaymentStatus::Refunded);
        assert!(stored.refunded_at.is_some());
        assert!(enrollments::find_enrollment(&store, "s1", "c1").await.unwrap().is_none());
        let closed = tickets::get_ticket(&store, &ticket.ticket_id).await.unwrap();
        assert_eq!(closed.status, TicketStatus::Closed);

        let again = process_refund(&store, &ticket.ticket_id).await;
        assert!(matches!(again, Err(AppError::Conflict(_))));
    }

    #[tokio::test]
    async fn refund_without_payment_is_not_found_and_changes_nothing() {
        let store = MemoryStore::new();
        enrollments::enroll(&store, "s1", "c1").await.unwrap();
        let ticket = refund_ticket(&store, "c1").await;

        let result = process_refund(&store, &ticket.ticket_id).await;
        assert!(matches!(result, Err(AppError::NotFound(_))));
        assert!(enrollments::find_enrollment(&store, "s1", "c1").await.unwrap().is_some());
        let open = tickets::get_ticket(&store, &ticket.ticket_id).await.unwrap();
        assert_eq!(open.status, TicketStatus::Open);
    }

    #[test]
    fn several_completed_payments_are_ambiguous() {
        let payments = vec![
            payment("p1", "c1", "s1", 100, PaymentStatus::Completed),
            payment("p2", "c1", "s1", 100, PaymentStatus::Completed),
            payment("p3", "c1", "s1", 100, PaymentStatus::Refunded),
        ];
        assert!(matches!(refundable_payment(payments), Err(AppError::Conflict(_))));
    }
}
