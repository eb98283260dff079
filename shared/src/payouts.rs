use serde_json::json;

use crate::auth::require_instructor;
use crate::error::AppError;
use crate::revenue;
use crate::settings;
use crate::store::{self, keys, DocumentStore, Filter};
use crate::types::{new_id, now_rfc3339, Payout, PayoutRequest, PayoutStatus, ReviewPayoutRequest, User};

/// A payout must be at least the platform minimum and no more than the
/// instructor's available balance.
pub fn validate_payout(amount_cents: i64, minimum_cents: i64, available_cents: i64) -> Result<(), AppError> {
    if amount_cents <= 0 {
        return Err(AppError::BadRequest("Payout amount must be positive".to_string()));
    }
    if amount_cents < minimum_cents {
        return Err(AppError::BadRequest(format!(
            "Minimum payout is {} cents",
            minimum_cents
        )));
    }
    if amount_cents > available_cents {
        return Err(AppError::BadRequest(format!(
            "Requested {} cents but only {} cents are available",
            amount_cents, available_cents
        )));
    }
    Ok(())
}

pub async fn request_payout(
    store: &dyn DocumentStore,
    instructor: &User,
    req: PayoutRequest,
) -> Result<Payout, AppError> {
    require_instructor(instructor)?;
    let settings = settings::global_settings(store).await?;
    let summary = revenue::instructor_revenue(store, &instructor.user_id).await?;
    validate_payout(req.amount_cents, settings.minimum_payout_cents, summary.available_cents)?;

    let payout = Payout {
        payout_id: new_id(),
        instructor_id: instructor.user_id.clone(),
        amount_cents: req.amount_cents,
        status: PayoutStatus::EnAttente,
        method: req.method,
        note: None,
        requested_at: now_rfc3339(),
        reviewed_at: None,
    };
    store::save(store, &payout).await?;

    tracing::info!(
        "Payout {} of {} cents requested by {}",
        payout.payout_id,
        payout.amount_cents,
        instructor.user_id
    );
    Ok(payout)
}

pub async fn list_instructor_payouts(
    store: &dyn DocumentStore,
    instructor_id: &str,
) -> Result<Vec<Payout>, AppError> {
    let mut payouts: Vec<Payout> =
        store::scan_as(store, &[Filter::eq("instructor_id", instructor_id)]).await?;
    payouts.sort_by(|a, b| b.requested_at.cmp(&a.requested_at));
    Ok(payouts)
}

pub async fn list_payouts(
    store: &dyn DocumentStore,
    status: Option<PayoutStatus>,
) -> Result<Vec<Payout>, AppError> {
    let filters: Vec<Filter> = status
        .map(|s| vec![Filter::eq("status", s.as_str())])
        .unwrap_or_default();
    let mut payouts: Vec<Payout> = store::scan_as(store, &filters).await?;
    payouts.sort_by(|a, b| b.requested_at.cmp(&a.requested_at));
    Ok(payouts)
}

/// Approve or reject a pending payout.
pub async fn review_payout(
    store: &dyn DocumentStore,
    payout_id: &str,
    req: ReviewPayoutRequest,
) -> Result<Payout, AppError> {
    let key = keys::payout(payout_id);
    let payout: Payout = store::load(store, &key)
        .await?
        .ok_or_else(|| AppError::not_found("Payout"))?;
    if payout.status != PayoutStatus::EnAttente {
        return Err(AppError::Conflict(format!(
            "Payout is already {}",
            payout.status.as_str()
        )));
    }

    let status = if req.approve {
        PayoutStatus::Valide
    } else {
        PayoutStatus::Rejete
    };
    let mut patch = store::fields([
        ("status", json!(status)),
        ("reviewed_at", json!(now_rfc3339())),
    ]);
    if let Some(note) = req.note {
        patch.insert("note".to_string(), json!(note));
    }

    let doc = store
        .update(&key, patch)
        .await?
        .ok_or_else(|| AppError::not_found("Payout"))?;
    tracing::info!("Payout {} marked {}", payout_id, status.as_str());
    Ok(store::decode(doc)?)
}
