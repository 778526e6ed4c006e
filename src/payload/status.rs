//! Read-only payload workflow status (SPEC_FULL.md §6 "Workflow status
//! summarization"): per-device completeness counts and BLOCK/REUSE/MOVE
//! decision tallies. A data-producing query only; no rendering.

use sea_orm::{ColumnTrait, EntityTrait, QueryFilter};

use crate::catalog::entities::payload;
use crate::catalog::store::CatalogStore;
use crate::error::{CatalogError, PayloadResult};
use crate::payload::demotion::{Decision, DemotionPlan};

#[derive(Debug, Clone, Default)]
pub struct DecisionTally {
    pub block: i64,
    pub reuse: i64,
    pub r#move: i64,
}

#[derive(Debug, Clone)]
pub struct PayloadStatusSummary {
    pub device_id: i64,
    pub payload_count: i64,
    pub complete_count: i64,
    pub incomplete_count: i64,
    pub total_bytes: i64,
}

/// Per-device payload completeness counts (spec.md §4.8 "Payload build").
pub async fn summarize_device(store: &CatalogStore, device_id: i64) -> PayloadResult<PayloadStatusSummary> {
    let rows = payload::Entity::find()
        .filter(payload::Column::DeviceId.eq(device_id))
        .all(store.conn())
        .await
        .map_err(CatalogError::Database)?;

    let complete_count = rows.iter().filter(|p| p.status == "complete").count() as i64;
    let incomplete_count = rows.iter().filter(|p| p.status == "incomplete").count() as i64;
    let total_bytes = rows.iter().map(|p| p.total_bytes).sum();

    Ok(PayloadStatusSummary {
        device_id,
        payload_count: rows.len() as i64,
        complete_count,
        incomplete_count,
        total_bytes,
    })
}

/// Tallies a batch of demotion plans by decision, for callers that want
/// a single-line summary across a planning run.
pub fn tally_decisions(plans: &[DemotionPlan]) -> DecisionTally {
    let mut tally = DecisionTally::default();
    for plan in plans {
        match plan.decision {
            Decision::Block => tally.block += 1,
            Decision::Reuse => tally.reuse += 1,
            Decision::Move => tally.r#move += 1,
        }
    }
    tally
}
