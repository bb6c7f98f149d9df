//! Dispatch planning.
//!
//! A dispatch plan is a transient, read-only projection of how a campaign
//! would be sent under its throttle tier: batch boundaries, start offsets and
//! payload size estimates. Plans are recomputed on demand and never stored.

use serde::Serialize;
use wacast_common::types::{CampaignId, PlanTier, TenantId};
use wacast_common::Error;

use crate::materialize::{MaterializationEngine, MaterializedRow};
use crate::template::TemplateMeta;

/// Fixed per-message envelope overhead added to every row estimate (bytes)
const ENVELOPE_OVERHEAD: usize = 64;

/// Average row size above which the plan carries a size warning (bytes)
const ROW_SIZE_WARN: usize = 2000;

/// Total plan size above which the plan carries a size warning (bytes)
const PLAN_SIZE_WARN: usize = 5 * 1024 * 1024;

/// One planned batch of recipients
#[derive(Debug, Clone, Serialize)]
pub struct PlanBatch {
    /// 1-based batch number
    pub number: usize,
    /// Index of the first recipient in this batch
    pub start_index: usize,
    pub recipient_count: usize,
    /// Seconds after dispatch start at which this batch becomes eligible
    pub offset_seconds: u64,
    pub estimated_bytes: usize,
}

/// A transient dispatch plan for one campaign
#[derive(Debug, Clone, Serialize)]
pub struct DispatchPlan {
    pub campaign_id: CampaignId,
    pub tier: PlanTier,
    pub max_batch_size: usize,
    pub max_per_minute: usize,
    pub total_recipients: usize,
    pub batch_count: usize,
    pub batches_per_minute: usize,
    pub estimated_minutes: usize,
    pub estimated_total_bytes: usize,
    pub batches: Vec<PlanBatch>,
    pub warnings: Vec<String>,
}

/// Estimated wire size of one materialized row
pub fn row_bytes(row: &MaterializedRow, template: &TemplateMeta) -> usize {
    let params: usize = row.parameters.iter().map(String::len).sum();
    let vars: usize = row.button_vars.values().map(String::len).sum();
    let button_text: usize = template.buttons.iter().map(|b| b.text.len()).sum();
    params + vars + button_text + ENVELOPE_OVERHEAD
}

/// Compute a dispatch plan from materialized rows. Pure.
pub fn compute_plan(
    campaign_id: CampaignId,
    tier: PlanTier,
    template: &TemplateMeta,
    rows: &[MaterializedRow],
) -> DispatchPlan {
    let (max_batch_size, max_per_minute) = tier.limits();
    let total = rows.len();

    let batch_count = total.div_ceil(max_batch_size);
    let batches_per_minute = std::cmp::max(1, max_per_minute / max_batch_size);
    let estimated_minutes = total.div_ceil(max_per_minute);

    let mut warnings = Vec::new();
    if total == 0 {
        warnings.push("Campaign has no recipients".to_string());
    }
    let missing_phone = rows.iter().filter(|r| r.phone.is_none()).count();
    if missing_phone > 0 {
        warnings.push(format!(
            "{} recipient(s) have no phone number and will fail",
            missing_phone
        ));
    }
    if max_per_minute < 30 {
        warnings.push(format!(
            "Throttle of {} messages per minute is unusually low",
            max_per_minute
        ));
    }

    let mut batches = Vec::with_capacity(batch_count);
    let mut total_bytes = 0usize;
    for b in 0..batch_count {
        let start = b * max_batch_size;
        let end = std::cmp::min(start + max_batch_size, total);
        let bytes: usize = rows[start..end]
            .iter()
            .map(|r| row_bytes(r, template))
            .sum();
        total_bytes += bytes;

        batches.push(PlanBatch {
            number: b + 1,
            start_index: start,
            recipient_count: end - start,
            offset_seconds: (b / batches_per_minute) as u64 * 60,
            estimated_bytes: bytes,
        });
    }

    if total > 0 && total_bytes / total > ROW_SIZE_WARN {
        warnings.push(format!(
            "Average message size {} bytes exceeds {} bytes",
            total_bytes / total,
            ROW_SIZE_WARN
        ));
    }
    if total_bytes > PLAN_SIZE_WARN {
        warnings.push(format!(
            "Estimated plan size {} bytes exceeds {} bytes",
            total_bytes, PLAN_SIZE_WARN
        ));
    }

    DispatchPlan {
        campaign_id,
        tier,
        max_batch_size,
        max_per_minute,
        total_recipients: total,
        batch_count,
        batches_per_minute,
        estimated_minutes,
        estimated_total_bytes: total_bytes,
        batches,
        warnings,
    }
}

/// Planner service: materializes rows read-only and computes the plan
pub struct DispatchPlanner {
    engine: std::sync::Arc<MaterializationEngine>,
}

impl DispatchPlanner {
    pub fn new(engine: std::sync::Arc<MaterializationEngine>) -> Self {
        Self { engine }
    }

    pub async fn plan(
        &self,
        tenant_id: TenantId,
        campaign_id: CampaignId,
        limit: i64,
    ) -> Result<DispatchPlan, Error> {
        let campaign = self.engine.load_campaign(tenant_id, campaign_id).await?;
        let tier = campaign.plan_tier_enum();
        let materialized = self.engine.preview(tenant_id, campaign_id, limit, 0).await?;

        Ok(compute_plan(
            campaign_id,
            tier,
            &materialized.template,
            &materialized.rows,
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::template::HeaderType;
    use pretty_assertions::assert_eq;
    use std::collections::BTreeMap;
    use uuid::Uuid;

    fn template() -> TemplateMeta {
        TemplateMeta {
            name: "t".to_string(),
            language: "en".to_string(),
            placeholder_count: 1,
            header_type: HeaderType::None,
            header_text: None,
            buttons: Vec::new(),
        }
    }

    fn rows(n: usize) -> Vec<MaterializedRow> {
        (0..n)
            .map(|i| MaterializedRow {
                recipient_id: Uuid::new_v4(),
                phone: Some(format!("+4917055501{:02}", i % 100)),
                parameters: vec!["hello".to_string()],
                button_vars: BTreeMap::new(),
                errors: Vec::new(),
                warnings: Vec::new(),
            })
            .collect()
    }

    #[test]
    fn test_basic_tier_130_recipients() {
        let plan = compute_plan(Uuid::new_v4(), PlanTier::Basic, &template(), &rows(130));

        assert_eq!(plan.batch_count, 6);
        assert_eq!(plan.batches_per_minute, 4);
        assert_eq!(plan.estimated_minutes, 2);

        let offsets: Vec<u64> = plan.batches.iter().map(|b| b.offset_seconds).collect();
        assert_eq!(offsets, vec![0, 0, 0, 0, 60, 60]);

        let counts: Vec<usize> = plan.batches.iter().map(|b| b.recipient_count).collect();
        assert_eq!(counts, vec![25, 25, 25, 25, 25, 5]);
    }

    #[test]
    fn test_conservation() {
        for total in [1usize, 24, 25, 26, 99, 100, 101, 1000] {
            for tier in [PlanTier::Basic, PlanTier::Smart, PlanTier::Advanced] {
                let plan = compute_plan(Uuid::new_v4(), tier, &template(), &rows(total));
                let sum: usize = plan.batches.iter().map(|b| b.recipient_count).sum();
                assert_eq!(sum, total, "tier {:?} total {}", tier, total);
            }
        }
    }

    #[test]
    fn test_offsets_monotonic() {
        let plan = compute_plan(Uuid::new_v4(), PlanTier::Smart, &template(), &rows(777));
        let offsets: Vec<u64> = plan.batches.iter().map(|b| b.offset_seconds).collect();
        let mut sorted = offsets.clone();
        sorted.sort_unstable();
        assert_eq!(offsets, sorted);
    }

    #[test]
    fn test_empty_campaign_warns() {
        let plan = compute_plan(Uuid::new_v4(), PlanTier::Basic, &template(), &[]);
        assert_eq!(plan.batch_count, 0);
        assert_eq!(plan.estimated_minutes, 0);
        assert!(plan.warnings.iter().any(|w| w.contains("no recipients")));
    }

    #[test]
    fn test_missing_phone_warns() {
        let mut r = rows(3);
        r[1].phone = None;
        let plan = compute_plan(Uuid::new_v4(), PlanTier::Basic, &template(), &r);
        assert!(plan.warnings.iter().any(|w| w.contains("phone")));
    }

    #[test]
    fn test_large_rows_warn() {
        let mut r = rows(2);
        for row in &mut r {
            row.parameters = vec!["x".repeat(3000)];
        }
        let plan = compute_plan(Uuid::new_v4(), PlanTier::Basic, &template(), &r);
        assert!(plan.warnings.iter().any(|w| w.contains("Average message size")));
    }

    #[test]
    fn test_row_bytes_envelope() {
        let r = &rows(1)[0];
        assert_eq!(row_bytes(r, &template()), "hello".len() + 64);
    }
}
