//! Campaign CRUD and recipient management handlers

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    Json,
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::info;
use uuid::Uuid;
use wacast_common::types::{CampaignKind, PlanTier, Provider};
use wacast_storage::models::{
    Campaign, CampaignRecipient, CampaignStatus, CreateCampaign, CreateRecipient, UpdateCampaign,
};
use wacast_storage::repository::{CampaignRepository, RecipientRepository};

use super::{internal_reply, ErrorResponse};
use crate::state::AppState;

/// Query parameters for listing campaigns
#[derive(Debug, Deserialize)]
pub struct ListCampaignsQuery {
    pub status: Option<String>,
    #[serde(default = "default_limit")]
    pub limit: i64,
    #[serde(default)]
    pub offset: i64,
}

fn default_limit() -> i64 {
    50
}

/// Campaign response
#[derive(Debug, Serialize)]
pub struct CampaignResponse {
    pub id: Uuid,
    pub name: String,
    pub kind: String,
    pub provider: String,
    pub sender_id: Option<String>,
    pub template_name: String,
    pub template_language: String,
    pub header_media_url: Option<String>,
    pub plan_tier: String,
    pub status: String,
    pub sent_count: i32,
    pub failed_count: i32,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl From<Campaign> for CampaignResponse {
    fn from(c: Campaign) -> Self {
        Self {
            id: c.id,
            name: c.name,
            kind: c.kind,
            provider: c.provider,
            sender_id: c.sender_id,
            template_name: c.template_name,
            template_language: c.template_language,
            header_media_url: c.header_media_url,
            plan_tier: c.plan_tier,
            status: c.status,
            sent_count: c.sent_count,
            failed_count: c.failed_count,
            created_at: c.created_at,
            updated_at: c.updated_at,
        }
    }
}

/// Campaign list response
#[derive(Debug, Serialize)]
pub struct CampaignListResponse {
    pub data: Vec<CampaignResponse>,
    pub total: i64,
    pub limit: i64,
    pub offset: i64,
}

/// Request body for creating a campaign
#[derive(Debug, Deserialize)]
pub struct CreateCampaignRequest {
    pub name: String,
    pub kind: CampaignKind,
    pub provider: Provider,
    pub sender_id: Option<String>,
    pub template_name: String,
    pub template_language: String,
    pub template_snapshot: Option<serde_json::Value>,
    pub header_media_url: Option<String>,
    pub variable_mappings: Option<serde_json::Value>,
    pub plan_tier: Option<PlanTier>,
}

/// Request body for updating a draft campaign
#[derive(Debug, Deserialize)]
pub struct UpdateCampaignRequest {
    pub name: Option<String>,
    pub sender_id: Option<String>,
    pub template_name: Option<String>,
    pub template_language: Option<String>,
    pub header_media_url: Option<String>,
    pub variable_mappings: Option<serde_json::Value>,
    pub plan_tier: Option<PlanTier>,
}

fn validation_error(message: &str) -> (StatusCode, Json<ErrorResponse>) {
    (
        StatusCode::UNPROCESSABLE_ENTITY,
        Json(ErrorResponse {
            error: "validation_error".to_string(),
            message: message.to_string(),
        }),
    )
}

fn not_found(what: &str) -> (StatusCode, Json<ErrorResponse>) {
    (
        StatusCode::NOT_FOUND,
        Json(ErrorResponse {
            error: "not_found".to_string(),
            message: format!("{} not found", what),
        }),
    )
}

/// List campaigns for a tenant
///
/// GET /api/v1/tenants/:tenant_id/campaigns
pub async fn list_campaigns(
    State(state): State<Arc<AppState>>,
    Path(tenant_id): Path<Uuid>,
    Query(query): Query<ListCampaignsQuery>,
) -> Result<Json<CampaignListResponse>, (StatusCode, Json<ErrorResponse>)> {
    let repo = CampaignRepository::new(state.db_pool.pool().clone());
    let status = query.status.and_then(|s| s.parse::<CampaignStatus>().ok());

    let campaigns = repo
        .list_by_tenant(tenant_id, status, query.limit, query.offset)
        .await
        .map_err(|e| internal_reply("Failed to list campaigns", e))?;
    let total = repo.count_by_tenant(tenant_id, status).await.unwrap_or(0);

    Ok(Json(CampaignListResponse {
        data: campaigns.into_iter().map(CampaignResponse::from).collect(),
        total,
        limit: query.limit,
        offset: query.offset,
    }))
}

/// Create a draft campaign
///
/// POST /api/v1/tenants/:tenant_id/campaigns
pub async fn create_campaign(
    State(state): State<Arc<AppState>>,
    Path(tenant_id): Path<Uuid>,
    Json(input): Json<CreateCampaignRequest>,
) -> Result<(StatusCode, Json<CampaignResponse>), (StatusCode, Json<ErrorResponse>)> {
    if input.name.trim().is_empty() {
        return Err(validation_error("Campaign name is required"));
    }
    if input.template_name.trim().is_empty() {
        return Err(validation_error("Template name is required"));
    }
    if input.kind != CampaignKind::Text && input.header_media_url.is_none() {
        return Err(validation_error(
            "Media campaigns require a header media URL",
        ));
    }

    let repo = CampaignRepository::new(state.db_pool.pool().clone());
    let campaign = repo
        .create(CreateCampaign {
            tenant_id,
            name: input.name,
            kind: input.kind,
            provider: input.provider,
            sender_id: input.sender_id,
            template_name: input.template_name,
            template_language: input.template_language,
            template_snapshot: input.template_snapshot,
            header_media_url: input.header_media_url,
            variable_mappings: input.variable_mappings,
            plan_tier: input.plan_tier,
        })
        .await
        .map_err(|e| internal_reply("Failed to create campaign", e))?;

    info!(campaign_id = %campaign.id, %tenant_id, "Created campaign");
    Ok((StatusCode::CREATED, Json(campaign.into())))
}

/// Get one campaign
///
/// GET /api/v1/tenants/:tenant_id/campaigns/:campaign_id
pub async fn get_campaign(
    State(state): State<Arc<AppState>>,
    Path((tenant_id, campaign_id)): Path<(Uuid, Uuid)>,
) -> Result<Json<CampaignResponse>, (StatusCode, Json<ErrorResponse>)> {
    let repo = CampaignRepository::new(state.db_pool.pool().clone());
    let campaign = repo
        .get_by_tenant(tenant_id, campaign_id)
        .await
        .map_err(|e| internal_reply("Failed to load campaign", e))?
        .ok_or_else(|| not_found("Campaign"))?;

    Ok(Json(campaign.into()))
}

/// Update a draft campaign
///
/// PATCH /api/v1/tenants/:tenant_id/campaigns/:campaign_id
pub async fn update_campaign(
    State(state): State<Arc<AppState>>,
    Path((tenant_id, campaign_id)): Path<(Uuid, Uuid)>,
    Json(input): Json<UpdateCampaignRequest>,
) -> Result<Json<CampaignResponse>, (StatusCode, Json<ErrorResponse>)> {
    let repo = CampaignRepository::new(state.db_pool.pool().clone());

    let current = repo
        .get_by_tenant(tenant_id, campaign_id)
        .await
        .map_err(|e| internal_reply("Failed to load campaign", e))?
        .ok_or_else(|| not_found("Campaign"))?;

    if current.status_enum() != Some(CampaignStatus::Draft) {
        return Err((
            StatusCode::CONFLICT,
            Json(ErrorResponse {
                error: "conflict".to_string(),
                message: format!("Campaign is {}, only drafts can be edited", current.status),
            }),
        ));
    }

    let updated = repo
        .update(
            campaign_id,
            tenant_id,
            UpdateCampaign {
                name: input.name,
                sender_id: input.sender_id,
                template_name: input.template_name,
                template_language: input.template_language,
                header_media_url: input.header_media_url,
                variable_mappings: input.variable_mappings,
                plan_tier: input.plan_tier,
            },
        )
        .await
        .map_err(|e| internal_reply("Failed to update campaign", e))?
        .ok_or_else(|| not_found("Campaign"))?;

    Ok(Json(updated.into()))
}

/// Delete a draft campaign that has never sent
///
/// DELETE /api/v1/tenants/:tenant_id/campaigns/:campaign_id
pub async fn delete_campaign(
    State(state): State<Arc<AppState>>,
    Path((tenant_id, campaign_id)): Path<(Uuid, Uuid)>,
) -> Result<StatusCode, (StatusCode, Json<ErrorResponse>)> {
    let repo = CampaignRepository::new(state.db_pool.pool().clone());
    let deleted = repo
        .delete(campaign_id, tenant_id)
        .await
        .map_err(|e| internal_reply("Failed to delete campaign", e))?;

    if deleted {
        info!(%campaign_id, "Deleted campaign");
        Ok(StatusCode::NO_CONTENT)
    } else {
        Err((
            StatusCode::CONFLICT,
            Json(ErrorResponse {
                error: "conflict".to_string(),
                message: "Only draft campaigns without send history can be deleted".to_string(),
            }),
        ))
    }
}

/// One recipient in an add-recipients request
#[derive(Debug, Deserialize)]
pub struct RecipientInput {
    pub contact_id: Option<Uuid>,
    pub audience_member_id: Option<Uuid>,
    pub phone: Option<String>,
    pub attributes: Option<serde_json::Value>,
}

#[derive(Debug, Deserialize)]
pub struct AddRecipientsRequest {
    pub recipients: Vec<RecipientInput>,
}

#[derive(Debug, Serialize)]
pub struct AddRecipientsResponse {
    pub added: u64,
}

/// Add recipients to a draft campaign
///
/// POST /api/v1/tenants/:tenant_id/campaigns/:campaign_id/recipients
pub async fn add_recipients(
    State(state): State<Arc<AppState>>,
    Path((tenant_id, campaign_id)): Path<(Uuid, Uuid)>,
    Json(input): Json<AddRecipientsRequest>,
) -> Result<(StatusCode, Json<AddRecipientsResponse>), (StatusCode, Json<ErrorResponse>)> {
    if input.recipients.is_empty() {
        return Err(validation_error("At least one recipient is required"));
    }

    let campaigns = CampaignRepository::new(state.db_pool.pool().clone());
    let campaign = campaigns
        .get_by_tenant(tenant_id, campaign_id)
        .await
        .map_err(|e| internal_reply("Failed to load campaign", e))?
        .ok_or_else(|| not_found("Campaign"))?;

    if campaign.status_enum() != Some(CampaignStatus::Draft) {
        return Err((
            StatusCode::CONFLICT,
            Json(ErrorResponse {
                error: "conflict".to_string(),
                message: "Recipients can only be added to draft campaigns".to_string(),
            }),
        ));
    }

    let repo = RecipientRepository::new(state.db_pool.pool().clone());
    let inputs: Vec<CreateRecipient> = input
        .recipients
        .into_iter()
        .map(|r| CreateRecipient {
            campaign_id,
            tenant_id,
            contact_id: r.contact_id,
            audience_member_id: r.audience_member_id,
            phone: r.phone,
            attributes: r.attributes,
        })
        .collect();

    let added = repo
        .create_batch(inputs)
        .await
        .map_err(|e| internal_reply("Failed to add recipients", e))?;

    info!(%campaign_id, added, "Added recipients");
    Ok((StatusCode::CREATED, Json(AddRecipientsResponse { added })))
}

/// Query parameters for listing recipients
#[derive(Debug, Deserialize)]
pub struct ListRecipientsQuery {
    #[serde(default = "default_limit")]
    pub limit: i64,
    #[serde(default)]
    pub offset: i64,
}

/// Recipient response
#[derive(Debug, Serialize)]
pub struct RecipientResponse {
    pub id: Uuid,
    pub phone: Option<String>,
    pub attributes: serde_json::Value,
    pub resolved_parameters: Option<serde_json::Value>,
    pub resolved_button_vars: Option<serde_json::Value>,
    pub materialized_at: Option<DateTime<Utc>>,
    pub delivery_status: String,
    pub last_sent_at: Option<DateTime<Utc>>,
}

impl From<CampaignRecipient> for RecipientResponse {
    fn from(r: CampaignRecipient) -> Self {
        Self {
            id: r.id,
            phone: r.phone,
            attributes: r.attributes,
            resolved_parameters: r.resolved_parameters,
            resolved_button_vars: r.resolved_button_vars,
            materialized_at: r.materialized_at,
            delivery_status: r.delivery_status,
            last_sent_at: r.last_sent_at,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct RecipientListResponse {
    pub data: Vec<RecipientResponse>,
    pub total: i64,
}

/// List recipients of a campaign in dispatch order
///
/// GET /api/v1/tenants/:tenant_id/campaigns/:campaign_id/recipients
pub async fn list_recipients(
    State(state): State<Arc<AppState>>,
    Path((tenant_id, campaign_id)): Path<(Uuid, Uuid)>,
    Query(query): Query<ListRecipientsQuery>,
) -> Result<Json<RecipientListResponse>, (StatusCode, Json<ErrorResponse>)> {
    let campaigns = CampaignRepository::new(state.db_pool.pool().clone());
    campaigns
        .get_by_tenant(tenant_id, campaign_id)
        .await
        .map_err(|e| internal_reply("Failed to load campaign", e))?
        .ok_or_else(|| not_found("Campaign"))?;

    let repo = RecipientRepository::new(state.db_pool.pool().clone());
    let recipients = repo
        .list_by_campaign(campaign_id, query.limit, query.offset)
        .await
        .map_err(|e| internal_reply("Failed to list recipients", e))?;
    let total = repo.count_by_campaign(campaign_id).await.unwrap_or(0);

    Ok(Json(RecipientListResponse {
        data: recipients.into_iter().map(RecipientResponse::from).collect(),
        total,
    }))
}
