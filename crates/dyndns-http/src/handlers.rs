//! Route handlers

use axum::Json;
use axum::extract::{ConnectInfo, Path, Query, State};
use axum::http::StatusCode;
use chrono::{DateTime, Utc};
use dyndns_core::record::{OwnerId, RecordId};
use dyndns_core::{DynamicRecord, UpdateRequest, UpdateStatus};
use serde::{Deserialize, Serialize};
use serde_json::{Value, json};
use std::net::{IpAddr, Ipv4Addr, Ipv6Addr, SocketAddr};
use tracing::debug;

use crate::AppState;
use crate::error::{ApiError, REQUEST_FAILED, UPDATE_FAILED};

/// Message for a failed update callback; identical for every cause
pub const INVALID_CREDENTIALS: &str = "Invalid domain or token.";

/// Message for an accepted update callback
pub const UPDATE_ACCEPTED: &str = "DNS record updated successfully.";

const LIMIT_REACHED: &str =
    "You have reached the maximum number of domains allowed for your subscription plan.";

type ApiResult = Result<Json<Value>, ApiError>;

#[derive(Debug, Deserialize)]
pub struct UpdateParams {
    pub domain: Option<String>,
    pub token: Option<String>,
    pub ipv4: Option<String>,
    pub ipv6: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OwnerParams {
    pub user_id: OwnerId,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateRequest {
    pub user_id: OwnerId,
    pub domain_name: String,
    #[serde(default)]
    pub zone_name: Option<String>,
}

/// A record as listed to its owner
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RecordView {
    pub id: RecordId,
    pub domain: String,
    pub ipv4: Option<Ipv4Addr>,
    pub ipv6: Option<Ipv6Addr>,
    pub created: DateTime<Utc>,
    pub last_updated: DateTime<Utc>,
    pub update_token: String,
    pub is_active: bool,
    pub update_url: String,
    pub update_count: u64,
    pub last_update_status: Option<UpdateStatus>,
    pub last_update_attempt: Option<DateTime<Utc>>,
    pub notes: Option<String>,
}

impl From<DynamicRecord> for RecordView {
    fn from(record: DynamicRecord) -> Self {
        Self {
            update_url: record.update_url(),
            id: record.id,
            domain: record.domain_name,
            ipv4: record.ipv4_address,
            ipv6: record.ipv6_address,
            created: record.created_on,
            last_updated: record.last_updated,
            update_token: record.update_token,
            is_active: record.is_active,
            update_count: record.update_count,
            last_update_status: record.last_update_status,
            last_update_attempt: record.last_update_attempt,
            notes: record.notes,
        }
    }
}

/// `GET /update?domain=&token=&ipv4=&ipv6=`
pub async fn update(
    State(state): State<AppState>,
    ConnectInfo(remote): ConnectInfo<SocketAddr>,
    Query(params): Query<UpdateParams>,
) -> ApiResult {
    let mut request = UpdateRequest::new(
        params.domain.unwrap_or_default(),
        params.token.unwrap_or_default(),
    )
    .with_observed(remote.ip());
    request.ipv4 = params.ipv4;
    request.ipv6 = params.ipv6;

    let outcome = state
        .resolver
        .apply(&request)
        .await
        .map_err(|e| ApiError::from_core(e, UPDATE_FAILED))?;

    if outcome.accepted() {
        Ok(Json(json!({ "message": UPDATE_ACCEPTED })))
    } else {
        Err(ApiError::bad_request(INVALID_CREDENTIALS))
    }
}

/// `POST /create`
pub async fn create(State(state): State<AppState>, Json(body): Json<CreateRequest>) -> ApiResult {
    let fail = |e| ApiError::from_core(e, REQUEST_FAILED);

    let current = state.service.count_records(body.user_id).await.map_err(fail)?;
    let entitlement = state.accounts.entitlement(body.user_id).await.map_err(fail)?;
    if !entitlement.allows(current) {
        debug!(
            owner_id = body.user_id,
            current,
            max = entitlement.max_domains,
            "Domain limit reached"
        );
        return Err(ApiError::bad_request(LIMIT_REACHED));
    }

    let record = state
        .service
        .create_record(body.user_id, &body.domain_name, body.zone_name.as_deref())
        .await
        .map_err(fail)?;

    Ok(Json(json!({
        "message": "Domain created successfully.",
        "domain": record.domain_name,
        "updateToken": record.update_token,
        "updateUrl": record.update_url(),
    })))
}

/// `DELETE /:id?userId=`
pub async fn delete(
    State(state): State<AppState>,
    Path(id): Path<RecordId>,
    Query(owner): Query<OwnerParams>,
) -> ApiResult {
    let deleted = state
        .service
        .delete_record(owner.user_id, id)
        .await
        .map_err(|e| ApiError::from_core(e, REQUEST_FAILED))?;

    if deleted {
        Ok(Json(json!({ "message": "Domain deleted successfully." })))
    } else {
        Err(ApiError::not_found("Failed to delete domain."))
    }
}

/// `GET /list?userId=`
pub async fn list(State(state): State<AppState>, Query(owner): Query<OwnerParams>) -> ApiResult {
    let records = state
        .service
        .list_records(owner.user_id)
        .await
        .map_err(|e| ApiError::from_core(e, REQUEST_FAILED))?;

    let domains: Vec<RecordView> = records.into_iter().map(RecordView::from).collect();
    Ok(Json(json!({ "domains": domains })))
}

/// `POST /regenerate-token/:id?userId=`
pub async fn regenerate_token(
    State(state): State<AppState>,
    Path(id): Path<RecordId>,
    Query(owner): Query<OwnerParams>,
) -> ApiResult {
    let fail = |e| ApiError::from_core(e, REQUEST_FAILED);

    if !state
        .service
        .regenerate_token(owner.user_id, id)
        .await
        .map_err(fail)?
    {
        return Err(ApiError::not_found("Failed to regenerate token."));
    }

    let record = state
        .service
        .get_record(owner.user_id, id)
        .await
        .map_err(fail)?
        .ok_or_else(|| ApiError::not_found("Failed to regenerate token."))?;

    Ok(Json(json!({
        "message": "Token regenerated successfully.",
        "updateToken": record.update_token,
        "updateUrl": record.update_url(),
    })))
}

/// `GET /client-ip`
pub async fn client_ip(ConnectInfo(remote): ConnectInfo<SocketAddr>) -> Json<Value> {
    let ip = remote.ip().to_canonical();
    Json(json!({
        "ip": ip.to_string(),
        "isIpv6": matches!(ip, IpAddr::V6(_)),
    }))
}

/// Fallback for unknown routes
pub async fn not_found() -> ApiError {
    ApiError::new(StatusCode::NOT_FOUND, "Not found.")
}
