use std::net::SocketAddr;

use axum::{
    extract::{
        rejection::{JsonRejection, PathRejection},
        ConnectInfo, Path,
    },
    http::HeaderMap,
    Extension, Json,
};
use serde_json::{json, Value};
use tracing::debug;
use uuid::Uuid;

use super::error::ApiError;
use crate::{
    app_state::AppState,
    models::{
        invite::{
            AcceptInviteRequest, AcceptInviteResponse, CreateInviteRequest, CreateInviteResponse, DeclineInviteRequest,
            DeclineInviteResponse, InvitePatch, MeetupInvite, PublicInvite,
        },
        user::CallerIdentity,
    },
    services::invitation_service::InviteError,
};

/// Rate limit key. With `trusted_hops` proxies in front, the client is the
/// entry that many hops from the right of `X-Forwarded-For`; anything left of
/// it is client-written. Without trusted proxies the header is ignored.
pub fn client_key(headers: &HeaderMap, peer: Option<SocketAddr>, trusted_hops: usize) -> String {
    let forwarded = (trusted_hops > 0)
        .then(|| headers.get("x-forwarded-for"))
        .flatten()
        .and_then(|v| v.to_str().ok())
        .and_then(|v| {
            let hops: Vec<&str> = v.split(',').map(str::trim).collect();
            hops.len()
                .checked_sub(trusted_hops)
                .map(|i| hops[i])
                .filter(|hop| !hop.is_empty())
        });

    match (forwarded, peer) {
        (Some(ip), _) => ip.to_string(),
        (None, Some(addr)) => addr.ip().to_string(),
        (None, None) => "unknown".to_string(),
    }
}

fn body<T>(payload: Result<Json<T>, JsonRejection>) -> Result<T, ApiError> {
    match payload {
        Ok(Json(value)) => Ok(value),
        Err(rejection) => {
            debug!(error = %rejection, "rejected request body");
            Err(ApiError::BadRequest(rejection.body_text()))
        }
    }
}

// A malformed id can never match an invite.
fn invite_id(path: Result<Path<Uuid>, PathRejection>) -> Result<Uuid, ApiError> {
    path.map(|Path(id)| id).map_err(|_| InviteError::NotFound.into())
}

pub async fn create_invite(
    Extension(state): Extension<AppState>,
    caller: Option<Extension<CallerIdentity>>,
    peer: Option<ConnectInfo<SocketAddr>>,
    headers: HeaderMap,
    payload: Result<Json<CreateInviteRequest>, JsonRejection>,
) -> Result<Json<CreateInviteResponse>, ApiError> {
    let request = body(payload)?;
    let key = client_key(&headers, peer.map(|ConnectInfo(addr)| addr), state.trusted_proxy_hops);
    let caller = caller.map(|Extension(caller)| caller);

    let invite = state.invites.create_invite(&key, caller.as_ref(), request).await?;
    Ok(Json(CreateInviteResponse {
        invite_url: state.invites.invite_url(&invite.token),
        id: invite.id,
        token: invite.token,
        expires_at: invite.expires_at,
    }))
}

pub async fn list_own_invites(
    Extension(state): Extension<AppState>,
    Extension(caller): Extension<CallerIdentity>,
) -> Result<Json<Vec<MeetupInvite>>, ApiError> {
    Ok(Json(state.invites.list_own_invites(&caller).await?))
}

pub async fn list_upcoming(
    Extension(state): Extension<AppState>,
    Extension(caller): Extension<CallerIdentity>,
) -> Result<Json<Vec<MeetupInvite>>, ApiError> {
    Ok(Json(state.invites.list_upcoming(&caller).await?))
}

pub async fn lookup_invite(
    Extension(state): Extension<AppState>,
    Path(token): Path<String>,
) -> Result<Json<PublicInvite>, ApiError> {
    let invite = state.invites.lookup_invite(&token).await?;
    Ok(Json(invite.into()))
}

pub async fn accept_invite(
    Extension(state): Extension<AppState>,
    Path(token): Path<String>,
    payload: Result<Json<AcceptInviteRequest>, JsonRejection>,
) -> Result<Json<AcceptInviteResponse>, ApiError> {
    let invite = state.invites.accept_invite(&token, body(payload)?).await?;
    Ok(Json(AcceptInviteResponse {
        status: invite.status,
        confirmed_at: invite.confirmed_at,
    }))
}

pub async fn decline_invite(
    Extension(state): Extension<AppState>,
    Path(token): Path<String>,
    payload: Result<Json<DeclineInviteRequest>, JsonRejection>,
) -> Result<Json<DeclineInviteResponse>, ApiError> {
    let invite = state.invites.decline_invite(&token, body(payload)?).await?;
    Ok(Json(DeclineInviteResponse {
        status: invite.status,
        declined_at: invite.declined_at,
    }))
}

pub async fn edit_invite(
    Extension(state): Extension<AppState>,
    Extension(caller): Extension<CallerIdentity>,
    path: Result<Path<Uuid>, PathRejection>,
    payload: Result<Json<InvitePatch>, JsonRejection>,
) -> Result<Json<MeetupInvite>, ApiError> {
    let id = invite_id(path)?;
    let patch = body(payload)?;
    Ok(Json(state.invites.edit_invite(id, &caller, patch).await?))
}

pub async fn delete_invite(
    Extension(state): Extension<AppState>,
    Extension(caller): Extension<CallerIdentity>,
    path: Result<Path<Uuid>, PathRejection>,
) -> Result<Json<Value>, ApiError> {
    let id = invite_id(path)?;
    state.invites.soft_delete_invite(id, &caller).await?;
    Ok(Json(json!({ "deleted": true })))
}

pub async fn admin_get_invite(
    Extension(state): Extension<AppState>,
    Extension(caller): Extension<CallerIdentity>,
    path: Result<Path<Uuid>, PathRejection>,
) -> Result<Json<MeetupInvite>, ApiError> {
    if !state.is_admin(&caller.id) {
        return Err(InviteError::Forbidden.into());
    }
    let id = invite_id(path)?;
    Ok(Json(state.invites.admin_get_invite(id).await?))
}
