//! Referral partner portal.

use axum::{
    Extension, Router,
    extract::State,
    middleware,
    routing::get,
};

use crate::db::{AppState, queries};
use crate::error::Result;
use crate::extractors::{Json, Query};
use crate::middleware::{PartnerContext, partner_auth};
use crate::models::{PartnerDashboard, PartnerRewardView};
use crate::pagination::{Paginated, PaginationQuery};

pub fn router(state: AppState) -> Router<AppState> {
    Router::new()
        .route("/partner/dashboard", get(get_dashboard))
        .route("/partner/rewards", get(list_rewards))
        .layer(middleware::from_fn_with_state(state, partner_auth))
}

pub async fn get_dashboard(
    State(state): State<AppState>,
    Extension(ctx): Extension<PartnerContext>,
) -> Result<Json<PartnerDashboard>> {
    let conn = state.db.get()?;
    let dashboard = queries::get_partner_dashboard(&conn, &ctx.partner)?;
    Ok(Json(dashboard))
}

pub async fn list_rewards(
    State(state): State<AppState>,
    Extension(ctx): Extension<PartnerContext>,
    Query(pagination): Query<PaginationQuery>,
) -> Result<Json<Paginated<PartnerRewardView>>> {
    let conn = state.db.get()?;
    let (items, total) = queries::list_rewards_for_partner_paginated(
        &conn,
        &ctx.partner.id,
        pagination.limit(),
        pagination.offset(),
    )?;
    Ok(Json(Paginated::new(items, total, &pagination)))
}
