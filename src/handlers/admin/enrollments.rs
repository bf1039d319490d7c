use axum::extract::State;

use crate::db::{AppState, queries};
use crate::error::Result;
use crate::extractors::{Json, Query};
use crate::models::{EnrollmentFilters, EnrollmentWithCourse};
use crate::pagination::{Paginated, PaginationQuery};

pub async fn list_enrollments(
    State(state): State<AppState>,
    Query(pagination): Query<PaginationQuery>,
    Query(filters): Query<EnrollmentFilters>,
) -> Result<Json<Paginated<EnrollmentWithCourse>>> {
    let conn = state.db.get()?;
    let course_id = filters.course_id.as_deref().filter(|s| !s.is_empty());
    let (items, total) = queries::list_enrollments_paginated(
        &conn,
        course_id,
        pagination.limit(),
        pagination.offset(),
    )?;
    Ok(Json(Paginated::new(items, total, &pagination)))
}
