use axum::{Extension, extract::State, http::StatusCode};

use crate::db::{AppState, queries};
use crate::error::{OptionExt, Result, ResultExt, msg};
use crate::extractors::{Json, Path};
use crate::middleware::AdminContext;
use crate::models::{
    Course, CourseWithTariffs, CreateCourse, CreateTariff, Tariff, UpdateCourse, UpdateTariff,
};

pub async fn create_course(
    State(state): State<AppState>,
    Extension(ctx): Extension<AdminContext>,
    Json(input): Json<CreateCourse>,
) -> Result<(StatusCode, Json<Course>)> {
    input.validate()?;

    let conn = state.db.get()?;
    let course = queries::create_course(&conn, &input).conflict_on_unique(msg::SLUG_TAKEN)?;

    tracing::info!(admin = %ctx.profile.id, course_id = %course.id, slug = %course.slug, "Course created");
    Ok((StatusCode::CREATED, Json(course)))
}

/// Every course, active or not, with all of its tariffs.
pub async fn list_courses(State(state): State<AppState>) -> Result<Json<Vec<CourseWithTariffs>>> {
    let conn = state.db.get()?;

    let courses = queries::list_courses(&conn, true)?
        .into_iter()
        .map(|course| {
            let tariffs = queries::list_tariffs_for_course(&conn, &course.id, true)?;
            Ok(CourseWithTariffs { course, tariffs })
        })
        .collect::<Result<Vec<_>>>()?;

    Ok(Json(courses))
}

pub async fn update_course(
    State(state): State<AppState>,
    Path(course_id): Path<String>,
    Json(input): Json<UpdateCourse>,
) -> Result<Json<Course>> {
    input.validate()?;

    let conn = state.db.get()?;
    let course = queries::update_course(&conn, &course_id, &input)
        .conflict_on_unique(msg::SLUG_TAKEN)?
        .or_not_found(msg::COURSE_NOT_FOUND)?;

    Ok(Json(course))
}

pub async fn create_tariff(
    State(state): State<AppState>,
    Path(course_id): Path<String>,
    Json(input): Json<CreateTariff>,
) -> Result<(StatusCode, Json<Tariff>)> {
    input.validate()?;

    let conn = state.db.get()?;
    queries::get_course_by_id(&conn, &course_id)?.or_not_found(msg::COURSE_NOT_FOUND)?;
    let tariff = queries::create_tariff(&conn, &course_id, &input)?;

    Ok((StatusCode::CREATED, Json(tariff)))
}

pub async fn update_tariff(
    State(state): State<AppState>,
    Path(tariff_id): Path<String>,
    Json(input): Json<UpdateTariff>,
) -> Result<Json<Tariff>> {
    input.validate()?;

    let conn = state.db.get()?;
    let tariff = queries::update_tariff(&conn, &tariff_id, &input)?
        .or_not_found(msg::TARIFF_NOT_FOUND)?;

    Ok(Json(tariff))
}
