use axum::extract::State;

use crate::db::{AppState, queries};
use crate::error::{OptionExt, Result, msg};
use crate::extractors::{Json, Path};
use crate::models::CourseWithTariffs;

/// Active courses with their active tariffs, for the marketing site.
pub async fn list_courses(State(state): State<AppState>) -> Result<Json<Vec<CourseWithTariffs>>> {
    let conn = state.db.get()?;

    let courses = queries::list_courses(&conn, false)?
        .into_iter()
        .map(|course| {
            let tariffs = queries::list_tariffs_for_course(&conn, &course.id, false)?;
            Ok(CourseWithTariffs { course, tariffs })
        })
        .collect::<Result<Vec<_>>>()?;

    Ok(Json(courses))
}

pub async fn get_course(
    State(state): State<AppState>,
    Path(slug): Path<String>,
) -> Result<Json<CourseWithTariffs>> {
    let conn = state.db.get()?;

    let course = queries::get_course_by_slug(&conn, &slug)?
        .filter(|c| c.is_active)
        .or_not_found(msg::COURSE_NOT_FOUND)?;
    let tariffs = queries::list_tariffs_for_course(&conn, &course.id, false)?;

    Ok(Json(CourseWithTariffs { course, tariffs }))
}
