use serde::{Deserialize, Serialize};

use crate::error::{AppError, Result};

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Course {
    pub id: String,
    pub slug: String,
    pub title: String,
    pub description: Option<String>,
    pub is_active: bool,
    pub created_at: i64,
    pub updated_at: i64,
}

/// A priced purchase option of a course. `price` is in major currency units.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Tariff {
    pub id: String,
    pub course_id: String,
    pub name: String,
    pub price: f64,
    pub is_active: bool,
    pub sort_order: i64,
    pub created_at: i64,
    pub updated_at: i64,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CourseWithTariffs {
    #[serde(flatten)]
    pub course: Course,
    pub tariffs: Vec<Tariff>,
}

/// Minimal course reference embedded in checkout verification responses.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CourseSummary {
    pub id: String,
    pub slug: String,
    pub title: String,
}

impl From<&Course> for CourseSummary {
    fn from(course: &Course) -> Self {
        Self {
            id: course.id.clone(),
            slug: course.slug.clone(),
            title: course.title.clone(),
        }
    }
}

fn is_valid_slug(slug: &str) -> bool {
    !slug.is_empty()
        && slug.len() <= 100
        && slug
            .chars()
            .all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '-')
}

fn validate_price(price: f64) -> Result<()> {
    if !price.is_finite() || price <= 0.0 {
        return Err(AppError::BadRequest("price must be a positive number".into()));
    }
    Ok(())
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateCourse {
    pub slug: String,
    pub title: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default = "default_true")]
    pub is_active: bool,
}

fn default_true() -> bool {
    true
}

impl CreateCourse {
    pub fn validate(&self) -> Result<()> {
        if !is_valid_slug(&self.slug) {
            return Err(AppError::BadRequest(
                "slug must be lowercase letters, digits and dashes".into(),
            ));
        }
        if self.title.trim().is_empty() {
            return Err(AppError::BadRequest("title is required".into()));
        }
        Ok(())
    }
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateCourse {
    pub slug: Option<String>,
    pub title: Option<String>,
    pub description: Option<String>,
    pub is_active: Option<bool>,
}

impl UpdateCourse {
    pub fn validate(&self) -> Result<()> {
        if let Some(slug) = &self.slug
            && !is_valid_slug(slug)
        {
            return Err(AppError::BadRequest(
                "slug must be lowercase letters, digits and dashes".into(),
            ));
        }
        if let Some(title) = &self.title
            && title.trim().is_empty()
        {
            return Err(AppError::BadRequest("title cannot be empty".into()));
        }
        Ok(())
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateTariff {
    pub name: String,
    pub price: f64,
    #[serde(default = "default_true")]
    pub is_active: bool,
    #[serde(default)]
    pub sort_order: i64,
}

impl CreateTariff {
    pub fn validate(&self) -> Result<()> {
        if self.name.trim().is_empty() {
            return Err(AppError::BadRequest("name is required".into()));
        }
        validate_price(self.price)
    }
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateTariff {
    pub name: Option<String>,
    pub price: Option<f64>,
    pub is_active: Option<bool>,
    pub sort_order: Option<i64>,
}

impl UpdateTariff {
    pub fn validate(&self) -> Result<()> {
        if let Some(name) = &self.name
            && name.trim().is_empty()
        {
            return Err(AppError::BadRequest("name cannot be empty".into()));
        }
        if let Some(price) = self.price {
            validate_price(price)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn slug_rules() {
        assert!(is_valid_slug("rust-101"));
        assert!(!is_valid_slug("Rust 101"));
        assert!(!is_valid_slug(""));
    }

    #[test]
    fn tariff_price_must_be_positive() {
        let tariff = CreateTariff {
            name: "Basic".into(),
            price: 0.0,
            is_active: true,
            sort_order: 0,
        };
        assert!(tariff.validate().is_err());

        let update = UpdateTariff {
            price: Some(f64::NAN),
            ..Default::default()
        };
        assert!(update.validate().is_err());
    }
}
