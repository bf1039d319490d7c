//! Row mapping trait and helpers for reducing boilerplate in queries.
//!
//! Models implement `FromRow` to describe how they are built from a row
//! selected with the matching `*_COLS` constant.

use rusqlite::{Connection, OptionalExtension, Row, ToSql};

use crate::models::*;
use crate::util::mask_email;

/// Parse a text column into an enum, surfacing bad values as a column type error.
fn parse_enum<T: std::str::FromStr>(row: &Row, col: usize, col_name: &str) -> rusqlite::Result<T> {
    row.get::<_, String>(col)?.parse::<T>().map_err(|_| {
        rusqlite::Error::InvalidColumnType(col, col_name.to_string(), rusqlite::types::Type::Text)
    })
}

fn get_bool(row: &Row, col: usize) -> rusqlite::Result<bool> {
    Ok(row.get::<_, i64>(col)? != 0)
}

pub trait FromRow: Sized {
    fn from_row(row: &Row) -> rusqlite::Result<Self>;
}

/// Query for a single optional result.
pub fn query_one<T: FromRow>(
    conn: &Connection,
    sql: &str,
    params: &[&dyn ToSql],
) -> crate::error::Result<Option<T>> {
    conn.query_row(sql, params, T::from_row)
        .optional()
        .map_err(Into::into)
}

/// Query for multiple results.
pub fn query_all<T: FromRow>(
    conn: &Connection,
    sql: &str,
    params: &[&dyn ToSql],
) -> crate::error::Result<Vec<T>> {
    let mut stmt = conn.prepare(sql)?;
    let rows = stmt
        .query_map(params, T::from_row)?
        .collect::<std::result::Result<Vec<_>, _>>()?;
    Ok(rows)
}

// ============ SQL SELECT Constants ============

pub const PROFILE_COLS: &str = "id, email, full_name, role, created_at, updated_at";

pub const COURSE_COLS: &str = "id, slug, title, description, is_active, created_at, updated_at";

pub const TARIFF_COLS: &str =
    "id, course_id, name, price, is_active, sort_order, created_at, updated_at";

pub const CHECKOUT_SESSION_COLS: &str =
    "id, user_id, course_id, tariff_id, unit_amount, currency, created_at, completed_at";

pub const ENROLLMENT_COLS: &str = "id, user_id, course_id, tariff_id, payment_id, payment_status, amount_paid, status, created_at, updated_at";

/// Enrollment columns (aliased `e`) followed by course, tariff and profile display fields.
pub const ENROLLMENT_WITH_COURSE_COLS: &str = "e.id, e.user_id, e.course_id, e.tariff_id, e.payment_id, e.payment_status, e.amount_paid, e.status, e.created_at, e.updated_at, c.slug, c.title, t.name, p.email";

pub const PARTNER_COLS: &str = "id, user_id, referral_code, is_active, created_at";

pub const TRACKING_COLS: &str = "id, partner_id, user_id, status, created_at, purchased_at";

pub const REWARD_COLS: &str =
    "id, partner_id, tracking_id, enrollment_id, user_id, amount, status, created_at, paid_at";

pub const PARTNER_REWARD_VIEW_COLS: &str =
    "r.id, r.amount, r.status, c.title, p.email, r.created_at, r.paid_at";

// ============ FromRow Implementations ============

impl FromRow for Profile {
    fn from_row(row: &Row) -> rusqlite::Result<Self> {
        Ok(Profile {
            id: row.get(0)?,
            email: row.get(1)?,
            full_name: row.get(2)?,
            role: parse_enum(row, 3, "role")?,
            created_at: row.get(4)?,
            updated_at: row.get(5)?,
        })
    }
}

impl FromRow for Course {
    fn from_row(row: &Row) -> rusqlite::Result<Self> {
        Ok(Course {
            id: row.get(0)?,
            slug: row.get(1)?,
            title: row.get(2)?,
            description: row.get(3)?,
            is_active: get_bool(row, 4)?,
            created_at: row.get(5)?,
            updated_at: row.get(6)?,
        })
    }
}

impl FromRow for Tariff {
    fn from_row(row: &Row) -> rusqlite::Result<Self> {
        Ok(Tariff {
            id: row.get(0)?,
            course_id: row.get(1)?,
            name: row.get(2)?,
            price: row.get(3)?,
            is_active: get_bool(row, 4)?,
            sort_order: row.get(5)?,
            created_at: row.get(6)?,
            updated_at: row.get(7)?,
        })
    }
}

impl FromRow for CheckoutSession {
    fn from_row(row: &Row) -> rusqlite::Result<Self> {
        Ok(CheckoutSession {
            id: row.get(0)?,
            user_id: row.get(1)?,
            course_id: row.get(2)?,
            tariff_id: row.get(3)?,
            unit_amount: row.get(4)?,
            currency: row.get(5)?,
            created_at: row.get(6)?,
            completed_at: row.get(7)?,
        })
    }
}

impl FromRow for Enrollment {
    fn from_row(row: &Row) -> rusqlite::Result<Self> {
        Ok(Enrollment {
            id: row.get(0)?,
            user_id: row.get(1)?,
            course_id: row.get(2)?,
            tariff_id: row.get(3)?,
            payment_id: row.get(4)?,
            payment_status: parse_enum(row, 5, "payment_status")?,
            amount_paid: row.get(6)?,
            status: parse_enum(row, 7, "status")?,
            created_at: row.get(8)?,
            updated_at: row.get(9)?,
        })
    }
}

impl FromRow for EnrollmentWithCourse {
    fn from_row(row: &Row) -> rusqlite::Result<Self> {
        Ok(EnrollmentWithCourse {
            enrollment: Enrollment::from_row(row)?,
            course_slug: row.get(10)?,
            course_title: row.get(11)?,
            tariff_name: row.get(12)?,
            user_email: row.get(13)?,
        })
    }
}

impl FromRow for Partner {
    fn from_row(row: &Row) -> rusqlite::Result<Self> {
        Ok(Partner {
            id: row.get(0)?,
            user_id: row.get(1)?,
            referral_code: row.get(2)?,
            is_active: get_bool(row, 3)?,
            created_at: row.get(4)?,
        })
    }
}

impl FromRow for ReferralTracking {
    fn from_row(row: &Row) -> rusqlite::Result<Self> {
        Ok(ReferralTracking {
            id: row.get(0)?,
            partner_id: row.get(1)?,
            user_id: row.get(2)?,
            status: parse_enum(row, 3, "status")?,
            created_at: row.get(4)?,
            purchased_at: row.get(5)?,
        })
    }
}

impl FromRow for ReferralReward {
    fn from_row(row: &Row) -> rusqlite::Result<Self> {
        Ok(ReferralReward {
            id: row.get(0)?,
            partner_id: row.get(1)?,
            tracking_id: row.get(2)?,
            enrollment_id: row.get(3)?,
            user_id: row.get(4)?,
            amount: row.get(5)?,
            status: parse_enum(row, 6, "status")?,
            created_at: row.get(7)?,
            paid_at: row.get(8)?,
        })
    }
}

impl FromRow for PartnerRewardView {
    fn from_row(row: &Row) -> rusqlite::Result<Self> {
        let email: Option<String> = row.get(4)?;
        Ok(PartnerRewardView {
            id: row.get(0)?,
            amount: row.get(1)?,
            status: parse_enum(row, 2, "status")?,
            course_title: row.get(3)?,
            buyer_email: email.as_deref().map(mask_email),
            created_at: row.get(5)?,
            paid_at: row.get(6)?,
        })
    }
}
