use chrono::Utc;
use rusqlite::{Connection, OptionalExtension, params, types::Value};
use uuid::Uuid;

use crate::error::Result;
use crate::models::*;

use super::from_row::{
    CHECKOUT_SESSION_COLS, COURSE_COLS, ENROLLMENT_COLS, ENROLLMENT_WITH_COURSE_COLS,
    FromRow, PARTNER_COLS, PARTNER_REWARD_VIEW_COLS, PROFILE_COLS, REWARD_COLS, TARIFF_COLS,
    TRACKING_COLS, query_all, query_one,
};

pub fn now() -> i64 {
    Utc::now().timestamp()
}

fn gen_id() -> String {
    Uuid::new_v4().to_string()
}

/// Builder for dynamic UPDATE statements with optional fields.
struct UpdateBuilder {
    table: &'static str,
    id: String,
    fields: Vec<(&'static str, Value)>,
    track_updated_at: bool,
}

impl UpdateBuilder {
    fn new(table: &'static str, id: &str) -> Self {
        Self {
            table,
            id: id.to_string(),
            fields: Vec::new(),
            track_updated_at: false,
        }
    }

    fn with_updated_at(mut self) -> Self {
        self.track_updated_at = true;
        self
    }

    fn set(mut self, column: &'static str, value: impl Into<Value>) -> Self {
        self.fields.push((column, value.into()));
        self
    }

    fn set_opt<V: Into<Value>>(self, column: &'static str, value: Option<V>) -> Self {
        match value {
            Some(v) => self.set(column, v),
            None => self,
        }
    }

    /// Run the update and return the row through RETURNING.
    /// With no fields set, the current row is returned unchanged.
    fn execute_returning<T: FromRow>(mut self, conn: &Connection, cols: &str) -> Result<Option<T>> {
        if self.fields.is_empty() {
            return query_one(
                conn,
                &format!("SELECT {} FROM {} WHERE id = ?1", cols, self.table),
                params![self.id],
            );
        }
        if self.track_updated_at {
            self.fields.push(("updated_at", now().into()));
        }
        let sets: Vec<String> = self
            .fields
            .iter()
            .map(|(col, _)| format!("{} = ?", col))
            .collect();
        let mut values: Vec<Value> = self.fields.into_iter().map(|(_, v)| v).collect();
        values.push(self.id.into());
        let sql = format!(
            "UPDATE {} SET {} WHERE id = ? RETURNING {}",
            self.table,
            sets.join(", "),
            cols
        );
        conn.query_row(&sql, rusqlite::params_from_iter(values), T::from_row)
            .optional()
            .map_err(Into::into)
    }
}

// ============ Profiles ============

/// Insert the profile for an authenticated user on first sight.
/// A new email from the token replaces the stored one; role is never touched.
pub fn ensure_profile(conn: &Connection, id: &str, email: Option<&str>) -> Result<Profile> {
    let now = now();
    let email = email.map(|e| e.trim().to_lowercase());
    conn.query_row(
        &format!(
            "INSERT INTO profiles (id, email, role, created_at, updated_at)
             VALUES (?1, ?2, 'student', ?3, ?3)
             ON CONFLICT(id) DO UPDATE SET
                email = COALESCE(excluded.email, profiles.email),
                updated_at = CASE WHEN excluded.email IS NOT profiles.email AND excluded.email IS NOT NULL
                                  THEN excluded.updated_at ELSE profiles.updated_at END
             RETURNING {}",
            PROFILE_COLS
        ),
        params![id, email, now],
        Profile::from_row,
    )
    .map_err(Into::into)
}

pub fn get_profile_by_id(conn: &Connection, id: &str) -> Result<Option<Profile>> {
    query_one(
        conn,
        &format!("SELECT {} FROM profiles WHERE id = ?1", PROFILE_COLS),
        params![id],
    )
}

pub fn get_profile_by_email(conn: &Connection, email: &str) -> Result<Option<Profile>> {
    query_one(
        conn,
        &format!("SELECT {} FROM profiles WHERE email = ?1", PROFILE_COLS),
        params![email.trim().to_lowercase()],
    )
}

pub fn set_profile_role(conn: &Connection, id: &str, role: ProfileRole) -> Result<Option<Profile>> {
    UpdateBuilder::new("profiles", id)
        .with_updated_at()
        .set("role", role.as_ref().to_string())
        .execute_returning(conn, PROFILE_COLS)
}

// ============ Courses ============

pub fn create_course(conn: &Connection, input: &CreateCourse) -> Result<Course> {
    let id = gen_id();
    let now = now();
    let slug = input.slug.trim().to_string();
    let title = input.title.trim().to_string();

    conn.execute(
        "INSERT INTO courses (id, slug, title, description, is_active, created_at, updated_at)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?6)",
        params![&id, &slug, &title, &input.description, input.is_active, now],
    )?;

    Ok(Course {
        id,
        slug,
        title,
        description: input.description.clone(),
        is_active: input.is_active,
        created_at: now,
        updated_at: now,
    })
}

pub fn get_course_by_id(conn: &Connection, id: &str) -> Result<Option<Course>> {
    query_one(
        conn,
        &format!("SELECT {} FROM courses WHERE id = ?1", COURSE_COLS),
        params![id],
    )
}

pub fn get_course_by_slug(conn: &Connection, slug: &str) -> Result<Option<Course>> {
    query_one(
        conn,
        &format!("SELECT {} FROM courses WHERE slug = ?1", COURSE_COLS),
        params![slug],
    )
}

pub fn list_courses(conn: &Connection, include_inactive: bool) -> Result<Vec<Course>> {
    let filter = if include_inactive {
        ""
    } else {
        "WHERE is_active = 1"
    };
    query_all(
        conn,
        &format!(
            "SELECT {} FROM courses {} ORDER BY created_at DESC, title",
            COURSE_COLS, filter
        ),
        &[],
    )
}

pub fn update_course(conn: &Connection, id: &str, input: &UpdateCourse) -> Result<Option<Course>> {
    UpdateBuilder::new("courses", id)
        .with_updated_at()
        .set_opt("slug", input.slug.as_ref().map(|s| s.trim().to_string()))
        .set_opt("title", input.title.as_ref().map(|s| s.trim().to_string()))
        .set_opt("description", input.description.clone())
        .set_opt("is_active", input.is_active)
        .execute_returning(conn, COURSE_COLS)
}

// ============ Tariffs ============

pub fn create_tariff(conn: &Connection, course_id: &str, input: &CreateTariff) -> Result<Tariff> {
    let id = gen_id();
    let now = now();
    let name = input.name.trim().to_string();

    conn.execute(
        "INSERT INTO tariffs (id, course_id, name, price, is_active, sort_order, created_at, updated_at)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?7)",
        params![&id, course_id, &name, input.price, input.is_active, input.sort_order, now],
    )?;

    Ok(Tariff {
        id,
        course_id: course_id.to_string(),
        name,
        price: input.price,
        is_active: input.is_active,
        sort_order: input.sort_order,
        created_at: now,
        updated_at: now,
    })
}

pub fn get_tariff_by_id(conn: &Connection, id: &str) -> Result<Option<Tariff>> {
    query_one(
        conn,
        &format!("SELECT {} FROM tariffs WHERE id = ?1", TARIFF_COLS),
        params![id],
    )
}

pub fn list_tariffs_for_course(
    conn: &Connection,
    course_id: &str,
    include_inactive: bool,
) -> Result<Vec<Tariff>> {
    let filter = if include_inactive {
        ""
    } else {
        "AND is_active = 1"
    };
    query_all(
        conn,
        &format!(
            "SELECT {} FROM tariffs WHERE course_id = ?1 {} ORDER BY sort_order, price",
            TARIFF_COLS, filter
        ),
        params![course_id],
    )
}

pub fn update_tariff(conn: &Connection, id: &str, input: &UpdateTariff) -> Result<Option<Tariff>> {
    UpdateBuilder::new("tariffs", id)
        .with_updated_at()
        .set_opt("name", input.name.as_ref().map(|s| s.trim().to_string()))
        .set_opt("price", input.price)
        .set_opt("is_active", input.is_active)
        .set_opt("sort_order", input.sort_order)
        .execute_returning(conn, TARIFF_COLS)
}

// ============ Checkout Sessions ============

pub fn create_checkout_session(
    conn: &Connection,
    input: &CreateCheckoutSession,
) -> Result<CheckoutSession> {
    let now = now();

    conn.execute(
        "INSERT INTO checkout_sessions (id, user_id, course_id, tariff_id, unit_amount, currency, created_at)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
        params![
            &input.id,
            &input.user_id,
            &input.course_id,
            &input.tariff_id,
            input.unit_amount,
            &input.currency,
            now
        ],
    )?;

    Ok(CheckoutSession {
        id: input.id.clone(),
        user_id: input.user_id.clone(),
        course_id: input.course_id.clone(),
        tariff_id: input.tariff_id.clone(),
        unit_amount: input.unit_amount,
        currency: input.currency.clone(),
        created_at: now,
        completed_at: None,
    })
}

pub fn get_checkout_session(conn: &Connection, id: &str) -> Result<Option<CheckoutSession>> {
    query_one(
        conn,
        &format!(
            "SELECT {} FROM checkout_sessions WHERE id = ?1",
            CHECKOUT_SESSION_COLS
        ),
        params![id],
    )
}

/// Stamp a local checkout session as completed. Returns false when the session
/// is unknown (created elsewhere) or was already completed.
pub fn mark_checkout_session_completed(conn: &Connection, id: &str) -> Result<bool> {
    let affected = conn.execute(
        "UPDATE checkout_sessions SET completed_at = ?1 WHERE id = ?2 AND completed_at IS NULL",
        params![now(), id],
    )?;
    Ok(affected > 0)
}

/// Delete abandoned checkout sessions older than the retention period.
pub fn purge_stale_checkout_sessions(conn: &Connection, retention_days: i64) -> Result<usize> {
    let cutoff = now() - (retention_days * 86400);
    let deleted = conn.execute(
        "DELETE FROM checkout_sessions WHERE completed_at IS NULL AND created_at < ?1",
        params![cutoff],
    )?;
    Ok(deleted)
}

// ============ Enrollments ============

pub fn get_enrollment(conn: &Connection, user_id: &str, course_id: &str) -> Result<Option<Enrollment>> {
    query_one(
        conn,
        &format!(
            "SELECT {} FROM enrollments WHERE user_id = ?1 AND course_id = ?2",
            ENROLLMENT_COLS
        ),
        params![user_id, course_id],
    )
}

/// Activate the buyer's enrollment for a course, creating it if needed.
///
/// The `(user_id, course_id)` unique constraint makes this the single write
/// point shared by the webhook and the verifier; whichever runs second just
/// rewrites the same row.
pub fn upsert_paid_enrollment(conn: &Connection, input: &UpsertEnrollment) -> Result<Enrollment> {
    let now = now();
    conn.query_row(
        &format!(
            "INSERT INTO enrollments
                (id, user_id, course_id, tariff_id, payment_id, payment_status, amount_paid, status, created_at, updated_at)
             VALUES (?1, ?2, ?3, ?4, ?5, 'paid', ?6, 'active', ?7, ?7)
             ON CONFLICT(user_id, course_id) DO UPDATE SET
                tariff_id = excluded.tariff_id,
                payment_id = excluded.payment_id,
                payment_status = 'paid',
                amount_paid = excluded.amount_paid,
                status = 'active',
                updated_at = excluded.updated_at
             RETURNING {}",
            ENROLLMENT_COLS
        ),
        params![
            gen_id(),
            &input.user_id,
            &input.course_id,
            &input.tariff_id,
            &input.payment_id,
            input.amount_paid,
            now
        ],
        Enrollment::from_row,
    )
    .map_err(Into::into)
}

const ENROLLMENT_JOINS: &str = "FROM enrollments e
     JOIN courses c ON c.id = e.course_id
     LEFT JOIN tariffs t ON t.id = e.tariff_id
     LEFT JOIN profiles p ON p.id = e.user_id";

pub fn list_active_enrollments_for_user(
    conn: &Connection,
    user_id: &str,
) -> Result<Vec<EnrollmentWithCourse>> {
    query_all(
        conn,
        &format!(
            "SELECT {} {} WHERE e.user_id = ?1 AND e.status = 'active'
             ORDER BY e.created_at DESC",
            ENROLLMENT_WITH_COURSE_COLS, ENROLLMENT_JOINS
        ),
        params![user_id],
    )
}

pub fn list_enrollments_paginated(
    conn: &Connection,
    course_id: Option<&str>,
    limit: i64,
    offset: i64,
) -> Result<(Vec<EnrollmentWithCourse>, i64)> {
    let total: i64 = conn.query_row(
        "SELECT COUNT(*) FROM enrollments WHERE ?1 IS NULL OR course_id = ?1",
        params![course_id],
        |row| row.get(0),
    )?;
    let items = query_all(
        conn,
        &format!(
            "SELECT {} {} WHERE ?1 IS NULL OR e.course_id = ?1
             ORDER BY e.created_at DESC LIMIT ?2 OFFSET ?3",
            ENROLLMENT_WITH_COURSE_COLS, ENROLLMENT_JOINS
        ),
        params![course_id, limit, offset],
    )?;
    Ok((items, total))
}

// ============ Partners ============

pub fn create_partner(conn: &Connection, input: &CreatePartner) -> Result<Partner> {
    let id = gen_id();
    let now = now();
    let code = input.referral_code.trim().to_string();

    conn.execute(
        "INSERT INTO partners (id, user_id, referral_code, is_active, created_at)
         VALUES (?1, ?2, ?3, 1, ?4)",
        params![&id, &input.user_id, &code, now],
    )?;

    Ok(Partner {
        id,
        user_id: input.user_id.clone(),
        referral_code: code,
        is_active: true,
        created_at: now,
    })
}

pub fn get_partner_by_id(conn: &Connection, id: &str) -> Result<Option<Partner>> {
    query_one(
        conn,
        &format!("SELECT {} FROM partners WHERE id = ?1", PARTNER_COLS),
        params![id],
    )
}

pub fn get_partner_by_user_id(conn: &Connection, user_id: &str) -> Result<Option<Partner>> {
    query_one(
        conn,
        &format!("SELECT {} FROM partners WHERE user_id = ?1", PARTNER_COLS),
        params![user_id],
    )
}

/// Codes are matched case-insensitively.
pub fn get_partner_by_code(conn: &Connection, code: &str) -> Result<Option<Partner>> {
    query_one(
        conn,
        &format!(
            "SELECT {} FROM partners WHERE referral_code = ?1 COLLATE NOCASE",
            PARTNER_COLS
        ),
        params![code.trim()],
    )
}

pub fn list_partners(conn: &Connection) -> Result<Vec<Partner>> {
    query_all(
        conn,
        &format!("SELECT {} FROM partners ORDER BY created_at DESC", PARTNER_COLS),
        &[],
    )
}

/// Counters and earnings shown on the partner dashboard.
pub fn get_partner_dashboard(conn: &Connection, partner: &Partner) -> Result<PartnerDashboard> {
    let (registered_count, purchased_count): (i64, i64) = conn.query_row(
        "SELECT COUNT(*), COALESCE(SUM(CASE WHEN status = 'purchased' THEN 1 ELSE 0 END), 0)
         FROM referral_tracking WHERE partner_id = ?1",
        params![&partner.id],
        |row| Ok((row.get(0)?, row.get(1)?)),
    )?;
    let (total_earned, pending_amount, paid_amount): (f64, f64, f64) = conn.query_row(
        "SELECT COALESCE(SUM(amount), 0.0),
                COALESCE(SUM(CASE WHEN status = 'pending' THEN amount ELSE 0.0 END), 0.0),
                COALESCE(SUM(CASE WHEN status = 'paid' THEN amount ELSE 0.0 END), 0.0)
         FROM referral_rewards WHERE partner_id = ?1",
        params![&partner.id],
        |row| Ok((row.get(0)?, row.get(1)?, row.get(2)?)),
    )?;

    Ok(PartnerDashboard {
        referral_code: partner.referral_code.clone(),
        registered_count,
        purchased_count,
        total_earned: crate::util::round_money(total_earned),
        pending_amount: crate::util::round_money(pending_amount),
        paid_amount: crate::util::round_money(paid_amount),
    })
}

// ============ Referral Tracking ============

pub fn create_tracking(conn: &Connection, partner_id: &str, user_id: &str) -> Result<ReferralTracking> {
    let id = gen_id();
    let now = now();

    conn.execute(
        "INSERT INTO referral_tracking (id, partner_id, user_id, status, created_at)
         VALUES (?1, ?2, ?3, 'registered', ?4)",
        params![&id, partner_id, user_id, now],
    )?;

    Ok(ReferralTracking {
        id,
        partner_id: Some(partner_id.to_string()),
        user_id: user_id.to_string(),
        status: TrackingStatus::Registered,
        created_at: now,
        purchased_at: None,
    })
}

/// Most recent tracking row for a buyer. Ties on `created_at` fall back to rowid.
pub fn get_latest_tracking_for_user(
    conn: &Connection,
    user_id: &str,
) -> Result<Option<ReferralTracking>> {
    query_one(
        conn,
        &format!(
            "SELECT {} FROM referral_tracking WHERE user_id = ?1
             ORDER BY created_at DESC, rowid DESC LIMIT 1",
            TRACKING_COLS
        ),
        params![user_id],
    )
}

pub fn mark_tracking_purchased(conn: &Connection, id: &str) -> Result<bool> {
    let affected = conn.execute(
        "UPDATE referral_tracking SET status = 'purchased', purchased_at = ?1
         WHERE id = ?2 AND status != 'purchased'",
        params![now(), id],
    )?;
    Ok(affected > 0)
}

// ============ Referral Rewards ============

#[derive(Debug, Clone)]
pub struct NewReward<'a> {
    pub partner_id: &'a str,
    pub tracking_id: &'a str,
    pub enrollment_id: &'a str,
    pub user_id: &'a str,
    pub amount: f64,
}

/// Insert a pending reward unless one already exists for the enrollment.
/// Returns None when the enrollment was already credited.
pub fn try_create_reward(conn: &Connection, input: &NewReward) -> Result<Option<ReferralReward>> {
    let id = gen_id();
    let now = now();

    let inserted = conn.execute(
        "INSERT OR IGNORE INTO referral_rewards
            (id, partner_id, tracking_id, enrollment_id, user_id, amount, status, created_at)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, 'pending', ?7)",
        params![
            &id,
            input.partner_id,
            input.tracking_id,
            input.enrollment_id,
            input.user_id,
            input.amount,
            now
        ],
    )?;
    if inserted == 0 {
        return Ok(None);
    }

    Ok(Some(ReferralReward {
        id,
        partner_id: input.partner_id.to_string(),
        tracking_id: input.tracking_id.to_string(),
        enrollment_id: input.enrollment_id.to_string(),
        user_id: input.user_id.to_string(),
        amount: input.amount,
        status: RewardStatus::Pending,
        created_at: now,
        paid_at: None,
    }))
}

pub fn get_reward_by_id(conn: &Connection, id: &str) -> Result<Option<ReferralReward>> {
    query_one(
        conn,
        &format!("SELECT {} FROM referral_rewards WHERE id = ?1", REWARD_COLS),
        params![id],
    )
}

pub fn list_rewards_for_enrollment(
    conn: &Connection,
    enrollment_id: &str,
) -> Result<Vec<ReferralReward>> {
    query_all(
        conn,
        &format!(
            "SELECT {} FROM referral_rewards WHERE enrollment_id = ?1",
            REWARD_COLS
        ),
        params![enrollment_id],
    )
}

pub fn list_rewards_for_partner_paginated(
    conn: &Connection,
    partner_id: &str,
    limit: i64,
    offset: i64,
) -> Result<(Vec<PartnerRewardView>, i64)> {
    let total: i64 = conn.query_row(
        "SELECT COUNT(*) FROM referral_rewards WHERE partner_id = ?1",
        params![partner_id],
        |row| row.get(0),
    )?;
    let items = query_all(
        conn,
        &format!(
            "SELECT {} FROM referral_rewards r
             LEFT JOIN enrollments e ON e.id = r.enrollment_id
             LEFT JOIN courses c ON c.id = e.course_id
             LEFT JOIN profiles p ON p.id = r.user_id
             WHERE r.partner_id = ?1
             ORDER BY r.created_at DESC, r.rowid DESC LIMIT ?2 OFFSET ?3",
            PARTNER_REWARD_VIEW_COLS
        ),
        params![partner_id, limit, offset],
    )?;
    Ok((items, total))
}

/// Mark a reward as paid out. Already-paid rewards keep their original `paid_at`.
pub fn mark_reward_paid(conn: &Connection, id: &str) -> Result<Option<ReferralReward>> {
    conn.execute(
        "UPDATE referral_rewards SET status = 'paid', paid_at = ?1
         WHERE id = ?2 AND status = 'pending'",
        params![now(), id],
    )?;
    get_reward_by_id(conn, id)
}

// ============ Webhook Event Deduplication ============

pub fn is_webhook_event_recorded(conn: &Connection, provider: &str, event_id: &str) -> Result<bool> {
    let found: Option<i64> = conn
        .query_row(
            "SELECT 1 FROM webhook_events WHERE provider = ?1 AND event_id = ?2",
            params![provider, event_id],
            |row| row.get(0),
        )
        .optional()?;
    Ok(found.is_some())
}

/// Record a processed webhook event. Returns false if it was already recorded.
pub fn record_webhook_event(conn: &Connection, provider: &str, event_id: &str) -> Result<bool> {
    let affected = conn.execute(
        "INSERT OR IGNORE INTO webhook_events (provider, event_id, created_at) VALUES (?1, ?2, ?3)",
        params![provider, event_id, now()],
    )?;
    Ok(affected > 0)
}

pub fn purge_old_webhook_events(conn: &Connection, retention_days: i64) -> Result<usize> {
    let cutoff = now() - (retention_days * 86400);
    let deleted = conn.execute(
        "DELETE FROM webhook_events WHERE created_at < ?1",
        params![cutoff],
    )?;
    Ok(deleted)
}
