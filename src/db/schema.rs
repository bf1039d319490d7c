use rusqlite::Connection;

/// Create every table if it does not exist yet. Safe to run on each startup.
pub fn init_db(conn: &Connection) -> rusqlite::Result<()> {
    conn.execute_batch(
        r#"
        PRAGMA journal_mode = WAL;
        PRAGMA synchronous = NORMAL;

        -- Profiles mirror hosted-auth users; id is the token subject
        CREATE TABLE IF NOT EXISTS profiles (
            id TEXT PRIMARY KEY,
            email TEXT,
            full_name TEXT,
            role TEXT NOT NULL DEFAULT 'student' CHECK (role IN ('student', 'admin')),
            created_at INTEGER NOT NULL,
            updated_at INTEGER NOT NULL
        );
        CREATE INDEX IF NOT EXISTS idx_profiles_email ON profiles(email);

        CREATE TABLE IF NOT EXISTS courses (
            id TEXT PRIMARY KEY,
            slug TEXT NOT NULL UNIQUE,
            title TEXT NOT NULL,
            description TEXT,
            is_active INTEGER NOT NULL DEFAULT 1,
            created_at INTEGER NOT NULL,
            updated_at INTEGER NOT NULL
        );

        -- Prices are major currency units, converted to minor units only for the processor
        CREATE TABLE IF NOT EXISTS tariffs (
            id TEXT PRIMARY KEY,
            course_id TEXT NOT NULL REFERENCES courses(id) ON DELETE CASCADE,
            name TEXT NOT NULL,
            price REAL NOT NULL CHECK (price > 0),
            is_active INTEGER NOT NULL DEFAULT 1,
            sort_order INTEGER NOT NULL DEFAULT 0,
            created_at INTEGER NOT NULL,
            updated_at INTEGER NOT NULL
        );
        CREATE INDEX IF NOT EXISTS idx_tariffs_course ON tariffs(course_id, sort_order);

        -- Sessions created by the checkout endpoint; id is the processor's cs_... id
        CREATE TABLE IF NOT EXISTS checkout_sessions (
            id TEXT PRIMARY KEY,
            user_id TEXT NOT NULL REFERENCES profiles(id) ON DELETE CASCADE,
            course_id TEXT NOT NULL REFERENCES courses(id) ON DELETE CASCADE,
            tariff_id TEXT NOT NULL REFERENCES tariffs(id) ON DELETE CASCADE,
            unit_amount INTEGER NOT NULL,
            currency TEXT NOT NULL,
            created_at INTEGER NOT NULL,
            completed_at INTEGER
        );
        CREATE INDEX IF NOT EXISTS idx_checkout_sessions_purge ON checkout_sessions(created_at) WHERE completed_at IS NULL;

        -- One enrollment per buyer and course; both fulfillment paths upsert on this pair
        CREATE TABLE IF NOT EXISTS enrollments (
            id TEXT PRIMARY KEY,
            user_id TEXT NOT NULL REFERENCES profiles(id) ON DELETE CASCADE,
            course_id TEXT NOT NULL REFERENCES courses(id) ON DELETE CASCADE,
            tariff_id TEXT REFERENCES tariffs(id) ON DELETE SET NULL,
            payment_id TEXT,
            payment_status TEXT NOT NULL DEFAULT 'pending' CHECK (payment_status IN ('pending', 'paid')),
            amount_paid REAL,
            status TEXT NOT NULL DEFAULT 'pending' CHECK (status IN ('pending', 'active')),
            created_at INTEGER NOT NULL,
            updated_at INTEGER NOT NULL,
            UNIQUE(user_id, course_id)
        );
        CREATE INDEX IF NOT EXISTS idx_enrollments_course ON enrollments(course_id);

        CREATE TABLE IF NOT EXISTS partners (
            id TEXT PRIMARY KEY,
            user_id TEXT NOT NULL UNIQUE REFERENCES profiles(id) ON DELETE CASCADE,
            referral_code TEXT NOT NULL UNIQUE,
            is_active INTEGER NOT NULL DEFAULT 1,
            created_at INTEGER NOT NULL
        );

        CREATE TABLE IF NOT EXISTS referral_tracking (
            id TEXT PRIMARY KEY,
            partner_id TEXT REFERENCES partners(id) ON DELETE SET NULL,
            user_id TEXT NOT NULL REFERENCES profiles(id) ON DELETE CASCADE,
            status TEXT NOT NULL DEFAULT 'registered' CHECK (status IN ('registered', 'purchased')),
            created_at INTEGER NOT NULL,
            purchased_at INTEGER
        );
        CREATE INDEX IF NOT EXISTS idx_referral_tracking_user ON referral_tracking(user_id, created_at DESC);
        CREATE INDEX IF NOT EXISTS idx_referral_tracking_partner ON referral_tracking(partner_id, status);

        -- enrollment_id is unique so a purchase is credited at most once
        CREATE TABLE IF NOT EXISTS referral_rewards (
            id TEXT PRIMARY KEY,
            partner_id TEXT NOT NULL REFERENCES partners(id) ON DELETE CASCADE,
            tracking_id TEXT NOT NULL REFERENCES referral_tracking(id) ON DELETE CASCADE,
            enrollment_id TEXT NOT NULL UNIQUE REFERENCES enrollments(id) ON DELETE CASCADE,
            user_id TEXT NOT NULL REFERENCES profiles(id) ON DELETE CASCADE,
            amount REAL NOT NULL,
            status TEXT NOT NULL DEFAULT 'pending' CHECK (status IN ('pending', 'paid')),
            created_at INTEGER NOT NULL,
            paid_at INTEGER
        );
        CREATE INDEX IF NOT EXISTS idx_referral_rewards_partner ON referral_rewards(partner_id, created_at DESC);

        -- Processed processor events, for redelivery short-circuit
        CREATE TABLE IF NOT EXISTS webhook_events (
            provider TEXT NOT NULL,
            event_id TEXT NOT NULL,
            created_at INTEGER NOT NULL,
            PRIMARY KEY (provider, event_id)
        );
        CREATE INDEX IF NOT EXISTS idx_webhook_events_created ON webhook_events(created_at);
        "#,
    )?;
    Ok(())
}
