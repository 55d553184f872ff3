//! Database schema definitions using sea-query.
//!
//! These define the table and column identifiers for type-safe query building.

use sea_query::Iden;

/// Accounts table schema.
#[derive(Iden)]
pub enum Accounts {
    Table,
    #[iden = "id"]
    Id,
    #[iden = "email"]
    Email,
    #[iden = "phone_number"]
    PhoneNumber,
    #[iden = "first_name"]
    FirstName,
    #[iden = "last_name"]
    LastName,
    #[iden = "role"]
    Role,
    #[iden = "coins"]
    Coins,
    #[iden = "available_steps"]
    AvailableSteps,
    #[iden = "overall_steps"]
    OverallSteps,
    #[iden = "is_active"]
    IsActive,
    #[iden = "created_at"]
    CreatedAt,
}

/// Partners table schema.
#[derive(Iden)]
pub enum Partners {
    Table,
    #[iden = "id"]
    Id,
    #[iden = "account_id"]
    AccountId,
    #[iden = "name"]
    Name,
    #[iden = "description"]
    Description,
    #[iden = "website"]
    Website,
    #[iden = "is_active"]
    IsActive,
    #[iden = "created_at"]
    CreatedAt,
}

/// Coupon templates table schema.
#[derive(Iden)]
pub enum CouponTemplates {
    Table,
    #[iden = "id"]
    Id,
    #[iden = "partner_id"]
    PartnerId,
    #[iden = "category"]
    Category,
    #[iden = "title"]
    Title,
    #[iden = "description"]
    Description,
    #[iden = "cost_coins"]
    CostCoins,
    #[iden = "validity_days"]
    ValidityDays,
    #[iden = "quantity"]
    Quantity,
    #[iden = "purchased_count"]
    PurchasedCount,
    #[iden = "is_active"]
    IsActive,
    #[iden = "created_at"]
    CreatedAt,
}

/// Promotions table schema.
#[derive(Iden)]
pub enum Promotions {
    Table,
    #[iden = "id"]
    Id,
    #[iden = "partner_id"]
    PartnerId,
    #[iden = "title"]
    Title,
    #[iden = "description"]
    Description,
    #[iden = "required_steps"]
    RequiredSteps,
    #[iden = "max_redemptions_per_user"]
    MaxRedemptionsPerUser,
    #[iden = "is_active"]
    IsActive,
    #[iden = "created_at"]
    CreatedAt,
}

/// Activities table schema. One row per (account, day).
#[derive(Iden)]
pub enum Activities {
    Table,
    #[iden = "account_id"]
    AccountId,
    #[iden = "day"]
    Day,
    #[iden = "steps"]
    Steps,
    #[iden = "duration_secs"]
    DurationSecs,
    #[iden = "distance_km"]
    DistanceKm,
    #[iden = "calories"]
    Calories,
    #[iden = "source"]
    Source,
    #[iden = "steps_transferred"]
    StepsTransferred,
    #[iden = "created_at"]
    CreatedAt,
    #[iden = "updated_at"]
    UpdatedAt,
}

/// Reward transactions table schema.
#[derive(Iden)]
pub enum RewardTransactions {
    Table,
    #[iden = "id"]
    Id,
    #[iden = "account_id"]
    AccountId,
    #[iden = "amount"]
    Amount,
    #[iden = "kind"]
    Kind,
    #[iden = "reason"]
    Reason,
    #[iden = "reward_day"]
    RewardDay,
    #[iden = "created_at"]
    CreatedAt,
}

/// Redemptions table schema. Coupons and promotions share it, split by `kind`.
#[derive(Iden)]
pub enum Redemptions {
    Table,
    #[iden = "token"]
    Token,
    #[iden = "account_id"]
    AccountId,
    #[iden = "kind"]
    Kind,
    #[iden = "template_id"]
    TemplateId,
    #[iden = "promotion_id"]
    PromotionId,
    #[iden = "consumed"]
    Consumed,
    #[iden = "consumed_at"]
    ConsumedAt,
    #[iden = "purchased_at"]
    PurchasedAt,
}

/// Batch job watermarks.
#[derive(Iden)]
pub enum Watermarks {
    Table,
    #[iden = "job"]
    Job,
    #[iden = "day"]
    Day,
    #[iden = "updated_at"]
    UpdatedAt,
}

/// SQL for creating every ledger table.
///
/// Timestamps are RFC 3339 UTC with fixed microsecond precision so that text
/// order is time order. Days are `YYYY-MM-DD`.
pub const CREATE_LEDGER_TABLES: &str = r#"
CREATE TABLE IF NOT EXISTS accounts (
    id TEXT PRIMARY KEY NOT NULL,
    email TEXT UNIQUE,
    phone_number TEXT UNIQUE,
    first_name TEXT,
    last_name TEXT,
    role TEXT NOT NULL DEFAULT 'user',
    coins INTEGER NOT NULL DEFAULT 0 CHECK (coins >= 0),
    available_steps INTEGER NOT NULL DEFAULT 0 CHECK (available_steps >= 0),
    overall_steps INTEGER NOT NULL DEFAULT 0 CHECK (overall_steps >= 0),
    is_active INTEGER NOT NULL DEFAULT 1,
    created_at TEXT NOT NULL
);

CREATE TABLE IF NOT EXISTS partners (
    id TEXT PRIMARY KEY NOT NULL,
    account_id TEXT NOT NULL UNIQUE REFERENCES accounts(id) ON DELETE CASCADE,
    name TEXT NOT NULL,
    description TEXT NOT NULL DEFAULT '',
    website TEXT,
    is_active INTEGER NOT NULL DEFAULT 1,
    created_at TEXT NOT NULL
);

CREATE TABLE IF NOT EXISTS coupon_templates (
    id TEXT PRIMARY KEY NOT NULL,
    partner_id TEXT NOT NULL REFERENCES partners(id) ON DELETE CASCADE,
    category TEXT NOT NULL DEFAULT '',
    title TEXT NOT NULL,
    description TEXT NOT NULL DEFAULT '',
    cost_coins INTEGER NOT NULL CHECK (cost_coins >= 0),
    validity_days INTEGER NOT NULL,
    quantity INTEGER CHECK (quantity IS NULL OR quantity >= 0),
    purchased_count INTEGER NOT NULL DEFAULT 0 CHECK (purchased_count >= 0),
    is_active INTEGER NOT NULL DEFAULT 1,
    created_at TEXT NOT NULL
);

CREATE INDEX IF NOT EXISTS idx_coupon_templates_partner ON coupon_templates(partner_id);

CREATE TABLE IF NOT EXISTS promotions (
    id TEXT PRIMARY KEY NOT NULL,
    partner_id TEXT NOT NULL REFERENCES partners(id) ON DELETE CASCADE,
    title TEXT NOT NULL,
    description TEXT NOT NULL DEFAULT '',
    required_steps INTEGER NOT NULL CHECK (required_steps >= 0),
    max_redemptions_per_user INTEGER NOT NULL CHECK (max_redemptions_per_user >= 1),
    is_active INTEGER NOT NULL DEFAULT 1,
    created_at TEXT NOT NULL
);

CREATE INDEX IF NOT EXISTS idx_promotions_partner ON promotions(partner_id);

CREATE TABLE IF NOT EXISTS activities (
    account_id TEXT NOT NULL REFERENCES accounts(id) ON DELETE CASCADE,
    day TEXT NOT NULL,
    steps INTEGER NOT NULL CHECK (steps >= 0),
    duration_secs INTEGER NOT NULL DEFAULT 0,
    distance_km REAL NOT NULL DEFAULT 0,
    calories INTEGER NOT NULL DEFAULT 0,
    source TEXT,
    steps_transferred INTEGER NOT NULL DEFAULT 0,
    created_at TEXT NOT NULL,
    updated_at TEXT NOT NULL,
    PRIMARY KEY (account_id, day)
);

CREATE INDEX IF NOT EXISTS idx_activities_day ON activities(day);

CREATE TABLE IF NOT EXISTS reward_transactions (
    id TEXT PRIMARY KEY NOT NULL,
    account_id TEXT NOT NULL REFERENCES accounts(id) ON DELETE CASCADE,
    amount INTEGER NOT NULL,
    kind TEXT NOT NULL,
    reason TEXT NOT NULL,
    reward_day TEXT,
    created_at TEXT NOT NULL
);

CREATE UNIQUE INDEX IF NOT EXISTS idx_reward_transactions_day
    ON reward_transactions(account_id, reward_day) WHERE kind = 'EARNED';
CREATE INDEX IF NOT EXISTS idx_reward_transactions_account
    ON reward_transactions(account_id, created_at);

CREATE TABLE IF NOT EXISTS redemptions (
    token TEXT PRIMARY KEY NOT NULL,
    account_id TEXT NOT NULL REFERENCES accounts(id) ON DELETE CASCADE,
    kind TEXT NOT NULL,
    template_id TEXT REFERENCES coupon_templates(id),
    promotion_id TEXT REFERENCES promotions(id),
    consumed INTEGER NOT NULL DEFAULT 0,
    consumed_at TEXT,
    purchased_at TEXT NOT NULL,
    CHECK ((kind = 'coupon' AND template_id IS NOT NULL)
        OR (kind = 'promotion' AND promotion_id IS NOT NULL))
);

CREATE INDEX IF NOT EXISTS idx_redemptions_account ON redemptions(account_id);
CREATE INDEX IF NOT EXISTS idx_redemptions_promotion ON redemptions(promotion_id, account_id);

CREATE TABLE IF NOT EXISTS watermarks (
    job TEXT PRIMARY KEY NOT NULL,
    day TEXT NOT NULL,
    updated_at TEXT NOT NULL
);
"#;
