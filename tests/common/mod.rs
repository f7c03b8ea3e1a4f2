#![allow(dead_code)]

use chrono::{NaiveDateTime, SubsecRound, Utc};
use tempfile::tempdir;
use tracing_subscriber::EnvFilter;
use typed_dao::prelude::*;

pub const SCHEMA: &str = "
    CREATE TABLE IF NOT EXISTS likes (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        user_id INTEGER NOT NULL,
        partner_id INTEGER NOT NULL,
        created_at TEXT NOT NULL
    );
    CREATE TABLE IF NOT EXISTS users (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        nickname TEXT NOT NULL,
        bio TEXT NULL,
        created_at TEXT NOT NULL
    );
";

pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

pub fn unique_db_path(prefix: &str) -> String {
    let dir = tempdir().expect("tempdir");
    let path = dir.path().join(format!("{prefix}.db"));
    // Leak the tempdir so the file persists for the duration of the test binary.
    std::mem::forget(dir);
    path.to_string_lossy().into_owned()
}

/// Fresh file-backed database with the fixture schema applied.
pub async fn setup(prefix: &str, pool_size: u32) -> SqliteDatabase {
    init_tracing();
    let db = SqliteDatabase::builder(unique_db_path(prefix))
        .pool_size(pool_size)
        .build()
        .await
        .expect("sqlite pool");
    db.execute_batch(&QueryContext::background(), SCHEMA)
        .await
        .expect("schema");
    db
}

/// Empty `table` so a test starts from a known state.
pub async fn truncate(db: &SqliteDatabase, table: &str) {
    let ctx = QueryContext::background();
    if let Err(err) = execute(db, &ctx, &format!("DELETE FROM {table}"), &[]).await {
        tracing::warn!(table, error = %err, "failed to truncate table");
    }
}

/// Current time at second precision, as stored by the fixtures.
pub fn now() -> NaiveDateTime {
    Utc::now().naive_utc().trunc_subsecs(0)
}

#[derive(Debug, Default, Clone, PartialEq)]
pub struct Like {
    pub id: i64,
    pub user_id: i64,
    pub partner_id: i64,
    pub created_at: NaiveDateTime,
}

impl_row!(Like {
    id,
    user_id,
    partner_id,
    created_at,
});

#[derive(Debug, Default, Clone, PartialEq)]
pub struct User {
    pub id: i64,
    pub nickname: String,
    pub bio: Option<String>,
    pub created_at: NaiveDateTime,
}

impl_row!(User {
    id,
    nickname,
    bio,
    created_at,
});

const LIKE_COLUMNS: &str = "id, user_id, partner_id, created_at";
const USER_COLUMNS: &str = "id, nickname, bio, created_at";

pub struct LikeRepo<'a> {
    db: &'a SqliteDatabase,
}

impl<'a> LikeRepo<'a> {
    pub fn new(db: &'a SqliteDatabase) -> Self {
        Self { db }
    }

    pub async fn create(&self, ctx: &QueryContext, mut like: Like) -> Result<Like, DaoError> {
        like.id = create(
            self.db,
            ctx,
            "INSERT INTO likes (user_id, partner_id, created_at) VALUES (?, ?, ?)",
            &[
                like.user_id.to_value(),
                like.partner_id.to_value(),
                like.created_at.to_value(),
            ],
        )
        .await?;
        Ok(like)
    }

    pub async fn get_by_pair(
        &self,
        ctx: &QueryContext,
        user_id: i64,
        partner_id: i64,
    ) -> Result<Like, DaoError> {
        get_row(
            self.db,
            ctx,
            &format!("SELECT {LIKE_COLUMNS} FROM likes WHERE user_id = ? AND partner_id = ? LIMIT 1"),
            &[RowValues::Int(user_id), RowValues::Int(partner_id)],
        )
        .await
    }

    pub async fn count(&self, ctx: &QueryContext) -> Result<i64, DaoError> {
        get_column(self.db, ctx, "SELECT COUNT(*) FROM likes", &[]).await
    }

    pub fn find_by_user(&self, ctx: &QueryContext, user_id: i64) -> RowStream<'a, Like> {
        find_rows(
            self.db,
            ctx,
            &format!("SELECT {LIKE_COLUMNS} FROM likes WHERE user_id = ? ORDER BY id"),
            &[RowValues::Int(user_id)],
        )
    }
}

pub struct UserRepo<'a> {
    db: &'a SqliteDatabase,
}

impl<'a> UserRepo<'a> {
    pub fn new(db: &'a SqliteDatabase) -> Self {
        Self { db }
    }

    pub async fn create(&self, ctx: &QueryContext, mut user: User) -> Result<User, DaoError> {
        user.id = create(
            self.db,
            ctx,
            "INSERT INTO users (nickname, bio, created_at) VALUES (?, ?, ?)",
            &[
                user.nickname.to_value(),
                user.bio.to_value(),
                user.created_at.to_value(),
            ],
        )
        .await?;
        Ok(user)
    }

    pub async fn get_by_id(&self, ctx: &QueryContext, id: i64) -> Result<User, DaoError> {
        get_row(
            self.db,
            ctx,
            &format!("SELECT {USER_COLUMNS} FROM users WHERE id = ? LIMIT 1"),
            &[RowValues::Int(id)],
        )
        .await
    }

    pub async fn count(&self, ctx: &QueryContext) -> Result<i64, DaoError> {
        get_column(self.db, ctx, "SELECT COUNT(*) FROM users", &[]).await
    }

    pub async fn update_bio(
        &self,
        ctx: &QueryContext,
        id: i64,
        bio: Option<&str>,
    ) -> Result<usize, DaoError> {
        execute(
            self.db,
            ctx,
            "UPDATE users SET bio = ? WHERE id = ?",
            &[bio.to_value(), RowValues::Int(id)],
        )
        .await
    }

    pub fn find_by_ids(
        &self,
        ctx: &QueryContext,
        ids: &[i64],
    ) -> Result<RowStream<'a, User>, DaoError> {
        let (placeholders, args) = in_args(ids)?;
        Ok(find_rows(
            self.db,
            ctx,
            &format!("SELECT {USER_COLUMNS} FROM users WHERE id IN ({placeholders}) ORDER BY id"),
            &args,
        ))
    }

    pub fn find_ids_with_bio(&self, ctx: &QueryContext) -> RowStream<'a, i64> {
        find_columns(
            self.db,
            ctx,
            "SELECT id FROM users WHERE bio IS NOT NULL ORDER BY id",
            &[],
        )
    }
}
