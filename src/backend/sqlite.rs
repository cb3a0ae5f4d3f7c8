// 🗄️ SQLite backend - local stand-in for the hosted database, auth and storage
//
// One connection behind a mutex. All statements on tenant tables filter by
// church_id. The mutex is never held across an await: every trait method
// runs its statements synchronously inside `with_conn`.

use super::{
    public_object_url, AuthProvider, AuthSession, AuthUser, AuthUserUpdate, Bucket, BucketSpec,
    DateRange, NewAuthUser, ObjectStorage, StoredObject, TenantScope, TenantStore,
};
use crate::entities::{
    Church, ChurchSettings, Event, Family, Member, MemberDetails, MemberStatus, Role, Transaction,
    TransactionDraft, TransactionType, UserProfile, UserUpdate,
};
use crate::error::{AppError, Result};
use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, Utc};
use rusqlite::{params, params_from_iter, Connection, OptionalExtension, Row};
use sha2::{Digest, Sha256};
use std::collections::HashMap;
use std::path::Path;
use std::sync::Mutex;

const DEFAULT_PUBLIC_URL: &str = "http://localhost:3000";

pub struct SqliteBackend {
    conn: Mutex<Connection>,
    public_url: String,
}

impl SqliteBackend {
    /// Open (or create) a database file and make sure the schema exists
    pub fn open(path: &Path) -> Result<Self> {
        let conn = Connection::open(path)?;
        // Enable WAL mode for crash recovery
        conn.pragma_update(None, "journal_mode", "WAL")?;
        setup_database(&conn)?;
        Ok(Self::from_connection(conn))
    }

    pub fn open_in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory()?;
        setup_database(&conn)?;
        Ok(Self::from_connection(conn))
    }

    fn from_connection(conn: Connection) -> Self {
        SqliteBackend {
            conn: Mutex::new(conn),
            public_url: DEFAULT_PUBLIC_URL.to_string(),
        }
    }

    /// Base URL used when building public object URLs
    pub fn with_public_url(mut self, public_url: &str) -> Self {
        self.public_url = public_url.trim_end_matches('/').to_string();
        self
    }

    fn with_conn<T>(&self, f: impl FnOnce(&Connection) -> Result<T>) -> Result<T> {
        let conn = self.conn.lock().map_err(|_| AppError::LockPoisoned)?;
        f(&conn)
    }

    /// Number of audit events recorded for a tenant
    pub fn count_events(&self, church_id: &str) -> Result<i64> {
        self.with_conn(|conn| {
            let count = conn.query_row(
                "SELECT COUNT(*) FROM events WHERE church_id = ?1",
                [church_id],
                |row| row.get(0),
            )?;
            Ok(count)
        })
    }
}

// ============================================================================
// SCHEMA
// ============================================================================

pub fn setup_database(conn: &Connection) -> Result<()> {
    conn.execute_batch(
        "CREATE TABLE IF NOT EXISTS churches (
            id TEXT PRIMARY KEY,
            name TEXT NOT NULL,
            address TEXT,
            phone TEXT,
            email TEXT,
            primary_color TEXT,
            secondary_color TEXT,
            logo_url TEXT,
            created_at TEXT NOT NULL
        );

        CREATE TABLE IF NOT EXISTS users (
            id TEXT PRIMARY KEY,
            church_id TEXT NOT NULL,
            email TEXT NOT NULL,
            name TEXT NOT NULL,
            role TEXT NOT NULL,
            photo_url TEXT,
            created_at TEXT NOT NULL
        );

        CREATE TABLE IF NOT EXISTS families (
            id TEXT PRIMARY KEY,
            church_id TEXT NOT NULL,
            name TEXT NOT NULL,
            created_at TEXT NOT NULL
        );

        CREATE TABLE IF NOT EXISTS members (
            id TEXT PRIMARY KEY,
            church_id TEXT NOT NULL,
            name TEXT NOT NULL,
            email TEXT,
            phone TEXT,
            birth_date TEXT,
            profession TEXT,
            cpf TEXT,
            photo_url TEXT,
            address TEXT,
            neighborhood TEXT,
            city TEXT,
            state TEXT,
            zip_code TEXT,
            position TEXT NOT NULL,
            entry_date TEXT NOT NULL,
            baptism_date TEXT,
            status TEXT NOT NULL,
            spouse_name TEXT,
            children_names TEXT NOT NULL DEFAULT '[]',
            family_id TEXT,
            created_at TEXT NOT NULL
        );

        CREATE TABLE IF NOT EXISTS transactions (
            id TEXT PRIMARY KEY,
            church_id TEXT NOT NULL,
            type TEXT NOT NULL,
            category TEXT NOT NULL,
            amount REAL NOT NULL,
            date TEXT NOT NULL,
            description TEXT NOT NULL DEFAULT '',
            member_id TEXT,
            created_at TEXT NOT NULL,
            updated_at TEXT
        );

        CREATE TABLE IF NOT EXISTS events (
            event_id TEXT PRIMARY KEY,
            timestamp TEXT NOT NULL,
            event_type TEXT NOT NULL,
            entity_type TEXT NOT NULL,
            entity_id TEXT NOT NULL,
            church_id TEXT NOT NULL,
            data TEXT NOT NULL,
            actor TEXT NOT NULL
        );

        CREATE TABLE IF NOT EXISTS auth_users (
            id TEXT PRIMARY KEY,
            email TEXT UNIQUE NOT NULL,
            password_hash TEXT NOT NULL,
            salt TEXT NOT NULL,
            email_confirmed INTEGER NOT NULL DEFAULT 0,
            user_metadata TEXT NOT NULL DEFAULT '{}',
            created_at TEXT NOT NULL
        );

        CREATE TABLE IF NOT EXISTS auth_sessions (
            token TEXT PRIMARY KEY,
            user_id TEXT NOT NULL,
            created_at TEXT NOT NULL
        );

        CREATE TABLE IF NOT EXISTS buckets (
            name TEXT PRIMARY KEY,
            public INTEGER NOT NULL DEFAULT 0,
            file_size_limit INTEGER,
            allowed_mime_types TEXT NOT NULL DEFAULT '[]'
        );

        CREATE TABLE IF NOT EXISTS objects (
            bucket TEXT NOT NULL,
            path TEXT NOT NULL,
            content_type TEXT NOT NULL,
            bytes BLOB NOT NULL,
            created_at TEXT NOT NULL,
            PRIMARY KEY (bucket, path)
        );

        CREATE INDEX IF NOT EXISTS idx_users_church ON users(church_id);
        CREATE INDEX IF NOT EXISTS idx_families_church ON families(church_id);
        CREATE INDEX IF NOT EXISTS idx_members_church ON members(church_id);
        CREATE INDEX IF NOT EXISTS idx_transactions_church_date ON transactions(church_id, date);
        CREATE INDEX IF NOT EXISTS idx_events_entity ON events(entity_type, entity_id);

        -- upload targets, readable through their public URLs
        INSERT OR IGNORE INTO buckets (name, public) VALUES
            ('logos', 1), ('member-photos', 1), ('user-photos', 1);",
    )?;

    Ok(())
}

// ============================================================================
// ROW MAPPING
// ============================================================================

#[derive(Debug, thiserror::Error)]
#[error("unexpected value in column {column}: {value}")]
struct UnexpectedValue {
    column: String,
    value: String,
}

fn conversion_error(
    column: &str,
    err: impl std::error::Error + Send + Sync + 'static,
) -> rusqlite::Error {
    tracing::error!(column, "column conversion failed: {}", err);
    rusqlite::Error::FromSqlConversionFailure(0, rusqlite::types::Type::Text, Box::new(err))
}

fn unexpected(column: &str, value: String) -> rusqlite::Error {
    conversion_error(
        column,
        UnexpectedValue {
            column: column.to_string(),
            value,
        },
    )
}

fn date_to_sql(date: NaiveDate) -> String {
    date.format("%Y-%m-%d").to_string()
}

fn get_date(row: &Row, column: &str) -> rusqlite::Result<NaiveDate> {
    let raw: String = row.get(column)?;
    NaiveDate::parse_from_str(&raw, "%Y-%m-%d").map_err(|e| conversion_error(column, e))
}

fn get_opt_date(row: &Row, column: &str) -> rusqlite::Result<Option<NaiveDate>> {
    let raw: Option<String> = row.get(column)?;
    raw.map(|s| NaiveDate::parse_from_str(&s, "%Y-%m-%d"))
        .transpose()
        .map_err(|e| conversion_error(column, e))
}

fn get_timestamp(row: &Row, column: &str) -> rusqlite::Result<Option<DateTime<Utc>>> {
    let raw: Option<String> = row.get(column)?;
    Ok(raw
        .and_then(|s| DateTime::parse_from_rfc3339(&s).ok())
        .map(|dt| dt.with_timezone(&Utc)))
}

fn church_from_row(row: &Row) -> rusqlite::Result<Church> {
    Ok(Church {
        id: row.get("id")?,
        name: row.get("name")?,
        address: row.get("address")?,
        phone: row.get("phone")?,
        email: row.get("email")?,
        primary_color: row.get("primary_color")?,
        secondary_color: row.get("secondary_color")?,
        logo_url: row.get("logo_url")?,
        created_at: get_timestamp(row, "created_at")?,
    })
}

fn user_from_row(row: &Row) -> rusqlite::Result<UserProfile> {
    let role: String = row.get("role")?;
    Ok(UserProfile {
        id: row.get("id")?,
        church_id: row.get("church_id")?,
        email: row.get("email")?,
        name: row.get("name")?,
        role: Role::parse(&role).ok_or_else(|| unexpected("role", role.clone()))?,
        photo_url: row.get("photo_url")?,
        created_at: get_timestamp(row, "created_at")?,
    })
}

fn family_from_row(row: &Row) -> rusqlite::Result<Family> {
    Ok(Family {
        id: row.get("id")?,
        church_id: row.get("church_id")?,
        name: row.get("name")?,
        created_at: get_timestamp(row, "created_at")?,
    })
}

fn member_from_row(row: &Row) -> rusqlite::Result<Member> {
    let status: String = row.get("status")?;
    let children_json: String = row.get("children_names")?;
    let children_names: Vec<String> =
        serde_json::from_str(&children_json).map_err(|e| conversion_error("children_names", e))?;

    Ok(Member {
        id: row.get("id")?,
        church_id: row.get("church_id")?,
        details: MemberDetails {
            name: row.get("name")?,
            email: row.get("email")?,
            phone: row.get("phone")?,
            birth_date: get_opt_date(row, "birth_date")?,
            profession: row.get("profession")?,
            cpf: row.get("cpf")?,
            photo_url: row.get("photo_url")?,
            address: row.get("address")?,
            neighborhood: row.get("neighborhood")?,
            city: row.get("city")?,
            state: row.get("state")?,
            zip_code: row.get("zip_code")?,
            position: row.get("position")?,
            entry_date: get_date(row, "entry_date")?,
            baptism_date: get_opt_date(row, "baptism_date")?,
            status: MemberStatus::parse_or_default(&status),
            spouse_name: row.get("spouse_name")?,
            children_names,
            family_id: row.get("family_id")?,
        },
        created_at: get_timestamp(row, "created_at")?,
    })
}

fn transaction_from_row(row: &Row) -> rusqlite::Result<Transaction> {
    let kind: String = row.get("type")?;
    Ok(Transaction {
        id: row.get("id")?,
        church_id: row.get("church_id")?,
        kind: TransactionType::parse(&kind).ok_or_else(|| unexpected("type", kind.clone()))?,
        category: row.get("category")?,
        amount: row.get("amount")?,
        date: get_date(row, "date")?,
        description: row.get("description")?,
        member_id: row.get("member_id")?,
        created_at: get_timestamp(row, "created_at")?,
        updated_at: get_timestamp(row, "updated_at")?,
    })
}

fn auth_user_from_row(row: &Row) -> rusqlite::Result<AuthUser> {
    let metadata: String = row.get("user_metadata")?;
    Ok(AuthUser {
        id: row.get("id")?,
        email: row.get("email")?,
        user_metadata: serde_json::from_str(&metadata)
            .map_err(|e| conversion_error("user_metadata", e))?,
    })
}

fn new_id() -> String {
    uuid::Uuid::new_v4().to_string()
}

fn hash_password(salt: &str, password: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(format!("{}:{}", salt, password));
    format!("{:x}", hasher.finalize())
}

// ============================================================================
// TENANT STORE
// ============================================================================

const MEMBER_COLUMNS: &str = "name, email, phone, birth_date, profession, cpf, photo_url,
    address, neighborhood, city, state, zip_code,
    position, entry_date, baptism_date, status,
    spouse_name, children_names, family_id";

#[async_trait]
impl TenantStore for SqliteBackend {
    async fn get_church(&self, church_id: &str) -> Result<Option<Church>> {
        self.with_conn(|conn| {
            let church = conn
                .query_row("SELECT * FROM churches WHERE id = ?1", [church_id], church_from_row)
                .optional()?;
            Ok(church)
        })
    }

    async fn find_church_by_name(&self, name: &str) -> Result<Option<Church>> {
        self.with_conn(|conn| {
            let church = conn
                .query_row(
                    "SELECT * FROM churches WHERE name = ?1 ORDER BY created_at LIMIT 1",
                    [name],
                    church_from_row,
                )
                .optional()?;
            Ok(church)
        })
    }

    async fn insert_church(&self, name: &str) -> Result<Church> {
        let church = Church {
            id: new_id(),
            name: name.to_string(),
            address: None,
            phone: None,
            email: None,
            primary_color: None,
            secondary_color: None,
            logo_url: None,
            created_at: Some(Utc::now()),
        };

        self.with_conn(|conn| {
            conn.execute(
                "INSERT INTO churches (id, name, created_at) VALUES (?1, ?2, ?3)",
                params![church.id, church.name, Utc::now().to_rfc3339()],
            )?;
            Ok(())
        })?;

        Ok(church)
    }

    async fn update_church(&self, scope: &TenantScope, settings: &ChurchSettings) -> Result<bool> {
        self.with_conn(|conn| {
            let changed = conn.execute(
                "UPDATE churches
                 SET name = ?2, address = ?3, phone = ?4, email = ?5,
                     primary_color = ?6, secondary_color = ?7
                 WHERE id = ?1",
                params![
                    scope.church_id(),
                    settings.name,
                    settings.address,
                    settings.phone,
                    settings.email,
                    settings.primary_color,
                    settings.secondary_color,
                ],
            )?;
            Ok(changed > 0)
        })
    }

    async fn set_church_logo(&self, scope: &TenantScope, logo_url: &str) -> Result<bool> {
        self.with_conn(|conn| {
            let changed = conn.execute(
                "UPDATE churches SET logo_url = ?2 WHERE id = ?1",
                params![scope.church_id(), logo_url],
            )?;
            Ok(changed > 0)
        })
    }

    async fn get_user_profile(&self, user_id: &str) -> Result<Option<UserProfile>> {
        self.with_conn(|conn| {
            let user = conn
                .query_row("SELECT * FROM users WHERE id = ?1", [user_id], user_from_row)
                .optional()?;
            Ok(user)
        })
    }

    async fn list_users(&self, scope: &TenantScope) -> Result<Vec<UserProfile>> {
        self.with_conn(|conn| {
            let mut stmt =
                conn.prepare("SELECT * FROM users WHERE church_id = ?1 ORDER BY name")?;
            let users = stmt
                .query_map([scope.church_id()], user_from_row)?
                .collect::<std::result::Result<Vec<_>, _>>()?;
            Ok(users)
        })
    }

    async fn get_user(&self, scope: &TenantScope, user_id: &str) -> Result<Option<UserProfile>> {
        self.with_conn(|conn| {
            let user = conn
                .query_row(
                    "SELECT * FROM users WHERE id = ?1 AND church_id = ?2",
                    [user_id, scope.church_id()],
                    user_from_row,
                )
                .optional()?;
            Ok(user)
        })
    }

    async fn user_email_taken(&self, scope: &TenantScope, email: &str) -> Result<bool> {
        self.with_conn(|conn| {
            let found: Option<String> = conn
                .query_row(
                    "SELECT id FROM users WHERE church_id = ?1 AND lower(email) = lower(?2) LIMIT 1",
                    [scope.church_id(), email],
                    |row| row.get(0),
                )
                .optional()?;
            Ok(found.is_some())
        })
    }

    async fn insert_user(&self, profile: &UserProfile) -> Result<()> {
        self.with_conn(|conn| {
            conn.execute(
                "INSERT INTO users (id, church_id, email, name, role, photo_url, created_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
                params![
                    profile.id,
                    profile.church_id,
                    profile.email,
                    profile.name,
                    profile.role.as_str(),
                    profile.photo_url,
                    Utc::now().to_rfc3339(),
                ],
            )?;
            Ok(())
        })
    }

    async fn update_user(
        &self,
        scope: &TenantScope,
        user_id: &str,
        update: &UserUpdate,
    ) -> Result<bool> {
        self.with_conn(|conn| {
            let changed = conn.execute(
                "UPDATE users SET name = ?3, role = ?4, photo_url = ?5
                 WHERE id = ?1 AND church_id = ?2",
                params![
                    user_id,
                    scope.church_id(),
                    update.name,
                    update.role.as_str(),
                    update.photo_url,
                ],
            )?;
            Ok(changed > 0)
        })
    }

    async fn delete_user(&self, scope: &TenantScope, user_id: &str) -> Result<bool> {
        self.with_conn(|conn| {
            let changed = conn.execute(
                "DELETE FROM users WHERE id = ?1 AND church_id = ?2",
                [user_id, scope.church_id()],
            )?;
            Ok(changed > 0)
        })
    }

    async fn insert_family(&self, scope: &TenantScope, name: &str) -> Result<Family> {
        let family = Family {
            id: new_id(),
            church_id: scope.church_id().to_string(),
            name: name.to_string(),
            created_at: Some(Utc::now()),
        };

        self.with_conn(|conn| {
            conn.execute(
                "INSERT INTO families (id, church_id, name, created_at) VALUES (?1, ?2, ?3, ?4)",
                params![family.id, family.church_id, family.name, Utc::now().to_rfc3339()],
            )?;
            Ok(())
        })?;

        Ok(family)
    }

    async fn list_families(&self, scope: &TenantScope) -> Result<Vec<Family>> {
        self.with_conn(|conn| {
            let mut stmt =
                conn.prepare("SELECT * FROM families WHERE church_id = ?1 ORDER BY name")?;
            let families = stmt
                .query_map([scope.church_id()], family_from_row)?
                .collect::<std::result::Result<Vec<_>, _>>()?;
            Ok(families)
        })
    }

    async fn get_family(&self, scope: &TenantScope, family_id: &str) -> Result<Option<Family>> {
        self.with_conn(|conn| {
            let family = conn
                .query_row(
                    "SELECT * FROM families WHERE id = ?1 AND church_id = ?2",
                    [family_id, scope.church_id()],
                    family_from_row,
                )
                .optional()?;
            Ok(family)
        })
    }

    async fn list_members(&self, scope: &TenantScope) -> Result<Vec<Member>> {
        self.with_conn(|conn| {
            let mut stmt = conn.prepare(
                "SELECT * FROM members WHERE church_id = ?1 ORDER BY entry_date DESC, name",
            )?;
            let members = stmt
                .query_map([scope.church_id()], member_from_row)?
                .collect::<std::result::Result<Vec<_>, _>>()?;
            Ok(members)
        })
    }

    async fn get_member(&self, scope: &TenantScope, member_id: &str) -> Result<Option<Member>> {
        self.with_conn(|conn| {
            let member = conn
                .query_row(
                    "SELECT * FROM members WHERE id = ?1 AND church_id = ?2",
                    [member_id, scope.church_id()],
                    member_from_row,
                )
                .optional()?;
            Ok(member)
        })
    }

    async fn member_email_taken(
        &self,
        scope: &TenantScope,
        email: &str,
        exclude_id: Option<&str>,
    ) -> Result<bool> {
        self.with_conn(|conn| {
            let found: Option<String> = conn
                .query_row(
                    "SELECT id FROM members
                     WHERE church_id = ?1 AND email = ?2 AND (?3 IS NULL OR id <> ?3)
                     LIMIT 1",
                    params![scope.church_id(), email, exclude_id],
                    |row| row.get(0),
                )
                .optional()?;
            Ok(found.is_some())
        })
    }

    async fn insert_member(&self, scope: &TenantScope, details: &MemberDetails) -> Result<Member> {
        let member = Member {
            id: new_id(),
            church_id: scope.church_id().to_string(),
            details: details.clone(),
            created_at: Some(Utc::now()),
        };
        let children = serde_json::to_string(&details.children_names)?;

        self.with_conn(|conn| {
            conn.execute(
                &format!(
                    "INSERT INTO members (id, church_id, created_at, {MEMBER_COLUMNS})
                     VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14, ?15,
                             ?16, ?17, ?18, ?19, ?20, ?21, ?22)"
                ),
                params![
                    member.id,
                    member.church_id,
                    Utc::now().to_rfc3339(),
                    details.name,
                    details.email,
                    details.phone,
                    details.birth_date.map(date_to_sql),
                    details.profession,
                    details.cpf,
                    details.photo_url,
                    details.address,
                    details.neighborhood,
                    details.city,
                    details.state,
                    details.zip_code,
                    details.position,
                    date_to_sql(details.entry_date),
                    details.baptism_date.map(date_to_sql),
                    details.status.as_str(),
                    details.spouse_name,
                    children,
                    details.family_id,
                ],
            )?;
            Ok(())
        })?;

        Ok(member)
    }

    async fn update_member(
        &self,
        scope: &TenantScope,
        member_id: &str,
        details: &MemberDetails,
    ) -> Result<bool> {
        let children = serde_json::to_string(&details.children_names)?;

        self.with_conn(|conn| {
            let changed = conn.execute(
                "UPDATE members SET
                    name = ?3, email = ?4, phone = ?5, birth_date = ?6, profession = ?7,
                    cpf = ?8, photo_url = ?9, address = ?10, neighborhood = ?11, city = ?12,
                    state = ?13, zip_code = ?14, position = ?15, entry_date = ?16,
                    baptism_date = ?17, status = ?18, spouse_name = ?19,
                    children_names = ?20, family_id = ?21
                 WHERE id = ?1 AND church_id = ?2",
                params![
                    member_id,
                    scope.church_id(),
                    details.name,
                    details.email,
                    details.phone,
                    details.birth_date.map(date_to_sql),
                    details.profession,
                    details.cpf,
                    details.photo_url,
                    details.address,
                    details.neighborhood,
                    details.city,
                    details.state,
                    details.zip_code,
                    details.position,
                    date_to_sql(details.entry_date),
                    details.baptism_date.map(date_to_sql),
                    details.status.as_str(),
                    details.spouse_name,
                    children,
                    details.family_id,
                ],
            )?;
            Ok(changed > 0)
        })
    }

    async fn delete_member(&self, scope: &TenantScope, member_id: &str) -> Result<bool> {
        self.with_conn(|conn| {
            let changed = conn.execute(
                "DELETE FROM members WHERE id = ?1 AND church_id = ?2",
                [member_id, scope.church_id()],
            )?;
            Ok(changed > 0)
        })
    }

    async fn count_active_members(&self, scope: &TenantScope) -> Result<u64> {
        self.with_conn(|conn| {
            let count: i64 = conn.query_row(
                "SELECT COUNT(*) FROM members WHERE church_id = ?1 AND status = 'active'",
                [scope.church_id()],
                |row| row.get(0),
            )?;
            Ok(u64::try_from(count).unwrap_or_default())
        })
    }

    async fn member_names(
        &self,
        scope: &TenantScope,
        member_ids: &[String],
    ) -> Result<HashMap<String, String>> {
        if member_ids.is_empty() {
            return Ok(HashMap::new());
        }

        self.with_conn(|conn| {
            let placeholders = (0..member_ids.len())
                .map(|i| format!("?{}", i + 2))
                .collect::<Vec<_>>()
                .join(", ");
            let sql = format!(
                "SELECT id, name FROM members WHERE church_id = ?1 AND id IN ({placeholders})"
            );
            let mut stmt = conn.prepare(&sql)?;
            let values = std::iter::once(scope.church_id())
                .chain(member_ids.iter().map(String::as_str));
            let names = stmt
                .query_map(params_from_iter(values), |row| {
                    Ok((row.get::<_, String>(0)?, row.get::<_, String>(1)?))
                })?
                .collect::<std::result::Result<HashMap<_, _>, _>>()?;
            Ok(names)
        })
    }

    async fn list_transactions(
        &self,
        scope: &TenantScope,
        range: Option<DateRange>,
    ) -> Result<Vec<Transaction>> {
        let from = range.map(|r| date_to_sql(r.from));
        let to = range.map(|r| date_to_sql(r.to));

        self.with_conn(|conn| {
            let mut stmt = conn.prepare(
                "SELECT * FROM transactions
                 WHERE church_id = ?1
                   AND (?2 IS NULL OR date >= ?2)
                   AND (?3 IS NULL OR date <= ?3)
                 ORDER BY date DESC, created_at DESC",
            )?;
            let transactions = stmt
                .query_map(params![scope.church_id(), from, to], transaction_from_row)?
                .collect::<std::result::Result<Vec<_>, _>>()?;
            Ok(transactions)
        })
    }

    async fn get_transaction(
        &self,
        scope: &TenantScope,
        tx_id: &str,
    ) -> Result<Option<Transaction>> {
        self.with_conn(|conn| {
            let tx = conn
                .query_row(
                    "SELECT * FROM transactions WHERE id = ?1 AND church_id = ?2",
                    [tx_id, scope.church_id()],
                    transaction_from_row,
                )
                .optional()?;
            Ok(tx)
        })
    }

    async fn insert_transaction(
        &self,
        scope: &TenantScope,
        draft: &TransactionDraft,
    ) -> Result<Transaction> {
        let now = Utc::now();
        let tx = Transaction {
            id: new_id(),
            church_id: scope.church_id().to_string(),
            kind: draft.kind,
            category: draft.category.as_str().to_string(),
            amount: draft.amount,
            date: draft.date,
            description: draft.description.clone(),
            member_id: draft.member_id.clone(),
            created_at: Some(now),
            updated_at: None,
        };

        self.with_conn(|conn| {
            conn.execute(
                "INSERT INTO transactions (
                    id, church_id, type, category, amount, date, description, member_id, created_at
                 ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)",
                params![
                    tx.id,
                    tx.church_id,
                    tx.kind.as_str(),
                    tx.category,
                    tx.amount,
                    date_to_sql(tx.date),
                    tx.description,
                    tx.member_id,
                    now.to_rfc3339(),
                ],
            )?;
            Ok(())
        })?;

        Ok(tx)
    }

    async fn update_transaction(
        &self,
        scope: &TenantScope,
        tx_id: &str,
        draft: &TransactionDraft,
    ) -> Result<bool> {
        self.with_conn(|conn| {
            let changed = conn.execute(
                "UPDATE transactions
                 SET type = ?3, category = ?4, amount = ?5, date = ?6,
                     description = ?7, member_id = ?8, updated_at = ?9
                 WHERE id = ?1 AND church_id = ?2",
                params![
                    tx_id,
                    scope.church_id(),
                    draft.kind.as_str(),
                    draft.category.as_str(),
                    draft.amount,
                    date_to_sql(draft.date),
                    draft.description,
                    draft.member_id,
                    Utc::now().to_rfc3339(),
                ],
            )?;
            Ok(changed > 0)
        })
    }

    async fn delete_transaction(&self, scope: &TenantScope, tx_id: &str) -> Result<bool> {
        self.with_conn(|conn| {
            let changed = conn.execute(
                "DELETE FROM transactions WHERE id = ?1 AND church_id = ?2",
                [tx_id, scope.church_id()],
            )?;
            Ok(changed > 0)
        })
    }

    async fn append_event(&self, event: &Event) -> Result<()> {
        let data_json = serde_json::to_string(&event.data)?;

        self.with_conn(|conn| {
            conn.execute(
                "INSERT INTO events (
                    event_id, timestamp, event_type, entity_type, entity_id, church_id, data, actor
                 ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
                params![
                    event.event_id,
                    event.timestamp.to_rfc3339(),
                    event.event_type,
                    event.entity_type,
                    event.entity_id,
                    event.church_id,
                    data_json,
                    event.actor,
                ],
            )?;
            Ok(())
        })
    }
}

// ============================================================================
// AUTH PROVIDER
// ============================================================================

impl SqliteBackend {
    fn create_auth_user(
        &self,
        email: &str,
        password: &str,
        confirmed: bool,
        metadata: &serde_json::Value,
    ) -> Result<AuthUser> {
        let email = email.trim().to_lowercase();
        let salt = uuid::Uuid::new_v4().simple().to_string();
        let user = AuthUser {
            id: new_id(),
            email: Some(email.clone()),
            user_metadata: metadata.clone(),
        };
        let metadata_json = serde_json::to_string(metadata)?;

        self.with_conn(|conn| {
            let result = conn.execute(
                "INSERT INTO auth_users (
                    id, email, password_hash, salt, email_confirmed, user_metadata, created_at
                 ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
                params![
                    user.id,
                    email,
                    hash_password(&salt, password),
                    salt,
                    confirmed,
                    metadata_json,
                    Utc::now().to_rfc3339(),
                ],
            );

            match result {
                Ok(_) => Ok(()),
                Err(rusqlite::Error::SqliteFailure(err, _))
                    if err.code == rusqlite::ErrorCode::ConstraintViolation =>
                {
                    Err(AppError::auth(
                        "A user with this email address has already been registered",
                    ))
                }
                Err(e) => Err(e.into()),
            }
        })?;

        Ok(user)
    }

    fn open_session(&self, conn: &Connection, user_id: &str) -> Result<String> {
        let token = uuid::Uuid::new_v4().simple().to_string();
        conn.execute(
            "INSERT INTO auth_sessions (token, user_id, created_at) VALUES (?1, ?2, ?3)",
            params![token, user_id, Utc::now().to_rfc3339()],
        )?;
        Ok(token)
    }
}

#[async_trait]
impl AuthProvider for SqliteBackend {
    async fn sign_in_with_password(&self, email: &str, password: &str) -> Result<AuthSession> {
        let email = email.trim().to_lowercase();

        self.with_conn(|conn| {
            let found = conn
                .query_row(
                    "SELECT id, email, user_metadata, password_hash, salt
                     FROM auth_users WHERE email = ?1",
                    [&email],
                    |row| {
                        Ok((
                            auth_user_from_row(row)?,
                            row.get::<_, String>("password_hash")?,
                            row.get::<_, String>("salt")?,
                        ))
                    },
                )
                .optional()?;

            let (user, stored_hash, salt) =
                found.ok_or_else(|| AppError::auth("Invalid login credentials"))?;
            if hash_password(&salt, password) != stored_hash {
                return Err(AppError::auth("Invalid login credentials"));
            }

            let access_token = self.open_session(conn, &user.id)?;
            Ok(AuthSession { access_token, user })
        })
    }

    async fn sign_up(&self, email: &str, password: &str) -> Result<AuthUser> {
        self.create_auth_user(email, password, true, &serde_json::json!({}))
    }

    async fn get_user(&self, access_token: &str) -> Result<Option<AuthUser>> {
        self.with_conn(|conn| {
            let user = conn
                .query_row(
                    "SELECT u.id, u.email, u.user_metadata
                     FROM auth_sessions s JOIN auth_users u ON u.id = s.user_id
                     WHERE s.token = ?1",
                    [access_token],
                    auth_user_from_row,
                )
                .optional()?;
            Ok(user)
        })
    }

    async fn sign_out(&self, access_token: &str) -> Result<()> {
        self.with_conn(|conn| {
            conn.execute("DELETE FROM auth_sessions WHERE token = ?1", [access_token])?;
            Ok(())
        })
    }

    async fn admin_create_user(&self, user: &NewAuthUser) -> Result<AuthUser> {
        self.create_auth_user(
            &user.email,
            &user.password,
            user.email_confirm,
            &user.user_metadata,
        )
    }

    async fn admin_list_users(&self, page: u32, per_page: u32) -> Result<Vec<AuthUser>> {
        let offset = i64::from(page.saturating_sub(1)) * i64::from(per_page);

        self.with_conn(|conn| {
            let mut stmt = conn.prepare(
                "SELECT id, email, user_metadata FROM auth_users
                 ORDER BY created_at LIMIT ?1 OFFSET ?2",
            )?;
            let users = stmt
                .query_map(params![i64::from(per_page), offset], auth_user_from_row)?
                .collect::<std::result::Result<Vec<_>, _>>()?;
            Ok(users)
        })
    }

    async fn admin_update_user(&self, user_id: &str, update: &AuthUserUpdate) -> Result<()> {
        let metadata_json = update
            .user_metadata
            .as_ref()
            .map(serde_json::to_string)
            .transpose()?;

        self.with_conn(|conn| {
            let exists: Option<String> = conn
                .query_row("SELECT id FROM auth_users WHERE id = ?1", [user_id], |row| {
                    row.get(0)
                })
                .optional()?;
            if exists.is_none() {
                return Err(AppError::auth("User not found"));
            }

            if let Some(password) = &update.password {
                let salt = uuid::Uuid::new_v4().simple().to_string();
                conn.execute(
                    "UPDATE auth_users SET password_hash = ?2, salt = ?3 WHERE id = ?1",
                    params![user_id, hash_password(&salt, password), salt],
                )?;
            }
            if let Some(metadata) = &metadata_json {
                conn.execute(
                    "UPDATE auth_users SET user_metadata = ?2 WHERE id = ?1",
                    params![user_id, metadata],
                )?;
            }
            Ok(())
        })
    }

    async fn admin_delete_user(&self, user_id: &str) -> Result<()> {
        self.with_conn(|conn| {
            conn.execute("DELETE FROM auth_sessions WHERE user_id = ?1", [user_id])?;
            let changed = conn.execute("DELETE FROM auth_users WHERE id = ?1", [user_id])?;
            if changed == 0 {
                return Err(AppError::auth("User not found"));
            }
            Ok(())
        })
    }
}

// ============================================================================
// OBJECT STORAGE
// ============================================================================

#[async_trait]
impl ObjectStorage for SqliteBackend {
    async fn upload(
        &self,
        bucket: &str,
        path: &str,
        bytes: &[u8],
        content_type: &str,
        upsert: bool,
    ) -> Result<()> {
        self.with_conn(|conn| {
            let sql = if upsert {
                "INSERT OR REPLACE INTO objects (bucket, path, content_type, bytes, created_at)
                 VALUES (?1, ?2, ?3, ?4, ?5)"
            } else {
                "INSERT INTO objects (bucket, path, content_type, bytes, created_at)
                 VALUES (?1, ?2, ?3, ?4, ?5)"
            };
            let result = conn.execute(
                sql,
                params![bucket, path, content_type, bytes, Utc::now().to_rfc3339()],
            );

            match result {
                Ok(_) => Ok(()),
                Err(rusqlite::Error::SqliteFailure(err, _))
                    if err.code == rusqlite::ErrorCode::ConstraintViolation =>
                {
                    Err(AppError::Backend {
                        status: 409,
                        message: "The resource already exists".to_string(),
                    })
                }
                Err(e) => Err(e.into()),
            }
        })
    }

    async fn download(&self, bucket: &str, path: &str) -> Result<Option<StoredObject>> {
        self.with_conn(|conn| {
            let object = conn
                .query_row(
                    "SELECT content_type, bytes FROM objects WHERE bucket = ?1 AND path = ?2",
                    [bucket, path],
                    |row| {
                        Ok(StoredObject {
                            content_type: row.get(0)?,
                            bytes: row.get(1)?,
                        })
                    },
                )
                .optional()?;
            Ok(object)
        })
    }

    fn public_url(&self, bucket: &str, path: &str) -> String {
        public_object_url(&self.public_url, bucket, path)
    }

    async fn list_buckets(&self) -> Result<Vec<Bucket>> {
        self.with_conn(|conn| {
            let mut stmt = conn.prepare("SELECT name, public FROM buckets ORDER BY name")?;
            let buckets = stmt
                .query_map([], |row| {
                    Ok(Bucket {
                        name: row.get(0)?,
                        public: row.get(1)?,
                    })
                })?
                .collect::<std::result::Result<Vec<_>, _>>()?;
            Ok(buckets)
        })
    }

    async fn create_bucket(&self, spec: &BucketSpec) -> Result<()> {
        let mime_types = serde_json::to_string(&spec.allowed_mime_types)?;
        let size_limit = spec.file_size_limit.and_then(|l| i64::try_from(l).ok());

        self.with_conn(|conn| {
            conn.execute(
                "INSERT INTO buckets (name, public, file_size_limit, allowed_mime_types)
                 VALUES (?1, ?2, ?3, ?4)",
                params![spec.name, spec.public, size_limit, mime_types],
            )?;
            Ok(())
        })
    }

    async fn update_bucket(&self, name: &str, public: bool) -> Result<()> {
        self.with_conn(|conn| {
            conn.execute(
                "UPDATE buckets SET public = ?2 WHERE name = ?1",
                params![name, public],
            )?;
            Ok(())
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::entities::Category;

    fn draft(kind: TransactionType, amount: f64, date: &str) -> TransactionDraft {
        TransactionDraft {
            kind,
            category: Category::Oferta,
            amount,
            date: NaiveDate::parse_from_str(date, "%Y-%m-%d").unwrap(),
            description: "culto".to_string(),
            member_id: None,
        }
    }

    #[tokio::test]
    async fn test_transactions_are_scoped_by_church() {
        let db = SqliteBackend::open_in_memory().unwrap();
        let a = db.insert_church("Igreja A").await.unwrap();
        let b = db.insert_church("Igreja B").await.unwrap();
        let scope_a = TenantScope::new(&a.id);
        let scope_b = TenantScope::new(&b.id);

        let tx = db
            .insert_transaction(&scope_a, &draft(TransactionType::Income, 50.0, "2024-02-01"))
            .await
            .unwrap();

        assert_eq!(db.list_transactions(&scope_a, None).await.unwrap().len(), 1);
        assert!(db.list_transactions(&scope_b, None).await.unwrap().is_empty());
        assert!(db.get_transaction(&scope_b, &tx.id).await.unwrap().is_none());
        assert!(!db.delete_transaction(&scope_b, &tx.id).await.unwrap());
        assert!(db.delete_transaction(&scope_a, &tx.id).await.unwrap());
    }

    #[tokio::test]
    async fn test_family_lookup_is_scoped() {
        let db = SqliteBackend::open_in_memory().unwrap();
        let a = db.insert_church("Igreja A").await.unwrap();
        let b = db.insert_church("Igreja B").await.unwrap();
        let family = db
            .insert_family(&TenantScope::new(&a.id), "Família Souza")
            .await
            .unwrap();

        let found = db
            .get_family(&TenantScope::new(&a.id), &family.id)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(found.name, "Família Souza");
        assert!(db
            .get_family(&TenantScope::new(&b.id), &family.id)
            .await
            .unwrap()
            .is_none());
    }

    #[tokio::test]
    async fn test_user_email_taken_ignores_case() {
        let db = SqliteBackend::open_in_memory().unwrap();
        let church = db.insert_church("Igreja").await.unwrap();
        db.insert_user(&UserProfile {
            id: "u1".to_string(),
            church_id: church.id.clone(),
            email: "maria@x.org".to_string(),
            name: "Maria".to_string(),
            role: Role::Treasurer,
            photo_url: None,
            created_at: None,
        })
        .await
        .unwrap();

        let scope = TenantScope::new(&church.id);
        assert!(db.user_email_taken(&scope, "Maria@X.org").await.unwrap());
        assert!(!db.user_email_taken(&scope, "joao@x.org").await.unwrap());
    }

    #[tokio::test]
    async fn test_list_transactions_date_range_and_order() {
        let db = SqliteBackend::open_in_memory().unwrap();
        let church = db.insert_church("Igreja").await.unwrap();
        let scope = TenantScope::new(&church.id);

        for date in ["2023-12-31", "2024-01-15", "2024-03-01"] {
            db.insert_transaction(&scope, &draft(TransactionType::Expense, 10.0, date))
                .await
                .unwrap();
        }

        let range = DateRange {
            from: NaiveDate::from_ymd_opt(2024, 1, 1).unwrap(),
            to: NaiveDate::from_ymd_opt(2024, 12, 31).unwrap(),
        };
        let txs = db.list_transactions(&scope, Some(range)).await.unwrap();
        let dates: Vec<String> = txs.iter().map(|t| t.date.to_string()).collect();
        assert_eq!(dates, vec!["2024-03-01", "2024-01-15"]);
    }

    #[tokio::test]
    async fn test_member_round_trip_and_email_check() {
        let db = SqliteBackend::open_in_memory().unwrap();
        let church = db.insert_church("Igreja").await.unwrap();
        let scope = TenantScope::new(&church.id);

        let mut details =
            MemberDetails::new("Ana", NaiveDate::from_ymd_opt(2020, 1, 5).unwrap());
        details.email = Some("ana@example.com".to_string());
        details.children_names = vec!["Lia".to_string(), "Davi".to_string()];
        let member = db.insert_member(&scope, &details).await.unwrap();

        let loaded = db.get_member(&scope, &member.id).await.unwrap().unwrap();
        assert_eq!(loaded.details, details);

        assert!(db
            .member_email_taken(&scope, "ana@example.com", None)
            .await
            .unwrap());
        assert!(!db
            .member_email_taken(&scope, "ana@example.com", Some(&member.id))
            .await
            .unwrap());
        assert_eq!(db.count_active_members(&scope).await.unwrap(), 1);

        let names = db
            .member_names(&scope, &[member.id.clone(), "missing".to_string()])
            .await
            .unwrap();
        assert_eq!(names.get(&member.id).map(String::as_str), Some("Ana"));
        assert_eq!(names.len(), 1);
    }

    #[tokio::test]
    async fn test_auth_sign_in_and_sessions() {
        let db = SqliteBackend::open_in_memory().unwrap();
        let user = db.sign_up("Pastor@Example.com", "segredo1").await.unwrap();
        assert_eq!(user.email.as_deref(), Some("pastor@example.com"));

        assert!(db.sign_in_with_password("pastor@example.com", "errada").await.is_err());

        let session = db
            .sign_in_with_password("PASTOR@example.com", "segredo1")
            .await
            .unwrap();
        let current = AuthProvider::get_user(&db, &session.access_token).await.unwrap().unwrap();
        assert_eq!(current.id, user.id);

        db.sign_out(&session.access_token).await.unwrap();
        assert!(AuthProvider::get_user(&db, &session.access_token).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_duplicate_auth_email_rejected() {
        let db = SqliteBackend::open_in_memory().unwrap();
        db.sign_up("a@example.com", "123456").await.unwrap();
        let err = db.sign_up("a@example.com", "123456").await.unwrap_err();
        assert!(matches!(err, AppError::Auth { .. }));
    }

    #[tokio::test]
    async fn test_storage_upload_without_upsert_conflicts() {
        let db = SqliteBackend::open_in_memory()
            .unwrap()
            .with_public_url("https://igreja.example/");
        db.upload("logos", "1.png", b"png", "image/png", false)
            .await
            .unwrap();
        assert!(db
            .upload("logos", "1.png", b"png", "image/png", false)
            .await
            .is_err());
        db.upload("logos", "1.png", b"new", "image/png", true)
            .await
            .unwrap();

        let object = db.download("logos", "1.png").await.unwrap().unwrap();
        assert_eq!(object.bytes, b"new".to_vec());
        assert_eq!(
            db.public_url("logos", "1.png"),
            "https://igreja.example/storage/v1/object/public/logos/1.png"
        );
    }
}
