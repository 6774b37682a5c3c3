use crate::entities;
use crate::errors::DashError;
use crate::secrets::SecretCipher;
use crate::settings::Database as DbCfg;
use base64ct::Encoding;
use chrono::Utc;
use migration::{Migrator, MigratorTrait};
use rand::RngCore;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, ConnectOptions, Database, DatabaseConnection, DbErr, EntityTrait, QueryFilter,
    Set, SqlErr,
};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct User {
    pub id: i64,
    pub username: String,
    pub password_hash: String,
}

/// The identity a resolved session hands to protected operations.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserIdentity {
    pub id: i64,
    pub username: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Session {
    pub session_id: String,
    pub user_id: i64,
    pub created_at: i64,
    pub expires_at: i64,
}

impl From<entities::user::Model> for User {
    fn from(model: entities::user::Model) -> Self {
        Self {
            id: model.id,
            username: model.username,
            password_hash: model.password_hash,
        }
    }
}

impl From<User> for UserIdentity {
    fn from(user: User) -> Self {
        Self {
            id: user.id,
            username: user.username,
        }
    }
}

impl From<entities::session::Model> for Session {
    fn from(model: entities::session::Model) -> Self {
        Self {
            session_id: model.session_id,
            user_id: model.user_id,
            created_at: model.created_at,
            expires_at: model.expires_at,
        }
    }
}

/// Connect and bring the `users`/`sessions` schema up to date.
///
/// Foreign keys are switched on for every pooled SQLite connection so that
/// deleting a user also removes their sessions.
pub async fn init(cfg: &DbCfg) -> Result<DatabaseConnection, DashError> {
    let mut opts = ConnectOptions::new(cfg.url.clone());
    opts.map_sqlx_sqlite_opts(|sqlite| sqlite.foreign_keys(true));
    let db = Database::connect(opts).await?;
    Migrator::up(&db, None).await?;
    Ok(db)
}

fn random_id() -> String {
    let mut bytes = [0u8; 24];
    rand::thread_rng().fill_bytes(&mut bytes);
    base64ct::Base64UrlUnpadded::encode_string(&bytes)
}

// User management functions

/// Create an account. The password is stored as an Argon2id PHC string and
/// `secret_text` only in encrypted form.
pub async fn register_user(
    db: &DatabaseConnection,
    cipher: &SecretCipher,
    username: &str,
    password: &str,
    secret_text: &str,
) -> Result<User, DashError> {
    use argon2::password_hash::{rand_core::OsRng, SaltString};
    use argon2::{Argon2, PasswordHasher};

    if username.trim().is_empty() {
        return Err(DashError::BadRequest("username must not be empty".to_string()));
    }

    let salt = SaltString::generate(&mut OsRng);
    let password_hash = Argon2::default()
        .hash_password(password.as_bytes(), &salt)
        .map_err(|e| DashError::Other(format!("Password hashing failed: {}", e)))?
        .to_string();

    let secret_data = cipher.encrypt(secret_text)?;

    let user = entities::user::ActiveModel {
        username: Set(username.to_string()),
        password_hash: Set(password_hash),
        secret_data: Set(Some(secret_data)),
        ..Default::default()
    };

    let model = user.insert(db).await.map_err(map_unique_violation)?;
    Ok(model.into())
}

fn map_unique_violation(err: DbErr) -> DashError {
    match err.sql_err() {
        Some(SqlErr::UniqueConstraintViolation(_)) => DashError::UsernameTaken,
        _ => DashError::Db(err),
    }
}

pub async fn get_user_by_username(
    db: &DatabaseConnection,
    username: &str,
) -> Result<Option<User>, DashError> {
    use entities::user::{Column, Entity};

    let model = Entity::find()
        .filter(Column::Username.eq(username))
        .one(db)
        .await?;
    Ok(model.map(User::from))
}

pub async fn get_user_by_id(db: &DatabaseConnection, id: i64) -> Result<Option<User>, DashError> {
    use entities::user::Entity;

    Ok(Entity::find_by_id(id).one(db).await?.map(User::from))
}

/// Check a username/password pair. `Ok(None)` means the credentials are wrong;
/// unknown users and bad passwords are not distinguished.
pub async fn verify_user_password(
    db: &DatabaseConnection,
    username: &str,
    password: &str,
) -> Result<Option<UserIdentity>, DashError> {
    use argon2::{Argon2, PasswordHash, PasswordVerifier};

    let user = match get_user_by_username(db, username).await? {
        Some(u) => u,
        None => return Ok(None),
    };

    let parsed_hash = PasswordHash::new(&user.password_hash)
        .map_err(|e| DashError::Other(format!("Invalid password hash: {}", e)))?;

    if Argon2::default()
        .verify_password(password.as_bytes(), &parsed_hash)
        .is_ok()
    {
        Ok(Some(user.into()))
    } else {
        Ok(None)
    }
}

/// Decrypt the secret stored for `user_id`.
pub async fn reveal_secret(
    db: &DatabaseConnection,
    cipher: &SecretCipher,
    user_id: i64,
) -> Result<Option<String>, DashError> {
    use entities::user::Entity;

    match Entity::find_by_id(user_id).one(db).await? {
        Some(model) => match model.secret_data {
            Some(blob) => Ok(Some(cipher.decrypt(&blob)?)),
            None => Ok(None),
        },
        None => Ok(None),
    }
}

// Session management functions

pub async fn create_session(
    db: &DatabaseConnection,
    user_id: i64,
    ttl_secs: i64,
) -> Result<Session, DashError> {
    let session_id = random_id();
    let now = Utc::now().timestamp();
    let expires_at = now + ttl_secs;

    let session = entities::session::ActiveModel {
        session_id: Set(session_id.clone()),
        user_id: Set(user_id),
        created_at: Set(now),
        expires_at: Set(expires_at),
    };

    session.insert(db).await?;

    Ok(Session {
        session_id,
        user_id,
        created_at: now,
        expires_at,
    })
}

pub async fn get_session(
    db: &DatabaseConnection,
    session_id: &str,
) -> Result<Option<Session>, DashError> {
    use entities::session::{Column, Entity};

    if let Some(model) = Entity::find()
        .filter(Column::SessionId.eq(session_id))
        .one(db)
        .await?
    {
        let now = Utc::now().timestamp();
        if now > model.expires_at {
            return Ok(None);
        }
        Ok(Some(model.into()))
    } else {
        Ok(None)
    }
}

pub async fn delete_session(db: &DatabaseConnection, session_id: &str) -> Result<(), DashError> {
    use entities::session::{Column, Entity};

    Entity::delete_many()
        .filter(Column::SessionId.eq(session_id))
        .exec(db)
        .await?;

    Ok(())
}

pub async fn cleanup_expired_sessions(db: &DatabaseConnection) -> Result<u64, DashError> {
    use entities::session::{Column, Entity};

    let now = Utc::now().timestamp();
    let result = Entity::delete_many()
        .filter(Column::ExpiresAt.lt(now))
        .exec(db)
        .await?;

    Ok(result.rows_affected)
}

/// Resolve a session id to the logged-in user, if the session is live and the user still exists.
pub async fn resolve_session(
    db: &DatabaseConnection,
    session_id: &str,
) -> Result<Option<UserIdentity>, DashError> {
    let session = match get_session(db, session_id).await? {
        Some(s) => s,
        None => return Ok(None),
    };
    Ok(get_user_by_id(db, session.user_id)
        .await?
        .map(UserIdentity::from))
}
