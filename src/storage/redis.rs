//! Redis-backed store.
//!
//! Redis key patterns:
//! - `developer:{id}`: developer data (JSON)
//! - `developer_email:{email}`: email lookup to developer id (STRING)
//! - `application:{id}`: application data (JSON)
//! - `public_key:{pk}` / `secret_key:{sk}`: key lookups to application id (STRING)
//! - `developer_applications:{developer_id}`: application ids owned by a developer (SET)
//! - `user:{id}`: end user data (JSON)
//! - `user_email:{application_id}:{email}`: per-application email lookup to user id (STRING)
//! - `application_users:{application_id}`: user ids under an application (SET)
//! - `session:{id}`: session data (JSON)
//! - `session_token:{token}`: token lookup to session id (STRING)
//! - `application_sessions:{application_id}`: session ids under an application (SET)
//!
//! Every write that touches more than one key runs as a single Lua script,
//! so a uniqueness claim, its record and its membership SET land together
//! and a cascade delete is never observed half done. Children are only
//! created while their application record exists. Nothing is stored with a
//! TTL: expired sessions stay until deleted.
//!
//! Record JSON (password hashes, secret keys, session tokens) is wrapped in
//! `Zeroizing` so the application-side copies are cleared after use.

use super::{Store, StoreError};
use crate::models::{Application, StoredDeveloper, StoredSession, StoredUser};
use ::redis::aio::MultiplexedConnection;
use ::redis::AsyncCommands;
use async_trait::async_trait;
use serde::{de::DeserializeOwned, Serialize};
use zeroize::Zeroizing;

#[derive(Clone)]
pub struct RedisStore {
    client: ::redis::Client,
}

impl RedisStore {
    /// Open a client for `url`. No connection is made until first use.
    pub fn open(url: &str) -> Result<Self, StoreError> {
        let client = ::redis::Client::open(url)?;
        Ok(RedisStore { client })
    }

    async fn connection(&self) -> Result<MultiplexedConnection, StoreError> {
        Ok(self.client.get_multiplexed_async_connection().await?)
    }
}

async fn get_json<T: DeserializeOwned>(
    con: &mut MultiplexedConnection,
    key: &str,
) -> Result<Option<T>, StoreError> {
    let json: Option<String> = con.get(key).await?;
    match json {
        Some(data) => {
            let data = Zeroizing::new(data);
            Ok(Some(serde_json::from_str(&data)?))
        }
        None => Ok(None),
    }
}

fn to_json<T: Serialize>(value: &T) -> Result<Zeroizing<String>, StoreError> {
    Ok(Zeroizing::new(serde_json::to_string(value)?))
}

/// KEYS: lookup key to claim, record key, then optionally the membership
/// SET and the parent record that must exist.
/// ARGV: record id, record JSON.
/// Returns 1 when written, 0 when the lookup key is taken, -1 when the
/// parent is gone.
const CLAIM_AND_CREATE: &str = r"
    if KEYS[4] and redis.call('EXISTS', KEYS[4]) == 0 then
        return -1
    end
    if redis.call('SETNX', KEYS[1], ARGV[1]) == 0 then
        return 0
    end
    redis.call('SET', KEYS[2], ARGV[2])
    if KEYS[3] then
        redis.call('SADD', KEYS[3], ARGV[1])
    end
    return 1
";

/// KEYS: public key lookup, secret key lookup, record key, developer SET.
/// ARGV: application id, record JSON.
const CREATE_APPLICATION: &str = r"
    if redis.call('EXISTS', KEYS[1]) == 1 or redis.call('EXISTS', KEYS[2]) == 1 then
        return 0
    end
    redis.call('SET', KEYS[1], ARGV[1])
    redis.call('SET', KEYS[2], ARGV[1])
    redis.call('SET', KEYS[3], ARGV[2])
    redis.call('SADD', KEYS[4], ARGV[1])
    return 1
";

/// KEYS: application record. ARGV: developer id, replacement JSON.
const UPDATE_APPLICATION: &str = r"
    local val = redis.call('GET', KEYS[1])
    if not val or cjson.decode(val).developerId ~= ARGV[1] then
        return 0
    end
    redis.call('SET', KEYS[1], ARGV[2])
    return 1
";

/// KEYS: application record. ARGV: developer id, application id.
/// Removes the application, its key lookups, its end users and their
/// sessions. Returns 0 when the record is missing or owned by someone else.
const DELETE_APPLICATION: &str = r"
    local val = redis.call('GET', KEYS[1])
    if not val then
        return 0
    end
    local app = cjson.decode(val)
    if app.developerId ~= ARGV[1] then
        return 0
    end
    local id = ARGV[2]
    redis.call('DEL', KEYS[1])
    redis.call('DEL', 'public_key:' .. app.publicKey)
    redis.call('DEL', 'secret_key:' .. app.secretKey)
    redis.call('SREM', 'developer_applications:' .. ARGV[1], id)

    local users_key = 'application_users:' .. id
    for _, user_id in ipairs(redis.call('SMEMBERS', users_key)) do
        local user = redis.call('GET', 'user:' .. user_id)
        if user then
            redis.call('DEL', 'user_email:' .. id .. ':' .. cjson.decode(user).email)
            redis.call('DEL', 'user:' .. user_id)
        end
    end
    redis.call('DEL', users_key)

    local sessions_key = 'application_sessions:' .. id
    for _, session_id in ipairs(redis.call('SMEMBERS', sessions_key)) do
        local session = redis.call('GET', 'session:' .. session_id)
        if session then
            redis.call('DEL', 'session_token:' .. cjson.decode(session).token)
            redis.call('DEL', 'session:' .. session_id)
        end
    end
    redis.call('DEL', sessions_key)
    return 1
";

/// KEYS: session record. ARGV: session id.
const DELETE_SESSION: &str = r"
    local val = redis.call('GET', KEYS[1])
    if not val then
        return 0
    end
    local session = cjson.decode(val)
    redis.call('DEL', KEYS[1])
    redis.call('DEL', 'session_token:' .. session.token)
    redis.call('SREM', 'application_sessions:' .. session.application_id, ARGV[1])
    return 1
";

/// Run [`CLAIM_AND_CREATE`] for one record.
async fn claim_and_create(
    con: &mut MultiplexedConnection,
    keys: &[String],
    id: &str,
    json: &str,
    conflict: &'static str,
) -> Result<(), StoreError> {
    let script = ::redis::Script::new(CLAIM_AND_CREATE);
    let mut invocation = script.prepare_invoke();
    for key in keys {
        invocation.key(key.as_str());
    }
    invocation.arg(id).arg(json);

    let outcome: i64 = invocation.invoke_async(con).await?;
    match outcome {
        1 => Ok(()),
        0 => Err(StoreError::Conflict(conflict)),
        _ => Err(StoreError::Backend(format!(
            "{} belongs to a missing application",
            conflict
        ))),
    }
}

/// Follow a lookup key to the id it holds, then load that record.
async fn get_indexed<T: DeserializeOwned>(
    con: &mut MultiplexedConnection,
    index_key: &str,
    record_prefix: &str,
) -> Result<Option<T>, StoreError> {
    let id: Option<String> = con.get(index_key).await?;
    match id {
        Some(id) => get_json(con, &format!("{}:{}", record_prefix, id)).await,
        None => Ok(None),
    }
}

async fn list_members<T: DeserializeOwned>(
    con: &mut MultiplexedConnection,
    set_key: &str,
    record_prefix: &str,
) -> Result<Vec<T>, StoreError> {
    let ids: Vec<String> = con.smembers(set_key).await?;
    let mut records = Vec::with_capacity(ids.len());
    for id in ids {
        if let Some(record) = get_json(con, &format!("{}:{}", record_prefix, id)).await? {
            records.push(record);
        }
    }
    Ok(records)
}

#[async_trait]
impl Store for RedisStore {
    async fn create_developer(&self, developer: &StoredDeveloper) -> Result<(), StoreError> {
        let json = to_json(developer)?;
        let mut con = self.connection().await?;
        let keys = [
            format!("developer_email:{}", developer.email),
            format!("developer:{}", developer.id),
        ];
        claim_and_create(&mut con, &keys, &developer.id, &json, "Developer").await
    }

    async fn get_developer(&self, id: &str) -> Result<Option<StoredDeveloper>, StoreError> {
        let mut con = self.connection().await?;
        get_json(&mut con, &format!("developer:{}", id)).await
    }

    async fn get_developer_by_email(
        &self,
        email: &str,
    ) -> Result<Option<StoredDeveloper>, StoreError> {
        let mut con = self.connection().await?;
        get_indexed(&mut con, &format!("developer_email:{}", email), "developer").await
    }

    async fn create_application(&self, application: &Application) -> Result<(), StoreError> {
        let json = to_json(application)?;
        let mut con = self.connection().await?;

        let script = ::redis::Script::new(CREATE_APPLICATION);
        let created: i64 = script
            .key(format!("public_key:{}", application.public_key))
            .key(format!("secret_key:{}", application.secret_key))
            .key(format!("application:{}", application.id))
            .key(format!("developer_applications:{}", application.developer_id))
            .arg(&application.id)
            .arg(json.as_str())
            .invoke_async(&mut con)
            .await?;

        if created == 0 {
            return Err(StoreError::Conflict("Application key"));
        }
        Ok(())
    }

    async fn list_applications(&self, developer_id: &str) -> Result<Vec<Application>, StoreError> {
        let mut con = self.connection().await?;
        let mut apps: Vec<Application> = list_members(
            &mut con,
            &format!("developer_applications:{}", developer_id),
            "application",
        )
        .await?;
        apps.sort_by(|a, b| a.created_at.cmp(&b.created_at));
        Ok(apps)
    }

    async fn get_application(
        &self,
        id: &str,
        developer_id: &str,
    ) -> Result<Option<Application>, StoreError> {
        let mut con = self.connection().await?;
        let app: Option<Application> = get_json(&mut con, &format!("application:{}", id)).await?;
        Ok(app.filter(|app| app.developer_id == developer_id))
    }

    async fn update_application(
        &self,
        id: &str,
        developer_id: &str,
        name: &str,
        domain: &str,
    ) -> Result<Option<Application>, StoreError> {
        let mut con = self.connection().await?;
        let key = format!("application:{}", id);
        let app: Option<Application> = get_json(&mut con, &key).await?;

        let mut app = match app {
            Some(app) if app.developer_id == developer_id => app,
            _ => return Ok(None),
        };
        app.name = name.to_string();
        app.domain = domain.to_string();
        let json = to_json(&app)?;

        // Only replaces a record that still exists under the same owner
        let script = ::redis::Script::new(UPDATE_APPLICATION);
        let updated: i64 = script
            .key(&key)
            .arg(developer_id)
            .arg(json.as_str())
            .invoke_async(&mut con)
            .await?;

        Ok((updated == 1).then_some(app))
    }

    async fn delete_application(&self, id: &str, developer_id: &str) -> Result<bool, StoreError> {
        let mut con = self.connection().await?;
        let script = ::redis::Script::new(DELETE_APPLICATION);
        let deleted: i64 = script
            .key(format!("application:{}", id))
            .arg(developer_id)
            .arg(id)
            .invoke_async(&mut con)
            .await?;
        Ok(deleted == 1)
    }

    async fn get_application_by_public_key(
        &self,
        public_key: &str,
    ) -> Result<Option<Application>, StoreError> {
        let mut con = self.connection().await?;
        get_indexed(&mut con, &format!("public_key:{}", public_key), "application").await
    }

    async fn create_user(&self, user: &StoredUser) -> Result<(), StoreError> {
        let json = to_json(user)?;
        let mut con = self.connection().await?;
        let keys = [
            format!("user_email:{}:{}", user.application_id, user.email),
            format!("user:{}", user.id),
            format!("application_users:{}", user.application_id),
            format!("application:{}", user.application_id),
        ];
        claim_and_create(&mut con, &keys, &user.id, &json, "User").await
    }

    async fn get_user(&self, id: &str) -> Result<Option<StoredUser>, StoreError> {
        let mut con = self.connection().await?;
        get_json(&mut con, &format!("user:{}", id)).await
    }

    async fn get_user_by_email(
        &self,
        application_id: &str,
        email: &str,
    ) -> Result<Option<StoredUser>, StoreError> {
        let mut con = self.connection().await?;
        get_indexed(
            &mut con,
            &format!("user_email:{}:{}", application_id, email),
            "user",
        )
        .await
    }

    async fn list_users(&self, application_id: &str) -> Result<Vec<StoredUser>, StoreError> {
        let mut con = self.connection().await?;
        let mut users: Vec<StoredUser> = list_members(
            &mut con,
            &format!("application_users:{}", application_id),
            "user",
        )
        .await?;
        users.sort_by(|a, b| a.created_at.cmp(&b.created_at));
        Ok(users)
    }

    async fn create_session(&self, session: &StoredSession) -> Result<(), StoreError> {
        let json = to_json(session)?;
        let mut con = self.connection().await?;
        let keys = [
            format!("session_token:{}", session.token),
            format!("session:{}", session.id),
            format!("application_sessions:{}", session.application_id),
            format!("application:{}", session.application_id),
        ];
        claim_and_create(&mut con, &keys, &session.id, &json, "Session").await
    }

    async fn get_session_by_token(
        &self,
        token: &str,
    ) -> Result<Option<StoredSession>, StoreError> {
        let mut con = self.connection().await?;
        get_indexed(&mut con, &format!("session_token:{}", token), "session").await
    }

    async fn delete_session(&self, id: &str) -> Result<bool, StoreError> {
        let mut con = self.connection().await?;
        let script = ::redis::Script::new(DELETE_SESSION);
        let deleted: i64 = script
            .key(format!("session:{}", id))
            .arg(id)
            .invoke_async(&mut con)
            .await?;
        Ok(deleted == 1)
    }

    async fn ping(&self) -> Result<(), StoreError> {
        let mut con = self.connection().await?;
        let _: String = ::redis::cmd("PING").query_async(&mut con).await?;
        Ok(())
    }
}
