use std::collections::HashMap;
use std::env;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use anyhow::{anyhow, Context, Result};
use async_trait::async_trait;
use axum::body::Body;
use axum::http::{Method, Request};
use axum::Router;
use chrono::{Duration, Utc};
use diesel::connection::SimpleConnection;
use diesel::result::{DatabaseErrorKind, Error as DieselError};
use diesel::PgConnection;
use http_body_util::BodyExt;
use jsonwebtoken::{encode, EncodingKey, Header};
use once_cell::sync::Lazy;
use serde::Serialize;
use telephony::auth::jwt::{Claims, JwtService};
use telephony::config::{AppConfig, DialConfig, TwilioConfig};
use telephony::db::{self, PgPool};
use telephony::models::{
    Call, CallChangeset, Communication, Contact, Group, NewCall, NewCommunication, User,
};
use telephony::presence::PhoneStatus;
use telephony::routes;
use telephony::signature::{compute_signature, SIGNATURE_HEADER};
use telephony::state::AppState;
use telephony::store::{CallStore, GroupMember, StoreError, StoreResult};
use tokio::sync::Mutex;
use tower::util::ServiceExt;
use uuid::Uuid;

static DB_LOCK: Lazy<Mutex<()>> = Lazy::new(|| Mutex::new(()));

pub const PUBLIC_BASE_URL: &str = "https://calls.example.test";
pub const JWT_SECRET: &str = "test-session-secret";
pub const DEFAULT_CALLER_ID: &str = "+15550009999";

#[derive(Default)]
struct Tables {
    users: Vec<User>,
    statuses: HashMap<Uuid, PhoneStatus>,
    groups: Vec<Group>,
    memberships: Vec<(Uuid, Uuid)>,
    contacts: Vec<Contact>,
    calls: Vec<Call>,
    communications: Vec<Communication>,
}

/// In-memory `CallStore` with the same uniqueness rules as the database.
#[derive(Default)]
pub struct MemoryStore {
    tables: Mutex<Tables>,
}

#[async_trait]
impl CallStore for MemoryStore {
    async fn user(&self, user_id: Uuid) -> StoreResult<Option<User>> {
        let guard = self.tables.lock().await;
        Ok(guard.users.iter().find(|user| user.id == user_id).cloned())
    }

    async fn user_by_direct_number(&self, number: &str) -> StoreResult<Option<User>> {
        let guard = self.tables.lock().await;
        Ok(guard
            .users
            .iter()
            .find(|user| user.direct_number.as_deref() == Some(number))
            .cloned())
    }

    async fn user_by_client_identity(&self, identity: &str) -> StoreResult<Option<User>> {
        let guard = self.tables.lock().await;
        Ok(guard
            .users
            .iter()
            .find(|user| user.client_identity == identity)
            .cloned())
    }

    async fn phone_status(&self, user_id: Uuid) -> StoreResult<PhoneStatus> {
        let guard = self.tables.lock().await;
        Ok(guard.statuses.get(&user_id).copied().unwrap_or_default())
    }

    async fn set_phone_status(&self, user_id: Uuid, status: PhoneStatus) -> StoreResult<()> {
        let mut guard = self.tables.lock().await;
        guard.statuses.insert(user_id, status);
        Ok(())
    }

    async fn group_by_number(&self, number: &str) -> StoreResult<Option<Group>> {
        let guard = self.tables.lock().await;
        Ok(guard
            .groups
            .iter()
            .find(|group| group.phone_number == number)
            .cloned())
    }

    async fn group_members(&self, group_id: Uuid) -> StoreResult<Vec<GroupMember>> {
        let guard = self.tables.lock().await;
        Ok(guard
            .memberships
            .iter()
            .filter(|(group, _)| *group == group_id)
            .filter_map(|(_, user_id)| guard.users.iter().find(|user| user.id == *user_id))
            .map(|user| GroupMember {
                user: user.clone(),
                status: guard.statuses.get(&user.id).copied().unwrap_or_default(),
            })
            .collect())
    }

    async fn insert_call(&self, call: NewCall) -> StoreResult<bool> {
        let mut guard = self.tables.lock().await;
        if guard.calls.iter().any(|row| row.call_sid == call.call_sid) {
            return Ok(false);
        }
        let now = Utc::now().naive_utc();
        guard.calls.push(Call {
            id: call.id,
            call_sid: call.call_sid,
            from_number: call.from_number,
            to_number: call.to_number,
            from_user_id: call.from_user_id,
            to_user_id: call.to_user_id,
            status: call.status,
            direction: call.direction,
            is_parent_call: call.is_parent_call,
            group_id: call.group_id,
            duration: None,
            recording_url: None,
            started_at: now,
            ended_at: None,
            updated_at: now,
        });
        Ok(true)
    }

    async fn call_by_sid(&self, call_sid: &str) -> StoreResult<Option<Call>> {
        let guard = self.tables.lock().await;
        Ok(guard.calls.iter().find(|row| row.call_sid == call_sid).cloned())
    }

    async fn update_call(&self, call_sid: &str, changes: CallChangeset) -> StoreResult<usize> {
        if changes == CallChangeset::default() {
            return Ok(0);
        }
        let mut guard = self.tables.lock().await;
        let Some(row) = guard.calls.iter_mut().find(|row| row.call_sid == call_sid) else {
            return Ok(0);
        };
        if let Some(status) = changes.status {
            row.status = status;
        }
        if let Some(from_number) = changes.from_number {
            row.from_number = from_number;
        }
        if let Some(to_number) = changes.to_number {
            row.to_number = to_number;
        }
        if let Some(to_user_id) = changes.to_user_id {
            row.to_user_id = Some(to_user_id);
        }
        if let Some(duration) = changes.duration {
            row.duration = Some(duration);
        }
        if let Some(recording_url) = changes.recording_url {
            row.recording_url = Some(recording_url);
        }
        if let Some(ended_at) = changes.ended_at {
            row.ended_at = Some(ended_at);
        }
        if let Some(updated_at) = changes.updated_at {
            row.updated_at = updated_at;
        }
        Ok(1)
    }

    async fn contact_by_phone(&self, number: &str) -> StoreResult<Option<Contact>> {
        let guard = self.tables.lock().await;
        Ok(guard
            .contacts
            .iter()
            .find(|contact| contact.phone_number == number)
            .cloned())
    }

    async fn insert_communication(&self, communication: NewCommunication) -> StoreResult<bool> {
        let mut guard = self.tables.lock().await;
        if guard
            .communications
            .iter()
            .any(|row| row.call_sid == communication.call_sid)
        {
            return Ok(false);
        }
        guard.communications.push(Communication {
            id: communication.id,
            call_sid: communication.call_sid,
            channel: communication.channel,
            direction: communication.direction,
            from_address: communication.from_address,
            to_address: communication.to_address,
            duration: communication.duration,
            recording_url: communication.recording_url,
            contact_id: communication.contact_id,
            user_id: communication.user_id,
            created_at: Utc::now().naive_utc(),
        });
        Ok(true)
    }

    async fn communication_for_call(&self, call_sid: &str) -> StoreResult<Option<Communication>> {
        let guard = self.tables.lock().await;
        Ok(guard
            .communications
            .iter()
            .find(|row| row.call_sid == call_sid)
            .cloned())
    }
}

#[allow(dead_code)]
impl MemoryStore {
    pub async fn add_user(
        &self,
        full_name: &str,
        client_identity: &str,
        direct_number: Option<&str>,
        personal_phone: Option<&str>,
    ) -> User {
        let now = Utc::now().naive_utc();
        let user = User {
            id: Uuid::new_v4(),
            full_name: full_name.to_string(),
            email: format!("{client_identity}@example.test"),
            client_identity: client_identity.to_string(),
            direct_number: direct_number.map(str::to_string),
            personal_phone: personal_phone.map(str::to_string),
            created_at: now,
            updated_at: now,
        };
        self.tables.lock().await.users.push(user.clone());
        user
    }

    /// Members join in the order given.
    pub async fn add_group(&self, name: &str, phone_number: &str, members: &[&User]) -> Group {
        let group = Group {
            id: Uuid::new_v4(),
            name: name.to_string(),
            phone_number: phone_number.to_string(),
            created_at: Utc::now().naive_utc(),
        };
        let mut guard = self.tables.lock().await;
        guard.groups.push(group.clone());
        for member in members {
            guard.memberships.push((group.id, member.id));
        }
        group
    }

    pub async fn add_contact(&self, full_name: &str, phone_number: &str) -> Contact {
        let contact = Contact {
            id: Uuid::new_v4(),
            full_name: full_name.to_string(),
            phone_number: phone_number.to_string(),
            created_at: Utc::now().naive_utc(),
        };
        self.tables.lock().await.contacts.push(contact.clone());
        contact
    }

    pub async fn calls(&self) -> Vec<Call> {
        self.tables.lock().await.calls.clone()
    }

    pub async fn call(&self, call_sid: &str) -> Option<Call> {
        self.call_by_sid(call_sid).await.ok().flatten()
    }

    pub async fn communications(&self) -> Vec<Communication> {
        self.tables.lock().await.communications.clone()
    }
}

/// Store lookups that can be switched to fail while a test runs.
#[derive(Default)]
pub struct Failures {
    client_lookups: AtomicBool,
    group_members: AtomicBool,
    contact_lookups: AtomicBool,
}

#[allow(dead_code)]
impl Failures {
    pub fn fail_client_lookups(&self) {
        self.client_lookups.store(true, Ordering::SeqCst);
    }

    pub fn fail_group_members(&self) {
        self.group_members.store(true, Ordering::SeqCst);
    }

    pub fn fail_contact_lookups(&self) {
        self.contact_lookups.store(true, Ordering::SeqCst);
    }

    fn check(flag: &AtomicBool, what: &str) -> StoreResult<()> {
        if flag.load(Ordering::SeqCst) {
            return Err(StoreError::Database(DieselError::DatabaseError(
                DatabaseErrorKind::ClosedConnection,
                Box::new(format!("{what}: connection closed")),
            )));
        }
        Ok(())
    }
}

/// `MemoryStore` behind a switchboard of injected lookup failures.
pub struct FailingStore {
    inner: Arc<MemoryStore>,
    failures: Arc<Failures>,
}

#[async_trait]
impl CallStore for FailingStore {
    async fn user(&self, user_id: Uuid) -> StoreResult<Option<User>> {
        self.inner.user(user_id).await
    }

    async fn user_by_direct_number(&self, number: &str) -> StoreResult<Option<User>> {
        self.inner.user_by_direct_number(number).await
    }

    async fn user_by_client_identity(&self, identity: &str) -> StoreResult<Option<User>> {
        Failures::check(&self.failures.client_lookups, "user_by_client_identity")?;
        self.inner.user_by_client_identity(identity).await
    }

    async fn phone_status(&self, user_id: Uuid) -> StoreResult<PhoneStatus> {
        self.inner.phone_status(user_id).await
    }

    async fn set_phone_status(&self, user_id: Uuid, status: PhoneStatus) -> StoreResult<()> {
        self.inner.set_phone_status(user_id, status).await
    }

    async fn group_by_number(&self, number: &str) -> StoreResult<Option<Group>> {
        self.inner.group_by_number(number).await
    }

    async fn group_members(&self, group_id: Uuid) -> StoreResult<Vec<GroupMember>> {
        Failures::check(&self.failures.group_members, "group_members")?;
        self.inner.group_members(group_id).await
    }

    async fn insert_call(&self, call: NewCall) -> StoreResult<bool> {
        self.inner.insert_call(call).await
    }

    async fn call_by_sid(&self, call_sid: &str) -> StoreResult<Option<Call>> {
        self.inner.call_by_sid(call_sid).await
    }

    async fn update_call(&self, call_sid: &str, changes: CallChangeset) -> StoreResult<usize> {
        self.inner.update_call(call_sid, changes).await
    }

    async fn contact_by_phone(&self, number: &str) -> StoreResult<Option<Contact>> {
        Failures::check(&self.failures.contact_lookups, "contact_by_phone")?;
        self.inner.contact_by_phone(number).await
    }

    async fn insert_communication(&self, communication: NewCommunication) -> StoreResult<bool> {
        self.inner.insert_communication(communication).await
    }

    async fn communication_for_call(&self, call_sid: &str) -> StoreResult<Option<Communication>> {
        self.inner.communication_for_call(call_sid).await
    }
}

pub fn test_config() -> AppConfig {
    AppConfig {
        database_url: "postgres://unused@localhost/telephony".to_string(),
        database_max_pool_size: db::DEFAULT_MAX_POOL_SIZE,
        server_host: "127.0.0.1".to_string(),
        server_port: 0,
        public_base_url: PUBLIC_BASE_URL.to_string(),
        cors_allowed_origin: None,
        auth_jwt_secret: JWT_SECRET.to_string(),
        auth_jwt_audience: "authenticated".to_string(),
        twilio: TwilioConfig {
            account_sid: Some("ACtest".to_string()),
            auth_token: None,
            api_key_sid: Some("SKtest".to_string()),
            api_key_secret: Some("voice-secret".to_string()),
            twiml_app_sid: Some("APtest".to_string()),
            default_caller_id: Some(DEFAULT_CALLER_ID.to_string()),
            voice_token_ttl_minutes: 60,
        },
        dial: DialConfig::default(),
    }
}

pub struct TestApp {
    pub state: AppState,
    pub store: Arc<MemoryStore>,
    pub failures: Arc<Failures>,
    router: Router,
}

#[allow(dead_code)]
impl TestApp {
    pub fn new() -> Result<Self> {
        Self::with_config(|_| {})
    }

    pub fn with_config(configure: impl FnOnce(&mut AppConfig)) -> Result<Self> {
        let mut config = test_config();
        configure(&mut config);

        let store = Arc::new(MemoryStore::default());
        let failures = Arc::new(Failures::default());
        let store_for_state: Arc<dyn CallStore> = Arc::new(FailingStore {
            inner: store.clone(),
            failures: failures.clone(),
        });
        let jwt = JwtService::from_config(&config)?;
        let state = AppState::new(store_for_state, config, jwt)?;
        let router = routes::create_router(state.clone());

        Ok(Self {
            state,
            store,
            failures,
            router,
        })
    }

    /// A session token as the auth provider would issue it.
    pub fn session_token(&self, user_id: Uuid) -> Result<String> {
        let claims = Claims {
            sub: user_id,
            email: Some(format!("{user_id}@example.test")),
            role: Some("authenticated".to_string()),
            aud: "authenticated".to_string(),
            exp: (Utc::now() + Duration::hours(1)).timestamp() as usize,
        };
        Ok(encode(
            &Header::default(),
            &claims,
            &EncodingKey::from_secret(JWT_SECRET.as_bytes()),
        )?)
    }

    pub async fn post_form(
        &self,
        path: &str,
        params: &[(&str, &str)],
    ) -> Result<hyper::Response<Body>> {
        self.send_form(path, params, None).await
    }

    /// Posts a webhook signed with `auth_token` for the public URL of `path`.
    pub async fn post_signed_form(
        &self,
        path: &str,
        params: &[(&str, &str)],
        auth_token: &str,
    ) -> Result<hyper::Response<Body>> {
        let owned: Vec<(String, String)> = params
            .iter()
            .map(|(key, value)| (key.to_string(), value.to_string()))
            .collect();
        let url = self.state.callbacks.public_url(path);
        let signature = compute_signature(auth_token, &url, &owned)
            .map_err(|err| anyhow!("failed to sign webhook: {err}"))?;
        self.send_form(path, params, Some(&signature)).await
    }

    async fn send_form(
        &self,
        path: &str,
        params: &[(&str, &str)],
        signature: Option<&str>,
    ) -> Result<hyper::Response<Body>> {
        let body = url::form_urlencoded::Serializer::new(String::new())
            .extend_pairs(params)
            .finish();
        let mut builder = Request::builder()
            .method(Method::POST)
            .uri(path)
            .header("content-type", "application/x-www-form-urlencoded");
        if let Some(signature) = signature {
            builder = builder.header(SIGNATURE_HEADER, signature);
        }
        let request = builder.body(Body::from(body))?;
        Ok(self
            .router
            .clone()
            .oneshot(request)
            .await
            .expect("infallible response"))
    }

    pub async fn put_json<T: Serialize + ?Sized>(
        &self,
        path: &str,
        payload: &T,
        token: Option<&str>,
    ) -> Result<hyper::Response<Body>> {
        let body = serde_json::to_vec(payload)?;
        let mut builder = Request::builder()
            .method(Method::PUT)
            .uri(path)
            .header("content-type", "application/json");
        if let Some(token) = token {
            builder = builder.header("authorization", format!("Bearer {token}"));
        }
        let request = builder.body(Body::from(body))?;
        Ok(self
            .router
            .clone()
            .oneshot(request)
            .await
            .expect("infallible response"))
    }

    pub async fn get(&self, path: &str, token: Option<&str>) -> Result<hyper::Response<Body>> {
        let mut builder = Request::builder().method(Method::GET).uri(path);
        if let Some(token) = token {
            builder = builder.header("authorization", format!("Bearer {token}"));
        }
        let request = builder.body(Body::empty())?;
        Ok(self
            .router
            .clone()
            .oneshot(request)
            .await
            .expect("infallible response"))
    }
}

pub async fn body_to_vec(body: Body) -> Result<Vec<u8>> {
    let collected = body
        .collect()
        .await
        .map_err(|err| anyhow!("failed to read response body: {err}"))?;
    Ok(collected.to_bytes().to_vec())
}

#[allow(dead_code)]
pub async fn body_to_string(body: Body) -> Result<String> {
    Ok(String::from_utf8(body_to_vec(body).await?)?)
}

/// Path and query of the first `attribute="…"` URL in the markup, unescaped.
#[allow(dead_code)]
pub fn callback_path(xml: &str, attribute: &str) -> Option<String> {
    let marker = format!("{attribute}=\"");
    let start = xml.find(&marker)? + marker.len();
    let end = start + xml[start..].find('"')?;
    let raw = xml[start..end].replace("&amp;", "&");
    let url = url::Url::parse(&raw).ok()?;
    Some(match url.query() {
        Some(query) => format!("{}?{query}", url.path()),
        None => url.path().to_string(),
    })
}

/// Text of the first `<Redirect>` verb, as a path and query.
#[allow(dead_code)]
pub fn redirect_path(xml: &str) -> Option<String> {
    let start = xml.find("<Redirect")?;
    let open_end = start + xml[start..].find('>')? + 1;
    let close = open_end + xml[open_end..].find("</Redirect>")?;
    let raw = xml[open_end..close].replace("&amp;", "&");
    let url = url::Url::parse(&raw).ok()?;
    Some(format!("{}?{}", url.path(), url.query().unwrap_or_default()))
}

#[allow(dead_code)]
pub async fn acquire_db_lock() -> tokio::sync::MutexGuard<'static, ()> {
    DB_LOCK.lock().await
}

/// Pool for the Postgres-backed store tests, migrated and emptied.
#[allow(dead_code)]
pub async fn test_pool() -> Result<PgPool> {
    let database_url = env::var("TEST_DATABASE_URL")
        .context("TEST_DATABASE_URL must be set for database tests")?;
    let pool = db::init_pool(&database_url)?;
    prepare_database(&pool).await?;
    Ok(pool)
}

async fn prepare_database(pool: &PgPool) -> Result<()> {
    let pool = pool.clone();
    tokio::task::spawn_blocking(move || -> Result<()> {
        db::run_migrations(&pool)?;
        let mut conn = pool
            .get()
            .map_err(|err| anyhow!("failed to acquire connection: {err}"))?;
        truncate_all(&mut conn)?;
        Ok(())
    })
    .await
    .context("migration task panicked")?
}

fn truncate_all(conn: &mut PgConnection) -> Result<()> {
    conn.batch_execute(
        "TRUNCATE TABLE communications, calls, contacts, group_members, groups, user_phone_status, users CASCADE;",
    )
    .context("failed to truncate tables")?;
    Ok(())
}
