//! Data access for the call flows.
//!
//! Handlers receive an `Arc<dyn CallStore>` through [`crate::state::AppState`]
//! instead of building their own connections.

use async_trait::async_trait;
use thiserror::Error;
use uuid::Uuid;

use crate::models::{
    Call, CallChangeset, Communication, Contact, Group, NewCall, NewCommunication, User,
};
use crate::presence::PhoneStatus;

pub mod postgres;

pub use postgres::PgCallStore;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("database error: {0}")]
    Database(#[from] diesel::result::Error),
    #[error("database pool error: {0}")]
    Pool(#[from] diesel::r2d2::PoolError),
}

pub type StoreResult<T> = Result<T, StoreError>;

/// A group member together with the availability read at lookup time.
#[derive(Debug, Clone)]
pub struct GroupMember {
    pub user: User,
    pub status: PhoneStatus,
}

#[async_trait]
pub trait CallStore: Send + Sync + 'static {
    async fn user(&self, user_id: Uuid) -> StoreResult<Option<User>>;

    async fn user_by_direct_number(&self, number: &str) -> StoreResult<Option<User>>;

    async fn user_by_client_identity(&self, identity: &str) -> StoreResult<Option<User>>;

    /// Current availability; users without a stored status are available.
    async fn phone_status(&self, user_id: Uuid) -> StoreResult<PhoneStatus>;

    async fn set_phone_status(&self, user_id: Uuid, status: PhoneStatus) -> StoreResult<()>;

    async fn group_by_number(&self, number: &str) -> StoreResult<Option<Group>>;

    /// Members in a stable order (join time, then user id).
    async fn group_members(&self, group_id: Uuid) -> StoreResult<Vec<GroupMember>>;

    /// Inserts the call unless a row with the same `call_sid` exists.
    /// Returns whether a row was written.
    async fn insert_call(&self, call: NewCall) -> StoreResult<bool>;

    async fn call_by_sid(&self, call_sid: &str) -> StoreResult<Option<Call>>;

    /// Applies the changeset and returns the number of rows touched.
    async fn update_call(&self, call_sid: &str, changes: CallChangeset) -> StoreResult<usize>;

    async fn contact_by_phone(&self, number: &str) -> StoreResult<Option<Contact>>;

    /// Inserts the communication unless one exists for the same `call_sid`.
    /// Returns whether a row was written.
    async fn insert_communication(&self, communication: NewCommunication) -> StoreResult<bool>;

    async fn communication_for_call(&self, call_sid: &str) -> StoreResult<Option<Communication>>;
}
