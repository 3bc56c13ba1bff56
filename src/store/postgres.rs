use async_trait::async_trait;
use chrono::Utc;
use diesel::{
    pg::PgConnection,
    prelude::*,
    r2d2::{ConnectionManager, PooledConnection},
};
use uuid::Uuid;

use super::{CallStore, GroupMember, StoreResult};
use crate::db::PgPool;
use crate::models::{
    Call, CallChangeset, Communication, Contact, Group, NewCall, NewCommunication,
    NewUserPhoneStatus, User,
};
use crate::presence::PhoneStatus;
use crate::schema::{calls, communications, contacts, group_members, groups, user_phone_status, users};

type PgPooledConnection = PooledConnection<ConnectionManager<PgConnection>>;

#[derive(Clone)]
pub struct PgCallStore {
    pool: PgPool,
}

impl PgCallStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    fn conn(&self) -> StoreResult<PgPooledConnection> {
        Ok(self.pool.get()?)
    }
}

#[async_trait]
impl CallStore for PgCallStore {
    async fn user(&self, user_id: Uuid) -> StoreResult<Option<User>> {
        let mut conn = self.conn()?;
        Ok(users::table.find(user_id).first(&mut conn).optional()?)
    }

    async fn user_by_direct_number(&self, number: &str) -> StoreResult<Option<User>> {
        let mut conn = self.conn()?;
        Ok(users::table
            .filter(users::direct_number.eq(number))
            .first(&mut conn)
            .optional()?)
    }

    async fn user_by_client_identity(&self, identity: &str) -> StoreResult<Option<User>> {
        let mut conn = self.conn()?;
        Ok(users::table
            .filter(users::client_identity.eq(identity))
            .first(&mut conn)
            .optional()?)
    }

    async fn phone_status(&self, user_id: Uuid) -> StoreResult<PhoneStatus> {
        let mut conn = self.conn()?;
        let stored: Option<String> = user_phone_status::table
            .find(user_id)
            .select(user_phone_status::status)
            .first(&mut conn)
            .optional()?;
        Ok(PhoneStatus::from_stored(stored.as_deref()))
    }

    async fn set_phone_status(&self, user_id: Uuid, status: PhoneStatus) -> StoreResult<()> {
        let mut conn = self.conn()?;
        let now = Utc::now().naive_utc();
        let row = NewUserPhoneStatus {
            user_id,
            status: status.as_str(),
            updated_at: now,
        };
        diesel::insert_into(user_phone_status::table)
            .values(&row)
            .on_conflict(user_phone_status::user_id)
            .do_update()
            .set((
                user_phone_status::status.eq(status.as_str()),
                user_phone_status::updated_at.eq(now),
            ))
            .execute(&mut conn)?;
        Ok(())
    }

    async fn group_by_number(&self, number: &str) -> StoreResult<Option<Group>> {
        let mut conn = self.conn()?;
        Ok(groups::table
            .filter(groups::phone_number.eq(number))
            .first(&mut conn)
            .optional()?)
    }

    async fn group_members(&self, group_id: Uuid) -> StoreResult<Vec<GroupMember>> {
        let mut conn = self.conn()?;
        let rows: Vec<(User, Option<String>)> = group_members::table
            .inner_join(users::table)
            .left_join(user_phone_status::table.on(user_phone_status::user_id.eq(users::id)))
            .filter(group_members::group_id.eq(group_id))
            .order((group_members::created_at.asc(), users::id.asc()))
            .select((users::all_columns, user_phone_status::status.nullable()))
            .load(&mut conn)?;

        Ok(rows
            .into_iter()
            .map(|(user, status)| GroupMember {
                user,
                status: PhoneStatus::from_stored(status.as_deref()),
            })
            .collect())
    }

    async fn insert_call(&self, call: NewCall) -> StoreResult<bool> {
        let mut conn = self.conn()?;
        let inserted = diesel::insert_into(calls::table)
            .values(&call)
            .on_conflict(calls::call_sid)
            .do_nothing()
            .execute(&mut conn)?;
        Ok(inserted > 0)
    }

    async fn call_by_sid(&self, call_sid: &str) -> StoreResult<Option<Call>> {
        let mut conn = self.conn()?;
        Ok(calls::table
            .filter(calls::call_sid.eq(call_sid))
            .first(&mut conn)
            .optional()?)
    }

    async fn update_call(&self, call_sid: &str, changes: CallChangeset) -> StoreResult<usize> {
        if changes == CallChangeset::default() {
            return Ok(0);
        }
        let mut conn = self.conn()?;
        Ok(diesel::update(calls::table.filter(calls::call_sid.eq(call_sid)))
            .set(&changes)
            .execute(&mut conn)?)
    }

    async fn contact_by_phone(&self, number: &str) -> StoreResult<Option<Contact>> {
        let mut conn = self.conn()?;
        Ok(contacts::table
            .filter(contacts::phone_number.eq(number))
            .order(contacts::created_at.asc())
            .first(&mut conn)
            .optional()?)
    }

    async fn insert_communication(&self, communication: NewCommunication) -> StoreResult<bool> {
        let mut conn = self.conn()?;
        let inserted = diesel::insert_into(communications::table)
            .values(&communication)
            .on_conflict(communications::call_sid)
            .do_nothing()
            .execute(&mut conn)?;
        Ok(inserted > 0)
    }

    async fn communication_for_call(&self, call_sid: &str) -> StoreResult<Option<Communication>> {
        let mut conn = self.conn()?;
        Ok(communications::table
            .filter(communications::call_sid.eq(call_sid))
            .first(&mut conn)
            .optional()?)
    }
}
