use chrono::NaiveDateTime;
use diesel::prelude::*;
use uuid::Uuid;

use crate::schema::*;

#[derive(Debug, Clone, Queryable, Identifiable)]
#[diesel(table_name = users)]
pub struct User {
    pub id: Uuid,
    pub full_name: String,
    pub email: String,
    pub client_identity: String,
    pub direct_number: Option<String>,
    pub personal_phone: Option<String>,
    pub created_at: NaiveDateTime,
    pub updated_at: NaiveDateTime,
}

#[derive(Debug, Clone, Insertable)]
#[diesel(table_name = users)]
pub struct NewUser {
    pub id: Uuid,
    pub full_name: String,
    pub email: String,
    pub client_identity: String,
    pub direct_number: Option<String>,
    pub personal_phone: Option<String>,
}

#[derive(Debug, Clone, Queryable, Identifiable, Associations)]
#[diesel(table_name = user_phone_status)]
#[diesel(belongs_to(User))]
#[diesel(primary_key(user_id))]
pub struct UserPhoneStatus {
    pub user_id: Uuid,
    pub status: String,
    pub updated_at: NaiveDateTime,
}

#[derive(Debug, Insertable)]
#[diesel(table_name = user_phone_status)]
pub struct NewUserPhoneStatus<'a> {
    pub user_id: Uuid,
    pub status: &'a str,
    pub updated_at: NaiveDateTime,
}

#[derive(Debug, Clone, Queryable, Identifiable)]
#[diesel(table_name = groups)]
pub struct Group {
    pub id: Uuid,
    pub name: String,
    pub phone_number: String,
    pub created_at: NaiveDateTime,
}

#[derive(Debug, Clone, Insertable)]
#[diesel(table_name = groups)]
pub struct NewGroup {
    pub id: Uuid,
    pub name: String,
    pub phone_number: String,
}

#[derive(Debug, Clone, Insertable)]
#[diesel(table_name = group_members)]
pub struct NewGroupMember {
    pub group_id: Uuid,
    pub user_id: Uuid,
}

#[derive(Debug, Clone, Queryable, Identifiable)]
#[diesel(table_name = contacts)]
pub struct Contact {
    pub id: Uuid,
    pub full_name: String,
    pub phone_number: String,
    pub created_at: NaiveDateTime,
}

#[derive(Debug, Clone, Insertable)]
#[diesel(table_name = contacts)]
pub struct NewContact {
    pub id: Uuid,
    pub full_name: String,
    pub phone_number: String,
}

#[derive(Debug, Clone, Queryable, Identifiable)]
#[diesel(table_name = calls)]
pub struct Call {
    pub id: Uuid,
    pub call_sid: String,
    pub from_number: String,
    pub to_number: String,
    pub from_user_id: Option<Uuid>,
    pub to_user_id: Option<Uuid>,
    pub status: String,
    pub direction: String,
    pub is_parent_call: bool,
    pub group_id: Option<Uuid>,
    pub duration: Option<i32>,
    pub recording_url: Option<String>,
    pub started_at: NaiveDateTime,
    pub ended_at: Option<NaiveDateTime>,
    pub updated_at: NaiveDateTime,
}

#[derive(Debug, Clone, Insertable)]
#[diesel(table_name = calls)]
pub struct NewCall {
    pub id: Uuid,
    pub call_sid: String,
    pub from_number: String,
    pub to_number: String,
    pub from_user_id: Option<Uuid>,
    pub to_user_id: Option<Uuid>,
    pub status: String,
    pub direction: String,
    pub is_parent_call: bool,
    pub group_id: Option<Uuid>,
}

/// Partial update of a call row. `None` fields are left untouched, so a
/// changeset can never clear a previously stored value.
#[derive(Debug, Clone, Default, PartialEq, AsChangeset)]
#[diesel(table_name = calls)]
pub struct CallChangeset {
    pub status: Option<String>,
    pub from_number: Option<String>,
    pub to_number: Option<String>,
    pub to_user_id: Option<Uuid>,
    pub duration: Option<i32>,
    pub recording_url: Option<String>,
    pub ended_at: Option<NaiveDateTime>,
    pub updated_at: Option<NaiveDateTime>,
}

#[derive(Debug, Clone, Queryable, Identifiable)]
#[diesel(table_name = communications)]
pub struct Communication {
    pub id: Uuid,
    pub call_sid: String,
    pub channel: String,
    pub direction: String,
    pub from_address: String,
    pub to_address: String,
    pub duration: Option<i32>,
    pub recording_url: Option<String>,
    pub contact_id: Option<Uuid>,
    pub user_id: Option<Uuid>,
    pub created_at: NaiveDateTime,
}

#[derive(Debug, Clone, Insertable)]
#[diesel(table_name = communications)]
pub struct NewCommunication {
    pub id: Uuid,
    pub call_sid: String,
    pub channel: String,
    pub direction: String,
    pub from_address: String,
    pub to_address: String,
    pub duration: Option<i32>,
    pub recording_url: Option<String>,
    pub contact_id: Option<Uuid>,
    pub user_id: Option<Uuid>,
}
