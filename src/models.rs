use std::fmt;
use std::io::Write;
use std::str::FromStr;

use chrono::{DateTime, NaiveDate, Utc};
use diesel::deserialize::{self, FromSql, FromSqlRow};
use diesel::expression::AsExpression;
use diesel::pg::{Pg, PgValue};
use diesel::prelude::*;
use diesel::serialize::{self, IsNull, Output, ToSql};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::schema::{attachments, medical_records, patient_practitioners, patients, users};
use crate::schema::sql_types::UserRole;

/// Closed set of identity roles, stored as the `user_role` Postgres enum.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, AsExpression, FromSqlRow)]
#[diesel(sql_type = UserRole)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    Patient,
    Practitioner,
    Admin,
}

impl Role {
    pub const ALL: [Role; 3] = [Role::Patient, Role::Practitioner, Role::Admin];

    pub fn as_str(&self) -> &'static str {
        match self {
            Role::Patient => "patient",
            Role::Practitioner => "practitioner",
            Role::Admin => "admin",
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, thiserror::Error)]
#[error("unknown role {0:?}")]
pub struct UnknownRole(pub String);

impl FromStr for Role {
    type Err = UnknownRole;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Role::ALL
            .into_iter()
            .find(|role| role.as_str() == s)
            .ok_or_else(|| UnknownRole(s.to_string()))
    }
}

impl ToSql<UserRole, Pg> for Role {
    fn to_sql<'b>(&'b self, out: &mut Output<'b, '_, Pg>) -> serialize::Result {
        out.write_all(self.as_str().as_bytes())?;
        Ok(IsNull::No)
    }
}

impl FromSql<UserRole, Pg> for Role {
    fn from_sql(bytes: PgValue<'_>) -> deserialize::Result<Self> {
        let label = std::str::from_utf8(bytes.as_bytes())?;
        Ok(label.parse()?)
    }
}

#[derive(Debug, Clone, Queryable, Selectable, Serialize)]
#[diesel(table_name = users)]
#[diesel(check_for_backend(diesel::pg::Pg))]
pub struct Identity {
    pub id: String,
    pub email: String,
    #[serde(skip_serializing)]
    pub password_hash: String,
    pub first_name: String,
    pub last_name: String,
    pub role: Role,
    pub is_active: bool,
    pub email_verified: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub last_login: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Insertable)]
#[diesel(table_name = users)]
pub struct NewIdentity<'a> {
    pub id: &'a str,
    pub email: &'a str,
    pub password_hash: &'a str,
    pub first_name: &'a str,
    pub last_name: &'a str,
    pub role: Role,
    pub is_active: bool,
    pub email_verified: bool,
}

#[derive(Debug, Clone, Queryable, Selectable, Serialize)]
#[diesel(table_name = patients)]
#[diesel(check_for_backend(diesel::pg::Pg))]
pub struct Patient {
    pub id: Uuid,
    pub user_id: Uuid,
    pub first_name: String,
    pub last_name: String,
    pub date_of_birth: NaiveDate,
    pub gender: Option<String>,
    pub email: String,
    pub phone: Option<String>,
    pub address: Option<String>,
    pub insurance_provider: Option<String>,
    pub insurance_number: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Deserialize, Insertable)]
#[diesel(table_name = patients)]
pub struct NewPatient {
    pub user_id: Uuid,
    pub first_name: String,
    pub last_name: String,
    pub date_of_birth: NaiveDate,
    pub gender: Option<String>,
    pub email: String,
    pub phone: Option<String>,
    pub address: Option<String>,
    pub insurance_provider: Option<String>,
    pub insurance_number: Option<String>,
}

/// Contact fields a patient or their practitioner may change. `None` leaves a field as is.
#[derive(Debug, Clone, Default, Deserialize, AsChangeset)]
#[diesel(table_name = patients)]
pub struct PatientContactUpdate {
    pub email: Option<String>,
    pub phone: Option<String>,
    pub address: Option<String>,
    pub insurance_provider: Option<String>,
    pub insurance_number: Option<String>,
}

impl PatientContactUpdate {
    pub fn is_empty(&self) -> bool {
        self.email.is_none()
            && self.phone.is_none()
            && self.address.is_none()
            && self.insurance_provider.is_none()
            && self.insurance_number.is_none()
    }
}

#[derive(Debug, Clone, Queryable, Selectable, Serialize)]
#[diesel(table_name = medical_records)]
#[diesel(check_for_backend(diesel::pg::Pg))]
pub struct MedicalRecord {
    pub id: Uuid,
    pub patient_id: Uuid,
    pub record_type: String,
    pub description: String,
    pub record_date: NaiveDate,
    pub practitioner_id: Option<Uuid>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Deserialize, Insertable)]
#[diesel(table_name = medical_records)]
pub struct NewMedicalRecord {
    pub patient_id: Uuid,
    pub record_type: String,
    pub description: String,
    pub record_date: NaiveDate,
    pub practitioner_id: Option<Uuid>,
}

#[derive(Debug, Clone, Queryable, Selectable, Serialize)]
#[diesel(table_name = attachments)]
#[diesel(check_for_backend(diesel::pg::Pg))]
pub struct Attachment {
    pub id: Uuid,
    pub patient_id: Uuid,
    pub medical_record_id: Option<Uuid>,
    pub file_name: String,
    pub file_type: String,
    pub file_url: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Deserialize, Insertable)]
#[diesel(table_name = attachments)]
pub struct NewAttachment {
    pub patient_id: Uuid,
    pub medical_record_id: Option<Uuid>,
    pub file_name: String,
    pub file_type: String,
    pub file_url: String,
}

#[derive(Debug, Clone, Queryable, Selectable, Serialize)]
#[diesel(table_name = patient_practitioners)]
#[diesel(check_for_backend(diesel::pg::Pg))]
pub struct PatientPractitioner {
    pub patient_id: Uuid,
    pub practitioner_id: Uuid,
    pub assigned_date: NaiveDate,
    pub access_level: String,
    pub is_primary: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Assignment request. Unset fields fall back to the column defaults
/// (today, `"standard"`, not primary).
#[derive(Debug, Clone, Deserialize, Insertable)]
#[diesel(table_name = patient_practitioners)]
pub struct NewPatientPractitioner {
    pub patient_id: Uuid,
    pub practitioner_id: Uuid,
    pub assigned_date: Option<NaiveDate>,
    pub access_level: Option<String>,
    pub is_primary: Option<bool>,
}

impl NewPatientPractitioner {
    pub fn standard(patient_id: Uuid, practitioner_id: Uuid) -> Self {
        Self {
            patient_id,
            practitioner_id,
            assigned_date: None,
            access_level: None,
            is_primary: None,
        }
    }

    pub fn primary(patient_id: Uuid, practitioner_id: Uuid) -> Self {
        Self {
            is_primary: Some(true),
            ..Self::standard(patient_id, practitioner_id)
        }
    }
}
