//! CRUD the auth and patient services run over the bootstrapped schema.
//!
//! Identity functions take a connection to the auth database, everything else
//! a connection to the patient database. References that cross the two are
//! checked through an [`IdentityDirectory`].

use chrono::Utc;
use diesel::prelude::*;
use diesel::PgConnection;
use uuid::Uuid;

use crate::directory::IdentityDirectory;
use crate::error::{StoreError, StoreResult};
use crate::models::{
    Attachment, Identity, MedicalRecord, NewAttachment, NewIdentity, NewMedicalRecord, NewPatient,
    NewPatientPractitioner, Patient, PatientContactUpdate, PatientPractitioner, Role,
};
use crate::schema::{attachments, medical_records, patient_practitioners, patients, users};

pub const DEFAULT_PAGE_SIZE: i64 = 100;

fn require_role<D>(directory: &D, identity_id: Uuid, role: Role, field: &str) -> StoreResult<()>
where
    D: IdentityDirectory + ?Sized,
{
    if directory.has_role(&identity_id.to_string(), role)? {
        Ok(())
    } else {
        Err(StoreError::InvalidReference(format!(
            "{field} {identity_id} is not an active {role} identity"
        )))
    }
}

// Identities (auth database)

pub fn insert_identity(
    conn: &mut PgConnection,
    identity: &NewIdentity<'_>,
) -> StoreResult<Identity> {
    Ok(diesel::insert_into(users::table)
        .values(identity)
        .returning(Identity::as_returning())
        .get_result(conn)?)
}

pub fn find_identity(conn: &mut PgConnection, id: &str) -> StoreResult<Option<Identity>> {
    Ok(users::table
        .find(id)
        .select(Identity::as_select())
        .first(conn)
        .optional()?)
}

pub fn find_identity_by_email(
    conn: &mut PgConnection,
    email: &str,
) -> StoreResult<Option<Identity>> {
    Ok(users::table
        .filter(users::email.eq(email))
        .select(Identity::as_select())
        .first(conn)
        .optional()?)
}

pub fn record_login(conn: &mut PgConnection, id: &str) -> StoreResult<()> {
    let now = Utc::now();
    let updated = diesel::update(users::table.find(id))
        .set((users::last_login.eq(Some(now)), users::updated_at.eq(now)))
        .execute(conn)?;
    if updated == 0 {
        return Err(StoreError::NotFound("identity"));
    }
    Ok(())
}

pub fn delete_identity(conn: &mut PgConnection, id: &str) -> StoreResult<()> {
    let deleted = diesel::delete(users::table.find(id)).execute(conn)?;
    if deleted == 0 {
        return Err(StoreError::NotFound("identity"));
    }
    Ok(())
}

// Patients

#[derive(Debug, Clone, Default)]
pub struct PatientQuery {
    pub skip: i64,
    pub limit: Option<i64>,
    /// Case-insensitive match on first name, last name or email.
    pub search: Option<String>,
    pub user_id: Option<Uuid>,
    pub practitioner_id: Option<Uuid>,
}

pub fn create_patient<D>(
    conn: &mut PgConnection,
    directory: &D,
    patient: &NewPatient,
) -> StoreResult<Patient>
where
    D: IdentityDirectory + ?Sized,
{
    require_role(directory, patient.user_id, Role::Patient, "user_id")?;
    Ok(diesel::insert_into(patients::table)
        .values(patient)
        .returning(Patient::as_returning())
        .get_result(conn)?)
}

pub fn get_patient(conn: &mut PgConnection, id: Uuid) -> StoreResult<Patient> {
    patients::table
        .find(id)
        .select(Patient::as_select())
        .first(conn)
        .optional()?
        .ok_or(StoreError::NotFound("patient"))
}

pub fn get_patient_by_user_id(
    conn: &mut PgConnection,
    user_id: Uuid,
) -> StoreResult<Option<Patient>> {
    Ok(patients::table
        .filter(patients::user_id.eq(user_id))
        .select(Patient::as_select())
        .first(conn)
        .optional()?)
}

pub fn list_patients(conn: &mut PgConnection, query: &PatientQuery) -> StoreResult<Vec<Patient>> {
    let mut select = patients::table.select(Patient::as_select()).into_boxed();

    if let Some(search) = query.search.as_deref().map(str::trim).filter(|s| !s.is_empty()) {
        let pattern = format!("%{search}%");
        select = select.filter(
            patients::first_name
                .ilike(pattern.clone())
                .or(patients::last_name.ilike(pattern.clone()))
                .or(patients::email.ilike(pattern)),
        );
    }
    if let Some(user_id) = query.user_id {
        select = select.filter(patients::user_id.eq(user_id));
    }
    if let Some(practitioner_id) = query.practitioner_id {
        select = select.filter(
            patients::id.eq_any(
                patient_practitioners::table
                    .filter(patient_practitioners::practitioner_id.eq(practitioner_id))
                    .select(patient_practitioners::patient_id),
            ),
        );
    }

    Ok(select
        .order((patients::last_name.asc(), patients::first_name.asc(), patients::id.asc()))
        .offset(query.skip.max(0))
        .limit(query.limit.unwrap_or(DEFAULT_PAGE_SIZE).clamp(1, DEFAULT_PAGE_SIZE))
        .load(conn)?)
}

pub fn update_patient_contact(
    conn: &mut PgConnection,
    id: Uuid,
    update: &PatientContactUpdate,
) -> StoreResult<Patient> {
    if update.is_empty() {
        return get_patient(conn, id);
    }
    diesel::update(patients::table.find(id))
        .set((update, patients::updated_at.eq(Utc::now())))
        .returning(Patient::as_returning())
        .get_result(conn)
        .optional()?
        .ok_or(StoreError::NotFound("patient"))
}

/// Removes the patient and, through the foreign keys, its records, attachments and assignments.
pub fn delete_patient(conn: &mut PgConnection, id: Uuid) -> StoreResult<()> {
    let deleted = diesel::delete(patients::table.find(id)).execute(conn)?;
    if deleted == 0 {
        return Err(StoreError::NotFound("patient"));
    }
    Ok(())
}

// Medical records

pub fn create_medical_record<D>(
    conn: &mut PgConnection,
    directory: &D,
    record: &NewMedicalRecord,
) -> StoreResult<MedicalRecord>
where
    D: IdentityDirectory + ?Sized,
{
    if let Some(practitioner_id) = record.practitioner_id {
        require_role(directory, practitioner_id, Role::Practitioner, "practitioner_id")?;
    }
    Ok(diesel::insert_into(medical_records::table)
        .values(record)
        .returning(MedicalRecord::as_returning())
        .get_result(conn)?)
}

pub fn get_medical_record(conn: &mut PgConnection, id: Uuid) -> StoreResult<MedicalRecord> {
    medical_records::table
        .find(id)
        .select(MedicalRecord::as_select())
        .first(conn)
        .optional()?
        .ok_or(StoreError::NotFound("medical record"))
}

pub fn list_medical_records(
    conn: &mut PgConnection,
    patient_id: Uuid,
) -> StoreResult<Vec<MedicalRecord>> {
    Ok(medical_records::table
        .filter(medical_records::patient_id.eq(patient_id))
        .select(MedicalRecord::as_select())
        .order((medical_records::record_date.desc(), medical_records::created_at.desc()))
        .load(conn)?)
}

/// Removes the record and its attachments. The patient's other attachments stay.
pub fn delete_medical_record(conn: &mut PgConnection, id: Uuid) -> StoreResult<()> {
    let deleted = diesel::delete(medical_records::table.find(id)).execute(conn)?;
    if deleted == 0 {
        return Err(StoreError::NotFound("medical record"));
    }
    Ok(())
}

// Attachments

pub fn create_attachment(
    conn: &mut PgConnection,
    attachment: &NewAttachment,
) -> StoreResult<Attachment> {
    if let Some(record_id) = attachment.medical_record_id {
        let owner = medical_records::table
            .find(record_id)
            .select(medical_records::patient_id)
            .first::<Uuid>(conn)
            .optional()?;
        match owner {
            Some(owner) if owner == attachment.patient_id => {}
            Some(_) => {
                return Err(StoreError::InvalidReference(format!(
                    "medical record {record_id} belongs to another patient"
                )));
            }
            None => return Err(StoreError::NotFound("medical record")),
        }
    }
    Ok(diesel::insert_into(attachments::table)
        .values(attachment)
        .returning(Attachment::as_returning())
        .get_result(conn)?)
}

pub fn list_attachments_for_patient(
    conn: &mut PgConnection,
    patient_id: Uuid,
) -> StoreResult<Vec<Attachment>> {
    Ok(attachments::table
        .filter(attachments::patient_id.eq(patient_id))
        .select(Attachment::as_select())
        .order(attachments::created_at.asc())
        .load(conn)?)
}

pub fn list_attachments_for_record(
    conn: &mut PgConnection,
    record_id: Uuid,
) -> StoreResult<Vec<Attachment>> {
    Ok(attachments::table
        .filter(attachments::medical_record_id.eq(record_id))
        .select(Attachment::as_select())
        .order(attachments::created_at.asc())
        .load(conn)?)
}

// Practitioner assignments

/// Link a practitioner to a patient. A primary assignment demotes the patient's
/// current primary in the same transaction; an existing pair is a conflict.
pub fn assign_practitioner<D>(
    conn: &mut PgConnection,
    directory: &D,
    assignment: &NewPatientPractitioner,
) -> StoreResult<PatientPractitioner>
where
    D: IdentityDirectory + ?Sized,
{
    require_role(directory, assignment.practitioner_id, Role::Practitioner, "practitioner_id")?;

    conn.transaction::<_, StoreError, _>(|conn| {
        if assignment.is_primary == Some(true) {
            diesel::update(
                patient_practitioners::table
                    .filter(patient_practitioners::patient_id.eq(assignment.patient_id))
                    .filter(patient_practitioners::is_primary.eq(true)),
            )
            .set((
                patient_practitioners::is_primary.eq(false),
                patient_practitioners::updated_at.eq(Utc::now()),
            ))
            .execute(conn)?;
        }
        Ok(diesel::insert_into(patient_practitioners::table)
            .values(assignment)
            .returning(PatientPractitioner::as_returning())
            .get_result(conn)?)
    })
}

pub fn list_practitioners(
    conn: &mut PgConnection,
    patient_id: Uuid,
) -> StoreResult<Vec<PatientPractitioner>> {
    Ok(patient_practitioners::table
        .filter(patient_practitioners::patient_id.eq(patient_id))
        .select(PatientPractitioner::as_select())
        .order((
            patient_practitioners::is_primary.desc(),
            patient_practitioners::assigned_date.asc(),
        ))
        .load(conn)?)
}

pub fn unassign_practitioner(
    conn: &mut PgConnection,
    patient_id: Uuid,
    practitioner_id: Uuid,
) -> StoreResult<()> {
    let deleted = diesel::delete(patient_practitioners::table.find((patient_id, practitioner_id)))
        .execute(conn)?;
    if deleted == 0 {
        return Err(StoreError::NotFound("assignment"));
    }
    Ok(())
}
