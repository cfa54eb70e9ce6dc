//! The platform's databases and the schema each one carries.

use sea_query::{
    Alias, ColumnDef, ConditionalStatement, Expr, ForeignKey, ForeignKeyAction,
    ForeignKeyCreateStatement, Iden, Index, Table,
};

use crate::ddl::{EnumType, IndexDef, SchemaDefinition, TableDef};
use crate::models::Role;

pub const UUID_EXTENSION: &str = "uuid-ossp";
pub const ROLE_TYPE: &str = "user_role";

/// One isolated database per service.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum ServiceDatabase {
    Auth,
    Patient,
    Appointment,
    Exercise,
    Progress,
    Communication,
    File,
}

impl ServiceDatabase {
    pub const ALL: [ServiceDatabase; 7] = [
        ServiceDatabase::Auth,
        ServiceDatabase::Patient,
        ServiceDatabase::Appointment,
        ServiceDatabase::Exercise,
        ServiceDatabase::Progress,
        ServiceDatabase::Communication,
        ServiceDatabase::File,
    ];

    pub fn name(&self) -> &'static str {
        match self {
            ServiceDatabase::Auth => "auth_db",
            ServiceDatabase::Patient => "patient_db",
            ServiceDatabase::Appointment => "appointment_db",
            ServiceDatabase::Exercise => "exercise_db",
            ServiceDatabase::Progress => "progress_db",
            ServiceDatabase::Communication => "communication_db",
            ServiceDatabase::File => "file_db",
        }
    }

    /// Schema owned by this database, if any has been defined.
    pub fn schema(&self) -> Option<SchemaDefinition> {
        match self {
            ServiceDatabase::Auth => Some(auth_schema()),
            ServiceDatabase::Patient => Some(patient_schema()),
            _ => None,
        }
    }
}

pub fn all_database_names() -> Vec<&'static str> {
    ServiceDatabase::ALL.iter().map(|db| db.name()).collect()
}

#[derive(Iden, Clone, Copy)]
enum Users {
    Table,
    Id,
    Email,
    PasswordHash,
    FirstName,
    LastName,
    Role,
    IsActive,
    EmailVerified,
    CreatedAt,
    UpdatedAt,
    LastLogin,
}

#[derive(Iden, Clone, Copy)]
enum Patients {
    Table,
    Id,
    UserId,
    FirstName,
    LastName,
    DateOfBirth,
    Gender,
    Email,
    Phone,
    Address,
    InsuranceProvider,
    InsuranceNumber,
    CreatedAt,
    UpdatedAt,
}

#[derive(Iden, Clone, Copy)]
enum MedicalRecords {
    Table,
    Id,
    PatientId,
    RecordType,
    Description,
    RecordDate,
    PractitionerId,
    CreatedAt,
    UpdatedAt,
}

#[derive(Iden, Clone, Copy)]
enum Attachments {
    Table,
    Id,
    PatientId,
    MedicalRecordId,
    FileName,
    FileType,
    FileUrl,
    CreatedAt,
    UpdatedAt,
}

#[derive(Iden, Clone, Copy)]
enum PatientPractitioners {
    Table,
    PatientId,
    PractitionerId,
    AssignedDate,
    AccessLevel,
    IsPrimary,
    CreatedAt,
    UpdatedAt,
}

fn timestamp<T: Iden + 'static>(column: T) -> ColumnDef {
    ColumnDef::new(column)
        .timestamp_with_time_zone()
        .not_null()
        .default(Expr::current_timestamp())
        .to_owned()
}

fn generated_id<T: Iden + 'static>(column: T) -> ColumnDef {
    ColumnDef::new(column)
        .uuid()
        .not_null()
        .default(Expr::cust("uuid_generate_v4()"))
        .primary_key()
        .to_owned()
}

fn cascade_to_patient<T: Iden + Copy + 'static>(
    name: &str,
    table: T,
    column: T,
) -> ForeignKeyCreateStatement {
    ForeignKey::create()
        .name(name)
        .from(table, column)
        .to(Patients::Table, Patients::Id)
        .on_delete(ForeignKeyAction::Cascade)
        .to_owned()
}

pub fn auth_schema() -> SchemaDefinition {
    let users = TableDef::new(
        Users::Table,
        Table::create()
            .col(ColumnDef::new(Users::Id).string_len(36).not_null().primary_key())
            .col(ColumnDef::new(Users::Email).string_len(255).not_null().unique_key())
            .col(ColumnDef::new(Users::PasswordHash).string_len(255).not_null())
            .col(ColumnDef::new(Users::FirstName).string_len(100).not_null())
            .col(ColumnDef::new(Users::LastName).string_len(100).not_null())
            .col(ColumnDef::new(Users::Role).custom(Alias::new(ROLE_TYPE)).not_null())
            .col(ColumnDef::new(Users::IsActive).boolean().not_null().default(true))
            .col(ColumnDef::new(Users::EmailVerified).boolean().not_null().default(false))
            .col(timestamp(Users::CreatedAt))
            .col(timestamp(Users::UpdatedAt))
            .col(ColumnDef::new(Users::LastLogin).timestamp_with_time_zone().null())
            .to_owned(),
    );

    SchemaDefinition {
        extensions: vec![UUID_EXTENSION],
        enums: vec![EnumType {
            name: ROLE_TYPE,
            labels: Role::ALL.iter().map(Role::as_str).collect(),
        }],
        tables: vec![users],
        indexes: vec![
            IndexDef::new(
                "idx_users_email",
                Index::create().table(Users::Table).col(Users::Email).to_owned(),
            ),
            IndexDef::new(
                "idx_users_role",
                Index::create().table(Users::Table).col(Users::Role).to_owned(),
            ),
        ],
    }
}

pub fn patient_schema() -> SchemaDefinition {
    let patients = TableDef::new(
        Patients::Table,
        Table::create()
            .col(generated_id(Patients::Id))
            .col(ColumnDef::new(Patients::UserId).uuid().not_null())
            .col(ColumnDef::new(Patients::FirstName).string_len(100).not_null())
            .col(ColumnDef::new(Patients::LastName).string_len(100).not_null())
            .col(ColumnDef::new(Patients::DateOfBirth).date().not_null())
            .col(ColumnDef::new(Patients::Gender).string_len(20).null())
            .col(ColumnDef::new(Patients::Email).string_len(255).not_null().unique_key())
            .col(ColumnDef::new(Patients::Phone).string_len(20).null())
            .col(ColumnDef::new(Patients::Address).text().null())
            .col(ColumnDef::new(Patients::InsuranceProvider).string_len(100).null())
            .col(ColumnDef::new(Patients::InsuranceNumber).string_len(100).null())
            .col(timestamp(Patients::CreatedAt))
            .col(timestamp(Patients::UpdatedAt))
            .to_owned(),
    );

    let medical_records = TableDef::new(
        MedicalRecords::Table,
        Table::create()
            .col(generated_id(MedicalRecords::Id))
            .col(ColumnDef::new(MedicalRecords::PatientId).uuid().not_null())
            .col(ColumnDef::new(MedicalRecords::RecordType).string_len(100).not_null())
            .col(ColumnDef::new(MedicalRecords::Description).text().not_null())
            .col(ColumnDef::new(MedicalRecords::RecordDate).date().not_null())
            .col(ColumnDef::new(MedicalRecords::PractitionerId).uuid().null())
            .col(timestamp(MedicalRecords::CreatedAt))
            .col(timestamp(MedicalRecords::UpdatedAt))
            .foreign_key(&mut cascade_to_patient(
                "fk_medical_records_patient",
                MedicalRecords::Table,
                MedicalRecords::PatientId,
            ))
            .to_owned(),
    );

    let attachments = TableDef::new(
        Attachments::Table,
        Table::create()
            .col(generated_id(Attachments::Id))
            .col(ColumnDef::new(Attachments::PatientId).uuid().not_null())
            .col(ColumnDef::new(Attachments::MedicalRecordId).uuid().null())
            .col(ColumnDef::new(Attachments::FileName).string_len(255).not_null())
            .col(ColumnDef::new(Attachments::FileType).string_len(100).not_null())
            .col(ColumnDef::new(Attachments::FileUrl).string_len(512).not_null())
            .col(timestamp(Attachments::CreatedAt))
            .col(timestamp(Attachments::UpdatedAt))
            .foreign_key(&mut cascade_to_patient(
                "fk_attachments_patient",
                Attachments::Table,
                Attachments::PatientId,
            ))
            .foreign_key(
                ForeignKey::create()
                    .name("fk_attachments_medical_record")
                    .from(Attachments::Table, Attachments::MedicalRecordId)
                    .to(MedicalRecords::Table, MedicalRecords::Id)
                    .on_delete(ForeignKeyAction::Cascade),
            )
            .to_owned(),
    );

    let patient_practitioners = TableDef::new(
        PatientPractitioners::Table,
        Table::create()
            .col(ColumnDef::new(PatientPractitioners::PatientId).uuid().not_null())
            .col(ColumnDef::new(PatientPractitioners::PractitionerId).uuid().not_null())
            .col(
                ColumnDef::new(PatientPractitioners::AssignedDate)
                    .date()
                    .not_null()
                    .default(Expr::cust("CURRENT_DATE")),
            )
            .col(
                ColumnDef::new(PatientPractitioners::AccessLevel)
                    .string_len(50)
                    .not_null()
                    .default("standard"),
            )
            .col(
                ColumnDef::new(PatientPractitioners::IsPrimary)
                    .boolean()
                    .not_null()
                    .default(false),
            )
            .col(timestamp(PatientPractitioners::CreatedAt))
            .col(timestamp(PatientPractitioners::UpdatedAt))
            .primary_key(
                Index::create()
                    .col(PatientPractitioners::PatientId)
                    .col(PatientPractitioners::PractitionerId),
            )
            .foreign_key(&mut cascade_to_patient(
                "fk_patient_practitioners_patient",
                PatientPractitioners::Table,
                PatientPractitioners::PatientId,
            ))
            .to_owned(),
    );

    SchemaDefinition {
        extensions: vec![UUID_EXTENSION],
        enums: vec![],
        tables: vec![patients, medical_records, attachments, patient_practitioners],
        indexes: vec![
            IndexDef::new(
                "idx_patients_user_id",
                Index::create().table(Patients::Table).col(Patients::UserId).to_owned(),
            ),
            IndexDef::new(
                "idx_patients_email",
                Index::create().table(Patients::Table).col(Patients::Email).to_owned(),
            ),
            IndexDef::new(
                "idx_medical_records_patient_id",
                Index::create()
                    .table(MedicalRecords::Table)
                    .col(MedicalRecords::PatientId)
                    .to_owned(),
            ),
            IndexDef::new(
                "idx_medical_records_practitioner_id",
                Index::create()
                    .table(MedicalRecords::Table)
                    .col(MedicalRecords::PractitionerId)
                    .to_owned(),
            ),
            IndexDef::new(
                "idx_attachments_patient_id",
                Index::create()
                    .table(Attachments::Table)
                    .col(Attachments::PatientId)
                    .to_owned(),
            ),
            IndexDef::new(
                "idx_attachments_medical_record_id",
                Index::create()
                    .table(Attachments::Table)
                    .col(Attachments::MedicalRecordId)
                    .to_owned(),
            ),
            IndexDef::new(
                "idx_patient_practitioners_practitioner_id",
                Index::create()
                    .table(PatientPractitioners::Table)
                    .col(PatientPractitioners::PractitionerId)
                    .to_owned(),
            ),
            IndexDef::new(
                "uq_patient_practitioners_primary",
                Index::create()
                    .table(PatientPractitioners::Table)
                    .col(PatientPractitioners::PatientId)
                    .unique()
                    .and_where(Expr::col(PatientPractitioners::IsPrimary).eq(true))
                    .to_owned(),
            ),
        ],
    }
}
