// Diesel mappings for the tables created by `catalog`. `users` lives in the
// auth database, the rest in the patient database.

pub mod sql_types {
    #[derive(diesel::query_builder::QueryId, Clone, diesel::sql_types::SqlType)]
    #[diesel(postgres_type(name = "user_role"))]
    pub struct UserRole;
}

diesel::table! {
    use diesel::sql_types::*;
    use super::sql_types::UserRole;

    users (id) {
        #[max_length = 36]
        id -> Varchar,
        #[max_length = 255]
        email -> Varchar,
        #[max_length = 255]
        password_hash -> Varchar,
        #[max_length = 100]
        first_name -> Varchar,
        #[max_length = 100]
        last_name -> Varchar,
        role -> UserRole,
        is_active -> Bool,
        email_verified -> Bool,
        created_at -> Timestamptz,
        updated_at -> Timestamptz,
        last_login -> Nullable<Timestamptz>,
    }
}

diesel::table! {
    patients (id) {
        id -> Uuid,
        user_id -> Uuid,
        #[max_length = 100]
        first_name -> Varchar,
        #[max_length = 100]
        last_name -> Varchar,
        date_of_birth -> Date,
        #[max_length = 20]
        gender -> Nullable<Varchar>,
        #[max_length = 255]
        email -> Varchar,
        #[max_length = 20]
        phone -> Nullable<Varchar>,
        address -> Nullable<Text>,
        #[max_length = 100]
        insurance_provider -> Nullable<Varchar>,
        #[max_length = 100]
        insurance_number -> Nullable<Varchar>,
        created_at -> Timestamptz,
        updated_at -> Timestamptz,
    }
}

diesel::table! {
    medical_records (id) {
        id -> Uuid,
        patient_id -> Uuid,
        #[max_length = 100]
        record_type -> Varchar,
        description -> Text,
        record_date -> Date,
        practitioner_id -> Nullable<Uuid>,
        created_at -> Timestamptz,
        updated_at -> Timestamptz,
    }
}

diesel::table! {
    attachments (id) {
        id -> Uuid,
        patient_id -> Uuid,
        medical_record_id -> Nullable<Uuid>,
        #[max_length = 255]
        file_name -> Varchar,
        #[max_length = 100]
        file_type -> Varchar,
        #[max_length = 512]
        file_url -> Varchar,
        created_at -> Timestamptz,
        updated_at -> Timestamptz,
    }
}

diesel::table! {
    patient_practitioners (patient_id, practitioner_id) {
        patient_id -> Uuid,
        practitioner_id -> Uuid,
        assigned_date -> Date,
        #[max_length = 50]
        access_level -> Varchar,
        is_primary -> Bool,
        created_at -> Timestamptz,
        updated_at -> Timestamptz,
    }
}

diesel::joinable!(medical_records -> patients (patient_id));
diesel::joinable!(attachments -> patients (patient_id));
diesel::joinable!(attachments -> medical_records (medical_record_id));
diesel::joinable!(patient_practitioners -> patients (patient_id));

diesel::allow_tables_to_appear_in_same_query!(
    patients,
    medical_records,
    attachments,
    patient_practitioners,
);
