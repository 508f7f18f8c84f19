//! Table names and unique constraints of the clinic schema. `sql/schema.sql`
//! declares the same constraints for the hosted database.

use crate::memory::UniqueIndex;

pub const USERS: &str = "users";
pub const DOCTORS: &str = "doctors";
pub const APPOINTMENTS: &str = "appointments";
pub const NOTIFICATIONS: &str = "notifications";

pub fn unique_indexes() -> Vec<UniqueIndex> {
    vec![
        UniqueIndex::new("users_pkey", USERS, &["id"]),
        UniqueIndex::new("doctors_pkey", DOCTORS, &["id"]),
        UniqueIndex::new("doctors_user_id_key", DOCTORS, &["user_id"]),
        UniqueIndex::new("doctors_license_number_key", DOCTORS, &["license_number"]),
        UniqueIndex::new("appointments_pkey", APPOINTMENTS, &["id"]),
        UniqueIndex::new("appointments_active_slot_key", APPOINTMENTS, &["doctor_id", "date", "time"])
            .unless("status", "cancelled"),
        UniqueIndex::new("notifications_pkey", NOTIFICATIONS, &["id"]),
    ]
}
