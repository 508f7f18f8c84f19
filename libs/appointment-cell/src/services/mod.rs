pub mod availability;
pub mod booking;
pub mod lifecycle;

pub use availability::SlotAvailabilityChecker;
pub use booking::AppointmentBookingService;
pub use lifecycle::AppointmentLifecycleService;
