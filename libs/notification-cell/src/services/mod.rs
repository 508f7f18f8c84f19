pub mod notification;

pub use notification::{NotificationDispatcher, NotificationService};
