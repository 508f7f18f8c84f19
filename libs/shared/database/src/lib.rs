pub mod memory;
pub mod schema;
pub mod state;
pub mod store;
pub mod supabase;

pub use memory::{MemoryStore, UniqueIndex};
pub use state::AppState;
pub use store::{DataStore, Filter, FilterOp, Query, StoreError};
pub use supabase::SupabaseClient;
