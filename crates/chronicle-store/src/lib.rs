pub mod context;
pub mod criteria;
pub mod cursor;
pub mod database;
pub mod error;
pub mod log;
pub mod record;
pub mod row_helpers;
pub mod schema;

pub use context::{AggregateRoot, SqlDataContext};
pub use criteria::{Constraint, Criteria, CriteriaField};
pub use cursor::EventCursor;
pub use database::{ConnectionConfig, Session};
pub use error::StoreError;
pub use log::MessageLog;
pub use record::MessageRecord;
