mod error;
mod paths;
mod replay;
mod schema;
mod store;

pub use error::SessionStoreError;
pub use paths::{session_file_name, session_root};
pub use schema::{
    EntryRecordType, SessionEntry, SessionEntryKind, SessionHeader, SessionRecordType,
};
pub use store::SessionStore;
