pub mod logs;
pub mod profiles;

pub use logs::{LogEntry, LogSink, LogStore, LOG_PAGE_SIZE};
pub use profiles::{FileProfileStore, Profile, ProfileError, ProfileInput, ProfileStore};
