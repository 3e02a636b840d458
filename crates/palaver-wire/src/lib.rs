pub mod command;
pub mod error;
pub mod reply;

pub use command::Command;
pub use error::Error;

pub type WireResult<T> = Result<T, error::Error>;

/// Longest nickname or room name accepted on a `/join` line, in bytes.
pub const MAX_NAME_LEN: usize = 31;

/// Longest filename accepted on a `/file` line, in bytes.
pub const MAX_FILENAME_LEN: usize = 255;

/// Largest file payload the relay will stream, in bytes.
pub const MAX_FILE_SIZE: u64 = 1 << 30;

/// Bounded storage for a validated nickname or room name.
pub type Name = arrayvec::ArrayString<MAX_NAME_LEN>;
