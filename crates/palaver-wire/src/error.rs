use thiserror::Error;

#[derive(Debug, Error, Clone, Copy, PartialEq, Eq)]
pub enum Error {
    #[error("empty name")]
    EmptyName,
    #[error("name of {0} bytes exceeds the limit")]
    NameLen(usize),
    #[error("name contains control bytes")]
    UnprintableName,
}
