use std::io;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum NetError {
    #[error("IO")]
    IO(#[from] io::Error),
    #[error("Line of length {0} is too large.")]
    LineSize(usize),
    #[error("Relay registry closed")]
    RelayClosed,
}
