pub mod codec;
pub mod conn;
pub mod error;
pub mod server;

pub use error::NetError;
pub type NetResult<T> = Result<T, error::NetError>;

pub use conn::RelayConn;
