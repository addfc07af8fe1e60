//! Database access layer.
//!
//! - Driver seam (`OdbcBackend`, `DbConnection`) and its `odbc-api` implementation
//! - Blocking bridge that moves driver calls off the async runtime
//! - Lifecycle manager owning the single shared connection
//! - Type mappings for decoding fetched values

pub mod bridge;
pub mod driver;
pub mod lifecycle;
pub mod odbc;
pub mod types;

pub use bridge::{BlockingBridge, BridgeConfig};
pub use driver::{DbConnection, OdbcBackend};
pub use lifecycle::{ConnectionManager, SharedConnection};
pub use odbc::OdbcDriver;
pub use types::{TypeCategory, categorize_type, decode_text};
