//! Credential protection for server descriptors.
//!
//! # Module Structure
//! - `credentials`: user/password container with automatic memory zeroing
//! - `connection`: `mysql://` URL parsing into descriptors
//!
//! # Security Guarantees
//! - Passwords are stored in `Zeroizing` containers and cleared on drop
//! - `Debug` output redacts passwords
//! - URLs are redacted before they reach logs or error messages

mod connection;
mod credentials;

pub use connection::{MYSQL_SCHEMES, parse_server_url};
pub use credentials::Credentials;
