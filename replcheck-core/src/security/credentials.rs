//! Secure credential container with automatic memory zeroing.

use zeroize::Zeroizing;

/// User name and password for one server.
///
/// Both values live in `Zeroizing` containers so the memory is cleared when
/// the descriptor holding them is dropped. The password is only reachable
/// through [`Credentials::expose_password`], which the connection layer calls
/// when it builds driver options.
///
/// # Example
///
/// ```rust
/// use replcheck_core::security::Credentials;
///
/// let creds = Credentials::new("repl".to_string(), "secret".to_string());
/// assert_eq!(creds.username(), "repl");
/// assert!(creds.has_password());
/// assert!(!format!("{:?}", creds).contains("secret"));
/// ```
#[derive(Clone, PartialEq, Eq)]
pub struct Credentials {
    username: Zeroizing<String>,
    password: Zeroizing<String>,
}

impl Credentials {
    /// Creates new credentials. An empty password means "no password".
    pub fn new(username: String, password: String) -> Self {
        Self {
            username: Zeroizing::new(username),
            password: Zeroizing::new(password),
        }
    }

    /// Gets the user name.
    pub fn username(&self) -> &str {
        &self.username
    }

    /// Checks if a password is present without exposing it.
    pub fn has_password(&self) -> bool {
        !self.password.is_empty()
    }

    /// Returns the password for handing to the database driver.
    ///
    /// Callers must not log or persist the returned value.
    pub fn expose_password(&self) -> &str {
        &self.password
    }

    /// Returns a copy of these credentials with `password` replaced.
    pub fn with_password(&self, password: String) -> Self {
        Self {
            username: self.username.clone(),
            password: Zeroizing::new(password),
        }
    }
}

impl std::fmt::Debug for Credentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Credentials")
            .field("username", &self.username.as_str())
            .field("password", &if self.has_password() { "****" } else { "" })
            .finish()
    }
}
