//! Value objects for the identity context.

use std::fmt;
use std::str::FromStr;
use std::sync::LazyLock;

use constant_time_eq::constant_time_eq;
use hexcore_core::error::DomainError;
use regex::Regex;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use uuid::Uuid;

// The pattern is a literal; compiling it cannot fail.
static EMAIL_PATTERN: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^[a-zA-Z0-9._%+-]+@[a-zA-Z0-9.-]+\.[a-zA-Z]{2,}$").expect("valid email pattern")
});

/// A normalised email address: trimmed and lower-cased.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Email(String);

impl Email {
    /// Parses and normalises an address.
    ///
    /// # Errors
    ///
    /// Returns `DomainError::Validation` if the address is empty or malformed.
    pub fn parse(raw: &str) -> Result<Self, DomainError> {
        let trimmed = raw.trim();
        if trimmed.is_empty() {
            return Err(DomainError::Validation("email must not be empty".into()));
        }
        if !EMAIL_PATTERN.is_match(trimmed) {
            return Err(DomainError::Validation(format!("invalid email address: {trimmed}")));
        }
        Ok(Self(trimmed.to_lowercase()))
    }

    /// The normalised address.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl TryFrom<String> for Email {
    type Error = DomainError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::parse(&value)
    }
}

impl From<Email> for String {
    fn from(email: Email) -> Self {
        email.0
    }
}

impl fmt::Display for Email {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Minimum password length in characters.
pub const MIN_PASSWORD_LEN: usize = 6;
/// Maximum password length in characters.
pub const MAX_PASSWORD_LEN: usize = 72;

/// A plaintext password that satisfies the password policy.
///
/// Never serialised and redacted from debug output.
#[derive(Clone)]
pub struct Password(String);

impl Password {
    /// Checks `raw` against the policy: 6 to 72 characters with at least one
    /// upper-case letter, lower-case letter, digit and symbol.
    ///
    /// # Errors
    ///
    /// Returns `DomainError::Validation` naming the first rule broken.
    pub fn parse(raw: &str) -> Result<Self, DomainError> {
        let len = raw.chars().count();
        if len < MIN_PASSWORD_LEN {
            return Err(DomainError::Validation(format!(
                "password must be at least {MIN_PASSWORD_LEN} characters"
            )));
        }
        if len > MAX_PASSWORD_LEN {
            return Err(DomainError::Validation(format!(
                "password must be at most {MAX_PASSWORD_LEN} characters"
            )));
        }
        let has_upper = raw.chars().any(char::is_uppercase);
        let has_lower = raw.chars().any(char::is_lowercase);
        let has_digit = raw.chars().any(|c| c.is_ascii_digit());
        let has_symbol = raw
            .chars()
            .any(|c| !c.is_alphanumeric() && !c.is_whitespace());
        if !(has_upper && has_lower && has_digit && has_symbol) {
            return Err(DomainError::Validation(
                "password must contain upper-case, lower-case, digit and symbol characters".into(),
            ));
        }
        Ok(Self(raw.to_owned()))
    }

    /// The plaintext.
    #[must_use]
    pub fn expose(&self) -> &str {
        &self.0
    }
}

impl fmt::Debug for Password {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("Password(***)")
    }
}

/// Salted SHA-256 digest of a password, stored as `salt$hex`.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PasswordHash(String);

impl PasswordHash {
    /// Hashes `password` with a fresh random salt.
    #[must_use]
    pub fn new(password: &Password) -> Self {
        let salt = Uuid::new_v4().simple().to_string();
        let digest = digest(&salt, password.expose());
        Self(format!("{salt}${digest}"))
    }

    /// Whether `plaintext` hashes to this value.
    #[must_use]
    pub fn verify(&self, plaintext: &str) -> bool {
        match self.0.split_once('$') {
            Some((salt, expected)) => {
                constant_time_eq(digest(salt, plaintext).as_bytes(), expected.as_bytes())
            }
            None => false,
        }
    }
}

impl fmt::Debug for PasswordHash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("PasswordHash(***)")
    }
}

fn digest(salt: &str, plaintext: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(salt.as_bytes());
    hasher.update(plaintext.as_bytes());
    hasher
        .finalize()
        .iter()
        .fold(String::with_capacity(64), |mut out, byte| {
            use std::fmt::Write;
            let _ = write!(out, "{byte:02x}");
            out
        })
}

/// Display name and biography.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserProfile {
    name: String,
    bio: String,
}

impl UserProfile {
    /// Builds a profile from trimmed input. The name takes 1 to 100
    /// characters, the bio at most 500.
    ///
    /// # Errors
    ///
    /// Returns `DomainError::Validation` if either field is out of range.
    pub fn new(name: &str, bio: &str) -> Result<Self, DomainError> {
        let name = name.trim();
        let bio = bio.trim();
        if name.is_empty() {
            return Err(DomainError::Validation("name must not be empty".into()));
        }
        if name.chars().count() > 100 {
            return Err(DomainError::Validation(
                "name must be at most 100 characters".into(),
            ));
        }
        if bio.chars().count() > 500 {
            return Err(DomainError::Validation(
                "bio must be at most 500 characters".into(),
            ));
        }
        Ok(Self {
            name: name.to_owned(),
            bio: bio.to_owned(),
        })
    }

    /// Display name.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Biography, possibly empty.
    #[must_use]
    pub fn bio(&self) -> &str {
        &self.bio
    }
}

/// A role granting a fixed set of permissions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum UserRole {
    /// Regular user.
    User,
    /// Full access.
    Admin,
    /// Can view and update users and moderate content.
    Moderator,
}

impl UserRole {
    /// Wire name.
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::User => "user",
            Self::Admin => "admin",
            Self::Moderator => "moderator",
        }
    }

    /// Whether the role grants `permission`, e.g. `users.view`.
    #[must_use]
    pub fn has_permission(self, permission: &str) -> bool {
        match self {
            Self::Admin => true,
            Self::Moderator => matches!(
                permission,
                "users.view" | "users.update" | "content.moderate"
            ),
            Self::User => matches!(permission, "profile.view" | "profile.update"),
        }
    }
}

impl FromStr for UserRole {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "user" => Ok(Self::User),
            "admin" => Ok(Self::Admin),
            "moderator" => Ok(Self::Moderator),
            other => Err(DomainError::Validation(format!("unknown role: {other}"))),
        }
    }
}

impl fmt::Display for UserRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Account status.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum UserStatus {
    /// May log in.
    Active,
    /// Deactivated by the user or an operator.
    Inactive,
    /// Locked, e.g. after repeated failed logins.
    Suspended,
    /// Terminal.
    Deleted,
}

impl UserStatus {
    /// Wire name.
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Active => "active",
            Self::Inactive => "inactive",
            Self::Suspended => "suspended",
            Self::Deleted => "deleted",
        }
    }

    /// Whether the account may log in.
    #[must_use]
    pub fn is_active(self) -> bool {
        self == Self::Active
    }

    /// Whether moving to `next` is allowed.
    #[must_use]
    pub fn can_transition_to(self, next: Self) -> bool {
        matches!(
            (self, next),
            (Self::Active, Self::Inactive | Self::Suspended | Self::Deleted)
                | (Self::Inactive | Self::Suspended, Self::Active | Self::Deleted)
        )
    }

    /// Validates a move to `next`.
    ///
    /// # Errors
    ///
    /// Returns `DomainError::InvariantViolation` for a disallowed move,
    /// including a move to the current status.
    pub fn transition_to(self, next: Self) -> Result<Self, DomainError> {
        if self.can_transition_to(next) {
            Ok(next)
        } else {
            Err(DomainError::InvariantViolation(format!(
                "cannot change status from {self} to {next}"
            )))
        }
    }
}

impl FromStr for UserStatus {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "active" => Ok(Self::Active),
            "inactive" => Ok(Self::Inactive),
            "suspended" => Ok(Self::Suspended),
            "deleted" => Ok(Self::Deleted),
            other => Err(DomainError::Validation(format!("unknown status: {other}"))),
        }
    }
}

impl fmt::Display for UserStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
