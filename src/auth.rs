use crate::error::ConfigError;
use crate::request::Method;
use lazy_static::lazy_static;
use regex::Regex;
use serde::Deserialize;
use serde_json::{Map, Value};
use std::collections::BTreeSet;
use std::fs;
use std::path::Path;

lazy_static! {
    static ref LOWERCASE: Regex = Regex::new(r"[a-z]").unwrap();
    static ref UPPERCASE: Regex = Regex::new(r"[A-Z]").unwrap();
    static ref DIGIT: Regex = Regex::new(r"[0-9]").unwrap();
    static ref SYMBOL: Regex = Regex::new(r"[\x20-\x2F\x3A-\x40\x5B-\x60\x7B-\x7E]").unwrap();
}

const MIN_KEY_LENGTH: usize = 8;

/// Key of the per-sheet map entry used when no sheet name matches.
pub const FALLBACK_SHEET: &str = "ALL";

const WILDCARD: &str = "*";

/// A caller credential as configured for a user
///
/// Either a plain key, which must satisfy the strength policy, or an unsafe
/// key written as `{"__unsafe": "..."}` that is always accepted. Unsafe keys
/// are meant for prototyping only.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(untagged)]
pub enum Credential {
    Plain(String),
    Unsafe {
        #[serde(rename = "__unsafe")]
        key: String,
    },
}

impl Credential {
    pub fn unsafe_key(key: &str) -> Self {
        Credential::Unsafe {
            key: key.to_string(),
        }
    }

    /// True when `key` is the configured credential
    pub fn matches(&self, key: &str) -> bool {
        match self {
            Credential::Plain(k) => k == key,
            Credential::Unsafe { key: k } => k == key,
        }
    }

    pub fn is_unsafe(&self) -> bool {
        matches!(self, Credential::Unsafe { .. })
    }
}

/// The methods a grant allows on one sheet (or on every sheet)
#[derive(Debug, Clone, PartialEq)]
pub enum MethodGrant {
    All,
    Methods(BTreeSet<Method>),
}

impl MethodGrant {
    /// Check whether the grant covers `method`
    ///
    /// `method` is the raw upper-cased name from the request. Names that are
    /// not known methods are only covered by the wildcard.
    pub fn allows(&self, method: &str) -> bool {
        match self {
            MethodGrant::All => true,
            MethodGrant::Methods(methods) => method
                .parse::<Method>()
                .map(|m| methods.contains(&m))
                .unwrap_or(false),
        }
    }

    fn from_names<'a>(names: impl IntoIterator<Item = &'a str>) -> Result<Self, ConfigError> {
        let mut methods = BTreeSet::new();
        for name in names {
            if name.trim() == WILDCARD {
                return Ok(MethodGrant::All);
            }
            let method = name
                .parse::<Method>()
                .map_err(|e| ConfigError::UnknownMethod(e.0))?;
            methods.insert(method);
        }
        Ok(MethodGrant::Methods(methods))
    }

    fn from_value(value: &Value) -> Result<Self, ConfigError> {
        match value {
            Value::String(name) => MethodGrant::from_names([name.as_str()]),
            Value::Array(names) => {
                let names = names
                    .iter()
                    .map(|n| {
                        n.as_str()
                            .ok_or_else(|| ConfigError::InvalidGrant(n.to_string()))
                    })
                    .collect::<Result<Vec<_>, _>>()?;
                MethodGrant::from_names(names)
            }
            other => Err(ConfigError::InvalidGrant(other.to_string())),
        }
    }
}

/// What a user may do
///
/// * `All` - every method on every sheet
/// * `Methods` - the listed methods on every sheet
/// * `BySheet` - a grant per sheet name, matched case-insensitively in
///   configuration order, with an optional `ALL` entry for other sheets
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(try_from = "RawPermission")]
pub enum Permission {
    All,
    Methods(BTreeSet<Method>),
    BySheet(Vec<(String, MethodGrant)>),
}

impl Permission {
    /// Resolve the grant that applies to `sheet`
    ///
    /// # Returns
    /// * `Option<MethodGrant>` - The matching grant, the `ALL` fallback, or
    ///   `None` when the user has nothing for this sheet
    pub fn grant_for(&self, sheet: &str) -> Option<MethodGrant> {
        match self {
            Permission::All => Some(MethodGrant::All),
            Permission::Methods(methods) => Some(MethodGrant::Methods(methods.clone())),
            Permission::BySheet(entries) => {
                let sheet = sheet.to_lowercase();
                entries
                    .iter()
                    .find(|(name, _)| name.to_lowercase() == sheet)
                    .or_else(|| entries.iter().find(|(name, _)| name == FALLBACK_SHEET))
                    .map(|(_, grant)| grant.clone())
            }
        }
    }
}

#[derive(Deserialize)]
#[serde(untagged)]
enum RawPermission {
    One(String),
    Many(Vec<String>),
    BySheet(Map<String, Value>),
}

impl TryFrom<RawPermission> for Permission {
    type Error = ConfigError;

    fn try_from(raw: RawPermission) -> Result<Self, Self::Error> {
        let global = |grant: MethodGrant| match grant {
            MethodGrant::All => Permission::All,
            MethodGrant::Methods(methods) => Permission::Methods(methods),
        };

        match raw {
            RawPermission::One(name) => MethodGrant::from_names([name.as_str()]).map(global),
            RawPermission::Many(names) => {
                MethodGrant::from_names(names.iter().map(String::as_str)).map(global)
            }
            RawPermission::BySheet(map) => map
                .iter()
                .map(|(sheet, grant)| Ok((sheet.clone(), MethodGrant::from_value(grant)?)))
                .collect::<Result<Vec<_>, ConfigError>>()
                .map(Permission::BySheet),
        }
    }
}

/// User data structure representing a configured caller
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct User {
    /// Display name, used in logs only
    pub name: String,

    /// Credential the caller presents as `key`
    pub key: Credential,

    /// Sheets and methods the user may access
    pub permissions: Permission,
}

impl User {
    pub fn new(name: &str, key: Credential, permissions: Permission) -> Self {
        User {
            name: name.to_string(),
            key,
            permissions,
        }
    }
}

/// The immutable user table consulted for every request
#[derive(Debug, Clone, PartialEq)]
pub struct AuthConfig {
    users: Vec<User>,
}

impl Default for AuthConfig {
    /// A single anonymous user with an empty unsafe key and full access.
    fn default() -> Self {
        AuthConfig::new(vec![User::new(
            "anonymous",
            Credential::unsafe_key(""),
            Permission::All,
        )])
    }
}

impl AuthConfig {
    pub fn new(users: Vec<User>) -> Self {
        AuthConfig { users }
    }

    /// Load users from a JSON file
    ///
    /// The file holds either `{"users": [...]}` or a bare array of users.
    ///
    /// # Arguments
    /// * `path` - Path of the users file
    ///
    /// # Returns
    /// * `Result<AuthConfig, ConfigError>` - The user table or an error
    ///
    /// # Errors
    /// * Returns an error if the file cannot be read or parsed, or if a grant
    ///   names an unknown method
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let contents = fs::read_to_string(path)?;
        AuthConfig::from_json(&contents)
    }

    pub fn from_json(contents: &str) -> Result<Self, ConfigError> {
        let users = match serde_json::from_str::<Value>(contents)? {
            Value::Object(mut file) => match file.remove("users") {
                Some(users) => users,
                None => Value::Object(file),
            },
            bare => bare,
        };
        Ok(AuthConfig::new(serde_json::from_value(users)?))
    }

    pub fn users(&self) -> &[User] {
        &self.users
    }

    /// Names of users whose key bypasses the strength policy
    pub fn unsafe_users(&self) -> Vec<&str> {
        self.users
            .iter()
            .filter(|u| u.key.is_unsafe())
            .map(|u| u.name.as_str())
            .collect()
    }

    /// Find the first user whose credential matches `key`
    ///
    /// # Arguments
    /// * `key` - The key presented by the caller, "" for anonymous callers
    ///
    /// # Returns
    /// * `Option<&User>` - The matching user, if any
    pub fn resolve_user(&self, key: &str) -> Option<&User> {
        self.users.iter().find(|u| u.key.matches(key))
    }

    /// Check whether `key` is acceptable as a credential
    ///
    /// Unsafe keys always pass. Plain keys need at least 8 characters with a
    /// lower case letter, an upper case letter, a digit and a symbol.
    ///
    /// # Returns
    /// * `bool` - False when no user has this key
    pub fn is_strong_key(&self, key: &str) -> bool {
        match self.resolve_user(key) {
            None => false,
            Some(user) if user.key.is_unsafe() => true,
            Some(_) => is_strong_password(key),
        }
    }

    /// Check whether the holder of `key` may call `method` on `sheet`
    ///
    /// # Arguments
    /// * `key` - The key presented by the caller
    /// * `sheet` - Target sheet name, compared case-insensitively
    /// * `method` - Upper-cased method name from the request
    ///
    /// # Returns
    /// * `bool` - True if the user's grant for the sheet covers the method
    pub fn authorize(&self, key: &str, sheet: &str, method: &str) -> bool {
        self.resolve_user(key)
            .and_then(|user| user.permissions.grant_for(sheet))
            .is_some_and(|grant| grant.allows(method))
    }
}

/// The strength policy for plain keys.
pub fn is_strong_password(key: &str) -> bool {
    key.chars().count() >= MIN_KEY_LENGTH
        && LOWERCASE.is_match(key)
        && UPPERCASE.is_match(key)
        && DIGIT.is_match(key)
        && SYMBOL.is_match(key)
}
