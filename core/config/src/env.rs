//! Environment validation.
//!
//! The ten provider variables are read exactly once, through an
//! [`EnvSource`], into an [`EnvironmentSecrets`] value. Adapters never read
//! the process environment themselves.

use std::collections::HashMap;
use std::fmt;
use std::path::Path;

use tracing::{debug, warn};

use upup_common::{Error, Result, Secret};

/// Object-storage secret access key.
pub const SPACE_SECRET: &str = "SPACE_SECRET";
/// Object-storage access key id.
pub const SPACE_KEY: &str = "SPACE_KEY";
/// Object-storage endpoint URL.
pub const SPACE_ENDPOINT: &str = "SPACE_ENDPOINT";
/// Object-storage region.
pub const SPACE_REGION: &str = "SPACE_REGION";
/// Bucket receiving document uploads.
pub const SPACE_DOCUMENTS: &str = "SPACE_DOCUMENTS";
/// Bucket receiving image uploads.
pub const SPACE_IMAGES: &str = "SPACE_IMAGES";
/// OneDrive application (client) id.
pub const ONEDRIVE_CLIENT_ID: &str = "ONEDRIVE_CLIENT_ID";
/// Google OAuth client id used by the picker.
pub const GOOGLE_CLIENT_PICKER_ID: &str = "GOOGLE_CLIENT_PICKER_ID";
/// Google Cloud project number used by the picker.
pub const GOOGLE_APP_ID: &str = "GOOGLE_APP_ID";
/// Google browser API key.
pub const GOOGLE_API_KEY: &str = "GOOGLE_API_KEY";

/// Every required variable, in the order they are checked and reported.
pub const REQUIRED_VARS: [&str; 10] = [
    SPACE_SECRET,
    SPACE_KEY,
    SPACE_ENDPOINT,
    SPACE_REGION,
    SPACE_DOCUMENTS,
    SPACE_IMAGES,
    ONEDRIVE_CLIENT_ID,
    GOOGLE_CLIENT_PICKER_ID,
    GOOGLE_APP_ID,
    GOOGLE_API_KEY,
];

/// Read-only source of named configuration values.
pub trait EnvSource {
    /// Look up a value by variable name.
    fn get(&self, name: &str) -> Option<String>;
}

/// The process environment.
#[derive(Debug, Clone, Copy, Default)]
pub struct ProcessEnv;

impl EnvSource for ProcessEnv {
    fn get(&self, name: &str) -> Option<String> {
        std::env::var(name).ok()
    }
}

/// An explicit set of variables, e.g. loaded from a `.env` file.
#[derive(Debug, Clone, Default)]
pub struct MapEnv {
    vars: HashMap<String, String>,
}

impl MapEnv {
    /// Create an empty source.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set a variable, replacing any previous value.
    pub fn set(&mut self, name: impl Into<String>, value: impl Into<String>) -> &mut Self {
        self.vars.insert(name.into(), value.into());
        self
    }

    /// Remove a variable.
    pub fn remove(&mut self, name: &str) -> Option<String> {
        self.vars.remove(name)
    }

    /// Parse dotenv-style `KEY=VALUE` text.
    ///
    /// Comments, `export ` prefixes, quoting, escapes and multi-line
    /// values follow dotenv rules.
    ///
    /// # Errors
    /// - `Error::InvalidInput` for a malformed line
    pub fn parse(text: &str) -> Result<Self> {
        Self::collect(dotenvy::from_read_iter(text.as_bytes()))
    }

    /// Load and parse a dotenv file.
    ///
    /// # Errors
    /// - `Error::Io` if the file cannot be read
    /// - `Error::InvalidInput` for a malformed line
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        debug!("Loading environment from {}", path.display());
        let iter = dotenvy::from_path_iter(path).map_err(dotenv_error)?;
        Self::collect(iter)
    }

    fn collect<I>(iter: I) -> Result<Self>
    where
        I: Iterator<Item = dotenvy::Result<(String, String)>>,
    {
        let mut env = Self::new();
        for item in iter {
            let (key, value) = item.map_err(dotenv_error)?;
            env.set(key, value);
        }
        Ok(env)
    }

    /// Number of variables held.
    pub fn len(&self) -> usize {
        self.vars.len()
    }

    /// Check if no variables are held.
    pub fn is_empty(&self) -> bool {
        self.vars.is_empty()
    }
}

impl EnvSource for MapEnv {
    fn get(&self, name: &str) -> Option<String> {
        self.vars.get(name).cloned()
    }
}

impl<K: Into<String>, V: Into<String>> FromIterator<(K, V)> for MapEnv {
    fn from_iter<T: IntoIterator<Item = (K, V)>>(iter: T) -> Self {
        Self {
            vars: iter
                .into_iter()
                .map(|(k, v)| (k.into(), v.into()))
                .collect(),
        }
    }
}

fn dotenv_error(e: dotenvy::Error) -> Error {
    match e {
        dotenvy::Error::Io(e) => Error::Io(e),
        other => Error::InvalidInput(format!("Invalid dotenv input: {}", other)),
    }
}

/// The validated provider secrets and identifiers.
///
/// Every field is guaranteed non-empty.
#[derive(Clone)]
pub struct EnvironmentSecrets {
    pub(crate) space_secret: Secret,
    pub(crate) space_key: Secret,
    pub(crate) space_endpoint: String,
    pub(crate) space_region: String,
    pub(crate) document_space: String,
    pub(crate) image_space: String,
    pub(crate) onedrive_client_id: String,
    pub(crate) google_client_id: String,
    pub(crate) google_app_id: String,
    pub(crate) google_api_key: Secret,
}

impl EnvironmentSecrets {
    /// Read and validate all required variables.
    ///
    /// Whitespace-only values count as missing.
    ///
    /// # Errors
    /// - `Error::Configuration` naming every missing variable; no partial
    ///   result is returned
    pub fn from_env(source: &dyn EnvSource) -> Result<Self> {
        let mut values = HashMap::with_capacity(REQUIRED_VARS.len());
        let mut missing = Vec::new();

        for name in REQUIRED_VARS {
            match source.get(name) {
                Some(value) if !value.trim().is_empty() => {
                    values.insert(name, value);
                }
                _ => missing.push(name),
            }
        }

        if !missing.is_empty() {
            warn!("Missing environment variables: {}", missing.join(", "));
            return Err(Error::missing_env(missing));
        }

        let mut take = |name: &str| {
            values
                .remove(name)
                .ok_or_else(|| Error::missing_env([name]))
        };

        Ok(Self {
            space_secret: Secret::new(take(SPACE_SECRET)?),
            space_key: Secret::new(take(SPACE_KEY)?),
            space_endpoint: take(SPACE_ENDPOINT)?,
            space_region: take(SPACE_REGION)?,
            document_space: take(SPACE_DOCUMENTS)?,
            image_space: take(SPACE_IMAGES)?,
            onedrive_client_id: take(ONEDRIVE_CLIENT_ID)?,
            google_client_id: take(GOOGLE_CLIENT_PICKER_ID)?,
            google_app_id: take(GOOGLE_APP_ID)?,
            google_api_key: Secret::new(take(GOOGLE_API_KEY)?),
        })
    }

    /// Object-storage endpoint.
    pub fn space_endpoint(&self) -> &str {
        &self.space_endpoint
    }

    /// Object-storage region.
    pub fn space_region(&self) -> &str {
        &self.space_region
    }

    /// Document destination bucket.
    pub fn document_space(&self) -> &str {
        &self.document_space
    }

    /// Image destination bucket.
    pub fn image_space(&self) -> &str {
        &self.image_space
    }

    /// OneDrive client id.
    pub fn onedrive_client_id(&self) -> &str {
        &self.onedrive_client_id
    }

    /// Google picker client id.
    pub fn google_client_id(&self) -> &str {
        &self.google_client_id
    }

    /// Google app id.
    pub fn google_app_id(&self) -> &str {
        &self.google_app_id
    }
}

impl fmt::Debug for EnvironmentSecrets {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EnvironmentSecrets")
            .field("space_endpoint", &self.space_endpoint)
            .field("space_region", &self.space_region)
            .field("document_space", &self.document_space)
            .field("image_space", &self.image_space)
            .field("onedrive_client_id", &self.onedrive_client_id)
            .field("google_client_id", &self.google_client_id)
            .field("google_app_id", &self.google_app_id)
            .finish_non_exhaustive()
    }
}
