//! Environment-derived configuration for the supported workspace providers.
//!
//! All environment lookups happen once, in [`Settings::from_env`]; the
//! resulting struct is immutable and passed down by parameter so no leaf
//! function reads ambient global state.
//!
//! Missing variables load as empty strings rather than failing: an
//! unconfigured workspace is valid here and fails later at the HTTP/auth
//! layer, which is the intended lenient failure mode.

use std::fmt;
use std::str::FromStr;

use thiserror::Error;

/// Errors from resolving user-supplied configuration inputs.
#[derive(Error, Debug, PartialEq, Eq)]
pub enum ConfigError {
    #[error("unknown cloud provider {0:?} (expected AWS, AZURE or GCP)")]
    UnknownProvider(String),
}

/// A supported cloud flavor of the workspace platform.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CloudProvider {
    Aws,
    Azure,
    Gcp,
}

impl FromStr for CloudProvider {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_uppercase().as_str() {
            "AWS" => Ok(Self::Aws),
            "AZURE" => Ok(Self::Azure),
            "GCP" => Ok(Self::Gcp),
            other => Err(ConfigError::UnknownProvider(other.to_string())),
        }
    }
}

impl fmt::Display for CloudProvider {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Aws => write!(f, "AWS"),
            Self::Azure => write!(f, "AZURE"),
            Self::Gcp => write!(f, "GCP"),
        }
    }
}

/// Base URL + bearer token for one workspace deployment.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct WorkspaceConfig {
    pub url: String,
    pub token: String,
}

impl WorkspaceConfig {
    pub fn new(url: impl Into<String>, token: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            token: token.into(),
        }
    }

    /// Whether both fields are present. Used only for a startup warning;
    /// an unconfigured workspace never aborts the run by itself.
    pub fn is_configured(&self) -> bool {
        !self.url.is_empty() && !self.token.is_empty()
    }
}

/// Immutable snapshot of every environment-provided setting.
#[derive(Debug, Clone, Default)]
pub struct Settings {
    pub aws: WorkspaceConfig,
    pub azure: WorkspaceConfig,
    pub gcp: WorkspaceConfig,
    /// Workspace directory whose notebooks are synced (also the local
    /// clone target for git seeding).
    pub notebook_dir: String,
    /// Reserved; read from the environment but not consumed by the flow.
    pub email_to_grant: String,
    /// Reserved; read from the environment but not consumed by the flow.
    pub user_to_sync: String,
}

impl Settings {
    /// Build settings from the process environment. Never fails: absent
    /// variables become empty strings.
    pub fn from_env() -> Self {
        let var = |name: &str| std::env::var(name).unwrap_or_default();
        let settings = Self {
            aws: WorkspaceConfig::new(var("AWS_WORKSPACE_URL"), var("AWS_ACCESS_TOKEN")),
            azure: WorkspaceConfig::new(var("AZURE_WORKSPACE_URL"), var("AZURE_ACCESS_TOKEN")),
            gcp: WorkspaceConfig::new(var("GCP_WORKSPACE_URL"), var("GCP_ACCESS_TOKEN")),
            notebook_dir: var("NOTEBOOK_DIR"),
            email_to_grant: var("EMAIL_TO_GRANT"),
            user_to_sync: var("USER_TO_SYNC"),
        };
        if !settings.email_to_grant.is_empty() || !settings.user_to_sync.is_empty() {
            tracing::debug!(
                email_to_grant = %settings.email_to_grant,
                user_to_sync = %settings.user_to_sync,
                "reserved settings present (not used by the sync flow)"
            );
        }
        settings
    }

    /// The workspace configuration for a provider.
    pub fn workspace(&self, provider: CloudProvider) -> &WorkspaceConfig {
        match provider {
            CloudProvider::Aws => &self.aws,
            CloudProvider::Azure => &self.azure,
            CloudProvider::Gcp => &self.gcp,
        }
    }
}
