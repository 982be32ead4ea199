//! Thin client for the workspace REST API (`/api/2.0/...`).
//!
//! Every operation issues one bearer-authenticated JSON request and returns
//! an explicit `Result`; whether a failure is fatal is the caller's call,
//! not the client's. The [`WorkspaceApi`] trait is the seam the orchestrator
//! drives, so tests can substitute an in-memory workspace.

use std::time::Duration;

use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine as _;
use reqwest::blocking::{Client, Response};
use reqwest::Method;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::acl::{self, PermissionMap};
use crate::config::WorkspaceConfig;

/// Permission level granted alongside a cluster id.
pub const CLUSTER_ATTACH_LEVEL: &str = "CAN_ATTACH_TO";

/// Default import language when none is specified.
pub const DEFAULT_LANGUAGE: &str = "PYTHON";

/// Errors from a single API operation.
#[derive(Error, Debug)]
pub enum ApiError {
    #[error("failed to build HTTP client: {0}")]
    ClientBuild(#[source] reqwest::Error),

    #[error("request for {path} to {workspace} failed: {source}")]
    Transport {
        workspace: String,
        path: String,
        #[source]
        source: reqwest::Error,
    },

    #[error("{workspace} returned HTTP {status} for {path}")]
    Status {
        workspace: String,
        path: String,
        status: u16,
    },

    #[error("export of {path} returned no content")]
    MissingContent { path: String },

    #[error("export of {path} is not valid base64: {source}")]
    Base64 {
        path: String,
        #[source]
        source: base64::DecodeError,
    },

    #[error("export of {path} is not valid UTF-8")]
    Utf8 { path: String },

    #[error("unsupported object type {object_type:?} for {path}")]
    UnsupportedObject {
        path: String,
        object_type: ObjectType,
    },
}

/// Workspace filesystem object kinds, as reported by the platform.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ObjectType {
    Notebook,
    Directory,
    Library,
    File,
    Repo,
    #[serde(other)]
    Other,
}

impl ObjectType {
    /// The permissions sub-resource for this kind, if it has one.
    /// Exhaustive on purpose: a new kind is a visible gap here, not a
    /// silent runtime branch.
    pub fn permissions_segment(self) -> Option<&'static str> {
        match self {
            ObjectType::Notebook => Some("notebooks"),
            ObjectType::Directory => Some("directories"),
            ObjectType::Library | ObjectType::File | ObjectType::Repo | ObjectType::Other => None,
        }
    }
}

/// One entry of a `workspace/list` response.
#[derive(Debug, Clone, Deserialize)]
pub struct ObjectInfo {
    pub path: String,
    pub object_type: ObjectType,
}

/// `workspace/get-status` response; used to route to the permissions
/// sub-resource.
#[derive(Debug, Clone, Deserialize)]
pub struct ObjectStatus {
    pub object_id: u64,
    pub object_type: ObjectType,
}

#[derive(Debug, Default, Deserialize)]
struct ListResponse {
    #[serde(default)]
    objects: Vec<ObjectInfo>,
}

#[derive(Debug, Deserialize)]
struct ExportResponse {
    content: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
struct AclResponse {
    #[serde(default)]
    access_control_list: Vec<acl::AclEntry>,
}

#[derive(Debug, Serialize)]
struct ImportRequest<'a> {
    path: &'a str,
    format: &'a str,
    language: &'a str,
    content: String,
    overwrite: bool,
}

#[derive(Debug, Serialize)]
struct GrantEntry<'a> {
    user_name: &'a str,
    permission_level: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    cluster_id: Option<&'a str>,
}

#[derive(Debug, Serialize)]
struct GrantRequest<'a> {
    access_control_list: Vec<GrantEntry<'a>>,
}

/// The operations the orchestrator needs from one workspace.
pub trait WorkspaceApi {
    /// Human-readable name used in logs (e.g. the provider key).
    fn label(&self) -> &str;

    /// Objects directly under `path` (no recursion).
    fn list(&self, path: &str) -> Result<Vec<ObjectInfo>, ApiError>;

    /// SOURCE-format notebook text at `path`.
    fn export(&self, path: &str) -> Result<String, ApiError>;

    /// Write notebook text to `path`, overwriting any existing object.
    fn import(&self, path: &str, content: &str, language: &str) -> Result<(), ApiError>;

    fn object_status(&self, path: &str) -> Result<ObjectStatus, ApiError>;

    /// Flattened principal → level map for the object at `path`.
    fn permissions(&self, path: &str) -> Result<PermissionMap, ApiError>;

    /// Grant `level` to `principal` on `path`, plus a cluster-attach grant
    /// when `cluster_id` is given.
    fn grant(
        &self,
        path: &str,
        principal: &str,
        level: &str,
        cluster_id: Option<&str>,
    ) -> Result<(), ApiError>;
}

/// HTTP method for permission grants. Managed (public-domain) deployments
/// accept PATCH; other flavors only accept PUT. Compatibility rule carried
/// over verbatim from the platform's deployment quirks.
pub fn grant_method(workspace_url: &str) -> Method {
    if workspace_url.contains("databricks.com") {
        Method::PATCH
    } else {
        Method::PUT
    }
}

/// REST implementation of [`WorkspaceApi`] over one workspace deployment.
pub struct RestWorkspaceClient {
    label: String,
    base_url: String,
    token: String,
    http: Client,
}

impl RestWorkspaceClient {
    pub fn new(label: impl Into<String>, config: &WorkspaceConfig) -> Result<Self, ApiError> {
        let http = Client::builder()
            .connect_timeout(Duration::from_secs(30))
            .build()
            .map_err(ApiError::ClientBuild)?;
        Ok(Self {
            label: label.into(),
            base_url: config.url.trim_end_matches('/').to_string(),
            token: config.token.clone(),
            http,
        })
    }

    fn endpoint(&self, resource: &str) -> String {
        format!("{}/api/2.0/{}", self.base_url, resource)
    }

    fn transport(&self, path: &str, source: reqwest::Error) -> ApiError {
        ApiError::Transport {
            workspace: self.label.clone(),
            path: path.to_string(),
            source,
        }
    }

    /// Fail on any non-2xx status, keeping workspace + path context.
    fn check(&self, path: &str, response: Response) -> Result<Response, ApiError> {
        let status = response.status();
        if status.is_success() {
            Ok(response)
        } else {
            Err(ApiError::Status {
                workspace: self.label.clone(),
                path: path.to_string(),
                status: status.as_u16(),
            })
        }
    }

    fn get_json<T: DeserializeOwned>(
        &self,
        resource: &str,
        query: &[(&str, &str)],
        path: &str,
    ) -> Result<T, ApiError> {
        let url = self.endpoint(resource);
        tracing::debug!(workspace = %self.label, %url, %path, "GET");
        let response = self
            .http
            .get(&url)
            .bearer_auth(&self.token)
            .query(query)
            .send()
            .map_err(|e| self.transport(path, e))?;
        self.check(path, response)?
            .json()
            .map_err(|e| self.transport(path, e))
    }

    fn permissions_resource(&self, path: &str) -> Result<String, ApiError> {
        let status = self.object_status(path)?;
        let segment =
            status
                .object_type
                .permissions_segment()
                .ok_or_else(|| ApiError::UnsupportedObject {
                    path: path.to_string(),
                    object_type: status.object_type,
                })?;
        Ok(format!("permissions/{}/{}", segment, status.object_id))
    }
}

impl WorkspaceApi for RestWorkspaceClient {
    fn label(&self) -> &str {
        &self.label
    }

    fn list(&self, path: &str) -> Result<Vec<ObjectInfo>, ApiError> {
        let response: ListResponse = self.get_json("workspace/list", &[("path", path)], path)?;
        Ok(response.objects)
    }

    fn export(&self, path: &str) -> Result<String, ApiError> {
        let response: ExportResponse = self.get_json(
            "workspace/export",
            &[("path", path), ("format", "SOURCE")],
            path,
        )?;
        let encoded = response.content.ok_or_else(|| ApiError::MissingContent {
            path: path.to_string(),
        })?;
        let bytes = BASE64
            .decode(encoded.as_bytes())
            .map_err(|source| ApiError::Base64 {
                path: path.to_string(),
                source,
            })?;
        String::from_utf8(bytes).map_err(|_| ApiError::Utf8 {
            path: path.to_string(),
        })
    }

    fn import(&self, path: &str, content: &str, language: &str) -> Result<(), ApiError> {
        let url = self.endpoint("workspace/import");
        let body = ImportRequest {
            path,
            format: "SOURCE",
            language,
            content: BASE64.encode(content.as_bytes()),
            overwrite: true,
        };
        tracing::debug!(workspace = %self.label, %url, %path, "POST import");
        let response = self
            .http
            .post(&url)
            .bearer_auth(&self.token)
            .json(&body)
            .send()
            .map_err(|e| self.transport(path, e))?;
        self.check(path, response)?;
        Ok(())
    }

    fn object_status(&self, path: &str) -> Result<ObjectStatus, ApiError> {
        self.get_json("workspace/get-status", &[("path", path)], path)
    }

    fn permissions(&self, path: &str) -> Result<PermissionMap, ApiError> {
        let resource = self.permissions_resource(path)?;
        let response: AclResponse = self.get_json(&resource, &[], path)?;
        Ok(acl::flatten(&response.access_control_list))
    }

    fn grant(
        &self,
        path: &str,
        principal: &str,
        level: &str,
        cluster_id: Option<&str>,
    ) -> Result<(), ApiError> {
        let resource = self.permissions_resource(path)?;
        let url = self.endpoint(&resource);
        let method = grant_method(&self.base_url);

        let mut entries = vec![GrantEntry {
            user_name: principal,
            permission_level: level,
            cluster_id: None,
        }];
        if let Some(cluster) = cluster_id {
            entries.push(GrantEntry {
                user_name: principal,
                permission_level: CLUSTER_ATTACH_LEVEL,
                cluster_id: Some(cluster),
            });
        }
        let body = GrantRequest {
            access_control_list: entries,
        };

        tracing::debug!(workspace = %self.label, %url, %path, method = %method, "grant");
        let response = self
            .http
            .request(method, &url)
            .bearer_auth(&self.token)
            .json(&body)
            .send()
            .map_err(|e| self.transport(path, e))?;
        self.check(path, response)?;
        Ok(())
    }
}
