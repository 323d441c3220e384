#![doc = "Google Drive v3 client: the concrete `RemoteStorage` used by the CLI."]
//
//! # Drive client
//!
//! [`GoogleDriveClient`] talks to the Drive v3 REST API with `reqwest`:
//!
//! - folders are created with `POST files` and looked up with `GET files/{id}`
//! - files are uploaded with a single `multipart/related` request
//! - sharing adds an `anyone`/`reader` permission and reads back `webViewLink`
//!
//! Credentials come from an authorized-user `token.json`
//! (see [`AuthorizedUser`]). When refresh material is present a fresh access
//! token is obtained once, at construction. Each trait method is exactly one
//! HTTP exchange (two for sharing) with no retry.

use async_trait::async_trait;
use notebookify_core::contract::{
    FolderMetadata, NewFile, NewFolder, RemoteFile, RemoteStorage, FOLDER_MIME_TYPE,
};
use notebookify_core::error::{AuthError, RemoteError};
use reqwest::{Response, StatusCode};
use serde::Deserialize;
use serde_json::json;
use std::fs;
use std::io::ErrorKind;
use std::path::Path;

pub const DRIVE_API_BASE: &str = "https://www.googleapis.com/drive/v3";
pub const DRIVE_UPLOAD_BASE: &str = "https://www.googleapis.com/upload/drive/v3";
pub const DEFAULT_TOKEN_URI: &str = "https://oauth2.googleapis.com/token";

/// Contents of an authorized-user credential file.
#[derive(Debug, Clone, Deserialize)]
pub struct AuthorizedUser {
    #[serde(default)]
    pub token: Option<String>,
    #[serde(default)]
    pub refresh_token: Option<String>,
    #[serde(default)]
    pub client_id: Option<String>,
    #[serde(default)]
    pub client_secret: Option<String>,
    #[serde(default)]
    pub token_uri: Option<String>,
}

impl AuthorizedUser {
    fn refresh_material(&self) -> Option<(&str, &str, &str)> {
        match (&self.refresh_token, &self.client_id, &self.client_secret) {
            (Some(r), Some(id), Some(secret)) => Some((r.as_str(), id.as_str(), secret.as_str())),
            _ => None,
        }
    }
}

/// Read and sanity-check a credential file.
pub fn read_credentials(path: &Path) -> Result<AuthorizedUser, AuthError> {
    let raw = fs::read_to_string(path).map_err(|e| {
        if e.kind() == ErrorKind::NotFound {
            AuthError::MissingCredentials {
                path: path.to_path_buf(),
            }
        } else {
            AuthError::InvalidCredentials {
                path: path.to_path_buf(),
                reason: e.to_string(),
            }
        }
    })?;
    let creds: AuthorizedUser =
        serde_json::from_str(&raw).map_err(|e| AuthError::InvalidCredentials {
            path: path.to_path_buf(),
            reason: e.to_string(),
        })?;
    if creds.token.is_none() && creds.refresh_material().is_none() {
        return Err(AuthError::InvalidCredentials {
            path: path.to_path_buf(),
            reason: "neither an access token nor refresh credentials are present".to_string(),
        });
    }
    Ok(creds)
}

#[derive(Debug, Deserialize)]
struct TokenResponse {
    access_token: String,
}

#[derive(Debug, Deserialize)]
struct IdOnly {
    id: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct DriveFile {
    id: String,
    #[serde(default)]
    name: String,
    #[serde(default)]
    mime_type: String,
    #[serde(default)]
    trashed: bool,
    #[serde(default)]
    web_view_link: Option<String>,
}

pub struct GoogleDriveClient {
    http: reqwest::Client,
    access_token: String,
    api_base: String,
    upload_base: String,
}

impl GoogleDriveClient {
    /// Build a client from a credential file, refreshing the access token when
    /// the file carries refresh material.
    pub async fn from_token_file(path: &Path) -> Result<Self, AuthError> {
        let creds = read_credentials(path)?;
        let http = reqwest::Client::new();
        let access_token = match creds.refresh_material() {
            Some((refresh_token, client_id, client_secret)) => {
                let token_uri = creds.token_uri.as_deref().unwrap_or(DEFAULT_TOKEN_URI);
                refresh_access_token(&http, token_uri, refresh_token, client_id, client_secret)
                    .await?
            }
            None => creds.token.clone().unwrap_or_default(),
        };
        tracing::info!(
            token_path = %path.display(),
            refreshed = creds.refresh_material().is_some(),
            "[DRIVE] Initialized Drive client from credential file"
        );
        Ok(Self::with_access_token(http, access_token))
    }

    pub fn with_access_token(http: reqwest::Client, access_token: String) -> Self {
        Self {
            http,
            access_token,
            api_base: DRIVE_API_BASE.to_string(),
            upload_base: DRIVE_UPLOAD_BASE.to_string(),
        }
    }

    /// Send metadata and upload requests somewhere other than Google, such as
    /// a local stand-in server.
    pub fn with_base_urls(mut self, api_base: impl Into<String>, upload_base: impl Into<String>) -> Self {
        self.api_base = api_base.into();
        self.upload_base = upload_base.into();
        self
    }

    async fn get_file(&self, file_id: &str, fields: &str, operation: &'static str) -> Result<Option<DriveFile>, RemoteError> {
        let url = format!("{}/files/{}", self.api_base, file_id);
        let resp = self
            .http
            .get(&url)
            .bearer_auth(&self.access_token)
            .query(&[("fields", fields), ("supportsAllDrives", "true")])
            .send()
            .await
            .map_err(|e| request_error(operation, e))?;
        if resp.status() == StatusCode::NOT_FOUND {
            return Ok(None);
        }
        let resp = check_status(resp, operation).await?;
        let file = resp
            .json::<DriveFile>()
            .await
            .map_err(|e| response_error(operation, e))?;
        Ok(Some(file))
    }
}

async fn refresh_access_token(
    http: &reqwest::Client,
    token_uri: &str,
    refresh_token: &str,
    client_id: &str,
    client_secret: &str,
) -> Result<String, AuthError> {
    let resp = http
        .post(token_uri)
        .form(&[
            ("grant_type", "refresh_token"),
            ("refresh_token", refresh_token),
            ("client_id", client_id),
            ("client_secret", client_secret),
        ])
        .send()
        .await
        .map_err(|e| AuthError::Refresh(e.to_string()))?;
    let status = resp.status();
    if !status.is_success() {
        let body = resp.text().await.unwrap_or_default();
        tracing::error!(status = status.as_u16(), body = %body, "[DRIVE] Token refresh rejected");
        return Err(AuthError::Refresh(format!("HTTP {}: {}", status.as_u16(), body)));
    }
    let token = resp
        .json::<TokenResponse>()
        .await
        .map_err(|e| AuthError::Refresh(e.to_string()))?;
    tracing::debug!("[DRIVE] Access token refreshed");
    Ok(token.access_token)
}

fn request_error(operation: &'static str, e: reqwest::Error) -> RemoteError {
    tracing::error!(operation, error = %e, "[DRIVE] Request failed");
    RemoteError::Request {
        operation,
        message: e.to_string(),
    }
}

fn response_error(operation: &'static str, e: reqwest::Error) -> RemoteError {
    tracing::error!(operation, error = %e, "[DRIVE] Unexpected response body");
    RemoteError::Response {
        operation,
        message: e.to_string(),
    }
}

async fn check_status(resp: Response, operation: &'static str) -> Result<Response, RemoteError> {
    let status = resp.status();
    if status.is_success() {
        return Ok(resp);
    }
    let body = resp.text().await.unwrap_or_default();
    tracing::error!(operation, status = status.as_u16(), body = %body, "[DRIVE] API error");
    Err(RemoteError::Status {
        operation,
        status: status.as_u16(),
        body,
    })
}

/// Body of a Drive `multipart/related` upload: JSON metadata part, then the
/// raw content part.
pub fn multipart_body(metadata: &serde_json::Value, content: &[u8], mime_type: &str, boundary: &str) -> Vec<u8> {
    let mut body = Vec::with_capacity(content.len() + 256);
    body.extend_from_slice(format!("--{boundary}\r\n").as_bytes());
    body.extend_from_slice(b"Content-Type: application/json; charset=UTF-8\r\n\r\n");
    body.extend_from_slice(metadata.to_string().as_bytes());
    body.extend_from_slice(format!("\r\n--{boundary}\r\n").as_bytes());
    body.extend_from_slice(format!("Content-Type: {mime_type}\r\n\r\n").as_bytes());
    body.extend_from_slice(content);
    body.extend_from_slice(format!("\r\n--{boundary}--\r\n").as_bytes());
    body
}

fn parents(parent_id: &Option<String>) -> Vec<&str> {
    parent_id.as_deref().into_iter().collect()
}

#[async_trait]
impl RemoteStorage for GoogleDriveClient {
    async fn create_folder(&self, req: NewFolder) -> Result<String, RemoteError> {
        const OP: &str = "create_folder";
        tracing::info!(folder = %req.name, parent_id = ?req.parent_id, "[DRIVE] Creating folder");
        let mut body = json!({
            "name": req.name,
            "mimeType": FOLDER_MIME_TYPE,
        });
        if req.parent_id.is_some() {
            body["parents"] = json!(parents(&req.parent_id));
        }
        let resp = self
            .http
            .post(format!("{}/files", self.api_base))
            .bearer_auth(&self.access_token)
            .query(&[("fields", "id"), ("supportsAllDrives", "true")])
            .json(&body)
            .send()
            .await
            .map_err(|e| request_error(OP, e))?;
        let resp = check_status(resp, OP).await?;
        let created = resp
            .json::<IdOnly>()
            .await
            .map_err(|e| response_error(OP, e))?;
        tracing::info!(folder = %req.name, folder_id = %created.id, "[DRIVE] Folder created");
        Ok(created.id)
    }

    async fn get_folder(&self, folder_id: &str) -> Result<Option<FolderMetadata>, RemoteError> {
        let file = self
            .get_file(folder_id, "id,name,mimeType,trashed", "get_folder")
            .await?;
        Ok(file.and_then(|f| {
            if f.mime_type != FOLDER_MIME_TYPE {
                tracing::warn!(folder_id, mime_type = %f.mime_type, "[DRIVE] ID does not name a folder");
                return None;
            }
            Some(FolderMetadata {
                id: f.id,
                name: f.name,
                trashed: f.trashed,
            })
        }))
    }

    async fn create_file(&self, req: NewFile) -> Result<RemoteFile, RemoteError> {
        const OP: &str = "create_file";
        tracing::info!(
            file = %req.name,
            parent_id = ?req.parent_id,
            bytes = req.content.len(),
            "[DRIVE] Uploading file"
        );
        let mut metadata = json!({ "name": req.name });
        if req.parent_id.is_some() {
            metadata["parents"] = json!(parents(&req.parent_id));
        }
        let boundary = format!("notebookify-{}", uuid::Uuid::new_v4());
        let body = multipart_body(&metadata, &req.content, &req.mime_type, &boundary);

        let resp = self
            .http
            .post(format!("{}/files", self.upload_base))
            .bearer_auth(&self.access_token)
            .query(&[
                ("uploadType", "multipart"),
                ("fields", "id,name,webViewLink"),
                ("supportsAllDrives", "true"),
            ])
            .header(
                reqwest::header::CONTENT_TYPE,
                format!("multipart/related; boundary={boundary}"),
            )
            .body(body)
            .send()
            .await
            .map_err(|e| request_error(OP, e))?;
        let resp = check_status(resp, OP).await?;
        let file = resp
            .json::<DriveFile>()
            .await
            .map_err(|e| response_error(OP, e))?;
        tracing::info!(file_id = %file.id, "[DRIVE] File uploaded");
        Ok(RemoteFile {
            id: file.id,
            name: file.name,
            web_link: file.web_view_link,
        })
    }

    async fn share_with_link(&self, file_id: &str) -> Result<String, RemoteError> {
        const OP: &str = "share_with_link";
        let resp = self
            .http
            .post(format!("{}/files/{}/permissions", self.api_base, file_id))
            .bearer_auth(&self.access_token)
            .query(&[("supportsAllDrives", "true")])
            .json(&json!({ "role": "reader", "type": "anyone" }))
            .send()
            .await
            .map_err(|e| request_error(OP, e))?;
        check_status(resp, OP).await?;

        let file = self
            .get_file(file_id, "id,webViewLink", OP)
            .await?
            .ok_or_else(|| RemoteError::Response {
                operation: OP,
                message: format!("file {file_id} disappeared after sharing"),
            })?;
        file.web_view_link.ok_or_else(|| RemoteError::Response {
            operation: OP,
            message: "response carried no webViewLink".to_string(),
        })
    }
}
