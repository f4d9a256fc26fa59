//! Backup server client.
//!
//! Every operation addresses the backup by the hex BackupID under
//! `{server}/backups/`; the policy probe hits `{server}/config`. Non-2xx
//! responses become `SafeError::Server` carrying the status and a body
//! excerpt; connection and timeout failures become `SafeError::Transport`.

use std::time::Duration;

use reqwest::{RequestBuilder, Response};
use tracing::debug;
use url::Url;

use msgsafe_core::{server, SafeError, SafeResult};

use crate::auth::Auth;

const DEFAULT_TIMEOUT: Duration = Duration::from_secs(90);

/// Cap on how much of an error body ends up in the error message.
const ERROR_BODY_EXCERPT: usize = 256;

pub struct SafeApiClient {
    http: reqwest::Client,
}

impl SafeApiClient {
    pub fn new() -> SafeResult<Self> {
        Self::with_timeout(DEFAULT_TIMEOUT)
    }

    pub fn with_timeout(timeout: Duration) -> SafeResult<Self> {
        let http = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| SafeError::Transport(e.to_string()))?;
        Ok(SafeApiClient { http })
    }

    /// Probe the server: GET `{server}/config`.
    ///
    /// Succeeds only on a 2xx with a non-empty body; returns the raw body
    /// for the caller to parse as a policy document.
    pub async fn test_server(&self, server: &Url, auth: &Auth) -> SafeResult<Vec<u8>> {
        let url = server::config_url(server)?;
        debug!(%url, "probing backup server");
        let response = self.send(self.http.get(url), auth).await?;
        let body = body_bytes(response).await?;
        if body.is_empty() {
            return Err(SafeError::InvalidData("empty server config response".into()));
        }
        Ok(body)
    }

    /// PUT the encrypted blob to `{server}/backups/{hex id}`.
    pub async fn upload(
        &self,
        server: &Url,
        backup_id: &[u8],
        auth: &Auth,
        blob: Vec<u8>,
    ) -> SafeResult<()> {
        let url = server::backup_url(server, backup_id)?;
        debug!(%url, size = blob.len(), "uploading backup");
        let request = self
            .http
            .put(url)
            .header(reqwest::header::CONTENT_TYPE, "application/octet-stream")
            .body(blob);
        self.send(request, auth).await?;
        Ok(())
    }

    /// GET the encrypted blob.
    pub async fn download(
        &self,
        server: &Url,
        backup_id: &[u8],
        auth: &Auth,
    ) -> SafeResult<Vec<u8>> {
        let url = server::backup_url(server, backup_id)?;
        debug!(%url, "downloading backup");
        let response = self.send(self.http.get(url), auth).await?;
        let body = body_bytes(response).await?;
        if body.is_empty() {
            return Err(SafeError::InvalidData("empty backup blob".into()));
        }
        Ok(body)
    }

    /// DELETE the blob. Missing backups are the server's business; a 404
    /// surfaces as a `Server` error for the caller to downgrade.
    pub async fn delete(&self, server: &Url, backup_id: &[u8], auth: &Auth) -> SafeResult<()> {
        let url = server::backup_url(server, backup_id)?;
        debug!(%url, "deleting backup");
        self.send(self.http.delete(url), auth).await?;
        Ok(())
    }

    async fn send(&self, request: RequestBuilder, auth: &Auth) -> SafeResult<Response> {
        let request = match auth {
            Auth::Basic { user, password } => request.basic_auth(user, Some(password)),
            Auth::Bearer(token) => request.bearer_auth(token),
            Auth::None => request,
        };
        let response = request
            .send()
            .await
            .map_err(|e| SafeError::Transport(e.to_string()))?;
        check_status(response).await
    }
}

async fn check_status(response: Response) -> SafeResult<Response> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }
    let message = match response.text().await {
        Ok(body) if !body.is_empty() => {
            let mut excerpt = body;
            excerpt.truncate(ERROR_BODY_EXCERPT);
            excerpt
        }
        _ => status
            .canonical_reason()
            .unwrap_or("request failed")
            .to_string(),
    };
    Err(SafeError::Server {
        status: status.as_u16(),
        message,
    })
}

async fn body_bytes(response: Response) -> SafeResult<Vec<u8>> {
    Ok(response
        .bytes()
        .await
        .map_err(|e| SafeError::Transport(e.to_string()))?
        .to_vec())
}
