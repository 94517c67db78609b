//! Typed client for the backend REST API.
//!
//! Mirrors the collaborator contract the chat core sits next to: auth, bot
//! management and dashboard analytics. Every authenticated call carries the
//! stored bearer token; an unauthorized/forbidden answer clears it.

use crate::{
    credentials::{TokenStore, TokenStoreError},
    models::{
        AuthResponse, Bot, BotList, Dashboard, LoginRequest, NewBot, RegisterRequest,
        UploadResponse,
    },
};
use reqwest::{
    Client, RequestBuilder, Response, StatusCode,
    header::CONTENT_TYPE,
    multipart::{Form, Part},
};
use secrecy::ExposeSecret;
use serde::de::DeserializeOwned;
use serde_json::Value;
use std::{path::PathBuf, sync::Arc};
use tracing::{error, info, instrument, warn};
use tutorbot_realtime::CredentialSource;

#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    /// The backend answered 401/403; the stored token has been cleared.
    #[error("Session expired. Please login again.")]
    AuthExpired,
    #[error("Resource not found (404)")]
    NotFound,
    #[error("{message}")]
    Status { status: StatusCode, message: String },
    /// The backend accepted the request but reported `success: false`.
    #[error("{0}")]
    Rejected(String),
    #[error("HTTP request failed: {0}")]
    Request(#[from] reqwest::Error),
    #[error("Unexpected response body: {0}")]
    Decode(#[from] serde_json::Error),
    #[error("Failed to read textbook {path}: {source}")]
    Textbook {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error(transparent)]
    TokenStore(#[from] TokenStoreError),
}

pub struct ApiClient {
    http: Client,
    base_url: String,
    tokens: Arc<TokenStore>,
}

impl ApiClient {
    /// Creates a client for `base_url` (scheme, host and optional path prefix).
    pub fn new(base_url: impl Into<String>, tokens: Arc<TokenStore>) -> Self {
        let base_url = base_url.into().trim_end_matches('/').to_string();
        Self {
            http: Client::new(),
            base_url,
            tokens,
        }
    }

    pub fn tokens(&self) -> &Arc<TokenStore> {
        &self.tokens
    }

    fn url(&self, endpoint: &str) -> String {
        format!("{}{}", self.base_url, endpoint)
    }

    /// Absolute URL of an illustration referenced by a bot turn.
    pub fn image_url(&self, reference: &str) -> String {
        if reference.starts_with("http://") || reference.starts_with("https://") {
            reference.to_string()
        } else if reference.starts_with('/') {
            self.url(reference)
        } else {
            format!("{}/{}", self.base_url, reference)
        }
    }

    fn authorized(&self, request: RequestBuilder) -> RequestBuilder {
        match self.tokens.bearer_token() {
            Some(token) => request.bearer_auth(token.expose_secret()),
            None => request,
        }
    }

    #[instrument(skip_all, fields(email = %payload.email))]
    pub async fn register(&self, payload: &RegisterRequest) -> Result<AuthResponse, ApiError> {
        let response = self
            .http
            .post(self.url("/register"))
            .json(payload)
            .send()
            .await?;
        self.finish_auth(response, "Registration failed").await
    }

    #[instrument(skip_all, fields(email = %payload.email))]
    pub async fn login(&self, payload: &LoginRequest) -> Result<AuthResponse, ApiError> {
        let response = self
            .http
            .post(self.url("/login"))
            .json(payload)
            .send()
            .await?;
        self.finish_auth(response, "Login failed").await
    }

    /// Auth endpoints report failures in the body and never expire a session.
    async fn finish_auth(
        &self,
        response: Response,
        fallback: &str,
    ) -> Result<AuthResponse, ApiError> {
        let status = response.status();
        let body: Value = response.json().await.unwrap_or(Value::Null);
        if !status.is_success() {
            let message = error_message(&body).unwrap_or_else(|| fallback.to_string());
            warn!(%status, %message, "Authentication rejected.");
            return Err(ApiError::Status { status, message });
        }

        let auth: AuthResponse = serde_json::from_value(body)?;
        match auth.access_token.as_deref().filter(|token| !token.is_empty()) {
            Some(token) => {
                self.tokens.save(token)?;
                info!("Authenticated; token stored.");
            }
            None => info!("Authenticated without an access token; nothing stored."),
        }
        Ok(auth)
    }

    pub fn logout(&self) -> Result<(), ApiError> {
        self.tokens.clear()?;
        Ok(())
    }

    pub async fn list_bots(&self) -> Result<Vec<Bot>, ApiError> {
        let list: BotList = self.get_json("/bots").await?;
        Ok(list.bots)
    }

    /// Creates a bot, uploading its textbook when one is given.
    #[instrument(skip_all, fields(name = %bot.name))]
    pub async fn create_bot(&self, bot: &NewBot) -> Result<UploadResponse, ApiError> {
        let mut form = Form::new()
            .text("name", bot.name.clone())
            .text("subject", bot.subject.clone())
            .text("grade", bot.grade.clone());
        if let Some(description) = &bot.description {
            form = form.text("description", description.clone());
        }
        if let Some(path) = &bot.textbook {
            let bytes = tokio::fs::read(path)
                .await
                .map_err(|source| ApiError::Textbook {
                    path: path.clone(),
                    source,
                })?;
            let file_name = path
                .file_name()
                .map(|name| name.to_string_lossy().into_owned())
                .unwrap_or_else(|| "textbook".to_string());
            form = form.part("textbook", Part::bytes(bytes).file_name(file_name));
        }

        let request = self
            .authorized(self.http.post(self.url("/textbooks/upload")))
            .multipart(form);
        let body = self.execute(request).await?;
        let upload: UploadResponse = serde_json::from_value(body)?;
        if !upload.success {
            let reason = upload
                .error
                .clone()
                .unwrap_or_else(|| "Failed to create bot".to_string());
            return Err(ApiError::Rejected(reason));
        }
        Ok(upload)
    }

    pub async fn delete_bot(&self, bot_id: &str) -> Result<(), ApiError> {
        let request = self.authorized(self.http.delete(self.url(&format!("/bots/{}", bot_id))));
        self.execute(request).await?;
        info!(bot_id, "Bot deleted.");
        Ok(())
    }

    pub async fn analytics(&self) -> Result<Dashboard, ApiError> {
        self.get_json("/analytics/").await
    }

    async fn get_json<T: DeserializeOwned>(&self, endpoint: &str) -> Result<T, ApiError> {
        let request = self.authorized(self.http.get(self.url(endpoint)));
        let body = self.execute(request).await?;
        Ok(serde_json::from_value(body)?)
    }

    /// Sends an authenticated request and maps the status onto `ApiError`.
    ///
    /// Non-JSON success bodies come back as `Value::Null`.
    async fn execute(&self, request: RequestBuilder) -> Result<Value, ApiError> {
        let response = request.send().await?;
        let status = response.status();

        if status == StatusCode::UNAUTHORIZED || status == StatusCode::FORBIDDEN {
            warn!(%status, "Backend refused credentials; clearing stored token.");
            self.tokens.clear()?;
            return Err(ApiError::AuthExpired);
        }
        if status == StatusCode::NOT_FOUND {
            return Err(ApiError::NotFound);
        }

        let is_json = response
            .headers()
            .get(CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .is_some_and(|v| v.contains("application/json"));
        let body = if is_json {
            response.json::<Value>().await?
        } else {
            Value::Null
        };

        if !status.is_success() {
            let message = error_message(&body)
                .unwrap_or_else(|| format!("Request failed with status {}", status.as_u16()));
            error!(%status, %message, "API request failed.");
            return Err(ApiError::Status { status, message });
        }
        Ok(body)
    }
}

/// Picks the backend's error text: `detail` first, then `message`.
fn error_message(body: &Value) -> Option<String> {
    ["detail", "message"]
        .iter()
        .find_map(|key| body.get(key).and_then(Value::as_str))
        .map(str::to_string)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_error_message_prefers_detail() {
        let body = json!({"detail": "Email taken", "message": "Bad request"});
        assert_eq!(error_message(&body).as_deref(), Some("Email taken"));

        let body = json!({"message": "Bad request"});
        assert_eq!(error_message(&body).as_deref(), Some("Bad request"));

        assert_eq!(error_message(&Value::Null), None);
    }

    #[test]
    fn test_image_url_joins_relative_paths() {
        let client = ApiClient::new(
            "http://127.0.0.1:8000/",
            Arc::new(TokenStore::new("unused-token")),
        );

        assert_eq!(
            client.image_url("/media/x.png"),
            "http://127.0.0.1:8000/media/x.png"
        );
        assert_eq!(
            client.image_url("media/x.png"),
            "http://127.0.0.1:8000/media/x.png"
        );
        assert_eq!(
            client.image_url("https://cdn.example.com/y.png"),
            "https://cdn.example.com/y.png"
        );
    }
}
