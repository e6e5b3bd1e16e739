// Minimal Instagram Graph API client covering the endpoints the delivery
// engine needs: comment replies, Send API messages, and the two-step media
// container create/publish flow.

pub mod models;

use std::time::Duration;

use reqwest::{Client, StatusCode};
use serde_json::{json, Value};
use thiserror::Error;

use crate::models::{ErrorEnvelope, GraphError, IdResponse, MessageResponse};

const DEFAULT_BASE_URL: &str = "https://graph.facebook.com/v21.0";
const REQUEST_TIMEOUT: Duration = Duration::from_secs(12);

// Graph error codes that signal throttling. 4 = app-level, 17 = user-level,
// 32 = page-level, 613 = custom rate limit.
const RATE_LIMIT_CODES: [i64; 4] = [4, 17, 32, 613];
// 190 = invalid/expired OAuth access token.
const OAUTH_TOKEN_CODE: i64 = 190;

/// Errors returned by the Graph API client.
#[derive(Debug, Error)]
pub enum InstagramError {
    /// The platform is throttling this account or app.
    #[error("rate limited by the Graph API")]
    RateLimited { retry_after_secs: Option<u64> },

    /// The access token was rejected (expired, revoked, insufficient scope).
    #[error("unauthorized: {message}")]
    Unauthorized { message: String },

    /// The request itself was malformed (bad parameter, unsupported media).
    #[error("invalid request: {message}")]
    Invalid { message: String },

    /// Any other error response from the API.
    #[error("graph api error (status {status}): {message}")]
    Api { status: u16, message: String },

    /// Network-level failure: DNS, connect, timeout, TLS.
    #[error("http error: {0}")]
    Http(#[from] reqwest::Error),

    /// The API answered 2xx but the body was not the expected shape.
    #[error("unexpected response: {0}")]
    UnexpectedResponse(String),
}

#[derive(Debug, Clone, Default)]
pub struct InstagramOptions {
    /// Override for tests and staging; defaults to the production Graph host.
    pub base_url: Option<String>,
}

/// Client for the Instagram Graph API.
///
/// Access tokens are per connected account and passed on every call; the
/// client itself holds no credentials.
#[derive(Debug, Clone)]
pub struct InstagramService {
    client: Client,
    base_url: String,
}

impl InstagramService {
    pub fn new(options: InstagramOptions) -> Result<Self, InstagramError> {
        let client = Client::builder().timeout(REQUEST_TIMEOUT).build()?;

        Ok(Self {
            client,
            base_url: options
                .base_url
                .unwrap_or_else(|| DEFAULT_BASE_URL.to_string()),
        })
    }

    /// Reply to a comment. Returns the id of the created reply comment.
    ///
    /// `POST /{comment-id}/replies`
    pub async fn reply_to_comment(
        &self,
        access_token: &str,
        comment_id: &str,
        message: &str,
    ) -> Result<String, InstagramError> {
        let url = format!("{}/{}/replies", self.base_url, comment_id);
        let body = json!({ "message": message });

        let response: IdResponse = self.post(&url, access_token, &body).await?;
        Ok(response.id)
    }

    /// Send a direct message via the Send API. Covers both fresh messages and
    /// replies inside an existing thread. Returns the message id.
    ///
    /// `POST /{ig-user-id}/messages`
    pub async fn send_message(
        &self,
        access_token: &str,
        ig_user_id: &str,
        recipient_id: &str,
        text: &str,
    ) -> Result<String, InstagramError> {
        let url = format!("{}/{}/messages", self.base_url, ig_user_id);
        let body = json!({
            "recipient": { "id": recipient_id },
            "message": { "text": text },
        });

        let response: MessageResponse = self.post(&url, access_token, &body).await?;
        Ok(response.message_id)
    }

    /// Step 1 of publishing: create a media container for a hosted image or
    /// video. Returns the container (creation) id. The container is not
    /// visible to anyone until published.
    ///
    /// `POST /{ig-user-id}/media`
    pub async fn create_media_container(
        &self,
        access_token: &str,
        ig_user_id: &str,
        media_url: &str,
        caption: &str,
        media_type: &str,
    ) -> Result<String, InstagramError> {
        let url = format!("{}/{}/media", self.base_url, ig_user_id);
        let mut body = json!({ "caption": caption });

        // The API keys the URL parameter off the media type.
        match media_type {
            "video" | "reel" => {
                body["media_type"] = json!("REELS");
                body["video_url"] = json!(media_url);
            }
            _ => {
                body["image_url"] = json!(media_url);
            }
        }

        let response: IdResponse = self.post(&url, access_token, &body).await?;
        Ok(response.id)
    }

    /// Step 2 of publishing: publish a previously created container. Returns
    /// the id of the published media.
    ///
    /// `POST /{ig-user-id}/media_publish`
    pub async fn publish_media_container(
        &self,
        access_token: &str,
        ig_user_id: &str,
        creation_id: &str,
    ) -> Result<String, InstagramError> {
        let url = format!("{}/{}/media_publish", self.base_url, ig_user_id);
        let body = json!({ "creation_id": creation_id });

        let response: IdResponse = self.post(&url, access_token, &body).await?;
        Ok(response.id)
    }

    async fn post<T: serde::de::DeserializeOwned>(
        &self,
        url: &str,
        access_token: &str,
        body: &Value,
    ) -> Result<T, InstagramError> {
        let response = self
            .client
            .post(url)
            .bearer_auth(access_token)
            .json(body)
            .send()
            .await?;

        let status = response.status();
        let retry_after = parse_retry_after(response.headers());
        let text = response.text().await?;

        if !status.is_success() {
            return Err(error_from_response(status, retry_after, &text));
        }

        serde_json::from_str::<T>(&text)
            .map_err(|e| InstagramError::UnexpectedResponse(format!("{}: {}", e, text)))
    }
}

fn parse_retry_after(headers: &reqwest::header::HeaderMap) -> Option<u64> {
    headers
        .get(reqwest::header::RETRY_AFTER)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.parse().ok())
}

/// Map a non-2xx response to a typed error using the Graph error envelope.
fn error_from_response(
    status: StatusCode,
    retry_after_secs: Option<u64>,
    body: &str,
) -> InstagramError {
    let graph_error = serde_json::from_str::<ErrorEnvelope>(body)
        .map(|envelope| envelope.error)
        .unwrap_or_else(|_| GraphError {
            message: body.to_string(),
            error_type: None,
            code: None,
            error_subcode: None,
        });

    let code = graph_error.code.unwrap_or_default();

    if status == StatusCode::TOO_MANY_REQUESTS || RATE_LIMIT_CODES.contains(&code) {
        return InstagramError::RateLimited { retry_after_secs };
    }

    let is_oauth = code == OAUTH_TOKEN_CODE
        || graph_error.error_type.as_deref() == Some("OAuthException")
        || status == StatusCode::UNAUTHORIZED
        || status == StatusCode::FORBIDDEN;
    if is_oauth {
        return InstagramError::Unauthorized {
            message: graph_error.message,
        };
    }

    if status == StatusCode::BAD_REQUEST {
        return InstagramError::Invalid {
            message: graph_error.message,
        };
    }

    InstagramError::Api {
        status: status.as_u16(),
        message: graph_error.message,
    }
}
