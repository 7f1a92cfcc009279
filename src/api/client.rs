use async_trait::async_trait;
use log::{debug, info};
use reqwest::Client as HttpClient;
use reqwest::header::{COOKIE, SET_COOKIE};
use serde::Serialize;
use serde::de::DeserializeOwned;
use std::time::Duration;

use crate::api::error::ApiError;
use crate::api::models::{
    Conversation, Message, MessageId, PeerId, Profile, SendMessageRequest, SigninRequest,
    SigninResponse,
};

const TOKEN_COOKIE: &str = "token";

/// Backend operations the messaging screen depends on.
#[async_trait]
pub trait MessagingApi: Send + Sync {
    async fn conversations(&self) -> Result<Vec<Conversation>, ApiError>;
    async fn messages(&self, peer: PeerId) -> Result<Vec<Message>, ApiError>;
    async fn send_message(&self, recipient: PeerId, body: &str) -> Result<(), ApiError>;
    async fn like_message(&self, id: MessageId) -> Result<(), ApiError>;
    async fn profile(&self, peer: PeerId) -> Result<Profile, ApiError>;
}

pub struct ApiClient {
    http: HttpClient,
    base_url: String,
    token: Option<String>,
}

impl ApiClient {
    pub fn new(base_url: &str) -> Result<Self, ApiError> {
        let http = HttpClient::builder()
            .timeout(Duration::from_secs(10))
            .build()?;
        Ok(Self {
            http,
            base_url: base_url.trim_end_matches('/').to_string(),
            token: None,
        })
    }

    pub fn with_token(mut self, token: Option<String>) -> Self {
        self.token = token;
        self
    }

    pub fn token(&self) -> Option<&str> {
        self.token.as_deref()
    }

    fn endpoint(&self, path: &str) -> String {
        format!("{}/{}", self.base_url, path.trim_start_matches('/'))
    }

    fn with_auth(&self, mut req: reqwest::RequestBuilder) -> reqwest::RequestBuilder {
        if let Some(t) = &self.token {
            req = req.header(COOKIE, format!("{}={}", TOKEN_COOKIE, t));
        }
        req
    }

    async fn get_json<T: DeserializeOwned>(&self, path: &str) -> Result<T, ApiError> {
        let endpoint = self.endpoint(path);
        debug!("GET {}", endpoint);
        let resp = self.with_auth(self.http.get(&endpoint)).send().await?;
        read_json(resp).await
    }

    async fn post<B: Serialize + Sync + ?Sized>(
        &self,
        path: &str,
        body: Option<&B>,
    ) -> Result<(), ApiError> {
        let endpoint = self.endpoint(path);
        debug!("POST {}", endpoint);
        let mut req = self.with_auth(self.http.post(&endpoint));
        if let Some(body) = body {
            req = req.json(body);
        }
        let resp = req.send().await?;
        if !resp.status().is_success() {
            return Err(ApiError::from_status(resp.status()));
        }
        Ok(())
    }

    /// Signs in and keeps the session token for subsequent calls.
    pub async fn signin(&mut self, email: &str, password: &str) -> Result<SigninResponse, ApiError> {
        let endpoint = self.endpoint("/auth/signin");
        let resp = self
            .http
            .post(&endpoint)
            .json(&SigninRequest { email, password })
            .send()
            .await?;
        if !resp.status().is_success() {
            return Err(ApiError::from_status(resp.status()));
        }
        let token = resp
            .headers()
            .get_all(SET_COOKIE)
            .iter()
            .filter_map(|v| v.to_str().ok())
            .find_map(token_from_set_cookie)
            .ok_or_else(|| ApiError::Decode("Token cookie not found in response".into()))?;
        let body: SigninResponse = read_json(resp).await?;
        info!("Signed in as {} ({})", email, body.role.as_deref().unwrap_or("unknown role"));
        self.token = Some(token);
        Ok(body)
    }

    /// Ends the server session. The caller forgets any stored token.
    pub async fn logout(&self) -> Result<(), ApiError> {
        self.post::<()>("/auth/logout", None).await
    }
}

#[async_trait]
impl MessagingApi for ApiClient {
    async fn conversations(&self) -> Result<Vec<Conversation>, ApiError> {
        self.get_json("/messages/conversations").await
    }

    async fn messages(&self, peer: PeerId) -> Result<Vec<Message>, ApiError> {
        self.get_json(&format!("/messages/{}", peer)).await
    }

    async fn send_message(&self, recipient: PeerId, body: &str) -> Result<(), ApiError> {
        let payload = SendMessageRequest { recipient_id: recipient, body };
        self.post("/messages/send", Some(&payload)).await
    }

    async fn like_message(&self, id: MessageId) -> Result<(), ApiError> {
        self.post::<()>(&format!("/messages/{}/like", id), None).await
    }

    async fn profile(&self, peer: PeerId) -> Result<Profile, ApiError> {
        self.get_json(&format!("/profile/{}", peer)).await
    }
}

async fn read_json<T: DeserializeOwned>(resp: reqwest::Response) -> Result<T, ApiError> {
    if !resp.status().is_success() {
        return Err(ApiError::from_status(resp.status()));
    }
    resp.json::<T>().await.map_err(|e| {
        if e.is_decode() {
            ApiError::Decode(e.to_string())
        } else {
            ApiError::Transport(e)
        }
    })
}

/// Extracts the session token from one `Set-Cookie` header value.
fn token_from_set_cookie(header: &str) -> Option<String> {
    let pair = header.split(';').next()?.trim();
    let (name, value) = pair.split_once('=')?;
    if name == TOKEN_COOKIE && !value.is_empty() {
        Some(value.to_string())
    } else {
        None
    }
}
