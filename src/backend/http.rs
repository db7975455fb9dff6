//! REST client for a remote ShareSpace server.

use async_trait::async_trait;
use reqwest::{Client, RequestBuilder, Url};
use serde::{de::DeserializeOwned, Deserialize};
use serde_json::Value;

use super::{AuthAuthority, ContentBackend};
use crate::errors::{AppError, ErrorDetails};
use crate::models::{
    CategoryFilter, Comment, ExchangeSessionRequest, LoginRequest, NewComment, NewPost, Post,
    Session, SignupRequest, User,
};

/// Response envelope shared by success and error bodies.
#[derive(Debug, Deserialize)]
struct Envelope {
    success: bool,
    #[serde(default)]
    data: Option<Value>,
    #[serde(default)]
    error: Option<ErrorDetails>,
}

/// Backend that forwards every call to the REST API under `base_url`.
#[derive(Clone)]
pub struct HttpBackend {
    client: Client,
    base_url: Url,
}

impl HttpBackend {
    pub fn new(base_url: &str) -> Result<Self, AppError> {
        Self::with_client(Client::new(), base_url)
    }

    pub fn with_client(client: Client, base_url: &str) -> Result<Self, AppError> {
        let mut normalized = base_url.trim().to_string();
        if !normalized.ends_with('/') {
            normalized.push('/');
        }
        let base_url = Url::parse(&normalized)
            .map_err(|e| AppError::Validation(format!("Invalid API URL {}: {}", base_url, e)))?;

        Ok(Self { client, base_url })
    }

    pub fn base_url(&self) -> &Url {
        &self.base_url
    }

    fn endpoint(&self, path: &str) -> Result<Url, AppError> {
        self.base_url
            .join(path)
            .map_err(|e| AppError::Internal(format!("Invalid endpoint {}: {}", path, e)))
    }

    fn post_endpoint(&self, post_id: &str, suffix: &str) -> Result<Url, AppError> {
        let mut url = self.endpoint("api/posts")?;
        url.path_segments_mut()
            .map_err(|_| AppError::Internal("API URL cannot hold a path".to_string()))?
            .push(post_id)
            .push(suffix);
        Ok(url)
    }

    /// Send a request and unwrap the response envelope.
    async fn send<T: DeserializeOwned>(&self, request: RequestBuilder) -> Result<T, AppError> {
        let response = request.send().await?;
        let status = response.status();
        let body = response.bytes().await?;

        let envelope: Envelope = serde_json::from_slice(&body).map_err(|_| {
            AppError::Transient(format!("Unexpected response from server ({})", status))
        })?;

        if envelope.success {
            return Ok(serde_json::from_value(envelope.data.unwrap_or(Value::Null))?);
        }

        match envelope.error {
            Some(details) => Err(AppError::from_code(&details.code, details.message)),
            None => Err(AppError::Transient(format!(
                "Request failed with status {}",
                status
            ))),
        }
    }
}

#[async_trait]
impl AuthAuthority for HttpBackend {
    async fn login(&self, request: &LoginRequest) -> Result<Session, AppError> {
        let url = self.endpoint("api/auth/login")?;
        self.send(self.client.post(url).json(request)).await
    }

    async fn signup(&self, request: &SignupRequest) -> Result<Session, AppError> {
        let url = self.endpoint("api/auth/signup")?;
        self.send(self.client.post(url).json(request)).await
    }

    async fn exchange_external_session(&self, session_id: &str) -> Result<Session, AppError> {
        let url = self.endpoint("api/auth/session")?;
        let body = ExchangeSessionRequest {
            session_id: session_id.to_string(),
        };
        self.send(self.client.post(url).json(&body)).await
    }

    async fn who_am_i(&self, token: &str) -> Result<User, AppError> {
        let url = self.endpoint("api/auth/me")?;
        self.send(self.client.get(url).bearer_auth(token)).await
    }

    async fn logout(&self, token: &str) -> Result<(), AppError> {
        let url = self.endpoint("api/auth/logout")?;
        self.send(self.client.post(url).bearer_auth(token)).await
    }
}

#[async_trait]
impl ContentBackend for HttpBackend {
    async fn list_posts(
        &self,
        session: &Session,
        filter: CategoryFilter,
    ) -> Result<Vec<Post>, AppError> {
        let mut url = self.endpoint("api/posts")?;
        if let Some(category) = filter.as_query() {
            url.query_pairs_mut().append_pair("category", category);
        }
        self.send(self.client.get(url).bearer_auth(&session.token))
            .await
    }

    async fn list_my_posts(&self, session: &Session) -> Result<Vec<Post>, AppError> {
        let url = self.endpoint("api/posts/mine")?;
        self.send(self.client.get(url).bearer_auth(&session.token))
            .await
    }

    async fn create_post(&self, session: &Session, post: &NewPost) -> Result<Post, AppError> {
        let url = self.endpoint("api/posts")?;
        self.send(self.client.post(url).bearer_auth(&session.token).json(post))
            .await
    }

    async fn send_kindness(&self, session: &Session, post_id: &str) -> Result<Post, AppError> {
        let url = self.post_endpoint(post_id, "kindness")?;
        self.send(self.client.post(url).bearer_auth(&session.token))
            .await
    }

    async fn list_comments(
        &self,
        session: &Session,
        post_id: &str,
    ) -> Result<Vec<Comment>, AppError> {
        let url = self.post_endpoint(post_id, "comments")?;
        self.send(self.client.get(url).bearer_auth(&session.token))
            .await
    }

    async fn create_comment(
        &self,
        session: &Session,
        post_id: &str,
        comment: &NewComment,
    ) -> Result<Comment, AppError> {
        let url = self.post_endpoint(post_id, "comments")?;
        self.send(
            self.client
                .post(url)
                .bearer_auth(&session.token)
                .json(comment),
        )
        .await
    }
}
