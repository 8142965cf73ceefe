//! reqwest-backed [`BlogApi`].

use std::time::Duration;

use async_trait::async_trait;
use drafthouse_api_types::{
    BlogPost, BlogPostPayload, CreateDraftRequest, CreateDraftResponse, ErrorBody, PostStatus,
    PresignedUpload,
};
use reqwest::{Client, Method, RequestBuilder, Response, StatusCode, Url, header};
use serde::de::DeserializeOwned;
use tracing::{debug, instrument};

use crate::application::api::{ApiError, BlogApi};
use crate::domain::types::DraftId;

use super::{credentials::CredentialSource, error::InfraError};

pub const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

const BLOGS_PATH: &str = "blogs";
const PRESIGN_PATH: &str = "get-presigned-url";

#[derive(Clone, Debug)]
pub struct HttpBlogApi {
    client: Client,
    base: Url,
    credentials: CredentialSource,
}

impl HttpBlogApi {
    pub fn new(
        base_url: &str,
        credentials: CredentialSource,
        timeout: Duration,
    ) -> Result<Self, InfraError> {
        let mut base = Url::parse(base_url).map_err(|err| {
            InfraError::configuration(format!("invalid API base URL `{base_url}`: {err}"))
        })?;
        if !base.path().ends_with('/') {
            let path = format!("{}/", base.path());
            base.set_path(&path);
        }
        let client = Client::builder()
            .user_agent(Self::user_agent())
            .timeout(timeout)
            .build()
            .map_err(|err| InfraError::configuration(format!("failed to build HTTP client: {err}")))?;
        Ok(Self {
            client,
            base,
            credentials,
        })
    }

    pub fn user_agent() -> &'static str {
        concat!("drafthouse/", env!("CARGO_PKG_VERSION"))
    }

    pub fn base(&self) -> &Url {
        &self.base
    }

    fn url(&self, path: &str) -> Result<Url, ApiError> {
        self.base
            .join(path)
            .map_err(|err| ApiError::Transport(format!("invalid request URL `{path}`: {err}")))
    }

    fn authorized(&self, method: Method, url: Url) -> Result<RequestBuilder, ApiError> {
        let bearer = self.credentials.bearer()?;
        Ok(self
            .client
            .request(method, url)
            .header(header::AUTHORIZATION, bearer))
    }

    async fn send<T: DeserializeOwned>(&self, request: RequestBuilder) -> Result<T, ApiError> {
        let response = request.send().await?;
        Self::handle(response).await
    }

    async fn handle<T: DeserializeOwned>(response: Response) -> Result<T, ApiError> {
        let status = response.status();
        let path = response.url().path().to_string();
        let bytes = response.bytes().await?;
        if !status.is_success() {
            return Err(status_error(status, path, &bytes));
        }
        serde_json::from_slice(&bytes).map_err(|err| ApiError::Decode(err.to_string()))
    }
}

#[async_trait]
impl BlogApi for HttpBlogApi {
    fn ensure_credential(&self) -> Result<(), ApiError> {
        self.credentials.bearer().map(|_| ())
    }

    #[instrument(skip(self))]
    async fn create_draft(&self, title: &str) -> Result<CreateDraftResponse, ApiError> {
        let body = CreateDraftRequest {
            title: title.to_string(),
            content: String::new(),
            status: PostStatus::Draft,
        };
        let request = self.authorized(Method::POST, self.url(BLOGS_PATH)?)?.json(&body);
        let created: CreateDraftResponse = self.send(request).await?;
        if created.id.trim().is_empty() {
            return Err(ApiError::Decode("draft response carries no id".to_string()));
        }
        debug!(draft = %created.id, "Draft created remotely");
        Ok(created)
    }

    #[instrument(skip(self, payload), fields(draft = %id, status = payload.status.as_str()))]
    async fn update_post(
        &self,
        id: &DraftId,
        payload: &BlogPostPayload,
    ) -> Result<BlogPost, ApiError> {
        let mut url = self.url(BLOGS_PATH)?;
        url.query_pairs_mut().append_pair("id", id.as_str());
        let request = self.authorized(Method::PUT, url)?.json(payload);
        self.send(request).await
    }

    #[instrument(skip(self), fields(draft = %id))]
    async fn get_post(&self, id: &DraftId) -> Result<BlogPost, ApiError> {
        let mut url = self.url(BLOGS_PATH)?;
        url.path_segments_mut()
            .map_err(|()| ApiError::Transport("API base URL cannot carry a path".to_string()))?
            .pop_if_empty()
            .push(id.as_str());
        let request = self.authorized(Method::GET, url)?;
        self.send(request).await
    }

    #[instrument(skip(self))]
    async fn presign_upload(&self, key: &str) -> Result<PresignedUpload, ApiError> {
        let mut url = self.url(PRESIGN_PATH)?;
        url.query_pairs_mut().append_pair("fileName", key);
        let request = self.authorized(Method::GET, url)?;
        self.send(request).await
    }

    #[instrument(skip(self, bytes), fields(size = bytes.len()))]
    async fn upload_object(
        &self,
        presigned_url: &str,
        content_type: &str,
        bytes: Vec<u8>,
    ) -> Result<(), ApiError> {
        let url = Url::parse(presigned_url)
            .map_err(|err| ApiError::Decode(format!("invalid presigned URL: {err}")))?;
        // The presigned URL carries its own authorization.
        let response = self
            .client
            .put(url)
            .header(header::CONTENT_TYPE, content_type)
            .body(bytes)
            .send()
            .await?;
        let status = response.status();
        if !status.is_success() {
            let path = response.url().path().to_string();
            let body = response.bytes().await?;
            return Err(status_error(status, path, &body));
        }
        Ok(())
    }
}

impl From<reqwest::Error> for ApiError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_decode() {
            ApiError::Decode(err.to_string())
        } else {
            ApiError::Transport(err.to_string())
        }
    }
}

fn status_error(status: StatusCode, path: String, body: &[u8]) -> ApiError {
    match status {
        StatusCode::NOT_FOUND => ApiError::NotFound { path },
        StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => ApiError::Unauthorized {
            status: status.as_u16(),
        },
        _ => {
            let message = serde_json::from_slice::<ErrorBody>(body)
                .ok()
                .and_then(|parsed| parsed.text().map(str::to_string))
                .unwrap_or_else(|| String::from_utf8_lossy(body).trim().to_string());
            ApiError::Rejected {
                status: status.as_u16(),
                message,
            }
        }
    }
}
