use super::ReviewServer;
use crate::errors::ReviewError;
use crate::types::{
    MergeOptions, MergeRequest, MergeRequestCommit, MergeRequestUpdate, NewMergeRequest, Pipeline,
    Project,
};
use async_trait::async_trait;
use reqwest::{Client, Method, RequestBuilder, Response, StatusCode, Url};
use serde::de::DeserializeOwned;
use std::time::Duration;
use tokio::time::sleep;

const DEFAULT_RETRY_COUNT: u32 = 3;
const DEFAULT_TIMEOUT_SECONDS: u64 = 30;
const DEFAULT_RETRY_DELAY_SECONDS: u64 = 1;
const PAGE_SIZE: &str = "100";
const NEXT_PAGE_HEADER: &str = "x-next-page";

/// GitLab REST API v4 客户端，作用域是单个项目
#[derive(Debug, Clone)]
pub struct GitLabClient {
    server_url: Url,
    project_id: String,
    token: String,
    client: Client,
    retry_count: u32,
    retry_delay: Duration,
    timeout: Duration,
}

impl GitLabClient {
    pub fn new(server_url: &str, project_id: &str, token: &str) -> Result<Self, ReviewError> {
        let server_url =
            Url::parse(server_url).map_err(|e| ReviewError::InvalidUrl(format!("{server_url}: {e}")))?;
        if server_url.cannot_be_a_base() {
            return Err(ReviewError::InvalidUrl(server_url.to_string()));
        }
        Ok(Self {
            server_url,
            project_id: project_id.to_string(),
            token: token.to_string(),
            client: Client::new(),
            retry_count: DEFAULT_RETRY_COUNT,
            retry_delay: Duration::from_secs(DEFAULT_RETRY_DELAY_SECONDS),
            timeout: Duration::from_secs(DEFAULT_TIMEOUT_SECONDS),
        })
    }

    pub fn with_retry(mut self, retry_count: u32, retry_delay: Duration) -> Self {
        self.retry_count = retry_count.max(1);
        self.retry_delay = retry_delay;
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// `<server>/api/v4/projects/<id>/<segments...>`，项目路径中的 `/` 会被编码
    fn project_url(&self, segments: &[&str]) -> Result<Url, ReviewError> {
        let mut url = self.server_url.clone();
        url.path_segments_mut()
            .map_err(|_| ReviewError::InvalidUrl(self.server_url.to_string()))?
            .pop_if_empty()
            .extend(["api", "v4", "projects", self.project_id.as_str()])
            .extend(segments);
        Ok(url)
    }

    fn request(&self, method: Method, url: Url) -> RequestBuilder {
        self.client
            .request(method, url)
            .header("PRIVATE-TOKEN", &self.token)
            .header(reqwest::header::ACCEPT, "application/json")
            .timeout(self.timeout)
    }

    async fn check(response: Response) -> Result<Response, ReviewError> {
        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }
        let url = response.url().path().to_string();
        let message = response.text().await.unwrap_or_default();
        Err(match status {
            StatusCode::UNAUTHORIZED => ReviewError::AuthenticationError,
            StatusCode::NOT_FOUND => ReviewError::NotFound(url),
            StatusCode::TOO_MANY_REQUESTS => ReviewError::RateLimitExceeded,
            s => ReviewError::ServerError {
                status_code: s.as_u16(),
                message,
            },
        })
    }

    async fn send_once(&self, builder: RequestBuilder) -> Result<Response, ReviewError> {
        match builder.send().await {
            Ok(response) => Self::check(response).await,
            Err(e) if e.is_timeout() => Err(ReviewError::TimeoutError),
            Err(e) => Err(ReviewError::NetworkError(e)),
        }
    }

    /// 幂等的 GET 请求，超时、限流和 5xx 时按指数退避重试
    async fn get_with_retry(&self, url: Url) -> Result<Response, ReviewError> {
        let mut wait_time = self.retry_delay;
        let mut last_error = None;

        for attempt in 0..self.retry_count {
            if attempt > 0 {
                sleep(wait_time).await;
                wait_time *= 2;
            }
            match self.send_once(self.request(Method::GET, url.clone())).await {
                Ok(response) => return Ok(response),
                Err(e) if e.is_retryable() => {
                    tracing::debug!("GET {} 第 {} 次失败: {}", url.path(), attempt + 1, e);
                    last_error = Some(e);
                }
                Err(e) => return Err(e),
            }
        }
        Err(last_error.unwrap_or(ReviewError::TimeoutError))
    }

    async fn json<T: DeserializeOwned>(response: Response) -> Result<T, ReviewError> {
        response.json::<T>().await.map_err(ReviewError::ParseError)
    }

    async fn get_json<T: DeserializeOwned>(&self, segments: &[&str]) -> Result<T, ReviewError> {
        let url = self.project_url(segments)?;
        Self::json(self.get_with_retry(url).await?).await
    }

    /// 依次请求所有分页
    async fn get_all_pages<T: DeserializeOwned>(
        &self,
        segments: &[&str],
        query: &[(&str, &str)],
    ) -> Result<Vec<T>, ReviewError> {
        let mut items = Vec::new();
        let mut page = "1".to_string();
        loop {
            let mut url = self.project_url(segments)?;
            url.query_pairs_mut()
                .extend_pairs(query)
                .append_pair("per_page", PAGE_SIZE)
                .append_pair("page", &page);

            let response = self.get_with_retry(url).await?;
            let next = response
                .headers()
                .get(NEXT_PAGE_HEADER)
                .and_then(|v| v.to_str().ok())
                .map(str::trim)
                .filter(|v| !v.is_empty())
                .map(str::to_string);
            let mut batch: Vec<T> = Self::json(response).await?;
            items.append(&mut batch);

            match next {
                Some(next) if next != page => page = next,
                _ => return Ok(items),
            }
        }
    }

    /// 获取项目信息，用于克隆工作区
    pub async fn project(&self) -> Result<Project, ReviewError> {
        self.get_json(&[]).await
    }
}

#[async_trait]
impl ReviewServer for GitLabClient {
    async fn open_merge_requests(&self) -> Result<Vec<MergeRequest>, ReviewError> {
        self.get_all_pages(&["merge_requests"], &[("state", "opened")])
            .await
    }

    async fn merge_request(&self, iid: u64) -> Result<MergeRequest, ReviewError> {
        self.get_json(&["merge_requests", &iid.to_string()]).await
    }

    async fn merge_request_commits(&self, iid: u64) -> Result<Vec<MergeRequestCommit>, ReviewError> {
        self.get_all_pages(&["merge_requests", &iid.to_string(), "commits"], &[])
            .await
    }

    async fn merge_request_pipelines(&self, iid: u64) -> Result<Vec<Pipeline>, ReviewError> {
        self.get_json(&["merge_requests", &iid.to_string(), "pipelines"])
            .await
    }

    async fn create_merge_request(
        &self,
        request: &NewMergeRequest,
    ) -> Result<MergeRequest, ReviewError> {
        let url = self.project_url(&["merge_requests"])?;
        let response = self
            .send_once(self.request(Method::POST, url).json(request))
            .await?;
        Self::json(response).await
    }

    async fn update_merge_request(
        &self,
        iid: u64,
        update: &MergeRequestUpdate,
    ) -> Result<MergeRequest, ReviewError> {
        let url = self.project_url(&["merge_requests", &iid.to_string()])?;
        let response = self
            .send_once(self.request(Method::PUT, url).json(update))
            .await?;
        Self::json(response).await
    }

    async fn approve_merge_request(&self, iid: u64) -> Result<(), ReviewError> {
        let url = self.project_url(&["merge_requests", &iid.to_string(), "approve"])?;
        self.send_once(self.request(Method::POST, url)).await?;
        Ok(())
    }

    async fn merge_merge_request(&self, iid: u64, options: &MergeOptions) -> Result<(), ReviewError> {
        let url = self.project_url(&["merge_requests", &iid.to_string(), "merge"])?;
        self.send_once(self.request(Method::PUT, url).json(options))
            .await?;
        Ok(())
    }
}

#[cfg(test)]
#[path = "gitlab_client_tests.rs"]
mod tests;
