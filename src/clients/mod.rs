//! 代码评审服务客户端

pub mod gitlab_client;

pub use gitlab_client::GitLabClient;

use crate::errors::ReviewError;
use crate::types::{
    MergeOptions, MergeRequest, MergeRequestCommit, MergeRequestUpdate, NewMergeRequest, Pipeline,
};
use async_trait::async_trait;

/// 对合并请求的操作，作用域是单个项目
#[async_trait]
pub trait ReviewServer: Send + Sync {
    /// 所有打开状态的合并请求
    async fn open_merge_requests(&self) -> Result<Vec<MergeRequest>, ReviewError>;

    async fn merge_request(&self, iid: u64) -> Result<MergeRequest, ReviewError>;

    async fn merge_request_commits(&self, iid: u64) -> Result<Vec<MergeRequestCommit>, ReviewError>;

    /// 最新的流水线排在最前
    async fn merge_request_pipelines(&self, iid: u64) -> Result<Vec<Pipeline>, ReviewError>;

    async fn create_merge_request(
        &self,
        request: &NewMergeRequest,
    ) -> Result<MergeRequest, ReviewError>;

    async fn update_merge_request(
        &self,
        iid: u64,
        update: &MergeRequestUpdate,
    ) -> Result<MergeRequest, ReviewError>;

    async fn approve_merge_request(&self, iid: u64) -> Result<(), ReviewError>;

    async fn merge_merge_request(&self, iid: u64, options: &MergeOptions) -> Result<(), ReviewError>;
}
