use serde::{Deserialize, Serialize, Serializer};

/// GitLab 项目的基本信息
#[derive(Debug, Clone, Deserialize, PartialEq)]
pub struct Project {
    pub id: u64,
    pub name: String,
    pub http_url_to_repo: String,
}

#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
pub struct MergeRequest {
    pub iid: u64,
    pub title: String,
    #[serde(default)]
    pub description: Option<String>,
    pub source_branch: String,
    pub target_branch: String,
    #[serde(default)]
    pub labels: Vec<String>,
    /// 源分支当前的 HEAD
    #[serde(default)]
    pub sha: Option<String>,
    #[serde(default)]
    pub merge_status: String,
}

impl MergeRequest {
    pub fn has_label(&self, label: &str) -> bool {
        self.labels.iter().any(|l| l == label)
    }

    pub fn can_be_merged(&self) -> bool {
        self.merge_status == "can_be_merged"
    }
}

#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
pub struct MergeRequestCommit {
    pub id: String,
    pub author_name: String,
    #[serde(default)]
    pub title: String,
}

#[derive(Debug, Clone, Copy, Deserialize, Serialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum PipelineStatus {
    Created,
    WaitingForResource,
    Preparing,
    Pending,
    Running,
    Success,
    Failed,
    Canceled,
    Skipped,
    Manual,
    Scheduled,
    #[serde(other)]
    Unknown,
}

impl PipelineStatus {
    /// 流水线已经结束但没有成功，本轮放弃该组件
    pub fn is_unsuccessful(self) -> bool {
        matches!(
            self,
            PipelineStatus::Failed | PipelineStatus::Canceled | PipelineStatus::Skipped
        )
    }
}

#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
pub struct Pipeline {
    pub id: u64,
    pub sha: String,
    pub status: PipelineStatus,
}

fn comma_separated<S: Serializer>(labels: &[String], serializer: S) -> Result<S::Ok, S::Error> {
    serializer.serialize_str(&labels.join(","))
}

fn comma_separated_opt<S: Serializer>(
    labels: &Option<Vec<String>>,
    serializer: S,
) -> Result<S::Ok, S::Error> {
    match labels {
        Some(labels) => comma_separated(labels, serializer),
        None => serializer.serialize_none(),
    }
}

#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct NewMergeRequest {
    pub source_branch: String,
    pub target_branch: String,
    pub title: String,
    #[serde(serialize_with = "comma_separated")]
    pub labels: Vec<String>,
    pub description: String,
}

/// 只会序列化被设置的字段
#[derive(Debug, Clone, Default, Serialize, PartialEq)]
pub struct MergeRequestUpdate {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(
        skip_serializing_if = "Option::is_none",
        serialize_with = "comma_separated_opt"
    )]
    pub add_labels: Option<Vec<String>>,
}

#[derive(Debug, Clone, Copy, Serialize, PartialEq)]
pub struct MergeOptions {
    pub merge_when_pipeline_succeeds: bool,
    pub should_remove_source_branch: bool,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_unknown_pipeline_status_deserializes() {
        let p: Pipeline =
            serde_json::from_str(r#"{"id": 1, "sha": "abc", "status": "something_new"}"#).unwrap();
        assert_eq!(p.status, PipelineStatus::Unknown);
        let p: Pipeline =
            serde_json::from_str(r#"{"id": 2, "sha": "abc", "status": "waiting_for_resource"}"#)
                .unwrap();
        assert_eq!(p.status, PipelineStatus::WaitingForResource);
    }

    #[test]
    fn test_labels_serialize_as_comma_list() {
        let mr = NewMergeRequest {
            source_branch: "scheduled/bot/foo".to_string(),
            target_branch: "main".to_string(),
            title: "Draft: autobot: Update foo".to_string(),
            labels: vec!["AUTOBOT".to_string(), "SKIP_CHANGELOG".to_string()],
            description: "x".to_string(),
        };
        let value = serde_json::to_value(&mr).unwrap();
        assert_eq!(value["labels"], "AUTOBOT,SKIP_CHANGELOG");

        let update = MergeRequestUpdate {
            title: Some("t".to_string()),
            ..Default::default()
        };
        let value = serde_json::to_value(&update).unwrap();
        assert_eq!(value, serde_json::json!({"title": "t"}));
    }

    #[test]
    fn test_merge_request_defaults() {
        let mr: MergeRequest = serde_json::from_str(
            r#"{"iid": 7, "title": "t", "description": null, "source_branch": "a", "target_branch": "b"}"#,
        )
        .unwrap();
        assert!(mr.labels.is_empty());
        assert!(mr.description.is_none());
        assert!(!mr.can_be_merged());
    }
}
