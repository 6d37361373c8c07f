pub mod review;
pub mod update;

pub use review::{
    MergeOptions, MergeRequest, MergeRequestCommit, MergeRequestUpdate, NewMergeRequest,
    Pipeline, PipelineStatus, Project,
};
pub use update::{
    Declaration, ResolvedReference, ShallowFlag, UpdateEntry, UpdateResult, UpdateStatus,
};
