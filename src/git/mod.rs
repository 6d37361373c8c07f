pub mod operations;
pub mod remote;

pub use operations::{run_git, CommandOutput, GitOps, WorkingCopy};
pub use remote::{parse_ls_remote, GitRemote, RemoteRef, RemoteRefs};
