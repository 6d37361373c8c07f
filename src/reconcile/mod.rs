//! 评审对账：每个组件一个合并请求，可选自动合并

pub mod engine;
pub mod naming;

pub use engine::{
    ComponentOutcome, ComponentReport, HaltReason, PassControl, ReconcileEngine,
    ReconcileOptions, RunSummary,
};
pub use naming::{extract_identification, identification_token};
