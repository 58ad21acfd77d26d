//! Admission pipeline and deadline-bounded execution.

pub mod execution;
pub mod pipeline;

pub use execution::{EXECUTE_QUERY_PROCEDURE, ExecutionGate, ExecutionOutcome, StatementRequest};
pub use pipeline::{AdmissionPipeline, AdmissionStage, PipelineResponse, StatusPolicy};
