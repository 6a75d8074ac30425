//! Build-orchestration adapter.
//!
//! Implements `CiInterpreter` over the orchestration service's REST API:
//! create a build, list a branch's running builds, cancel a build.

mod client;
mod error;

pub use client::{BuildkiteClient, DEFAULT_BASE_URL};
pub use error::BuildkiteError;
