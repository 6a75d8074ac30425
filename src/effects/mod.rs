//! Effects-as-data for the bot's three collaborators.
//!
//! The decision engine never calls an API client directly. It describes each
//! call as an effect value and hands it to an interpreter, which keeps the
//! engine testable with recording mocks and makes every outbound call
//! loggable as data.

pub mod ci;
pub mod github;
pub mod index;
pub mod interpreter;

pub use ci::{BuildRequest, CiEffect, CiResponse};
pub use github::{CommentData, CommitState, GitHubEffect, GitHubResponse};
pub use index::{IndexEffect, IndexResponse};
pub use interpreter::{CiInterpreter, GitHubInterpreter, IndexInterpreter};
