//! Core domain types for the trigger bot.

pub mod build;
pub mod ids;
pub mod pr;

pub use build::{CiBuild, ReusableBuild};
pub use ids::{CommentId, DeliveryId, PrNumber, RepoId, Sha};
pub use pr::{BranchRef, ChangedFile, PrState, PullRequest};
