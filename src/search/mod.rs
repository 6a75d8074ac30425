//! Build-result index adapter (Elasticsearch `_search` over ingested job documents).

mod client;
mod error;
mod query;

pub use client::{DEFAULT_JOBS_INDEX, SearchClient, SearchEndpoint};
pub use error::SearchError;
pub use query::build_jobs_query;
