//! Rule configuration.
//!
//! - [`rule`]: the `Rule` model and `resolve_rule` defaulting
//! - [`location`]: where rule files live (repository mappings, org-wide locators)
//! - [`cache`]: TTL cache with an injectable clock
//! - [`resolver`]: `RuleConfig::get_rules_for`

pub mod cache;
mod error;
pub mod location;
pub mod resolver;
pub mod rule;

pub use cache::{Clock, ManualClock, RULE_CACHE_TTL, SystemClock, TtlCache};
pub use error::RuleConfigError;
pub use location::{FileLocation, RepoMapping, RepoMappings, RuleSource};
pub use resolver::{RuleConfig, decode_content};
pub use rule::{
    DEFAULT_SKIP_CI_LABEL, DEFAULT_TRIGGER_COMMENT_REGEX, OneOrMany, Rule, RuleRecord, RulesFile,
    parse_rules_file, resolve_rule,
};
