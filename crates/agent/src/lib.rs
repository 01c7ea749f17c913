//! Intent extraction - natural language to transfer intents
//!
//! This crate is the boundary to the language-model collaborator:
//! - **Client contract** (`llm`) - the completion trait the service consumes
//! - **Extractor** (`extractor`) - prompt construction, response parsing,
//!   deterministic placeholder addresses, and the pattern-based fallback
//!
//! The extractor never lets an upstream model failure escape: a failed or
//! unparseable completion degrades to pattern extraction, and a query that
//! neither path can read is reported as "not a transaction" rather than as
//! an error.

pub mod extractor;
pub mod llm;

pub use extractor::IntentExtractor;
pub use llm::LlmClient;
