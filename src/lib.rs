//! MIME type identification following the shared-mime-info model.
//!
//! This crate provides a MIME type database built from declarative XML
//! definitions, meant to be embedded inside desktop and file-management
//! software:
//! - Filename matching through weighted glob patterns
//! - Content matching through typed magic rules (strings, byte sequences,
//!   16/32-bit integers in several endiannesses)
//! - A type hierarchy (`sub-class-of`) where deeper, more specific types win
//!   ties, plus alias resolution
//! - Streaming ingestion of shared-mime-info XML packages
//! - Persistence of user-modified type definitions
//!
//! All file I/O is async-first using tokio; in-memory lookups stay
//! synchronous.

pub mod database;
pub mod error;
pub mod glob;
pub mod magic;
pub mod match_context;
pub mod mime_type;

mod parser;
mod platform;

// Re-export commonly used types
pub use database::{MimeDatabase, DANGLING};
pub use error::{Error, Result};
pub use glob::{MimeGlobPattern, DEFAULT_WEIGHT, MAX_WEIGHT};
pub use magic::{
    is_text_file, BinaryMatcher, HeuristicTextMatcher, MagicMatcher, MagicRule, MagicRuleMatcher,
    MagicRuleType, MatcherKind, SharedMagicMatcher, MIN_MATCH_WEIGHT,
};
pub use match_context::{FileMatchContext, MAX_DATA};
pub use mime_type::{system_locale, MimeType};
