//! The MIME type record.
//!
//! A [`MimeType`] aggregates everything a definition file declares about one
//! type: canonical id, comments (with per-locale translations), aliases,
//! parent types, filename globs, and shared content matchers. It also derives
//! a suffix list and a preferred suffix from its glob patterns, and scores
//! itself against file names and content buffers.
//!
//! Records use plain value semantics; the database holds the authoritative
//! copy of each type.

use crate::glob::{MimeGlobPattern, MAX_WEIGHT};
use crate::magic::{MatcherKind, SharedMagicMatcher};
use crate::match_context::FileMatchContext;
use once_cell::sync::Lazy;
use regex::Regex;
use std::collections::HashMap;
use tracing::warn;

/// Matches globs of the shape `*.<word>`, the only shape that contributes a
/// suffix. Patterns like `Makefile` or `*.log[1-9]` match files but yield no
/// suffix.
static SUFFIX_PATTERN: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^\*\.[\w+]+$").expect("suffix pattern is valid")
});

/// Derives `"en"` from `LC_MESSAGES`/`LANG` values like `"en_US.UTF-8"`.
///
/// This is the default collaborator for comment localization; callers with
/// their own locale facility pass the tag to
/// [`MimeType::locale_comment`] directly.
pub fn system_locale() -> String {
    let raw = std::env::var("LC_MESSAGES")
        .or_else(|_| std::env::var("LANG"))
        .unwrap_or_default();
    let end = raw.find(['_', '.', '@']).unwrap_or(raw.len());
    raw[..end].to_string()
}

/// One MIME type from the database.
#[derive(Debug, Clone, Default)]
pub struct MimeType {
    type_name: String,
    comment: String,
    locale_comments: HashMap<String, String>,
    aliases: Vec<String>,
    glob_patterns: Vec<MimeGlobPattern>,
    sub_classes_of: Vec<String>,
    preferred_suffix: String,
    suffixes: Vec<String>,
    magic_matchers: Vec<SharedMagicMatcher>,
}

impl MimeType {
    /// A record with only the canonical id set.
    pub fn new(type_name: &str) -> Self {
        Self {
            type_name: type_name.to_string(),
            ..Self::default()
        }
    }

    /// A record is valid once it carries a canonical id. Lookups that miss
    /// return an invalid record rather than an error.
    pub fn is_valid(&self) -> bool {
        !self.type_name.is_empty()
    }

    /// True when the type has no `sub-class-of` parents.
    pub fn is_top_level(&self) -> bool {
        self.sub_classes_of.is_empty()
    }

    /// The canonical type id, e.g. `text/plain`.
    pub fn type_name(&self) -> &str {
        &self.type_name
    }

    pub fn set_type_name(&mut self, type_name: &str) {
        self.type_name = type_name.to_string();
    }

    pub fn comment(&self) -> &str {
        &self.comment
    }

    pub fn set_comment(&mut self, comment: &str) {
        self.comment = comment.to_string();
    }

    /// The comment localized for `locale` (a bare tag like `"de"`), falling
    /// back to the default comment.
    pub fn locale_comment(&self, locale: &str) -> &str {
        self.locale_comments
            .get(locale)
            .map(String::as_str)
            .unwrap_or(&self.comment)
    }

    pub fn set_locale_comment(&mut self, locale: &str, comment: &str) {
        self.locale_comments
            .insert(locale.to_string(), comment.to_string());
    }

    pub fn aliases(&self) -> &[String] {
        &self.aliases
    }

    pub fn set_aliases(&mut self, aliases: Vec<String>) {
        self.aliases = aliases;
    }

    pub fn sub_classes_of(&self) -> &[String] {
        &self.sub_classes_of
    }

    pub fn set_sub_classes_of(&mut self, parents: Vec<String>) {
        self.sub_classes_of = parents;
    }

    pub fn glob_patterns(&self) -> &[MimeGlobPattern] {
        &self.glob_patterns
    }

    /// Replaces the glob patterns and rebuilds the suffix list from scratch.
    ///
    /// Only patterns of the shape `*.<word>` contribute suffixes. The
    /// previously preferred suffix is kept if it is still available,
    /// otherwise the first derived suffix becomes preferred.
    pub fn set_glob_patterns(&mut self, patterns: Vec<MimeGlobPattern>) {
        self.glob_patterns = patterns;

        let old_preferred = std::mem::take(&mut self.preferred_suffix);
        self.suffixes.clear();
        let globs: Vec<String> = self
            .glob_patterns
            .iter()
            .map(|pattern| pattern.glob().to_string())
            .collect();
        for glob in globs {
            self.assign_suffix(glob);
        }
        if self.preferred_suffix != old_preferred && self.suffixes.contains(&old_preferred) {
            self.preferred_suffix = old_preferred;
        }
    }

    fn assign_suffix(&mut self, pattern: String) {
        if SUFFIX_PATTERN.is_match(&pattern) {
            let suffix = pattern[2..].to_string();
            if self.preferred_suffix.is_empty() {
                self.preferred_suffix = suffix.clone();
            }
            self.suffixes.push(suffix);
        }
    }

    /// Suffixes derived from the glob patterns, without leading dots.
    pub fn suffixes(&self) -> &[String] {
        &self.suffixes
    }

    pub fn preferred_suffix(&self) -> &str {
        &self.preferred_suffix
    }

    /// Sets the preferred suffix. Fails (and warns) when `suffix` is not one
    /// of the derived suffixes.
    pub fn set_preferred_suffix(&mut self, suffix: &str) -> bool {
        if !self.suffixes.iter().any(|s| s == suffix) {
            warn!(
                "{}: attempt to set preferred suffix to {:?}, not in the suffix list {:?}",
                self.type_name, suffix, self.suffixes
            );
            return false;
        }
        self.preferred_suffix = suffix.to_string();
        true
    }

    pub fn magic_matchers(&self) -> &[SharedMagicMatcher] {
        &self.magic_matchers
    }

    pub fn set_magic_matchers(&mut self, matchers: Vec<SharedMagicMatcher>) {
        self.magic_matchers = matchers;
    }

    pub fn add_magic_matcher(&mut self, matcher: SharedMagicMatcher) {
        self.magic_matchers.push(matcher);
    }

    /// The subset of matchers driven by declarative magic rules.
    pub fn magic_rule_matchers(&self) -> Vec<SharedMagicMatcher> {
        self.magic_matchers
            .iter()
            .filter(|m| m.kind() == MatcherKind::Rules)
            .cloned()
            .collect()
    }

    /// Replaces exactly the rule-based matchers, leaving heuristic matchers
    /// untouched.
    pub fn set_magic_rule_matchers(&mut self, matchers: Vec<SharedMagicMatcher>) {
        self.magic_matchers.retain(|m| m.kind() != MatcherKind::Rules);
        self.magic_matchers.extend(matchers);
    }

    /// True iff `type_name` is the canonical id or one of the aliases.
    pub fn matches_type(&self, type_name: &str) -> bool {
        self.type_name == type_name || self.aliases.iter().any(|a| a == type_name)
    }

    /// The highest weight among glob patterns that exact-match `name`, else 0.
    pub fn matches_file_by_suffix(&self, name: &str) -> u32 {
        self.glob_patterns
            .iter()
            .filter(|gp| gp.matches(name))
            .map(MimeGlobPattern::weight)
            .max()
            .unwrap_or(0)
    }

    /// The highest priority among magic matchers that match `data`; 0 on an
    /// empty buffer or an empty matcher list.
    pub fn matches_data(&self, data: &[u8]) -> u32 {
        let mut priority = 0;
        if !data.is_empty() {
            for matcher in &self.magic_matchers {
                let magic_priority = matcher.priority();
                if magic_priority > priority && matcher.matches(data) {
                    priority = magic_priority;
                }
            }
        }
        priority
    }

    /// Combined name/content score for one file.
    ///
    /// A glob match at full weight wins without the file contents ever being
    /// read; otherwise the better of the suffix and content priorities is
    /// reported. Content is also not read when the type has no matchers.
    pub async fn matches_file(&self, context: &mut FileMatchContext) -> u32 {
        let suffix_priority = self.matches_file_by_suffix(context.file_name());
        if suffix_priority >= MAX_WEIGHT {
            return suffix_priority;
        }
        suffix_priority.max(self.matches_file_by_content(context).await)
    }

    async fn matches_file_by_content(&self, context: &mut FileMatchContext) -> u32 {
        if self.magic_matchers.is_empty() {
            return 0;
        }
        self.matches_data(context.data().await)
    }

    /// Filter caption of the form `"<comment> (<glob1> <glob2> …)"`, or an
    /// empty string for types without globs.
    pub fn filter_string(&self) -> String {
        if self.glob_patterns.is_empty() {
            return String::new();
        }
        let globs: Vec<&str> = self.glob_patterns.iter().map(MimeGlobPattern::glob).collect();
        format!("{} ({})", self.comment, globs.join(" "))
    }
}
