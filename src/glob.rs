//! Weighted filename glob patterns.
//!
//! Shared-mime-info declares filename associations as shell globs with an
//! integer weight in [0, 100]. Each glob is translated once, at construction,
//! into an anchored regex with exact-match semantics.

use crate::error::{Error, Result};
use regex::Regex;

/// Weight at which a glob match wins outright and file contents are not read.
pub const MAX_WEIGHT: u32 = 100;

/// Weight assumed when a `<glob>` element carries no `weight` attribute.
pub const DEFAULT_WEIGHT: u32 = 50;

/// A filename pattern with a matching weight.
///
/// The pattern keeps its original glob text (used for filter captions and for
/// the user-modified-types blob) alongside the compiled regex.
#[derive(Debug, Clone)]
pub struct MimeGlobPattern {
    glob: String,
    regex: Regex,
    weight: u32,
}

impl MimeGlobPattern {
    /// Compiles a shell glob into an anchored pattern at the given weight.
    ///
    /// Translation: `*` becomes `.*`, `?` becomes `.`, character classes pass
    /// through, every other regex metacharacter is escaped so globs like
    /// `*.c++` stay literal.
    ///
    /// # Examples
    ///
    /// ```
    /// use mime_info::{MimeGlobPattern, DEFAULT_WEIGHT};
    ///
    /// let glob = MimeGlobPattern::new("*.png", DEFAULT_WEIGHT).unwrap();
    /// assert!(glob.matches("shot.png"));
    /// assert!(!glob.matches("shot.png.bak"));
    /// ```
    pub fn new(glob: &str, weight: u32) -> Result<Self> {
        let regex = Regex::new(&glob_to_regex(glob))
            .map_err(|e| Error::Parse(format!("invalid glob pattern {:?}: {}", glob, e)))?;
        Ok(Self {
            glob: glob.to_string(),
            regex,
            weight,
        })
    }

    /// The original glob text, e.g. `*.png`.
    pub fn glob(&self) -> &str {
        &self.glob
    }

    /// The compiled anchored regex.
    pub fn regex(&self) -> &Regex {
        &self.regex
    }

    pub fn weight(&self) -> u32 {
        self.weight
    }

    /// Exact-match test against a file name.
    pub fn matches(&self, name: &str) -> bool {
        self.regex.is_match(name)
    }
}

/// Translates a shell glob to an anchored regex source string.
fn glob_to_regex(glob: &str) -> String {
    let mut out = String::with_capacity(glob.len() + 8);
    out.push_str("^(?:");
    for c in glob.chars() {
        match c {
            '*' => out.push_str(".*"),
            '?' => out.push('.'),
            // Character classes are valid in both glob and regex syntax.
            '[' | ']' => out.push(c),
            '.' | '+' | '(' | ')' | '{' | '}' | '^' | '$' | '|' | '\\' => {
                out.push('\\');
                out.push(c);
            }
            _ => out.push(c),
        }
    }
    out.push_str(")$");
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_suffix_glob() {
        let glob = MimeGlobPattern::new("*.txt", DEFAULT_WEIGHT).unwrap();
        assert!(glob.matches("notes.txt"));
        assert!(glob.matches(".txt"));
        assert!(!glob.matches("notes.txt~"));
        assert!(!glob.matches("txt"));
        assert_eq!(glob.weight(), DEFAULT_WEIGHT);
    }

    #[test]
    fn test_question_mark() {
        let glob = MimeGlobPattern::new("README?", 80).unwrap();
        assert!(glob.matches("README1"));
        assert!(!glob.matches("README"));
        assert!(!glob.matches("README12"));
    }

    #[test]
    fn test_literal_name() {
        let glob = MimeGlobPattern::new("Makefile", MAX_WEIGHT).unwrap();
        assert!(glob.matches("Makefile"));
        assert!(!glob.matches("Makefile.am"));
    }

    #[test]
    fn test_metacharacters_stay_literal() {
        let glob = MimeGlobPattern::new("*.c++", DEFAULT_WEIGHT).unwrap();
        assert!(glob.matches("vector.c++"));
        assert!(!glob.matches("vector.cxx"));

        let glob = MimeGlobPattern::new("*.tar.gz", DEFAULT_WEIGHT).unwrap();
        assert!(glob.matches("backup.tar.gz"));
        assert!(!glob.matches("backup.tarxgz"));
    }

    #[test]
    fn test_character_class() {
        let glob = MimeGlobPattern::new("*.log[1-9]", DEFAULT_WEIGHT).unwrap();
        assert!(glob.matches("daemon.log3"));
        assert!(!glob.matches("daemon.log"));
    }
}
