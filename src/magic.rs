//! Content-based magic matching.
//!
//! A [`MagicRule`] is a typed predicate over a byte buffer: what to look for
//! and the inclusive offset range where to look. Rules come in string, byte
//! sequence, and 16/32-bit integer flavors, the integers in big, little, or
//! host byte order. A [`MagicRuleMatcher`] is an ordered conjunction of rules
//! with a priority in [0, 100].
//!
//! Two further matcher implementations cover content with no declared magic:
//! a text heuristic and a binary fallback. All three are used through the
//! [`MagicMatcher`] trait and shared between types via `Arc`.

use crate::error::{Error, Result};
use std::fmt;
use std::sync::Arc;
use tracing::warn;

/// Matchers below this priority are still stored; callers may filter them.
pub const MIN_MATCH_WEIGHT: u32 = 50;

const TEXT_HEURISTIC_PRIORITY: u32 = 2;
const BINARY_FALLBACK_PRIORITY: u32 = 1;

/// The wire tag alphabet for magic rule types, case-sensitive.
const TYPE_TAGS: &[(&str, MagicRuleType)] = &[
    ("unknown", MagicRuleType::Unknown),
    ("string", MagicRuleType::String),
    ("byte", MagicRuleType::Byte),
    ("big16", MagicRuleType::Big16),
    ("big32", MagicRuleType::Big32),
    ("little16", MagicRuleType::Little16),
    ("little32", MagicRuleType::Little32),
    ("host16", MagicRuleType::Host16),
    ("host32", MagicRuleType::Host32),
];

/// The kind of comparison a magic rule performs.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MagicRuleType {
    /// Unrecognized tag; the rule never matches.
    Unknown,
    String,
    Byte,
    Big16,
    Big32,
    Little16,
    Little32,
    /// Treated as big-endian on input, matching the historical behavior of
    /// the definition files this library consumes.
    Host16,
    Host32,
}

impl MagicRuleType {
    /// Resolves a wire tag (e.g. `"little32"`). Unrecognized tags map to
    /// [`MagicRuleType::Unknown`].
    pub fn from_tag(tag: &str) -> Self {
        TYPE_TAGS
            .iter()
            .find(|(t, _)| *t == tag)
            .map(|(_, ty)| *ty)
            .unwrap_or(MagicRuleType::Unknown)
    }

    /// The wire tag for this type.
    pub fn tag(self) -> &'static str {
        TYPE_TAGS
            .iter()
            .find(|(_, ty)| *ty == self)
            .map(|(t, _)| *t)
            .expect("every rule type has a tag")
    }
}

/// The normalized comparand, ready for direct comparison against the buffer.
///
/// Numeric values are stored in host byte order after endianness correction,
/// so their native byte representation equals the bytes expected in the
/// buffer and unaligned windows can be compared directly.
#[derive(Debug, Clone)]
enum Comparand {
    /// Unknown rule type or failed numeric parse; never matches.
    None,
    Pattern(Vec<u8>),
    Bytes(Vec<u8>),
    U16(u16),
    U32(u32),
}

/// One typed byte-pattern predicate over an offset range.
///
/// The search window is the inclusive position range `[start_pos, end_pos]`
/// in the candidate buffer. Construction normalizes the textual value into
/// its wire form; values that fail to parse neutralize the rule (it is kept
/// but never matches) and report to the diagnostic sink.
#[derive(Debug, Clone)]
pub struct MagicRule {
    rule_type: MagicRuleType,
    value: String,
    start_pos: usize,
    end_pos: usize,
    comparand: Comparand,
}

impl MagicRule {
    /// Builds a rule from its wire components.
    ///
    /// - `String` values are matched as their UTF-8 bytes.
    /// - `Byte` values are a `\`-separated list of hex byte literals, e.g.
    ///   `\0x7f\0x45\0x4c\0x46`. Any unparsable token clears the list.
    /// - Numeric values are parsed with auto radix (`0x` hex, leading `0`
    ///   octal, else decimal) and pre-swapped per the rule type.
    pub fn new(rule_type: MagicRuleType, value: &str, start_pos: usize, end_pos: usize) -> Self {
        let comparand = match rule_type {
            MagicRuleType::Unknown => Comparand::None,
            MagicRuleType::String => Comparand::Pattern(value.as_bytes().to_vec()),
            MagicRuleType::Byte => match parse_byte_sequence(value) {
                Some(bytes) => Comparand::Bytes(bytes),
                None => {
                    warn!("invalid byte sequence {:?} in magic rule", value);
                    Comparand::Bytes(Vec::new())
                }
            },
            MagicRuleType::Big16 | MagicRuleType::Host16 => match parse_uint(value) {
                Some(v) => Comparand::U16(u16::from_ne_bytes((v as u16).to_be_bytes())),
                None => numeric_parse_failure(value),
            },
            MagicRuleType::Little16 => match parse_uint(value) {
                Some(v) => Comparand::U16(u16::from_ne_bytes((v as u16).to_le_bytes())),
                None => numeric_parse_failure(value),
            },
            MagicRuleType::Big32 | MagicRuleType::Host32 => match parse_uint(value) {
                Some(v) => Comparand::U32(u32::from_ne_bytes(v.to_be_bytes())),
                None => numeric_parse_failure(value),
            },
            MagicRuleType::Little32 => match parse_uint(value) {
                Some(v) => Comparand::U32(u32::from_ne_bytes(v.to_le_bytes())),
                None => numeric_parse_failure(value),
            },
        };

        Self {
            rule_type,
            value: value.to_string(),
            start_pos,
            end_pos,
            comparand,
        }
    }

    pub fn rule_type(&self) -> MagicRuleType {
        self.rule_type
    }

    /// The original textual value, as it appeared in the definition.
    pub fn value(&self) -> &str {
        &self.value
    }

    pub fn start_pos(&self) -> usize {
        self.start_pos
    }

    pub fn end_pos(&self) -> usize {
        self.end_pos
    }

    /// Evaluates the rule against a buffer.
    ///
    /// An empty buffer never matches, and neither does a window starting at
    /// or beyond the end of the data.
    pub fn matches(&self, data: &[u8]) -> bool {
        if data.is_empty() || self.start_pos >= data.len() {
            return false;
        }
        match &self.comparand {
            Comparand::None => false,
            Comparand::Pattern(pattern) => self.match_pattern(pattern, data),
            Comparand::Bytes(bytes) => self.match_bytes(bytes, data),
            Comparand::U16(v) => self.match_number(&v.to_ne_bytes(), data),
            Comparand::U32(v) => self.match_number(&v.to_ne_bytes(), data),
        }
    }

    /// Substring search in `data[start_pos .. min(len, end_pos + len(pattern))]`.
    fn match_pattern(&self, pattern: &[u8], data: &[u8]) -> bool {
        if pattern.is_empty() || self.start_pos + pattern.len() > data.len() {
            return false;
        }
        // Most common case: some string at position 0.
        if self.start_pos == 0 && self.end_pos == 0 {
            return data.starts_with(pattern);
        }
        let window_end = (self.end_pos + pattern.len()).min(data.len());
        data[self.start_pos..window_end]
            .windows(pattern.len())
            .any(|w| w == pattern)
    }

    /// Inclusive sliding compare; stops once the sequence no longer fits.
    fn match_bytes(&self, bytes: &[u8], data: &[u8]) -> bool {
        if bytes.is_empty() {
            return false;
        }
        for start in self.start_pos..=self.end_pos {
            if start + bytes.len() > data.len() {
                return false;
            }
            if &data[start..start + bytes.len()] == bytes {
                return true;
            }
        }
        false
    }

    /// Byte-by-byte scan comparing an unaligned 16/32-bit window against the
    /// pre-swapped comparand. The scan ends at `min(len - width, end_pos)`
    /// inclusive.
    fn match_number(&self, needle: &[u8], data: &[u8]) -> bool {
        let width = needle.len();
        if data.len() < width {
            return false;
        }
        let last = (data.len() - width).min(self.end_pos);
        if self.start_pos > last {
            return false;
        }
        for pos in self.start_pos..=last {
            if &data[pos..pos + width] == needle {
                return true;
            }
        }
        false
    }

    /// Serializes an offset range as `"<start>:<end>"`.
    pub fn to_offset((start, end): (usize, usize)) -> String {
        format!("{}:{}", start, end)
    }

    /// Parses `"<start>:<end>"`; exactly one `:` is required.
    pub fn from_offset(offset: &str) -> Result<(usize, usize)> {
        let mut parts = offset.split(':');
        match (parts.next(), parts.next(), parts.next()) {
            (Some(start), Some(end), None) => {
                let start = start
                    .parse::<usize>()
                    .map_err(|_| Error::Parse(format!("invalid offset {:?}", offset)))?;
                let end = end
                    .parse::<usize>()
                    .map_err(|_| Error::Parse(format!("invalid offset {:?}", offset)))?;
                Ok((start, end))
            }
            _ => Err(Error::Parse(format!("invalid offset {:?}", offset))),
        }
    }
}

fn numeric_parse_failure(value: &str) -> Comparand {
    warn!("cannot convert {:?} to an integer magic comparand", value);
    Comparand::None
}

/// Parses `\`-separated hex byte literals; `0x7f`, `0X7F` and `7f` are all
/// accepted. Returns `None` on the first unparsable token.
fn parse_byte_sequence(value: &str) -> Option<Vec<u8>> {
    let mut bytes = Vec::new();
    for token in value.split('\\').filter(|t| !t.is_empty()) {
        let digits = token
            .strip_prefix("0x")
            .or_else(|| token.strip_prefix("0X"))
            .unwrap_or(token);
        bytes.push(u8::from_str_radix(digits, 16).ok()?);
    }
    Some(bytes)
}

/// Parses an unsigned integer with auto radix: `0x` prefix is hex, a leading
/// `0` is octal, anything else decimal.
fn parse_uint(value: &str) -> Option<u32> {
    if let Some(hex) = value.strip_prefix("0x").or_else(|| value.strip_prefix("0X")) {
        u32::from_str_radix(hex, 16).ok()
    } else if value.len() > 1 && value.starts_with('0') {
        u32::from_str_radix(&value[1..], 8).ok()
    } else {
        value.parse().ok()
    }
}

/// Discriminates the fixed set of matcher implementations, replacing a
/// runtime downcast when the rule-based subset has to be extracted.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MatcherKind {
    /// Declarative magic rules from the definition files.
    Rules,
    /// Text-content heuristic.
    HeuristicText,
    /// Always-matching binary fallback.
    Binary,
}

/// Capability for content-based matching, shared between MIME types.
pub trait MagicMatcher: fmt::Debug + Send + Sync {
    fn kind(&self) -> MatcherKind;
    fn matches(&self, data: &[u8]) -> bool;
    /// Priority reported into the weighted competition, in [0, 100].
    fn priority(&self) -> u32;

    /// Access to the concrete rule-based matcher, when that is what this is.
    fn as_rule_matcher(&self) -> Option<&MagicRuleMatcher> {
        None
    }
}

/// Shared handle to a matcher; a matcher lives as long as the longest-holding
/// type and is immutable after construction.
pub type SharedMagicMatcher = Arc<dyn MagicMatcher>;

/// An ordered conjunction of magic rules with a priority.
#[derive(Debug, Clone)]
pub struct MagicRuleMatcher {
    rules: Vec<MagicRule>,
    priority: u32,
}

impl MagicRuleMatcher {
    pub fn new(rules: Vec<MagicRule>, priority: u32) -> Self {
        Self { rules, priority }
    }

    pub fn rules(&self) -> &[MagicRule] {
        &self.rules
    }
}

impl MagicMatcher for MagicRuleMatcher {
    fn kind(&self) -> MatcherKind {
        MatcherKind::Rules
    }

    /// All rules must match; an empty rule list matches nothing.
    fn matches(&self, data: &[u8]) -> bool {
        !self.rules.is_empty() && self.rules.iter().all(|r| r.matches(data))
    }

    fn priority(&self) -> u32 {
        self.priority
    }

    fn as_rule_matcher(&self) -> Option<&MagicRuleMatcher> {
        Some(self)
    }
}

/// Declares content text if no byte below 0x20 falls outside the whitespace
/// whitelist `{\t, \n, \r, \f}`.
pub fn is_text_file(data: &[u8]) -> bool {
    data.iter()
        .all(|&b| b >= 0x20 || matches!(b, b'\t' | b'\n' | b'\r' | 0x0c))
}

/// Content matcher for text-like data, backing the built-in `text/plain`
/// fallback entry. Its priority sits below every declared magic rule so real
/// magic always wins, but above the binary fallback.
#[derive(Debug, Clone, Default)]
pub struct HeuristicTextMatcher;

impl MagicMatcher for HeuristicTextMatcher {
    fn kind(&self) -> MatcherKind {
        MatcherKind::HeuristicText
    }

    fn matches(&self, data: &[u8]) -> bool {
        is_text_file(data)
    }

    fn priority(&self) -> u32 {
        TEXT_HEURISTIC_PRIORITY
    }
}

/// Always-matching fallback backing `application/octet-stream`.
#[derive(Debug, Clone, Default)]
pub struct BinaryMatcher;

impl MagicMatcher for BinaryMatcher {
    fn kind(&self) -> MatcherKind {
        MatcherKind::Binary
    }

    fn matches(&self, _data: &[u8]) -> bool {
        true
    }

    fn priority(&self) -> u32 {
        BINARY_FALLBACK_PRIORITY
    }
}
