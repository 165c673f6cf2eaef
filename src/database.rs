//! The MIME type database.
//!
//! A registry of [`MimeType`] records keyed by canonical id, with an alias
//! map, a parent→children relation derived from `sub-class-of` declarations,
//! and a computed hierarchy level per type. Deeper types are more specific
//! and win ties during lookups.
//!
//! All state lives behind a single mutex. Lookups that touch the filesystem
//! snapshot the candidate list under the lock and do their I/O outside it.

use crate::error::Result;
use crate::glob::{MimeGlobPattern, MAX_WEIGHT};
use crate::magic::{
    is_text_file, BinaryMatcher, HeuristicTextMatcher, MagicMatcher, MagicRule, MagicRuleMatcher,
    MagicRuleType, SharedMagicMatcher,
};
use crate::match_context::FileMatchContext;
use crate::mime_type::MimeType;
use crate::parser;
use serde::{Deserialize, Serialize};
use std::collections::hash_map::Entry;
use std::collections::{HashMap, HashSet};
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use tokio::io::{AsyncBufRead, BufReader};
use tracing::warn;

/// Sentinel level for an entry not yet visited by the level computation.
pub const DANGLING: i32 = 32767;

const TEXT_PLAIN: &str = "text/plain";
const OCTET_STREAM: &str = "application/octet-stream";

/// Entry of the type map: a record, its hierarchy level, and its insertion
/// rank (the documented last-resort tie-break).
#[derive(Debug, Clone)]
struct MimeMapEntry {
    mime_type: MimeType,
    level: i32,
    order: u64,
}

#[derive(Debug, Default)]
struct Inner {
    type_map: HashMap<String, MimeMapEntry>,
    alias_map: HashMap<String, String>,
    parent_children: HashMap<String, Vec<String>>,
    max_level: i32,
    levels_dirty: bool,
    next_order: u64,
    modified_types: HashSet<String>,
    modified_types_path: Option<PathBuf>,
}

impl Inner {
    fn resolve_alias(&self, name: &str) -> String {
        self.alias_map
            .get(name)
            .cloned()
            .unwrap_or_else(|| name.to_string())
    }

    /// Installs a new entry at [`DANGLING`], recording its aliases and its
    /// parent→child pairs, or merges into an existing one by replacing its
    /// record while preserving level, insertion rank, and the relations
    /// recorded at first insert.
    fn add_mime_type(&mut self, mime_type: MimeType) -> bool {
        if mime_type.type_name().is_empty() {
            return false;
        }
        let canonical = self.resolve_alias(mime_type.type_name());

        match self.type_map.entry(canonical.clone()) {
            Entry::Occupied(mut entry) => {
                entry.get_mut().mime_type = mime_type;
            }
            Entry::Vacant(entry) => {
                for alias in mime_type.aliases() {
                    self.alias_map.insert(alias.clone(), canonical.clone());
                }
                for parent in mime_type.sub_classes_of() {
                    let children = self.parent_children.entry(parent.clone()).or_default();
                    if !children.contains(&canonical) {
                        children.push(canonical.clone());
                    }
                }
                entry.insert(MimeMapEntry {
                    mime_type,
                    level: DANGLING,
                    order: self.next_order,
                });
                self.next_order += 1;
            }
        }
        self.levels_dirty = true;
        true
    }

    fn ensure_levels(&mut self) {
        if self.levels_dirty {
            self.determine_levels();
        }
    }

    /// Resets every entry to [`DANGLING`], then raises levels by walking the
    /// parent→children relation depth-first from every entry. Idempotent.
    fn determine_levels(&mut self) {
        for entry in self.type_map.values_mut() {
            entry.level = DANGLING;
        }
        self.max_level = 0;

        let ids: Vec<String> = self.type_map.keys().cloned().collect();
        for id in ids {
            self.raise_level_recursion(&id, 0, &mut Vec::new());
        }
        self.levels_dirty = false;
    }

    fn raise_level_recursion(&mut self, id: &str, level: i32, path: &mut Vec<String>) {
        if path.iter().any(|seen| seen == id) {
            warn!("cycle in the sub-class-of hierarchy at {:?}", id);
            return;
        }
        if let Some(entry) = self.type_map.get_mut(id) {
            if entry.level == DANGLING || entry.level < level {
                entry.level = level;
                if level > self.max_level {
                    self.max_level = level;
                }
            }
        }
        path.push(id.to_string());
        if let Some(children) = self.parent_children.get(id) {
            for child in children.clone() {
                self.raise_level_recursion(&child, level + 1, path);
            }
        }
        path.pop();
    }

    /// Entries deepest level first, insertion order within a level.
    fn sorted_entries(&self) -> Vec<&MimeMapEntry> {
        let mut entries: Vec<&MimeMapEntry> = self.type_map.values().collect();
        entries.sort_by_key(|e| (std::cmp::Reverse(e.level), e.order));
        entries
    }

    /// Candidate records, deepest level first, insertion order within a level.
    fn sorted_candidates(&self) -> Vec<MimeType> {
        self.sorted_entries()
            .iter()
            .map(|e| e.mime_type.clone())
            .collect()
    }
}

/// The MIME type database.
///
/// A fresh database holds two built-in fallback types: `text/plain` backed by
/// the text-content heuristic, and `application/octet-stream` backed by the
/// always-matching binary fallback. Definition files are layered on top with
/// [`add_mime_types`](MimeDatabase::add_mime_types).
///
/// Safe for concurrent lookup and ingestion from multiple threads.
///
/// # Examples
///
/// ```
/// use mime_info::MimeDatabase;
///
/// # async fn example() -> mime_info::Result<()> {
/// let db = MimeDatabase::new();
/// db.add_mime_types(
///     r#"<mime-info>
///          <mime-type type="image/png">
///            <glob pattern="*.png"/>
///          </mime-type>
///        </mime-info>"#
///         .as_bytes(),
/// )
/// .await?;
///
/// let (mime_type, priority) = db.find_by_name("shot.png");
/// assert_eq!(mime_type.type_name(), "image/png");
/// assert_eq!(priority, 50);
/// # Ok(())
/// # }
/// ```
#[derive(Debug)]
pub struct MimeDatabase {
    inner: Mutex<Inner>,
}

impl Default for MimeDatabase {
    fn default() -> Self {
        Self::new()
    }
}

impl MimeDatabase {
    /// A database seeded with the built-in fallback types.
    pub fn new() -> Self {
        let mut inner = Inner::default();

        let mut text = MimeType::new(TEXT_PLAIN);
        text.set_comment("Plain text document");
        text.add_magic_matcher(Arc::new(HeuristicTextMatcher));
        inner.add_mime_type(text);

        let mut binary = MimeType::new(OCTET_STREAM);
        binary.set_comment("Unknown binary data");
        binary.add_magic_matcher(Arc::new(BinaryMatcher));
        inner.add_mime_type(binary);

        Self {
            inner: Mutex::new(inner),
        }
    }

    /// Adds or merges a single type record. Returns false only when the
    /// record carries no canonical id.
    pub fn add_mime_type(&self, mime_type: MimeType) -> bool {
        self.inner.lock().unwrap().add_mime_type(mime_type)
    }

    /// Ingests a shared-mime-info XML document from an async source.
    ///
    /// The event pump runs without the database lock; completed records are
    /// ingested in one batch and hierarchy levels recomputed. The first
    /// parser error aborts the ingestion.
    pub async fn add_mime_types<R>(&self, source: R) -> Result<()>
    where
        R: AsyncBufRead + Unpin,
    {
        self.add_mime_types_named(source, "<mime data>").await
    }

    /// Ingests a definition file from disk.
    pub async fn add_mime_types_file(&self, path: impl AsRef<Path>) -> Result<()> {
        let path = path.as_ref();
        let file = tokio::fs::File::open(path).await?;
        self.add_mime_types_named(BufReader::new(file), &path.display().to_string())
            .await
    }

    async fn add_mime_types_named<R>(&self, source: R, source_name: &str) -> Result<()>
    where
        R: AsyncBufRead + Unpin,
    {
        let mut types = Vec::new();
        parser::parse_mime_info(source, source_name, &mut |t| {
            types.push(t);
            Ok(())
        })
        .await?;

        let mut inner = self.inner.lock().unwrap();
        for t in types {
            inner.add_mime_type(t);
        }
        inner.determine_levels();
        Ok(())
    }

    /// Returns the stored record for a type id or one of its aliases. A miss
    /// yields an invalid record, not an error.
    pub fn find_by_type(&self, type_or_alias: &str) -> MimeType {
        let inner = self.inner.lock().unwrap();
        let canonical = inner.resolve_alias(type_or_alias);
        inner
            .type_map
            .get(&canonical)
            .map(|e| e.mime_type.clone())
            .unwrap_or_default()
    }

    /// Finds the best type for a file name alone.
    ///
    /// Candidates are scored by their glob weights; the deepest type wins a
    /// priority tie. Returns an invalid record with priority 0 on a miss.
    pub fn find_by_name(&self, name: &str) -> (MimeType, u32) {
        let mut inner = self.inner.lock().unwrap();
        inner.ensure_levels();

        let mut best = MimeType::default();
        let mut best_priority = 0;
        for entry in inner.sorted_entries() {
            let priority = entry.mime_type.matches_file_by_suffix(name);
            if priority > best_priority {
                best_priority = priority;
                best = entry.mime_type.clone();
            }
        }
        (best, best_priority)
    }

    /// Finds the best type for a content buffer.
    ///
    /// Text-like (or empty) content starts from the built-in `text/plain`
    /// entry as a floor, so plain text never loses to the binary fallback;
    /// declared magic with a higher priority still wins.
    pub fn find_by_data(&self, data: &[u8]) -> (MimeType, u32) {
        let mut inner = self.inner.lock().unwrap();
        inner.ensure_levels();

        let mut best = MimeType::default();
        let mut best_priority = 0;
        if data.is_empty() || is_text_file(data) {
            if let Some(entry) = inner.type_map.get(TEXT_PLAIN) {
                best = entry.mime_type.clone();
                best_priority = entry.mime_type.matches_data(data);
            }
        }

        for entry in inner.sorted_entries() {
            let priority = entry.mime_type.matches_data(data);
            if priority > best_priority {
                best_priority = priority;
                best = entry.mime_type.clone();
            }
        }
        (best, best_priority)
    }

    /// Finds the best type for a file, combining name and content matching.
    ///
    /// The file prefix is read lazily, at most once, and not at all when a
    /// glob match at full weight already decided the answer. An unreadable
    /// file falls back to name-based matching without error.
    pub async fn find_by_file(&self, path: impl AsRef<Path>) -> (MimeType, u32) {
        let candidates = {
            let mut inner = self.inner.lock().unwrap();
            inner.ensure_levels();
            inner.sorted_candidates()
        };

        let mut context = FileMatchContext::new(path);
        self.find_by_context(&mut context, candidates).await
    }

    /// Like [`find_by_file`](MimeDatabase::find_by_file) for data the caller
    /// already holds, e.g. a download matched before it reaches disk.
    pub async fn find_by_file_content(&self, name: &str, data: &[u8]) -> (MimeType, u32) {
        let candidates = {
            let mut inner = self.inner.lock().unwrap();
            inner.ensure_levels();
            inner.sorted_candidates()
        };

        let mut context = FileMatchContext::from_bytes(name, data);
        self.find_by_context(&mut context, candidates).await
    }

    async fn find_by_context(
        &self,
        context: &mut FileMatchContext,
        candidates: Vec<MimeType>,
    ) -> (MimeType, u32) {
        let mut best = MimeType::default();
        let mut best_priority = 0;
        for candidate in candidates {
            let priority = candidate.matches_file(context).await;
            if priority > best_priority {
                best_priority = priority;
                best = candidate;
                // Candidates are ordered deepest-first and priorities are
                // capped, so nothing later can beat a full-weight match.
                if best_priority >= MAX_WEIGHT {
                    break;
                }
            }
        }
        (best, best_priority)
    }

    /// All stored records, deepest level first.
    pub fn mime_types(&self) -> Vec<MimeType> {
        let mut inner = self.inner.lock().unwrap();
        inner.ensure_levels();
        inner.sorted_candidates()
    }

    /// Per-type filter captions `"<comment> (<glob1> <glob2> …)"`, skipping
    /// types without globs.
    pub fn filter_strings(&self) -> Vec<String> {
        self.mime_types()
            .iter()
            .map(MimeType::filter_string)
            .filter(|s| !s.is_empty())
            .collect()
    }

    /// The union of all suffix lists, deduplicated, in registry order.
    pub fn suffixes(&self) -> Vec<String> {
        let mut seen = HashSet::new();
        let mut suffixes = Vec::new();
        for t in self.mime_types() {
            for suffix in t.suffixes() {
                if seen.insert(suffix.clone()) {
                    suffixes.push(suffix.clone());
                }
            }
        }
        suffixes
    }

    /// All glob patterns across all types.
    pub fn glob_patterns(&self) -> Vec<MimeGlobPattern> {
        self.mime_types()
            .iter()
            .flat_map(|t| t.glob_patterns().iter().cloned())
            .collect()
    }

    /// Sets the preferred suffix of a type (or alias). Returns false when the
    /// type is unknown or the suffix is not in its suffix list.
    pub fn set_preferred_suffix(&self, type_or_alias: &str, suffix: &str) -> bool {
        let mut inner = self.inner.lock().unwrap();
        let canonical = inner.resolve_alias(type_or_alias);
        let Some(entry) = inner.type_map.get_mut(&canonical) else {
            warn!("cannot set preferred suffix of unknown type {:?}", type_or_alias);
            return false;
        };
        if entry.mime_type.set_preferred_suffix(suffix) {
            inner.modified_types.insert(canonical);
            true
        } else {
            false
        }
    }

    /// Replaces the glob patterns of a type (or alias).
    pub fn set_glob_patterns(&self, type_or_alias: &str, patterns: Vec<MimeGlobPattern>) {
        let mut inner = self.inner.lock().unwrap();
        let canonical = inner.resolve_alias(type_or_alias);
        match inner.type_map.get_mut(&canonical) {
            Some(entry) => {
                entry.mime_type.set_glob_patterns(patterns);
                inner.modified_types.insert(canonical);
            }
            None => warn!("cannot set glob patterns of unknown type {:?}", type_or_alias),
        }
    }

    /// Replaces the rule-based magic matchers of a type (or alias), leaving
    /// heuristic matchers in place.
    pub fn set_magic_matchers(&self, type_or_alias: &str, matchers: Vec<SharedMagicMatcher>) {
        let mut inner = self.inner.lock().unwrap();
        let canonical = inner.resolve_alias(type_or_alias);
        match inner.type_map.get_mut(&canonical) {
            Some(entry) => {
                entry.mime_type.set_magic_rule_matchers(matchers);
                inner.modified_types.insert(canonical);
            }
            None => warn!("cannot set magic matchers of unknown type {:?}", type_or_alias),
        }
    }

    /// Builds weighted glob patterns from raw pattern text.
    pub fn to_glob_patterns(patterns: &[String], weight: u32) -> Result<Vec<MimeGlobPattern>> {
        patterns
            .iter()
            .map(|p| MimeGlobPattern::new(p, weight))
            .collect()
    }

    /// The raw pattern text of a glob pattern list.
    pub fn from_glob_patterns(patterns: &[MimeGlobPattern]) -> Vec<String> {
        patterns.iter().map(|p| p.glob().to_string()).collect()
    }

    /// Content heuristic used as the tie-breaker by
    /// [`find_by_data`](MimeDatabase::find_by_data): text is content with no
    /// control byte below 0x20 outside `{\t, \n, \r, \f}`.
    pub fn is_text_file(data: &[u8]) -> bool {
        is_text_file(data)
    }

    /// Loads the system shared-mime-info definitions, scanning the standard
    /// package directories. A no-op on platforms without them.
    pub async fn load_system_definitions(&self) -> Result<()> {
        crate::platform::load_system_definitions(self).await
    }

    /// Sets the location of the user-modified-types blob.
    pub fn set_modified_types_path(&self, path: impl Into<PathBuf>) {
        self.inner.lock().unwrap().modified_types_path = Some(path.into());
    }

    /// Reads a user-modified-types blob. A missing file yields an empty list.
    pub async fn read_user_modified_mime_types(path: impl AsRef<Path>) -> Result<Vec<MimeType>> {
        let bytes = match tokio::fs::read(path).await {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(e.into()),
        };
        let stored: Vec<StoredMimeType> = serde_json::from_slice(&bytes)?;
        stored.into_iter().map(StoredMimeType::into_mime_type).collect()
    }

    /// Writes a user-modified-types blob atomically (temp file + rename).
    pub async fn write_user_modified_mime_types(
        path: impl AsRef<Path>,
        types: &[MimeType],
    ) -> Result<()> {
        let path = path.as_ref();
        let stored: Vec<StoredMimeType> = types.iter().map(StoredMimeType::from_mime_type).collect();
        let json = serde_json::to_vec_pretty(&stored)?;

        let mut tmp = path.as_os_str().to_owned();
        tmp.push(".tmp");
        let tmp = PathBuf::from(tmp);
        tokio::fs::write(&tmp, &json).await?;
        tokio::fs::rename(&tmp, path).await?;
        Ok(())
    }

    /// Merges user overrides on top of the base database. The merged types
    /// stay in the modified set, so a later sync writes them back out.
    pub fn apply_user_modified_mime_types(&self, types: Vec<MimeType>) {
        let mut inner = self.inner.lock().unwrap();
        for t in types {
            let canonical = inner.resolve_alias(t.type_name());
            if inner.add_mime_type(t) {
                inner.modified_types.insert(canonical);
            }
        }
    }

    /// Snapshots the types changed through the mutating entry points into the
    /// configured blob. A no-op when no blob location is configured.
    pub async fn sync_user_modified_mime_types(&self) -> Result<()> {
        let (path, modified) = {
            let inner = self.inner.lock().unwrap();
            let Some(path) = inner.modified_types_path.clone() else {
                return Ok(());
            };
            let modified: Vec<MimeType> = inner
                .modified_types
                .iter()
                .filter_map(|id| inner.type_map.get(id))
                .map(|e| e.mime_type.clone())
                .collect();
            (path, modified)
        };
        Self::write_user_modified_mime_types(&path, &modified).await
    }

    /// Drops the blob and forgets which types were modified. The in-memory
    /// records keep their current state.
    pub async fn clear_user_modified_mime_types(&self) -> Result<()> {
        let path = {
            let mut inner = self.inner.lock().unwrap();
            inner.modified_types.clear();
            inner.modified_types_path.clone()
        };
        if let Some(path) = path {
            match tokio::fs::remove_file(&path).await {
                Ok(()) => {}
                Err(e) if e.kind() == ErrorKind::NotFound => {}
                Err(e) => return Err(e.into()),
            }
        }
        Ok(())
    }

    #[cfg(test)]
    fn level_of(&self, type_name: &str) -> i32 {
        let mut inner = self.inner.lock().unwrap();
        inner.ensure_levels();
        inner.type_map.get(type_name).map(|e| e.level).unwrap_or(DANGLING)
    }

    #[cfg(test)]
    fn max_level(&self) -> i32 {
        let mut inner = self.inner.lock().unwrap();
        inner.ensure_levels();
        inner.max_level
    }
}

/// Serialized form of one user-modified type. The blob format is private to
/// this library; magic offsets reuse the `"<start>:<end>"` wire form.
#[derive(Serialize, Deserialize)]
struct StoredMimeType {
    #[serde(rename = "type")]
    type_name: String,
    #[serde(default)]
    comment: String,
    #[serde(default)]
    aliases: Vec<String>,
    #[serde(default)]
    sub_classes_of: Vec<String>,
    #[serde(default)]
    globs: Vec<StoredGlob>,
    #[serde(default)]
    preferred_suffix: String,
    #[serde(default)]
    matchers: Vec<StoredMatcher>,
}

#[derive(Serialize, Deserialize)]
struct StoredGlob {
    pattern: String,
    weight: u32,
}

#[derive(Serialize, Deserialize)]
struct StoredMatcher {
    priority: u32,
    rules: Vec<StoredMagicRule>,
}

#[derive(Serialize, Deserialize)]
struct StoredMagicRule {
    #[serde(rename = "type")]
    rule_type: String,
    value: String,
    offset: String,
}

impl StoredMimeType {
    fn from_mime_type(t: &MimeType) -> Self {
        Self {
            type_name: t.type_name().to_string(),
            comment: t.comment().to_string(),
            aliases: t.aliases().to_vec(),
            sub_classes_of: t.sub_classes_of().to_vec(),
            globs: t
                .glob_patterns()
                .iter()
                .map(|g| StoredGlob {
                    pattern: g.glob().to_string(),
                    weight: g.weight(),
                })
                .collect(),
            preferred_suffix: t.preferred_suffix().to_string(),
            matchers: t
                .magic_rule_matchers()
                .iter()
                .filter_map(|m| m.as_rule_matcher())
                .map(|m| StoredMatcher {
                    priority: m.priority(),
                    rules: m
                        .rules()
                        .iter()
                        .map(|r| StoredMagicRule {
                            rule_type: r.rule_type().tag().to_string(),
                            value: r.value().to_string(),
                            offset: MagicRule::to_offset((r.start_pos(), r.end_pos())),
                        })
                        .collect(),
                })
                .collect(),
        }
    }

    fn into_mime_type(self) -> Result<MimeType> {
        let mut t = MimeType::new(&self.type_name);
        t.set_comment(&self.comment);
        t.set_aliases(self.aliases);
        t.set_sub_classes_of(self.sub_classes_of);

        let globs: Result<Vec<MimeGlobPattern>> = self
            .globs
            .iter()
            .map(|g| MimeGlobPattern::new(&g.pattern, g.weight))
            .collect();
        t.set_glob_patterns(globs?);
        if !self.preferred_suffix.is_empty() {
            t.set_preferred_suffix(&self.preferred_suffix);
        }

        for stored in self.matchers {
            let rules: Result<Vec<MagicRule>> = stored
                .rules
                .iter()
                .map(|r| {
                    let (start, end) = MagicRule::from_offset(&r.offset)?;
                    Ok(MagicRule::new(
                        MagicRuleType::from_tag(&r.rule_type),
                        &r.value,
                        start,
                        end,
                    ))
                })
                .collect();
            t.add_magic_matcher(Arc::new(MagicRuleMatcher::new(rules?, stored.priority)));
        }
        Ok(t)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::glob::DEFAULT_WEIGHT;

    async fn db_with(xml: &str) -> MimeDatabase {
        let db = MimeDatabase::new();
        db.add_mime_types(xml.as_bytes()).await.unwrap();
        db
    }

    const PNG_XML: &str = r#"<mime-info>
  <mime-type type="image/png">
    <comment>PNG image</comment>
    <glob pattern="*.png"/>
    <magic priority="50"><match type="byte" value="\0x89\0x50\0x4e\0x47" offset="0"/></magic>
  </mime-type>
</mime-info>"#;

    #[tokio::test]
    async fn test_add_mime_type_rejects_empty_id() {
        let db = MimeDatabase::new();
        assert!(!db.add_mime_type(MimeType::default()));
        assert!(db.add_mime_type(MimeType::new("a/b")));
    }

    #[tokio::test]
    async fn test_find_by_type_resolves_aliases() {
        let db = db_with(
            r#"<mime-info>
  <mime-type type="application/xml">
    <alias type="text/xml"/>
    <glob pattern="*.xml"/>
  </mime-type>
</mime-info>"#,
        )
        .await;

        let by_canonical = db.find_by_type("application/xml");
        let by_alias = db.find_by_type("text/xml");
        assert!(by_canonical.is_valid());
        assert_eq!(by_canonical.type_name(), by_alias.type_name());

        assert!(!db.find_by_type("application/unheard-of").is_valid());
    }

    #[tokio::test]
    async fn test_merge_preserves_level_and_relations() {
        let db = db_with(
            r#"<mime-info>
  <mime-type type="text/x-log"><sub-class-of type="text/plain"/><glob pattern="*.log"/></mime-type>
</mime-info>"#,
        )
        .await;
        assert_eq!(db.level_of("text/x-log"), 1);

        // Re-ingesting the same type with new globs keeps its place in the
        // hierarchy.
        let mut update = MimeType::new("text/x-log");
        update.set_glob_patterns(MimeDatabase::to_glob_patterns(&["*.log".into(), "*.out".into()], 60).unwrap());
        db.add_mime_type(update);

        assert_eq!(db.level_of("text/x-log"), 1);
        let (t, priority) = db.find_by_name("build.out");
        assert_eq!(t.type_name(), "text/x-log");
        assert_eq!(priority, 60);
    }

    #[tokio::test]
    async fn test_merge_does_not_register_new_relations() {
        let db = db_with(
            r#"<mime-info>
  <mime-type type="application/xml"><glob pattern="*.xml"/></mime-type>
</mime-info>"#,
        )
        .await;

        let mut update = MimeType::new("application/xml");
        update.set_aliases(vec!["text/xml".to_string()]);
        update.set_sub_classes_of(vec!["text/plain".to_string()]);
        db.add_mime_type(update);

        // The merged record carries the alias, but the alias map and the
        // hierarchy are only populated at first insert.
        assert!(db.find_by_type("application/xml").matches_type("text/xml"));
        assert!(!db.find_by_type("text/xml").is_valid());
        assert_eq!(db.level_of("application/xml"), 0);
    }

    #[tokio::test]
    async fn test_levels_from_sub_class_of() {
        let db = db_with(
            r#"<mime-info>
  <mime-type type="a"><sub-class-of type="b"/></mime-type>
  <mime-type type="b"/>
</mime-info>"#,
        )
        .await;
        assert!(db.level_of("a") > db.level_of("b"));
        assert!(db.level_of("a") <= db.max_level());
        assert_eq!(db.level_of("a"), db.level_of("b") + 1);
    }

    #[tokio::test]
    async fn test_level_chain_and_max_level() {
        let db = db_with(
            r#"<mime-info>
  <mime-type type="text/x-c++src"><sub-class-of type="text/x-csrc"/></mime-type>
  <mime-type type="text/x-csrc"><sub-class-of type="text/plain"/></mime-type>
</mime-info>"#,
        )
        .await;
        assert_eq!(db.level_of("text/plain"), 0);
        assert_eq!(db.level_of("text/x-csrc"), 1);
        assert_eq!(db.level_of("text/x-c++src"), 2);
        assert_eq!(db.max_level(), 2);
    }

    #[tokio::test]
    async fn test_hierarchy_cycle_is_broken() {
        let db = db_with(
            r#"<mime-info>
  <mime-type type="a"><sub-class-of type="b"/></mime-type>
  <mime-type type="b"><sub-class-of type="a"/></mime-type>
</mime-info>"#,
        )
        .await;
        // Levels stay finite and lookups keep working.
        assert!(db.level_of("a") <= db.max_level());
        let (_, priority) = db.find_by_name("anything");
        assert_eq!(priority, 0);
    }

    #[tokio::test]
    async fn test_find_by_name() {
        let db = db_with(PNG_XML).await;
        let (t, priority) = db.find_by_name("shot.png");
        assert_eq!(t.type_name(), "image/png");
        assert_eq!(priority, 50);

        let (t, priority) = db.find_by_name("shot.tiff");
        assert!(!t.is_valid());
        assert_eq!(priority, 0);
    }

    #[tokio::test]
    async fn test_find_by_name_prefers_deeper_type_on_tie() {
        let db = db_with(
            r#"<mime-info>
  <mime-type type="text/x-generic"><glob pattern="*.conf"/></mime-type>
  <mime-type type="text/x-special"><sub-class-of type="text/x-generic"/><glob pattern="*.conf"/></mime-type>
</mime-info>"#,
        )
        .await;
        let (t, priority) = db.find_by_name("app.conf");
        assert_eq!(t.type_name(), "text/x-special");
        assert_eq!(priority, DEFAULT_WEIGHT);
    }

    #[tokio::test]
    async fn test_find_by_data_magic() {
        let db = db_with(PNG_XML).await;
        let (t, priority) = db.find_by_data(b"\x89PNG\r\n\x1a\n");
        assert_eq!(t.type_name(), "image/png");
        assert_eq!(priority, 50);
    }

    #[tokio::test]
    async fn test_find_by_data_text_floor() {
        let db = db_with(PNG_XML).await;
        let (t, priority) = db.find_by_data(b"hello, world\n");
        assert_eq!(t.type_name(), "text/plain");
        assert!(priority > 0);
    }

    #[tokio::test]
    async fn test_find_by_data_binary_fallback() {
        let db = db_with(PNG_XML).await;
        let (t, _) = db.find_by_data(&[0u8, 1, 2, 3]);
        assert_eq!(t.type_name(), "application/octet-stream");
    }

    #[tokio::test]
    async fn test_find_by_data_empty_buffer() {
        let db = db_with(PNG_XML).await;
        let (t, priority) = db.find_by_data(b"");
        assert_eq!(t.type_name(), "text/plain");
        assert_eq!(priority, 0);
    }

    #[tokio::test]
    async fn test_is_text_file() {
        assert!(MimeDatabase::is_text_file(b"text with\ttabs\r\n"));
        assert!(!MimeDatabase::is_text_file(b"nul\x00byte"));
    }

    #[tokio::test]
    async fn test_aggregations() {
        let db = db_with(
            r#"<mime-info>
  <mime-type type="image/png"><comment>PNG image</comment><glob pattern="*.png"/></mime-type>
  <mime-type type="image/jpeg"><comment>JPEG image</comment><glob pattern="*.jpg"/><glob pattern="*.jpeg"/></mime-type>
</mime-info>"#,
        )
        .await;

        let filters = db.filter_strings();
        assert!(filters.contains(&"PNG image (*.png)".to_string()));
        assert!(filters.contains(&"JPEG image (*.jpg *.jpeg)".to_string()));

        let suffixes = db.suffixes();
        for s in ["png", "jpg", "jpeg"] {
            assert!(suffixes.iter().any(|x| x == s), "missing {}", s);
        }

        assert_eq!(db.glob_patterns().len(), 3);
    }

    #[tokio::test]
    async fn test_set_preferred_suffix_through_alias() {
        let db = db_with(
            r#"<mime-info>
  <mime-type type="image/jpeg">
    <alias type="image/pjpeg"/>
    <glob pattern="*.jpg"/><glob pattern="*.jpeg"/>
  </mime-type>
</mime-info>"#,
        )
        .await;

        assert!(db.set_preferred_suffix("image/pjpeg", "jpeg"));
        assert_eq!(db.find_by_type("image/jpeg").preferred_suffix(), "jpeg");

        assert!(!db.set_preferred_suffix("image/jpeg", "bmp"));
        assert!(!db.set_preferred_suffix("no/such-type", "jpg"));
    }

    #[tokio::test]
    async fn test_set_magic_matchers_keeps_heuristics() {
        let db = MimeDatabase::new();
        let matcher: SharedMagicMatcher = Arc::new(MagicRuleMatcher::new(
            vec![MagicRule::new(MagicRuleType::String, "#!", 0, 0)],
            60,
        ));
        db.set_magic_matchers(TEXT_PLAIN, vec![matcher]);

        let t = db.find_by_type(TEXT_PLAIN);
        // The heuristic text matcher is still there alongside the new rule.
        assert_eq!(t.magic_matchers().len(), 2);
        assert_eq!(t.matches_data(b"#!/bin/sh"), 60);
        assert_eq!(t.matches_data(b"plain"), 2);
    }

    #[tokio::test]
    async fn test_user_modified_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let blob = dir.path().join("modifiedmimetypes.json");

        let db = db_with(PNG_XML).await;
        db.set_modified_types_path(&blob);
        db.set_glob_patterns(
            "image/png",
            MimeDatabase::to_glob_patterns(&["*.png".into(), "*.apng".into()], DEFAULT_WEIGHT)
                .unwrap(),
        );
        db.sync_user_modified_mime_types().await.unwrap();

        let stored = MimeDatabase::read_user_modified_mime_types(&blob).await.unwrap();
        assert_eq!(stored.len(), 1);
        assert_eq!(stored[0].type_name(), "image/png");
        assert_eq!(stored[0].suffixes(), ["png", "apng"]);
        // Rule-based matchers survive the round trip.
        assert_eq!(stored[0].magic_rule_matchers().len(), 1);

        // A fresh database merges the overrides on top of the base.
        let fresh = db_with(PNG_XML).await;
        fresh.apply_user_modified_mime_types(stored);
        let (t, _) = fresh.find_by_name("anim.apng");
        assert_eq!(t.type_name(), "image/png");

        db.clear_user_modified_mime_types().await.unwrap();
        assert!(MimeDatabase::read_user_modified_mime_types(&blob)
            .await
            .unwrap()
            .is_empty());
    }

    #[tokio::test]
    async fn test_sync_without_path_is_a_noop() {
        let db = db_with(PNG_XML).await;
        db.set_glob_patterns(
            "image/png",
            MimeDatabase::to_glob_patterns(&["*.png".into()], DEFAULT_WEIGHT).unwrap(),
        );
        db.sync_user_modified_mime_types().await.unwrap();
    }

    #[tokio::test]
    async fn test_glob_pattern_helpers() {
        let globs =
            MimeDatabase::to_glob_patterns(&["*.a".into(), "*.b".into()], 42).unwrap();
        assert!(globs.iter().all(|g| g.weight() == 42));
        assert_eq!(MimeDatabase::from_glob_patterns(&globs), ["*.a", "*.b"]);
    }
}
