//! Streaming parser for shared-mime-info XML definitions.
//!
//! A small state machine walks the start/end element events delivered by the
//! XML tokenizer and assembles one [`MimeType`] record per `mime-type`
//! element, handing each completed record to a consumer callback. The parser
//! does not validate against a schema; unrecognized sub-elements of
//! `mime-type` are ignored, unknown elements anywhere else abort the
//! ingestion with a parse error.

use crate::error::{Error, Result};
use crate::glob::{MimeGlobPattern, DEFAULT_WEIGHT};
use crate::magic::{MagicRule, MagicRuleMatcher, MagicRuleType};
use crate::mime_type::MimeType;
use quick_xml::events::{BytesStart, Event};
use quick_xml::Reader;
use std::sync::Arc;
use tokio::io::AsyncBufRead;

/// Parser states; one per grammar position.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ParseStage {
    Beginning,
    MimeInfo,
    MimeType,
    Comment,
    GlobPattern,
    SubClass,
    Alias,
    Magic,
    MagicMatchRule,
    OtherMimeTypeSubTag,
    Error,
}

/// The admissible transition for a start element, keyed by local name.
fn next_stage(current: ParseStage, element: &[u8]) -> ParseStage {
    match (current, element) {
        (ParseStage::Beginning, b"mime-info") => ParseStage::MimeInfo,
        (ParseStage::MimeInfo, b"mime-type") => ParseStage::MimeType,
        (ParseStage::MimeType, b"comment") => ParseStage::Comment,
        (ParseStage::MimeType, b"glob") => ParseStage::GlobPattern,
        (ParseStage::MimeType, b"sub-class-of") => ParseStage::SubClass,
        (ParseStage::MimeType, b"alias") => ParseStage::Alias,
        (ParseStage::MimeType, b"magic") => ParseStage::Magic,
        (ParseStage::Magic, b"match") | (ParseStage::MagicMatchRule, b"match") => {
            ParseStage::MagicMatchRule
        }
        (ParseStage::MimeType, _) => ParseStage::OtherMimeTypeSubTag,
        _ => ParseStage::Error,
    }
}

/// Working state for the record currently being assembled.
#[derive(Default)]
struct TypeBuilder {
    record: MimeType,
    globs: Vec<MimeGlobPattern>,
    aliases: Vec<String>,
    parents: Vec<String>,
    current_text: String,
    current_lang: Option<String>,
    magic_priority: u32,
    magic_rules: Vec<MagicRule>,
}

/// Parses a shared-mime-info document from an async source, delivering each
/// assembled record to `process`. `source_name` tags error messages.
pub(crate) async fn parse_mime_info<R, F>(
    source: R,
    source_name: &str,
    process: &mut F,
) -> Result<()>
where
    R: AsyncBufRead + Unpin,
    F: FnMut(MimeType) -> Result<()>,
{
    let mut reader = Reader::from_reader(source);
    let mut buf = Vec::new();
    let mut stack = vec![ParseStage::Beginning];
    let mut builder = TypeBuilder::default();

    loop {
        let event = reader.read_event_into_async(&mut buf).await?;
        match event {
            Event::Start(ref e) => {
                let current = *stack.last().expect("stage stack is never empty");
                let stage = enter_stage(current, e, source_name, &reader, &mut builder)?;
                stack.push(stage);
            }
            Event::Empty(ref e) => {
                let current = *stack.last().expect("stage stack is never empty");
                let stage = enter_stage(current, e, source_name, &reader, &mut builder)?;
                leave_stage(stage, &mut builder, process)?;
            }
            Event::End(_) => {
                // Recover the previous state whether or not the element's
                // semantics were consumed.
                if let Some(stage) = stack.pop() {
                    leave_stage(stage, &mut builder, process)?;
                }
                if stack.is_empty() {
                    stack.push(ParseStage::Beginning);
                }
            }
            Event::Text(ref t) => {
                if *stack.last().expect("stage stack is never empty") == ParseStage::Comment {
                    let text = t.unescape()?;
                    builder.current_text.push_str(&text);
                }
            }
            Event::CData(ref t) => {
                if *stack.last().expect("stage stack is never empty") == ParseStage::Comment {
                    builder.current_text.push_str(&String::from_utf8_lossy(t));
                }
            }
            Event::Eof => break,
            _ => {}
        }
        buf.clear();
    }

    Ok(())
}

/// Validates the transition and applies the start-element semantics.
fn enter_stage<R>(
    current: ParseStage,
    element: &BytesStart<'_>,
    source_name: &str,
    reader: &Reader<R>,
    builder: &mut TypeBuilder,
) -> Result<ParseStage> {
    let name = element.local_name();
    let stage = next_stage(current, name.as_ref());
    let position = reader.buffer_position() as u64;

    match stage {
        ParseStage::Error => {
            return Err(Error::parse_at(
                source_name,
                position,
                format!(
                    "unexpected element <{}>",
                    String::from_utf8_lossy(name.as_ref())
                ),
            ));
        }
        ParseStage::MimeType => {
            let type_name = require_attribute(element, "type", source_name, position)?;
            builder.record.set_type_name(&type_name);
        }
        ParseStage::Comment => {
            builder.current_text.clear();
            builder.current_lang = attribute(element, "xml:lang")?;
        }
        ParseStage::GlobPattern => {
            let pattern = require_attribute(element, "pattern", source_name, position)?;
            let weight = match attribute(element, "weight")? {
                Some(w) => w.parse::<u32>().map_err(|_| {
                    Error::parse_at(source_name, position, format!("invalid weight {:?}", w))
                })?,
                None => DEFAULT_WEIGHT,
            };
            builder.globs.push(MimeGlobPattern::new(&pattern, weight)?);
        }
        ParseStage::SubClass => {
            if let Some(parent) = attribute(element, "type")? {
                builder.parents.push(parent);
            }
        }
        ParseStage::Alias => {
            if let Some(alias) = attribute(element, "type")? {
                builder.aliases.push(alias);
            }
        }
        ParseStage::Magic => {
            builder.magic_rules.clear();
            builder.magic_priority = match attribute(element, "priority")? {
                Some(p) => p.parse::<u32>().map_err(|_| {
                    Error::parse_at(source_name, position, format!("invalid priority {:?}", p))
                })?,
                None => DEFAULT_WEIGHT,
            };
        }
        ParseStage::MagicMatchRule => {
            let rule_type = attribute(element, "type")?
                .map(|t| MagicRuleType::from_tag(&t))
                .unwrap_or(MagicRuleType::Unknown);
            let value = attribute(element, "value")?.unwrap_or_default();
            let (start_pos, end_pos) = match attribute(element, "offset")? {
                Some(offset) => parse_offset(&offset)
                    .ok_or_else(|| {
                        Error::parse_at(
                            source_name,
                            position,
                            format!("invalid offset {:?}", offset),
                        )
                    })?,
                None => (0, 0),
            };
            builder
                .magic_rules
                .push(MagicRule::new(rule_type, &value, start_pos, end_pos));
        }
        _ => {}
    }

    Ok(stage)
}

/// Applies the end-element semantics for the stage being left.
fn leave_stage<F>(stage: ParseStage, builder: &mut TypeBuilder, process: &mut F) -> Result<()>
where
    F: FnMut(MimeType) -> Result<()>,
{
    match stage {
        ParseStage::Comment => {
            let text = builder.current_text.trim().to_string();
            match builder.current_lang.take() {
                Some(lang) => builder.record.set_locale_comment(&lang, &text),
                None => builder.record.set_comment(&text),
            }
            builder.current_text.clear();
        }
        ParseStage::Magic => {
            let rules = std::mem::take(&mut builder.magic_rules);
            builder
                .record
                .add_magic_matcher(Arc::new(MagicRuleMatcher::new(
                    rules,
                    builder.magic_priority,
                )));
        }
        ParseStage::MimeType => {
            let mut record = std::mem::take(&mut builder.record);
            record.set_aliases(std::mem::take(&mut builder.aliases));
            record.set_sub_classes_of(std::mem::take(&mut builder.parents));
            record.set_glob_patterns(std::mem::take(&mut builder.globs));
            process(record)?;
        }
        _ => {}
    }
    Ok(())
}

/// Offset attribute: `"<int>"` or `"<int>:<int>"`, decimal.
fn parse_offset(offset: &str) -> Option<(usize, usize)> {
    match offset.split_once(':') {
        Some((start, end)) => Some((start.parse().ok()?, end.parse().ok()?)),
        None => {
            let pos = offset.parse().ok()?;
            Some((pos, pos))
        }
    }
}

fn attribute(element: &BytesStart<'_>, name: &str) -> Result<Option<String>> {
    match element
        .try_get_attribute(name)
        .map_err(|e| Error::Parse(e.to_string()))?
    {
        Some(attr) => {
            let value = attr
                .unescape_value()
                .map_err(|e| Error::Parse(e.to_string()))?;
            Ok(Some(value.into_owned()))
        }
        None => Ok(None),
    }
}

fn require_attribute(
    element: &BytesStart<'_>,
    name: &str,
    source_name: &str,
    position: u64,
) -> Result<String> {
    attribute(element, name)?.ok_or_else(|| {
        Error::parse_at(
            source_name,
            position,
            format!(
                "element <{}> is missing the '{}' attribute",
                String::from_utf8_lossy(element.local_name().as_ref()),
                name
            ),
        )
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    async fn parse_all(xml: &str) -> Result<Vec<MimeType>> {
        let mut types = Vec::new();
        parse_mime_info(xml.as_bytes(), "test", &mut |t| {
            types.push(t);
            Ok(())
        })
        .await?;
        Ok(types)
    }

    #[tokio::test]
    async fn test_minimal_document() {
        let types = parse_all(
            r#"<?xml version="1.0" encoding="UTF-8"?>
<mime-info xmlns="http://www.freedesktop.org/standards/shared-mime-info">
  <mime-type type="image/png">
    <comment>PNG image</comment>
    <glob pattern="*.png" weight="50"/>
  </mime-type>
</mime-info>"#,
        )
        .await
        .unwrap();

        assert_eq!(types.len(), 1);
        let t = &types[0];
        assert_eq!(t.type_name(), "image/png");
        assert_eq!(t.comment(), "PNG image");
        assert_eq!(t.glob_patterns().len(), 1);
        assert_eq!(t.glob_patterns()[0].weight(), 50);
        assert_eq!(t.suffixes(), ["png"]);
    }

    #[tokio::test]
    async fn test_aliases_parents_and_locale_comments() {
        let types = parse_all(
            r#"<mime-info>
  <mime-type type="application/xml">
    <comment>XML document</comment>
    <comment xml:lang="de">XML-Dokument</comment>
    <alias type="text/xml"/>
    <sub-class-of type="text/plain"/>
    <glob pattern="*.xml"/>
  </mime-type>
</mime-info>"#,
        )
        .await
        .unwrap();

        let t = &types[0];
        assert_eq!(t.comment(), "XML document");
        assert_eq!(t.locale_comment("de"), "XML-Dokument");
        assert_eq!(t.aliases(), ["text/xml"]);
        assert_eq!(t.sub_classes_of(), ["text/plain"]);
        // No weight attribute: the default applies.
        assert_eq!(t.glob_patterns()[0].weight(), DEFAULT_WEIGHT);
    }

    #[tokio::test]
    async fn test_magic_rules_share_one_matcher() {
        let types = parse_all(
            r#"<mime-info>
  <mime-type type="application/x-executable">
    <magic priority="80">
      <match type="byte" value="\0x7f\0x45\0x4c\0x46" offset="0">
        <match type="big16" value="0x0200" offset="16:18"/>
      </match>
    </magic>
  </mime-type>
</mime-info>"#,
        )
        .await
        .unwrap();

        let t = &types[0];
        assert_eq!(t.magic_matchers().len(), 1);
        let matcher = &t.magic_matchers()[0];
        assert_eq!(matcher.priority(), 80);

        // Conjunction of the outer and the nested rule.
        let mut data = b"\x7fELF".to_vec();
        data.resize(16, 0);
        data.extend_from_slice(&[0x02, 0x00]);
        assert!(matcher.matches(&data));

        let mut elf_only = b"\x7fELF".to_vec();
        elf_only.resize(20, 0);
        assert!(!matcher.matches(&elf_only));
    }

    #[tokio::test]
    async fn test_single_int_offset() {
        let types = parse_all(
            r##"<mime-info>
  <mime-type type="text/x-sh">
    <magic><match type="string" value="#!" offset="0"/></magic>
  </mime-type>
</mime-info>"##,
        )
        .await
        .unwrap();
        // offset="0" means 0:0, which is the starts-with fast path.
        assert!(types[0].magic_matchers()[0].matches(b"#!/bin/sh"));
        assert!(!types[0].magic_matchers()[0].matches(b" #!/bin/sh"));
    }

    #[tokio::test]
    async fn test_unknown_mime_type_subtags_are_ignored() {
        let types = parse_all(
            r#"<mime-info>
  <mime-type type="image/png">
    <icon name="image-png"/>
    <generic-icon name="image-x-generic"/>
    <glob pattern="*.png"/>
  </mime-type>
</mime-info>"#,
        )
        .await
        .unwrap();
        assert_eq!(types[0].type_name(), "image/png");
        assert_eq!(types[0].glob_patterns().len(), 1);
    }

    #[tokio::test]
    async fn test_missing_type_attribute_is_an_error() {
        let err = parse_all(r#"<mime-info><mime-type><glob pattern="*.x"/></mime-type></mime-info>"#)
            .await
            .unwrap_err();
        assert!(err.to_string().contains("type"), "{}", err);
    }

    #[tokio::test]
    async fn test_unknown_element_at_top_level_is_an_error() {
        assert!(parse_all(r#"<mime-data/>"#).await.is_err());
        assert!(parse_all(r#"<mime-info><comment>x</comment></mime-info>"#)
            .await
            .is_err());
    }

    #[tokio::test]
    async fn test_invalid_weight_is_an_error() {
        let err = parse_all(
            r#"<mime-info><mime-type type="a/b"><glob pattern="*.x" weight="heavy"/></mime-type></mime-info>"#,
        )
        .await
        .unwrap_err();
        assert!(err.to_string().contains("weight"), "{}", err);
    }

    #[tokio::test]
    async fn test_invalid_offset_is_an_error() {
        assert!(parse_all(
            r#"<mime-info><mime-type type="a/b"><magic><match type="string" value="x" offset="1:z"/></magic></mime-type></mime-info>"#,
        )
        .await
        .is_err());
    }

    #[tokio::test]
    async fn test_empty_mime_type_element() {
        let types = parse_all(r#"<mime-info><mime-type type="a/b"/></mime-info>"#)
            .await
            .unwrap();
        assert_eq!(types.len(), 1);
        assert_eq!(types[0].type_name(), "a/b");
    }
}
