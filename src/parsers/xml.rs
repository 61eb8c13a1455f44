//! Tree-markup parser.
//!
//! Two passes over the body. The first only checks well-formedness and stops
//! at the first defect with a machine-readable code. The second builds the
//! nested object using the caller's options:
//!
//! ```text
//! <root a="1"><item>7</item><item>x</item><empty/></root>
//!     → {"root": {"item": [7, "x"], "empty": ""}}          (attributes ignored)
//!     → {"root": {"@_a": "1", "item": [7, "x"], "empty": ""}}
//! ```

use std::borrow::Cow;

use async_trait::async_trait;
use axum::body::Bytes;
use axum::http::HeaderMap;
use quick_xml::errors::IllFormedError;
use quick_xml::events::{BytesDecl, BytesStart, Event};
use quick_xml::Reader;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Number, Value};

use crate::envelope::{DataFormat, FormatOptions};
use crate::error::ParseFailure;
use crate::observability::RequestLogger;
use crate::parsers::{ContentParser, ParsedPayload};

/// Caller-tunable conversion options (`xmlParserOptions`).
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct XmlParserOptions {
    pub ignore_attributes: bool,
    pub attribute_name_prefix: String,
    pub text_node_name: String,
    /// Turn numeric element text into JSON numbers.
    pub parse_tag_value: bool,
    /// Turn numeric attribute values into JSON numbers.
    pub parse_attribute_value: bool,
    pub trim_values: bool,
    pub ignore_declaration: bool,
}

impl Default for XmlParserOptions {
    fn default() -> Self {
        Self {
            ignore_attributes: true,
            attribute_name_prefix: "@_".to_string(),
            text_node_name: "#text".to_string(),
            parse_tag_value: true,
            parse_attribute_value: false,
            trim_values: true,
            ignore_declaration: false,
        }
    }
}

impl FormatOptions for XmlParserOptions {
    const FIELD: Option<&'static str> = Some("xmlParserOptions");

    fn check(&self) -> Result<(), String> {
        if self.text_node_name.is_empty() {
            return Err("xmlParserOptions.textNodeName must not be empty".to_string());
        }
        Ok(())
    }
}

/// Well-formedness defect codes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum DefectCode {
    EmptyDocument,
    MissingClosingTag,
    UnexpectedClosingTag,
    MismatchedClosingTag,
    MultipleRoots,
    TextOutsideRoot,
    InvalidAttribute,
    InvalidSyntax,
}

/// First well-formedness defect found in a document.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct XmlDefect {
    pub code: DefectCode,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tag: Option<String>,
    pub line: usize,
    pub column: usize,
}

impl XmlDefect {
    fn new(code: DefectCode, message: String, tag: Option<String>, text: &str, offset: u64) -> Self {
        let (line, column) = line_and_column(text, offset);
        Self {
            code,
            message,
            tag,
            line,
            column,
        }
    }
}

impl From<XmlDefect> for ParseFailure {
    fn from(defect: XmlDefect) -> Self {
        let diagnostic = serde_json::to_value(&defect).unwrap_or(Value::Null);
        ParseFailure::new("Invalid XML response", diagnostic)
    }
}

#[derive(Debug, Default, Clone, Copy)]
pub struct XmlContentParser;

#[async_trait]
impl ContentParser for XmlContentParser {
    const FORMAT: DataFormat = DataFormat::Xml;
    type Options = XmlParserOptions;

    async fn parse(
        &self,
        body: Bytes,
        _headers: &HeaderMap,
        options: &XmlParserOptions,
        logger: &RequestLogger,
    ) -> Result<ParsedPayload, ParseFailure> {
        let text = std::str::from_utf8(&body).map_err(|e| {
            ParseFailure::from(XmlDefect::new(
                DefectCode::InvalidSyntax,
                format!("Response is not valid UTF-8: {}", e),
                None,
                "",
                0,
            ))
        })?;

        if let Err(defect) = check_well_formed(text) {
            logger.debug(format_args!(
                "XML defect {:?} at {}:{}",
                defect.code, defect.line, defect.column
            ));
            return Err(defect.into());
        }

        to_value(text, options).map(ParsedPayload::Structured)
    }
}

/// Validate structure without building anything.
pub fn check_well_formed(text: &str) -> Result<(), XmlDefect> {
    let mut reader = Reader::from_str(text);
    reader.config_mut().check_end_names = false;

    let mut open: Vec<(String, u64)> = Vec::new();
    let mut seen_root = false;

    loop {
        let position = reader.buffer_position() as u64;
        let event = match reader.read_event() {
            Ok(event) => event,
            Err(e) => return Err(syntax_defect(&e, text, reader.error_position() as u64)),
        };

        match event {
            Event::Start(start) | Event::Empty(start) if open.is_empty() && seen_root => {
                let name = element_name(&start);
                return Err(XmlDefect::new(
                    DefectCode::MultipleRoots,
                    format!("Second root element <{}>", name),
                    Some(name),
                    text,
                    position,
                ));
            }
            Event::Start(start) => {
                check_attributes(&start, text, position)?;
                seen_root = true;
                open.push((element_name(&start), position));
            }
            Event::Empty(start) => {
                check_attributes(&start, text, position)?;
                seen_root = true;
            }
            Event::End(end) => {
                let name = String::from_utf8_lossy(end.name().as_ref()).into_owned();
                let top = open.last().map(|(n, p)| (n.clone(), *p));
                match top {
                    None => {
                        return Err(XmlDefect::new(
                            DefectCode::UnexpectedClosingTag,
                            format!("Closing tag </{}> has no matching opening tag", name),
                            Some(name),
                            text,
                            position,
                        ))
                    }
                    Some((top, _)) if top == name => {
                        open.pop();
                    }
                    Some((top, top_position)) if open.iter().any(|(n, _)| *n == name) => {
                        return Err(XmlDefect::new(
                            DefectCode::MissingClosingTag,
                            format!("Element <{}> is never closed", top),
                            Some(top),
                            text,
                            top_position,
                        ))
                    }
                    Some((top, _)) => {
                        return Err(XmlDefect::new(
                            DefectCode::MismatchedClosingTag,
                            format!("Expected </{}> but found </{}>", top, name),
                            Some(name),
                            text,
                            position,
                        ))
                    }
                }
            }
            Event::Text(t) => {
                if open.is_empty() && !t.iter().all(u8::is_ascii_whitespace) {
                    return Err(XmlDefect::new(
                        DefectCode::TextOutsideRoot,
                        "Text content outside the root element".to_string(),
                        None,
                        text,
                        position,
                    ));
                }
                if let Err(e) = t.unescape() {
                    return Err(syntax_defect(&e, text, position));
                }
            }
            Event::CData(_) if open.is_empty() => {
                return Err(XmlDefect::new(
                    DefectCode::TextOutsideRoot,
                    "CDATA section outside the root element".to_string(),
                    None,
                    text,
                    position,
                ));
            }
            Event::Eof => {
                if let Some((name, opened_at)) = open.pop() {
                    return Err(XmlDefect::new(
                        DefectCode::MissingClosingTag,
                        format!("Element <{}> is never closed", name),
                        Some(name),
                        text,
                        opened_at,
                    ));
                }
                if !seen_root {
                    return Err(XmlDefect::new(
                        DefectCode::EmptyDocument,
                        "Document has no root element".to_string(),
                        None,
                        text,
                        position,
                    ));
                }
                return Ok(());
            }
            _ => {}
        }
    }
}

fn element_name(start: &BytesStart<'_>) -> String {
    String::from_utf8_lossy(start.name().as_ref()).into_owned()
}

fn check_attributes(start: &BytesStart<'_>, text: &str, position: u64) -> Result<(), XmlDefect> {
    for attribute in start.attributes() {
        let attribute = attribute.map_err(|e| {
            XmlDefect::new(
                DefectCode::InvalidAttribute,
                format!("Invalid attribute on <{}>: {}", element_name(start), e),
                Some(element_name(start)),
                text,
                position,
            )
        })?;
        attribute.unescape_value().map_err(|e| {
            XmlDefect::new(
                DefectCode::InvalidAttribute,
                format!("Invalid attribute value on <{}>: {}", element_name(start), e),
                Some(element_name(start)),
                text,
                position,
            )
        })?;
    }
    Ok(())
}

fn syntax_defect(error: &quick_xml::Error, text: &str, position: u64) -> XmlDefect {
    match error {
        quick_xml::Error::IllFormed(IllFormedError::MissingEndTag(name)) => XmlDefect::new(
            DefectCode::MissingClosingTag,
            format!("Element <{}> is never closed", name),
            Some(name.clone()),
            text,
            position,
        ),
        quick_xml::Error::IllFormed(IllFormedError::UnmatchedEndTag(name)) => XmlDefect::new(
            DefectCode::UnexpectedClosingTag,
            format!("Closing tag </{}> has no matching opening tag", name),
            Some(name.clone()),
            text,
            position,
        ),
        quick_xml::Error::IllFormed(IllFormedError::MismatchedEndTag { expected, found }) => {
            XmlDefect::new(
                DefectCode::MismatchedClosingTag,
                format!("Expected </{}> but found </{}>", expected, found),
                Some(found.clone()),
                text,
                position,
            )
        }
        other => XmlDefect::new(
            DefectCode::InvalidSyntax,
            other.to_string(),
            None,
            text,
            position,
        ),
    }
}

/// 1-based line and column of a byte offset.
fn line_and_column(text: &str, offset: u64) -> (usize, usize) {
    let offset = usize::try_from(offset).unwrap_or(usize::MAX).min(text.len());
    let before = &text.as_bytes()[..offset];
    let line = before.iter().filter(|&&b| b == b'\n').count() + 1;
    let line_start = before
        .iter()
        .rposition(|&b| b == b'\n')
        .map(|i| i + 1)
        .unwrap_or(0);
    (line, offset - line_start + 1)
}

struct Frame {
    name: String,
    children: Map<String, Value>,
    text: String,
}

/// Build the nested object. Assumes `check_well_formed` passed.
pub fn to_value(text: &str, options: &XmlParserOptions) -> Result<Value, ParseFailure> {
    let mut reader = Reader::from_str(text);
    let mut root = Map::new();
    let mut stack: Vec<Frame> = Vec::new();

    loop {
        let position = reader.buffer_position() as u64;
        let event = reader
            .read_event()
            .map_err(|e| ParseFailure::from(syntax_defect(&e, text, reader.error_position() as u64)))?;

        match event {
            Event::Decl(decl) if !options.ignore_declaration => {
                let value = declaration_value(&decl, options);
                insert_child(&mut root, "?xml".to_string(), value);
            }
            Event::Start(start) => {
                let children = attributes(&start, options, text, position)?;
                stack.push(Frame {
                    name: element_name(&start),
                    children,
                    text: String::new(),
                });
            }
            Event::Empty(start) => {
                let attrs = attributes(&start, options, text, position)?;
                let value = if attrs.is_empty() {
                    Value::String(String::new())
                } else {
                    Value::Object(attrs)
                };
                let parent = stack.last_mut().map(|f| &mut f.children).unwrap_or(&mut root);
                insert_child(parent, element_name(&start), value);
            }
            Event::Text(t) => {
                if let Some(frame) = stack.last_mut() {
                    let unescaped = t
                        .unescape()
                        .map_err(|e| ParseFailure::from(syntax_defect(&e, text, position)))?;
                    frame.text.push_str(&unescaped);
                }
            }
            Event::CData(c) => {
                if let Some(frame) = stack.last_mut() {
                    frame.text.push_str(&String::from_utf8_lossy(&c.into_inner()));
                }
            }
            Event::End(_) => {
                if let Some(frame) = stack.pop() {
                    let (name, value) = finish_frame(frame, options);
                    let parent = stack.last_mut().map(|f| &mut f.children).unwrap_or(&mut root);
                    insert_child(parent, name, value);
                }
            }
            Event::Eof => break,
            _ => {}
        }
    }

    Ok(Value::Object(root))
}

fn attributes(
    start: &BytesStart<'_>,
    options: &XmlParserOptions,
    text: &str,
    position: u64,
) -> Result<Map<String, Value>, ParseFailure> {
    let mut map = Map::new();
    if options.ignore_attributes {
        return Ok(map);
    }
    for attribute in start.attributes() {
        let attribute = attribute.map_err(|e| {
            ParseFailure::from(XmlDefect::new(
                DefectCode::InvalidAttribute,
                e.to_string(),
                Some(element_name(start)),
                text,
                position,
            ))
        })?;
        let key = format!(
            "{}{}",
            options.attribute_name_prefix,
            String::from_utf8_lossy(attribute.key.as_ref())
        );
        let raw = attribute
            .unescape_value()
            .map_err(|e| ParseFailure::from(syntax_defect(&e, text, position)))?;
        map.insert(key, scalar(&raw, options.parse_attribute_value));
    }
    Ok(map)
}

fn declaration_value(decl: &BytesDecl<'_>, options: &XmlParserOptions) -> Value {
    if options.ignore_attributes {
        return Value::String(String::new());
    }
    let prefix = &options.attribute_name_prefix;
    let mut map = Map::new();
    if let Ok(version) = decl.version() {
        map.insert(
            format!("{}version", prefix),
            Value::String(String::from_utf8_lossy(&version).into_owned()),
        );
    }
    if let Some(Ok(encoding)) = decl.encoding() {
        map.insert(
            format!("{}encoding", prefix),
            Value::String(String::from_utf8_lossy(&encoding).into_owned()),
        );
    }
    if let Some(Ok(standalone)) = decl.standalone() {
        map.insert(
            format!("{}standalone", prefix),
            Value::String(String::from_utf8_lossy(&standalone).into_owned()),
        );
    }
    Value::Object(map)
}

fn finish_frame(frame: Frame, options: &XmlParserOptions) -> (String, Value) {
    let Frame {
        name,
        mut children,
        text,
    } = frame;
    let text: Cow<'_, str> = if options.trim_values {
        Cow::Borrowed(text.trim())
    } else {
        Cow::Owned(text)
    };

    let value = if children.is_empty() {
        if text.is_empty() {
            Value::String(String::new())
        } else {
            scalar(&text, options.parse_tag_value)
        }
    } else {
        if !text.is_empty() {
            children.insert(
                options.text_node_name.clone(),
                scalar(&text, options.parse_tag_value),
            );
        }
        Value::Object(children)
    };
    (name, value)
}

/// Repeated siblings collapse into an array in document order.
fn insert_child(parent: &mut Map<String, Value>, name: String, value: Value) {
    match parent.get_mut(&name) {
        Some(Value::Array(items)) => items.push(value),
        Some(existing) => {
            let first = existing.take();
            *existing = Value::Array(vec![first, value]);
        }
        None => {
            parent.insert(name, value);
        }
    }
}

fn scalar(text: &str, parse_numbers: bool) -> Value {
    if parse_numbers {
        if let Some(number) = parse_number(text.trim()) {
            return Value::Number(number);
        }
    }
    Value::String(text.to_string())
}

fn parse_number(text: &str) -> Option<Number> {
    if text.is_empty()
        || !text
            .chars()
            .all(|c| c.is_ascii_digit() || matches!(c, '-' | '+' | '.' | 'e' | 'E'))
    {
        return None;
    }
    let digits = text.trim_start_matches(['-', '+']);
    // Identifiers such as zip codes keep their leading zeros.
    if digits.len() > 1 && digits.starts_with('0') && !digits.starts_with("0.") {
        return None;
    }
    if let Ok(i) = text.parse::<i64>() {
        return Some(Number::from(i));
    }
    text.parse::<f64>().ok().and_then(Number::from_f64)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    async fn parse_with(body: &str, options: XmlParserOptions) -> Result<Value, ParseFailure> {
        let payload = XmlContentParser
            .parse(
                Bytes::from(body.to_string()),
                &HeaderMap::new(),
                &options,
                &RequestLogger::capturing(),
            )
            .await?;
        match payload {
            ParsedPayload::Structured(value) => Ok(value),
            other => panic!("unexpected payload {:?}", other),
        }
    }

    async fn parse(body: &str) -> Result<Value, ParseFailure> {
        parse_with(body, XmlParserOptions::default()).await
    }

    #[tokio::test]
    async fn test_nested_elements_and_repeats() {
        let value = parse(
            "<catalog><book><title>Dune</title><year>1965</year></book>\
             <book><title>Emma</title><year>1815</year></book></catalog>",
        )
        .await
        .unwrap();
        assert_eq!(
            value,
            json!({"catalog": {"book": [
                {"title": "Dune", "year": 1965},
                {"title": "Emma", "year": 1815}
            ]}})
        );
    }

    #[tokio::test]
    async fn test_attributes_ignored_by_default() {
        let value = parse(r#"<root id="7"><item kind="a">x</item><empty/></root>"#)
            .await
            .unwrap();
        assert_eq!(value, json!({"root": {"item": "x", "empty": ""}}));
    }

    #[tokio::test]
    async fn test_attributes_with_prefix_and_text_node() {
        let options = XmlParserOptions {
            ignore_attributes: false,
            ..Default::default()
        };
        let value = parse_with(r#"<root id="7"><item kind="a">x</item></root>"#, options)
            .await
            .unwrap();
        assert_eq!(
            value,
            json!({"root": {"@_id": "7", "item": {"@_kind": "a", "#text": "x"}}})
        );
    }

    #[tokio::test]
    async fn test_custom_prefix_and_attribute_numbers() {
        let options = XmlParserOptions {
            ignore_attributes: false,
            attribute_name_prefix: "$".into(),
            parse_attribute_value: true,
            ..Default::default()
        };
        let value = parse_with(r#"<point x="1.5" y="-2"/>"#, options).await.unwrap();
        assert_eq!(value, json!({"point": {"$x": 1.5, "$y": -2}}));
    }

    #[tokio::test]
    async fn test_declaration_and_entities() {
        let value = parse(r#"<?xml version="1.0"?><a>fish &amp; chips</a>"#)
            .await
            .unwrap();
        assert_eq!(value, json!({"?xml": "", "a": "fish & chips"}));

        let options = XmlParserOptions {
            ignore_declaration: true,
            ..Default::default()
        };
        let value = parse_with(r#"<?xml version="1.0"?><a><![CDATA[<raw>]]></a>"#, options)
            .await
            .unwrap();
        assert_eq!(value, json!({"a": "<raw>"}));
    }

    #[tokio::test]
    async fn test_leading_zero_text_stays_string() {
        let value = parse("<r><zip>02134</zip><n>0</n><f>0.25</f></r>").await.unwrap();
        assert_eq!(value, json!({"r": {"zip": "02134", "n": 0, "f": 0.25}}));

        let options = XmlParserOptions {
            parse_tag_value: false,
            ..Default::default()
        };
        let value = parse_with("<r><n>12</n></r>", options).await.unwrap();
        assert_eq!(value, json!({"r": {"n": "12"}}));
    }

    #[tokio::test]
    async fn test_missing_closing_tag_at_end() {
        let failure = parse("<root><item>1</item>").await.unwrap_err();
        assert_eq!(failure.message, "Invalid XML response");
        assert_eq!(failure.diagnostic["code"], "MissingClosingTag");
        assert_eq!(failure.diagnostic["tag"], "root");
    }

    #[tokio::test]
    async fn test_missing_inner_closing_tag() {
        let failure = parse("<root>\n  <item>1\n</root>").await.unwrap_err();
        assert_eq!(failure.diagnostic["code"], "MissingClosingTag");
        assert_eq!(failure.diagnostic["tag"], "item");
        assert_eq!(failure.diagnostic["line"], 2);
    }

    #[tokio::test]
    async fn test_extra_and_mismatched_closing_tags() {
        let failure = parse("<a></a></b>").await.unwrap_err();
        assert_eq!(failure.diagnostic["code"], "UnexpectedClosingTag");

        let failure = parse("<a><b></c></a>").await.unwrap_err();
        assert_eq!(failure.diagnostic["code"], "MismatchedClosingTag");
        assert_eq!(failure.diagnostic["tag"], "c");
    }

    #[tokio::test]
    async fn test_structure_defects() {
        let failure = parse("<a/><b/>").await.unwrap_err();
        assert_eq!(failure.diagnostic["code"], "MultipleRoots");

        let failure = parse("hello <a/>").await.unwrap_err();
        assert_eq!(failure.diagnostic["code"], "TextOutsideRoot");

        let failure = parse("   ").await.unwrap_err();
        assert_eq!(failure.diagnostic["code"], "EmptyDocument");
    }

    #[tokio::test]
    async fn test_duplicate_attribute_is_invalid() {
        let failure = parse(r#"<a x="1" x="2"/>"#).await.unwrap_err();
        assert_eq!(failure.diagnostic["code"], "InvalidAttribute");
    }

    #[test]
    fn test_line_and_column() {
        assert_eq!(line_and_column("abc", 0), (1, 1));
        assert_eq!(line_and_column("ab\ncd", 4), (2, 2));
        assert_eq!(line_and_column("ab", 99), (1, 3));
    }
}
