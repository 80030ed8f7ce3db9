//! A JSONPath subset for structured-path extraction.
//!
//! Supported syntax:
//!
//! | Syntax | Meaning |
//! |---|---|
//! | `$` | document root |
//! | `.name`, `['name']`, `["name"]` | object member |
//! | `[2]`, `[-1]` | array element, negative counts from the end |
//! | `.*`, `[*]` | every member or element |
//! | `..name`, `..*` | recursive descent |
//!
//! A path without wildcards or descent is *definite* and selects at most one
//! node.

use serde_json::Value as Json;
use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("invalid JSONPath at offset {offset}: {message}")]
pub struct JsonPathError {
    pub offset: usize,
    pub message: String,
}

#[derive(Debug, Clone, PartialEq)]
enum Segment {
    Member(String),
    Index(i64),
    Wildcard,
    /// `..name` (`Some`) or `..*` (`None`)
    Descendant(Option<String>),
}

/// A parsed path
#[derive(Debug, Clone, PartialEq)]
pub struct JsonPath {
    segments: Vec<Segment>,
}

struct Parser<'a> {
    chars: Vec<char>,
    pos: usize,
    source: &'a str,
}

impl<'a> Parser<'a> {
    fn new(source: &'a str) -> Self {
        Self {
            chars: source.chars().collect(),
            pos: 0,
            source,
        }
    }

    fn error(&self, message: impl Into<String>) -> JsonPathError {
        JsonPathError {
            offset: self.pos,
            message: message.into(),
        }
    }

    fn peek(&self) -> Option<char> {
        self.chars.get(self.pos).copied()
    }

    fn eat(&mut self, c: char) -> bool {
        if self.peek() == Some(c) {
            self.pos += 1;
            true
        } else {
            false
        }
    }

    fn parse(mut self) -> Result<JsonPath, JsonPathError> {
        let source = self.source.trim();
        if source.is_empty() {
            return Err(self.error("path is empty"));
        }
        if !self.eat('$') {
            return Err(self.error("path must start with '$'"));
        }

        let mut segments = Vec::new();
        while let Some(c) = self.peek() {
            match c {
                '.' => {
                    self.pos += 1;
                    if self.eat('.') {
                        segments.push(self.descendant()?);
                    } else if self.eat('*') {
                        segments.push(Segment::Wildcard);
                    } else {
                        segments.push(Segment::Member(self.name()?));
                    }
                }
                '[' => segments.push(self.bracket()?),
                other => return Err(self.error(format!("unexpected character '{}'", other))),
            }
        }

        Ok(JsonPath { segments })
    }

    fn descendant(&mut self) -> Result<Segment, JsonPathError> {
        if self.eat('*') {
            return Ok(Segment::Descendant(None));
        }
        if self.peek() == Some('[') {
            return match self.bracket()? {
                Segment::Member(name) => Ok(Segment::Descendant(Some(name))),
                Segment::Wildcard => Ok(Segment::Descendant(None)),
                _ => Err(self.error("only member names may follow '..'")),
            };
        }
        Ok(Segment::Descendant(Some(self.name()?)))
    }

    fn name(&mut self) -> Result<String, JsonPathError> {
        let start = self.pos;
        while let Some(c) = self.peek() {
            if c == '.' || c == '[' {
                break;
            }
            self.pos += 1;
        }
        if self.pos == start {
            return Err(self.error("expected a member name"));
        }
        Ok(self.chars[start..self.pos].iter().collect())
    }

    fn bracket(&mut self) -> Result<Segment, JsonPathError> {
        self.eat('[');
        let segment = match self.peek() {
            Some(quote @ ('\'' | '"')) => {
                self.pos += 1;
                Segment::Member(self.quoted(quote)?)
            }
            Some('*') => {
                self.pos += 1;
                Segment::Wildcard
            }
            Some(_) => {
                let start = self.pos;
                while matches!(self.peek(), Some(c) if c == '-' || c.is_ascii_digit()) {
                    self.pos += 1;
                }
                let digits: String = self.chars[start..self.pos].iter().collect();
                let index = digits
                    .parse::<i64>()
                    .map_err(|_| self.error("expected an array index"))?;
                Segment::Index(index)
            }
            None => return Err(self.error("unterminated '['")),
        };
        if !self.eat(']') {
            return Err(self.error("expected ']'"));
        }
        Ok(segment)
    }

    fn quoted(&mut self, quote: char) -> Result<String, JsonPathError> {
        let mut out = String::new();
        loop {
            match self.peek() {
                None => return Err(self.error("unterminated string")),
                Some('\\') => {
                    self.pos += 1;
                    match self.peek() {
                        Some(c) => {
                            out.push(c);
                            self.pos += 1;
                        }
                        None => return Err(self.error("unterminated escape")),
                    }
                }
                Some(c) if c == quote => {
                    self.pos += 1;
                    return Ok(out);
                }
                Some(c) => {
                    out.push(c);
                    self.pos += 1;
                }
            }
        }
    }
}

impl JsonPath {
    pub fn parse(source: &str) -> Result<Self, JsonPathError> {
        Parser::new(source.trim()).parse()
    }

    /// True if the path can select at most one node
    pub fn is_definite(&self) -> bool {
        self.segments
            .iter()
            .all(|s| matches!(s, Segment::Member(_) | Segment::Index(_)))
    }

    /// All nodes selected by the path, in document order
    pub fn query<'j>(&self, root: &'j Json) -> Vec<&'j Json> {
        let mut current = vec![root];
        for segment in &self.segments {
            let mut next = Vec::new();
            for node in current {
                select(segment, node, &mut next);
            }
            current = next;
        }
        current
    }
}

fn select<'j>(segment: &Segment, node: &'j Json, out: &mut Vec<&'j Json>) {
    match segment {
        Segment::Member(name) => {
            if let Some(child) = node.as_object().and_then(|o| o.get(name)) {
                out.push(child);
            }
        }
        Segment::Index(index) => {
            if let Some(array) = node.as_array() {
                let len = array.len() as i64;
                let resolved = if *index < 0 { len + index } else { *index };
                if (0..len).contains(&resolved) {
                    out.push(&array[resolved as usize]);
                }
            }
        }
        Segment::Wildcard => children(node, out),
        Segment::Descendant(name) => {
            let mut all = Vec::new();
            descendants(node, &mut all);
            for n in all {
                match name {
                    Some(name) => select(&Segment::Member(name.clone()), n, out),
                    None => children(n, out),
                }
            }
        }
    }
}

fn children<'j>(node: &'j Json, out: &mut Vec<&'j Json>) {
    match node {
        Json::Object(map) => out.extend(map.values()),
        Json::Array(items) => out.extend(items.iter()),
        _ => {}
    }
}

/// `node` and everything below it, pre-order
fn descendants<'j>(node: &'j Json, out: &mut Vec<&'j Json>) {
    out.push(node);
    let mut kids = Vec::new();
    children(node, &mut kids);
    for kid in kids {
        descendants(kid, out);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn doc() -> Json {
        json!({
            "store": {
                "book": [
                    {"title": "A", "price": 8.95},
                    {"title": "B", "price": 12.99}
                ],
                "name.with.dots": "dots"
            }
        })
    }

    #[test]
    fn test_member_and_index() {
        let doc = doc();
        let path = JsonPath::parse("$.store.book[1].title").unwrap();
        assert!(path.is_definite());
        assert_eq!(path.query(&doc), vec![&json!("B")]);

        let path = JsonPath::parse("$.store.book[-1].price").unwrap();
        assert_eq!(path.query(&doc), vec![&json!(12.99)]);
    }

    #[test]
    fn test_bracket_quoted_member() {
        let doc = doc();
        let path = JsonPath::parse("$.store['name.with.dots']").unwrap();
        assert_eq!(path.query(&doc), vec![&json!("dots")]);
        let path = JsonPath::parse(r#"$["store"]["book"][0]["title"]"#).unwrap();
        assert_eq!(path.query(&doc), vec![&json!("A")]);
    }

    #[test]
    fn test_wildcards_and_descent() {
        let doc = doc();
        let path = JsonPath::parse("$.store.book[*].title").unwrap();
        assert!(!path.is_definite());
        assert_eq!(path.query(&doc), vec![&json!("A"), &json!("B")]);

        let path = JsonPath::parse("$..price").unwrap();
        assert_eq!(path.query(&doc), vec![&json!(8.95), &json!(12.99)]);
    }

    #[test]
    fn test_no_match() {
        let doc = doc();
        assert!(JsonPath::parse("$.missing").unwrap().query(&doc).is_empty());
        assert!(JsonPath::parse("$.store.book[5]").unwrap().query(&doc).is_empty());
    }

    #[test]
    fn test_parse_errors() {
        assert!(JsonPath::parse("").is_err());
        assert!(JsonPath::parse("store").is_err());
        assert!(JsonPath::parse("$.").is_err());
        assert!(JsonPath::parse("$[abc]").is_err());
        assert!(JsonPath::parse("$['open").is_err());
    }
}
