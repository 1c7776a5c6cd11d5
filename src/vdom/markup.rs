//! Minimal markup parser.
//!
//! String children that look like markup, and the `html` prop, are parsed
//! into virtual nodes so they flow through the same reconciler as
//! builder-constructed trees. The dialect is deliberately small: elements,
//! attributes (quoted or bare), self-closing and void elements, text, and
//! the basic named entities. Anything else is a [`Error::Markup`] and the
//! caller falls back to treating the string as plain text.

use crate::error::Error;
use crate::vdom::vnode::{AttrValue, ClassSpec, Props, VNode};

/// Elements that never take children or a closing tag.
const VOID_ELEMENTS: &[&str] = &[
    "area", "base", "br", "col", "embed", "hr", "img", "input", "link", "meta",
    "source", "track", "wbr",
];

/// Cheap sniff for whether a string child should go through the parser:
/// a `<` immediately followed by a letter.
pub fn looks_like_markup(s: &str) -> bool {
    let bytes = s.as_bytes();
    bytes
        .windows(2)
        .any(|w| w[0] == b'<' && w[1].is_ascii_alphabetic())
}

/// Parse a markup string into a list of sibling nodes.
///
/// Whitespace-only text between elements is dropped; any other text run
/// keeps its spacing.
pub fn parse(input: &str) -> Result<Vec<VNode>, Error> {
    let mut parser = Parser {
        src: input.as_bytes(),
        pos: 0,
    };
    let nodes = parser.parse_children(None)?;
    if parser.pos < parser.src.len() {
        return Err(parser.error("unexpected closing tag"));
    }
    Ok(nodes)
}

struct Parser<'a> {
    src: &'a [u8],
    pos: usize,
}

impl<'a> Parser<'a> {
    fn error(&self, reason: &str) -> Error {
        Error::Markup {
            pos: self.pos,
            reason: reason.to_owned(),
        }
    }

    fn peek(&self) -> Option<u8> {
        self.src.get(self.pos).copied()
    }

    fn starts_with(&self, prefix: &str) -> bool {
        self.src[self.pos..].starts_with(prefix.as_bytes())
    }

    fn skip_whitespace(&mut self) {
        while self.peek().is_some_and(|b| b.is_ascii_whitespace()) {
            self.pos += 1;
        }
    }

    /// Parse siblings until end of input or the closing tag of `parent`.
    /// Leaves the cursor at the closing tag when one is pending.
    fn parse_children(&mut self, parent: Option<&str>) -> Result<Vec<VNode>, Error> {
        let mut nodes = Vec::new();
        loop {
            if self.pos >= self.src.len() {
                if let Some(tag) = parent {
                    return Err(self.error(&format!("unclosed <{tag}>")));
                }
                return Ok(nodes);
            }
            if self.starts_with("</") {
                return Ok(nodes);
            }
            if self.peek() == Some(b'<') {
                nodes.push(self.parse_element()?);
            } else {
                // Whitespace-only runs between elements are formatting, not
                // content; anything else keeps its spacing.
                let text = self.parse_text();
                if !text.trim().is_empty() {
                    nodes.push(VNode::Text(text));
                }
            }
        }
    }

    fn parse_text(&mut self) -> String {
        let start = self.pos;
        while self.peek().is_some_and(|b| b != b'<') {
            self.pos += 1;
        }
        decode_entities(&String::from_utf8_lossy(&self.src[start..self.pos]))
    }

    fn parse_name(&mut self) -> Result<String, Error> {
        let start = self.pos;
        while self
            .peek()
            .is_some_and(|b| b.is_ascii_alphanumeric() || b == b'-' || b == b'_')
        {
            self.pos += 1;
        }
        if self.pos == start {
            return Err(self.error("expected a name"));
        }
        Ok(String::from_utf8_lossy(&self.src[start..self.pos]).into_owned())
    }

    fn parse_element(&mut self) -> Result<VNode, Error> {
        self.pos += 1; // consume '<'
        let tag = self.parse_name()?.to_ascii_lowercase();
        let (props, key) = self.parse_attrs()?;

        let self_closing = if self.starts_with("/>") {
            self.pos += 2;
            true
        } else if self.peek() == Some(b'>') {
            self.pos += 1;
            false
        } else {
            return Err(self.error("malformed tag"));
        };

        let children = if self_closing || VOID_ELEMENTS.contains(&tag.as_str()) {
            Vec::new()
        } else {
            let children = self.parse_children(Some(&tag))?;
            let close = format!("</{tag}>");
            if !self.starts_with(&close) {
                return Err(self.error(&format!("expected {close}")));
            }
            self.pos += close.len();
            children
        };

        Ok(VNode::Element {
            tag,
            props,
            children,
            key,
        })
    }

    fn parse_attrs(&mut self) -> Result<(Props, Option<String>), Error> {
        let mut props = Props::new();
        let mut key = None;
        loop {
            self.skip_whitespace();
            match self.peek() {
                Some(b'>') | Some(b'/') => break,
                None => return Err(self.error("unterminated tag")),
                _ => {}
            }
            let name = self.parse_name()?;
            let value = if self.peek() == Some(b'=') {
                self.pos += 1;
                Some(self.parse_attr_value()?)
            } else {
                None
            };
            match (name.as_str(), value) {
                // bare attribute, boolean true
                (_, None) => {
                    props.attrs.insert(name, AttrValue::Bool(true));
                }
                ("class", Some(v)) => props.class = Some(ClassSpec::Name(v)),
                ("style", Some(v)) => {
                    for decl in v.split(';') {
                        if let Some((prop, value)) = decl.split_once(':') {
                            props
                                .style
                                .insert(prop.trim().to_owned(), value.trim().to_owned());
                        }
                    }
                }
                ("key", Some(v)) => key = Some(v),
                (_, Some(v)) => {
                    props.attrs.insert(name, AttrValue::Str(v));
                }
            }
        }
        Ok((props, key))
    }

    fn parse_attr_value(&mut self) -> Result<String, Error> {
        match self.peek() {
            Some(quote @ (b'"' | b'\'')) => {
                self.pos += 1;
                let start = self.pos;
                while self.peek().is_some_and(|b| b != quote) {
                    self.pos += 1;
                }
                if self.peek().is_none() {
                    return Err(self.error("unterminated attribute value"));
                }
                let value = String::from_utf8_lossy(&self.src[start..self.pos]).into_owned();
                self.pos += 1;
                Ok(decode_entities(&value))
            }
            Some(_) => {
                let start = self.pos;
                while self
                    .peek()
                    .is_some_and(|b| !b.is_ascii_whitespace() && b != b'>' && b != b'/')
                {
                    self.pos += 1;
                }
                if self.pos == start {
                    return Err(self.error("empty attribute value"));
                }
                Ok(String::from_utf8_lossy(&self.src[start..self.pos]).into_owned())
            }
            None => Err(self.error("unterminated attribute value")),
        }
    }
}

fn decode_entities(text: &str) -> String {
    if !text.contains('&') {
        return text.to_owned();
    }
    text.replace("&lt;", "<")
        .replace("&gt;", ">")
        .replace("&quot;", "\"")
        .replace("&apos;", "'")
        .replace("&amp;", "&")
}
