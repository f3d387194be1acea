//! Tag-annotated template parsing.
//!
//! The template is an XML-like document: a single wrapper element whose
//! children are literal SQL text interleaved with `if`/`elsif`/`else` chains
//! and `a` expansion tags. Only the subset needed by the pruner is accepted.

use crate::error::{Error, Result};
use crate::template::params::is_placeholder_name;

/// Default separator for expansion tags without a `sep` attribute.
pub const DEFAULT_SEPARATOR: &str = ", ";

/// Parsed template node.
#[derive(Clone, Debug, PartialEq)]
pub enum Node {
    /// Literal text with entities decoded.
    Text(String),
    /// `if` / `elsif`* / `else`? chain.
    Chain(Chain),
    /// Array placeholder expansion.
    Expand {
        /// Placeholder name without the `:` sigil.
        name: String,
        /// Separator emitted between the expanded placeholders.
        sep: String,
    },
}

/// Ordered conditional chain.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct Chain {
    /// `if` followed by every `elsif`, in source order.
    pub branches: Vec<Branch>,
    /// Body of the trailing `else`, if any.
    pub otherwise: Option<Vec<Node>>,
}

/// One guarded branch of a [`Chain`].
#[derive(Clone, Debug, PartialEq)]
pub struct Branch {
    /// Explicit `c` expression; `None` means the implicit guard applies.
    pub condition: Option<String>,
    /// Branch body.
    pub body: Vec<Node>,
}

impl Branch {
    /// Returns true when the branch has no `c` attribute.
    pub fn is_implicit(&self) -> bool {
        self.condition.is_none()
    }
}

/// Parses `source` and returns the children of its wrapper element.
pub fn parse_template(source: &str) -> Result<Vec<Node>> {
    let events = Lexer::new(source).run()?;
    let mut builder = Builder {
        source,
        events,
        pos: 0,
    };
    builder.document()
}

#[derive(Clone, Debug)]
enum Event {
    Text(String),
    Start {
        name: String,
        attrs: Vec<(String, String)>,
        empty: bool,
    },
    End {
        name: String,
    },
}

#[derive(Clone, Debug)]
struct Located {
    event: Event,
    offset: usize,
}

/// Converts a byte offset into a one-based line and column.
fn line_col(source: &str, offset: usize) -> (usize, usize) {
    let prefix = &source[..offset.min(source.len())];
    let line = prefix.matches('\n').count() + 1;
    let column = prefix
        .rfind('\n')
        .map_or(prefix.chars().count(), |nl| prefix[nl + 1..].chars().count())
        + 1;
    (line, column)
}

fn malformed(source: &str, offset: usize, message: impl Into<String>) -> Error {
    let (line, column) = line_col(source, offset);
    Error::MalformedTemplate {
        line,
        column,
        message: message.into(),
    }
}

struct Lexer<'a> {
    source: &'a str,
    pos: usize,
    events: Vec<Located>,
}

impl<'a> Lexer<'a> {
    fn new(source: &'a str) -> Self {
        Self {
            source,
            pos: 0,
            events: Vec::new(),
        }
    }

    fn rest(&self) -> &'a str {
        &self.source[self.pos..]
    }

    fn err(&self, offset: usize, message: impl Into<String>) -> Error {
        malformed(self.source, offset, message)
    }

    fn push(&mut self, event: Event, offset: usize) {
        self.events.push(Located { event, offset });
    }

    fn run(mut self) -> Result<Vec<Located>> {
        while self.pos < self.source.len() {
            let start = self.pos;
            let rest = self.rest();
            if rest.starts_with("<!--") {
                let end = rest
                    .find("-->")
                    .ok_or_else(|| self.err(start, "unterminated comment"))?;
                self.pos += end + 3;
            } else if let Some(body) = rest.strip_prefix("<![CDATA[") {
                let end = body
                    .find("]]>")
                    .ok_or_else(|| self.err(start, "unterminated CDATA section"))?;
                self.push(Event::Text(body[..end].to_owned()), start);
                self.pos += "<![CDATA[".len() + end + 3;
            } else if rest.starts_with("<?") {
                let end = rest
                    .find("?>")
                    .ok_or_else(|| self.err(start, "unterminated processing instruction"))?;
                self.pos += end + 2;
            } else if rest.starts_with("</") {
                self.pos += 2;
                let name = self.name()?;
                self.skip_ws();
                self.expect(">", start, "expected '>' to close end tag")?;
                self.push(Event::End { name }, start);
            } else if rest.starts_with('<') {
                self.pos += 1;
                self.start_tag(start)?;
            } else {
                let len = rest.find('<').unwrap_or(rest.len());
                let text = decode_entities(self.source, start, &rest[..len])?;
                self.pos += len;
                self.push(Event::Text(text), start);
            }
        }
        Ok(self.events)
    }

    fn skip_ws(&mut self) {
        let skipped = self.rest().len() - self.rest().trim_start().len();
        self.pos += skipped;
    }

    fn expect(&mut self, token: &str, tag_start: usize, message: &str) -> Result<()> {
        if self.rest().starts_with(token) {
            self.pos += token.len();
            Ok(())
        } else if self.pos >= self.source.len() {
            Err(self.err(tag_start, "unterminated tag"))
        } else {
            Err(self.err(self.pos, message))
        }
    }

    fn name(&mut self) -> Result<String> {
        let rest = self.rest();
        let starts_ok = rest
            .chars()
            .next()
            .is_some_and(|c| c.is_ascii_alphabetic() || c == '_');
        if !starts_ok {
            return Err(self.err(self.pos, "expected a name"));
        }
        let len = rest
            .bytes()
            .take_while(|b| b.is_ascii_alphanumeric() || matches!(b, b'_' | b'-' | b'.' | b':'))
            .count();
        self.pos += len;
        Ok(rest[..len].to_owned())
    }

    fn start_tag(&mut self, start: usize) -> Result<()> {
        let name = self.name()?;
        let mut attrs: Vec<(String, String)> = Vec::new();
        loop {
            let before_ws = self.pos;
            self.skip_ws();
            let rest = self.rest();
            if rest.starts_with("/>") {
                self.pos += 2;
                self.push(Event::Start { name, attrs, empty: true }, start);
                return Ok(());
            }
            if rest.starts_with('>') {
                self.pos += 1;
                self.push(Event::Start { name, attrs, empty: false }, start);
                return Ok(());
            }
            if rest.is_empty() {
                return Err(self.err(start, "unterminated tag"));
            }
            if self.pos == before_ws {
                return Err(self.err(self.pos, "expected whitespace before attribute"));
            }
            let attr_at = self.pos;
            let attr = self.name()?;
            self.skip_ws();
            self.expect("=", start, "expected '=' after attribute name")?;
            self.skip_ws();
            let quote = match self.rest().chars().next() {
                Some(q @ ('\'' | '"')) => q,
                _ => return Err(self.err(self.pos, "attribute value must be quoted")),
            };
            let value_start = self.pos + 1;
            let len = self.source[value_start..]
                .find(quote)
                .ok_or_else(|| self.err(attr_at, "unterminated attribute value"))?;
            let raw = &self.source[value_start..value_start + len];
            if raw.contains('<') {
                return Err(self.err(value_start, "'<' is not allowed in attribute values"));
            }
            let value = decode_entities(self.source, value_start, raw)?;
            self.pos = value_start + len + 1;
            if attrs.iter().any(|(existing, _)| *existing == attr) {
                return Err(self.err(attr_at, format!("duplicate attribute '{attr}'")));
            }
            attrs.push((attr, value));
        }
    }
}

/// Decodes the predefined entities and numeric character references in `raw`,
/// which starts at byte `base` of `source`.
fn decode_entities(source: &str, base: usize, raw: &str) -> Result<String> {
    if !raw.contains('&') {
        return Ok(raw.to_owned());
    }
    let mut out = String::with_capacity(raw.len());
    let mut rest = raw;
    let mut consumed = 0;
    while let Some(amp) = rest.find('&') {
        out.push_str(&rest[..amp]);
        let at = base + consumed + amp;
        let after = &rest[amp + 1..];
        let semi = after
            .find(';')
            .filter(|idx| *idx <= 10)
            .ok_or_else(|| malformed(source, at, "unterminated entity reference"))?;
        let entity = &after[..semi];
        let decoded = match entity {
            "lt" => Some('<'),
            "gt" => Some('>'),
            "amp" => Some('&'),
            "quot" => Some('"'),
            "apos" => Some('\''),
            _ => entity.strip_prefix('#').and_then(|num| {
                let code = match num.strip_prefix('x').or_else(|| num.strip_prefix('X')) {
                    Some(hex) => u32::from_str_radix(hex, 16).ok(),
                    None => num.parse::<u32>().ok(),
                };
                code.and_then(char::from_u32)
            }),
        };
        let ch = decoded
            .ok_or_else(|| malformed(source, at, format!("unknown entity '&{entity};'")))?;
        out.push(ch);
        let step = amp + 1 + semi + 1;
        consumed += step;
        rest = &rest[step..];
    }
    out.push_str(rest);
    Ok(out)
}

struct Builder<'a> {
    source: &'a str,
    events: Vec<Located>,
    pos: usize,
}

/// Where a run of children lives; decides which tags are legal.
#[derive(Clone, Copy, PartialEq, Eq)]
enum Scope {
    Root,
    ImplicitBranch,
    Body,
}

impl Builder<'_> {
    fn err(&self, offset: usize, message: impl Into<String>) -> Error {
        malformed(self.source, offset, message)
    }

    fn eof_offset(&self) -> usize {
        self.source.len()
    }

    fn document(&mut self) -> Result<Vec<Node>> {
        self.skip_blank_text()?;
        let Some(located) = self.events.get(self.pos).cloned() else {
            return Err(self.err(self.eof_offset(), "template has no root element"));
        };
        let (root, empty) = match located.event {
            Event::Start { name, empty, .. } => (name, empty),
            _ => return Err(self.err(located.offset, "expected the root element")),
        };
        self.pos += 1;
        let nodes = if empty {
            Vec::new()
        } else {
            self.children(&root, located.offset, Scope::Root)?
        };
        self.skip_blank_text()?;
        if let Some(extra) = self.events.get(self.pos) {
            return Err(self.err(extra.offset, "content after the root element"));
        }
        Ok(nodes)
    }

    fn skip_blank_text(&mut self) -> Result<()> {
        while let Some(located) = self.events.get(self.pos) {
            match &located.event {
                Event::Text(text) if text.trim().is_empty() => self.pos += 1,
                Event::Text(_) => {
                    return Err(self.err(located.offset, "text outside the root element"))
                }
                _ => break,
            }
        }
        Ok(())
    }

    /// Consumes children up to and including `</parent>`.
    fn children(&mut self, parent: &str, opened_at: usize, scope: Scope) -> Result<Vec<Node>> {
        let mut nodes: Vec<Node> = Vec::new();
        loop {
            let Some(located) = self.events.get(self.pos).cloned() else {
                return Err(self.err(opened_at, format!("element '{parent}' is not closed")));
            };
            self.pos += 1;
            match located.event {
                Event::Text(text) => push_text(&mut nodes, text),
                Event::End { name } if name == parent => return Ok(nodes),
                Event::End { name } => {
                    return Err(self.err(
                        located.offset,
                        format!("expected '</{parent}>' but found '</{name}>'"),
                    ))
                }
                Event::Start { name, attrs, empty } => match name.as_str() {
                    "if" => {
                        let (chain, gap) = self.chain(attrs, empty, located.offset)?;
                        nodes.push(Node::Chain(chain));
                        if !gap.is_empty() {
                            nodes.push(Node::Text(gap));
                        }
                    }
                    "a" if scope == Scope::ImplicitBranch => {
                        nodes.push(self.expansion(attrs, empty, located.offset)?);
                    }
                    "a" => {
                        return Err(self.err(
                            located.offset,
                            "<a> must be a direct child of an <if> without a condition",
                        ))
                    }
                    "elsif" | "else" => {
                        return Err(self.err(
                            located.offset,
                            format!("<{name}> does not follow an <if> or <elsif>"),
                        ))
                    }
                    other => {
                        return Err(self.err(located.offset, format!("unknown tag <{other}>")))
                    }
                },
            }
        }
    }

    fn chain(
        &mut self,
        attrs: Vec<(String, String)>,
        empty: bool,
        offset: usize,
    ) -> Result<(Chain, String)> {
        let mut chain = Chain::default();
        let mut gap = String::new();
        let condition = self.condition("if", attrs, false, offset)?;
        chain.branches.push(self.branch("if", condition, empty, offset)?);
        while let Some((name, attrs, empty, at)) = self.next_chain_member(&mut gap) {
            if name == "else" {
                if let Some((attr, _)) = attrs.first() {
                    return Err(self.err(at, format!("unknown attribute '{attr}' on <else>")));
                }
                let body = if empty {
                    Vec::new()
                } else {
                    self.children("else", at, Scope::Body)?
                };
                chain.otherwise = Some(body);
                break;
            }
            let condition = self.condition("elsif", attrs, true, at)?;
            chain.branches.push(self.branch("elsif", condition, empty, at)?);
        }
        Ok((chain, gap))
    }

    fn branch(
        &mut self,
        tag: &str,
        condition: Option<String>,
        empty: bool,
        offset: usize,
    ) -> Result<Branch> {
        let scope = if condition.is_none() {
            Scope::ImplicitBranch
        } else {
            Scope::Body
        };
        let body = if empty {
            Vec::new()
        } else {
            self.children(tag, offset, scope)?
        };
        Ok(Branch { condition, body })
    }

    fn condition(
        &self,
        tag: &str,
        attrs: Vec<(String, String)>,
        required: bool,
        offset: usize,
    ) -> Result<Option<String>> {
        let mut condition = None;
        for (name, value) in attrs {
            if name != "c" {
                return Err(self.err(offset, format!("unknown attribute '{name}' on <{tag}>")));
            }
            if value.trim().is_empty() {
                return Err(self.err(offset, format!("empty condition on <{tag}>")));
            }
            condition = Some(value);
        }
        if required && condition.is_none() {
            return Err(self.err(offset, format!("<{tag}> requires a 'c' attribute")));
        }
        Ok(condition)
    }

    /// Consumes the next `elsif`/`else` start tag together with the blank
    /// text in front of it, which is appended to `gap`. Leaves the stream
    /// untouched otherwise.
    fn next_chain_member(
        &mut self,
        gap: &mut String,
    ) -> Option<(String, Vec<(String, String)>, bool, usize)> {
        let mut idx = self.pos;
        while let Some(located) = self.events.get(idx) {
            match &located.event {
                Event::Text(text) if text.trim().is_empty() => idx += 1,
                Event::Start { name, attrs, empty } if name == "elsif" || name == "else" => {
                    for skipped in &self.events[self.pos..idx] {
                        if let Event::Text(text) = &skipped.event {
                            gap.push_str(text);
                        }
                    }
                    self.pos = idx + 1;
                    return Some((name.clone(), attrs.clone(), *empty, located.offset));
                }
                _ => return None,
            }
        }
        None
    }

    fn expansion(&mut self, attrs: Vec<(String, String)>, empty: bool, offset: usize) -> Result<Node> {
        let mut sep = DEFAULT_SEPARATOR.to_owned();
        for (name, value) in attrs {
            if name != "sep" {
                return Err(self.err(offset, format!("unknown attribute '{name}' on <a>")));
            }
            sep = value;
        }
        if empty {
            return Err(self.err(offset, "<a> must contain a single :placeholder"));
        }
        let body = self.children_text("a", offset)?;
        let trimmed = body.trim();
        let name = trimmed
            .strip_prefix(':')
            .filter(|name| is_placeholder_name(name))
            .ok_or_else(|| self.err(offset, "<a> must contain a single :placeholder"))?;
        Ok(Node::Expand {
            name: name.to_owned(),
            sep,
        })
    }

    /// Collects plain text up to `</tag>`; nested elements are rejected.
    fn children_text(&mut self, tag: &str, opened_at: usize) -> Result<String> {
        let mut text = String::new();
        loop {
            let Some(located) = self.events.get(self.pos).cloned() else {
                return Err(self.err(opened_at, format!("element '{tag}' is not closed")));
            };
            self.pos += 1;
            match located.event {
                Event::Text(chunk) => text.push_str(&chunk),
                Event::End { name } if name == tag => return Ok(text),
                _ => {
                    return Err(self.err(
                        located.offset,
                        format!("<{tag}> must contain a single :placeholder"),
                    ))
                }
            }
        }
    }
}

fn push_text(nodes: &mut Vec<Node>, text: String) {
    if let Some(Node::Text(previous)) = nodes.last_mut() {
        previous.push_str(&text);
    } else {
        nodes.push(Node::Text(text));
    }
}
