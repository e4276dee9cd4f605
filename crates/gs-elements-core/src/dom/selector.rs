//! CSS selectors for element queries.
//!
//! Supports type, universal, `#id`, `.class` and attribute selectors,
//! descendant and child combinators, and comma-separated lists.
//! Matching runs right to left and never leaves the tree (light DOM or
//! shadow tree) the subject lives in.

use std::fmt;

use cssparser::{ParseError as CssParseError, Parser, ParserInput, Token};

use super::NodeId;
use super::document::Document;
use super::node::{ElementData, Node};
use crate::error::{CoreError, Result};

/// A comma-separated list of selectors. Matches if any selector matches.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct SelectorList(pub Vec<Selector>);

/// A complex selector (e.g., `gs-panel > .body [slot=title]`).
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Selector {
    /// Compound selectors, left to right.
    pub parts: Vec<SelectorPart>,
    /// Combinators between parts (length = parts.len() - 1).
    pub combinators: Vec<Combinator>,
}

/// A compound selector (e.g., `gs-button.primary[disabled]`).
#[derive(Debug, Clone, PartialEq, Eq, Hash, Default)]
pub struct SelectorPart {
    pub type_selector: Option<TypeSelector>,
    pub id: Option<String>,
    pub classes: Vec<String>,
    pub attributes: Vec<AttributeSelector>,
}

/// Type selector - matches the tag name.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum TypeSelector {
    Universal,
    Type(String),
}

/// Relationship between two compound selectors.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Combinator {
    /// Whitespace: any ancestor.
    Descendant,
    /// `>`: the direct parent.
    Child,
}

/// `[name]` or `[name <op> value]`.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct AttributeSelector {
    pub name: String,
    pub operation: Option<(AttributeOp, String)>,
}

/// Attribute value operators.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AttributeOp {
    /// `=`
    Equals,
    /// `~=`: whitespace-separated word.
    Includes,
    /// `|=`: exact or followed by `-`.
    DashMatch,
    /// `^=`
    Prefix,
    /// `$=`
    Suffix,
    /// `*=`
    Substring,
}

impl SelectorList {
    /// Parse a selector list.
    pub fn parse(input: &str) -> Result<Self> {
        let mut parser_input = ParserInput::new(input);
        let mut parser = Parser::new(&mut parser_input);
        let mut selectors = Vec::new();
        let mut builder = SelectorBuilder::default();

        loop {
            let token = match parser.next_including_whitespace() {
                Ok(t) => t.clone(),
                Err(_) => break,
            };

            match token {
                Token::WhiteSpace(_) => builder.whitespace(),
                Token::Comma => {
                    selectors.push(std::mem::take(&mut builder).finish(input)?);
                }
                Token::Delim('>') => builder.child(input)?,
                Token::Ident(name) => {
                    let part = builder.begin_compound(input)?;
                    if !is_empty_part(part) {
                        return Err(CoreError::invalid_selector(input, "unexpected type selector"));
                    }
                    part.type_selector = Some(TypeSelector::Type(name.to_ascii_lowercase()));
                }
                Token::Delim('*') => {
                    let part = builder.begin_compound(input)?;
                    if !is_empty_part(part) {
                        return Err(CoreError::invalid_selector(input, "unexpected '*'"));
                    }
                    part.type_selector = Some(TypeSelector::Universal);
                }
                Token::Delim('.') => {
                    let class = parser
                        .expect_ident()
                        .map_err(|_| CoreError::invalid_selector(input, "expected class name after '.'"))?
                        .to_string();
                    builder.begin_compound(input)?.classes.push(class);
                }
                Token::IDHash(id) | Token::Hash(id) => {
                    let part = builder.begin_compound(input)?;
                    if part.id.is_some() {
                        return Err(CoreError::invalid_selector(input, "duplicate id selector"));
                    }
                    part.id = Some(id.to_string());
                }
                Token::SquareBracketBlock => {
                    let attribute = parser
                        .parse_nested_block(|p| parse_attribute(p))
                        .map_err(|_: CssParseError<'_, ()>| {
                            CoreError::invalid_selector(input, "invalid attribute selector")
                        })?;
                    builder.begin_compound(input)?.attributes.push(attribute);
                }
                Token::Colon => {
                    return Err(CoreError::invalid_selector(input, "pseudo-classes are not supported"));
                }
                other => {
                    return Err(CoreError::invalid_selector(
                        input,
                        format!("unexpected token {other:?}"),
                    ));
                }
            }
        }

        selectors.push(builder.finish(input)?);
        Ok(Self(selectors))
    }

    /// Check if any selector in the list matches `node`.
    pub fn matches(&self, document: &Document, node: NodeId) -> bool {
        self.0.iter().any(|s| s.matches(document, node))
    }
}

impl Selector {
    /// Check if the selector matches `node`, considering combinators.
    pub fn matches(&self, document: &Document, node: NodeId) -> bool {
        match self.parts.len() {
            0 => false,
            n => self.match_from(document, n - 1, node),
        }
    }

    fn match_from(&self, document: &Document, index: usize, node: NodeId) -> bool {
        let Some(element) = document.node(node).and_then(Node::as_element) else {
            return false;
        };
        if !self.parts[index].matches(element) {
            return false;
        }
        if index == 0 {
            return true;
        }

        match self.combinators[index - 1] {
            Combinator::Child => parent_element(document, node)
                .is_some_and(|parent| self.match_from(document, index - 1, parent)),
            Combinator::Descendant => {
                let mut current = parent_element(document, node);
                while let Some(ancestor) = current {
                    if self.match_from(document, index - 1, ancestor) {
                        return true;
                    }
                    current = parent_element(document, ancestor);
                }
                false
            }
        }
    }
}

impl SelectorPart {
    /// Check if this compound selector matches an element.
    pub fn matches(&self, element: &ElementData) -> bool {
        if let Some(TypeSelector::Type(tag)) = &self.type_selector {
            if *tag != element.tag {
                return false;
            }
        }

        if let Some(id) = &self.id {
            if element.get_attr("id") != Some(id.as_str()) {
                return false;
            }
        }

        if !self.classes.iter().all(|c| element.has_class(c)) {
            return false;
        }

        self.attributes.iter().all(|a| a.matches(element))
    }
}

impl AttributeSelector {
    fn matches(&self, element: &ElementData) -> bool {
        let Some(actual) = element.get_attr(&self.name) else {
            return false;
        };
        let Some((op, expected)) = &self.operation else {
            return true;
        };
        let expected = expected.as_str();
        match op {
            AttributeOp::Equals => actual == expected,
            AttributeOp::Includes => actual.split_ascii_whitespace().any(|w| w == expected),
            AttributeOp::DashMatch => {
                actual == expected
                    || actual
                        .strip_prefix(expected)
                        .is_some_and(|rest| rest.starts_with('-'))
            }
            AttributeOp::Prefix => !expected.is_empty() && actual.starts_with(expected),
            AttributeOp::Suffix => !expected.is_empty() && actual.ends_with(expected),
            AttributeOp::Substring => !expected.is_empty() && actual.contains(expected),
        }
    }
}

fn parent_element(document: &Document, node: NodeId) -> Option<NodeId> {
    document.parent(node).filter(|&p| document.is_element(p))
}

fn is_empty_part(part: &SelectorPart) -> bool {
    part.type_selector.is_none()
        && part.id.is_none()
        && part.classes.is_empty()
        && part.attributes.is_empty()
}

fn parse_attribute<'i>(
    parser: &mut Parser<'i, '_>,
) -> std::result::Result<AttributeSelector, CssParseError<'i, ()>> {
    let name = parser.expect_ident()?.to_ascii_lowercase();
    if parser.is_exhausted() {
        return Ok(AttributeSelector {
            name,
            operation: None,
        });
    }

    let op = match parser.next()?.clone() {
        Token::Delim('=') => AttributeOp::Equals,
        Token::IncludeMatch => AttributeOp::Includes,
        Token::DashMatch => AttributeOp::DashMatch,
        Token::PrefixMatch => AttributeOp::Prefix,
        Token::SuffixMatch => AttributeOp::Suffix,
        Token::SubstringMatch => AttributeOp::Substring,
        _ => return Err(parser.new_custom_error(())),
    };
    let value = match parser.next()?.clone() {
        Token::Ident(v) | Token::QuotedString(v) => v.to_string(),
        _ => return Err(parser.new_custom_error(())),
    };
    parser.expect_exhausted()?;

    Ok(AttributeSelector {
        name,
        operation: Some((op, value)),
    })
}

#[derive(Default)]
struct SelectorBuilder {
    parts: Vec<SelectorPart>,
    combinators: Vec<Combinator>,
    current: SelectorPart,
    pending: Option<Combinator>,
}

impl SelectorBuilder {
    fn whitespace(&mut self) {
        if !is_empty_part(&self.current) && self.pending.is_none() {
            self.pending = Some(Combinator::Descendant);
        }
    }

    fn child(&mut self, input: &str) -> Result<()> {
        if is_empty_part(&self.current) {
            return Err(CoreError::invalid_selector(input, "combinator without left-hand side"));
        }
        self.pending = Some(Combinator::Child);
        Ok(())
    }

    /// Apply any pending combinator and return the compound being built.
    fn begin_compound(&mut self, input: &str) -> Result<&mut SelectorPart> {
        if let Some(combinator) = self.pending.take() {
            if is_empty_part(&self.current) {
                return Err(CoreError::invalid_selector(input, "combinator without left-hand side"));
            }
            self.parts.push(std::mem::take(&mut self.current));
            self.combinators.push(combinator);
        }
        Ok(&mut self.current)
    }

    fn finish(mut self, input: &str) -> Result<Selector> {
        if self.pending == Some(Combinator::Child) || is_empty_part(&self.current) {
            return Err(CoreError::invalid_selector(input, "empty or incomplete selector"));
        }
        self.parts.push(self.current);
        Ok(Selector {
            parts: self.parts,
            combinators: self.combinators,
        })
    }
}

impl fmt::Display for SelectorList {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, selector) in self.0.iter().enumerate() {
            if i > 0 {
                write!(f, ", ")?;
            }
            write!(f, "{}", selector)?;
        }
        Ok(())
    }
}

impl fmt::Display for Selector {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, part) in self.parts.iter().enumerate() {
            if i > 0 {
                match self.combinators[i - 1] {
                    Combinator::Descendant => write!(f, " ")?,
                    Combinator::Child => write!(f, " > ")?,
                }
            }
            write!(f, "{}", part)?;
        }
        Ok(())
    }
}

impl fmt::Display for SelectorPart {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.type_selector {
            Some(TypeSelector::Universal) => write!(f, "*")?,
            Some(TypeSelector::Type(t)) => write!(f, "{}", t)?,
            None => {}
        }
        if let Some(id) = &self.id {
            write!(f, "#{}", id)?;
        }
        for class in &self.classes {
            write!(f, ".{}", class)?;
        }
        for attr in &self.attributes {
            match &attr.operation {
                None => write!(f, "[{}]", attr.name)?,
                Some((op, value)) => {
                    let op = match op {
                        AttributeOp::Equals => "=",
                        AttributeOp::Includes => "~=",
                        AttributeOp::DashMatch => "|=",
                        AttributeOp::Prefix => "^=",
                        AttributeOp::Suffix => "$=",
                        AttributeOp::Substring => "*=",
                    };
                    write!(f, "[{}{}\"{}\"]", attr.name, op, value)?;
                }
            }
        }
        Ok(())
    }
}

impl Document {
    /// All descendant elements of `scope` matching a parsed selector list,
    /// in document order. Nested shadow trees are not entered.
    pub fn select_all(&self, scope: NodeId, selectors: &SelectorList) -> Vec<NodeId> {
        self.descendants(scope)
            .into_iter()
            .filter(|&node| selectors.matches(self, node))
            .collect()
    }

    /// First descendant element of `scope` matching a parsed selector list.
    pub fn select_first(&self, scope: NodeId, selectors: &SelectorList) -> Option<NodeId> {
        self.descendants(scope)
            .into_iter()
            .find(|&node| selectors.matches(self, node))
    }

    /// `querySelectorAll` on `scope`.
    pub fn query_selector_all(&self, scope: NodeId, selector: &str) -> Result<Vec<NodeId>> {
        let selectors = SelectorList::parse(selector)?;
        Ok(self.select_all(scope, &selectors))
    }

    /// `querySelector` on `scope`.
    pub fn query_selector(&self, scope: NodeId, selector: &str) -> Result<Option<NodeId>> {
        let selectors = SelectorList::parse(selector)?;
        Ok(self.select_first(scope, &selectors))
    }

    /// Check if `node` matches a selector.
    pub fn matches(&self, node: NodeId, selector: &str) -> Result<bool> {
        Ok(SelectorList::parse(selector)?.matches(self, node))
    }

    /// Nearest inclusive ancestor element matching a selector.
    pub fn closest(&self, node: NodeId, selector: &str) -> Result<Option<NodeId>> {
        let selectors = SelectorList::parse(selector)?;
        let mut current = Some(node).filter(|&n| self.is_element(n));
        while let Some(element) = current {
            if selectors.matches(self, element) {
                return Ok(Some(element));
            }
            current = parent_element(self, element);
        }
        Ok(None)
    }
}
