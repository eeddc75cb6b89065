//! Selectors and nested selector expansion.

use std::fmt;

use crate::error::{CompileError, Limit, Result};
use crate::value::Value;

#[derive(Clone, Debug, PartialEq)]
pub enum SelectorToken {
    Text(String),
    /// Descendant combinator.
    Space,
    /// `&`
    Parent,
    Interpolation(Value),
}

/// One comma separated alternative of a selector.
pub type Alternative = Vec<SelectorToken>;

#[derive(Clone, Debug, PartialEq, Default)]
pub struct Selector {
    pub alternatives: Vec<Alternative>,
}

impl Selector {
    /// Builds a selector, collapsing runs of spaces and trimming each
    /// alternative. Empty alternatives are dropped.
    pub fn new(alternatives: Vec<Alternative>) -> Self {
        let alternatives = alternatives
            .into_iter()
            .map(normalize)
            .filter(|alt| !alt.is_empty())
            .collect();
        Self { alternatives }
    }

    /// A selector made of plain text alternatives, split on whitespace.
    pub fn parse_plain(text: &str) -> Self {
        Self::new(
            text.split(',')
                .map(|alt| {
                    let mut tokens = Vec::new();
                    for (i, word) in alt.split_whitespace().enumerate() {
                        if i != 0 {
                            tokens.push(SelectorToken::Space);
                        }
                        push_word(&mut tokens, word);
                    }
                    tokens
                })
                .collect(),
        )
    }

    pub fn is_empty(&self) -> bool {
        self.alternatives.is_empty()
    }

    pub fn len(&self) -> usize {
        self.alternatives.len()
    }

    pub fn contains_parent(&self) -> bool {
        self.alternatives
            .iter()
            .any(|alt| alt.iter().any(|token| *token == SelectorToken::Parent))
    }

    pub fn map_values<F>(&mut self, f: &mut F) -> Result<()>
    where
        F: FnMut(&Value) -> Result<Value>,
    {
        for alt in &mut self.alternatives {
            for token in alt.iter_mut() {
                if let SelectorToken::Interpolation(value) = token {
                    *value = f(value)?;
                }
            }
        }
        Ok(())
    }
}

fn push_word(tokens: &mut Alternative, word: &str) {
    let mut parts = word.split('&').peekable();
    while let Some(part) = parts.next() {
        if !part.is_empty() {
            tokens.push(SelectorToken::Text(part.to_string()));
        }
        if parts.peek().is_some() {
            tokens.push(SelectorToken::Parent);
        }
    }
}

fn normalize(alt: Alternative) -> Alternative {
    let mut out: Alternative = Vec::with_capacity(alt.len());
    for token in alt {
        if token == SelectorToken::Space
            && matches!(out.last(), None | Some(SelectorToken::Space))
        {
            continue;
        }
        out.push(token);
    }
    trim_trailing_space(&mut out);
    out
}

fn trim_trailing_space(tokens: &mut Alternative) {
    while tokens.last() == Some(&SelectorToken::Space) {
        tokens.pop();
    }
}

fn write_alternative(f: &mut fmt::Formatter<'_>, alt: &[SelectorToken]) -> fmt::Result {
    for token in alt {
        match token {
            SelectorToken::Text(text) => f.write_str(text)?,
            SelectorToken::Space => f.write_str(" ")?,
            SelectorToken::Parent => f.write_str("&")?,
            SelectorToken::Interpolation(value) => write!(f, "#{{{value}}}")?,
        }
    }
    Ok(())
}

impl fmt::Display for Selector {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, alt) in self.alternatives.iter().enumerate() {
            if i != 0 {
                f.write_str(", ")?;
            }
            write_alternative(f, alt)?;
        }
        Ok(())
    }
}

/// Expands the selector of a nested rule into a flat one.
///
/// `chain` runs from the outermost ancestor down to the rule itself.
///
/// Once an ancestor without `&` contributes more than one alternative, the
/// result is the cross product of what came before with those alternatives,
/// and every later ancestor is appended to each product as a plain
/// descendant. Later ancestors that themselves list several alternatives are
/// therefore joined with spaces rather than multiplied out again.
pub fn expand(chain: &[&Selector]) -> Result<Selector> {
    if chain.len() > Limit::NestingDepth.max() {
        let detail = chain
            .iter()
            .map(|selector| selector.to_string())
            .collect::<Vec<_>>()
            .join(" ");
        return Err(CompileError::limit_with(Limit::NestingDepth, detail));
    }

    let mut spans: Vec<Alternative> = vec![Vec::new()];

    for (i, ancestor) in chain.iter().enumerate() {
        if ancestor.contains_parent() {
            if spans.iter().all(Vec::is_empty) {
                return Err(CompileError::ParentOutsideRule(ancestor.to_string()));
            }
            spans = spans
                .iter()
                .flat_map(|span| {
                    ancestor
                        .alternatives
                        .iter()
                        .map(move |alt| substitute(alt, span))
                })
                .collect();
            continue;
        }

        if let [alt] = ancestor.alternatives.as_slice() {
            for span in &mut spans {
                append(span, alt);
            }
            continue;
        }

        let rest = &chain[i + 1..];
        let mut product = Vec::with_capacity(spans.len() * ancestor.len());
        for span in &spans {
            for alt in &ancestor.alternatives {
                let mut expanded = span.clone();
                append(&mut expanded, alt);
                for later in rest {
                    fold(&mut expanded, later);
                }
                product.push(expanded);
            }
        }
        return Ok(Selector::new(product));
    }

    Ok(Selector::new(spans))
}

fn substitute(alt: &[SelectorToken], span: &[SelectorToken]) -> Alternative {
    let mut parent = span.to_vec();
    trim_trailing_space(&mut parent);
    let mut out = Vec::with_capacity(alt.len() + parent.len());
    for token in alt {
        if *token == SelectorToken::Parent {
            out.extend(parent.iter().cloned());
        } else {
            out.push(token.clone());
        }
    }
    out
}

fn append(span: &mut Alternative, alt: &[SelectorToken]) {
    if !span.is_empty() && span.last() != Some(&SelectorToken::Space) {
        span.push(SelectorToken::Space);
    }
    span.extend(alt.iter().cloned());
}

fn fold(span: &mut Alternative, later: &Selector) {
    let mut folded = Vec::new();
    for (i, alt) in later.alternatives.iter().enumerate() {
        if i != 0 {
            folded.push(SelectorToken::Space);
        }
        if alt.contains(&SelectorToken::Parent) {
            folded.extend(substitute(alt, span));
        } else {
            folded.extend(alt.iter().cloned());
        }
    }
    if later.contains_parent() {
        *span = folded;
    } else {
        append(span, &folded);
    }
}
