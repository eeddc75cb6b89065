use tracing::trace;

use crate::ast::{
    Assignment, Comment, Declaration, FontFaceRule, ForBlock, IfBlock, ImportRule, ImportUrl,
    IncludeNode, KeyframesRule, MediaRule, MixinNode, Node, Parameter, Rule, StyleRule,
    StyleSheet, UnknownRule,
};
use crate::error::{CompileError, Result, Span};
use crate::selector::{Alternative, Selector, SelectorToken};
use crate::token::{LexicalMode, Token, TokenKind, Tokenizer};
use crate::value::{BinaryOperator, Function, Separator, Value};

/// Functions whose arguments are passed through untouched, so `-`, `+`
/// and `*` inside them stay literal.
const RAW_FUNCTIONS: &[&str] = &["calc", "min", "max", "clamp", "var", "env"];

pub fn parse(input: &str) -> Result<StyleSheet> {
    let mut parser = Parser::new(input);
    parser
        .read_stylesheet()
        .map_err(|err| err.with_source(input))
}

/// Parses a standalone value such as `1px solid $color`.
pub fn parse_value(input: &str) -> Result<Value> {
    let mut parser = Parser::new(input);
    parser.set_mode(LexicalMode::Value);
    let value = parser.read_value_list()?;
    match parser.next()? {
        None => Ok(value),
        Some(token) => Err(unexpected(&token, "value")),
    }
}

impl StyleSheet {
    pub fn parse(input: &str) -> Result<StyleSheet> {
        parse(input)
    }
}

struct Parser<'a> {
    tokens: Tokenizer<'a>,
    peeked: Option<Token>,
    depth: usize,
    operators: bool,
    condition: bool,
}

impl<'a> Parser<'a> {
    fn new(input: &'a str) -> Self {
        Self {
            tokens: Tokenizer::new(input),
            peeked: None,
            depth: 0,
            operators: true,
            condition: false,
        }
    }

    fn peek(&mut self) -> Result<Option<&Token>> {
        if self.peeked.is_none() {
            self.peeked = self.tokens.next_token()?;
        }
        Ok(self.peeked.as_ref())
    }

    fn peek_kind(&mut self) -> Result<Option<TokenKind>> {
        Ok(self.peek()?.map(|token| token.kind))
    }

    fn next(&mut self) -> Result<Option<Token>> {
        match self.peeked.take() {
            Some(token) => Ok(Some(token)),
            None => self.tokens.next_token(),
        }
    }

    fn expect(&mut self, kind: TokenKind, context: &str) -> Result<Token> {
        match self.next()? {
            Some(token) if token.kind == kind => Ok(token),
            Some(token) => Err(unexpected(&token, context)),
            None => Err(self.eof(context)),
        }
    }

    /// Consumes the `)` matching the `(` at `open`.
    fn close_paren(&mut self, open: Span, context: &str) -> Result<()> {
        match self.next()? {
            Some(token) if token.kind == TokenKind::RightParen => Ok(()),
            Some(token)
                if !matches!(
                    token.kind,
                    TokenKind::Semicolon | TokenKind::LeftBrace | TokenKind::RightBrace
                ) =>
            {
                Err(unexpected(&token, context))
            }
            _ => Err(CompileError::syntax("Unbalanced '('", open)),
        }
    }

    fn set_mode(&mut self, mode: LexicalMode) {
        if let Some(token) = self.peeked.take() {
            self.tokens.rewind(&token);
        }
        self.tokens.set_mode(mode);
    }

    fn eof(&self, context: &str) -> CompileError {
        CompileError::syntax(
            format!("Unexpected EOF reading '{context}'"),
            self.tokens.here(),
        )
    }

    fn read_stylesheet(&mut self) -> Result<StyleSheet> {
        let mut children = Vec::new();
        loop {
            match self.peek_kind()? {
                None => break,
                Some(TokenKind::Semicolon) => {
                    self.next()?;
                }
                Some(TokenKind::RightBrace) => {
                    if let Some(token) = self.next()? {
                        return Err(unexpected(&token, "stylesheet"));
                    }
                }
                Some(_) => {
                    if let Some(node) = self.read_item(true)? {
                        children.push(node);
                    }
                }
            }
        }
        Ok(StyleSheet { children })
    }

    /// Reads one item of a block or of the document root. Comments inside
    /// blocks are dropped.
    fn read_item(&mut self, top_level: bool) -> Result<Option<Node>> {
        let Some((kind, offset, span)) = self.peek()?.map(|t| (t.kind, t.offset, t.span)) else {
            return Err(self.eof("block"));
        };
        match kind {
            TokenKind::Comment => {
                let token = self.expect(TokenKind::Comment, "comment")?;
                if !top_level {
                    return Ok(None);
                }
                let text = token.text[2..token.text.len() - 2].trim().to_string();
                Ok(Some(Node::Comment(Comment { text })))
            }
            TokenKind::AtKeyword => self.read_at_rule().map(Some),
            TokenKind::Variable => self.read_assignment().map(Some),
            _ => match self.tokens.item_end(offset) {
                Some('{') => self.read_style_rule().map(Some),
                Some(_) if !top_level => self.read_declaration().map(Some),
                Some(_) => Err(CompileError::syntax(
                    "Declarations must be inside a rule",
                    span,
                )),
                // Unclosed brackets or strings; lexing the item reports them.
                None if top_level => self.read_style_rule().map(Some),
                None => self.read_declaration().map(Some),
            },
        }
    }

    /// Reads the items of a block whose `{` was just consumed.
    fn read_block_body(&mut self, start: Span) -> Result<Vec<Node>> {
        self.set_mode(LexicalMode::Block);
        let mut children = Vec::new();
        loop {
            match self.peek_kind()? {
                None => {
                    return Err(CompileError::syntax(
                        "The block is unclosed, '}' expected",
                        start,
                    ))
                }
                Some(TokenKind::RightBrace) => {
                    self.next()?;
                    break;
                }
                Some(TokenKind::Semicolon) => {
                    self.next()?;
                }
                Some(_) => {
                    if let Some(node) = self.read_item(false)? {
                        children.push(node);
                    }
                }
            }
        }
        Ok(children)
    }

    fn read_style_rule(&mut self) -> Result<Node> {
        self.set_mode(LexicalMode::Selector);
        let start = self.tokens.here();
        let selector = self.read_selector()?;
        self.depth += 1;
        let depth = self.depth;
        let children = self.read_block_body(start);
        self.depth -= 1;
        trace!(%selector, depth, "parsed style rule");
        Ok(Node::Rule(Rule::Style(StyleRule {
            selector,
            depth,
            children: children?,
        })))
    }

    /// Reads selector tokens up to and including the opening `{`.
    fn read_selector(&mut self) -> Result<Selector> {
        let start = self.tokens.here();
        let mut alternatives: Vec<Alternative> = Vec::new();
        let mut current: Alternative = Vec::new();
        loop {
            let Some(token) = self.next()? else {
                return Err(self.eof("selector"));
            };
            if token.space_before && !current.is_empty() {
                current.push(SelectorToken::Space);
            }
            match token.kind {
                TokenKind::LeftBrace => break,
                TokenKind::Comma => alternatives.push(std::mem::take(&mut current)),
                TokenKind::Ampersand => current.push(SelectorToken::Parent),
                TokenKind::InterpolationStart => {
                    let value = self.read_interpolation()?;
                    self.set_mode(LexicalMode::Selector);
                    current.push(SelectorToken::Interpolation(value));
                }
                TokenKind::RightBrace | TokenKind::Semicolon => {
                    return Err(unexpected(&token, "selector"))
                }
                _ => current.push(SelectorToken::Text(token.text)),
            }
        }
        alternatives.push(current);
        let selector = Selector::new(alternatives);
        if selector.is_empty() {
            return Err(CompileError::syntax("Missing selector before '{'", start));
        }
        Ok(selector)
    }

    /// Reads the body of `#{...}` after its opening token.
    fn read_interpolation(&mut self) -> Result<Value> {
        self.set_mode(LexicalMode::Value);
        let saved = std::mem::replace(&mut self.operators, true);
        let value = self.read_expression();
        self.operators = saved;
        let value = value?;
        self.expect(TokenKind::RightBrace, "interpolation")?;
        Ok(value)
    }

    fn read_declaration(&mut self) -> Result<Node> {
        let mut name = String::new();
        let mut span = None;
        loop {
            let Some(token) = self.next()? else {
                return Err(self.eof("declaration"));
            };
            span.get_or_insert(token.span);
            match token.kind {
                TokenKind::Colon if !name.is_empty() => break,
                TokenKind::Ident
                | TokenKind::Star
                | TokenKind::Delim
                | TokenKind::Minus
                | TokenKind::Number
                | TokenKind::Unit => name.push_str(&token.text),
                _ => return Err(unexpected(&token, "declaration")),
            }
        }
        self.set_mode(LexicalMode::Value);
        let value = self.read_value_list()?;
        if matches!(&value, Value::List(list) if list.items.is_empty()) {
            return Err(CompileError::syntax(
                format!("Missing value for '{name}'"),
                self.tokens.here(),
            ));
        }
        self.end_statement("declaration")?;
        Ok(Node::Declaration(Declaration {
            name,
            value,
            span: span.unwrap_or(Span::dummy()),
        }))
    }

    /// Consumes the `;` ending a statement. A closing `}` is left for the
    /// enclosing block, and end of input is left for the caller to judge.
    fn end_statement(&mut self, context: &str) -> Result<()> {
        match self.peek_kind()? {
            Some(TokenKind::Semicolon) => {
                self.next()?;
            }
            Some(TokenKind::RightBrace) | None => {}
            Some(_) => {
                let token = self.expect(TokenKind::Semicolon, context)?;
                return Err(unexpected(&token, context));
            }
        }
        self.set_mode(LexicalMode::Block);
        Ok(())
    }

    fn read_assignment(&mut self) -> Result<Node> {
        let token = self.expect(TokenKind::Variable, "assignment")?;
        let name = token.name().to_string();
        self.set_mode(LexicalMode::Value);
        self.expect(TokenKind::Colon, "assignment")?;
        let mut value = self.read_value_list()?;
        let default = take_flag(&mut value, "!default");
        self.end_statement("assignment")?;
        Ok(Node::Assignment(Assignment {
            name,
            value,
            default,
        }))
    }

    fn read_at_rule(&mut self) -> Result<Node> {
        let token = self.expect(TokenKind::AtKeyword, "at-rule")?;
        let name = token.name().to_ascii_lowercase();
        let start = token.span;
        match name.as_str() {
            "import" => self.read_import(),
            "media" => {
                let (query, _) = self.read_prelude(true)?;
                let children = self.read_block_body(start)?;
                Ok(Node::Rule(Rule::Media(MediaRule { query, children })))
            }
            "font-face" => {
                self.read_prelude(true)?;
                let children = self.read_block_body(start)?;
                Ok(Node::Rule(Rule::FontFace(FontFaceRule { children })))
            }
            "keyframes" => {
                let (name, _) = self.read_prelude(true)?;
                let children = self.read_block_body(start)?;
                Ok(Node::Rule(Rule::Keyframes(KeyframesRule { name, children })))
            }
            "mixin" => self.read_mixin(start),
            "include" => self.read_include(start),
            "if" => self.read_if(start).map(Node::If),
            "for" => self.read_for(start),
            "else" => Err(CompileError::syntax("@else without a matching @if", start)),
            _ => {
                let (prelude, terminator) = self.read_prelude(false)?;
                let children = match terminator {
                    Some(TokenKind::LeftBrace) => Some(self.read_block_body(start)?),
                    _ => None,
                };
                Ok(Node::Rule(Rule::Unknown(UnknownRule {
                    name: token.name().to_string(),
                    prelude,
                    children,
                })))
            }
        }
    }

    /// Reads raw at-rule text up to `{` or `;`, consuming the terminator.
    fn read_prelude(&mut self, block_required: bool) -> Result<(String, Option<TokenKind>)> {
        self.set_mode(LexicalMode::Selector);
        let mut text = String::new();
        let terminator = loop {
            let Some(token) = self.next()? else {
                break None;
            };
            match token.kind {
                TokenKind::LeftBrace => break Some(TokenKind::LeftBrace),
                TokenKind::Semicolon if !block_required => break Some(TokenKind::Semicolon),
                TokenKind::RightBrace if !block_required => {
                    self.tokens.rewind(&token);
                    break None;
                }
                TokenKind::Semicolon | TokenKind::RightBrace => {
                    return Err(unexpected(&token, "at-rule"))
                }
                TokenKind::InterpolationStart => {
                    let value = self.read_interpolation()?;
                    self.set_mode(LexicalMode::Selector);
                    if token.space_before && !text.is_empty() {
                        text.push(' ');
                    }
                    text.push_str(&value.to_string());
                }
                _ => {
                    if token.space_before && !text.is_empty() {
                        text.push(' ');
                    }
                    text.push_str(&token.text);
                }
            }
        };
        if block_required && terminator.is_none() {
            return Err(self.eof("at-rule"));
        }
        if terminator != Some(TokenKind::LeftBrace) {
            self.set_mode(LexicalMode::Block);
        }
        Ok((text, terminator))
    }

    fn read_import(&mut self) -> Result<Node> {
        self.set_mode(LexicalMode::Value);
        let Some(token) = self.next()? else {
            return Err(self.eof("import"));
        };
        let url = match token.kind {
            TokenKind::Str => unquote(&token.text),
            TokenKind::Url => unquote(&token.text[4..token.text.len() - 1]),
            _ => return Err(unexpected(&token, "import")),
        };
        // Media lists after the url are not kept.
        while !matches!(
            self.peek_kind()?,
            None | Some(TokenKind::Semicolon) | Some(TokenKind::RightBrace)
        ) {
            self.next()?;
        }
        self.end_statement("import")?;
        Ok(Node::Rule(Rule::Import(ImportRule {
            url: ImportUrl::new(url),
        })))
    }

    fn read_mixin(&mut self, start: Span) -> Result<Node> {
        self.set_mode(LexicalMode::Value);
        let name = self.expect(TokenKind::Ident, "mixin")?.text;
        let mut params = Vec::new();
        if self.peek_kind()? == Some(TokenKind::LeftParen) {
            self.next()?;
            loop {
                let Some(token) = self.next()? else {
                    return Err(self.eof("mixin"));
                };
                match token.kind {
                    TokenKind::RightParen => break,
                    TokenKind::Comma => continue,
                    TokenKind::Variable => {
                        let default = if self.peek_kind()? == Some(TokenKind::Colon) {
                            self.next()?;
                            Some(self.read_space_list()?)
                        } else {
                            None
                        };
                        params.push(Parameter {
                            name: token.name().to_string(),
                            default,
                        });
                    }
                    _ => return Err(unexpected(&token, "mixin")),
                }
            }
        }
        self.expect(TokenKind::LeftBrace, "mixin")?;
        let children = self.read_block_body(start)?;
        trace!(%name, params = params.len(), "parsed mixin");
        Ok(Node::Mixin(MixinNode {
            name,
            params,
            children,
        }))
    }

    fn read_include(&mut self, span: Span) -> Result<Node> {
        self.set_mode(LexicalMode::Value);
        let name = self.expect(TokenKind::Ident, "include")?.text;
        let mut args = None;
        if self.peek_kind()? == Some(TokenKind::LeftParen) {
            self.next()?;
            if self.peek_kind()? != Some(TokenKind::RightParen) {
                args = Some(self.read_value_list()?);
            }
            self.expect(TokenKind::RightParen, "include")?;
        }
        self.end_statement("include")?;
        Ok(Node::Include(IncludeNode { name, args, span }))
    }

    fn read_condition(&mut self) -> Result<Value> {
        self.set_mode(LexicalMode::Value);
        self.condition = true;
        let value = self.read_expression();
        self.condition = false;
        value
    }

    fn read_if(&mut self, start: Span) -> Result<IfBlock> {
        let condition = self.read_condition()?;
        self.expect(TokenKind::LeftBrace, "if")?;
        let children = self.read_block_body(start)?;

        let mut otherwise = Vec::new();
        let is_else = matches!(
            self.peek()?,
            Some(token) if token.kind == TokenKind::AtKeyword
                && token.name().eq_ignore_ascii_case("else")
        );
        if is_else {
            let token = self.expect(TokenKind::AtKeyword, "else")?;
            self.set_mode(LexicalMode::Value);
            let chained = matches!(
                self.peek()?,
                Some(next) if next.kind == TokenKind::Ident && next.text.eq_ignore_ascii_case("if")
            );
            if chained {
                self.next()?;
                otherwise.push(Node::If(self.read_if(token.span)?));
            } else {
                self.expect(TokenKind::LeftBrace, "else")?;
                otherwise = self.read_block_body(token.span)?;
            }
        }
        Ok(IfBlock {
            condition,
            children,
            otherwise,
        })
    }

    fn read_for(&mut self, start: Span) -> Result<Node> {
        self.set_mode(LexicalMode::Value);
        let variable = self.expect(TokenKind::Variable, "for")?.name().to_string();
        self.expect_keyword("from", "for")?;
        let from = self.read_condition()?;
        let keyword = self.expect(TokenKind::Ident, "for")?;
        let inclusive = match keyword.text.as_str() {
            "through" => true,
            "to" => false,
            _ => return Err(unexpected(&keyword, "for")),
        };
        let end = self.read_condition()?;
        self.expect(TokenKind::LeftBrace, "for")?;
        let children = self.read_block_body(start)?;
        Ok(Node::For(ForBlock {
            variable,
            start: from,
            end,
            inclusive,
            children,
        }))
    }

    fn expect_keyword(&mut self, keyword: &str, context: &str) -> Result<()> {
        let token = self.expect(TokenKind::Ident, context)?;
        if token.text != keyword {
            return Err(unexpected(&token, context));
        }
        Ok(())
    }

    /// A comma separated list of space separated lists.
    fn read_value_list(&mut self) -> Result<Value> {
        let mut groups = vec![self.read_space_list()?];
        while self.peek_kind()? == Some(TokenKind::Comma) {
            self.next()?;
            groups.push(self.read_space_list()?);
        }
        Ok(if groups.len() == 1 {
            groups.remove(0)
        } else {
            Value::list(groups, Separator::Comma)
        })
    }

    fn read_space_list(&mut self) -> Result<Value> {
        let mut components: Vec<Value> = Vec::new();
        loop {
            let Some((kind, space_before)) = self.peek()?.map(|t| (t.kind, t.space_before)) else {
                break;
            };
            if matches!(
                kind,
                TokenKind::Semicolon
                    | TokenKind::Comma
                    | TokenKind::LeftBrace
                    | TokenKind::RightBrace
                    | TokenKind::RightParen
            ) {
                break;
            }
            let adjacent = !space_before && !components.is_empty();
            let term = self.read_expression()?;
            match components.pop() {
                Some(last) if adjacent => components.push(concat(last, term)),
                Some(last) => {
                    components.push(last);
                    components.push(term);
                }
                None => components.push(term),
            }
        }
        Ok(Value::from_components(components))
    }

    fn read_expression(&mut self) -> Result<Value> {
        self.read_binary(0)
    }

    fn read_binary(&mut self, min_precedence: u8) -> Result<Value> {
        let mut left = self.read_primary()?;
        while let Some(op) = self.peek_operator()? {
            if op.precedence() < min_precedence {
                break;
            }
            self.next()?;
            let right = self.read_binary(op.precedence() + 1)?;
            left = Value::expression(left, op, right);
        }
        Ok(left)
    }

    fn peek_operator(&mut self) -> Result<Option<BinaryOperator>> {
        let Some(kind) = self.peek_kind()? else {
            return Ok(None);
        };
        if !self.operators {
            return Ok(None);
        }
        let op = match kind {
            TokenKind::Plus => BinaryOperator::Add,
            TokenKind::Minus => BinaryOperator::Subtract,
            TokenKind::Star => BinaryOperator::Multiply,
            TokenKind::Percent => BinaryOperator::Mod,
            TokenKind::Equals if self.condition => BinaryOperator::Equals,
            TokenKind::NotEquals if self.condition => BinaryOperator::NotEquals,
            TokenKind::Gt if self.condition => BinaryOperator::Gt,
            TokenKind::Gte if self.condition => BinaryOperator::Gte,
            TokenKind::Lt if self.condition => BinaryOperator::Lt,
            TokenKind::Lte if self.condition => BinaryOperator::Lte,
            _ => return Ok(None),
        };
        Ok(Some(op))
    }

    fn read_primary(&mut self) -> Result<Value> {
        let Some(token) = self.next()? else {
            return Err(self.eof("value"));
        };
        match token.kind {
            TokenKind::Number => {
                let number: f64 = token.text.parse().map_err(|_| {
                    CompileError::syntax(format!("Invalid number '{}'", token.text), token.span)
                })?;
                let unit = if self.peek_kind()? == Some(TokenKind::Unit) {
                    self.expect(TokenKind::Unit, "number")?.text
                } else {
                    String::new()
                };
                Ok(Value::unit(number, &unit))
            }
            TokenKind::Variable => Ok(Value::variable(token.name())),
            TokenKind::Ident => {
                let call = matches!(
                    self.peek()?,
                    Some(next) if next.kind == TokenKind::LeftParen && !next.space_before
                );
                if call {
                    return self.read_function(token.text);
                }
                Ok(match token.text.as_str() {
                    "true" => Value::Boolean(true),
                    "false" => Value::Boolean(false),
                    _ => Value::String(token.text),
                })
            }
            TokenKind::InterpolationStart => {
                let value = self.read_interpolation()?;
                self.set_mode(LexicalMode::Value);
                Ok(Value::Interpolated(vec![value]))
            }
            TokenKind::LeftParen => {
                let inner = self.read_value_list()?;
                self.close_paren(token.span, "value")?;
                Ok(inner)
            }
            TokenKind::Str
            | TokenKind::Hash
            | TokenKind::Url
            | TokenKind::Text
            | TokenKind::Delim
            | TokenKind::Colon
            | TokenKind::Ampersand
            | TokenKind::Unit
            | TokenKind::Plus
            | TokenKind::Minus
            | TokenKind::Star
            | TokenKind::Slash
            | TokenKind::Percent
            | TokenKind::Equals
            | TokenKind::NotEquals
            | TokenKind::Gt
            | TokenKind::Gte
            | TokenKind::Lt
            | TokenKind::Lte => Ok(Value::String(token.text)),
            TokenKind::Comment
            | TokenKind::AtKeyword
            | TokenKind::Semicolon
            | TokenKind::Comma
            | TokenKind::LeftBrace
            | TokenKind::RightBrace
            | TokenKind::RightParen => Err(unexpected(&token, "value")),
        }
    }

    fn read_function(&mut self, name: String) -> Result<Value> {
        let open = self.expect(TokenKind::LeftParen, "function")?.span;
        let raw = RAW_FUNCTIONS.contains(&name.to_ascii_lowercase().as_str());
        let saved = self.operators;
        if raw {
            self.operators = false;
        }
        let args = if self.peek_kind()? == Some(TokenKind::RightParen) {
            Ok(Value::list(Vec::new(), Separator::Space))
        } else {
            self.read_value_list()
        };
        self.operators = saved;
        let args = args?;
        self.close_paren(open, "function")?;
        Ok(Value::Function(Function {
            name,
            args: Box::new(args),
        }))
    }
}

fn unexpected(token: &Token, context: &str) -> CompileError {
    CompileError::syntax(
        format!("Unexpected token reading {context}. Was '{}'", token.text),
        token.span,
    )
}

fn unquote(text: &str) -> String {
    let text = text.trim();
    for quote in ['"', '\''] {
        if let Some(inner) = text
            .strip_prefix(quote)
            .and_then(|rest| rest.strip_suffix(quote))
        {
            return inner.to_string();
        }
    }
    text.to_string()
}

/// Joins two values written with no whitespace between them.
fn concat(left: Value, right: Value) -> Value {
    let mut parts = match left {
        Value::Interpolated(parts) => parts,
        other => vec![other],
    };
    match right {
        Value::Interpolated(more) => parts.extend(more),
        other => parts.push(other),
    }
    Value::Interpolated(parts)
}

/// Strips a trailing flag such as `!default`, reporting whether it was there.
fn take_flag(value: &mut Value, flag: &str) -> bool {
    match value {
        Value::List(list) if list.separator == Separator::Space => {
            if matches!(list.items.last(), Some(Value::String(s)) if s == flag) {
                list.items.pop();
                if list.items.len() == 1 {
                    *value = list.items.remove(0);
                }
                return true;
            }
            false
        }
        _ => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;

    fn style_rule(node: &Node) -> &StyleRule {
        match node {
            Node::Rule(Rule::Style(rule)) => rule,
            other => panic!("expected style rule, got {other:?}"),
        }
    }

    #[test]
    fn parse_simple_rule() {
        let css = parse("div { color: red; margin: 0 auto }").unwrap();
        let rule = style_rule(&css.children[0]);
        assert_eq!(rule.selector.to_string(), "div");
        assert_eq!(rule.depth, 1);
        assert_eq!(rule.children.len(), 2);
        match &rule.children[1] {
            Node::Declaration(decl) => {
                assert_eq!(decl.name, "margin");
                assert_eq!(decl.value.to_string(), "0 auto");
            }
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn nested_rules_record_depth() {
        let css = parse("#header { .inner { h1, ul { display: table-cell; } } }").unwrap();
        let outer = style_rule(&css.children[0]);
        let Node::Rule(Rule::Style(inner)) = &outer.children[0] else {
            panic!("expected nested rule");
        };
        assert_eq!(inner.depth, 2);
        let Node::Rule(Rule::Style(list)) = &inner.children[0] else {
            panic!("expected nested rule");
        };
        assert_eq!(list.depth, 3);
        assert_eq!(list.selector.len(), 2);
        assert_eq!(list.selector.to_string(), "h1, ul");
    }

    #[test]
    fn pseudo_selectors_are_not_declarations() {
        let css = parse("a { &:hover { color: blue; } color: red; }").unwrap();
        let rule = style_rule(&css.children[0]);
        assert!(matches!(rule.children[0], Node::Rule(Rule::Style(_))));
        assert!(matches!(rule.children[1], Node::Declaration(_)));
    }

    #[test]
    fn values_keep_their_structure() {
        assert_eq!(
            parse_value("rgba(255,255,255,0.6)").unwrap().to_string(),
            "rgba(255, 255, 255, 0.6)"
        );
        assert_eq!(
            parse_value("12px/1.5 'Helvetica', sans-serif").unwrap().to_string(),
            "12px/1.5 'Helvetica', sans-serif"
        );
        assert_eq!(
            parse_value("calc(100% - 10px)").unwrap().to_string(),
            "calc(100% - 10px)"
        );
    }

    #[test]
    fn arithmetic_builds_expressions() {
        let value = parse_value("$i * 10px + 2px").unwrap();
        let Value::Expression(expr) = value else {
            panic!("expected expression");
        };
        assert_eq!(expr.op, BinaryOperator::Add);
        assert!(matches!(expr.left, Value::Expression(_)));
    }

    #[test]
    fn interpolation_glues_to_neighbours() {
        let value = parse_value("#{$i}px").unwrap();
        assert_eq!(
            value,
            Value::Interpolated(vec![Value::variable("i"), Value::string("px")])
        );
    }

    #[test]
    fn assignments_and_default_flag() {
        let css = parse("$a: 10px; $b: 1px solid !default;").unwrap();
        let Node::Assignment(b) = &css.children[1] else {
            panic!("expected assignment");
        };
        assert_eq!(b.name, "b");
        assert!(b.default);
        assert_eq!(b.value.to_string(), "1px solid");
    }

    #[test]
    fn mixins_and_includes() {
        let css = parse(
            "@mixin box($size, $color: red) { width: $size; }\n.a { @include box(10px); }",
        )
        .unwrap();
        let Node::Mixin(mixin) = &css.children[0] else {
            panic!("expected mixin");
        };
        assert_eq!(mixin.name, "box");
        assert_eq!(mixin.params.len(), 2);
        assert_eq!(mixin.params[1].default, Some(Value::string("red")));
        let rule = style_rule(&css.children[1]);
        let Node::Include(include) = &rule.children[0] else {
            panic!("expected include");
        };
        assert_eq!(include.name, "box");
        assert_eq!(include.args, Some(Value::unit(10.0, "px")));
    }

    #[test]
    fn control_flow_blocks() {
        let css = parse(
            "@for $i from 1 through 3 { .m-#{$i} { margin: #{$i}px; } }\n\
             @if $theme == dark { body { color: white; } } @else { body { color: black; } }",
        )
        .unwrap();
        let Node::For(block) = &css.children[0] else {
            panic!("expected for");
        };
        assert_eq!(block.variable, "i");
        assert!(block.inclusive);
        assert_eq!(block.end, Value::number(3.0));
        let Node::If(cond) = &css.children[1] else {
            panic!("expected if");
        };
        assert!(matches!(&cond.condition, Value::Expression(e) if e.op == BinaryOperator::Equals));
        assert_eq!(cond.otherwise.len(), 1);
    }

    #[test]
    fn at_rules() {
        let css = parse(
            "@import 'partials/base';\n@media screen and (max-width: 600px) { a { b: c; } }\n\
             @charset \"utf-8\";\n@keyframes fade { from { opacity: 0; } to { opacity: 1; } }",
        )
        .unwrap();
        assert!(matches!(&css.children[0], Node::Rule(Rule::Import(i)) if i.url.as_str() == "partials/base"));
        assert!(matches!(&css.children[1], Node::Rule(Rule::Media(m)) if m.query == "screen and (max-width: 600px)"));
        assert!(matches!(&css.children[2], Node::Rule(Rule::Unknown(u)) if u.name == "charset" && u.children.is_none()));
        assert!(matches!(&css.children[3], Node::Rule(Rule::Keyframes(k)) if k.name == "fade" && k.children.len() == 2));
    }

    #[test]
    fn top_level_comments_are_kept() {
        let css = parse("/* header */\na { b: c; /* dropped */ }").unwrap();
        assert_eq!(
            css.children[0],
            Node::Comment(Comment {
                text: "header".into()
            })
        );
        assert_eq!(style_rule(&css.children[1]).children.len(), 1);
    }

    #[test]
    fn unclosed_block_is_a_syntax_error() {
        let err = parse("a {\n  color: red;\n").unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Syntax);
        let CompileError::Syntax(syntax) = err else {
            unreachable!();
        };
        assert_eq!(syntax.span.line, 1);
        assert!(!syntax.lines.is_empty());
    }

    fn syntax_error(src: &str) -> (String, usize, usize) {
        match parse(src).unwrap_err() {
            CompileError::Syntax(syntax) => (syntax.message, syntax.span.line, syntax.span.column),
            other => panic!("expected a syntax error, got {other:?}"),
        }
    }

    #[test]
    fn unbalanced_brackets_point_at_the_opening() {
        assert_eq!(syntax_error(".a { b: (c; }"), ("Unbalanced '('".into(), 1, 9));
        assert_eq!(syntax_error(".a { b: f(c; }"), ("Unbalanced '('".into(), 1, 10));
        assert_eq!(syntax_error(".a { b: [c; }"), ("Unbalanced '['".into(), 1, 9));
        assert_eq!(syntax_error("a:not(.b {\n  c: d;\n}"), ("Unbalanced '('".into(), 1, 6));
    }

    #[test]
    fn unterminated_strings_point_at_the_quote() {
        assert_eq!(syntax_error(".a { b: 'c; }"), ("Unterminated string".into(), 1, 9));
        assert_eq!(
            syntax_error(".a {\n  content: \"x;\n}"),
            ("Unterminated string".into(), 2, 12)
        );
    }

    #[test]
    fn stray_closing_brace_is_rejected() {
        let err = parse("a { b: c; } }").unwrap_err();
        assert!(err.to_string().contains("Unexpected token"));
    }
}
