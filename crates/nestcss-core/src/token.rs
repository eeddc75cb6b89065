//! Mode-aware tokenizer.
//!
//! The same characters lex differently inside a selector and inside a
//! value, so the parser switches the [`LexicalMode`] as it walks the
//! document. Whitespace is never produced as a token; instead each token
//! records whether whitespace came before it.

use crate::error::{CompileError, Result, Span};

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum LexicalMode {
    Selector,
    Block,
    Value,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum TokenKind {
    Comment,
    Ident,
    Number,
    /// Unit suffix glued to the preceding number.
    Unit,
    Hash,
    Str,
    Variable,
    AtKeyword,
    Url,
    InterpolationStart,
    Ampersand,
    /// Raw selector text, or a bracketed `[...]` run in a value.
    Text,
    Colon,
    Semicolon,
    Comma,
    LeftBrace,
    RightBrace,
    LeftParen,
    RightParen,
    Plus,
    Minus,
    Star,
    Slash,
    Percent,
    Equals,
    NotEquals,
    Gt,
    Gte,
    Lt,
    Lte,
    Delim,
}

#[derive(Clone, Debug, PartialEq)]
pub struct Token {
    pub kind: TokenKind,
    pub text: String,
    pub span: Span,
    /// Byte offset of the first character.
    pub offset: usize,
    pub space_before: bool,
    prev: Option<TokenKind>,
}

impl Token {
    pub fn is(&self, kind: TokenKind) -> bool {
        self.kind == kind
    }

    /// Text without its sigil, for `$name` and `@name` tokens.
    pub fn name(&self) -> &str {
        match self.kind {
            TokenKind::Variable | TokenKind::AtKeyword => &self.text[1..],
            _ => &self.text,
        }
    }
}

pub struct Tokenizer<'a> {
    src: &'a str,
    pos: usize,
    line: usize,
    column: usize,
    mode: LexicalMode,
    last: Option<TokenKind>,
    pending_unit: bool,
    carry_space: bool,
}

impl<'a> Tokenizer<'a> {
    pub fn new(src: &'a str) -> Self {
        Self {
            src,
            pos: 0,
            line: 1,
            column: 1,
            mode: LexicalMode::Block,
            last: None,
            pending_unit: false,
            carry_space: false,
        }
    }

    pub fn mode(&self) -> LexicalMode {
        self.mode
    }

    pub fn set_mode(&mut self, mode: LexicalMode) {
        self.mode = mode;
    }

    pub fn here(&self) -> Span {
        Span {
            line: self.line,
            column: self.column,
        }
    }

    pub fn source(&self) -> &'a str {
        self.src
    }

    /// Moves back so that `token` is lexed again, possibly in another mode.
    pub fn rewind(&mut self, token: &Token) {
        self.pos = token.offset;
        self.line = token.span.line;
        self.column = token.span.column;
        self.last = token.prev;
        self.pending_unit = false;
        self.carry_space = token.space_before;
    }

    /// Finds the first `;`, `{` or `}` at nesting level zero from `offset`.
    ///
    /// Used to tell declarations from nested rules before committing to a
    /// mode. Strings, comments, parentheses, brackets and interpolations
    /// are skipped over.
    pub fn item_end(&self, offset: usize) -> Option<char> {
        let bytes = self.src.as_bytes();
        let mut i = offset;
        let mut parens = 0usize;
        let mut interpolations = 0usize;
        while i < bytes.len() {
            let c = bytes[i];
            match c {
                b'"' | b'\'' => {
                    i += 1;
                    while i < bytes.len() && bytes[i] != c && bytes[i] != b'\n' {
                        if bytes[i] == b'\\' {
                            i += 1;
                        }
                        i += 1;
                    }
                }
                b'/' if bytes.get(i + 1) == Some(&b'*') => {
                    i += 2;
                    while i + 1 < bytes.len() && !(bytes[i] == b'*' && bytes[i + 1] == b'/') {
                        i += 1;
                    }
                    i += 1;
                }
                b'#' if bytes.get(i + 1) == Some(&b'{') => {
                    interpolations += 1;
                    i += 1;
                }
                b'(' | b'[' => parens += 1,
                b')' | b']' => parens = parens.saturating_sub(1),
                b'}' if interpolations > 0 => interpolations -= 1,
                b';' | b'{' | b'}' if parens == 0 => return Some(c as char),
                _ => {}
            }
            i += 1;
        }
        None
    }

    pub fn next_token(&mut self) -> Result<Option<Token>> {
        if self.pending_unit {
            return self.lex_unit().map(Some);
        }
        let mut space_before = std::mem::take(&mut self.carry_space);
        space_before |= self.skip_trivia()?;

        let start = self.pos;
        let span = self.here();
        let prev = self.last;
        let Some(c) = self.peek_char() else {
            return Ok(None);
        };
        let kind = match self.mode {
            LexicalMode::Selector => self.lex_selector(c)?,
            LexicalMode::Block | LexicalMode::Value => self.lex_value(c, space_before)?,
        };
        self.last = Some(kind);
        Ok(Some(Token {
            kind,
            text: self.src[start..self.pos].to_string(),
            span,
            offset: start,
            space_before,
            prev,
        }))
    }

    fn peek_char(&self) -> Option<char> {
        self.src[self.pos..].chars().next()
    }

    fn peek_nth(&self, n: usize) -> Option<char> {
        self.src[self.pos..].chars().nth(n)
    }

    fn bump(&mut self) -> Option<char> {
        let c = self.peek_char()?;
        self.pos += c.len_utf8();
        if c == '\n' {
            self.line += 1;
            self.column = 1;
        } else {
            self.column += 1;
        }
        Some(c)
    }

    fn error(&self, message: impl Into<String>, span: Span) -> CompileError {
        CompileError::syntax(message, span)
    }

    /// Skips whitespace and comments that never become tokens. Block
    /// comments are kept as tokens in block mode so the parser can hold on
    /// to comments between rules.
    fn skip_trivia(&mut self) -> Result<bool> {
        let mut skipped = false;
        loop {
            match self.peek_char() {
                Some(c) if c.is_whitespace() => {
                    self.bump();
                }
                Some('/') if self.peek_nth(1) == Some('/') => {
                    while let Some(c) = self.peek_char() {
                        if c == '\n' {
                            break;
                        }
                        self.bump();
                    }
                }
                Some('/') if self.peek_nth(1) == Some('*') && self.mode != LexicalMode::Block => {
                    self.read_block_comment()?;
                }
                _ => return Ok(skipped),
            }
            skipped = true;
        }
    }

    fn read_block_comment(&mut self) -> Result<()> {
        let span = self.here();
        self.bump();
        self.bump();
        loop {
            match self.bump() {
                None => return Err(self.error("Unterminated comment", span)),
                Some('*') if self.peek_char() == Some('/') => {
                    self.bump();
                    return Ok(());
                }
                Some(_) => {}
            }
        }
    }

    fn lex_unit(&mut self) -> Result<Token> {
        self.pending_unit = false;
        let start = self.pos;
        let span = self.here();
        if self.peek_char() == Some('%') {
            self.bump();
        } else {
            self.read_name();
        }
        let prev = self.last;
        self.last = Some(TokenKind::Unit);
        Ok(Token {
            kind: TokenKind::Unit,
            text: self.src[start..self.pos].to_string(),
            span,
            offset: start,
            space_before: false,
            prev,
        })
    }

    fn lex_selector(&mut self, c: char) -> Result<TokenKind> {
        let kind = match c {
            ',' => TokenKind::Comma,
            '&' => TokenKind::Ampersand,
            '{' => TokenKind::LeftBrace,
            '}' => TokenKind::RightBrace,
            ';' => TokenKind::Semicolon,
            '"' | '\'' => {
                self.read_string(c)?;
                return Ok(TokenKind::Str);
            }
            '#' if self.peek_nth(1) == Some('{') => {
                self.bump();
                TokenKind::InterpolationStart
            }
            _ => {
                self.read_selector_text()?;
                return Ok(TokenKind::Text);
            }
        };
        self.bump();
        Ok(kind)
    }

    fn read_selector_text(&mut self) -> Result<()> {
        while let Some(c) = self.peek_char() {
            match c {
                c if c.is_whitespace() => break,
                ',' | '&' | '{' | '}' | ';' | '"' | '\'' => break,
                '#' if self.peek_nth(1) == Some('{') => break,
                '/' if matches!(self.peek_nth(1), Some('*') | Some('/')) => break,
                '(' => self.read_balanced('(', ')')?,
                '[' => self.read_balanced('[', ']')?,
                ')' | ']' => {
                    return Err(self.error(format!("Unexpected '{c}' in selector"), self.here()))
                }
                _ => {
                    self.bump();
                }
            }
        }
        Ok(())
    }

    fn lex_value(&mut self, c: char, space_before: bool) -> Result<TokenKind> {
        let next = self.peek_nth(1);
        let kind = match c {
            '/' if next == Some('*') => {
                self.read_block_comment()?;
                return Ok(TokenKind::Comment);
            }
            '"' | '\'' => {
                self.read_string(c)?;
                return Ok(TokenKind::Str);
            }
            '$' | '@' => {
                self.bump();
                if self.read_name() == 0 {
                    return Ok(TokenKind::Delim);
                }
                return Ok(if c == '$' {
                    TokenKind::Variable
                } else {
                    TokenKind::AtKeyword
                });
            }
            '#' if next == Some('{') => {
                self.bump();
                TokenKind::InterpolationStart
            }
            '#' => {
                self.bump();
                self.read_name();
                return Ok(TokenKind::Hash);
            }
            c if c.is_ascii_digit() || (c == '.' && next.is_some_and(|n| n.is_ascii_digit())) => {
                self.read_number();
                return Ok(TokenKind::Number);
            }
            '-' if next.is_some_and(|n| is_ident_start(n) || n == '-') => {
                self.read_name();
                return Ok(TokenKind::Ident);
            }
            '-' if self.starts_number(1) && self.sign_allowed(space_before) => {
                self.bump();
                self.read_number();
                return Ok(TokenKind::Number);
            }
            '[' => {
                self.read_balanced('[', ']')?;
                return Ok(TokenKind::Text);
            }
            '=' if next == Some('=') => {
                self.bump();
                TokenKind::Equals
            }
            '!' if next == Some('=') => {
                self.bump();
                TokenKind::NotEquals
            }
            '!' if next.is_some_and(is_ident_start) => {
                self.bump();
                self.read_name();
                return Ok(TokenKind::Ident);
            }
            '>' if next == Some('=') => {
                self.bump();
                TokenKind::Gte
            }
            '<' if next == Some('=') => {
                self.bump();
                TokenKind::Lte
            }
            '&' => TokenKind::Ampersand,
            '>' => TokenKind::Gt,
            '<' => TokenKind::Lt,
            '+' => TokenKind::Plus,
            '-' => TokenKind::Minus,
            '*' => TokenKind::Star,
            '/' => TokenKind::Slash,
            '%' => TokenKind::Percent,
            ':' => TokenKind::Colon,
            ';' => TokenKind::Semicolon,
            ',' => TokenKind::Comma,
            '{' => TokenKind::LeftBrace,
            '}' => TokenKind::RightBrace,
            '(' => TokenKind::LeftParen,
            ')' => TokenKind::RightParen,
            c if is_ident_start(c) => {
                let start = self.pos;
                self.read_name();
                if self.src[start..self.pos].eq_ignore_ascii_case("url")
                    && self.peek_char() == Some('(')
                {
                    self.read_url()?;
                    return Ok(TokenKind::Url);
                }
                return Ok(TokenKind::Ident);
            }
            _ => TokenKind::Delim,
        };
        self.bump();
        Ok(kind)
    }

    fn starts_number(&self, at: usize) -> bool {
        match self.peek_nth(at) {
            Some(c) if c.is_ascii_digit() => true,
            Some('.') => self.peek_nth(at + 1).is_some_and(|c| c.is_ascii_digit()),
            _ => false,
        }
    }

    /// A `-` directly before a number is a sign unless it follows an operand.
    fn sign_allowed(&self, space_before: bool) -> bool {
        space_before
            || !matches!(
                self.last,
                Some(
                    TokenKind::Number
                        | TokenKind::Unit
                        | TokenKind::Ident
                        | TokenKind::Variable
                        | TokenKind::RightParen
                        | TokenKind::RightBrace
                        | TokenKind::Str
                        | TokenKind::Hash
                )
            )
    }

    fn read_number(&mut self) {
        while self.peek_char().is_some_and(|c| c.is_ascii_digit()) {
            self.bump();
        }
        if self.peek_char() == Some('.') && self.peek_nth(1).is_some_and(|c| c.is_ascii_digit()) {
            self.bump();
            while self.peek_char().is_some_and(|c| c.is_ascii_digit()) {
                self.bump();
            }
        }
        self.pending_unit = match self.peek_char() {
            Some('%') => true,
            Some(c) => c.is_ascii_alphabetic(),
            None => false,
        };
    }

    /// Consumes name characters, returning how many were read.
    fn read_name(&mut self) -> usize {
        let mut count = 0;
        while let Some(c) = self.peek_char() {
            if c == '\\' {
                self.bump();
                self.bump();
            } else if is_name_char(c) {
                self.bump();
            } else {
                break;
            }
            count += 1;
        }
        count
    }

    fn read_string(&mut self, quote: char) -> Result<()> {
        let span = self.here();
        self.bump();
        loop {
            match self.peek_char() {
                None | Some('\n') => return Err(self.error("Unterminated string", span)),
                Some('\\') => {
                    self.bump();
                    self.bump();
                }
                Some(c) => {
                    self.bump();
                    if c == quote {
                        return Ok(());
                    }
                }
            }
        }
    }

    fn read_url(&mut self) -> Result<()> {
        let span = self.here();
        self.bump();
        loop {
            match self.peek_char() {
                None => return Err(self.error("Unterminated url(", span)),
                Some(q @ ('"' | '\'')) => self.read_string(q)?,
                Some(')') => {
                    self.bump();
                    return Ok(());
                }
                Some(_) => {
                    self.bump();
                }
            }
        }
    }

    fn read_balanced(&mut self, open: char, close: char) -> Result<()> {
        let span = self.here();
        let mut depth = 0usize;
        loop {
            match self.peek_char() {
                None => return Err(self.error(format!("Unbalanced '{open}'"), span)),
                Some(q @ ('"' | '\'')) => self.read_string(q)?,
                Some(c) => {
                    self.bump();
                    if c == open {
                        depth += 1;
                    } else if c == close {
                        depth -= 1;
                        if depth == 0 {
                            return Ok(());
                        }
                    }
                }
            }
        }
    }
}

impl Iterator for Tokenizer<'_> {
    type Item = Result<Token>;

    fn next(&mut self) -> Option<Self::Item> {
        self.next_token().transpose()
    }
}

fn is_ident_start(c: char) -> bool {
    c.is_ascii_alphabetic() || c == '_' || c == '\\' || !c.is_ascii()
}

fn is_name_char(c: char) -> bool {
    c.is_ascii_alphanumeric() || c == '-' || c == '_' || !c.is_ascii()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn kinds(src: &str, mode: LexicalMode) -> Vec<(TokenKind, String)> {
        let mut tokenizer = Tokenizer::new(src);
        tokenizer.set_mode(mode);
        tokenizer
            .map(|t| t.map(|t| (t.kind, t.text)))
            .collect::<Result<_>>()
            .unwrap()
    }

    #[test]
    fn numbers_carry_units() {
        let tokens = kinds("10px 50% .5em -2", LexicalMode::Value);
        assert_eq!(
            tokens,
            vec![
                (TokenKind::Number, "10".into()),
                (TokenKind::Unit, "px".into()),
                (TokenKind::Number, "50".into()),
                (TokenKind::Unit, "%".into()),
                (TokenKind::Number, ".5".into()),
                (TokenKind::Unit, "em".into()),
                (TokenKind::Number, "-2".into()),
            ]
        );
    }

    #[test]
    fn minus_between_operands_is_an_operator() {
        let tokens = kinds("$a - 2 $b -3", LexicalMode::Value);
        let kinds: Vec<TokenKind> = tokens.iter().map(|t| t.0).collect();
        assert_eq!(
            kinds,
            vec![
                TokenKind::Variable,
                TokenKind::Minus,
                TokenKind::Number,
                TokenKind::Variable,
                TokenKind::Number,
            ]
        );
    }

    #[test]
    fn value_tokens() {
        let tokens = kinds(
            "#fff url(a.png) \"x y\" !important -webkit-box #{ == !=",
            LexicalMode::Value,
        );
        let kinds: Vec<TokenKind> = tokens.iter().map(|t| t.0).collect();
        assert_eq!(
            kinds,
            vec![
                TokenKind::Hash,
                TokenKind::Url,
                TokenKind::Str,
                TokenKind::Ident,
                TokenKind::Ident,
                TokenKind::InterpolationStart,
                TokenKind::Equals,
                TokenKind::NotEquals,
            ]
        );
        assert_eq!(tokens[3].1, "!important");
    }

    #[test]
    fn selector_text_keeps_parenthesized_commas() {
        let tokens = kinds("a:not(.b, .c) > &.d, e", LexicalMode::Selector);
        assert_eq!(
            tokens,
            vec![
                (TokenKind::Text, "a:not(.b, .c)".into()),
                (TokenKind::Text, ">".into()),
                (TokenKind::Ampersand, "&".into()),
                (TokenKind::Text, ".d".into()),
                (TokenKind::Comma, ",".into()),
                (TokenKind::Text, "e".into()),
            ]
        );
    }

    #[test]
    fn whitespace_is_recorded_on_the_next_token() {
        let mut tokenizer = Tokenizer::new("a  b");
        let a = tokenizer.next_token().unwrap().unwrap();
        let b = tokenizer.next_token().unwrap().unwrap();
        assert!(!a.space_before);
        assert!(b.space_before);
        assert_eq!(b.span, Span { line: 1, column: 4 });
    }

    #[test]
    fn line_comments_are_skipped() {
        let tokens = kinds("a // ignored\nb", LexicalMode::Value);
        assert_eq!(tokens.len(), 2);
    }

    #[test]
    fn block_comments_are_tokens_in_block_mode() {
        let tokens = kinds("/* hi */ a", LexicalMode::Block);
        assert_eq!(tokens[0], (TokenKind::Comment, "/* hi */".into()));
        let tokens = kinds("/* hi */ a", LexicalMode::Value);
        assert_eq!(tokens.len(), 1);
    }

    #[test]
    fn rewind_relexes_in_new_mode() {
        let mut tokenizer = Tokenizer::new("a:hover {");
        let first = tokenizer.next_token().unwrap().unwrap();
        assert_eq!(first.kind, TokenKind::Ident);
        tokenizer.rewind(&first);
        tokenizer.set_mode(LexicalMode::Selector);
        let again = tokenizer.next_token().unwrap().unwrap();
        assert_eq!(again.kind, TokenKind::Text);
        assert_eq!(again.text, "a:hover");
    }

    #[test]
    fn item_end_skips_nested_content() {
        let src = "color: url(data:a;b) #{$x}; a { }";
        let tokenizer = Tokenizer::new(src);
        assert_eq!(tokenizer.item_end(0), Some(';'));
        assert_eq!(tokenizer.item_end(src.find("a {").unwrap()), Some('{'));
        assert_eq!(tokenizer.item_end(src.len()), None);
    }

    #[test]
    fn unterminated_string_is_a_syntax_error() {
        let mut tokenizer = Tokenizer::new("'abc");
        let err = tokenizer.next_token().unwrap_err();
        assert!(err.to_string().contains("Unterminated string"));
    }
}
