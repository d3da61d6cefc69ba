//! Byte stream to token stream, with source positions.

use crate::diagnostic::{Diagnostic, DiagnosticKind};
use crate::span::{Span, Spanned};
use crate::token::Token;

/// A source comment preserved for a future formatter.
#[derive(Clone, Debug)]
pub struct Comment {
    pub text: String,
    pub span: Span,
    pub trailing: bool,
}

pub struct Lexer<'src> {
    source: &'src [u8],
    file_id: u16,
    pos: usize,
    diagnostics: Vec<Diagnostic>,
    comments: Vec<Comment>,
    token_on_line: bool,
}

impl<'src> Lexer<'src> {
    pub fn new(source: &'src str, file_id: u16) -> Self {
        Self {
            source: source.as_bytes(),
            file_id,
            pos: 0,
            diagnostics: Vec::new(),
            comments: Vec::new(),
            token_on_line: false,
        }
    }

    /// Tokenize the whole source. Never panics: unrecognized input becomes a
    /// diagnostic and the lexer resynchronizes at the next character.
    pub fn tokenize(mut self) -> (Vec<Spanned<Token>>, Vec<Comment>, Vec<Diagnostic>) {
        let mut tokens = Vec::new();
        loop {
            let tok = self.next_token();
            let is_eof = tok.node.is_eof();
            tokens.push(tok);
            if is_eof {
                break;
            }
        }
        (tokens, self.comments, self.diagnostics)
    }

    fn next_token(&mut self) -> Spanned<Token> {
        loop {
            self.skip_whitespace_and_comments();

            if self.pos >= self.source.len() {
                return self.make_token(Token::Eof, self.pos, self.pos);
            }

            let start = self.pos;
            let ch = self.source[self.pos];
            self.token_on_line = true;

            if is_ident_start(ch) {
                return self.scan_ident_or_keyword();
            }
            if ch.is_ascii_digit() {
                return self.scan_number();
            }
            if ch == b'"' {
                return self.scan_string(false);
            }
            if ch == b'\'' {
                return self.scan_char();
            }
            if let Some(tok) = self.scan_symbol(start) {
                return tok;
            }
            // scan_symbol recorded a diagnostic and consumed nothing useful; retry.
        }
    }

    fn skip_whitespace_and_comments(&mut self) {
        loop {
            while self.pos < self.source.len() && self.source[self.pos].is_ascii_whitespace() {
                if self.source[self.pos] == b'\n' {
                    self.token_on_line = false;
                }
                self.pos += 1;
            }

            if self.peek_at(0) == Some(b'/') && self.peek_at(1) == Some(b'/') {
                let start = self.pos;
                while self.pos < self.source.len() && self.source[self.pos] != b'\n' {
                    self.pos += 1;
                }
                self.push_comment(start);
                continue;
            }

            if self.peek_at(0) == Some(b'/') && self.peek_at(1) == Some(b'*') {
                let start = self.pos;
                self.pos += 2;
                let mut depth = 1u32;
                while self.pos < self.source.len() && depth > 0 {
                    if self.peek_at(0) == Some(b'/') && self.peek_at(1) == Some(b'*') {
                        depth += 1;
                        self.pos += 2;
                    } else if self.peek_at(0) == Some(b'*') && self.peek_at(1) == Some(b'/') {
                        depth -= 1;
                        self.pos += 2;
                    } else {
                        self.pos += 1;
                    }
                }
                if depth > 0 {
                    self.diagnostics.push(
                        Diagnostic::error(
                            DiagnosticKind::UnterminatedComment,
                            "unterminated block comment",
                            Span::new(self.file_id, start as u32, self.pos as u32),
                        )
                        .with_help("every `/*` needs a matching `*/`"),
                    );
                }
                self.push_comment(start);
                continue;
            }

            break;
        }
    }

    fn push_comment(&mut self, start: usize) {
        let text = String::from_utf8_lossy(&self.source[start..self.pos]).into_owned();
        self.comments.push(Comment {
            text,
            span: Span::new(self.file_id, start as u32, self.pos as u32),
            trailing: self.token_on_line,
        });
    }

    fn scan_ident_or_keyword(&mut self) -> Spanned<Token> {
        let start = self.pos;
        while self.pos < self.source.len() && is_ident_continue(self.source[self.pos]) {
            self.pos += 1;
        }
        let text = std::str::from_utf8(&self.source[start..self.pos]).unwrap();

        if text == "l" && self.peek_at(0) == Some(b'"') {
            self.pos += 1;
            return self.scan_string_from(start, true);
        }
        if text == "asm" {
            return self.scan_asm_block(start);
        }
        if text == "_" {
            return self.make_token(Token::Underscore, start, self.pos);
        }

        let token = Token::from_keyword(text).unwrap_or_else(|| Token::Ident(text.to_string()));
        self.make_token(token, start, self.pos)
    }

    /// `asm { <raw body> }`. Brace-balanced; the body is handed verbatim to the
    /// parser, which stores it on an `InlineAsm` statement.
    fn scan_asm_block(&mut self, start: usize) -> Spanned<Token> {
        while self.pos < self.source.len() && self.source[self.pos].is_ascii_whitespace() {
            self.pos += 1;
        }
        if self.pos >= self.source.len() || self.source[self.pos] != b'{' {
            self.diagnostics.push(
                Diagnostic::error(
                    DiagnosticKind::MissingToken,
                    "expected '{' after 'asm'",
                    Span::new(self.file_id, self.pos as u32, self.pos as u32),
                )
                .with_help("inline assembly syntax is `asm { instructions }`"),
            );
            return self.make_token(Token::AsmBlock(String::new()), start, self.pos);
        }
        self.pos += 1;

        let body_start = self.pos;
        let mut depth = 1u32;
        while self.pos < self.source.len() && depth > 0 {
            match self.source[self.pos] {
                b'{' => depth += 1,
                b'}' => depth -= 1,
                _ => {}
            }
            if depth > 0 {
                self.pos += 1;
            }
        }
        let body = String::from_utf8_lossy(&self.source[body_start..self.pos])
            .trim()
            .to_string();

        if self.pos < self.source.len() {
            self.pos += 1; // closing '}'
        } else {
            self.diagnostics.push(
                Diagnostic::error(
                    DiagnosticKind::UnterminatedString,
                    "unterminated asm block: missing closing '}'",
                    Span::new(self.file_id, start as u32, self.pos as u32),
                )
                .with_help("every `asm { ... }` block needs a matching closing brace"),
            );
        }
        self.make_token(Token::AsmBlock(body), start, self.pos)
    }

/// Decimal, `0x…`, or `0b…`, with `_` digit separators allowed.
    fn scan_number(&mut self) -> Spanned<Token> {
        let start = self.pos;

        if self.source[self.pos] == b'0'
            && matches!(self.peek_at(1), Some(b'x') | Some(b'X'))
        {
            self.pos += 2;
            let digits_start = self.pos;
            while self.pos < self.source.len()
                && (self.source[self.pos].is_ascii_hexdigit() || self.source[self.pos] == b'_')
            {
                self.pos += 1;
            }
            let text: String = std::str::from_utf8(&self.source[digits_start..self.pos])
                .unwrap()
                .chars()
                .filter(|c| *c != '_')
                .collect();
            return self.finish_integer(u64::from_str_radix(&text, 16), start);
        }

        if self.source[self.pos] == b'0'
            && matches!(self.peek_at(1), Some(b'b') | Some(b'B'))
        {
            self.pos += 2;
            let digits_start = self.pos;
            while self.pos < self.source.len()
                && (self.source[self.pos] == b'0'
                    || self.source[self.pos] == b'1'
                    || self.source[self.pos] == b'_')
            {
                self.pos += 1;
            }
            let text: String = std::str::from_utf8(&self.source[digits_start..self.pos])
                .unwrap()
                .chars()
                .filter(|c| *c != '_')
                .collect();
            return self.finish_integer(u64::from_str_radix(&text, 2), start);
        }

        while self.pos < self.source.len()
            && (self.source[self.pos].is_ascii_digit() || self.source[self.pos] == b'_')
        {
            self.pos += 1;
        }
        let text: String = std::str::from_utf8(&self.source[start..self.pos])
            .unwrap()
            .chars()
            .filter(|c| *c != '_')
            .collect();
        self.finish_integer(text.parse::<u64>(), start)
    }

    fn finish_integer(&mut self, parsed: Result<u64, impl std::fmt::Debug>, start: usize) -> Spanned<Token> {
        match parsed {
            Ok(n) => self.make_token(Token::Integer(n), start, self.pos),
            Err(_) => {
                let text = std::str::from_utf8(&self.source[start..self.pos]).unwrap();
                self.diagnostics.push(
                    Diagnostic::error(
                        DiagnosticKind::StrayCharacter,
                        format!("integer literal '{}' is too large", text),
                        Span::new(self.file_id, start as u32, self.pos as u32),
                    )
                    .with_help(format!("maximum integer value is {}", u64::MAX)),
                );
                self.make_token(Token::Integer(0), start, self.pos)
            }
        }
    }

    fn scan_string(&mut self, long_form: bool) -> Spanned<Token> {
        let start = self.pos;
        self.pos += 1; // opening '"'
        self.scan_string_from(start, long_form)
    }

    /// Scans a string body; `self.pos` must already be past the opening `"`.
    /// `start` is the span start (the `l` prefix byte for long-form strings).
    fn scan_string_from(&mut self, start: usize, long_form: bool) -> Spanned<Token> {
        let mut bytes = Vec::new();
        loop {
            if self.pos >= self.source.len() {
                self.diagnostics.push(
                    Diagnostic::error(
                        DiagnosticKind::UnterminatedString,
                        "unterminated string literal",
                        Span::new(self.file_id, start as u32, self.pos as u32),
                    )
                    .with_help("strings must be closed with a matching '\"'"),
                );
                break;
            }
            match self.source[self.pos] {
                b'"' => {
                    self.pos += 1;
                    break;
                }
                b'\\' => {
                    self.pos += 1;
                    if let Some(b) = self.scan_escape_byte(start) {
                        bytes.push(b);
                    }
                }
                b => {
                    bytes.push(b);
                    self.pos += 1;
                }
            }
        }
        if bytes.len() > u16::MAX as usize {
            self.diagnostics.push(Diagnostic::error(
                DiagnosticKind::StrayCharacter,
                format!(
                    "string literal of {} bytes exceeds the maximum length of {}",
                    bytes.len(),
                    u16::MAX
                ),
                Span::new(self.file_id, start as u32, self.pos as u32),
            ));
        }
        self.make_token(Token::Str { bytes, long_form }, start, self.pos)
    }

    fn scan_char(&mut self) -> Spanned<Token> {
        let start = self.pos;
        self.pos += 1; // opening '\''
        let ch = if self.peek_at(0) == Some(b'\\') {
            self.pos += 1;
            self.scan_escape_byte(start).unwrap_or(0) as char
        } else if let Some(b) = self.peek_at(0) {
            self.pos += 1;
            b as char
        } else {
            self.diagnostics.push(Diagnostic::error(
                DiagnosticKind::UnterminatedString,
                "unterminated character literal",
                Span::new(self.file_id, start as u32, self.pos as u32),
            ));
            '\0'
        };
        if self.peek_at(0) == Some(b'\'') {
            self.pos += 1;
        } else {
            self.diagnostics.push(
                Diagnostic::error(
                    DiagnosticKind::UnterminatedString,
                    "unterminated character literal: missing closing '\''",
                    Span::new(self.file_id, start as u32, self.pos as u32),
                )
                .with_help("character literals hold exactly one character, e.g. 'a'"),
            );
        }
        self.make_token(Token::Char(ch), start, self.pos)
    }

    /// Scans one escape sequence after the backslash has been consumed.
    fn scan_escape_byte(&mut self, lit_start: usize) -> Option<u8> {
        if self.pos >= self.source.len() {
            self.diagnostics.push(Diagnostic::error(
                DiagnosticKind::BadEscape,
                "unterminated escape sequence",
                Span::new(self.file_id, lit_start as u32, self.pos as u32),
            ));
            return None;
        }
        let b = self.source[self.pos];
        self.pos += 1;
        match b {
            b'n' => Some(b'\n'),
            b't' => Some(b'\t'),
            b'\\' => Some(b'\\'),
            b'\'' => Some(b'\''),
            b'"' => Some(b'"'),
            b'0' => Some(0),
            b'x' => {
                let hex_start = self.pos;
                let mut n = 0u32;
                let mut count = 0;
                while count < 2 && self.pos < self.source.len() && self.source[self.pos].is_ascii_hexdigit() {
                    n = n * 16 + (self.source[self.pos] as char).to_digit(16).unwrap();
                    self.pos += 1;
                    count += 1;
                }
                if count == 0 {
                    self.diagnostics.push(Diagnostic::error(
                        DiagnosticKind::BadEscape,
                        "expected hex digits after '\\x'",
                        Span::new(self.file_id, hex_start as u32, self.pos as u32),
                    ));
                    return None;
                }
                Some(n as u8)
            }
            other => {
                self.diagnostics.push(
                    Diagnostic::error(
                        DiagnosticKind::BadEscape,
                        format!("unknown escape sequence '\\{}'", other as char),
                        Span::new(self.file_id, lit_start as u32, self.pos as u32),
                    )
                    .with_help("valid escapes: \\n \\t \\\\ \\' \\\" \\0 \\xNN"),
                );
                None
            }
        }
    }

    fn scan_symbol(&mut self, start: usize) -> Option<Spanned<Token>> {
        let ch = self.source[self.pos];
        self.pos += 1;

        let token = match ch {
            b'(' => Token::LParen,
            b')' => Token::RParen,
            b'{' => Token::LBrace,
            b'}' => Token::RBrace,
            b'[' => Token::LBracket,
            b']' => Token::RBracket,
            b',' => Token::Comma,
            b':' => Token::Colon,
            b';' => Token::Semicolon,
            b'~' => Token::Tilde,
            b'@' => Token::At,
            b'.' => {
                if self.peek_at(0) == Some(b'.') {
                    self.pos += 1;
                    Token::DotDot
                } else {
                    Token::Dot
                }
            }
            b'-' => {
                if self.peek_at(0) == Some(b'>') {
                    self.pos += 1;
                    Token::Arrow
                } else {
                    Token::Minus
                }
            }
            b'=' => {
                if self.peek_at(0) == Some(b'=') {
                    self.pos += 1;
                    Token::EqEq
                } else if self.peek_at(0) == Some(b'>') {
                    self.pos += 1;
                    Token::FatArrow
                } else {
                    Token::Eq
                }
            }
            b'!' => {
                if self.peek_at(0) == Some(b'=') {
                    self.pos += 1;
                    Token::NotEq
                } else {
                    Token::Bang
                }
            }
            b'<' => {
                if self.peek_at(0) == Some(b'=') {
                    self.pos += 1;
                    Token::Le
                } else if self.peek_at(0) == Some(b'<') {
                    self.pos += 1;
                    Token::Shl
                } else {
                    Token::Lt
                }
            }
            b'>' => {
                if self.peek_at(0) == Some(b'=') {
                    self.pos += 1;
                    Token::Ge
                } else if self.peek_at(0) == Some(b'>') {
                    self.pos += 1;
                    Token::Shr
                } else {
                    Token::Gt
                }
            }
            b'+' => Token::Plus,
            b'*' => Token::Star,
            b'%' => Token::Percent,
            b'&' => {
                if self.peek_at(0) == Some(b'&') {
                    self.pos += 1;
                    Token::AmpAmp
                } else {
                    Token::Amp
                }
            }
            b'|' => {
                if self.peek_at(0) == Some(b'|') {
                    self.pos += 1;
                    Token::PipePipe
                } else {
                    Token::Pipe
                }
            }
            b'^' => Token::Caret,
            b'/' => Token::Slash,
            _ => {
                self.diagnostics.push(
                    Diagnostic::error(
                        DiagnosticKind::StrayCharacter,
                        format!("unexpected character '{}' (U+{:04X})", ch as char, ch),
                        Span::new(self.file_id, start as u32, self.pos as u32),
                    )
                    .with_help("this character is not part of MinZ syntax"),
                );
                return None;
            }
        };

        Some(self.make_token(token, start, self.pos))
    }

    fn peek_at(&self, ahead: usize) -> Option<u8> {
        self.source.get(self.pos + ahead).copied()
    }

    fn make_token(&self, token: Token, start: usize, end: usize) -> Spanned<Token> {
        Spanned::new(token, Span::new(self.file_id, start as u32, end as u32))
    }
}

fn is_ident_start(ch: u8) -> bool {
    ch.is_ascii_alphabetic() || ch == b'_'
}

fn is_ident_continue(ch: u8) -> bool {
    ch.is_ascii_alphanumeric() || ch == b'_'
}

#[cfg(test)]
mod tests {
    use super::*;

    fn lex(source: &str) -> Vec<Token> {
        let (tokens, _comments, diags) = Lexer::new(source, 0).tokenize();
        assert!(diags.is_empty(), "unexpected errors: {:?}", diags);
        tokens.into_iter().map(|t| t.node).collect()
    }

    #[test]
    fn keywords() {
        let tokens = lex("fun fn let var mut const global struct enum interface impl import as pub return if else while for in loop break continue case true false");
        assert_eq!(
            tokens,
            vec![
                Token::Fun, Token::Fn, Token::Let, Token::Var, Token::Mut, Token::Const,
                Token::Global, Token::Struct, Token::Enum, Token::Interface, Token::Impl,
                Token::Import, Token::As, Token::Pub, Token::Return, Token::If, Token::Else,
                Token::While, Token::For, Token::In, Token::Loop, Token::Break, Token::Continue,
                Token::Case, Token::True, Token::False,
                Token::Eof,
            ]
        );
    }

    #[test]
    fn integer_literals() {
        let tokens = lex("0 42 0xFF 0b1010 1_000_000");
        assert_eq!(
            tokens,
            vec![
                Token::Integer(0),
                Token::Integer(42),
                Token::Integer(255),
                Token::Integer(10),
                Token::Integer(1_000_000),
                Token::Eof,
            ]
        );
    }

    #[test]
    fn string_literal_short_and_long() {
        let tokens = lex(r#""hi" l"long""#);
        assert_eq!(
            tokens,
            vec![
                Token::Str { bytes: b"hi".to_vec(), long_form: false },
                Token::Str { bytes: b"long".to_vec(), long_form: true },
                Token::Eof,
            ]
        );
    }

    #[test]
    fn char_literal_escapes() {
        let tokens = lex(r"'a' '\n' '\\' '\x41'");
        assert_eq!(
            tokens,
            vec![
                Token::Char('a'),
                Token::Char('\n'),
                Token::Char('\\'),
                Token::Char('A'),
                Token::Eof,
            ]
        );
    }

    #[test]
    fn operators_by_precedence_family() {
        let tokens = lex("= || && | ^ & == != < > <= >= << >> + - * / %");
        assert_eq!(
            tokens,
            vec![
                Token::Eq, Token::PipePipe, Token::AmpAmp, Token::Pipe, Token::Caret, Token::Amp,
                Token::EqEq, Token::NotEq, Token::Lt, Token::Gt, Token::Le, Token::Ge,
                Token::Shl, Token::Shr, Token::Plus, Token::Minus, Token::Star, Token::Slash,
                Token::Percent, Token::Eof,
            ]
        );
    }

    #[test]
    fn asm_block_raw_body() {
        let tokens = lex("asm { ld a, 1\n out (0), a }");
        assert_eq!(
            tokens,
            vec![
                Token::AsmBlock("ld a, 1\n out (0), a".to_string()),
                Token::Eof,
            ]
        );
    }

    #[test]
    fn line_and_block_comments_are_skipped() {
        let tokens = lex("a // line\nb /* block\n still block */ c");
        assert_eq!(
            tokens,
            vec![
                Token::Ident("a".into()),
                Token::Ident("b".into()),
                Token::Ident("c".into()),
                Token::Eof,
            ]
        );
    }

    #[test]
    fn attribute_marker() {
        let tokens = lex(r#"@abi("register: A=x")"#);
        assert_eq!(
            tokens,
            vec![
                Token::At,
                Token::Ident("abi".into()),
                Token::LParen,
                Token::Str { bytes: b"register: A=x".to_vec(), long_form: false },
                Token::RParen,
                Token::Eof,
            ]
        );
    }

    #[test]
    fn error_stray_character() {
        let (_tokens, _c, diags) = Lexer::new("`", 0).tokenize();
        assert!(!diags.is_empty());
        assert_eq!(diags[0].kind, DiagnosticKind::StrayCharacter);
        assert!(diags[0].help.is_some());
    }

    #[test]
    fn error_unterminated_string() {
        let (_tokens, _c, diags) = Lexer::new("\"abc", 0).tokenize();
        assert!(!diags.is_empty());
        assert_eq!(diags[0].kind, DiagnosticKind::UnterminatedString);
    }

    #[test]
    fn error_unterminated_comment() {
        let (_tokens, _c, diags) = Lexer::new("/* not closed", 0).tokenize();
        assert!(!diags.is_empty());
        assert_eq!(diags[0].kind, DiagnosticKind::UnterminatedComment);
    }

    #[test]
    fn error_bad_escape() {
        let (_tokens, _c, diags) = Lexer::new(r"'\q'", 0).tokenize();
        assert!(!diags.is_empty());
        assert_eq!(diags[0].kind, DiagnosticKind::BadEscape);
    }

    #[test]
    fn error_integer_too_large() {
        let (_tokens, _c, diags) = Lexer::new("99999999999999999999999999", 0).tokenize();
        assert!(!diags.is_empty());
        assert!(diags[0].message.contains("too large"));
    }

    #[test]
    fn error_unterminated_asm_block() {
        let (_tokens, _c, diags) = Lexer::new("asm { ld a, 1", 0).tokenize();
        assert!(!diags.is_empty());
        assert_eq!(diags[0].kind, DiagnosticKind::UnterminatedString);
    }

    #[test]
    fn lexer_never_panics_on_lone_at_prefix() {
        let (_tokens, _c, _diags) = Lexer::new("@", 0).tokenize();
        let (_tokens, _c, _diags) = Lexer::new("@@@", 0).tokenize();
    }
}
