use crate::ScriptError;

#[derive(Debug, Clone)]
pub(crate) struct Token {
    pub(crate) kind: TokenKind,
    pub(crate) line: usize,
    pub(crate) column: usize,
}

#[derive(Debug, Clone, PartialEq)]
pub(crate) enum TokenKind {
    Ident(String),
    Number(f64),
    LParen,
    RParen,
    LBracket,
    RBracket,
    Comma,
    Dot,
    Eq,
    Plus,
    Minus,
    Star,
    Slash,
    Amp,
    Pipe,
    Semicolon,
    Eof,
}

impl TokenKind {
    pub(crate) fn describe(&self) -> String {
        match self {
            TokenKind::Ident(name) => format!("'{name}'"),
            TokenKind::Number(value) => format!("number {value}"),
            TokenKind::LParen => "'('".to_string(),
            TokenKind::RParen => "')'".to_string(),
            TokenKind::LBracket => "'['".to_string(),
            TokenKind::RBracket => "']'".to_string(),
            TokenKind::Comma => "','".to_string(),
            TokenKind::Dot => "'.'".to_string(),
            TokenKind::Eq => "'='".to_string(),
            TokenKind::Plus => "'+'".to_string(),
            TokenKind::Minus => "'-'".to_string(),
            TokenKind::Star => "'*'".to_string(),
            TokenKind::Slash => "'/'".to_string(),
            TokenKind::Amp => "'&'".to_string(),
            TokenKind::Pipe => "'|>'".to_string(),
            TokenKind::Semicolon => "';'".to_string(),
            TokenKind::Eof => "end of input".to_string(),
        }
    }
}

fn single_char_token(ch: char) -> Option<TokenKind> {
    let kind = match ch {
        '(' => TokenKind::LParen,
        ')' => TokenKind::RParen,
        '[' => TokenKind::LBracket,
        ']' => TokenKind::RBracket,
        ',' => TokenKind::Comma,
        '.' => TokenKind::Dot,
        '=' => TokenKind::Eq,
        '+' => TokenKind::Plus,
        '-' => TokenKind::Minus,
        '*' => TokenKind::Star,
        '/' => TokenKind::Slash,
        '&' => TokenKind::Amp,
        ';' => TokenKind::Semicolon,
        _ => return None,
    };
    Some(kind)
}

#[derive(Debug)]
pub(crate) struct Lexer<'a> {
    source: &'a str,
    index: usize,
    line: usize,
    column: usize,
}

impl<'a> Lexer<'a> {
    pub(crate) fn new(source: &'a str) -> Self {
        Self {
            source,
            index: 0,
            line: 1,
            column: 1,
        }
    }

    pub(crate) fn tokenize(mut self) -> Result<Vec<Token>, ScriptError> {
        let mut tokens = Vec::new();

        while let Some(ch) = self.peek_char() {
            if ch.is_whitespace() {
                self.advance_char();
                continue;
            }

            if self.starts_with("//") || ch == '#' {
                self.skip_line_comment();
                continue;
            }

            if self.starts_with("/*") {
                self.skip_block_comment()?;
                continue;
            }

            let line = self.line;
            let column = self.column;

            if ch.is_ascii_digit() || (ch == '.' && self.next_is_digit()) {
                tokens.push(self.lex_number()?);
                continue;
            }

            if is_ident_start(ch) {
                tokens.push(self.lex_identifier()?);
                continue;
            }

            if self.starts_with("|>") {
                self.advance_char();
                self.advance_char();
                tokens.push(Token {
                    kind: TokenKind::Pipe,
                    line,
                    column,
                });
                continue;
            }

            match single_char_token(ch) {
                Some(kind) => {
                    self.advance_char();
                    tokens.push(Token { kind, line, column });
                }
                None => {
                    return Err(ScriptError::at(
                        format!("unexpected character '{ch}'"),
                        line,
                        column,
                    ));
                }
            }
        }

        tokens.push(Token {
            kind: TokenKind::Eof,
            line: self.line,
            column: self.column,
        });

        Ok(tokens)
    }

    fn lex_identifier(&mut self) -> Result<Token, ScriptError> {
        let line = self.line;
        let column = self.column;
        let start = self.index;

        self.advance_char();
        while self.peek_char().map(is_ident_continue).unwrap_or(false) {
            self.advance_char();
        }

        let ident = self
            .source
            .get(start..self.index)
            .ok_or_else(|| ScriptError::at("invalid identifier span", line, column))?
            .to_string();

        Ok(Token {
            kind: TokenKind::Ident(ident),
            line,
            column,
        })
    }

    fn lex_number(&mut self) -> Result<Token, ScriptError> {
        let line = self.line;
        let column = self.column;
        let start = self.index;

        let mut seen_digit = self.consume_digits();
        if self.peek_char() == Some('.') && self.next_is_digit() {
            self.advance_char();
            seen_digit |= self.consume_digits();
        }

        if let Some(exp) = self.peek_char()
            && (exp == 'e' || exp == 'E')
            && self.exponent_follows()
        {
            self.advance_char();
            if let Some(sign) = self.peek_char()
                && (sign == '+' || sign == '-')
            {
                self.advance_char();
            }
            self.consume_digits();
        }

        if !seen_digit {
            return Err(ScriptError::at("invalid number literal", line, column));
        }

        let text = self
            .source
            .get(start..self.index)
            .ok_or_else(|| ScriptError::at("invalid number span", line, column))?;

        let value = text.parse::<f64>().map_err(|err| {
            ScriptError::at(format!("invalid number literal: {err}"), line, column)
        })?;

        // Lengths are millimetres; the suffix is accepted and ignored.
        if self.starts_with("mm") && !self.char_at(2).map(is_ident_continue).unwrap_or(false) {
            self.advance_char();
            self.advance_char();
        }

        Ok(Token {
            kind: TokenKind::Number(value),
            line,
            column,
        })
    }

    fn consume_digits(&mut self) -> bool {
        let mut any = false;
        while self
            .peek_char()
            .map(|ch| ch.is_ascii_digit())
            .unwrap_or(false)
        {
            any = true;
            self.advance_char();
        }
        any
    }

    /// `1e5`, `1e-5` and `1E+5` are exponents; `1em` is not.
    fn exponent_follows(&self) -> bool {
        match self.char_at(1) {
            Some(ch) if ch.is_ascii_digit() => true,
            Some('+') | Some('-') => self.char_at(2).map(|ch| ch.is_ascii_digit()).unwrap_or(false),
            _ => false,
        }
    }

    fn skip_line_comment(&mut self) {
        while let Some(ch) = self.peek_char() {
            self.advance_char();
            if ch == '\n' {
                break;
            }
        }
    }

    fn skip_block_comment(&mut self) -> Result<(), ScriptError> {
        let start_line = self.line;
        let start_column = self.column;
        self.advance_char();
        self.advance_char();

        while self.index < self.source.len() {
            if self.starts_with("*/") {
                self.advance_char();
                self.advance_char();
                return Ok(());
            }
            self.advance_char();
        }

        Err(ScriptError::at(
            "unterminated block comment",
            start_line,
            start_column,
        ))
    }

    fn starts_with(&self, text: &str) -> bool {
        self.source[self.index..].starts_with(text)
    }

    fn peek_char(&self) -> Option<char> {
        self.source[self.index..].chars().next()
    }

    fn char_at(&self, offset: usize) -> Option<char> {
        self.source[self.index..].chars().nth(offset)
    }

    fn next_is_digit(&self) -> bool {
        self.char_at(1).map(|ch| ch.is_ascii_digit()).unwrap_or(false)
    }

    fn advance_char(&mut self) -> Option<char> {
        let ch = self.peek_char()?;
        self.index += ch.len_utf8();
        if ch == '\n' {
            self.line += 1;
            self.column = 1;
        } else {
            self.column += 1;
        }
        Some(ch)
    }
}

fn is_ident_start(ch: char) -> bool {
    ch == '_' || ch.is_ascii_alphabetic()
}

fn is_ident_continue(ch: char) -> bool {
    ch == '_' || ch.is_ascii_alphanumeric()
}

#[cfg(test)]
mod tests {
    use super::{Lexer, TokenKind};

    fn kinds(source: &str) -> Vec<TokenKind> {
        Lexer::new(source)
            .tokenize()
            .expect("source should lex")
            .into_iter()
            .map(|token| token.kind)
            .collect()
    }

    #[test]
    fn lexes_method_chain_with_named_args() {
        assert_eq!(
            kinds("circle(r=10).extrude(5)"),
            vec![
                TokenKind::Ident("circle".into()),
                TokenKind::LParen,
                TokenKind::Ident("r".into()),
                TokenKind::Eq,
                TokenKind::Number(10.0),
                TokenKind::RParen,
                TokenKind::Dot,
                TokenKind::Ident("extrude".into()),
                TokenKind::LParen,
                TokenKind::Number(5.0),
                TokenKind::RParen,
                TokenKind::Eof,
            ]
        );
    }

    #[test]
    fn numbers_accept_fractions_exponents_and_mm() {
        assert_eq!(
            kinds(".5 2.25 1e3 4mm"),
            vec![
                TokenKind::Number(0.5),
                TokenKind::Number(2.25),
                TokenKind::Number(1000.0),
                TokenKind::Number(4.0),
                TokenKind::Eof,
            ]
        );
    }

    #[test]
    fn comments_are_skipped_and_positions_tracked() {
        let tokens = Lexer::new("// header\n/* block\n comment */ x # trailing\n  y")
            .tokenize()
            .expect("source should lex");
        assert_eq!(tokens[0].kind, TokenKind::Ident("x".into()));
        assert_eq!((tokens[0].line, tokens[0].column), (3, 13));
        assert_eq!(tokens[1].kind, TokenKind::Ident("y".into()));
        assert_eq!((tokens[1].line, tokens[1].column), (4, 3));
    }

    #[test]
    fn pipe_and_intersection_tokens() {
        assert_eq!(
            kinds("a |> b & c;"),
            vec![
                TokenKind::Ident("a".into()),
                TokenKind::Pipe,
                TokenKind::Ident("b".into()),
                TokenKind::Amp,
                TokenKind::Ident("c".into()),
                TokenKind::Semicolon,
                TokenKind::Eof,
            ]
        );
    }

    #[test]
    fn unterminated_block_comment_reports_start() {
        let err = Lexer::new("x = 1\n/* never closed")
            .tokenize()
            .expect_err("should fail");
        assert_eq!(err.to_string(), "unterminated block comment at line 2, column 1");
    }

    #[test]
    fn unexpected_character_is_rejected() {
        let err = Lexer::new("model = $").tokenize().expect_err("should fail");
        assert_eq!(err.to_string(), "unexpected character '$' at line 1, column 9");
    }
}
