//! Query lexer
//!
//! Splits query text into [`Token`]s. Positions in errors are byte offsets
//! into the input.

use super::token::Token;
use crate::error::{Error, Result};
use std::iter::Peekable;
use std::str::CharIndices;

pub struct Lexer<'a> {
    input: &'a str,
    chars: Peekable<CharIndices<'a>>,
}

impl<'a> Lexer<'a> {
    pub fn new(input: &'a str) -> Self {
        Self {
            input,
            chars: input.char_indices().peekable(),
        }
    }

    /// Tokenize the whole input; the last token is always `Eof`
    pub fn tokenize(&mut self) -> Result<Vec<Token>> {
        let mut tokens = Vec::new();
        loop {
            let token = self.next_token()?;
            if token == Token::Eof {
                tokens.push(token);
                return Ok(tokens);
            }
            tokens.push(token);
        }
    }

    pub fn next_token(&mut self) -> Result<Token> {
        self.take_while(char::is_whitespace);

        let Some((pos, ch)) = self.chars.next() else {
            return Ok(Token::Eof);
        };

        let token = match ch {
            '(' => Token::LParen,
            ')' => Token::RParen,
            ',' => Token::Comma,
            ';' => Token::Semicolon,
            '.' => Token::Dot,
            '*' => Token::Asterisk,
            '=' => Token::Eq,
            '<' if self.eat('=') => Token::Lte,
            '<' if self.eat('>') => Token::Neq,
            '<' => Token::Lt,
            '>' if self.eat('=') => Token::Gte,
            '>' => Token::Gt,
            '!' if self.eat('=') => Token::Neq,
            '-' if self.next_is_digit() => self.number(pos)?,
            '\'' => self.string(pos)?,
            c if c.is_ascii_digit() => self.number(pos)?,
            c if c.is_alphabetic() || c == '_' => self.word(pos),
            c => return Err(Error::UnexpectedCharacter(c, pos)),
        };
        Ok(token)
    }

    /// Consume the next char if it is `expected`
    fn eat(&mut self, expected: char) -> bool {
        self.chars.next_if(|&(_, c)| c == expected).is_some()
    }

    fn next_is_digit(&mut self) -> bool {
        self.chars.peek().is_some_and(|&(_, c)| c.is_ascii_digit())
    }

    /// Consume chars matching `pred`; returns the offset just past them
    fn take_while(&mut self, pred: impl Fn(char) -> bool) -> usize {
        while self.chars.next_if(|&(_, c)| pred(c)).is_some() {}
        self.chars.peek().map_or(self.input.len(), |&(i, _)| i)
    }

    /// `start` is the offset of the first digit or of a leading `-`
    fn number(&mut self, start: usize) -> Result<Token> {
        let mut end = self.take_while(|c| c.is_ascii_digit());

        let rest = &self.input[end..];
        let fraction = rest.starts_with('.')
            && rest[1..].starts_with(|c: char| c.is_ascii_digit());
        if fraction {
            self.chars.next();
            end = self.take_while(|c| c.is_ascii_digit());
        }

        let text = &self.input[start..end];
        let token = if fraction {
            text.parse().map(Token::FloatLiteral).ok()
        } else {
            text.parse().map(Token::IntegerLiteral).ok()
        };
        token.ok_or(Error::InvalidNumber(start))
    }

    /// Single-quoted string; `''` is an escaped quote
    fn string(&mut self, start: usize) -> Result<Token> {
        let mut value = String::new();
        while let Some((_, c)) = self.chars.next() {
            if c != '\'' {
                value.push(c);
            } else if self.eat('\'') {
                value.push('\'');
            } else {
                return Ok(Token::StringLiteral(value));
            }
        }
        Err(Error::UnterminatedString(start))
    }

    fn word(&mut self, start: usize) -> Token {
        let end = self.take_while(|c| c.is_alphanumeric() || c == '_');
        let word = &self.input[start..end];
        Token::from_keyword(word).unwrap_or_else(|| Token::Identifier(word.to_string()))
    }
}
