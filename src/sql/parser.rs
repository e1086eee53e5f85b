//! Query parser
//!
//! A small hand-written parser for the restricted grammar
//!
//! ```text
//! SELECT <cols> FROM <table> [WHERE <col> <op> <value>] [JOIN ...]
//!     [GROUP BY ...] [ORDER BY ...] [LIMIT ...]
//! ```
//!
//! It detects clauses and slices the token stream; it does not build
//! expression trees. Subqueries, OR and join conditions are not understood.

use super::ast::{render, Condition, QueryStructure};
use super::lexer::Lexer;
use super::token::Token;
use crate::error::{Error, Result};

/// Query parser
pub struct Parser {
    tokens: Vec<Token>,
    position: usize,
}

impl Parser {
    /// Create a new parser from a query string
    pub fn new(query: &str) -> Result<Self> {
        let mut lexer = Lexer::new(query);
        let tokens = lexer.tokenize()?;

        Ok(Self {
            tokens,
            position: 0,
        })
    }

    /// Parse the query into its structure
    pub fn parse(&mut self) -> Result<QueryStructure> {
        let mut query = QueryStructure::default();

        self.expect(&Token::Select)?;
        if self.check(&Token::Distinct) {
            self.advance();
        }

        self.parse_select_list(&mut query)?;
        self.expect(&Token::From)?;
        self.parse_table_list(&mut query)?;

        while !self.is_at_end() {
            match self.current() {
                Token::Where => self.parse_where(&mut query)?,
                t if t.is_join_start() => self.parse_join(&mut query),
                Token::Group => {
                    self.advance();
                    self.expect(&Token::By)?;
                    query.has_group_by = true;
                    self.skip_clause();
                }
                Token::Order => {
                    self.advance();
                    self.expect(&Token::By)?;
                    query.has_order_by = true;
                    self.skip_clause();
                }
                Token::Limit => {
                    self.advance();
                    query.has_limit = true;
                    self.skip_clause();
                }
                Token::Having | Token::Offset => {
                    self.advance();
                    self.skip_clause();
                }
                Token::Semicolon => {
                    self.advance();
                    if !self.is_at_end() {
                        return Err(self.unexpected("end of query"));
                    }
                }
                _ => return Err(self.unexpected("WHERE, JOIN, GROUP BY, ORDER BY or LIMIT")),
            }
        }

        Ok(query)
    }

    // ========== Clauses ==========

    fn parse_select_list(&mut self, query: &mut QueryStructure) -> Result<()> {
        let tokens = self.collect_until(|t| matches!(t, Token::From | Token::Semicolon | Token::Eof));
        if !self.check(&Token::From) {
            return Err(if self.is_at_end() {
                Error::UnexpectedEof("FROM".to_string())
            } else {
                self.unexpected("FROM")
            });
        }

        let items = split_top_level(tokens, &Token::Comma);
        if items.is_empty() {
            return Err(self.unexpected("select list"));
        }

        for item in items {
            if item == [Token::Asterisk] {
                query.columns.push("*".to_string());
                continue;
            }
            query.columns.push(render(&item));
            for (i, token) in item.iter().enumerate() {
                let Token::Identifier(name) = token else {
                    continue;
                };
                // function names, table qualifiers and aliases
                let next = item.get(i + 1);
                if matches!(next, Some(Token::LParen) | Some(Token::Dot))
                    || (i > 0 && item[i - 1] == Token::As)
                {
                    continue;
                }
                if !query.projected_columns.contains(name) {
                    query.projected_columns.push(name.clone());
                }
            }
        }

        Ok(())
    }

    fn parse_table_list(&mut self, query: &mut QueryStructure) -> Result<()> {
        let tokens = self.collect_until(Token::ends_clause);

        for table in split_top_level(tokens, &Token::Comma) {
            match table.first() {
                Some(Token::Identifier(name)) => query.tables.push(name.clone()),
                Some(other) => {
                    return Err(Error::UnexpectedToken {
                        expected: "table name".to_string(),
                        found: other.to_string(),
                    })
                }
                None => {}
            }
        }

        if query.tables.is_empty() {
            return Err(if self.is_at_end() {
                Error::UnexpectedEof("table name".to_string())
            } else {
                self.unexpected("table name")
            });
        }

        Ok(())
    }

    fn parse_where(&mut self, query: &mut QueryStructure) -> Result<()> {
        self.expect(&Token::Where)?;
        let tokens = self.collect_until(Token::ends_clause);
        if tokens.is_empty() {
            return Err(if self.is_at_end() {
                Error::UnexpectedEof("WHERE condition".to_string())
            } else {
                self.unexpected("WHERE condition")
            });
        }

        query.has_where = true;
        query.where_conditions.extend(
            split_top_level(tokens, &Token::And)
                .into_iter()
                .map(Condition::new),
        );
        Ok(())
    }

    fn parse_join(&mut self, query: &mut QueryStructure) {
        query.has_join = true;
        while self.current().is_join_start() || self.check(&Token::Outer) {
            self.advance();
        }
        if let Token::Identifier(name) = self.current().clone() {
            query.tables.push(name);
            self.advance();
        }
        self.skip_clause();
    }

    // ========== Cursor helpers ==========

    fn collect_until(&mut self, stop: impl Fn(&Token) -> bool) -> Vec<Token> {
        let mut tokens = Vec::new();
        while !self.is_at_end() && !stop(self.current()) {
            tokens.push(self.current().clone());
            self.advance();
        }
        tokens
    }

    fn skip_clause(&mut self) {
        self.collect_until(Token::ends_clause);
    }

    fn current(&self) -> &Token {
        self.tokens.get(self.position).unwrap_or(&Token::Eof)
    }

    fn advance(&mut self) {
        if self.position < self.tokens.len() {
            self.position += 1;
        }
    }

    fn is_at_end(&self) -> bool {
        matches!(self.current(), Token::Eof)
    }

    fn check(&self, token: &Token) -> bool {
        std::mem::discriminant(self.current()) == std::mem::discriminant(token)
    }

    fn expect(&mut self, token: &Token) -> Result<()> {
        if self.check(token) {
            self.advance();
            Ok(())
        } else if self.is_at_end() {
            Err(Error::UnexpectedEof(token.to_string()))
        } else {
            Err(self.unexpected(&token.to_string()))
        }
    }

    fn unexpected(&self, expected: &str) -> Error {
        Error::UnexpectedToken {
            expected: expected.to_string(),
            found: self.current().to_string(),
        }
    }
}

/// Parse query text into its structure
pub fn parse_query(query: &str) -> Result<QueryStructure> {
    Parser::new(query)?.parse()
}

/// Split tokens on `separator`, ignoring separators inside parentheses
fn split_top_level(tokens: Vec<Token>, separator: &Token) -> Vec<Vec<Token>> {
    let mut parts = Vec::new();
    let mut current = Vec::new();
    let mut depth = 0usize;

    for token in tokens {
        match token {
            Token::LParen => depth += 1,
            Token::RParen => depth = depth.saturating_sub(1),
            _ => {}
        }
        if depth == 0 && token == *separator {
            if !current.is_empty() {
                parts.push(std::mem::take(&mut current));
            }
            continue;
        }
        current.push(token);
    }
    if !current.is_empty() {
        parts.push(current);
    }

    parts
}
