//! Query structure
//!
//! The restricted grammar does not build an expression tree. A parsed query
//! is a set of clause flags, the projection and table lists, and the WHERE
//! clause split into text conditions. Only a single `column OP literal`
//! condition is ever turned into an executable [`Predicate`].

use super::token::Token;
use crate::error::{Error, Result};
use crate::storage::Value;
use serde::Serialize;
use std::fmt;

/// Comparison operators the executor understands
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum ComparisonOp {
    Eq,
    Gt,
    Lt,
    Gte,
    Lte,
}

impl ComparisonOp {
    pub fn from_token(token: &Token) -> Option<Self> {
        match token {
            Token::Eq => Some(ComparisonOp::Eq),
            Token::Gt => Some(ComparisonOp::Gt),
            Token::Lt => Some(ComparisonOp::Lt),
            Token::Gte => Some(ComparisonOp::Gte),
            Token::Lte => Some(ComparisonOp::Lte),
            _ => None,
        }
    }

    pub fn symbol(&self) -> &'static str {
        match self {
            ComparisonOp::Eq => "=",
            ComparisonOp::Gt => ">",
            ComparisonOp::Lt => "<",
            ComparisonOp::Gte => ">=",
            ComparisonOp::Lte => "<=",
        }
    }
}

impl fmt::Display for ComparisonOp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.symbol())
    }
}

/// A literal operand with its source text
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Literal {
    /// Literal text without quotes
    pub raw: String,
    /// Coerced value: a float when the text parses as one, else a string
    pub value: Value,
}

impl Literal {
    /// Coerce literal text. Integers parse as floats first, so `30` becomes `30.0`.
    pub fn parse(raw: impl Into<String>) -> Self {
        let raw = raw.into();
        let value = match raw.trim().parse::<f64>() {
            Ok(f) => Value::Float(f),
            Err(_) => Value::String(raw.clone()),
        };
        Self { raw, value }
    }

    fn from_token(token: &Token) -> Option<Self> {
        match token {
            Token::IntegerLiteral(n) => Some(Literal::parse(n.to_string())),
            Token::FloatLiteral(n) => Some(Literal::parse(n.to_string())),
            Token::StringLiteral(s) | Token::Identifier(s) => Some(Literal::parse(s.clone())),
            Token::True => Some(Literal::parse("true")),
            Token::False => Some(Literal::parse("false")),
            _ => None,
        }
    }
}

/// An executable filter: `column OP literal`
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Predicate {
    pub column: String,
    pub op: ComparisonOp,
    pub literal: Literal,
}

impl fmt::Display for Predicate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {} {}", self.column, self.op, self.literal.raw)
    }
}

/// One AND-separated fragment of a WHERE clause
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Condition {
    /// Normalized source text
    pub text: String,
    #[serde(skip)]
    tokens: Vec<Token>,
}

impl Condition {
    pub(crate) fn new(tokens: Vec<Token>) -> Self {
        Self {
            text: render(&tokens),
            tokens,
        }
    }

    /// Does the fragment contain one of `= > < >= <=`?
    pub fn is_comparison(&self) -> bool {
        self.tokens.iter().any(Token::is_comparison)
    }

    /// Interpret the fragment as `column OP literal`
    pub fn to_predicate(&self) -> Result<Predicate> {
        let malformed = || {
            Error::InvalidQuery(format!(
                "unsupported predicate '{}', expected <column> <op> <value>",
                self.text
            ))
        };

        let [column, op, operand] = self.tokens.as_slice() else {
            return Err(malformed());
        };
        let Token::Identifier(column) = column else {
            return Err(malformed());
        };
        let op = ComparisonOp::from_token(op).ok_or_else(|| {
            Error::InvalidQuery(format!("unrecognized operator '{}' in '{}'", op, self.text))
        })?;
        let literal = Literal::from_token(operand).ok_or_else(malformed)?;

        Ok(Predicate {
            column: column.clone(),
            op,
            literal,
        })
    }
}

/// Structural view of a query in the restricted grammar
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct QueryStructure {
    pub has_where: bool,
    pub has_join: bool,
    pub has_group_by: bool,
    pub has_order_by: bool,
    pub has_limit: bool,
    /// Select-list items as text (`*` for a wildcard)
    pub columns: Vec<String>,
    /// Column names referenced by the select list
    pub projected_columns: Vec<String>,
    /// Tables named after FROM and JOIN
    pub tables: Vec<String>,
    /// WHERE clause split on AND
    pub where_conditions: Vec<Condition>,
}

impl QueryStructure {
    /// True when the select list contains `*`
    pub fn selects_all(&self) -> bool {
        self.columns.iter().any(|c| c == "*")
    }

    /// Is `column` referenced by the projection?
    pub fn projects(&self, column: &str) -> bool {
        self.selects_all() || self.projected_columns.iter().any(|c| c == column)
    }

    /// The single executable predicate, if the query has a WHERE clause
    pub fn filter_predicate(&self) -> Result<Option<Predicate>> {
        match self.where_conditions.as_slice() {
            [] => Ok(None),
            [condition] => condition.to_predicate().map(Some),
            conditions => Err(Error::InvalidQuery(format!(
                "only a single WHERE predicate is executed, found {}",
                conditions.len()
            ))),
        }
    }
}

/// Render tokens back to normalized text
pub(crate) fn render(tokens: &[Token]) -> String {
    let mut out = String::new();
    let mut prev: Option<&Token> = None;

    for token in tokens {
        let glue = matches!(token, Token::Comma | Token::RParen | Token::Dot)
            || matches!(prev, Some(Token::LParen) | Some(Token::Dot) | None)
            || (*token == Token::LParen && matches!(prev, Some(Token::Identifier(_))));
        if !glue {
            out.push(' ');
        }
        out.push_str(&token.to_string());
        prev = Some(token);
    }

    out
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ident(s: &str) -> Token {
        Token::Identifier(s.to_string())
    }

    #[test]
    fn test_literal_coercion() {
        assert_eq!(Literal::parse("30").value, Value::Float(30.0));
        assert_eq!(Literal::parse("2.5").value, Value::Float(2.5));
        assert_eq!(Literal::parse("eng").value, Value::from("eng"));
        assert_eq!(Literal::parse("eng").raw, "eng");
    }

    #[test]
    fn test_condition_to_predicate() {
        let condition = Condition::new(vec![ident("age"), Token::Gt, Token::IntegerLiteral(30)]);
        assert_eq!(condition.text, "age > 30");
        assert!(condition.is_comparison());

        let predicate = condition.to_predicate().unwrap();
        assert_eq!(predicate.column, "age");
        assert_eq!(predicate.op, ComparisonOp::Gt);
        assert_eq!(predicate.literal.value, Value::Float(30.0));
        assert_eq!(predicate.to_string(), "age > 30");
    }

    #[test]
    fn test_unrecognized_operator() {
        let condition = Condition::new(vec![ident("age"), Token::Neq, Token::IntegerLiteral(30)]);
        assert!(!condition.is_comparison());
        assert!(matches!(
            condition.to_predicate(),
            Err(Error::InvalidQuery(msg)) if msg.contains("unrecognized operator")
        ));

        let condition = Condition::new(vec![ident("name"), ident("LIKE"), Token::StringLiteral("a%".into())]);
        assert!(matches!(
            condition.to_predicate(),
            Err(Error::InvalidQuery(msg)) if msg.contains("unrecognized operator 'LIKE'")
        ));
    }

    #[test]
    fn test_render() {
        let tokens = vec![
            Token::Identifier("COUNT".into()),
            Token::LParen,
            Token::Asterisk,
            Token::RParen,
            Token::Comma,
            ident("t"),
            Token::Dot,
            ident("id"),
        ];
        assert_eq!(render(&tokens), "COUNT(*), t.id");
    }

    #[test]
    fn test_multiple_conditions_rejected() {
        let query = QueryStructure {
            has_where: true,
            where_conditions: vec![
                Condition::new(vec![ident("a"), Token::Eq, Token::IntegerLiteral(1)]),
                Condition::new(vec![ident("b"), Token::Eq, Token::IntegerLiteral(2)]),
            ],
            ..Default::default()
        };
        assert!(matches!(
            query.filter_predicate(),
            Err(Error::InvalidQuery(_))
        ));
    }
}
