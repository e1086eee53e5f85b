//! Query tokens
//!
//! Only what the restricted grammar gives meaning to is a token. Any other
//! word lexes as an identifier and any other symbol is a lexer error.

use std::fmt;

#[derive(Debug, Clone, PartialEq)]
pub enum Token {
    // ========== Keywords ==========
    Select,
    Distinct,
    From,
    Where,
    And,
    As,

    // Joins
    Join,
    Inner,
    Left,
    Right,
    Full,
    Outer,
    Cross,
    On,

    // Trailing clauses
    Group,
    Order,
    By,
    Having,
    Limit,
    Offset,

    True,
    False,

    // ========== Literals ==========
    IntegerLiteral(i64),
    FloatLiteral(f64),
    /// Single-quoted, quotes removed
    StringLiteral(String),
    Identifier(String),

    // ========== Operators ==========
    Eq,
    /// `<>` or `!=`; lexed so it can be reported, never executed
    Neq,
    Lt,
    Gt,
    Lte,
    Gte,
    Asterisk,

    // ========== Delimiters ==========
    LParen,
    RParen,
    Comma,
    Semicolon,
    Dot,

    Eof,
}

impl Token {
    /// One of the executable comparison operators
    pub fn is_comparison(&self) -> bool {
        matches!(
            self,
            Token::Eq | Token::Lt | Token::Gt | Token::Lte | Token::Gte
        )
    }

    pub fn is_join_start(&self) -> bool {
        matches!(
            self,
            Token::Join | Token::Inner | Token::Left | Token::Right | Token::Full | Token::Cross
        )
    }

    /// Does this token end a FROM or WHERE clause?
    pub fn ends_clause(&self) -> bool {
        self.is_join_start()
            || matches!(
                self,
                Token::Where
                    | Token::Group
                    | Token::Order
                    | Token::Having
                    | Token::Limit
                    | Token::Offset
                    | Token::Semicolon
                    | Token::Eof
            )
    }

    /// Case-insensitive keyword lookup
    pub fn from_keyword(word: &str) -> Option<Token> {
        let token = match word.to_ascii_uppercase().as_str() {
            "SELECT" => Token::Select,
            "DISTINCT" => Token::Distinct,
            "FROM" => Token::From,
            "WHERE" => Token::Where,
            "AND" => Token::And,
            "AS" => Token::As,
            "JOIN" => Token::Join,
            "INNER" => Token::Inner,
            "LEFT" => Token::Left,
            "RIGHT" => Token::Right,
            "FULL" => Token::Full,
            "OUTER" => Token::Outer,
            "CROSS" => Token::Cross,
            "ON" => Token::On,
            "GROUP" => Token::Group,
            "ORDER" => Token::Order,
            "BY" => Token::By,
            "HAVING" => Token::Having,
            "LIMIT" => Token::Limit,
            "OFFSET" => Token::Offset,
            "TRUE" => Token::True,
            "FALSE" => Token::False,
            _ => return None,
        };
        Some(token)
    }

    fn symbol(&self) -> &'static str {
        match self {
            Token::Select => "SELECT",
            Token::Distinct => "DISTINCT",
            Token::From => "FROM",
            Token::Where => "WHERE",
            Token::And => "AND",
            Token::As => "AS",
            Token::Join => "JOIN",
            Token::Inner => "INNER",
            Token::Left => "LEFT",
            Token::Right => "RIGHT",
            Token::Full => "FULL",
            Token::Outer => "OUTER",
            Token::Cross => "CROSS",
            Token::On => "ON",
            Token::Group => "GROUP",
            Token::Order => "ORDER",
            Token::By => "BY",
            Token::Having => "HAVING",
            Token::Limit => "LIMIT",
            Token::Offset => "OFFSET",
            Token::True => "TRUE",
            Token::False => "FALSE",
            Token::Eq => "=",
            Token::Neq => "<>",
            Token::Lt => "<",
            Token::Gt => ">",
            Token::Lte => "<=",
            Token::Gte => ">=",
            Token::Asterisk => "*",
            Token::LParen => "(",
            Token::RParen => ")",
            Token::Comma => ",",
            Token::Semicolon => ";",
            Token::Dot => ".",
            Token::Eof => "end of input",
            Token::IntegerLiteral(_)
            | Token::FloatLiteral(_)
            | Token::StringLiteral(_)
            | Token::Identifier(_) => "",
        }
    }
}

impl fmt::Display for Token {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Token::IntegerLiteral(n) => write!(f, "{}", n),
            Token::FloatLiteral(n) => write!(f, "{}", n),
            Token::StringLiteral(s) => write!(f, "'{}'", s),
            Token::Identifier(s) => f.write_str(s),
            other => f.write_str(other.symbol()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_keyword_lookup() {
        assert_eq!(Token::from_keyword("SELECT"), Some(Token::Select));
        assert_eq!(Token::from_keyword("SeLeCt"), Some(Token::Select));
        assert_eq!(Token::from_keyword("employees"), None);
        // outside the grammar, so plain words
        assert_eq!(Token::from_keyword("OR"), None);
        assert_eq!(Token::from_keyword("LIKE"), None);
    }

    #[test]
    fn test_token_classes() {
        assert!(Token::Gte.is_comparison());
        assert!(!Token::Neq.is_comparison());
        assert!(Token::Left.ends_clause());
        assert!(!Token::And.ends_clause());
        assert!(!Token::Outer.is_join_start());
    }

    #[test]
    fn test_display() {
        assert_eq!(Token::Neq.to_string(), "<>");
        assert_eq!(Token::StringLiteral("eng".into()).to_string(), "'eng'");
        assert_eq!(Token::Eof.to_string(), "end of input");
    }
}
