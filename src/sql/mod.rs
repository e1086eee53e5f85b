//! Query front end
//!
//! Tokenizes and structurally parses queries in the restricted grammar
//! accepted by the planner.

pub mod ast;
pub mod lexer;
pub mod parser;
pub mod token;

pub use ast::{ComparisonOp, Condition, Literal, Predicate, QueryStructure};
pub use lexer::Lexer;
pub use parser::{parse_query, Parser};
pub use token::Token;
