pub mod assembler;
pub mod language;
pub mod parser;
pub mod prompt;

pub use assembler::*;
pub use language::*;
pub use parser::*;
pub use prompt::*;

use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum ParseError {
    #[error("Malformed JSON in generation output: {0}")]
    MalformedJson(String),
}
