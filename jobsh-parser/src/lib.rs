//! Implements a tokenizer for the command-line syntax understood by jobsh: words, quoting,
//! and the sequencing, background, conditional, pipe, and redirection operators.

mod tokenizer;

pub use tokenizer::{RedirectKind, Token, Tokenizer, TokenizerError, tokenize_str};
