use std::fmt::Display;
use std::iter::Peekable;
use std::str::CharIndices;

/// Identifies which standard stream a redirection operator targets.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum RedirectKind {
    /// `<`: standard input is read from a file.
    Input,
    /// `>`: standard output is written to a file.
    Output,
    /// `2>`: standard error is written to a file.
    Error,
}

impl Display for RedirectKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Input => f.write_str("<"),
            Self::Output => f.write_str(">"),
            Self::Error => f.write_str("2>"),
        }
    }
}

/// Represents a token extracted from a command line.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Token {
    /// A word, with any quoting already removed.
    Word(String),
    /// `;` or a newline.
    Sequence,
    /// `&`
    Background,
    /// `&&`
    And,
    /// `||`
    Or,
    /// `|`
    Pipe,
    /// A redirection operator; the following word names the target file.
    Redirect(RedirectKind),
}

impl Token {
    /// Returns whether the token is an operator (i.e., anything but a word).
    pub const fn is_operator(&self) -> bool {
        !matches!(self, Self::Word(_))
    }
}

impl Display for Token {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Word(w) => f.write_str(w),
            Self::Sequence => f.write_str(";"),
            Self::Background => f.write_str("&"),
            Self::And => f.write_str("&&"),
            Self::Or => f.write_str("||"),
            Self::Pipe => f.write_str("|"),
            Self::Redirect(kind) => kind.fmt(f),
        }
    }
}

/// Represents an error that occurred during tokenization.
#[derive(thiserror::Error, Debug, PartialEq, Eq)]
pub enum TokenizerError {
    /// A backslash was the last character of the input.
    #[error("unterminated escape sequence")]
    UnterminatedEscapeSequence,

    /// A single-quoted substring was not closed before the end of the input.
    #[error("unterminated single quote at offset {0}")]
    UnterminatedSingleQuote(usize),

    /// A double-quoted substring was not closed before the end of the input.
    #[error("unterminated double quote at offset {0}")]
    UnterminatedDoubleQuote(usize),
}

/// Splits a command line into [`Token`]s, one at a time.
#[derive(Clone, Debug)]
pub struct Tokenizer<'a> {
    chars: Peekable<CharIndices<'a>>,
}

impl<'a> Tokenizer<'a> {
    /// Returns a tokenizer over the given input.
    ///
    /// # Arguments
    ///
    /// * `input` - The command line to tokenize.
    pub fn new(input: &'a str) -> Self {
        Self {
            chars: input.char_indices().peekable(),
        }
    }

    fn peek_char(&mut self) -> Option<char> {
        self.chars.peek().map(|(_, c)| *c)
    }

    fn next_char(&mut self) -> Option<char> {
        self.chars.next().map(|(_, c)| c)
    }

    fn skip_blanks(&mut self) {
        while matches!(self.peek_char(), Some(' ' | '\t' | '\r')) {
            self.chars.next();
        }
    }

    fn skip_comment(&mut self) {
        while !matches!(self.peek_char(), None | Some('\n')) {
            self.chars.next();
        }
    }

    /// Checks for `2>` at the current position without consuming anything.
    fn at_stderr_redirect(&self) -> bool {
        let mut ahead = self.chars.clone();
        matches!(ahead.next(), Some((_, '2'))) && matches!(ahead.next(), Some((_, '>')))
    }

    fn read_operator(&mut self) -> Option<Token> {
        if self.at_stderr_redirect() {
            self.chars.next();
            self.chars.next();
            return Some(Token::Redirect(RedirectKind::Error));
        }

        let token = match self.peek_char()? {
            '\n' | ';' => Token::Sequence,
            '<' => Token::Redirect(RedirectKind::Input),
            '>' => Token::Redirect(RedirectKind::Output),
            '&' => {
                self.chars.next();
                return Some(if self.peek_char() == Some('&') {
                    self.chars.next();
                    Token::And
                } else {
                    Token::Background
                });
            }
            '|' => {
                self.chars.next();
                return Some(if self.peek_char() == Some('|') {
                    self.chars.next();
                    Token::Or
                } else {
                    Token::Pipe
                });
            }
            _ => return None,
        };

        self.chars.next();
        Some(token)
    }

    /// Reads one word. Returns `None` if the input at this point held nothing but
    /// line continuations.
    fn read_word(&mut self) -> Result<Option<Token>, TokenizerError> {
        let mut word = String::new();
        // Quotes count as content even when empty, so `''` is still a word.
        let mut has_content = false;

        while let Some((offset, c)) = self.chars.peek().copied() {
            match c {
                ' ' | '\t' | '\r' | '\n' | ';' | '&' | '|' | '<' | '>' => break,
                '\'' => {
                    self.chars.next();
                    has_content = true;
                    loop {
                        match self.next_char() {
                            Some('\'') => break,
                            Some(c) => word.push(c),
                            None => return Err(TokenizerError::UnterminatedSingleQuote(offset)),
                        }
                    }
                }
                '"' => {
                    self.chars.next();
                    has_content = true;
                    loop {
                        match self.next_char() {
                            Some('"') => break,
                            Some('\\') => match self.next_char() {
                                Some(escaped @ ('"' | '\\' | '$')) => word.push(escaped),
                                Some('\n') => (),
                                Some(other) => {
                                    word.push('\\');
                                    word.push(other);
                                }
                                None => {
                                    return Err(TokenizerError::UnterminatedDoubleQuote(offset));
                                }
                            },
                            Some(c) => word.push(c),
                            None => return Err(TokenizerError::UnterminatedDoubleQuote(offset)),
                        }
                    }
                }
                '\\' => {
                    self.chars.next();
                    match self.next_char() {
                        // Line continuation.
                        Some('\n') => (),
                        Some(escaped) => {
                            has_content = true;
                            word.push(escaped);
                        }
                        None => return Err(TokenizerError::UnterminatedEscapeSequence),
                    }
                }
                _ => {
                    self.chars.next();
                    has_content = true;
                    word.push(c);
                }
            }
        }

        Ok(has_content.then_some(Token::Word(word)))
    }
}

impl Iterator for Tokenizer<'_> {
    type Item = Result<Token, TokenizerError>;

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            self.skip_blanks();

            if self.peek_char()? == '#' {
                self.skip_comment();
                continue;
            }

            if let Some(op) = self.read_operator() {
                tracing::debug!(target: "tokenize", "operator: {op}");
                return Some(Ok(op));
            }

            match self.read_word() {
                Ok(Some(word)) => {
                    tracing::debug!(target: "tokenize", "word: {word:?}");
                    return Some(Ok(word));
                }
                // Only line continuations; keep looking.
                Ok(None) => (),
                Err(err) => return Some(Err(err)),
            }
        }
    }
}

/// Tokenizes the given command line.
///
/// # Arguments
///
/// * `input` - The command line to tokenize.
pub fn tokenize_str(input: &str) -> Result<Vec<Token>, TokenizerError> {
    Tokenizer::new(input).collect()
}
