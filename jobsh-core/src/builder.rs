//! Assembles command lists from token streams.

use std::os::fd::{AsRawFd, OwnedFd};

use jobsh_parser::{RedirectKind, Token};

use crate::command::{
    Command, CommandList, ConditionalOperator, IoTarget, PipeDescriptors, Redirection,
};
use crate::{error, trace_categories};

/// Creates the OS pipes that connect pipeline stages.
pub trait PipeFactory {
    /// Creates a pipe, returning its (read end, write end).
    fn create_pipe(&mut self) -> Result<(OwnedFd, OwnedFd), error::Error>;
}

/// Creates real pipes. Both ends are close-on-exec, so a child only keeps the
/// ends that were duplicated onto its standard streams.
#[derive(Clone, Copy, Debug, Default)]
pub struct OsPipeFactory;

impl PipeFactory for OsPipeFactory {
    fn create_pipe(&mut self) -> Result<(OwnedFd, OwnedFd), error::Error> {
        let (reader, writer) = os_pipe::pipe().map_err(error::Error::PipeCreationFailure)?;
        Ok((OwnedFd::from(reader), OwnedFd::from(writer)))
    }
}

/// Incrementally builds a [`CommandList`] from tokens.
pub struct LineBuilder<'a> {
    pipes: &'a mut dyn PipeFactory,
    commands: Vec<Command>,
    current: Command,
    pending_redirect: Option<RedirectKind>,
}

impl<'a> LineBuilder<'a> {
    /// Returns a builder that creates pipes with the given factory.
    ///
    /// # Arguments
    ///
    /// * `pipes` - Factory used for each `|` operator.
    pub fn new(pipes: &'a mut dyn PipeFactory) -> Self {
        Self {
            pipes,
            commands: vec![],
            current: Command::new(),
            pending_redirect: None,
        }
    }

    /// Consumes one token.
    ///
    /// On error the token was not applied and the builder should not be fed
    /// further tokens; [`LineBuilder::finish`] still yields everything completed
    /// so far.
    ///
    /// # Arguments
    ///
    /// * `token` - The next token from the line.
    pub fn push(&mut self, token: Token) -> Result<(), error::Error> {
        if let Some(kind) = self.pending_redirect.take() {
            return match token {
                Token::Word(target) => {
                    self.current.redirects.push(Redirection { kind, target });
                    Ok(())
                }
                _ => self.abandon(error::Error::MissingRedirectionTarget(kind)),
            };
        }

        match token {
            Token::Word(word) => self.current.args.push(word),
            Token::Redirect(kind) => self.pending_redirect = Some(kind),
            Token::Sequence => {
                if self.current.is_sentinel() {
                    // Blank lines and stray separators are harmless unless a pipe or a
                    // conditional is waiting for its right-hand side.
                    let awaits_operand = self.current.pipe_in.is_some()
                        || self
                            .commands
                            .last()
                            .is_some_and(|c| c.conditional != ConditionalOperator::None);
                    if awaits_operand {
                        return self.abandon(error::Error::UnexpectedToken(token.to_string()));
                    }
                } else {
                    self.complete_current(Command::new());
                }
            }
            Token::Background => {
                self.require_command(&token)?;
                self.current.background = true;
                self.complete_current(Command::new());
            }
            Token::And | Token::Or => {
                self.require_command(&token)?;
                self.current.conditional = ConditionalOperator::try_from(&token)?;
                self.complete_current(Command::new());
            }
            Token::Pipe => {
                self.require_command(&token)?;
                self.start_pipe()?;
            }
        }

        Ok(())
    }

    /// Finishes building, returning the list terminated by its sentinel.
    pub fn finish(mut self) -> CommandList {
        if let Some(kind) = self.pending_redirect.take() {
            error::report(&error::Error::MissingRedirectionTarget(kind));
            self.current = Command::new();
        }

        if !self.current.is_sentinel() {
            let current = std::mem::take(&mut self.current);
            self.commands.push(current);
        } else if self.current.pipe_in.is_some() {
            error::report(&error::Error::UnexpectedToken(Token::Pipe.to_string()));
        }

        // A pipe whose sink never materialized has nothing to feed.
        if let Some(last) = self.commands.last_mut() {
            if last.is_pipe_source() {
                tracing::debug!(target: trace_categories::PARSE, "dropping dangling pipe after '{last}'");
                last.pipe_out = None;
                last.stdout = IoTarget::Inherit;
            }
        }

        let list = CommandList::from_commands(self.commands);
        tracing::debug!(target: trace_categories::PARSE, "built list with {} node(s)", list.len());
        list
    }

    fn require_command(&mut self, token: &Token) -> Result<(), error::Error> {
        if self.current.is_sentinel() {
            return self.abandon(error::Error::UnexpectedToken(token.to_string()));
        }
        Ok(())
    }

    /// Drops the incomplete current command and returns the given error.
    fn abandon(&mut self, err: error::Error) -> Result<(), error::Error> {
        let abandoned = std::mem::take(&mut self.current);
        tracing::debug!(target: trace_categories::PARSE, "abandoning incomplete command '{abandoned}'");
        Err(err)
    }

    fn complete_current(&mut self, next: Command) {
        let completed = std::mem::replace(&mut self.current, next);
        tracing::debug!(target: trace_categories::PARSE, "completed command: '{completed}'");
        self.commands.push(completed);
    }

    fn start_pipe(&mut self) -> Result<(), error::Error> {
        // On failure the current command is kept and runs as a standalone command.
        let (reader, writer) = self.pipes.create_pipe()?;

        let descriptors = PipeDescriptors {
            read: reader.as_raw_fd(),
            write: writer.as_raw_fd(),
        };

        self.current.pipe_out = Some(descriptors);
        self.current.stdout = IoTarget::Pipe(writer);

        let mut sink = Command::new();
        sink.pipe_in = Some(descriptors);
        sink.stdin = IoTarget::Pipe(reader);

        self.complete_current(sink);
        Ok(())
    }
}

/// Builds a command list from the given tokens.
///
/// Building stops at the first error, which is reported on standard error; the
/// list built up to that point is still returned so that it can run.
///
/// # Arguments
///
/// * `tokens` - The line's tokens.
/// * `pipes` - Factory used for each `|` operator.
pub fn build_list(tokens: impl IntoIterator<Item = Token>, pipes: &mut dyn PipeFactory) -> CommandList {
    let mut builder = LineBuilder::new(pipes);

    for token in tokens {
        if let Err(err) = builder.push(token) {
            error::report(&err);
            break;
        }
    }

    builder.finish()
}
