use std::collections::HashSet;
use std::fmt::Display;

use jobsh_core::trace_categories;
use tracing_subscriber::{
    Layer, Registry, filter::Targets, layer::SubscriberExt, reload::Handle,
    util::SubscriberInitExt,
};

use crate::ShellError;

/// Type of event to trace.
#[derive(Clone, Copy, Debug, Eq, Hash, PartialEq, clap::ValueEnum, serde::Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TraceEvent {
    /// Traces command launches, builtins, and redirections.
    #[clap(name = "commands")]
    Commands,
    /// Traces waiting on, and reaping of, child processes.
    #[clap(name = "jobs")]
    Jobs,
    /// Traces the building of command lists from tokens.
    #[clap(name = "parse")]
    Parse,
    /// Traces handoff of the terminal's foreground.
    #[clap(name = "terminal")]
    Terminal,
    /// Traces the process of tokenizing input text.
    #[clap(name = "tokenize")]
    Tokenize,
}

impl Display for TraceEvent {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Commands => write!(f, "commands"),
            Self::Jobs => write!(f, "jobs"),
            Self::Parse => write!(f, "parse"),
            Self::Terminal => write!(f, "terminal"),
            Self::Tokenize => write!(f, "tokenize"),
        }
    }
}

impl TraceEvent {
    const fn target(self) -> &'static str {
        match self {
            Self::Commands => trace_categories::COMMANDS,
            Self::Jobs => trace_categories::JOBS,
            Self::Parse => trace_categories::PARSE,
            Self::Terminal => trace_categories::TERMINAL,
            Self::Tokenize => "tokenize",
        }
    }
}

/// Tracks which classes of events are traced, and applies changes to the
/// installed subscriber.
#[derive(Default)]
pub struct TraceEventConfig {
    enabled_trace_events: HashSet<TraceEvent>,
    handle: Option<Handle<Targets, Registry>>,
}

impl TraceEventConfig {
    /// Installs a subscriber writing to standard error, with debug output for the
    /// given classes of events.
    ///
    /// # Arguments
    ///
    /// * `enabled_debug_events` - Classes of events to trace at debug level.
    pub fn init(enabled_debug_events: &[TraceEvent]) -> Self {
        let mut config = Self {
            enabled_trace_events: enabled_debug_events.iter().copied().collect(),
            ..Default::default()
        };

        let filter = config.compose_filter();

        // Make the filter reloadable so that events enabled by the configuration
        // file can be added once it has been read.
        let (reload_filter, handle) = tracing_subscriber::reload::Layer::new(filter);

        let layer = tracing_subscriber::fmt::layer()
            .with_writer(std::io::stderr)
            .without_time()
            .with_target(false)
            .with_filter(reload_filter);

        if tracing_subscriber::registry()
            .with(layer)
            .try_init()
            .is_ok()
        {
            config.handle = Some(handle);
        } else {
            // Something went wrong; proceed on anyway but complain audibly.
            eprintln!("warning: failed to initialize tracing.");
        }

        config
    }

    fn compose_filter(&self) -> Targets {
        let mut filter =
            Targets::new().with_default(tracing_subscriber::filter::LevelFilter::INFO);

        for event in &self.enabled_trace_events {
            filter = filter.with_target(event.target(), tracing::Level::DEBUG);
        }

        filter
    }

    /// Returns the classes of events currently traced.
    pub const fn enabled_events(&self) -> &HashSet<TraceEvent> {
        &self.enabled_trace_events
    }

    /// Enables debug tracing for the given class of events.
    ///
    /// # Arguments
    ///
    /// * `event` - The class of events to enable.
    pub fn enable(&mut self, event: TraceEvent) -> Result<(), ShellError> {
        // Don't bother to reload config if nothing has changed.
        if !self.enabled_trace_events.insert(event) {
            return Ok(());
        }

        tracing::debug!("enabling tracing of {event} events");
        self.reload_filter()
    }

    fn reload_filter(&self) -> Result<(), ShellError> {
        if let Some(handle) = &self.handle {
            handle
                .reload(self.compose_filter())
                .map_err(|_| ShellError::TracingReloadFailure)?;
        }

        Ok(())
    }
}
