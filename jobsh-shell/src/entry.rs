//! Implements the command-line interface for the `jobsh` shell.

use std::fs::File;
use std::io::{BufRead, BufReader, Write};

use clap::Parser;
use jobsh_core::{CreateOptions, Shell};

use crate::args::CommandLineArgs;
use crate::{ShellError, config, events, productinfo};

/// Main entry point for the `jobsh` shell.
pub fn run() {
    //
    // Set up panic handler. On release builds, it will capture panic details to a
    // temporary .toml file and report a human-readable message to the screen.
    //
    human_panic::setup_panic!(
        human_panic::Metadata::new(productinfo::PRODUCT_NAME, productinfo::PRODUCT_VERSION)
            .homepage(productinfo::PRODUCT_DISPLAY_URI)
    );

    //
    // Parse args.
    //
    let parsed_args = match CommandLineArgs::try_parse() {
        Ok(parsed_args) => parsed_args,
        Err(e) => {
            let _ = e.print();

            // clap reports `--help` and `--version` as errors, too.
            let exit_code = match e.kind() {
                clap::error::ErrorKind::DisplayVersion | clap::error::ErrorKind::DisplayHelp => 0,
                _ => 2,
            };

            std::process::exit(exit_code);
        }
    };

    //
    // Run.
    //
    let exit_code = match run_with_args(parsed_args) {
        Ok(code) => code,
        Err(err) => {
            tracing::error!("error: {err:#}");
            1
        }
    };

    std::process::exit(i32::from(exit_code));
}

/// Runs the shell as directed by the given arguments. Returns the exit code.
///
/// # Arguments
///
/// * `args` - The already-parsed command-line arguments.
fn run_with_args(args: CommandLineArgs) -> Result<u8, ShellError> {
    // Initialize tracing before loading config, so config problems can be logged.
    let mut event_config = events::TraceEventConfig::init(&args.enabled_debug_events);

    let loaded = config::load_config(args.no_config, args.config_file.as_deref());
    if let Some(err) = loaded.error {
        let path = loaded.path.unwrap_or_default();
        if loaded.explicit_path {
            return Err(ShellError::ConfigLoadFailure(path, err));
        }
        tracing::warn!("{}: {err}; using defaults", path.display());
    }

    let config = loaded.config;
    for event in &config.logging.debug_events {
        event_config.enable(*event)?;
    }

    let interactive = args.is_interactive();
    let mut shell = Shell::new(CreateOptions::builder().interactive(interactive).build())?;

    if let Some(command) = &args.command {
        let result = shell.run_string(command)?;
        return Ok(result.exit_code);
    }

    let show_prompt = interactive && config.show_prompt(&args);

    if let Some(script_path) = &args.script_path {
        let file = File::open(script_path)
            .map_err(|e| ShellError::ScriptOpenFailure(script_path.clone(), e))?;
        run_lines(&mut shell, BufReader::new(file), show_prompt)
    } else {
        run_lines(&mut shell, std::io::stdin().lock(), show_prompt)
    }
}

/// Runs each line read from the given input until end of input or until the
/// `exit` builtin runs. Returns the shell's exit code.
///
/// # Arguments
///
/// * `shell` - The shell to run the lines in.
/// * `input` - Source of command lines.
/// * `show_prompt` - Whether to print a prompt before reading each line.
pub fn run_lines(
    shell: &mut Shell,
    mut input: impl BufRead,
    show_prompt: bool,
) -> Result<u8, ShellError> {
    let mut line = Vec::new();

    loop {
        if show_prompt {
            write_prompt(shell)?;
        }

        // `read_until` retries reads interrupted by signals; a final line without a
        // newline is still returned. Decoding is left to the shell, which rejects
        // malformed lines without ending the session.
        line.clear();
        if input.read_until(b'\n', &mut line)? == 0 {
            break;
        }

        let result = shell.run_bytes(&line)?;
        if result.exit_shell {
            return Ok(result.exit_code);
        }
    }

    Ok(shell.last_exit_status())
}

fn write_prompt(shell: &Shell) -> Result<(), ShellError> {
    let mut stdout = std::io::stdout().lock();
    write!(
        stdout,
        "{}[{}]:{}:$ ",
        productinfo::PRODUCT_NAME,
        std::process::id(),
        shell.working_dir().display()
    )?;
    stdout.flush()?;
    Ok(())
}
