//! Tears down command lists once they have run.

use crate::command::CommandList;
use crate::trace_categories;

/// Releases every command in the list, including any descriptors still held for
/// commands that never launched. Child processes are left alone; background
/// children stay tracked by the session's job table.
///
/// # Arguments
///
/// * `list` - The list to tear down.
pub(crate) fn reclaim(list: CommandList) {
    let commands = list.into_commands();

    let stray = commands.iter().filter(|c| c.holds_descriptors()).count();
    if stray > 0 {
        tracing::debug!(target: trace_categories::COMMANDS, "closing descriptors held by {stray} unlaunched command(s)");
    }

    tracing::trace!(target: trace_categories::COMMANDS, "reclaiming {} command node(s)", commands.len());
    drop(commands);
}

