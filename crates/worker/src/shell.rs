//! Interactive command runner.
//!
//! Takes the text after the bot command, runs it through the shell gateway
//! and turns the result into a [`Reply`]: short output as a monospace block,
//! long output as a text document, disallowed commands as a plain notice.

use sino_core::process::{
    GatewayError, PlainOutput, ProcessGateway, TimeBudget, OUTPUT_LIMIT_LENGTH,
};
use sino_core::reply::{MediaSource, Reply};

pub const EMPTY_COMMAND_HINT: &str =
    "No command given. This already is the shell, tell it what to run.";

/// Split on runs of whitespace. No quoting: every word is one argument.
pub fn split_command_line(line: &str) -> Vec<String> {
    line.split_whitespace().map(str::to_owned).collect()
}

pub async fn run_command_line(
    gateway: &ProcessGateway,
    line: &str,
    budget: TimeBudget,
) -> Result<Reply, GatewayError> {
    run_argv(gateway, &split_command_line(line), budget).await
}

/// Run `argv` and build the reply.
///
/// A rejected command is a reply, not an error. Spawn and pipe failures
/// are returned.
pub async fn run_argv(
    gateway: &ProcessGateway,
    argv: &[String],
    budget: TimeBudget,
) -> Result<Reply, GatewayError> {
    if argv.is_empty() {
        return Ok(Reply::text(EMPTY_COMMAND_HINT));
    }

    match gateway.exec_plain(argv, budget).await {
        Ok(output) => Ok(render_output(argv, output)),
        Err(e @ GatewayError::CommandNotAllowed { .. }) => {
            tracing::info!(command = %argv[0], "[shell] rejected");
            Ok(Reply::text(e.to_string()))
        }
        Err(e) => Err(e),
    }
}

/// Inline text up to [`OUTPUT_LIMIT_LENGTH`] characters, a document beyond.
pub fn render_output(argv: &[String], output: PlainOutput) -> Reply {
    if output.timed_out {
        tracing::warn!(argv = ?argv, "[shell] command ran out of time");
    }

    if !output.text.exceeds_inline_limit() {
        return Reply::monospace(output.text.into_string());
    }

    let len = output.text.char_len();
    tracing::info!(argv = ?argv, len, "[shell] output too long");
    Reply::Document {
        media: MediaSource::upload(document_name(argv), output.text.into_string().into_bytes()),
        caption: Some(format!(
            "Command output too long ({len} > {OUTPUT_LIMIT_LENGTH})!\nHere is your output text document."
        )),
    }
}

fn document_name(argv: &[String]) -> String {
    format!("{}.txt", argv.join("_").replace('/', "_"))
}
