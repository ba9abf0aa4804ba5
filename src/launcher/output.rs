//! Background draining of child stdout/stderr into an ordered line stream.

use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::process::{ChildStderr, ChildStdout};
use tokio::sync::mpsc::UnboundedSender;
use tracing::debug;

use serde::{Deserialize, Serialize};

/// Which pipe a line arrived on.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum OutputStream {
    /// Child standard output.
    Stdout,
    /// Child standard error.
    Stderr,
}

/// One raw output line, handed to consumers unmodified and in arrival
/// order (per stream).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutputLine {
    /// Originating pipe.
    pub stream: OutputStream,
    /// Line content without the trailing newline. A final partial line is
    /// delivered once the pipe closes.
    pub text: String,
}

/// Spawn the two pump tasks that drain the child's pipes into `tx`.
///
/// The receiver side sees the stream end (channel close) once both pipes
/// hit EOF, which happens when the process terminates and all buffered
/// output has been drained.
pub(crate) fn spawn_output_pumps(
    stdout: ChildStdout,
    stderr: ChildStderr,
    tx: &UnboundedSender<OutputLine>,
) {
    pump(BufReader::new(stdout), OutputStream::Stdout, tx.clone());
    pump(BufReader::new(stderr), OutputStream::Stderr, tx.clone());
}

fn pump<R>(reader: BufReader<R>, stream: OutputStream, tx: UnboundedSender<OutputLine>)
where
    R: tokio::io::AsyncRead + Unpin + Send + 'static,
{
    let _handle = tokio::spawn(async move {
        let mut lines = reader.lines();
        loop {
            match lines.next_line().await {
                Ok(Some(text)) => {
                    // Receiver dropped means no consumer; stop draining.
                    if tx.send(OutputLine { stream, text }).is_err() {
                        break;
                    }
                }
                Ok(None) => break,
                Err(err) => {
                    debug!(%err, ?stream, "output pump read failed");
                    break;
                }
            }
        }
    });
}
