//! `AWAITING_SPEC` (§4.5): echo every configuration message verbatim, collect
//! `name`/`command`/`timeout` keys, and stop at `READY`.

use jobrelay_protocol::{wire::read_frame, ControlToken, Job, KeyValue, Timeout};
use tokio::io::{AsyncRead, AsyncWrite, AsyncWriteExt};
use tracing::debug;

use crate::error::AgentError;

/// Drives the configure phase to completion, returning the registered name
/// and ordered jobs once `READY` has been received and echoed.
///
/// # Errors
/// Returns [`AgentError::ConnectionClosedDuringConfigure`] on early EOF,
/// [`AgentError::UnknownKey`] on an unrecognized key, or
/// [`AgentError::InvalidTimeout`] if a `timeout` value isn't a valid integer.
pub async fn run<S>(stream: &mut S) -> Result<(String, Vec<Job>), AgentError>
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    let mut name = String::new();
    let mut commands = Vec::new();
    let mut timeouts = Vec::new();

    loop {
        let frame = read_frame(stream)
            .await?
            .ok_or(AgentError::ConnectionClosedDuringConfigure)?;

        // Every message received during configure is echoed back verbatim,
        // including READY itself, before it's interpreted (§4.1).
        stream.write_all(&frame).await?;

        if ControlToken::parse(&frame) == Some(ControlToken::Ready) {
            break;
        }

        let kv = KeyValue::parse(&frame).ok_or_else(|| {
            AgentError::UnknownKey(String::from_utf8_lossy(&frame).trim().to_string())
        })?;

        match kv.key.as_str() {
            "name" => {
                debug!(name = %kv.value, "registering agent name");
                name = kv.value;
            }
            "command" => {
                debug!(command = %kv.value, "registering command");
                commands.push(kv.value);
            }
            "timeout" => {
                let seconds: u64 = kv
                    .value
                    .parse()
                    .map_err(|_| AgentError::InvalidTimeout(kv.value.clone()))?;
                debug!(timeout = seconds, "registering timeout");
                timeouts.push(Timeout::from_wire_seconds(seconds));
            }
            other => return Err(AgentError::UnknownKey(other.to_string())),
        }
    }

    let jobs = commands
        .into_iter()
        .zip(timeouts)
        .map(|(command, timeout)| Job::new(command, timeout))
        .collect();

    Ok((name, jobs))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    fn message(key: &str, value: &str) -> Vec<u8> {
        KeyValue::new(key, value).encode()
    }

    #[tokio::test]
    async fn collects_name_commands_and_timeouts_until_ready() {
        let mut input = Vec::new();
        input.extend(message("name", "web1"));
        input.extend(message("command", "echo hi"));
        input.extend(message("timeout", "30"));
        input.extend(message("command", "echo bye"));
        input.extend(message("timeout", "0"));
        input.extend(ControlToken::Ready.as_bytes());

        let mut stream = DuplexHarness::new(input);
        let (name, jobs) = run(&mut stream).await.unwrap();

        assert_eq!(name, "web1");
        assert_eq!(jobs.len(), 2);
        assert_eq!(jobs[0].command, "echo hi");
        assert_eq!(jobs[0].timeout, Timeout::Seconds(30));
        assert_eq!(jobs[1].command, "echo bye");
        assert_eq!(jobs[1].timeout, Timeout::None);

        assert_eq!(stream.written, stream.read_source);
    }

    #[tokio::test]
    async fn rejects_unrecognized_key() {
        let mut input = message("bogus", "value");
        input.extend(ControlToken::Ready.as_bytes());
        let mut stream = DuplexHarness::new(input);
        let err = run(&mut stream).await.unwrap_err();
        assert!(matches!(err, AgentError::UnknownKey(_)));
    }

    #[tokio::test]
    async fn closed_connection_before_ready_is_an_error() {
        let mut stream = DuplexHarness::new(message("name", "web1"));
        let err = run(&mut stream).await.unwrap_err();
        assert!(matches!(err, AgentError::ConnectionClosedDuringConfigure));
    }

    /// A minimal in-memory duplex: reads drain `read_source`, writes
    /// accumulate in `written`, so tests can assert the echo discipline
    /// without a real socket.
    struct DuplexHarness {
        read_source: Vec<u8>,
        cursor: Cursor<Vec<u8>>,
        written: Vec<u8>,
    }

    impl DuplexHarness {
        fn new(read_source: Vec<u8>) -> Self {
            Self {
                cursor: Cursor::new(read_source.clone()),
                read_source,
                written: Vec::new(),
            }
        }
    }

    impl AsyncRead for DuplexHarness {
        fn poll_read(
            mut self: std::pin::Pin<&mut Self>,
            cx: &mut std::task::Context<'_>,
            buf: &mut tokio::io::ReadBuf<'_>,
        ) -> std::task::Poll<std::io::Result<()>> {
            std::pin::Pin::new(&mut self.cursor).poll_read(cx, buf)
        }
    }

    impl AsyncWrite for DuplexHarness {
        fn poll_write(
            mut self: std::pin::Pin<&mut Self>,
            _cx: &mut std::task::Context<'_>,
            buf: &[u8],
        ) -> std::task::Poll<std::io::Result<usize>> {
            self.written.extend_from_slice(buf);
            std::task::Poll::Ready(Ok(buf.len()))
        }

        fn poll_flush(
            self: std::pin::Pin<&mut Self>,
            _cx: &mut std::task::Context<'_>,
        ) -> std::task::Poll<std::io::Result<()>> {
            std::task::Poll::Ready(Ok(()))
        }

        fn poll_shutdown(
            self: std::pin::Pin<&mut Self>,
            _cx: &mut std::task::Context<'_>,
        ) -> std::task::Poll<std::io::Result<()>> {
            std::task::Poll::Ready(Ok(()))
        }
    }
}
