//! The prepare phase (§4.2.1): connect, send `name`/`command`/`timeout`,
//! verify each echo, then send `READY` and verify its echo.

use jobrelay_protocol::{wire::read_frame, ControlToken, KeyValue, ProtocolError, Target};
use tokio::io::{AsyncRead, AsyncWrite, AsyncWriteExt};
use tracing::debug;

use crate::error::PrepareError;
use crate::transport::Transport;

/// Connects to `target.address` and drives the configure handshake to
/// completion, returning the connected, `READY`-acknowledged stream.
///
/// # Errors
/// Returns [`PrepareError::Connect`]/[`PrepareError::ConnectTimedOut`] if the
/// connection itself fails, or [`PrepareError::Protocol`] on an echo
/// mismatch or early close.
pub async fn prepare(
    transport: Transport,
    target: &Target,
) -> Result<tokio::net::TcpStream, PrepareError> {
    let mut stream = transport.connect(&target.address).await?;
    configure(&mut stream, &target.address, target).await?;
    Ok(stream)
}

async fn configure<S>(stream: &mut S, name: &str, target: &Target) -> Result<(), ProtocolError>
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    send_and_verify_echo(stream, &KeyValue::new("name", name).encode()).await?;

    for job in &target.jobs {
        send_and_verify_echo(stream, &KeyValue::new("command", &job.command).encode()).await?;
        let timeout_seconds = job.timeout.as_wire_seconds().to_string();
        send_and_verify_echo(stream, &KeyValue::new("timeout", timeout_seconds).encode()).await?;
    }

    send_and_verify_echo(stream, ControlToken::Ready.as_bytes()).await?;
    debug!(target = %name, "agent is READY");
    Ok(())
}

async fn send_and_verify_echo<S>(stream: &mut S, bytes: &[u8]) -> Result<(), ProtocolError>
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    stream.write_all(bytes).await?;
    let echoed = read_frame(stream).await?.ok_or(ProtocolError::ConnectionClosed)?;
    if echoed != bytes {
        return Err(ProtocolError::EchoMismatch {
            sent: bytes.to_vec(),
            got: echoed,
        });
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use jobrelay_protocol::{Job, Timeout};
    use tokio::io::duplex;

    #[tokio::test]
    async fn configure_succeeds_when_peer_echoes_everything() {
        let (mut coordinator_side, mut agent_side) = duplex(4096);
        let target = Target {
            address: "t1".into(),
            jobs: vec![Job::new("echo hi", Timeout::Seconds(5))],
        };

        let agent_task = tokio::spawn(async move {
            for _ in 0..4 {
                let frame = read_frame(&mut agent_side).await.unwrap().unwrap();
                agent_side.write_all(&frame).await.unwrap();
            }
        });

        configure(&mut coordinator_side, "t1", &target).await.unwrap();
        agent_task.await.unwrap();
    }

    #[tokio::test]
    async fn configure_fails_on_echo_mismatch() {
        let (mut coordinator_side, mut agent_side) = duplex(4096);
        let target = Target {
            address: "t1".into(),
            jobs: vec![Job::new("echo hi", Timeout::Seconds(5))],
        };

        let agent_task = tokio::spawn(async move {
            let _frame = read_frame(&mut agent_side).await.unwrap().unwrap();
            agent_side.write_all(b"garbage\n").await.unwrap();
        });

        let err = configure(&mut coordinator_side, "t1", &target).await.unwrap_err();
        assert!(matches!(err, ProtocolError::EchoMismatch { .. }));
        let _ = agent_task.await;
    }
}
