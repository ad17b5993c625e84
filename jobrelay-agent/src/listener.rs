//! The top-level accept loop (§4.5): one TCP port, one connection served to
//! completion before the next is accepted.

use std::sync::Arc;

use jobrelay_protocol::LocalExecutor;
use tokio::net::TcpListener;
use tracing::{info, warn};

use crate::error::AgentError;
use crate::{configure, run};

/// Serves connections from `listener` forever, one at a time.
pub async fn serve(listener: TcpListener, executor: Arc<dyn LocalExecutor>) -> ! {
    loop {
        match listener.accept().await {
            Ok((stream, peer)) => {
                info!(%peer, "accepted connection");
                if let Err(error) = handle_connection(stream, executor.clone()).await {
                    warn!(%peer, %error, "connection ended with an error");
                } else {
                    info!(%peer, "connection closed cleanly");
                }
            }
            Err(error) => {
                warn!(%error, "accept failed");
            }
        }
    }
}

async fn handle_connection(
    mut stream: tokio::net::TcpStream,
    executor: Arc<dyn LocalExecutor>,
) -> Result<(), AgentError> {
    let (peer_name, jobs) = configure::run(&mut stream).await?;
    run::await_start(&mut stream).await?;
    run::run(stream, peer_name, jobs, executor).await
}
