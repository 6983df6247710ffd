use std::future::Future;
use std::net::SocketAddr;
use tokio::net::{TcpListener, TcpStream};
use tokio::signal;
use tokio::time::{self, Duration};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, instrument, warn};

use crate::codec::{CodecError, FrameCodec};
use crate::commands::executable::{Context, Executable};
use crate::commands::Command;
use crate::config::Config;
use crate::connection::Connection;
use crate::frame::Frame;
use crate::store::{sweep_expired_keys, Store};
use crate::Error;

const MIN_ACCEPT_BACKOFF: Duration = Duration::from_millis(10);
const MAX_ACCEPT_BACKOFF: Duration = Duration::from_secs(1);

/// Binds to the configured port and serves clients until ctrl-c is received.
pub async fn run(config: Config) -> Result<(), Error> {
    let _ = tracing_subscriber::fmt()
        .try_init()
        .map_err(|e| debug!("Failed to initialize global tracing: {}", e));

    let listener = TcpListener::bind(("127.0.0.1", config.port)).await?;

    serve(listener, config, signal::ctrl_c()).await
}

/// Accepts connections on `listener` until `shutdown` completes. Every connection and the
/// expiry sweeper share a single store.
pub async fn serve(
    listener: TcpListener,
    config: Config,
    shutdown: impl Future,
) -> Result<(), Error> {
    let ctx = Context::new(Store::new(), config.role());
    let codec = FrameCodec::new(config.max_frame_size);
    let token = CancellationToken::new();

    let sweeper = tokio::spawn(sweep_expired_keys(
        ctx.store.clone(),
        config.sweep_interval(),
        token.clone(),
    ));

    info!(
        role = %ctx.role,
        "Redis server listening on {}",
        listener.local_addr()?
    );
    if let Some(master) = &config.replicaof {
        info!("Replica of {}:{}", master.host, master.port);
    }

    let res = tokio::select! {
        res = accept(&listener, &ctx, &codec, &token) => res,
        _ = shutdown => {
            info!("Shutting down");
            Ok(())
        }
    };

    // Stops the sweeper and asks every open connection to close.
    token.cancel();
    sweeper.await?;

    res
}

async fn accept(
    listener: &TcpListener,
    ctx: &Context,
    codec: &FrameCodec,
    shutdown: &CancellationToken,
) -> Result<(), Error> {
    let mut backoff = MIN_ACCEPT_BACKOFF;

    loop {
        // Errors like EMFILE are usually temporary, retry after a pause.
        let (socket, client_address) = match listener.accept().await {
            Ok(accepted) => {
                backoff = MIN_ACCEPT_BACKOFF;
                accepted
            }
            Err(e) => {
                error!(error = %e, ?backoff, "Failed to accept connection");
                time::sleep(backoff).await;
                backoff = next_backoff(backoff);
                continue;
            }
        };
        let ctx = ctx.clone();
        let codec = codec.clone();
        let shutdown = shutdown.clone();
        info!("Accepted connection from {:?}", client_address);

        tokio::spawn(async move {
            if let Err(e) = handle_connection(socket, client_address, ctx, codec, shutdown).await
            {
                error!(error = %e, "Connection failed");
            }
        });
    }
}

fn next_backoff(backoff: Duration) -> Duration {
    (backoff * 2).min(MAX_ACCEPT_BACKOFF)
}

#[instrument(
    name = "connection",
    skip(stream, ctx, codec, shutdown),
    fields(connection_id, client_address)
)]
async fn handle_connection(
    stream: TcpStream,
    client_address: SocketAddr,
    ctx: Context,
    codec: FrameCodec,
    shutdown: CancellationToken,
) -> Result<(), Error> {
    let mut conn = Connection::with_codec(stream, codec);

    tracing::Span::current()
        .record("connection_id", conn.id.to_string())
        .record("client_address", client_address.to_string());

    loop {
        let frame = tokio::select! {
            frame = conn.read_frame() => frame,
            _ = shutdown.cancelled() => {
                info!("Closing connection on shutdown");
                return Ok(());
            }
        };

        let frame = match frame {
            Ok(Some(frame)) => frame,
            Ok(None) => break,
            Err(CodecError::Io(e)) => return Err(e.into()),
            Err(e) => {
                // Framing is lost, there is no way to find where the next request starts.
                warn!(error = %e, "Closing connection after protocol error");
                conn.write_frame(Frame::error(format!("ERR {}", e))).await?;
                return Ok(());
            }
        };

        debug!("Received frame from client: {}", frame);

        let res = match Command::parse(frame, ctx.store.now()) {
            Ok(cmd) => cmd.exec(&ctx)?,
            Err(e) => {
                debug!(error = %e, "Rejected command");
                Frame::error(e.to_string())
            }
        };

        debug!("Sending response to client: {}", res);
        conn.write_frame(res).await?;
    }

    info!("Connection closed");
    Ok(())
}
