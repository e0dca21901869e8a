//! Relay runtime
//!
//! Startup, the update loop and SIGINT-driven shutdown.

use crate::config::{Settings, LIVENESS_MESSAGE};
use crate::error::{ClassifiedError, TransportError};
use crate::relay::{Peer, RelayHandler, RelayTransport, TelegramTransport};
use std::future::Future;
use std::process::ExitCode;
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinSet;
use tracing::{debug, error, info, warn};

/// Pause after a failed update poll before asking again
const UPDATE_ERROR_BACKOFF: Duration = Duration::from_secs(1);

/// Run the relay until SIGINT.
///
/// Returns the process exit code: success after a clean shutdown, failure
/// when SIGINT cannot be observed or disconnecting fails.
pub async fn run_relay(settings: Arc<Settings>) -> ExitCode {
    let transport: Arc<dyn RelayTransport> = Arc::new(TelegramTransport::new(&settings));
    let relay = Arc::new(RelayHandler::from_settings(
        Arc::clone(&transport),
        settings.as_ref(),
    ));

    if initialize(transport.as_ref(), &relay).await.is_err() {
        warn!("Startup incomplete, no handler registered. Press Ctrl+C to exit.");
        if let Err(e) = tokio::signal::ctrl_c().await {
            error!("Failed to listen for Ctrl+C: {}", e);
            return ExitCode::FAILURE;
        }
        return ExitCode::SUCCESS;
    }

    serve(transport, relay, async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            // Without a signal listener there is no clean way to stop
            error!("Failed to listen for Ctrl+C: {}", e);
            std::process::exit(1);
        }
    })
    .await
}

/// Connect, prepare the staging directory and greet the operator.
///
/// # Errors
///
/// Any failure is reported to the operator as a `GeneralError` and returned.
pub async fn initialize(
    transport: &dyn RelayTransport,
    relay: &RelayHandler,
) -> Result<(), TransportError> {
    let result = async {
        transport.connect().await?;
        relay.stage().ensure_staging_directory().await?;
        transport
            .send_text(Peer::SavedMessages, LIVENESS_MESSAGE)
            .await?;
        Ok::<(), TransportError>(())
    }
    .await;

    if let Err(e) = &result {
        error!(error = %e, "Startup failed");
        relay.reporter().report(ClassifiedError::setup(e)).await;
    }
    result
}

/// Feed every new message to `relay` until `shutdown` resolves, then
/// disconnect.
///
/// Relays run concurrently and are never cancelled: the loop waits for all
/// of them before disconnecting. Returns failure when the disconnect fails.
pub async fn serve<S>(
    transport: Arc<dyn RelayTransport>,
    relay: Arc<RelayHandler>,
    shutdown: S,
) -> ExitCode
where
    S: Future<Output = ()>,
{
    tokio::pin!(shutdown);
    let mut relays = JoinSet::new();

    info!("Relay is running...");
    loop {
        tokio::select! {
            biased;
            () = &mut shutdown => break,
            next = transport.next_event() => match next {
                Ok(Some(event)) => {
                    let relay = Arc::clone(&relay);
                    relays.spawn(async move { relay.handle_event(&event).await });
                    while let Some(done) = relays.try_join_next() {
                        if let Err(e) = done {
                            error!(error = %e, "Relay task panicked");
                        }
                    }
                }
                Ok(None) => {
                    debug!("Update stream closed");
                    break;
                }
                Err(e) => {
                    warn!(error = %e, "Failed to receive updates");
                    tokio::time::sleep(UPDATE_ERROR_BACKOFF).await;
                }
            },
        }
    }

    while relays.join_next().await.is_some() {}

    info!("Disconnecting...");
    match transport.disconnect().await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            error!("Error during shutdown: {}", e);
            ExitCode::FAILURE
        }
    }
}
