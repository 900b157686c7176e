use tracing::info;

use crate::shutdown::StopSignal;

#[cfg(unix)]
use tokio::signal::unix::{SignalKind, signal};

/// Fire `stop` on Ctrl-C (or SIGTERM on unix). The task ends on its own once
/// `stop` fires for any other reason.
pub fn setup_signal_shutdown_handler(stop: &StopSignal) -> tokio::task::JoinHandle<()> {
    let stop = stop.clone();
    tokio::spawn(async move {
        #[cfg(unix)]
        let mut term_signal = match signal(SignalKind::terminate()) {
            Ok(signal) => Some(signal),
            Err(err) => {
                tracing::warn!("Failed to register SIGTERM handler: {}", err);
                None
            }
        };

        #[cfg(unix)]
        {
            tokio::select! {
                () = stop.stopped() => {}
                _ = tokio::signal::ctrl_c() => {
                    info!("Interrupted, stopping run");
                    stop.fire();
                }
                () = async {
                    if let Some(signal) = term_signal.as_mut() {
                        signal.recv().await;
                    } else {
                        std::future::pending::<()>().await;
                    }
                } => {
                    info!("Terminated, stopping run");
                    stop.fire();
                }
            }
        }

        #[cfg(not(unix))]
        {
            tokio::select! {
                () = stop.stopped() => {}
                _ = tokio::signal::ctrl_c() => {
                    info!("Interrupted, stopping run");
                    stop.fire();
                }
            }
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::future::Future;
    use std::time::Duration;

    const SIGNAL_HANDLER_SETTLE: Duration = Duration::from_millis(10);
    const SHUTDOWN_HANDLER_TIMEOUT: Duration = Duration::from_secs(1);

    fn run_async_test<F>(future: F) -> Result<(), String>
    where
        F: Future<Output = Result<(), String>>,
    {
        let runtime = tokio::runtime::Builder::new_current_thread()
            .enable_all()
            .build()
            .map_err(|err| format!("Failed to build runtime: {}", err))?;
        runtime.block_on(future)
    }

    #[test]
    fn signal_handler_exits_on_stop() -> Result<(), String> {
        run_async_test(async {
            let stop = StopSignal::new();
            let handle = setup_signal_shutdown_handler(&stop);

            tokio::time::sleep(SIGNAL_HANDLER_SETTLE).await;
            stop.fire();

            tokio::time::timeout(SHUTDOWN_HANDLER_TIMEOUT, handle)
                .await
                .map_err(|err| format!("Timed out waiting for shutdown handler: {}", err))?
                .map_err(|err| format!("Shutdown task join error: {}", err))?;
            Ok(())
        })
    }
}
