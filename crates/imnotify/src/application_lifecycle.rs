//! Process-wide shutdown signalling.
//! SIGINT/SIGTERM send an exit event. Long-running tasks hold a receiver from `subscribe_exit()`
//! for their whole lifetime, so the notifier is disabled before the process ends.

use anyhow::{Context, Result};
use once_cell::sync::Lazy;
use tokio::sync::broadcast;

pub static APPLICATION_EXIT_SENDER: Lazy<broadcast::Sender<()>> = Lazy::new(|| broadcast::channel(2).0);

/// Notify all listening tasks of the termination of the imnotify process.
pub fn send_exit() -> Result<()> {
    (APPLICATION_EXIT_SENDER).send(()).context("Failed to send exit lifecycle event")?;
    Ok(())
}

/// A receiver for the exit event. Events sent after this call are kept until received, so tasks
/// should subscribe once, before they start their work.
pub fn subscribe_exit() -> broadcast::Receiver<()> {
    APPLICATION_EXIT_SENDER.subscribe()
}

/// Install the SIGINT/SIGTERM handler that triggers `send_exit()`.
pub fn exit_on_signals() {
    simple_signal::set_handler(&[simple_signal::Signal::Int, simple_signal::Signal::Term], move |_| {
        log::info!("Shutting down imnotify daemon...");
        // nobody is subscribed yet, so there is nothing to shut down cleanly
        if let Err(e) = send_exit() {
            log::error!("Failed to send application shutdown event to workers: {:?}", e);
            std::process::exit(1);
        }
    });
}

/// Select in a loop, breaking once a application termination event (see `crate::application_lifecycle`) is received.
/// `exit = <receiver>;` selects on an existing receiver, otherwise one is subscribed before the loop starts.
#[macro_export]
macro_rules! loop_select_exiting {
    (exit = $exit:ident; $($content:tt)*) => {
        loop {
            tokio::select! {
                Ok(()) = $exit.recv() => {
                    break;
                }
                $($content)*
            }
        }
    };
    ($($content:tt)*) => {{
        let mut exit_recv = $crate::application_lifecycle::subscribe_exit();
        $crate::loop_select_exiting!(exit = exit_recv; $($content)*)
    }};
}

#[cfg(test)]
mod test {
    use tokio::sync::{broadcast, mpsc};

    #[tokio::test]
    async fn test_exit_sent_while_handling_an_event_ends_the_loop() {
        let (exit_send, mut exit_recv) = broadcast::channel(2);
        let (event_send, mut event_recv) = mpsc::unbounded_channel();
        event_send.send(()).unwrap();

        let mut handled = 0;
        crate::loop_select_exiting! {
            exit = exit_recv;
            Some(()) = event_recv.recv() => {
                handled += 1;
                exit_send.send(()).unwrap();
            }
        }
        assert_eq!(handled, 1);
    }

    #[tokio::test]
    async fn test_exit_before_the_loop_starts_is_kept() {
        let mut exit_recv = super::subscribe_exit();
        super::send_exit().unwrap();
        let (_event_send, mut event_recv) = mpsc::unbounded_channel::<()>();
        crate::loop_select_exiting! {
            exit = exit_recv;
            Some(()) = event_recv.recv() => {}
        }
    }
}
