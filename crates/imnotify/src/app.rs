use anyhow::Result;
use im_notifier::{Envelope, IndicatorView, Notifier, Transport};

use crate::daemon_response::DaemonResponseSender;

#[derive(Debug)]
pub enum DaemonCommand {
    NoOp,
    Activate(DaemonResponseSender),
    PrintState(DaemonResponseSender),
    KillServer,
}

/// The daemon's control loop state. Commands from IPC clients and events from the bus are
/// handled here, one at a time.
pub struct App<T: Transport> {
    pub notifier: Notifier<T>,
}

impl<T: Transport> std::fmt::Debug for App<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("App").field("notifier", &self.notifier).finish()
    }
}

impl<T: Transport> App<T> {
    pub fn new(notifier: Notifier<T>) -> Self {
        App { notifier }
    }

    /// Handle a DaemonCommand event.
    pub fn handle_command(&mut self, event: DaemonCommand) {
        log::debug!("Handling event: {:?}", &event);
        let result: Result<()> = match event {
            DaemonCommand::NoOp => Ok(()),
            DaemonCommand::Activate(sender) => match self.notifier.activate() {
                Some(activation) => match activation.focused {
                    Some(window) => sender.send_success(format!("Focused window {} of {}", window, activation.backend)),
                    None => sender.send_success(format!("No window of {} to focus", activation.backend)),
                },
                None => sender.send_success("Nothing to activate".to_string()),
            },
            DaemonCommand::PrintState(sender) => {
                let hidden = IndicatorView::default();
                let view = self.notifier.indicator().map(|indicator| indicator.view()).unwrap_or(&hidden);
                sender.send_json(view)
            }
            DaemonCommand::KillServer => {
                log::info!("Received kill command, stopping server!");
                self.stop_application();
                let _ = crate::application_lifecycle::send_exit();
                Ok(())
            }
        };
        crate::print_result_err!("while handling event", &result);
    }

    pub fn handle_bus_event(&mut self, envelope: Envelope) {
        log::trace!("bus event: {:?}", envelope);
        self.notifier.dispatch(envelope);
    }

    pub fn stop_application(&mut self) {
        self.notifier.disable();
    }
}
