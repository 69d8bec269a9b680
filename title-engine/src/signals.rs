use tokio::sync::mpsc::{self, error::TrySendError};
use tracing::debug;

/// Sending side of the "new data" notifications raised after a successful cycle.
///
/// Each channel holds a single pending signal. Sending into a full channel
/// drops the signal, since the receiver only needs to know that something changed.
#[derive(Debug, Clone)]
pub struct UpdateSignals {
    variables_changed: mpsc::Sender<()>,
    dashboard_changed: mpsc::Sender<()>,
}

#[derive(Debug)]
pub struct SignalReceivers {
    pub variables_changed: mpsc::Receiver<()>,
    pub dashboard_changed: mpsc::Receiver<()>,
}

pub fn channel() -> (UpdateSignals, SignalReceivers) {
    let (variables_tx, variables_rx) = mpsc::channel(1);
    let (dashboard_tx, dashboard_rx) = mpsc::channel(1);
    (
        UpdateSignals {
            variables_changed: variables_tx,
            dashboard_changed: dashboard_tx,
        },
        SignalReceivers {
            variables_changed: variables_rx,
            dashboard_changed: dashboard_rx,
        },
    )
}

fn notify(sender: &mpsc::Sender<()>, name: &str) {
    match sender.try_send(()) {
        Ok(()) => {}
        Err(TrySendError::Full(())) => debug!("{} signal already pending", name),
        Err(TrySendError::Closed(())) => debug!("{} signal has no receiver", name),
    }
}

impl UpdateSignals {
    pub fn notify_variables_changed(&self) {
        notify(&self.variables_changed, "variables_changed");
    }

    pub fn notify_dashboard_changed(&self) {
        notify(&self.dashboard_changed, "dashboard_changed");
    }

    pub fn notify_all(&self) {
        self.notify_variables_changed();
        self.notify_dashboard_changed();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_signals_coalesce() {
        let (signals, mut receivers) = channel();
        signals.notify_all();
        signals.notify_all();
        signals.notify_variables_changed();

        assert!(receivers.variables_changed.try_recv().is_ok());
        assert!(receivers.variables_changed.try_recv().is_err());
        assert!(receivers.dashboard_changed.try_recv().is_ok());
        assert!(receivers.dashboard_changed.try_recv().is_err());
    }

    #[test]
    fn test_dropped_receiver_is_ignored() {
        let (signals, receivers) = channel();
        drop(receivers);
        signals.notify_all();
    }
}
