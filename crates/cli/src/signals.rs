//! Process signals mapped onto session commands.
//!
//! | Signal     | Command                       |
//! |------------|-------------------------------|
//! | `SIGUSR1`  | `Visibility(Hidden)` (pause)  |
//! | `SIGUSR2`  | `Visibility(Visible)` (resume)|
//! | Ctrl-C     | `Reset`                       |
//!
//! The user signals exist only on Unix; elsewhere only Ctrl-C is handled.

use scanbatch_session::controller::SessionCommand;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

/// Forward signals to `commands` until the receiver closes or Ctrl-C is
/// seen.
///
/// Handlers are installed before this returns, so a signal sent right
/// after the call is queued instead of taking the process down. Returns
/// `None` if they could not be installed.
pub fn forward(commands: mpsc::Sender<SessionCommand>) -> Option<JoinHandle<()>> {
    match Signals::install() {
        Ok(signals) => Some(tokio::spawn(signals.run(commands))),
        Err(e) => {
            tracing::warn!(error = %e, "Signal handling unavailable");
            None
        }
    }
}

#[cfg(unix)]
struct Signals {
    hidden: tokio::signal::unix::Signal,
    visible: tokio::signal::unix::Signal,
    interrupt: tokio::signal::unix::Signal,
}

#[cfg(unix)]
impl Signals {
    fn install() -> std::io::Result<Self> {
        use tokio::signal::unix::{signal, SignalKind};

        Ok(Self {
            hidden: signal(SignalKind::user_defined1())?,
            visible: signal(SignalKind::user_defined2())?,
            interrupt: signal(SignalKind::interrupt())?,
        })
    }

    async fn run(mut self, commands: mpsc::Sender<SessionCommand>) {
        use scanbatch_session::controller::Visibility;

        loop {
            let command = tokio::select! {
                _ = self.hidden.recv() => SessionCommand::Visibility(Visibility::Hidden),
                _ = self.visible.recv() => SessionCommand::Visibility(Visibility::Visible),
                _ = self.interrupt.recv() => SessionCommand::Reset,
            };
            tracing::info!(?command, "Signal received");
            let reset = command == SessionCommand::Reset;
            if commands.send(command).await.is_err() || reset {
                return;
            }
        }
    }
}

#[cfg(not(unix))]
struct Signals {
    interrupt: tokio::signal::windows::CtrlC,
}

#[cfg(not(unix))]
impl Signals {
    fn install() -> std::io::Result<Self> {
        Ok(Self {
            interrupt: tokio::signal::windows::ctrl_c()?,
        })
    }

    async fn run(mut self, commands: mpsc::Sender<SessionCommand>) {
        if self.interrupt.recv().await.is_some() {
            tracing::info!("Interrupted");
            let _ = commands.send(SessionCommand::Reset).await;
        }
    }
}

#[cfg(all(test, unix))]
mod tests {
    use std::time::Duration;

    use scanbatch_session::controller::Visibility;

    use super::*;

    fn send_signal(name: &str) {
        let status = std::process::Command::new("kill")
            .args([name, &std::process::id().to_string()])
            .status()
            .unwrap();
        assert!(status.success());
    }

    #[tokio::test]
    async fn user_signals_become_visibility_commands() {
        let (tx, mut rx) = mpsc::channel(8);
        let forwarder = forward(tx).unwrap();

        send_signal("-USR1");
        let command = tokio::time::timeout(Duration::from_secs(5), rx.recv()).await.unwrap();
        assert_eq!(command, Some(SessionCommand::Visibility(Visibility::Hidden)));

        send_signal("-USR2");
        let command = tokio::time::timeout(Duration::from_secs(5), rx.recv()).await.unwrap();
        assert_eq!(command, Some(SessionCommand::Visibility(Visibility::Visible)));

        forwarder.abort();
    }
}
