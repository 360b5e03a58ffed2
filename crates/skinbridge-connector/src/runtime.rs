//! Single-threaded event loop feeding the overlay.
//!
//! Bridge messages, timer firings, host rebuilds and user commands are
//! dispatched to the [`Overlay`] one at a time. After every dispatch the
//! host's pending mutations are drained back into the overlay.

use std::time::Duration;

use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::sync::mpsc;
use tokio::time::{interval, MissedTickBehavior};

use skinbridge_overlay::{Env, Overlay, TimerEvent, Timers};
use skinbridge_protocol::{InboundMessage, Outbox};

use crate::host::SnapshotHost;

/// Bound on mutation → reconcile → mutation cycles per dispatch.
const MAX_MUTATION_ROUNDS: usize = 4;

const MIN_POLL_INTERVAL: Duration = Duration::from_millis(10);

/// Commands from the user side of the headless host.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HostCommand {
    /// Click the injected control.
    Click,
    /// Rebuild the tree from the snapshot now.
    Reload,
    Quit,
}

impl HostCommand {
    pub fn parse(line: &str) -> Option<Self> {
        match line.trim() {
            "click" => Some(Self::Click),
            "reload" => Some(Self::Reload),
            "quit" | "exit" => Some(Self::Quit),
            _ => None,
        }
    }
}

/// Timers backed by spawned sleeps that post back into the loop.
pub struct TokioTimers {
    tx: mpsc::UnboundedSender<TimerEvent>,
}

impl TokioTimers {
    pub fn channel() -> (Self, mpsc::UnboundedReceiver<TimerEvent>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self { tx }, rx)
    }
}

impl Timers for TokioTimers {
    fn schedule(&mut self, delay: Duration, event: TimerEvent) {
        let tx = self.tx.clone();
        tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            let _ = tx.send(event);
        });
    }
}

pub struct OverlayRuntime<O: Outbox> {
    overlay: Overlay,
    host: SnapshotHost,
    outbox: O,
    timers: TokioTimers,
    timer_rx: mpsc::UnboundedReceiver<TimerEvent>,
    inbound_rx: mpsc::UnboundedReceiver<InboundMessage>,
    poll_interval: Duration,
    last_host_error: Option<String>,
}

impl<O: Outbox> OverlayRuntime<O> {
    pub fn new(
        overlay: Overlay,
        host: SnapshotHost,
        outbox: O,
        inbound_rx: mpsc::UnboundedReceiver<InboundMessage>,
        poll_interval: Duration,
    ) -> Self {
        let (timers, timer_rx) = TokioTimers::channel();
        Self {
            overlay,
            host,
            outbox,
            timers,
            timer_rx,
            inbound_rx,
            poll_interval,
            last_host_error: None,
        }
    }

    pub fn overlay(&self) -> &Overlay {
        &self.overlay
    }

    pub fn host(&self) -> &SnapshotHost {
        &self.host
    }

    /// Run until a `Quit` command arrives, the command channel closes, or
    /// the bridge stops delivering.
    pub async fn run(mut self, mut commands: mpsc::UnboundedReceiver<HostCommand>) -> Self {
        self.overlay.start(&mut self.outbox);
        self.refresh_host(false);

        let mut poll = interval(self.poll_interval.max(MIN_POLL_INTERVAL));
        poll.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                message = self.inbound_rx.recv() => {
                    let Some(message) = message else {
                        tracing::info!("Bridge stopped, leaving event loop");
                        break;
                    };
                    let mut env = Env::new(self.host.tree_mut(), &mut self.outbox, &mut self.timers);
                    self.overlay.handle_inbound(message, &mut env);
                }
                Some(event) = self.timer_rx.recv() => {
                    let mut env = Env::new(self.host.tree_mut(), &mut self.outbox, &mut self.timers);
                    self.overlay.handle_timer(event, &mut env);
                }
                _ = poll.tick() => {
                    self.refresh_host(false);
                }
                command = commands.recv() => {
                    match command {
                        Some(HostCommand::Click) => self.click(),
                        Some(HostCommand::Reload) => self.refresh_host(true),
                        Some(HostCommand::Quit) | None => {
                            tracing::info!("Shutting down event loop");
                            break;
                        }
                    }
                }
            }
            self.drain_mutations();
        }
        self
    }

    fn click(&mut self) {
        let Some(control) = self.overlay.control_node() else {
            tracing::info!("No control to click");
            return;
        };
        let mut env = Env::new(self.host.tree_mut(), &mut self.outbox, &mut self.timers);
        self.overlay.handle_click(control, &mut env);
    }

    fn refresh_host(&mut self, force: bool) {
        let result = if force {
            self.host.reload()
        } else {
            self.host.refresh()
        };
        match result {
            Ok(_) => self.last_host_error = None,
            Err(e) => {
                let error = e.to_string();
                if self.last_host_error.as_deref() != Some(error.as_str()) {
                    tracing::warn!(error = %error, "Host snapshot unavailable");
                    self.last_host_error = Some(error);
                }
            }
        }
    }

    fn drain_mutations(&mut self) {
        for _ in 0..MAX_MUTATION_ROUNDS {
            let batch = self.host.tree_mut().take_mutations();
            if batch.is_empty() {
                return;
            }
            let mut env = Env::new(self.host.tree_mut(), &mut self.outbox, &mut self.timers);
            self.overlay.handle_mutations(&batch, &mut env);
        }
        tracing::debug!("Mutation rounds exhausted, remaining changes wait for the next event");
    }
}

/// Forward stdin lines as [`HostCommand`]s until stdin closes.
pub fn spawn_stdin_commands(tx: mpsc::UnboundedSender<HostCommand>) {
    tokio::spawn(async move {
        let mut lines = BufReader::new(tokio::io::stdin()).lines();
        while let Ok(Some(line)) = lines.next_line().await {
            match HostCommand::parse(&line) {
                Some(command) => {
                    if tx.send(command).is_err() {
                        break;
                    }
                }
                None if line.trim().is_empty() => {}
                None => tracing::warn!(input = %line.trim(), "Unknown command"),
            }
        }
    });
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_commands() {
        assert_eq!(HostCommand::parse(" click\n"), Some(HostCommand::Click));
        assert_eq!(HostCommand::parse("reload"), Some(HostCommand::Reload));
        assert_eq!(HostCommand::parse("exit"), Some(HostCommand::Quit));
        assert_eq!(HostCommand::parse("dance"), None);
    }

    #[tokio::test]
    async fn timers_fire_after_delay() {
        let (mut timers, mut rx) = TokioTimers::channel();
        timers.schedule(Duration::from_millis(20), TimerEvent::LocatorRetry { epoch: 3 });
        timers.schedule(Duration::from_millis(1), TimerEvent::PhaseSettled { epoch: 3 });

        assert_eq!(rx.recv().await, Some(TimerEvent::PhaseSettled { epoch: 3 }));
        assert_eq!(rx.recv().await, Some(TimerEvent::LocatorRetry { epoch: 3 }));
    }
}
