use crate::data::{DailyCloseLog, PriceBar};
use crate::strategy::engine::{InOutEngine, SessionContext, SessionOutcome};
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

/// Events the host delivers to the driver, in arrival order
#[derive(Debug, Clone)]
pub enum HostEvent {
    /// A (possibly intraday) close; only updates history
    Bar(PriceBar),
    /// Run the pipeline for one session
    Session(SessionContext),
    Shutdown,
}

/// Single owner of the engine. Bars and session triggers are drained from
/// one queue so a session never observes a half-applied bar batch.
pub struct SessionDriver {
    engine: InOutEngine,
    closes: DailyCloseLog,
    event_rx: mpsc::UnboundedReceiver<HostEvent>,
    outcome_tx: mpsc::UnboundedSender<SessionOutcome>,
}

impl SessionDriver {
    /// Create a driver together with its event sender and outcome receiver
    pub fn new(
        engine: InOutEngine,
    ) -> (Self, mpsc::UnboundedSender<HostEvent>, mpsc::UnboundedReceiver<SessionOutcome>) {
        let (event_tx, event_rx) = mpsc::unbounded_channel();
        let (outcome_tx, outcome_rx) = mpsc::unbounded_channel();
        let closes = DailyCloseLog::new(engine.trailing_lookback());

        let driver = Self {
            engine,
            closes,
            event_rx,
            outcome_tx,
        };
        (driver, event_tx, outcome_rx)
    }

    /// Process events until `Shutdown` or every sender is dropped.
    /// Hands the engine back so the caller can inspect final state.
    /// Use tokio::spawn to run in background.
    pub async fn run(mut self) -> InOutEngine {
        info!("session driver started");

        while let Some(event) = self.event_rx.recv().await {
            match event {
                HostEvent::Bar(bar) => {
                    let outcome = self.engine.on_bar(&bar);
                    self.closes.record(&bar);
                    debug!(instrument = %bar.instrument, date = %bar.date, ?outcome, "bar applied");
                }
                HostEvent::Session(ctx) => {
                    let outcome = self.engine.run_session(&ctx, &self.closes);
                    if self.outcome_tx.send(outcome).is_err() {
                        warn!("outcome receiver dropped; stopping driver");
                        break;
                    }
                }
                HostEvent::Shutdown => {
                    info!("shutdown requested");
                    break;
                }
            }
        }

        info!(sessions = self.engine.regime_state().session_counter, "session driver stopped");
        self.engine
    }
}
