use chrono::{Datelike, NaiveDate};
use in_out_regime::utils::init_from_config;
use in_out_regime::{Config, HostEvent, InOutEngine, SessionContext, SessionDriver, SyntheticMarket};
use tracing::info;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenv::dotenv().ok();
    let config = Config::load()?;
    init_from_config(&config.logging)?;

    info!("Starting In/Out Regime - Paper Trading Mode");
    info!("============================================");

    let sessions: usize = std::env::var("PAPER_SESSIONS")
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(504);
    let seed: u64 = std::env::var("PAPER_SEED")
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(7);

    let engine = InOutEngine::new(&config)?;
    let (driver, event_tx, mut outcome_rx) = SessionDriver::new(engine);
    let driver_handle = tokio::spawn(driver.run());

    // Synthetic feed standing in for a live data source
    let instruments = config.universe.all_instruments();
    let feed_handle = tokio::spawn(async move {
        let start = NaiveDate::from_ymd_opt(2020, 1, 1).unwrap_or(NaiveDate::MIN);
        let market = SyntheticMarket::new(instruments, seed).generate(start, sessions);

        for (i, session) in market.iter().enumerate() {
            for bar in &session.bars {
                if event_tx.send(HostEvent::Bar(bar.clone())).is_err() {
                    return;
                }
            }
            let week_end = market
                .get(i + 1)
                .map_or(true, |next| next.date.iso_week() != session.date.iso_week());
            if event_tx.send(HostEvent::Session(SessionContext::new(session.date, week_end))).is_err() {
                return;
            }
        }
        let _ = event_tx.send(HostEvent::Shutdown);
    });

    info!("System initialized. Streaming sessions...");

    let mut submitted = 0usize;
    while let Some(outcome) = outcome_rx.recv().await {
        let d = &outcome.diagnostics;
        if outcome.regime.exited() || outcome.regime.entered() {
            info!(
                session = d.session,
                date = %d.date,
                in_market = d.in_market,
                extremes = ?d.extreme_keys,
                cooldown = d.effective_cooldown,
                "regime change"
            );
        }
        if outcome.submit {
            submitted += 1;
            info!(session = d.session, plan = ?outcome.plan, "plan submitted");
        }
    }

    feed_handle.await?;
    let engine = driver_handle.await?;
    let state = engine.regime_state();
    info!(
        sessions = state.session_counter,
        in_market = state.in_market,
        last_exit = state.last_exit_session,
        submitted,
        "paper session complete"
    );

    Ok(())
}
