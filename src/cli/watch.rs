use super::Session;
use crate::core::config::DisplayOptions;
use anyhow::Result;
use console::Term;
use std::future::Future;
use tokio::time::{MissedTickBehavior, interval};
use tracing::{debug, info};

/// Redraws the report every `options.refresh` until Ctrl-C.
pub async fn run(session: &Session, options: DisplayOptions) -> Result<()> {
    run_until(session, options, async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            debug!("Failed to listen for Ctrl-C: {}", e);
            std::future::pending::<()>().await;
        }
    })
    .await
}

/// Redraw loop that stops as soon as `shutdown` resolves, even mid-cycle.
pub async fn run_until<F>(session: &Session, options: DisplayOptions, shutdown: F) -> Result<()>
where
    F: Future<Output = ()>,
{
    info!(
        refresh_ms = options.refresh.as_millis() as u64,
        kiosk = options.kiosk,
        "Watching {} tickers",
        session.universe().len()
    );

    tokio::select! {
        result = redraw_forever(session, &options) => result,
        _ = shutdown => {
            info!("Interrupted, stopping watch");
            Ok(())
        }
    }
}

async fn redraw_forever(session: &Session, options: &DisplayOptions) -> Result<()> {
    let term = Term::stdout();
    let mut ticker = interval(options.refresh);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

    loop {
        ticker.tick().await;
        let report = session.refresh(false).await;
        let output = session.render(&report, options);
        if term.is_term() {
            term.clear_screen()?;
        }
        term.write_line(&output)?;
        debug!(total = report.portfolio_total, "Redrew dashboard");
    }
}
