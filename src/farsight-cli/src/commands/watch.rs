//! Watch command handler
//!
//! Attaches to the target, runs a session and prints snapshots. When the
//! target exits the session is torn down and the command waits for it to
//! come back.

use super::attach;
use crate::config::Config;

use anyhow::{Context, Result};
use farsight::{Session, SessionSnapshot, Tracked};
use std::thread;
use std::time::Duration;
use tracing::{info, warn};

const REATTACH_DELAY: Duration = Duration::from_secs(2);

/// Handle the Watch command
pub fn handle(config: &Config, interval_ms: u64, json: bool, once: bool) -> Result<()> {
    let layout = config.layout()?;
    let interval = Duration::from_millis(interval_ms.max(1));

    loop {
        let source = match attach(config) {
            Ok(source) => source,
            Err(err) if once => return Err(err),
            Err(err) => {
                info!(error = %format!("{:#}", err), "waiting for target");
                thread::sleep(REATTACH_DELAY);
                continue;
            }
        };

        let mut session = Session::start(source.clone(), layout.clone(), config.session_config())
            .context("Failed to start session")?;

        loop {
            if session.wait_until_lost(interval) {
                warn!(pid = source.pid, "target exited");
                break;
            }
            // Modules map in lazily while the target boots
            if session.context().module_base().is_err() {
                source.refresh_maps()?;
            }

            let snapshot = session.snapshot();
            if json {
                println!("{}", serde_json::to_string(&snapshot)?);
            } else {
                print!("{}", render(&snapshot));
            }
            if once {
                session.shutdown();
                return Ok(());
            }
        }

        session.shutdown();
        if once {
            return Ok(());
        }
        thread::sleep(REATTACH_DELAY);
    }
}

/// Plain-text rendering of a snapshot
fn render(snapshot: &SessionSnapshot) -> String {
    let mut out = format!(
        "== {} players, {} explosives, {} quests ({:.1}s) ==\n",
        snapshot.players.len(),
        snapshot.explosives.len(),
        snapshot.quests.len(),
        snapshot.uptime_ms as f64 / 1000.0
    );

    for player in &snapshot.players {
        let position = player
            .position
            .map(|p| p.to_string())
            .unwrap_or_else(|| "?".to_string());
        let mut flags = String::new();
        if player.is_local {
            flags.push_str(" [you]");
        }
        if !player.alive {
            flags.push_str(" [dead]");
        }
        out.push_str(&format!(
            "  {:<6} {:<24} {}{}\n",
            player.side.to_string(),
            player.name,
            position,
            flags
        ));
    }

    for explosive in &snapshot.explosives {
        let kind = if explosive.is_grenade() { "grenade" } else { "tripwire" };
        let position = explosive
            .position()
            .map(|p| p.to_string())
            .unwrap_or_else(|| "?".to_string());
        out.push_str(&format!("  {:<8} {}\n", kind, position));
    }

    let active = snapshot.quests.iter().filter(|q| q.status.is_active()).count();
    if !snapshot.quests.is_empty() {
        out.push_str(&format!("  quests: {} active\n", active));
    }
    out
}
