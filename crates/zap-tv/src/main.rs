mod app;
mod core;
mod input;
mod loader;
mod mpv;
mod overlay;
mod theme;
mod ui;

use tokio::sync::{broadcast, mpsc};

/// What ZapperCore broadcasts to the UI shell.
#[derive(Debug, Clone)]
pub enum BroadcastMessage {
    /// State changed; receivers should fetch a snapshot from StateManager.
    StateUpdated,
    /// Position the menu cursor on this visible-list index.
    ScrollTo(usize),
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let data_dir = zap_proto::platform::data_dir();
    std::fs::create_dir_all(&data_dir)?;

    let log_path = data_dir.join("tvzap.log");
    let log_file = std::fs::OpenOptions::new()
        .create(true)
        .append(true)
        .open(&log_path)?;

    // Allow RUST_LOG override; suppress connection-level noise from the
    // HTTP client internals by default.
    let log_filter = std::env::var("RUST_LOG")
        .unwrap_or_else(|_| "debug,hyper_util=warn,reqwest=warn,hyper=warn".to_string());
    tracing_subscriber::fmt()
        .with_writer(log_file)
        .with_env_filter(log_filter.as_str())
        .with_ansi(false)
        .init();

    // Print log path to stderr so the operator can tail it immediately.
    eprintln!("tvzap log: {}", log_path.display());
    tracing::info!("tvzap starting…");

    let config = zap_proto::config::Config::load().unwrap_or_default();
    let prefs = zap_proto::prefs::PrefsStore::load(zap_proto::prefs::PrefsStore::default_path());

    // ── Broadcast channel (ZapperCore → UI) ──────────────────────────────────
    let (broadcast_tx, broadcast_rx) = broadcast::channel::<BroadcastMessage>(1024);

    // ── CoreEvent channel (UI / timers / loads → ZapperCore) ─────────────────
    let (event_tx, event_rx) = mpsc::channel::<core::CoreEvent>(1024);

    // Optional playlist source on the command line; it becomes the
    // persisted source after the first successful load kicks off.
    let initial_source = std::env::args().nth(1);

    let zapper_core = core::ZapperCore::new(
        config,
        prefs,
        initial_source,
        broadcast_tx.clone(),
        event_tx.clone(),
    );
    let state_manager = zapper_core.state_manager();

    // Push one StateUpdated so the menu renders before the first load
    // completes.
    let _ = broadcast_tx.send(BroadcastMessage::StateUpdated);

    tokio::spawn(async move {
        if let Err(e) = zapper_core.run(event_rx).await {
            tracing::error!("ZapperCore exited with error: {}", e);
        }
    });

    let app = app::App::new(event_tx, state_manager);
    app.run(broadcast_rx).await?;

    Ok(())
}
