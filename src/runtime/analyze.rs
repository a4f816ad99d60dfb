use tracing::info;

use crate::analyzer::{AnalyzerOptions, QueueAnalyzer};
use crate::config::Settings;
use crate::pipeline::CommandFetcher;
use crate::remote::MprisRemote;
use crate::schedule::CancelToken;

use super::{cleanup_manager, detector, shutdown_cleanup, timing_store};

/// Chorus timings for the configured MPRIS player's upcoming tracks.
pub fn run(settings: &Settings, token: CancelToken) -> anyhow::Result<()> {
    let bus_name = &settings.controller.player_bus_name;
    let remote = MprisRemote::connect(bus_name)?;
    info!(player = %bus_name, "analyzing player queue");

    let cleanup = cleanup_manager(Vec::new());
    let mut analyzer = QueueAnalyzer::new(
        remote,
        Box::new(CommandFetcher::new(settings.fetch.clone())),
        Box::new(detector(settings)),
        timing_store(settings),
        cleanup.clone(),
        AnalyzerOptions::from_settings(settings),
        &settings.analyzer,
    );
    analyzer.run(&token);

    shutdown_cleanup(settings, &cleanup);
    Ok(())
}
