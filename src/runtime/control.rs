use tracing::info;

use crate::config::Settings;
use crate::controller::Controller;
use crate::remote::MprisRemote;
use crate::schedule::CancelToken;

use super::timing_store;

/// Playback mode state machine against the configured MPRIS player.
pub fn run(settings: &Settings, token: CancelToken) -> anyhow::Result<()> {
    let bus_name = &settings.controller.player_bus_name;
    let remote = MprisRemote::connect(bus_name)?;
    info!(player = %bus_name, "controlling player");

    Controller::new(remote, timing_store(settings), &settings.controller).run(&token);
    Ok(())
}
