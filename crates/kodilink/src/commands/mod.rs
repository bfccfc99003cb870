//! Command dispatch: bridges CLI args -> core Commands -> output formatting.

pub mod channels;
pub mod config_cmd;
pub mod epg;
pub mod mapping;
pub mod playback;
pub mod util;
pub mod watch;

use kodilink_core::{BroadcastSink, Controller};

use crate::cli::{Command, GlobalOpts};
use crate::error::CliError;

/// Dispatch a backend-bound command to the appropriate handler.
///
/// Every handler connects first; the session is torn down again here so
/// background tasks never outlive the command.
pub async fn dispatch(
    cmd: Command,
    controller: &Controller,
    sink: &BroadcastSink,
    global: &GlobalOpts,
) -> Result<(), CliError> {
    let result = match cmd {
        Command::Watch(args) => watch::handle(controller, sink, args, global).await,
        Command::Mapping(args) => mapping::handle(controller, args, global).await,
        Command::Epg(args) => epg::handle(controller, args, global).await,
        Command::Channels(args) => channels::handle(controller, args, global).await,
        Command::Play(args) => playback::play(controller, args, global).await,
        Command::Control(args) => playback::control(controller, args, global).await,
        Command::Volume(args) => playback::volume(controller, args, global).await,
        // Config and Completions are handled before dispatch
        Command::Config(_) | Command::Completions(_) => Ok(()),
    };
    controller.disconnect().await;
    result
}
