//! Play, control and volume handlers.

use kodilink_core::{Command, CommandResult, Controller};

use crate::cli::{ControlAction, ControlArgs, GlobalOpts, PlayArgs, VolumeArgs};
use crate::commands::util;
use crate::error::CliError;

impl From<ControlAction> for Command {
    fn from(action: ControlAction) -> Self {
        match action {
            ControlAction::PlayPause => Command::PlayPause,
            ControlAction::Stop => Command::Stop,
            ControlAction::Next => Command::Next,
            ControlAction::Previous => Command::Previous,
            ControlAction::ChannelUp => Command::ChannelUp,
            ControlAction::ChannelDown => Command::ChannelDown,
            ControlAction::Up => Command::Up,
            ControlAction::Down => Command::Down,
            ControlAction::Left => Command::Left,
            ControlAction::Right => Command::Right,
            ControlAction::Ok => Command::Ok,
            ControlAction::Back => Command::Back,
            ControlAction::Menu => Command::Menu,
        }
    }
}

pub async fn play(
    controller: &Controller,
    args: PlayArgs,
    global: &GlobalOpts,
) -> Result<(), CliError> {
    util::connect_and_execute(
        controller,
        Command::PlayChannel {
            channel_id: args.channel_id,
        },
    )
    .await?;
    if !global.quiet {
        eprintln!("Switched to channel {}", args.channel_id);
    }
    Ok(())
}

pub async fn control(
    controller: &Controller,
    args: ControlArgs,
    _global: &GlobalOpts,
) -> Result<(), CliError> {
    util::connect_and_execute(controller, args.action.into()).await?;
    Ok(())
}

pub async fn volume(
    controller: &Controller,
    args: VolumeArgs,
    global: &GlobalOpts,
) -> Result<(), CliError> {
    let result = util::connect_and_execute(controller, Command::SetVolume(args.level)).await?;
    if !global.quiet {
        match result {
            CommandResult::Volume(level) => eprintln!("Volume {level}"),
            other => return Err(util::unexpected(&other)),
        }
    }
    Ok(())
}
