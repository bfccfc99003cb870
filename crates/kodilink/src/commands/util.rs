//! Shared helpers for command handlers.

use chrono::{DateTime, Local};

use kodilink_core::{ChannelGroup, Command, CommandResult, Controller, CoreError};

use crate::cli::GroupArg;
use crate::error::CliError;

impl From<GroupArg> for ChannelGroup {
    fn from(group: GroupArg) -> Self {
        match group {
            GroupArg::Tv => ChannelGroup::Tv,
            GroupArg::Radio => ChannelGroup::Radio,
        }
    }
}

/// Connect, then run `cmd` through the command processor.
pub async fn connect_and_execute(
    controller: &Controller,
    cmd: Command,
) -> Result<CommandResult, CliError> {
    controller.connect().await?;
    Ok(controller.execute(cmd).await?)
}

/// Local "YYYY-MM-DD HH:MM" for a unix timestamp.
pub fn local_time(epoch: i64) -> String {
    DateTime::from_timestamp(epoch, 0)
        .map(|t| t.with_timezone(&Local).format("%Y-%m-%d %H:%M").to_string())
        .unwrap_or_default()
}

/// Error for a command result of the wrong shape.
pub fn unexpected(result: &CommandResult) -> CliError {
    CoreError::Protocol {
        message: format!("unexpected command result: {result:?}"),
        correlation: None,
    }
    .into()
}
