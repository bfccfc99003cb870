//! Channel list command handler.

use tabled::Tabled;

use kodilink_core::browse::{ChannelListItem, ProgramListItem};
use kodilink_core::{BrowseModel, Command, CommandResult, Controller};

use crate::cli::{ChannelsArgs, GlobalOpts};
use crate::commands::util;
use crate::error::CliError;
use crate::output;

// ── Table rows ──────────────────────────────────────────────────────

#[derive(Tabled)]
struct ChannelRow {
    #[tabled(rename = "ID")]
    id: u32,
    #[tabled(rename = "Number")]
    number: u32,
    #[tabled(rename = "Name")]
    title: String,
    #[tabled(rename = "Logo")]
    image: String,
}

impl From<&ChannelListItem> for ChannelRow {
    fn from(c: &ChannelListItem) -> Self {
        Self {
            id: c.channel_id,
            number: c.number,
            title: c.title.clone(),
            image: c.image_url.clone(),
        }
    }
}

#[derive(Tabled)]
struct ProgramRow {
    #[tabled(rename = "Program")]
    title: String,
    #[tabled(rename = "Episode")]
    subtitle: String,
}

impl From<&ProgramListItem> for ProgramRow {
    fn from(p: &ProgramListItem) -> Self {
        Self {
            title: p.title.clone(),
            subtitle: p.subtitle.clone().unwrap_or_default(),
        }
    }
}

// ── Handler ─────────────────────────────────────────────────────────

pub async fn handle(
    controller: &Controller,
    args: ChannelsArgs,
    global: &GlobalOpts,
) -> Result<(), CliError> {
    let cmd = match args.programs {
        Some(channel_id) => Command::ShowChannelPrograms { channel_id },
        None => Command::ShowChannelList(args.group.into()),
    };
    let result = util::connect_and_execute(controller, cmd).await?;
    let CommandResult::Browse(model) = &result else {
        return Err(util::unexpected(&result));
    };

    let out = match model.as_ref() {
        BrowseModel::Channels(list) => output::render_list(
            &global.output,
            &list.items,
            |c| ChannelRow::from(c),
            |c| c.channel_id.to_string(),
        )?,
        BrowseModel::Programs(list) => output::render_list(
            &global.output,
            &list.items,
            |p| ProgramRow::from(p),
            |p| p.title.clone(),
        )?,
        BrowseModel::Epg(_) => return Err(util::unexpected(&result)),
    };
    output::print_output(&out, global.quiet);
    Ok(())
}
