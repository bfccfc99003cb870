//! Channel mapping command handlers.

use serde::Serialize;
use tabled::Tabled;

use kodilink_core::{ChannelGroup, Controller};

use crate::cli::{GlobalOpts, MappingArgs, MappingCommand};
use crate::error::CliError;
use crate::output;

// ── Table row ───────────────────────────────────────────────────────

#[derive(Debug, Clone, Serialize, Tabled)]
struct MappingRow {
    #[tabled(rename = "Number")]
    number: u32,
    #[tabled(rename = "Channel")]
    label: String,
    #[tabled(rename = "TVHeadend UUID")]
    uuid: String,
}

async fn mapping_rows(controller: &Controller, group: ChannelGroup) -> Vec<MappingRow> {
    let channels = controller.channels(group).await;
    controller
        .mapping(group)
        .await
        .iter()
        .map(|(number, uuid)| MappingRow {
            number,
            label: channels
                .iter()
                .find(|ch| ch.kodi_channel_number == number)
                .map(|ch| ch.label.clone())
                .unwrap_or_default(),
            uuid: uuid.to_owned(),
        })
        .collect()
}

// ── Handler ─────────────────────────────────────────────────────────

pub async fn handle(
    controller: &Controller,
    args: MappingArgs,
    global: &GlobalOpts,
) -> Result<(), CliError> {
    match args.command {
        MappingCommand::Show { group } => {
            controller.connect().await?;
            let rows = mapping_rows(controller, group.into()).await;
            let out = output::render_list(&global.output, &rows, MappingRow::clone, |r| r.uuid.clone())?;
            output::print_output(&out, global.quiet);
            Ok(())
        }

        MappingCommand::Rebuild => {
            if let Some(store) = controller.mapping_store() {
                store.clear()?;
            }
            controller.connect().await?;
            let tv = controller.mapping(ChannelGroup::Tv).await.len();
            let radio = controller.mapping(ChannelGroup::Radio).await.len();
            if !global.quiet {
                eprintln!("Mapped {tv} TV and {radio} radio channel(s)");
            }
            Ok(())
        }

        MappingCommand::Path => {
            let store = controller.mapping_store().ok_or_else(|| CliError::Config {
                message: "no data directory configured".into(),
            })?;
            output::print_output(&store.path().display().to_string(), global.quiet);
            Ok(())
        }
    }
}
