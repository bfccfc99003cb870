//! Program guide command handler.

use serde::Serialize;
use tabled::Tabled;

use kodilink_core::{BrowseModel, Command, CommandResult, Controller, EpgGridModel, EpgScope};

use crate::cli::{EpgArgs, GlobalOpts};
use crate::commands::util;
use crate::error::CliError;
use crate::output;

// ── Table row ───────────────────────────────────────────────────────

#[derive(Debug, Serialize)]
struct ProgramRow {
    channel: String,
    start: i64,
    stop: i64,
    title: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    subtitle: Option<String>,
}

#[derive(Tabled)]
struct ProgramTableRow {
    #[tabled(rename = "Channel")]
    channel: String,
    #[tabled(rename = "Start")]
    start: String,
    #[tabled(rename = "Stop")]
    stop: String,
    #[tabled(rename = "Title")]
    title: String,
}

impl From<&ProgramRow> for ProgramTableRow {
    fn from(r: &ProgramRow) -> Self {
        Self {
            channel: r.channel.clone(),
            start: util::local_time(r.start),
            stop: util::local_time(r.stop),
            title: r.title.clone(),
        }
    }
}

fn program_rows(grid: &EpgGridModel) -> Vec<ProgramRow> {
    let mut rows: Vec<ProgramRow> = grid
        .programs()
        .map(|item| ProgramRow {
            channel: grid.row_label(item.y).unwrap_or_default().to_owned(),
            start: grid.start_of(item),
            stop: grid.stop_of(item),
            title: item.title.clone(),
            subtitle: item.subtitle.clone(),
        })
        .collect();
    rows.sort_by(|a, b| a.channel.cmp(&b.channel).then(a.start.cmp(&b.start)));
    rows
}

// ── Handler ─────────────────────────────────────────────────────────

pub async fn handle(
    controller: &Controller,
    args: EpgArgs,
    global: &GlobalOpts,
) -> Result<(), CliError> {
    controller.connect().await?;
    let fetched = controller.run_epg_pass().await?;
    tracing::debug!(fetched, "EPG pass complete");

    let scope = args.channel.map_or(EpgScope::All, EpgScope::Channel);
    let result = controller.execute(Command::ShowEpg(scope)).await?;
    let CommandResult::Browse(model) = &result else {
        return Err(util::unexpected(&result));
    };
    let BrowseModel::Epg(grid) = model.as_ref() else {
        return Err(util::unexpected(&result));
    };

    let out = if args.grid {
        output::render_single(
            &global.output,
            grid,
            |g| {
                g.items
                    .iter()
                    .map(|i| format!("{:>6} {:>3} {:>5}  {}", i.x, i.y, i.width, i.title))
                    .collect::<Vec<_>>()
                    .join("\n")
            },
            |g| g.starts_at.to_string(),
        )?
    } else {
        let rows = program_rows(grid);
        output::render_list(&global.output, &rows, |r| ProgramTableRow::from(r), |r| {
            r.title.clone()
        })?
    };
    output::print_output(&out, global.quiet);
    Ok(())
}
