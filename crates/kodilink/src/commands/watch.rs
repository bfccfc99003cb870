//! `watch`: stream entity updates and backend status changes.

use std::time::Duration;

use tokio::sync::broadcast::error::RecvError;

use kodilink_core::{Backend, BackendStatuses, BrowseModel, BroadcastSink, Controller, EntityEvent};

use crate::cli::{GlobalOpts, OutputFormat, WatchArgs};
use crate::error::CliError;
use crate::output;

fn status_line(statuses: &BackendStatuses, color: bool) -> String {
    [Backend::Kodi, Backend::Tvheadend, Backend::EventSocket]
        .iter()
        .map(|b| format!("{b}: {}", output::paint_status(statuses.get(*b), color)))
        .collect::<Vec<_>>()
        .join("  ")
}

fn event_line(event: &EntityEvent) -> String {
    match event {
        EntityEvent::Attribute { update, .. } => {
            format!("{} = {}", update.attribute, update.value)
        }
        EntityEvent::Browse { model, .. } => match model.as_ref() {
            BrowseModel::Epg(grid) => format!("browse: EPG grid, {} program(s)", grid.programs().count()),
            BrowseModel::Channels(list) => {
                format!("browse: {} channel list, {} item(s)", list.group, list.items.len())
            }
            BrowseModel::Programs(list) => format!(
                "browse: programs of channel {}, {} item(s)",
                list.channel_id,
                list.items.len()
            ),
        },
        EntityEvent::ReconnectPrompt { reason, .. } => format!("reconnect requested: {reason}"),
    }
}

fn render_event(global: &GlobalOpts, event: &EntityEvent) -> Result<String, CliError> {
    match global.output {
        OutputFormat::Json | OutputFormat::JsonCompact => output::render_json_compact(event),
        _ => Ok(event_line(event)),
    }
}

pub async fn handle(
    controller: &Controller,
    sink: &BroadcastSink,
    args: WatchArgs,
    global: &GlobalOpts,
) -> Result<(), CliError> {
    let color = output::should_color(&global.color);
    let mut events = sink.subscribe();
    let mut statuses = controller.statuses();

    controller.connect().await?;
    if !global.quiet {
        eprintln!("{}", status_line(&statuses.borrow_and_update(), color));
    }

    let deadline = tokio::time::sleep(args.duration.map_or(Duration::MAX, Duration::from_secs));
    tokio::pin!(deadline);

    loop {
        tokio::select! {
            biased;
            _ = tokio::signal::ctrl_c() => break,
            () = &mut deadline => break,
            changed = statuses.changed() => {
                if changed.is_err() {
                    break;
                }
                if !global.quiet {
                    eprintln!("{}", status_line(&statuses.borrow_and_update(), color));
                }
            }
            received = events.recv() => match received {
                Ok(event) => {
                    output::print_output(&render_event(global, &event)?, global.quiet);
                    if matches!(event.as_ref(), EntityEvent::ReconnectPrompt { .. }) {
                        return Err(CliError::Disconnected);
                    }
                }
                Err(RecvError::Lagged(skipped)) => {
                    tracing::warn!(skipped, "watch output fell behind");
                }
                Err(RecvError::Closed) => break,
            },
        }
    }
    Ok(())
}
