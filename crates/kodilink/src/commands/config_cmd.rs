//! Config subcommand handlers.

use std::fmt::Write as _;

use crate::cli::{ConfigArgs, ConfigCommand, ConfigInitArgs, GlobalOpts};
use crate::config::{self, Config, Profile};
use crate::error::CliError;
use crate::output;

// ── Helpers ─────────────────────────────────────────────────────────

/// Format config for display. Expects a redacted config.
fn format_config_redacted(cfg: &Config) -> String {
    let mut out = String::new();

    if let Some(ref default) = cfg.default_profile {
        let _ = writeln!(out, "default_profile = \"{default}\"");
    }
    let d = &cfg.defaults;
    let _ = writeln!(out);
    let _ = writeln!(out, "[defaults]");
    let _ = writeln!(out, "timeout = {}", d.timeout);
    let _ = writeln!(out, "poll_interval = {}", d.poll_interval);
    let _ = writeln!(out, "epg_interval = {}", d.epg_interval);
    let _ = writeln!(out, "epg_ttl = {}", d.epg_ttl);
    let _ = writeln!(out, "epg_page_limit = {}", d.epg_page_limit);
    let _ = writeln!(out, "max_probe_attempts = {}", d.max_probe_attempts);
    let _ = writeln!(out, "liveness_every = {}", d.liveness_every);
    if let Some(ref dir) = d.data_dir {
        let _ = writeln!(out, "data_dir = \"{}\"", dir.display());
    }

    for (name, p) in &cfg.profiles {
        let _ = writeln!(out);
        let _ = writeln!(out, "[profiles.{name}]");
        let _ = writeln!(out, "entity_id = \"{}\"", p.entity_id);
        write_str(&mut out, "kodiclient_url", p.kodiclient_url.as_deref());
        write_num(&mut out, "kodiclient_port", p.kodiclient_port);
        write_str(&mut out, "kodiclient_user", p.kodiclient_user.as_deref());
        write_str(&mut out, "kodiclient_password", p.kodiclient_password.as_deref());
        write_str(&mut out, "kodiclient_password_env", p.kodiclient_password_env.as_deref());
        write_num(&mut out, "kodieventserver_port", p.kodieventserver_port);
        write_str(&mut out, "tvheadendclient_url", p.tvheadendclient_url.as_deref());
        write_num(&mut out, "tvheadendclient_port", p.tvheadendclient_port);
        write_str(&mut out, "tvheadendclient_user", p.tvheadendclient_user.as_deref());
        write_str(&mut out, "tvheadendclient_password", p.tvheadendclient_password.as_deref());
        write_str(
            &mut out,
            "tvheadendclient_password_env",
            p.tvheadendclient_password_env.as_deref(),
        );
        if !p.epgchannels.is_empty() {
            let _ = writeln!(out, "epgchannels = \"{}\"", p.epgchannels);
        }
        write_num(&mut out, "timeout", p.timeout);
        write_num(&mut out, "poll_interval", p.poll_interval);
    }

    out
}

fn write_str(out: &mut String, key: &str, value: Option<&str>) {
    if let Some(v) = value {
        let _ = writeln!(out, "{key} = \"{v}\"");
    }
}

fn write_num<T: std::fmt::Display>(out: &mut String, key: &str, value: Option<T>) {
    if let Some(v) = value {
        let _ = writeln!(out, "{key} = {v}");
    }
}

/// Replace plaintext passwords with a mask.
fn redact(cfg: &mut Config) {
    for p in cfg.profiles.values_mut() {
        for password in [&mut p.kodiclient_password, &mut p.tvheadendclient_password] {
            if password.is_some() {
                *password = Some("****".into());
            }
        }
    }
}

fn profile_from_args(args: &ConfigInitArgs) -> Profile {
    Profile {
        kodiclient_url: args.kodi_host.clone(),
        kodiclient_port: args.kodi_port,
        kodiclient_user: args.kodi_user.clone(),
        kodiclient_password_env: args.kodi_password_env.clone(),
        tvheadendclient_url: args.tvheadend_host.clone(),
        tvheadendclient_port: args.tvheadend_port,
        epgchannels: args.epg_channels.clone().unwrap_or_default(),
        ..Profile::default()
    }
}

// ── Handler ─────────────────────────────────────────────────────────

pub fn handle(args: ConfigArgs, global: &GlobalOpts) -> Result<(), CliError> {
    let path = config::config_file(global);

    match args.command {
        ConfigCommand::Init(init) => {
            let mut cfg = config::load(global)?;
            if cfg.profiles.contains_key(&init.name) && !init.force {
                return Err(CliError::ProfileExists { name: init.name });
            }

            let profile = profile_from_args(&init);
            // Reject what `connect` would reject.
            kodilink_config::profile_to_integration_config(&cfg.defaults, &profile, &init.name)?;

            if cfg.profiles.is_empty() {
                cfg.default_profile = Some(init.name.clone());
            }
            cfg.profiles.insert(init.name.clone(), profile);
            config::save_config_to(&cfg, &path)?;

            if !global.quiet {
                eprintln!("Saved profile '{}' to {}", init.name, path.display());
            }
            Ok(())
        }

        ConfigCommand::Show => {
            let mut cfg = config::load(global)?;
            redact(&mut cfg);
            let out = output::render_single(
                &global.output,
                &cfg,
                format_config_redacted,
                |c| c.profiles.keys().cloned().collect::<Vec<_>>().join("\n"),
            )?;
            output::print_output(&out, global.quiet);
            Ok(())
        }

        ConfigCommand::Path => {
            output::print_output(&path.display().to_string(), global.quiet);
            Ok(())
        }

        ConfigCommand::Profiles => {
            let cfg = config::load(global)?;
            let active = config::active_profile_name(global, &cfg);
            let out = cfg
                .profiles
                .keys()
                .map(|name| {
                    if *name == active {
                        format!("* {name}")
                    } else {
                        format!("  {name}")
                    }
                })
                .collect::<Vec<_>>()
                .join("\n");
            output::print_output(&out, global.quiet);
            Ok(())
        }
    }
}
