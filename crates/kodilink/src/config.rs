//! CLI configuration: thin wrapper around `kodilink_config` shared types.
//!
//! Re-exports the shared types and adds CLI-specific resolution that
//! respects `GlobalOpts` flag overrides (--kodi, --tvheadend, --timeout).

use std::path::PathBuf;

use kodilink_core::IntegrationConfig;

use crate::cli::GlobalOpts;
use crate::error::CliError;

// ── Re-exports from shared crate ────────────────────────────────────

pub use kodilink_config::{Config, Profile, load_config_from, save_config_to};

// ── CLI-specific helpers ────────────────────────────────────────────

/// Config file in effect: `--config` / `KODILINK_CONFIG`, else the platform path.
pub fn config_file(global: &GlobalOpts) -> PathBuf {
    global
        .config
        .clone()
        .unwrap_or_else(kodilink_config::config_path)
}

pub fn load(global: &GlobalOpts) -> Result<Config, CliError> {
    Ok(load_config_from(&config_file(global))?)
}

/// Resolve the active profile name from CLI flags and config.
pub fn active_profile_name(global: &GlobalOpts, config: &Config) -> String {
    global
        .profile
        .clone()
        .or_else(|| config.default_profile.clone())
        .unwrap_or_else(|| "default".into())
}

/// Build an `IntegrationConfig` from the config file, profile, and CLI overrides.
///
/// Without a matching profile, `--kodi` / `--tvheadend` alone are enough.
pub fn build_integration_config(global: &GlobalOpts) -> Result<IntegrationConfig, CliError> {
    let cfg = load(global)?;
    let profile_name = active_profile_name(global, &cfg);

    let mut profile = match cfg.profiles.get(&profile_name) {
        Some(profile) => profile.clone(),
        None if global.kodi.is_some() || global.tvheadend.is_some() => Profile::default(),
        None if global.profile.is_some() => {
            return Err(cfg.profile(Some(&profile_name)).err().map_or_else(
                || CliError::NoConfig {
                    path: config_file(global).display().to_string(),
                },
                CliError::from,
            ));
        }
        None => {
            return Err(CliError::NoConfig {
                path: config_file(global).display().to_string(),
            });
        }
    };

    apply_overrides(&mut profile, global);
    Ok(kodilink_config::profile_to_integration_config(
        &cfg.defaults,
        &profile,
        &profile_name,
    )?)
}

/// Flag > env > profile.
fn apply_overrides(profile: &mut Profile, global: &GlobalOpts) {
    if let Some(ref kodi) = global.kodi {
        profile.kodiclient_url = Some(kodi.clone());
    }
    if let Some(ref tvh) = global.tvheadend {
        profile.tvheadendclient_url = Some(tvh.clone());
    }
    if global.timeout.is_some() {
        profile.timeout = global.timeout;
    }
}
