//! Clap derive structures for the `kodilink` CLI.
//!
//! Defines the command tree, global flags, and shared types.

use std::path::PathBuf;

use clap::{Args, Parser, Subcommand, ValueEnum};

// ── Top-Level CLI ────────────────────────────────────────────────────

/// kodilink -- drive a Kodi media player and its TVHeadend program guide
#[derive(Debug, Parser)]
#[command(
    name = "kodilink",
    version,
    about = "Control Kodi and browse the TVHeadend program guide from the command line",
    long_about = "Connects to a Kodi JSON-RPC web server and, optionally, a TVHeadend\n\
        server. Follows what Kodi is playing, maps Kodi channels onto TVHeadend\n\
        channels and renders the electronic program guide.",
    propagate_version = true,
    subcommand_required = true,
    arg_required_else_help = true
)]
pub struct Cli {
    #[command(flatten)]
    pub global: GlobalOpts,

    #[command(subcommand)]
    pub command: Command,
}

// ── Global Options ───────────────────────────────────────────────────

#[derive(Debug, Args)]
pub struct GlobalOpts {
    /// Profile to use
    #[arg(long, short = 'p', env = "KODILINK_PROFILE", global = true)]
    pub profile: Option<String>,

    /// Config file (defaults to the platform config directory)
    #[arg(long, env = "KODILINK_CONFIG", global = true)]
    pub config: Option<PathBuf>,

    /// Kodi web server URL (overrides profile)
    #[arg(long, env = "KODILINK_KODI_URL", global = true)]
    pub kodi: Option<String>,

    /// TVHeadend URL (overrides profile)
    #[arg(long, env = "KODILINK_TVHEADEND_URL", global = true)]
    pub tvheadend: Option<String>,

    /// Output format
    #[arg(
        long,
        short = 'o',
        env = "KODILINK_OUTPUT",
        default_value = "table",
        global = true
    )]
    pub output: OutputFormat,

    /// When to use color output
    #[arg(long, default_value = "auto", global = true)]
    pub color: ColorMode,

    /// Increase verbosity (-v, -vv, -vvv)
    #[arg(long, short = 'v', action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Suppress non-error output
    #[arg(long, short = 'q', global = true)]
    pub quiet: bool,

    /// Request timeout in seconds (overrides profile)
    #[arg(long, env = "KODILINK_TIMEOUT", global = true)]
    pub timeout: Option<u64>,
}

// ── Output & Color Enums ─────────────────────────────────────────────

#[derive(Debug, Clone, ValueEnum)]
pub enum OutputFormat {
    /// Pretty table (default, interactive)
    Table,
    /// Pretty-printed JSON
    Json,
    /// Compact single-line JSON
    JsonCompact,
    /// YAML
    Yaml,
    /// Plain text, one value per line (scripting)
    Plain,
}

#[derive(Debug, Clone, ValueEnum)]
pub enum ColorMode {
    /// Auto-detect (color if terminal is interactive)
    Auto,
    /// Always emit color codes
    Always,
    /// Never emit color codes
    Never,
}

// ── Top-Level Command Enum ───────────────────────────────────────────

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Follow the player and backend status until interrupted
    #[command(alias = "w")]
    Watch(WatchArgs),

    /// Show or rebuild the Kodi/TVHeadend channel mapping
    #[command(alias = "map")]
    Mapping(MappingArgs),

    /// Load and show the program guide
    Epg(EpgArgs),

    /// List Kodi channels or one channel's programs
    #[command(alias = "ch")]
    Channels(ChannelsArgs),

    /// Switch Kodi to a PVR channel
    Play(PlayArgs),

    /// Send a playback or navigation key to Kodi
    Control(ControlArgs),

    /// Set Kodi's volume
    Volume(VolumeArgs),

    /// Manage CLI configuration and profiles
    Config(ConfigArgs),

    /// Generate shell completions
    Completions(CompletionsArgs),
}

// ── Watch ────────────────────────────────────────────────────────────

#[derive(Debug, Args)]
pub struct WatchArgs {
    /// Stop after this many seconds (runs until Ctrl-C otherwise)
    #[arg(long, short = 'd')]
    pub duration: Option<u64>,
}

// ── Mapping ──────────────────────────────────────────────────────────

#[derive(Debug, Args)]
pub struct MappingArgs {
    #[command(subcommand)]
    pub command: MappingCommand,
}

#[derive(Debug, Subcommand)]
pub enum MappingCommand {
    /// Show the channel mapping (cached or freshly built)
    Show {
        /// Channel group
        #[arg(long, short = 'g', default_value = "tv")]
        group: GroupArg,
    },

    /// Discard the cached mapping and join Kodi against TVHeadend again
    Rebuild,

    /// Print the mapping cache file path
    Path,
}

#[derive(Debug, Clone, Copy, ValueEnum)]
pub enum GroupArg {
    Tv,
    Radio,
}

// ── EPG ──────────────────────────────────────────────────────────────

#[derive(Debug, Args)]
pub struct EpgArgs {
    /// Only this Kodi channel number
    #[arg(long, short = 'c')]
    pub channel: Option<u32>,

    /// Emit the raw grid model (positions, colors) instead of program rows
    #[arg(long)]
    pub grid: bool,
}

// ── Channels ─────────────────────────────────────────────────────────

#[derive(Debug, Args)]
pub struct ChannelsArgs {
    /// Channel group
    #[arg(long, short = 'g', default_value = "tv")]
    pub group: GroupArg,

    /// Show the program list of this Kodi channel id
    #[arg(long)]
    pub programs: Option<u32>,
}

// ── Playback ─────────────────────────────────────────────────────────

#[derive(Debug, Args)]
pub struct PlayArgs {
    /// Kodi channel id (see `kodilink channels`)
    pub channel_id: u32,
}

#[derive(Debug, Args)]
pub struct ControlArgs {
    pub action: ControlAction,
}

#[derive(Debug, Clone, Copy, ValueEnum)]
pub enum ControlAction {
    PlayPause,
    Stop,
    Next,
    Previous,
    ChannelUp,
    ChannelDown,
    Up,
    Down,
    Left,
    Right,
    Ok,
    Back,
    Menu,
}

#[derive(Debug, Args)]
pub struct VolumeArgs {
    /// 0-100
    #[arg(value_parser = clap::value_parser!(u8).range(0..=100))]
    pub level: u8,
}

// ── Config ───────────────────────────────────────────────────────────

#[derive(Debug, Args)]
pub struct ConfigArgs {
    #[command(subcommand)]
    pub command: ConfigCommand,
}

#[derive(Debug, Subcommand)]
pub enum ConfigCommand {
    /// Write a profile to the config file
    Init(ConfigInitArgs),

    /// Show the current configuration (passwords masked)
    Show,

    /// Print the config file path
    Path,

    /// List profiles
    Profiles,
}

#[derive(Debug, Args)]
pub struct ConfigInitArgs {
    /// Profile name
    #[arg(long, default_value = "default")]
    pub name: String,

    /// Kodi host or URL
    #[arg(long)]
    pub kodi_host: Option<String>,

    /// Kodi web server port
    #[arg(long)]
    pub kodi_port: Option<u16>,

    /// Kodi user
    #[arg(long)]
    pub kodi_user: Option<String>,

    /// Environment variable holding the Kodi password
    #[arg(long)]
    pub kodi_password_env: Option<String>,

    /// TVHeadend host or URL
    #[arg(long)]
    pub tvheadend_host: Option<String>,

    /// TVHeadend port
    #[arg(long)]
    pub tvheadend_port: Option<u16>,

    /// Comma-separated Kodi channel numbers for the EPG
    #[arg(long)]
    pub epg_channels: Option<String>,

    /// Replace an existing profile of the same name
    #[arg(long)]
    pub force: bool,
}

// ── Completions ──────────────────────────────────────────────────────

#[derive(Debug, Args)]
pub struct CompletionsArgs {
    /// Target shell
    pub shell: clap_complete::Shell,
}
