//! Clap derive structures for the `pond` CLI.
//!
//! Defines the complete command tree, global flags, and shared types.

use std::net::Ipv4Addr;
use std::path::PathBuf;

use clap::{Args, Parser, Subcommand, ValueEnum};

// ── Top-Level CLI ────────────────────────────────────────────────────

/// pond -- manage pondlink relay appliances from the command line
#[derive(Debug, Parser)]
#[command(
    name = "pond",
    version,
    about = "Provision and manage pondlink relay appliances",
    long_about = "Provision factory-default relay appliances onto your network,\n\
        monitor their reachability, drive their relays, and track derived\n\
        water usage.",
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
    /// Owner whose devices to operate on
    #[arg(long, env = "POND_OWNER", global = true)]
    pub owner: Option<String>,

    /// Path to the config file (defaults to the platform config dir)
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    /// Output format
    #[arg(
        long,
        short = 'o',
        env = "POND_OUTPUT",
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

    /// Skip confirmation prompts
    #[arg(long, short = 'y', global = true)]
    pub yes: bool,
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
    /// Provision a factory-default appliance onto your network
    #[command(alias = "prov")]
    Provision(ProvisionArgs),

    /// List, inspect, and remove registered devices
    #[command(alias = "dev", alias = "d")]
    Devices(DevicesArgs),

    /// Drive a relay on or off
    Toggle(ToggleArgs),

    /// Show derived water usage for a device
    Usage(UsageArgs),

    /// Run reachability and state sync passes
    #[command(alias = "mon")]
    Monitor(MonitorArgs),

    /// Enable or disable notifications for a device
    Notifications(NotificationsArgs),

    /// Flag or unflag a device as requiring maintenance
    Maintenance(MaintenanceArgs),

    /// Show or initialize configuration
    Config(ConfigArgs),

    /// Generate shell completions
    Completions(CompletionsArgs),
}

// ── Provision ────────────────────────────────────────────────────────

#[derive(Debug, Args)]
pub struct ProvisionArgs {
    /// Label for the installation site (e.g. "North pond")
    #[arg(long, short = 's')]
    pub site: String,

    /// SSID of the network the device should join
    #[arg(long)]
    pub ssid: String,

    /// Passphrase for that network
    #[arg(long, env = "POND_WIFI_PASSPHRASE", hide_env = true)]
    pub passphrase: String,

    /// Base URL of the device on its own AP
    #[arg(long, default_value = "http://192.168.33.1")]
    pub device_ap: String,

    /// This machine's IPv4 address on the home subnet (autodetected
    /// when omitted)
    #[arg(long)]
    pub local_ip: Option<Ipv4Addr>,

    /// Explicit rediscovery candidate (repeatable); skips the sweep
    #[arg(long = "candidate")]
    pub candidates: Vec<Ipv4Addr>,
}

// ── Devices ──────────────────────────────────────────────────────────

#[derive(Debug, Args)]
pub struct DevicesArgs {
    #[command(subcommand)]
    pub command: DevicesCommand,
}

#[derive(Debug, Subcommand)]
pub enum DevicesCommand {
    /// List all registered devices
    #[command(alias = "ls")]
    List,

    /// Show one device in detail
    #[command(alias = "get")]
    Show(DeviceIdArg),

    /// Remove a device from the registry
    #[command(alias = "rm", alias = "delete")]
    Remove(DeviceIdArg),
}

#[derive(Debug, Args)]
pub struct DeviceIdArg {
    /// Record id (see `pond devices list`)
    pub id: String,
}

// ── Toggle ───────────────────────────────────────────────────────────

#[derive(Debug, Args)]
pub struct ToggleArgs {
    /// Record id
    pub id: String,

    /// Actuator: pump, heater, auger, or high-water
    pub actuator: String,

    /// Target state
    #[arg(value_parser = ["on", "off"])]
    pub state: String,
}

// ── Usage ────────────────────────────────────────────────────────────

#[derive(Debug, Args)]
pub struct UsageArgs {
    /// Record id
    pub id: String,

    /// How many days back to show
    #[arg(long, default_value = "7")]
    pub days: u32,
}

// ── Monitor ──────────────────────────────────────────────────────────

#[derive(Debug, Args)]
pub struct MonitorArgs {
    /// Run a single pass and exit instead of looping
    #[arg(long)]
    pub once: bool,
}

// ── Notifications / Maintenance ──────────────────────────────────────

#[derive(Debug, Args)]
pub struct NotificationsArgs {
    /// Record id
    pub id: String,

    /// Target state
    #[arg(value_parser = ["on", "off"])]
    pub state: String,
}

#[derive(Debug, Args)]
pub struct MaintenanceArgs {
    /// Record id
    pub id: String,

    /// Target state
    #[arg(value_parser = ["on", "off"])]
    pub state: String,
}

// ── Config ───────────────────────────────────────────────────────────

#[derive(Debug, Args)]
pub struct ConfigArgs {
    #[command(subcommand)]
    pub command: ConfigCommand,
}

#[derive(Debug, Subcommand)]
pub enum ConfigCommand {
    /// Print the effective configuration
    Show,

    /// Write a starter config file
    Init(ConfigInitArgs),

    /// Print the config file path
    Path,
}

#[derive(Debug, Args)]
pub struct ConfigInitArgs {
    /// Owner to record in the new config
    #[arg(long)]
    pub owner: String,
}

// ── Completions ──────────────────────────────────────────────────────

#[derive(Debug, Args)]
pub struct CompletionsArgs {
    /// Shell to generate completions for
    pub shell: clap_complete::Shell,
}
