use std::path::PathBuf;

use clap::builder::styling::{AnsiColor, Effects, Styles};
use clap::{Args, Parser, Subcommand};

use crate::provision::Focus;

fn cli_styles() -> Styles {
    Styles::styled()
        .header(AnsiColor::BrightCyan.on_default() | Effects::BOLD)
        .usage(AnsiColor::BrightYellow.on_default() | Effects::BOLD)
        .literal(AnsiColor::BrightGreen.on_default() | Effects::BOLD)
        .placeholder(AnsiColor::BrightMagenta.on_default())
}

#[derive(Debug, Parser)]
#[command(name = "mood-lifter")]
#[command(bin_name = "mood-lifter")]
#[command(version)]
#[command(about = "Install and remove mood-lifter hooks and slash commands for Claude Code")]
#[command(styles = cli_styles())]
pub struct Cli {
    #[arg(
        long,
        global = true,
        env = "CLAUDE_CONFIG_DIR",
        help = "User configuration root (defaults to ~/.claude)."
    )]
    pub config_dir: Option<PathBuf>,

    #[arg(
        short = 'v',
        long,
        global = true,
        help = "Print debug diagnostics to stderr."
    )]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Debug, Subcommand)]
pub enum Commands {
    #[command(about = "Copy hooks and commands into place and register the hooks.")]
    Install(InstallArgs),
    #[command(about = "Deregister the hooks and delete installed files.")]
    Uninstall(UninstallArgs),
    #[command(about = "Show what is registered and installed.")]
    Status(StatusArgs),
}

#[derive(Debug, Args)]
pub struct ScopeArgs {
    #[arg(
        short = 'p',
        long,
        value_name = "DIR",
        num_args = 0..=1,
        default_missing_value = ".",
        help = "Target a project's .claude directory instead of the user root (defaults to the current directory)."
    )]
    pub project: Option<PathBuf>,
}

#[derive(Debug, Args)]
#[group(multiple = false)]
pub struct FocusArgs {
    #[arg(long, help = "Only hook scripts and their support files.")]
    pub hooks_only: bool,

    #[arg(long, help = "Only slash command definitions.")]
    pub commands_only: bool,
}

impl FocusArgs {
    pub fn focus(&self) -> Focus {
        if self.hooks_only {
            Focus::HooksOnly
        } else if self.commands_only {
            Focus::CommandsOnly
        } else {
            Focus::All
        }
    }
}

#[derive(Debug, Args)]
pub struct InstallArgs {
    #[command(flatten)]
    pub scope: ScopeArgs,

    #[command(flatten)]
    pub focus: FocusArgs,

    #[arg(
        short = 's',
        long,
        env = "MOOD_LIFTER_SOURCE",
        default_value = ".",
        help = "Source tree holding commands/, hooks/, lib/ and config/."
    )]
    pub source: PathBuf,

    #[arg(long, help = "Skip the ollama availability check.")]
    pub no_ollama: bool,

    #[arg(short = 'n', long, help = "Show what would change without writing.")]
    pub dry_run: bool,
}

#[derive(Debug, Args)]
pub struct UninstallArgs {
    #[command(flatten)]
    pub scope: ScopeArgs,

    #[command(flatten)]
    pub focus: FocusArgs,

    #[arg(
        long,
        help = "Also delete the installed support library and default config."
    )]
    pub complete: bool,

    #[arg(short = 'n', long, help = "Show what would change without writing.")]
    pub dry_run: bool,
}

#[derive(Debug, Args)]
pub struct StatusArgs {
    #[command(flatten)]
    pub scope: ScopeArgs,

    #[arg(long, help = "Skip the ollama availability check.")]
    pub no_ollama: bool,

    #[arg(long, help = "Print the report as JSON.")]
    pub json: bool,
}
