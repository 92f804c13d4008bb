use anyhow::Result;
use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;

use crate::comm::friends::FriendPatch;
use crate::commands::{self, CommandReport};
use crate::commands::friends::FriendsAction;
use crate::commands::show::ShowOptions;
use crate::commands::watch::WatchOptions;
use crate::error::code_for;

#[derive(Parser)]
#[command(name = "commlog")]
#[command(about = "Capture, deduplicate and persist a chat feed transcript")]
#[command(version)]
struct Cli {
    /// Print the command report as JSON
    #[arg(long, global = true)]
    json: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run one synchronization pass over the feed snapshot
    Sync {
        /// Feed snapshot file (defaults to the configured feed path)
        #[arg(long)]
        feed: Option<PathBuf>,
    },

    /// Follow the feed snapshot and sync on every change
    Watch {
        /// Run a single pass and print the new lines
        #[arg(long, conflicts_with = "daemon")]
        once: bool,

        /// Hold the daemon lock and loop until stopped (the default)
        #[arg(long)]
        daemon: bool,

        #[arg(long)]
        feed: Option<PathBuf>,
    },

    /// Stop a running watcher daemon
    Stop,

    /// Print the stored transcript with friend and mention markers
    Show {
        /// Only the most recent N messages
        #[arg(long)]
        limit: Option<usize>,

        /// Name used for mention detection
        #[arg(long)]
        me: Option<String>,
    },

    /// Write the transcript to a CSV file
    Export {
        /// Output directory (defaults to the exports dir)
        #[arg(long)]
        out: Option<PathBuf>,
    },

    /// Remove the transcript and stored history
    Clear,

    /// Manage the friend registry
    Friends {
        #[command(subcommand)]
        command: FriendsCommands,
    },

    /// Run a chat-input line through the local commands (/help, /friend, ...)
    Cmd {
        text: String,
    },

    /// Show paths, counts and daemon state
    Status,
}

#[derive(Args)]
struct ColorArgs {
    /// Name color as #RRGGBB
    #[arg(long)]
    name_color: Option<String>,

    /// Message color as #RRGGBB
    #[arg(long)]
    msg_color: Option<String>,
}

#[derive(Subcommand)]
enum FriendsCommands {
    /// List friends
    List,

    /// Add a friend
    Add {
        name: String,

        #[command(flatten)]
        colors: ColorArgs,
    },

    /// Remove a friend
    Remove {
        name: String,
    },

    /// Change a friend's display name or colors
    Update {
        key: String,

        /// New display name
        #[arg(long)]
        name: Option<String>,

        #[command(flatten)]
        colors: ColorArgs,
    },
}

impl FriendsCommands {
    fn into_action(self) -> FriendsAction {
        match self {
            Self::List => FriendsAction::List,
            Self::Add { name, colors } => FriendsAction::Add {
                name,
                patch: FriendPatch {
                    name: None,
                    name_color: colors.name_color,
                    msg_color: colors.msg_color,
                },
            },
            Self::Remove { name } => FriendsAction::Remove { name },
            Self::Update { key, name, colors } => FriendsAction::Update {
                key,
                patch: FriendPatch {
                    name,
                    name_color: colors.name_color,
                    msg_color: colors.msg_color,
                },
            },
        }
    }
}

fn print_report(report: &CommandReport, json: bool) -> Result<()> {
    if json {
        println!("{}", serde_json::to_string_pretty(report)?);
        return Ok(());
    }

    println!(
        "{}: {}",
        report.command,
        if report.ok { "ok" } else { "failed" }
    );
    for line in &report.details {
        println!("{line}");
    }
    for issue in &report.issues {
        println!("issue: {issue}");
    }
    Ok(())
}

fn dispatch(command: Commands) -> Result<CommandReport> {
    match command {
        Commands::Sync { feed } => commands::sync::run(feed.as_deref()),
        Commands::Watch { once, daemon: _, feed } => commands::watch::run(&WatchOptions {
            once,
            feed: feed.as_deref(),
        }),
        Commands::Stop => commands::stop::run(),
        Commands::Show { limit, me } => commands::show::run(&ShowOptions { limit, me }),
        Commands::Export { out } => commands::export::run(out.as_deref()),
        Commands::Clear => commands::clear::run(),
        Commands::Friends { command } => commands::friends::run(&command.into_action()),
        Commands::Cmd { text } => commands::cmd::run(&text),
        Commands::Status => commands::status::run(),
    }
}

pub fn run() -> Result<()> {
    let cli = Cli::parse();
    let report = match dispatch(cli.command) {
        Ok(report) => report,
        Err(err) => match code_for(&err) {
            Some(code) => return Err(err.context(code.as_str())),
            None => return Err(err),
        },
    };

    print_report(&report, cli.json)?;
    if !report.ok {
        std::process::exit(1);
    }
    Ok(())
}
