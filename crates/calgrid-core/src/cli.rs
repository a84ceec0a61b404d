use std::ffi::OsString;
use std::io::IsTerminal;
use std::path::PathBuf;

use anyhow::anyhow;
use clap::{ArgAction, Parser, Subcommand};
use tracing::debug;
use tracing_subscriber::EnvFilter;

use crate::view::ViewType;

#[derive(Debug, Clone)]
pub struct PreprocessedArgs {
    pub cleaned_args: Vec<OsString>,
    pub rc_overrides: Vec<(String, String)>,
}

#[derive(Debug, Clone)]
pub struct KeyVal {
    pub key: String,
    pub value: String,
}

impl std::str::FromStr for KeyVal {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (k, v) = s
            .split_once('=')
            .ok_or_else(|| anyhow!("expected KEY=VALUE, got: {s}"))?;
        Ok(Self {
            key: k.trim().to_string(),
            value: v.trim().to_string(),
        })
    }
}

fn parse_view_type(raw: &str) -> Result<ViewType, String> {
    ViewType::from_key(raw).ok_or_else(|| format!("unknown view `{raw}` (expected day, week or month)"))
}

#[derive(Parser, Debug, Clone)]
#[command(
    name = "calgrid",
    version,
    about = "Calendar layout and recurrence engine",
    disable_help_subcommand = true
)]
pub struct GlobalCli {
    #[arg(short = 'v', long = "verbose", action = ArgAction::Count, global = true)]
    pub verbose: u8,

    #[arg(short = 'q', long = "quiet", action = ArgAction::Count, global = true)]
    pub quiet: u8,

    #[arg(
        long = "rc",
        value_parser = clap::builder::ValueParser::new(|s: &str| s.parse::<KeyVal>()),
        action = ArgAction::Append,
        global = true
    )]
    pub rc_overrides: Vec<KeyVal>,

    /// Config file; defaults to $CALGRID_CONFIG or the user config dir.
    #[arg(long = "config", global = true)]
    pub config: Option<PathBuf>,

    /// Events as a JSON array, an {events, projects} object, or JSONL.
    #[arg(long = "events", global = true)]
    pub events: Option<PathBuf>,

    /// Focus date: ISO date, weekday, month name, today, +3d, -1w, ...
    #[arg(long = "date", global = true)]
    pub date: Option<String>,

    #[arg(long = "json", global = true)]
    pub json: bool,

    #[command(subcommand)]
    pub command: Option<Command>,
}

#[derive(Subcommand, Debug, Clone)]
pub enum Command {
    /// Lay out the day, week or month around the focus date.
    View {
        #[arg(value_parser = parse_view_type)]
        view: Option<ViewType>,
    },
    /// List concrete event instances between two dates (inclusive).
    Expand {
        #[arg(long)]
        from: String,
        #[arg(long)]
        to: String,
    },
    /// Time slots of the configured grid.
    Slots,
    /// The 42-day month grid around the focus date.
    Grid,
    /// Drop an event on a day (or a time slot with --at).
    Move {
        id: String,
        #[arg(long = "to")]
        to: String,
        #[arg(long = "at")]
        at: Option<String>,
        /// View the drop happens in; defaults to the configured view.
        #[arg(long = "view", value_parser = parse_view_type)]
        view: Option<ViewType>,
    },
    /// Allocate project colours.
    Colors {
        #[arg(long, default_value_t = 10)]
        count: usize,
    },
    /// Replay gesture signals (JSONL) against a session.
    Gestures { file: PathBuf },
}

pub fn init_tracing(verbose: u8, quiet: u8) -> anyhow::Result<()> {
    let default_level = if quiet >= 2 {
        "error"
    } else if quiet == 1 {
        "warn"
    } else if verbose >= 3 {
        "trace"
    } else if verbose == 2 {
        "debug"
    } else if verbose == 1 {
        "info"
    } else {
        "warn"
    };

    let env_filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(default_level))
        .map_err(|e| anyhow!("invalid RUST_LOG / log filter: {e}"))?;

    let init_result = tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_target(true)
        .with_level(true)
        .with_writer(std::io::stderr)
        .with_ansi(std::io::stderr().is_terminal())
        .try_init();

    if let Err(err) = init_result {
        debug!(error = %err, "tracing subscriber already set, continuing");
    }

    Ok(())
}

/// Pulls positional `rc.key=value` (or `rc.key:value`) tokens out of the
/// argument list.
#[tracing::instrument(skip_all)]
pub fn preprocess_args(raw: &[OsString]) -> anyhow::Result<PreprocessedArgs> {
    let mut cleaned = Vec::with_capacity(raw.len());
    let mut overrides: Vec<(String, String)> = Vec::new();

    let mut iter = raw.iter().cloned();
    if let Some(bin) = iter.next() {
        cleaned.push(bin);
    }

    for arg in iter {
        let s = arg.to_string_lossy();
        if let Some(rest) = s.strip_prefix("rc.") {
            let parsed = rest.split_once('=').or_else(|| rest.split_once(':'));
            if let Some((k, v)) = parsed {
                debug!(key = %k, value = %v, "captured positional rc override");
                overrides.push((k.to_string(), v.to_string()));
                continue;
            }
        }

        cleaned.push(arg);
    }

    Ok(PreprocessedArgs {
        cleaned_args: cleaned,
        rc_overrides: overrides,
    })
}
