pub mod cli;
pub mod color;
pub mod commands;
pub mod config;
pub mod datetime;
pub mod drag;
pub mod event;
pub mod filter;
pub mod geometry;
pub mod gesture;
pub mod layout;
pub mod overlap;
pub mod recurrence;
pub mod render;
pub mod source;
pub mod state;
pub mod view;

use std::ffi::OsString;

use anyhow::Context;
use clap::Parser;
use tracing::{
  debug,
  info
};

#[tracing::instrument(skip_all)]
pub fn run(
  raw_args: Vec<OsString>
) -> anyhow::Result<()> {
  let pre =
    cli::preprocess_args(&raw_args)?;
  let cli = cli::GlobalCli::parse_from(
    pre.cleaned_args
  );

  cli::init_tracing(
    cli.verbose,
    cli.quiet
  )?;

  info!(
    verbose = cli.verbose,
    quiet = cli.quiet,
    "starting calgrid"
  );
  debug!(?pre.rc_overrides, "preprocessed rc overrides");

  let mut cfg =
    config::CalendarConfig::load(
      cli.config.as_deref()
    )?;
  cfg.apply_overrides(
    pre.rc_overrides.into_iter().chain(
      cli
        .rc_overrides
        .into_iter()
        .map(|kv| (kv.key, kv.value))
    )
  )?;

  let today = cfg.today();
  let mut session =
    state::CalendarSession::new(
      cfg.clone(),
      today
    );

  if let Some(path) = cli.events {
    let mut data =
      source::load_calendar(&path)
        .with_context(|| {
          format!(
            "failed to load events from \
             {}",
            path.display()
          )
        })?;
    let filled =
      source::fill_default_duration(
        &mut data.events,
        cfg.default_duration
      );
    debug!(
      filled,
      "applied default duration"
    );
    session.set_events(data.events);
    session.set_projects(data.projects);
  }

  if let Some(expr) = cli.date {
    let focus = datetime::parse_date_expr(
      &expr, today
    )
    .context("invalid --date")?;
    session.set_current_date(focus);
  }

  let mut renderer =
    render::Renderer::stdout(&cfg);
  let mut inv = commands::Invocation {
    session,
    renderer: &mut renderer,
    today,
    json: cli.json
  };

  commands::dispatch(
    &mut inv,
    cli.command.unwrap_or(
      cli::Command::View {
        view: None
      }
    )
  )?;

  info!("done");
  Ok(())
}
