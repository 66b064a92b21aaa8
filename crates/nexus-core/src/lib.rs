pub mod board;
pub mod card;
pub mod cli;
pub mod commands;
pub mod config;
pub mod demo;
pub mod persistence;
pub mod render;
pub mod stats;
pub mod store;

use std::ffi::OsString;

use anyhow::Context;
use clap::Parser;
use tracing::{
  debug,
  info,
  warn
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
    "starting nexus CLI"
  );
  debug!(?pre.rc_overrides, "preprocessed rc overrides");

  let mut cfg = config::Config::load(
    cli.nexusrc.as_deref()
  )?;
  cfg.apply_overrides(
    pre.rc_overrides.into_iter().chain(
      cli
        .rc_overrides
        .into_iter()
        .map(|kv| (kv.key, kv.value))
    )
  );

  let data_dir =
    config::resolve_data_dir(
      &cfg,
      cli.data.as_deref()
    )
    .context(
      "failed to resolve data \
       directory"
    )?;

  let persistence =
    persistence::JsonFilePersistence::open(
      &data_dir
    )
    .with_context(|| {
      format!(
        "failed to open card file in \
         {}",
        data_dir.display()
      )
    })?;

  let store = store::Store::new();
  if let Some(theme) = cfg.get("theme")
    && !store.set_theme(theme)
  {
    warn!(theme = %theme, "ignoring configured theme");
  }

  let board_cfg =
    board::BoardConfig::from_config(
      &cfg
    )
    .context(
      "invalid board configuration"
    )?;
  let board = board::CardBoard::new(
    store.clone(),
    board_cfg
  )?
  .with_persistence(Box::new(
    persistence
  ));
  if !board.load() {
    warn!(
      "card file unreadable; only \
       list, stats and show will run"
    );
  }

  let mut renderer =
    render::Renderer::new(&cfg)?;
  let command =
    cli.command.unwrap_or(
      cli::Command::List {
        horizon: card::Horizon::ALL
          .to_string()
      }
    );

  commands::dispatch(
    &board,
    &mut renderer,
    command
  )?;

  store.dispose();
  info!("done");
  Ok(())
}
