pub mod api;
pub mod cli;
pub mod commands;
pub mod config;
pub mod error;
pub mod form;
pub mod notify;
pub mod render;
pub mod session;
pub mod tasks;
pub mod transport;
pub mod view;

use std::ffi::OsString;
use std::sync::Arc;

use anyhow::Context;
use clap::Parser;
use tracing::{
  debug,
  info
};

/// Runs one CLI invocation and
/// returns the process exit code.
#[tracing::instrument(skip_all)]
pub fn run(
  raw_args: Vec<OsString>
) -> anyhow::Result<i32> {
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
    "starting taskmate CLI"
  );
  debug!(?pre.rc_overrides, "preprocessed rc overrides");

  let mut cfg = config::Config::load(
    cli.taskmaterc.as_deref()
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

  let storage =
    session::FileTokenStorage::open(
      &data_dir
    )
    .with_context(|| {
      format!(
        "failed to open session store \
         at {}",
        data_dir.display()
      )
    })?;
  let session = Arc::new(
    session::SessionStore::new(
      Box::new(storage)
    )
  );

  let timeout = cfg.api_timeout()?;
  let transport = Arc::new(
    transport::ReqwestTransport::new(
      timeout
    )?
  );
  let api = Arc::new(
    api::ApiClient::new(
      cfg.api_url(
        cli.api_url.as_deref()
      ),
      transport,
      Arc::clone(&session)
    )
  );

  let tasks = tasks::TaskStore::new(
    Arc::clone(&api)
  );

  let color =
    render::color_enabled(&cfg)?;
  let notifier = Arc::new(
    notify::StderrNotifier::new(color)
  );
  let renderer = Box::new(
    render::TerminalRenderer::stdout(
      color
    )
  );
  let mut controller =
    view::ViewController::new(
      session, api, tasks, notifier,
      renderer
    );

  let inv = cli::Invocation::parse(
    &cfg, cli.rest
  )?;
  let assume_yes = cli.yes
    || !cfg
      .get_bool("confirmation")
      .unwrap_or(true);
  let confirm =
    commands::PromptConfirm::new(
      assume_yes
    );

  let runtime =
    tokio::runtime::Builder::new_current_thread()
      .enable_all()
      .build()
      .context(
        "failed to start async \
         runtime"
      )?;

  let outcome = runtime.block_on(
    commands::dispatch(
      &mut controller,
      &inv,
      &confirm
    )
  )?;

  info!(?outcome, "done");
  Ok(if outcome.is_failed() {
    1
  } else {
    0
  })
}
