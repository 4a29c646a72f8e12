mod app;
mod args;
mod commands;
mod surface;
mod test_pattern;

use std::io;

use anyhow::{Context, Result};
use clap::Parser;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::{EnvFilter, FmtSubscriber};

use crate::{app::App, args::Args};

fn init_tracing(args: &Args) -> Result<Option<WorkerGuard>> {
    let filter = EnvFilter::try_from_default_env().or_else(|_| EnvFilter::try_new(&args.log))?;
    let builder = FmtSubscriber::builder()
        .with_env_filter(filter)
        .with_target(false)
        .with_thread_names(true);

    let Some(path) = &args.log_file else {
        tracing::subscriber::set_global_default(builder.with_writer(io::stderr).finish())?;
        return Ok(None);
    };

    let dir = path
        .parent()
        .filter(|d| !d.as_os_str().is_empty())
        .unwrap_or_else(|| std::path::Path::new("."));
    let name = path
        .file_name()
        .with_context(|| format!("log file {} has no file name", path.display()))?;
    let appender = tracing_appender::rolling::never(dir, name);
    let (writer, guard) = tracing_appender::non_blocking::NonBlockingBuilder::default()
        .lossy(false)
        .finish(appender);
    let subscriber = builder.with_ansi(false).with_writer(writer).finish();
    tracing::subscriber::set_global_default(subscriber)?;
    Ok(Some(guard))
}

fn main() -> Result<()> {
    let args = Args::parse();
    let _guard = init_tracing(&args)?;
    let mut app = App::new(args)?;
    app.run()
}
