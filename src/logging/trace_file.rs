use std::{fs::File, path::Path, sync::Mutex};

use anyhow::{Context, Error};
use tracing::Subscriber;
use tracing_subscriber::{fmt::format::FmtSpan, registry::LookupSpan, Layer};

use osutils::files;

/// A layer writing closed spans and events as JSON lines to `path`, with the
/// time each span took.
pub fn layer<S>(path: impl AsRef<Path>) -> Result<impl Layer<S>, Error>
where
    S: Subscriber + for<'a> LookupSpan<'a>,
{
    let file: File = files::create_file(path.as_ref()).context("Failed to create trace file")?;

    Ok(tracing_subscriber::fmt::layer()
        .json()
        .with_span_events(FmtSpan::CLOSE)
        .with_span_list(false)
        .with_writer(Mutex::new(file)))
}
