use dotenvy::dotenv;
use photo_relay::config::Settings;
use photo_relay::runner::run_relay;
use regex::Regex;
use std::borrow::Cow;
use std::io::{self, Write};
use std::process::ExitCode;
use std::sync::Arc;
use tracing::{error, info};
use tracing_subscriber::fmt::MakeWriter;
use tracing_subscriber::{prelude::*, EnvFilter};

/// Masks account credentials in log output before it reaches stderr
///
/// MTProto errors can echo request fields, and a leaked session string is a
/// full account takeover.
struct Redactor {
    api_hash: Regex,
    session: Regex,
}

impl Redactor {
    fn new() -> Result<Self, regex::Error> {
        Ok(Self {
            api_hash: Regex::new(r"\b[0-9a-f]{32}\b")?,
            // Serialized sessions run to hundreds of base64 characters
            session: Regex::new(r"[A-Za-z0-9+/_-]{200,}={0,2}")?,
        })
    }

    fn redact<'a>(&self, line: &'a str) -> Cow<'a, str> {
        match self.session.replace_all(line, "[STRING_SESSION]") {
            Cow::Borrowed(line) => self.api_hash.replace_all(line, "[API_HASH]"),
            Cow::Owned(line) => {
                Cow::Owned(self.api_hash.replace_all(&line, "[API_HASH]").into_owned())
            }
        }
    }
}

/// One formatted log event on its way to stderr
struct RedactedStderr<'a> {
    redactor: &'a Redactor,
}

impl Write for RedactedStderr<'_> {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        let line = String::from_utf8_lossy(buf);
        io::stderr().write_all(self.redactor.redact(&line).as_bytes())?;
        // The caller tracks its own bytes, not ours
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        io::stderr().flush()
    }
}

impl<'a> MakeWriter<'a> for Redactor {
    type Writer = RedactedStderr<'a>;

    fn make_writer(&'a self) -> Self::Writer {
        RedactedStderr { redactor: self }
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<ExitCode> {
    dotenv().ok();

    let redactor = Redactor::new().map_err(|e| {
        eprintln!("Failed to compile regex patterns: {e}");
        e
    })?;
    init_logging(redactor);

    info!("Starting photo relay...");

    let settings = init_settings();

    Ok(run_relay(settings).await)
}

fn init_logging(redactor: Redactor) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer().with_writer(redactor))
        .init();
}

fn init_settings() -> Arc<Settings> {
    match Settings::new() {
        Ok(s) => {
            info!("Configuration loaded successfully.");
            Arc::new(s)
        }
        Err(e) => {
            error!("Failed to load configuration: {}", e);
            std::process::exit(1);
        }
    }
}
