use std::path::Path;
use std::sync::OnceLock;
use tracing_appender::rolling;
use tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt};

// Keeps the non-blocking file writer alive for the process lifetime.
static GUARD: OnceLock<tracing_appender::non_blocking::WorkerGuard> = OnceLock::new();

pub fn init_logger(level: &str, to_file: bool, file_path: &str) {
    let filter = EnvFilter::try_new(level).unwrap_or_else(|_| EnvFilter::new("info"));

    let console_layer = fmt::layer()
        .with_target(false)
        .with_ansi(true)
        .with_writer(std::io::stdout);

    // Optional daily-rolling file layer next to the console one
    let file_layer = to_file.then(|| {
        let path = Path::new(file_path);
        let dir = path.parent().unwrap_or_else(|| Path::new("./logs"));
        let name = path
            .file_name()
            .unwrap_or_else(|| std::ffi::OsStr::new("near-scanner.log"));
        let (non_blocking, guard) = tracing_appender::non_blocking(rolling::daily(dir, name));
        GUARD.set(guard).ok();

        fmt::layer()
            .with_target(false)
            .with_ansi(false)
            .with_writer(non_blocking)
    });

    tracing_subscriber::registry()
        .with(filter)
        .with(console_layer)
        .with(file_layer)
        .init();
}
