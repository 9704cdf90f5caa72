use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

/// Targets that log every request at info or debug. Only their warnings
/// are kept unless `RUST_LOG` says otherwise.
const CHATTY_TARGETS: [&str; 6] = [
    "reqwest",
    "hyper",
    "hyper_util",
    "aws_config",
    "aws_smithy_runtime",
    "aws_sdk_s3",
];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogFormat {
    /// Human readable lines for local runs.
    Compact,
    /// One JSON object per line without timestamps; CloudWatch adds its own.
    Json,
}

/// Filter used when `RUST_LOG` is unset.
pub fn default_directives(verbose: bool) -> String {
    let level = if verbose { "debug" } else { "info" };
    let mut directives = vec![format!("ftp_import={level}"), format!("lambda={level}")];
    directives.extend(CHATTY_TARGETS.iter().map(|target| format!("{target}=warn")));
    directives.push("info".to_string());
    directives.join(",")
}

pub fn init_logger(format: LogFormat, verbose: bool) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(default_directives(verbose)));

    let layer = fmt::layer()
        .with_thread_ids(false)
        .with_file(false)
        .with_line_number(false);

    let registry = tracing_subscriber::registry().with(filter);
    match format {
        LogFormat::Compact => registry.with(layer.with_target(false).compact()).init(),
        LogFormat::Json => registry.with(layer.without_time().json()).init(),
    }
}

pub fn init_cli_logger(verbose: bool) {
    init_logger(LogFormat::Compact, verbose);
}

pub fn init_lambda_logger() {
    init_logger(LogFormat::Json, false);
}
