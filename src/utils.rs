use indicatif::ProgressStyle;

pub(crate) fn hex(bytes: &[u8]) -> String {
    use std::fmt::Write;
    let mut acc = String::with_capacity(bytes.len() * 2);

    for byte in bytes {
        // writing into a String cannot fail
        let _ = write!(&mut acc, "{:02x}", byte);
    }

    acc
}

pub(crate) fn get_style_plan() -> ProgressStyle {
    ProgressStyle::default_bar()
        .template("{spinner:.green} [{elapsed}] [{bar:40.cyan/blue}] {pos}/{len} ({eta}) {msg}")
        .unwrap_or_else(|_| ProgressStyle::default_bar())
        .progress_chars("=>-")
}

/// Installs a global `tracing` subscriber writing to stderr, filtered by
/// `RUST_LOG` (defaults to `info`). Stage progress is rendered through
/// `tracing-indicatif`.
///
/// Calling this more than once is harmless, later calls leave the first
/// subscriber in place.
#[cfg(feature = "logging")]
pub fn init_logging() {
    use tracing_indicatif::IndicatifLayer;
    use tracing_subscriber::layer::SubscriberExt;
    use tracing_subscriber::util::SubscriberInitExt;
    use tracing_subscriber::{EnvFilter, fmt};

    let indicatif = IndicatifLayer::new();
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    let _ = tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer().with_writer(indicatif.get_stderr_writer()))
        .with(indicatif)
        .try_init();
}
