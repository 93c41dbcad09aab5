//! Censoring log sink: redacts the API key from every formatted record
//! before it reaches the underlying logger.

use std::sync::OnceLock;

use log::{Log, Metadata, Record};

static CENSOR: OnceLock<String> = OnceLock::new();

struct CensoringLogger {
    inner: env_logger::Logger,
}

impl Log for CensoringLogger {
    fn enabled(&self, metadata: &Metadata) -> bool {
        self.inner.enabled(metadata)
    }

    fn log(&self, record: &Record) {
        if !self.enabled(record.metadata()) {
            return;
        }
        let message = redact(&record.args().to_string());
        self.inner.log(
            &Record::builder()
                .args(format_args!("{message}"))
                .level(record.level())
                .target(record.target())
                .module_path(record.module_path())
                .file(record.file())
                .line(record.line())
                .build(),
        );
    }

    fn flush(&self) {
        self.inner.flush();
    }
}

/// Replace every occurrence of `key` in `text` with an equal-length run of
/// `*`. A no-op when `key` is empty, so callers don't need to special-case
/// "no API key configured".
pub fn redact(text: &str) -> String {
    let Some(key) = CENSOR.get() else {
        return text.to_string();
    };
    if key.is_empty() {
        return text.to_string();
    }
    let mask: String = "*".repeat(key.len());
    text.replace(key.as_str(), &mask)
}

/// Install the censoring logger exactly once. Subsequent calls are no-ops,
/// matching the source's "install after the key is known" contract.
pub fn install(api_key: &str) {
    if CENSOR.set(api_key.to_string()).is_err() {
        return;
    }
    let env_logger = env_logger::Builder::from_default_env().build();
    let max_level = env_logger.filter();
    let logger = CensoringLogger { inner: env_logger };
    if log::set_boxed_logger(Box::new(logger)).is_ok() {
        log::set_max_level(max_level);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn redact_is_noop_without_install() {
        assert_eq!(redact("apikey=secret"), "apikey=secret");
    }
}
