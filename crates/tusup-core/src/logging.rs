//! Logging setup with indicatif integration

use indicatif::MultiProgress;

/// How chatty the process should be.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Verbosity {
    /// Errors and warnings only
    Quiet,
    Normal,
    /// Debug records, tagged with their module
    Debug,
}

impl Verbosity {
    /// `--debug` wins over `--quiet`.
    pub fn from_flags(quiet: bool, debug: bool) -> Self {
        match (quiet, debug) {
            (_, true) => Self::Debug,
            (true, false) => Self::Quiet,
            (false, false) => Self::Normal,
        }
    }

    /// Filter used when `RUST_LOG` is not set.
    pub fn default_filter(self) -> &'static str {
        match self {
            Self::Quiet => "warn",
            Self::Normal => "info",
            Self::Debug => "debug",
        }
    }
}

fn label(level: log::Level) -> &'static str {
    match level {
        log::Level::Error => "ERROR",
        log::Level::Warn => "WARN ",
        log::Level::Info => "INFO ",
        log::Level::Debug => "DEBUG",
        log::Level::Trace => "TRACE",
    }
}

fn ansi(level: log::Level) -> &'static str {
    match level {
        log::Level::Error => "\x1b[31m",
        log::Level::Warn => "\x1b[33m",
        log::Level::Info => "\x1b[32m",
        log::Level::Debug => "\x1b[36m",
        log::Level::Trace => "\x1b[35m",
    }
}

/// Render one record. Debug and trace lines carry the module path.
fn render(record: &log::Record, color: bool) -> String {
    let level = record.level();
    let tag = if color {
        format!("{}{}\x1b[0m", ansi(level), label(level))
    } else {
        label(level).to_string()
    };
    if level >= log::Level::Debug {
        format!("[{tag} {}] {}", record.target(), record.args())
    } else {
        format!("[{tag}] {}", record.args())
    }
}

/// Logger that prints above the progress bar instead of through it.
pub struct BarAwareLogger {
    inner: env_logger::Logger,
    multi: MultiProgress,
}

impl BarAwareLogger {
    pub fn new(inner: env_logger::Logger, multi: MultiProgress) -> Self {
        Self { inner, multi }
    }
}

impl log::Log for BarAwareLogger {
    fn enabled(&self, metadata: &log::Metadata) -> bool {
        self.inner.enabled(metadata)
    }

    fn log(&self, record: &log::Record) {
        if self.inner.matches(record) {
            let line = render(record, true);
            self.multi.suspend(|| eprintln!("{line}"));
        }
    }

    fn flush(&self) {
        self.inner.flush();
    }
}

/// Install the global logger.
///
/// With `multi` set (stderr is a terminal) records are colored and
/// printed through `MultiProgress::suspend`. Otherwise plain
/// `[LEVEL] message` lines go to stderr.
pub fn init_logging(
    verbosity: Verbosity,
    multi: Option<&MultiProgress>,
) -> Result<(), log::SetLoggerError> {
    let env = env_logger::Env::default().default_filter_or(verbosity.default_filter());

    match multi {
        Some(multi) => {
            let logger = env_logger::Builder::from_env(env).build();
            let max_level = logger.filter();
            log::set_boxed_logger(Box::new(BarAwareLogger::new(logger, multi.clone())))?;
            log::set_max_level(max_level);
            Ok(())
        }
        None => {
            use std::io::Write;

            env_logger::Builder::from_env(env)
                .format(|buf, record| writeln!(buf, "{}", render(record, false)))
                .try_init()
        }
    }
}
