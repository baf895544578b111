//! tusup core - shared infrastructure for the tus upload client
//!
//! Logging, progress display, the process-wide HTTP client and the
//! cancellation flag used by the upload engine and the CLI.

pub mod http;
pub mod iec;
pub mod logging;
pub mod progress;
pub mod shutdown;

// Re-exports for convenience
pub use http::{HttpConfig, block_on, http_client, set_http_config};
pub use iec::{ByteSize, ParseByteSizeError};
pub use logging::{Verbosity, init_logging};
pub use progress::ProgressContext;
pub use shutdown::{cancel_flag, install_signal_handlers};
