//! Process-wide HTTP client and the runtime that drives it.
//!
//! Uses async reqwest internally but presents a blocking interface: the
//! upload engine is strictly sequential, one request in flight at a time.

use std::future::Future;
use std::sync::{LazyLock, OnceLock};
use std::time::Duration;

/// Connect timeout
const CONNECT_TIMEOUT: Duration = Duration::from_secs(30);

/// Whole-request timeout (a chunk PATCH must finish within this)
const REQUEST_TIMEOUT: Duration = Duration::from_secs(300);

/// HTTP settings, fixed once at start-up.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct HttpConfig {
    pub connect_timeout: Duration,
    pub request_timeout: Duration,
}

impl Default for HttpConfig {
    fn default() -> Self {
        Self {
            connect_timeout: CONNECT_TIMEOUT,
            request_timeout: REQUEST_TIMEOUT,
        }
    }
}

static HTTP_CONFIG: OnceLock<HttpConfig> = OnceLock::new();

/// Set the global HTTP settings. Must run before the first request.
///
/// Returns `false` if settings were already fixed (by an earlier call or
/// by a request that already built the client).
pub fn set_http_config(config: HttpConfig) -> bool {
    HTTP_CONFIG.set(config).is_ok()
}

/// Current HTTP settings (defaults if never set).
fn http_config() -> &'static HttpConfig {
    HTTP_CONFIG.get_or_init(HttpConfig::default)
}

static SHARED_CLIENT: LazyLock<reqwest::Client> = LazyLock::new(|| {
    let config = http_config();
    reqwest::Client::builder()
        .connect_timeout(config.connect_timeout)
        .timeout(config.request_timeout)
        .user_agent(concat!("tusup/", env!("CARGO_PKG_VERSION")))
        .build()
        .expect("failed to build HTTP client")
});

/// Get shared HTTP client.
pub fn http_client() -> &'static reqwest::Client {
    &SHARED_CLIENT
}

/// Shared tokio runtime for HTTP operations.
static SHARED_RUNTIME: LazyLock<tokio::runtime::Runtime> = LazyLock::new(|| {
    tokio::runtime::Builder::new_multi_thread()
        .worker_threads(1)
        .enable_all()
        .build()
        .expect("failed to build tokio runtime")
});

/// Run `fut` to completion on the shared runtime.
///
/// Must not be called from inside another tokio runtime.
pub fn block_on<F: Future>(fut: F) -> F::Output {
    SHARED_RUNTIME.handle().block_on(fut)
}
