//! Cooperative cancellation via atomic flag

use std::sync::atomic::{AtomicBool, Ordering};

/// Global cancel flag, set by the SIGINT/SIGTERM handler.
///
/// The upload engine checks it before issuing each chunk; a chunk already
/// on the wire is allowed to finish.
pub fn cancel_flag() -> &'static AtomicBool {
    static FLAG: AtomicBool = AtomicBool::new(false);
    &FLAG
}

/// First signal: request cancellation. Second signal: exit with 130.
pub fn install_signal_handlers() -> std::io::Result<()> {
    for signal in [signal_hook::consts::SIGINT, signal_hook::consts::SIGTERM] {
        // SAFETY: AtomicBool::swap and process::exit are async-signal-safe
        unsafe {
            signal_hook::low_level::register(signal, || {
                if cancel_flag().swap(true, Ordering::Relaxed) {
                    std::process::exit(130);
                }
            })?;
        }
    }
    Ok(())
}
