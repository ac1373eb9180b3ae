use std::thread;
use std::time::Duration;

pub fn open_now(url: &str) {
    match open::that(url) {
        Ok(()) => tracing::info!(url, "opened default browser"),
        Err(error) => tracing::warn!(url, error = %error, "failed to open default browser"),
    }
}

/// Opens `url` on a detached thread after `delay`. The delay is a fixed wait,
/// not a readiness check against the server.
pub fn open_after(url: String, delay: Duration) {
    let spawned = thread::Builder::new()
        .name("browser-launch".into())
        .spawn(move || {
            thread::sleep(delay);
            open_now(&url);
        });
    if let Err(error) = spawned {
        tracing::warn!(error = %error, "failed to spawn browser launch thread");
    }
}
