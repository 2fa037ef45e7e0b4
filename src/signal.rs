use crate::static_file_server::RunningServer;
use signal_hook::{
    consts::{SIGINT, SIGTERM},
    flag,
};
use std::{
    io,
    sync::{
        Arc,
        atomic::{AtomicBool, Ordering},
    },
    thread,
    time::Duration,
};

const POLL_INTERVAL: Duration = Duration::from_millis(100);

/// Raises the returned flag on Ctrl+C or SIGTERM instead of killing the process.
pub fn register_interrupts() -> io::Result<Arc<AtomicBool>> {
    let interrupted = Arc::new(AtomicBool::new(false));

    for signal in [SIGINT, SIGTERM] {
        flag::register(signal, Arc::clone(&interrupted))?;
    }

    Ok(interrupted)
}

/// Serves until `interrupted` is raised, then shuts the server down gracefully.
pub fn serve_until(server: RunningServer, interrupted: &AtomicBool) {
    while !interrupted.load(Ordering::SeqCst) {
        thread::sleep(POLL_INTERVAL);
    }

    server.shutdown();
}
