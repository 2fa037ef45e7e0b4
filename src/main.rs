use anyhow::{Context, Result};
use dotenv::dotenv;
use static_file_server::{
    profile::{PROFILE_NAMES, Profile},
    signal::{register_interrupts, serve_until},
    start_with,
};
use std::{env::args, process::ExitCode};
use tracing_subscriber::EnvFilter;

fn main() -> ExitCode {
    dotenv().ok();
    init_tracing();

    match run() {
        Ok(()) => ExitCode::SUCCESS,
        Err(error) => {
            eprintln!("❌ {error:#}");
            ExitCode::FAILURE
        }
    }
}

fn run() -> Result<()> {
    let profile = match args().nth(1) {
        Some(name) => Profile::named(&name)?.with_context(|| {
            format!(
                "unknown profile {name:?}, available: {}",
                PROFILE_NAMES.join(", ")
            )
        })?,
        None => Profile::wallet_test()?,
    };

    let interrupted = register_interrupts().context("could not install signal handler")?;
    let server = start_with(profile.config.clone(), |addr| profile.announce(addr))
        .context("could not start server")?;

    serve_until(server, &interrupted);
    println!("\n🛑 Server stopped");

    Ok(())
}

fn init_tracing() {
    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let _ = tracing_subscriber::fmt().with_env_filter(env_filter).try_init();
}
