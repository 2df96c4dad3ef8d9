use anyhow::Result;
use calsync_core::config::CalsyncConfig;
use clap::ValueEnum;

#[derive(Clone, Copy, ValueEnum)]
pub enum Side {
    Source,
    Destination,
}

pub async fn run(config: &CalsyncConfig, side: Side) -> Result<()> {
    let endpoint = match side {
        Side::Source => config.source()?,
        Side::Destination => config.destination()?,
    };

    println!("Authenticating {endpoint}...");

    // The provider caches whatever it needs; later syncs reuse it
    let session = super::open_session(endpoint).await?;

    match session.expires_at {
        Some(expiry) => println!(
            "Authenticated as: {} (valid until {})",
            session.account,
            expiry.format("%Y-%m-%d %H:%M UTC")
        ),
        None => println!("Authenticated as: {}", session.account),
    }

    println!("\nRun `calsync sync` to copy events.");

    Ok(())
}
