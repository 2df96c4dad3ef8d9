use anyhow::Result;
use calsync_core::config::CalsyncConfig;
use owo_colors::OwoColorize;

pub fn run() -> Result<()> {
    let config_path = CalsyncConfig::config_path()?;
    let config = CalsyncConfig::load()?;

    println!("{}", "Paths".bold());
    println!("  Config:  {}", config_path.display());
    println!("  State:   {}", config.state_path().display());

    println!("\n{}", "Sync".bold());
    println!(
        "  Window:         {} days back, {} days ahead",
        config.window_past_days, config.window_future_days
    );
    println!("  Bidirectional:  {}", config.bidirectional);

    let describe = |endpoint: Option<String>| endpoint.unwrap_or_else(|| "(not set)".to_string());
    println!(
        "  Source:         {}",
        describe(config.source.as_ref().map(|e| e.to_string()))
    );
    println!(
        "  Destination:    {}",
        describe(config.destination.as_ref().map(|e| e.to_string()))
    );

    if let (Some(source), Some(destination)) = (&config.source, &config.destination) {
        println!("\n{}", "Mapping stores".bold());
        println!("  {}", config.store_path(source, destination).display());
        if config.bidirectional {
            println!("  {}", config.store_path(destination, source).display());
        }
    }

    Ok(())
}
