//! Config validation command

use anyhow::Result;
use tracing::info;

use breakout_strategies::Config;

pub fn run(config_path: String) -> Result<()> {
    let config = Config::from_file(&config_path)?;

    info!(
        symbol = %config.instrument.symbol,
        timeframe = %config.instrument.timeframe,
        tick_size = config.instrument.tick_size,
        "instrument"
    );
    info!(
        direction = ?config.strategy.direction,
        signal = %config.strategy.signal,
        reward_multiple = config.strategy.reward_multiple,
        entry_kind = ?config.strategy.entry_kind,
        "strategy"
    );
    match &config.windows {
        Some(windows) => info!(
            mode = ?windows.mode,
            intervals = windows.intervals.len(),
            slots = windows.slots.as_ref().map_or(0, |s| s.len()),
            "trade windows"
        ),
        None => info!("trade windows: none, entries admitted at any time"),
    }
    match &config.flatten {
        Some(flatten) => info!(start = %flatten.start, end = %flatten.end, "daily flatten"),
        None => info!("daily flatten: disabled"),
    }
    match &config.rotation {
        Some(rotation) => info!(
            instances = rotation.instances,
            instance_index = rotation.instance_index,
            token_path = %rotation.token_path,
            "rotation"
        ),
        None => info!("rotation: single instance"),
    }

    info!("configuration OK: {}", config_path);
    Ok(())
}
