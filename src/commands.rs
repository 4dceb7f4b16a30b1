//! One-shot commands run from the command line

use crate::{
    args::SpeedArg,
    defaults::{self, DEFAULT_FAN_CONFIG},
    logging::Logger,
    scanner::Registry,
    source::{DeviceSource, SysfsSource},
};
use anyhow::{anyhow, bail, Context};
use log::info;
use std::{fmt::Write as _, sync::Arc, time::Duration};
use tokio::time::sleep;

fn scan(source: Arc<dyn DeviceSource>) -> Registry {
    Registry::scan(source, None, &Logger::global())
}

/// Render the card, fan speed and temperature table
pub fn render_table(registry: &Registry) -> String {
    let mut out = String::new();
    let _ = writeln!(out, "{:<8} {:>16} {:>12}", "Card", "fan_speed (RPM)", "gpu_temp ℃");
    for device in registry.devices() {
        let temp = device
            .temperature()
            .map(|t| format!("{:.1}", t))
            .unwrap_or_else(|_| "n/a".to_string());
        let _ = writeln!(
            out,
            "{:<8} {:>16} {:>12}",
            device.id(),
            device.fan_speed(),
            temp
        );
    }
    out
}

/// Print temperatures and fan speeds until interrupted
pub async fn monitor(fps: u32, single_run: bool) -> anyhow::Result<()> {
    let registry = scan(Arc::new(SysfsSource::new()));
    if registry.is_empty() {
        bail!("no compatible cards found");
    }

    if single_run {
        print!("{}", render_table(&registry));
        return Ok(());
    }

    println!("AMD Fan Control - ctrl-c to quit");
    let period = Duration::from_secs_f64(1.0 / f64::from(fps.max(1)));
    loop {
        print!("{}", render_table(&registry));
        println!();

        tokio::select! {
            _ = tokio::signal::ctrl_c() => return Ok(()),
            _ = sleep(period) => {}
        }
    }
}

/// Pick the card to override: the requested one, or the only one available
pub fn select_card<'a>(registry: &'a Registry, card: Option<&str>) -> anyhow::Result<&'a str> {
    let ids: Vec<&str> = registry.ids().collect();
    match card {
        Some(card) => ids
            .iter()
            .copied()
            .find(|id| id.eq_ignore_ascii_case(card))
            .ok_or_else(|| anyhow!("Found no card named {} (available: {})", card, ids.join(", "))),
        None => match ids.as_slice() {
            [only] => Ok(*only),
            [] => Err(anyhow!("no compatible cards found")),
            _ => Err(anyhow!("Which card? Use --card with one of: {}", ids.join(", "))),
        },
    }
}

/// Manually override the fan speed of a card
pub fn set_speed(source: Arc<dyn DeviceSource>, card: Option<&str>, speed: SpeedArg) -> anyhow::Result<()> {
    let registry = scan(source);
    let id = select_card(&registry, card)?;
    let device = registry
        .get(id)
        .ok_or_else(|| anyhow!("Found no card to set speed of"))?;

    match speed {
        SpeedArg::Auto => {
            info!("Setting fan speed to system controlled");
            device
                .set_automatic(true)
                .with_context(|| format!("failed to hand {} back to the driver", id))?;
        }
        SpeedArg::Percent(pct) => {
            info!("Setting fan speed to {}", pct);
            let raw = device
                .set_speed_percent(pct)
                .with_context(|| format!("failed to set the fan speed of {}", id))?;
            println!("{}", raw);
        }
    }
    Ok(())
}

/// Text for `print-default`, `None` when nothing was requested
pub fn default_text(configuration: bool, service: Option<&str>) -> Option<&'static str> {
    if configuration {
        Some(DEFAULT_FAN_CONFIG)
    } else {
        service.and_then(defaults::service)
    }
}
