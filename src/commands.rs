use std::path::Path;
use std::time::Duration;

use anyhow::{Context, Result};
use tracing::warn;

use crate::allocator::bookings::BookingView;
use crate::allocator::{Allocator, Availability, ExpirySweeper};
use crate::config;
use crate::models::Config;
use crate::store::{self, SlotKey};
use crate::validation;

/// Load the config, open its store and apply the configured seeds.
async fn open_allocator(config_path: &Path) -> Result<(Config, Allocator)> {
    let cfg = config::load_config(config_path)?;
    if cfg.storage.snapshot.is_none() {
        warn!("No [storage] snapshot configured; working on an empty in-memory store");
    }
    let store = store::open(&cfg.storage).context("Failed to open the allocator store")?;
    let allocator = Allocator::new(store);
    allocator
        .catalog
        .seed(&cfg)
        .await
        .context("Failed to seed the catalog")?;
    Ok((cfg, allocator))
}

pub async fn run_sweep(config_path: &Path) -> Result<()> {
    let (cfg, allocator) = open_allocator(config_path).await?;
    let tz = config::parse_timezone(&cfg.sweeper.timezone)?;
    let sweeper = ExpirySweeper::new(
        allocator.store().clone(),
        tz,
        Duration::from_secs(cfg.sweeper.interval_secs),
    );
    let today = sweeper.today();
    let removed = sweeper.sweep_before(today).await;
    println!("Removed {removed} bookings dated before {today}.");
    Ok(())
}

pub async fn run_availability(
    verbose: bool,
    config_path: &Path,
    stadium: &str,
    date: &str,
    time: &str,
) -> Result<()> {
    let date = validation::parse_date(date)
        .with_context(|| format!("Invalid date {date:?}, expected YYYY-MM-DD"))?;
    let time = validation::normalize_time(time)
        .with_context(|| format!("Invalid time {time:?}, expected HH:MM"))?;
    let (_, allocator) = open_allocator(config_path).await?;

    let slot = SlotKey::new(stadium, date, time);
    let availability = allocator.conflicts.check(&slot).await?;
    if verbose {
        println!("{}", serde_json::to_string_pretty(&availability)?);
        return Ok(());
    }
    match availability {
        Availability::Available => println!("{slot}: available"),
        Availability::Conflict(conflict) => println!(
            "{slot}: taken by {:?} {} ({})",
            conflict.ledger,
            conflict.entity_id,
            conflict.reason()
        ),
    }
    Ok(())
}

pub async fn run_bookings(verbose: bool, config_path: &Path, user: &str) -> Result<()> {
    let (_, allocator) = open_allocator(config_path).await?;
    let bookings = allocator.bookings.list_for_user(user).await?;

    if verbose {
        println!("{}", serde_json::to_string_pretty(&bookings)?);
        return Ok(());
    }
    if bookings.is_empty() {
        println!("No bookings for {user}.");
        return Ok(());
    }
    println!("Bookings for {user}:\n");
    for view in &bookings {
        print_booking(view);
    }
    Ok(())
}

fn print_booking(view: &BookingView) {
    let stadium = view
        .stadium
        .as_ref()
        .map(|s| s.name.as_str())
        .unwrap_or(view.booking.stadium_id.as_str());
    let time = view
        .time_slot
        .as_ref()
        .map(|t| t.time.as_str())
        .unwrap_or("?");
    println!(
        "  {} {}  {}  ({})",
        view.booking.date, time, stadium, view.booking.id
    );
}
