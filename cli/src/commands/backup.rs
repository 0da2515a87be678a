use std::path::Path;

use anyhow::{Context, Result};
use chrono::NaiveDate;

use nutrik_core::Tracker;
use nutrik_core::models::ExportData;

pub(crate) fn cmd_export(tracker: &Tracker, path: Option<&Path>) -> Result<()> {
    let data = tracker.export_all()?;
    let body = serde_json::to_string_pretty(&data)?;

    match path {
        Some(path) => {
            std::fs::write(path, body)
                .with_context(|| format!("Failed to write export file: {}", path.display()))?;
            eprintln!(
                "Exported {} entries and {} days to {}",
                data.food_logs.len(),
                data.daily_tracking.len(),
                path.display()
            );
        }
        None => println!("{body}"),
    }
    Ok(())
}

pub(crate) fn cmd_import(tracker: &Tracker, path: &Path, json: bool) -> Result<()> {
    let file = std::fs::File::open(path)
        .with_context(|| format!("Failed to open file: {}", path.display()))?;
    let data: ExportData = serde_json::from_reader(std::io::BufReader::new(file))
        .with_context(|| format!("Not a valid export file: {}", path.display()))?;

    let summary = tracker.import_all(&data)?;

    if json {
        println!("{}", serde_json::to_string_pretty(&summary)?);
    } else {
        println!("Import complete.\n");
        println!("  Entries:          {}", summary.entries);
        println!("  Days:             {}", summary.days);
        println!(
            "  Settings:         {}",
            if summary.settings { "restored" } else { "unchanged" }
        );
        println!("  Dates normalized: {}", summary.normalized_dates);
    }
    Ok(())
}

pub(crate) fn cmd_repair(tracker: &Tracker, date: NaiveDate, json: bool) -> Result<()> {
    let aggregate = tracker.repair_day(date)?;
    if json {
        println!("{}", serde_json::to_string_pretty(&aggregate)?);
    } else {
        println!(
            "Rebuilt {}: {:.0} kcal | P:{:.1}g C:{:.1}g F:{:.1}g",
            aggregate.date,
            aggregate.current_calories,
            aggregate.current_protein,
            aggregate.current_carbs,
            aggregate.current_fat
        );
    }
    Ok(())
}
