use anyhow::Result;
use chrono::NaiveDate;
use std::process;
use tabled::{
    Table, Tabled,
    settings::{Alignment, Modify, Style, object::Columns},
};

use nutrik_core::Tracker;

use super::helpers::{format_entry_line, no_neg_zero, print_totals};

pub(crate) fn cmd_day(tracker: &Tracker, date: NaiveDate, json: bool) -> Result<()> {
    let view = tracker.get_day_view(date)?;

    if json {
        println!("{}", serde_json::to_string_pretty(&view)?);
        return Ok(());
    }

    let date = &view.aggregate.date;
    println!("=== {date} ===\n");

    if view.entries.is_empty() {
        println!("  No entries yet\n");
    } else {
        for e in &view.entries {
            println!("  [{}] {}", e.id, format_entry_line(e));
        }
        println!();
    }

    print_totals(&view.aggregate);
    Ok(())
}

pub(crate) fn cmd_history(tracker: &Tracker, days: u32, json: bool) -> Result<()> {
    #[derive(Tabled)]
    struct HistoryRow {
        #[tabled(rename = "Date")]
        date: String,
        #[tabled(rename = "Calories")]
        calories: String,
        #[tabled(rename = "Target")]
        target: String,
        #[tabled(rename = "Protein")]
        protein: String,
        #[tabled(rename = "Carbs")]
        carbs: String,
        #[tabled(rename = "Fat")]
        fat: String,
    }

    let aggregates = tracker.history(days)?;

    if json {
        println!("{}", serde_json::to_string_pretty(&aggregates)?);
        return Ok(());
    }

    if aggregates.is_empty() {
        eprintln!("No tracked days in the last {days} days");
        process::exit(2);
    }

    let rows: Vec<HistoryRow> = aggregates
        .iter()
        .map(|a| {
            let cal = no_neg_zero(a.current_calories);
            let p = no_neg_zero(a.current_protein);
            let c = no_neg_zero(a.current_carbs);
            let f = no_neg_zero(a.current_fat);
            HistoryRow {
                date: a.date.clone(),
                calories: format!("{cal:.0}"),
                target: format!("{:.0}", a.calorie_target),
                protein: format!("{p:.0}g"),
                carbs: format!("{c:.0}g"),
                fat: format!("{f:.0}g"),
            }
        })
        .collect();

    let table = Table::new(&rows)
        .with(Style::rounded())
        .with(Modify::new(Columns::new(1..)).with(Alignment::right()))
        .to_string();
    println!("{table}");

    Ok(())
}
