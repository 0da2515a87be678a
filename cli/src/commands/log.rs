use anyhow::{Context, Result, bail};
use chrono::NaiveDate;
use std::path::Path;
use std::process;

use crate::food_api::FoodApiClient;
use nutrik_core::Tracker;
use nutrik_core::food_api::{Food, entry_from_serving};
use nutrik_core::models::{FoodLogEntry, NewFoodLogEntry};

use super::helpers::{format_entry_line, json_error};
use super::{choose_food, choose_serving};

fn print_logged(entry: &FoodLogEntry, json: bool) -> Result<()> {
    if json {
        println!("{}", serde_json::to_string_pretty(entry)?);
    } else {
        println!("Logged [{}] on {}: {}", entry.id, entry.date, format_entry_line(entry));
    }
    Ok(())
}

fn log_food(
    tracker: &Tracker,
    food: &Food,
    serving: usize,
    quantity: f64,
    date: NaiveDate,
) -> Result<FoodLogEntry> {
    let mut new = entry_from_serving(food, serving, quantity)?;
    new.date = Some(date);
    Ok(tracker.add_food_to_log(new)?)
}

#[allow(clippy::too_many_arguments)]
pub(crate) async fn cmd_log(
    tracker: &Tracker,
    api: &FoodApiClient,
    query: &str,
    quantity: f64,
    serving: Option<usize>,
    page: u32,
    date: NaiveDate,
    json: bool,
) -> Result<()> {
    let foods = api.search(query, page).await?;

    if foods.is_empty() {
        let message = format!("No food found for '{query}'");
        if json {
            println!("{}", json_error(&message));
        } else {
            eprintln!("{message}");
        }
        process::exit(2);
    }

    let food = choose_food(foods, query)?;
    let serving = choose_serving(&food, serving, !json)?;
    let entry = log_food(tracker, &food, serving, quantity, date)?;
    print_logged(&entry, json)
}

pub(crate) async fn cmd_barcode(
    tracker: &Tracker,
    api: &FoodApiClient,
    code: &str,
    quantity: f64,
    serving: Option<usize>,
    date: NaiveDate,
    json: bool,
) -> Result<()> {
    let foods = api.lookup_barcode(code).await?;
    let food = foods
        .into_iter()
        .next()
        .with_context(|| format!("No product found for barcode '{code}'"))?;
    let serving = choose_serving(&food, serving, false)?;
    let entry = log_food(tracker, &food, serving, quantity, date)?;
    print_logged(&entry, json)
}

/// Manual entry with values the user already knows.
pub(crate) fn cmd_add(tracker: &Tracker, new: NewFoodLogEntry, json: bool) -> Result<()> {
    let entry = tracker.add_food_to_log(new)?;
    print_logged(&entry, json)
}

/// Analyze a meal photo and log every recognized ingredient at its default serving.
///
/// `picture` holds the image as base64 text (a `data:` URL is accepted too).
pub(crate) async fn cmd_meal(
    tracker: &Tracker,
    api: &FoodApiClient,
    picture: &Path,
    date: NaiveDate,
    dry_run: bool,
    json: bool,
) -> Result<()> {
    let encoded = tokio::fs::read_to_string(picture)
        .await
        .with_context(|| format!("Failed to read picture file: {}", picture.display()))?;
    let encoded = encoded.trim();
    if encoded.is_empty() {
        bail!("Picture file is empty: {}", picture.display());
    }

    let meal = api.analyze_picture(encoded).await?;
    if meal.ingredients.is_empty() {
        bail!("No ingredients recognized in '{}'", meal.meal_name);
    }

    let entries = meal
        .ingredients
        .iter()
        .map(|food| -> Result<NewFoodLogEntry> {
            let mut new = entry_from_serving(food, food.default_serving_index(), 1.0)?;
            new.date = Some(date);
            Ok(new)
        })
        .collect::<Result<Vec<NewFoodLogEntry>>>()?;

    if dry_run {
        if json {
            println!("{}", serde_json::to_string_pretty(&meal)?);
        } else {
            println!("{} (not logged)", meal.meal_name);
            for new in &entries {
                println!(
                    "  {}, {}: {:.0} kcal",
                    new.food_name, new.serving_size, new.calories
                );
            }
        }
        return Ok(());
    }

    let logged = tracker.add_foods_to_log(entries)?;
    if json {
        println!("{}", serde_json::to_string_pretty(&logged)?);
    } else {
        let total: f64 = logged.iter().map(|e| e.calories).sum();
        println!("Logged {} ({} items, {total:.0} kcal)", meal.meal_name, logged.len());
        for entry in &logged {
            println!("  [{}] {}", entry.id, format_entry_line(entry));
        }
    }
    Ok(())
}

pub(crate) fn cmd_remove(tracker: &Tracker, entry_id: &str, json: bool) -> Result<()> {
    let removed = tracker.remove_food_from_log(entry_id)?;

    if !removed {
        let message = format!("Entry {entry_id} not found");
        if json {
            println!("{}", json_error(&message));
        } else {
            eprintln!("{message}");
        }
        process::exit(2);
    }

    if json {
        println!("{}", serde_json::json!({ "removed": entry_id }));
    } else {
        println!("Removed entry {entry_id}");
    }
    Ok(())
}
