use anyhow::{Result, bail};

use nutrik_core::Tracker;
use nutrik_core::models::{GoalsUpdate, Settings, Theme, Units};

fn print_settings(settings: &Settings) {
    println!(
        "Goals: {:.0} kcal/day  Protein: {:.0}g  Carbs: {:.0}g  Fat: {:.0}g",
        settings.calorie_goal, settings.protein_goal, settings.carbs_goal, settings.fat_goal
    );
    println!("Theme: {}  Units: {}", settings.theme, settings.units);
}

pub(crate) fn cmd_goals_show(tracker: &Tracker, json: bool) -> Result<()> {
    let settings = tracker.settings()?;
    if json {
        println!("{}", serde_json::to_string_pretty(&settings)?);
    } else {
        print_settings(&settings);
    }
    Ok(())
}

pub(crate) fn cmd_goals_set(tracker: &Tracker, update: &GoalsUpdate, json: bool) -> Result<()> {
    if update.is_empty() {
        bail!("Nothing to update. Pass at least one of --calories, --protein, --carbs, --fat");
    }
    let settings = tracker.update_goals(update)?;
    if json {
        println!("{}", serde_json::to_string_pretty(&settings)?);
    } else {
        print_settings(&settings);
    }
    Ok(())
}

pub(crate) fn cmd_prefs(
    tracker: &Tracker,
    theme: Option<&str>,
    units: Option<&str>,
    json: bool,
) -> Result<()> {
    let theme = theme.map(str::parse::<Theme>).transpose()?;
    let units = units.map(str::parse::<Units>).transpose()?;

    let settings = if theme.is_none() && units.is_none() {
        tracker.settings()?
    } else {
        tracker.set_preferences(theme, units)?
    };

    if json {
        println!("{}", serde_json::to_string_pretty(&settings)?);
    } else {
        println!("Theme: {}  Units: {}", settings.theme, settings.units);
    }
    Ok(())
}
