mod backup;
mod goals;
mod helpers;
mod log;
mod search;
mod summary;

use anyhow::{Context, Result, bail};

use nutrik_core::food_api::Food;

use helpers::{print_food_table, print_serving_table, prompt_choice};

pub(crate) use backup::{cmd_export, cmd_import, cmd_repair};
pub(crate) use helpers::{parse_date, parse_quantity};
pub(crate) use goals::{cmd_goals_set, cmd_goals_show, cmd_prefs};
pub(crate) use log::{cmd_add, cmd_barcode, cmd_log, cmd_meal, cmd_remove};
pub(crate) use search::cmd_search;
pub(crate) use summary::{cmd_day, cmd_history};

/// Pick one food from lookup results, prompting when there is more than one.
pub(super) fn choose_food(foods: Vec<Food>, query: &str) -> Result<Food> {
    let idx = if foods.len() > 1 {
        print_food_table(&foods);
        prompt_choice("food", foods.len())?
    } else {
        0
    };
    foods
        .into_iter()
        .nth(idx)
        .with_context(|| format!("No food found for '{query}'"))
}

/// Resolve a 1-based serving choice, prompting when asked to and there is a choice to make.
pub(super) fn choose_serving(food: &Food, serving: Option<usize>, ask: bool) -> Result<usize> {
    match serving {
        Some(0) => bail!("Serving numbers start at 1"),
        Some(n) => Ok(n - 1),
        None if ask && food.servings.len() > 1 => {
            print_serving_table(food);
            prompt_choice("serving", food.servings.len())
        }
        None => Ok(food.default_serving_index()),
    }
}
