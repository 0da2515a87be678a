use anyhow::Result;
use std::process;

use crate::food_api::FoodApiClient;

use super::helpers::print_food_table;

pub(crate) async fn cmd_search(
    api: &FoodApiClient,
    query: &str,
    page: u32,
    json: bool,
) -> Result<()> {
    let foods = api.search(query, page).await?;

    if foods.is_empty() {
        if json {
            println!("[]");
        } else {
            eprintln!("No results found for '{query}'");
        }
        process::exit(2);
    }

    if json {
        println!("{}", serde_json::to_string_pretty(&foods)?);
    } else {
        print_food_table(&foods);
    }

    Ok(())
}
