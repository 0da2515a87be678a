use anyhow::{Context, Result, bail};
use chrono::{Local, NaiveDate};
use serde::Serialize;
use std::io::{self, BufRead, Write};
use tabled::{
    Table, Tabled,
    settings::{Alignment, Modify, Style, object::Columns},
};

use nutrik_core::food_api::Food;
use nutrik_core::models::{DailyAggregate, FoodLogEntry, parse_date_key};

/// Parse a serving multiplier: "1", "1.5", "2x".
pub(crate) fn parse_quantity(s: &str) -> Result<f64> {
    let trimmed = s.trim().trim_end_matches(['x', 'X']).trim();
    let value: f64 = trimmed
        .parse()
        .with_context(|| format!("Invalid quantity: '{s}'. Use a number like '1' or '1.5'"))?;
    if !value.is_finite() || value <= 0.0 {
        bail!("Quantity must be greater than 0");
    }
    Ok(value)
}

pub(crate) fn parse_date(date_str: Option<String>) -> Result<NaiveDate> {
    match date_str {
        None => Ok(Local::now().date_naive()),
        Some(s) => match s.as_str() {
            "today" => Ok(Local::now().date_naive()),
            "yesterday" => Ok(Local::now().date_naive() - chrono::Duration::days(1)),
            "tomorrow" => Ok(Local::now().date_naive() + chrono::Duration::days(1)),
            _ => parse_date_key(&s).with_context(|| {
                format!("Invalid date '{s}'. Use YYYY-MM-DD or today/yesterday/tomorrow")
            }),
        },
    }
}

pub(crate) fn prompt_choice(what: &str, count: usize) -> Result<usize> {
    eprint!("\nSelect a {what} (1-{count}): ");
    io::stderr().flush()?;
    let stdin = io::stdin();
    let line = stdin.lock().lines().next().context("No input")??;
    let n: usize = line.trim().parse().context("Invalid number")?;
    if n < 1 || n > count {
        bail!("Selection out of range");
    }
    Ok(n - 1)
}

fn nutrient(raw: &str, decimals: usize) -> String {
    raw.trim()
        .parse::<f64>()
        .map_or_else(|_| "-".to_string(), |v| format!("{v:.decimals$}"))
}

pub(crate) fn print_food_table(foods: &[Food]) {
    #[derive(Tabled)]
    struct FoodRow {
        #[tabled(rename = "#")]
        idx: usize,
        #[tabled(rename = "Name")]
        name: String,
        #[tabled(rename = "Brand")]
        brand: String,
        #[tabled(rename = "Serving")]
        serving: String,
        #[tabled(rename = "Cal")]
        calories: String,
        #[tabled(rename = "P")]
        protein: String,
        #[tabled(rename = "C")]
        carbs: String,
        #[tabled(rename = "F")]
        fat: String,
    }

    let rows: Vec<FoodRow> = foods
        .iter()
        .enumerate()
        .map(|(i, f)| {
            let serving = f.servings.get(f.default_serving_index());
            let (calories, protein, carbs, fat) = serving.map_or_else(
                || ("-".to_string(), "-".to_string(), "-".to_string(), "-".to_string()),
                |s| {
                    (
                        nutrient(&s.calories, 0),
                        nutrient(&s.protein, 1),
                        nutrient(&s.carbohydrate, 1),
                        nutrient(&s.fat, 1),
                    )
                },
            );
            FoodRow {
                idx: i + 1,
                name: truncate(&f.food_name, 35),
                brand: f
                    .brand_name
                    .as_deref()
                    .map(|b| truncate(b, 20))
                    .unwrap_or_default(),
                serving: serving
                    .map(|s| truncate(&s.serving_description, 20))
                    .unwrap_or_default(),
                calories,
                protein,
                carbs,
                fat,
            }
        })
        .collect();

    let table = Table::new(&rows)
        .with(Style::rounded())
        .with(Modify::new(Columns::new(4..8)).with(Alignment::right()))
        .to_string();
    println!("{table}");
}

pub(crate) fn print_serving_table(food: &Food) {
    #[derive(Tabled)]
    struct ServingRow {
        #[tabled(rename = "#")]
        idx: usize,
        #[tabled(rename = "Serving")]
        description: String,
        #[tabled(rename = "Cal")]
        calories: String,
        #[tabled(rename = "P")]
        protein: String,
        #[tabled(rename = "C")]
        carbs: String,
        #[tabled(rename = "F")]
        fat: String,
    }

    let rows: Vec<ServingRow> = food
        .servings
        .iter()
        .enumerate()
        .map(|(i, s)| ServingRow {
            idx: i + 1,
            description: truncate(&s.serving_description, 30),
            calories: nutrient(&s.calories, 0),
            protein: nutrient(&s.protein, 1),
            carbs: nutrient(&s.carbohydrate, 1),
            fat: nutrient(&s.fat, 1),
        })
        .collect();

    let table = Table::new(&rows)
        .with(Style::rounded())
        .with(Modify::new(Columns::new(2..)).with(Alignment::right()))
        .to_string();
    println!("{table}");
}

pub(crate) fn format_entry_line(e: &FoodLogEntry) -> String {
    let brand = e
        .brand_name
        .as_ref()
        .map(|b| format!(" ({b})"))
        .unwrap_or_default();
    format!(
        "{}{brand}, {}: {:.0} kcal | P:{:.1}g C:{:.1}g F:{:.1}g",
        e.food_name, e.serving_size, e.calories, e.protein, e.carbs, e.fat
    )
}

pub(crate) fn print_totals(agg: &DailyAggregate) {
    let t = agg.totals();
    let g = agg.targets();
    let r = agg.remaining();
    println!(
        "  TOTAL:     {:.0} kcal | P:{:.0}g C:{:.0}g F:{:.0}g",
        no_neg_zero(t.calories),
        no_neg_zero(t.protein),
        no_neg_zero(t.carbs),
        no_neg_zero(t.fat)
    );
    println!(
        "  TARGET:    {:.0} kcal | P:{:.0}g C:{:.0}g F:{:.0}g",
        g.calories, g.protein, g.carbs, g.fat
    );
    println!(
        "  REMAINING: {:.0} kcal | P:{:.0}g C:{:.0}g F:{:.0}g",
        no_neg_zero(r.calories),
        no_neg_zero(r.protein),
        no_neg_zero(r.carbs),
        no_neg_zero(r.fat)
    );
}

pub(crate) fn json_error(message: &str) -> String {
    #[derive(Serialize)]
    struct CliError<'a> {
        error: &'a str,
    }
    serde_json::to_string(&CliError { error: message })
        .unwrap_or_else(|_| format!("{{\"error\":\"{message}\"}}"))
}

pub(crate) fn no_neg_zero(v: f64) -> f64 {
    if v == 0.0 { 0.0 } else { v }
}

pub(crate) fn truncate(s: &str, max: usize) -> String {
    if s.chars().count() <= max {
        s.to_string()
    } else {
        let end = s.char_indices().nth(max - 3).map_or(s.len(), |(i, _)| i);
        format!("{}...", &s[..end])
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_quantity() {
        assert!((parse_quantity("1").unwrap() - 1.0).abs() < f64::EPSILON);
        assert!((parse_quantity("1.5").unwrap() - 1.5).abs() < f64::EPSILON);
        assert!((parse_quantity("2x").unwrap() - 2.0).abs() < f64::EPSILON);
        assert!((parse_quantity(" 0.5 ").unwrap() - 0.5).abs() < f64::EPSILON);
    }

    #[test]
    fn test_parse_quantity_invalid() {
        assert!(parse_quantity("abc").is_err());
        assert!(parse_quantity("0").is_err());
        assert!(parse_quantity("-1").is_err());
        assert!(parse_quantity("NaN").is_err());
    }

    #[test]
    fn test_parse_date_none() {
        let today = Local::now().date_naive();
        assert_eq!(parse_date(None).unwrap(), today);
    }

    #[test]
    fn test_parse_date_keywords() {
        let today = Local::now().date_naive();
        assert_eq!(parse_date(Some("today".to_string())).unwrap(), today);
        assert_eq!(
            parse_date(Some("yesterday".to_string())).unwrap(),
            today - chrono::Duration::days(1)
        );
        assert_eq!(
            parse_date(Some("tomorrow".to_string())).unwrap(),
            today + chrono::Duration::days(1)
        );
    }

    #[test]
    fn test_parse_date_iso_and_unpadded() {
        let expected = NaiveDate::from_ymd_opt(2024, 1, 5).unwrap();
        assert_eq!(parse_date(Some("2024-01-05".to_string())).unwrap(), expected);
        assert_eq!(parse_date(Some("2024-1-5".to_string())).unwrap(), expected);
    }

    #[test]
    fn test_parse_date_invalid() {
        assert!(parse_date(Some("nope".to_string())).is_err());
    }

    #[test]
    fn test_nutrient_formatting() {
        assert_eq!(nutrient("97", 0), "97");
        assert_eq!(nutrient("3.98", 1), "4.0");
        assert_eq!(nutrient("", 1), "-");
    }

    #[test]
    fn test_format_entry_line() {
        let e = FoodLogEntry {
            id: "x".to_string(),
            date: "2024-06-15".to_string(),
            timestamp: 0,
            food_id: 1,
            food_name: "Greek Yogurt".to_string(),
            brand_name: Some("Fage".to_string()),
            serving_size: "100 g".to_string(),
            calories: 97.0,
            protein: 9.0,
            carbs: 4.0,
            fat: 5.0,
        };
        assert_eq!(
            format_entry_line(&e),
            "Greek Yogurt (Fage), 100 g: 97 kcal | P:9.0g C:4.0g F:5.0g"
        );
    }

    #[test]
    fn test_json_error() {
        assert_eq!(json_error("boom"), r#"{"error":"boom"}"#);
    }

    #[test]
    fn test_truncate() {
        assert_eq!(truncate("hello", 10), "hello");
        assert_eq!(truncate("hello world this is long", 10), "hello w...");
    }

    #[test]
    fn test_truncate_utf8() {
        assert_eq!(truncate("Crème fraîche", 10), "Crème f...");
        assert_eq!(truncate("Müsli", 10), "Müsli");
    }

    #[test]
    fn test_no_neg_zero() {
        assert_eq!(no_neg_zero(-0.0).to_bits(), 0.0_f64.to_bits());
        assert_eq!(no_neg_zero(5.0), 5.0);
    }
}
