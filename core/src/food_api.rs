//! Wire types for the remote food-database API and the conversion from a
//! chosen serving into a log entry.

use std::fmt;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::error::{LedgerError, Result};
use crate::models::{NewFoodLogEntry, round_to_tenth};

/// Error codes the food API reports in `{ "success": false, "error": CODE }`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ApiErrorCode {
    MissingPicture,
    AiAnalysisFailed,
    MealExtractionFailed,
    NutritionApiFailed,
    MissingQuery,
    SearchApiFailed,
    #[serde(other)]
    UnknownError,
}

impl ApiErrorCode {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            ApiErrorCode::MissingPicture => "MISSING_PICTURE",
            ApiErrorCode::AiAnalysisFailed => "AI_ANALYSIS_FAILED",
            ApiErrorCode::MealExtractionFailed => "MEAL_EXTRACTION_FAILED",
            ApiErrorCode::NutritionApiFailed => "NUTRITION_API_FAILED",
            ApiErrorCode::MissingQuery => "MISSING_QUERY",
            ApiErrorCode::SearchApiFailed => "SEARCH_API_FAILED",
            ApiErrorCode::UnknownError => "UNKNOWN_ERROR",
        }
    }

    /// Human-readable message for a failed request.
    #[must_use]
    pub fn message(self) -> &'static str {
        match self {
            ApiErrorCode::MissingPicture => "No picture was provided",
            ApiErrorCode::AiAnalysisFailed => "Could not analyze the picture",
            ApiErrorCode::MealExtractionFailed => "Could not identify a meal in the picture",
            ApiErrorCode::NutritionApiFailed => "Nutrition lookup failed",
            ApiErrorCode::MissingQuery => "Search query is empty",
            ApiErrorCode::SearchApiFailed => "Food search failed",
            ApiErrorCode::UnknownError => "Unknown error",
        }
    }
}

impl fmt::Display for ApiErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Error)]
pub enum ApiError {
    #[error("{}: {}", .0, .0.message())]
    Remote(ApiErrorCode),

    #[error("malformed response from food API: {0}")]
    Malformed(#[from] serde_json::Error),
}

impl ApiError {
    #[must_use]
    pub fn code(&self) -> ApiErrorCode {
        match self {
            ApiError::Remote(code) => *code,
            ApiError::Malformed(_) => ApiErrorCode::UnknownError,
        }
    }
}

/// One serving option. Nutrient values arrive as numeric strings.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Serving {
    #[serde(default)]
    pub serving_id: String,
    #[serde(default)]
    pub serving_description: String,
    #[serde(default)]
    pub metric_serving_amount: Option<String>,
    #[serde(default)]
    pub metric_serving_unit: Option<String>,
    #[serde(default)]
    pub is_default: Option<String>,
    pub calories: String,
    pub protein: String,
    pub carbohydrate: String,
    pub fat: String,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Food {
    #[serde(default)]
    pub food_id: Option<i64>,
    pub food_name: String,
    #[serde(default)]
    pub brand_name: Option<String>,
    #[serde(default)]
    pub servings: Vec<Serving>,
}

impl Food {
    /// Index of the serving flagged as default, else the first one.
    #[must_use]
    pub fn default_serving_index(&self) -> usize {
        self.servings
            .iter()
            .position(|s| s.is_default.as_deref() == Some("1"))
            .unwrap_or(0)
    }
}

/// Result of a picture analysis: a named meal and its ingredients.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AnalyzedMeal {
    pub meal_name: String,
    pub ingredients: Vec<Food>,
}

#[derive(Deserialize)]
struct Envelope {
    success: bool,
    #[serde(default)]
    error: Option<ApiErrorCode>,
    #[serde(default)]
    foods: Vec<Food>,
    #[serde(default)]
    meal_name: Option<String>,
    #[serde(default)]
    ingredients: Vec<Food>,
}

fn decode_envelope(body: &str) -> std::result::Result<Envelope, ApiError> {
    let envelope: Envelope = serde_json::from_str(body)?;
    if envelope.success {
        Ok(envelope)
    } else {
        Err(ApiError::Remote(
            envelope.error.unwrap_or(ApiErrorCode::UnknownError),
        ))
    }
}

/// Decode a search or barcode response body.
pub fn decode_foods(body: &str) -> std::result::Result<Vec<Food>, ApiError> {
    decode_envelope(body).map(|e| e.foods)
}

/// Decode a picture-analysis response body.
pub fn decode_meal(body: &str) -> std::result::Result<AnalyzedMeal, ApiError> {
    let envelope = decode_envelope(body)?;
    Ok(AnalyzedMeal {
        meal_name: envelope.meal_name.unwrap_or_default(),
        ingredients: envelope.ingredients,
    })
}

fn parse_nutrient(name: &str, raw: &str) -> Result<f64> {
    let trimmed = raw.trim();
    let value = if trimmed.is_empty() {
        0.0
    } else {
        trimmed
            .parse::<f64>()
            .map_err(|_| LedgerError::validation(format!("Serving {name} '{raw}' is not a number")))?
    };
    if !value.is_finite() || value < 0.0 {
        return Err(LedgerError::validation(format!(
            "Serving {name} must be a non-negative number (got '{raw}')"
        )));
    }
    Ok(value)
}

/// Scale one of `food`'s servings by `quantity` into an entry ready to log.
///
/// Calories are rounded to whole numbers, macros to one decimal place.
pub fn entry_from_serving(
    food: &Food,
    serving_index: usize,
    quantity: f64,
) -> Result<NewFoodLogEntry> {
    if !quantity.is_finite() || quantity <= 0.0 {
        return Err(LedgerError::validation("Quantity must be greater than 0"));
    }
    let serving = food.servings.get(serving_index).ok_or_else(|| {
        LedgerError::validation(format!(
            "Serving {serving_index} out of range ({} available for '{}')",
            food.servings.len(),
            food.food_name
        ))
    })?;

    let calories = parse_nutrient("calories", &serving.calories)?;
    let protein = parse_nutrient("protein", &serving.protein)?;
    let carbs = parse_nutrient("carbohydrate", &serving.carbohydrate)?;
    let fat = parse_nutrient("fat", &serving.fat)?;

    let serving_size = if (quantity - 1.0).abs() < f64::EPSILON {
        serving.serving_description.clone()
    } else {
        format!("{quantity} x {}", serving.serving_description)
    };

    Ok(NewFoodLogEntry {
        date: None,
        timestamp: None,
        food_id: food.food_id.unwrap_or_default(),
        food_name: food.food_name.clone(),
        brand_name: food.brand_name.clone().filter(|b| !b.is_empty()),
        serving_size,
        calories: (calories * quantity).round(),
        protein: round_to_tenth(protein * quantity),
        carbs: round_to_tenth(carbs * quantity),
        fat: round_to_tenth(fat * quantity),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn yogurt() -> Food {
        Food {
            food_id: Some(4242),
            food_name: "Greek Yogurt".to_string(),
            brand_name: Some("Fage".to_string()),
            servings: vec![
                Serving {
                    serving_id: "1".to_string(),
                    serving_description: "100 g".to_string(),
                    calories: "97".to_string(),
                    protein: "9.0".to_string(),
                    carbohydrate: "3.98".to_string(),
                    fat: "5.0".to_string(),
                    ..Serving::default()
                },
                Serving {
                    serving_id: "2".to_string(),
                    serving_description: "1 cup".to_string(),
                    is_default: Some("1".to_string()),
                    calories: "220".to_string(),
                    protein: "20.3".to_string(),
                    carbohydrate: "9".to_string(),
                    fat: "11.3".to_string(),
                    ..Serving::default()
                },
            ],
        }
    }

    #[test]
    fn test_entry_from_serving_scales_and_rounds() {
        let entry = entry_from_serving(&yogurt(), 0, 1.5).unwrap();
        assert_eq!(entry.food_id, 4242);
        assert_eq!(entry.food_name, "Greek Yogurt");
        assert_eq!(entry.brand_name.as_deref(), Some("Fage"));
        assert_eq!(entry.serving_size, "1.5 x 100 g");
        // 97 * 1.5 = 145.5 -> 146
        assert!((entry.calories - 146.0).abs() < f64::EPSILON);
        assert!((entry.protein - 13.5).abs() < 1e-9);
        // 3.98 * 1.5 = 5.97 -> 6.0
        assert!((entry.carbs - 6.0).abs() < 1e-9);
        assert!((entry.fat - 7.5).abs() < 1e-9);
        assert!(entry.date.is_none());
    }

    #[test]
    fn test_entry_from_serving_single_quantity_keeps_description() {
        let entry = entry_from_serving(&yogurt(), 1, 1.0).unwrap();
        assert_eq!(entry.serving_size, "1 cup");
        assert!((entry.calories - 220.0).abs() < f64::EPSILON);
    }

    #[test]
    fn test_entry_from_serving_rejects_bad_input() {
        assert!(entry_from_serving(&yogurt(), 5, 1.0).is_err());
        assert!(entry_from_serving(&yogurt(), 0, 0.0).is_err());
        assert!(entry_from_serving(&yogurt(), 0, -1.0).is_err());

        let mut food = yogurt();
        food.servings[0].fat = "lots".to_string();
        assert!(entry_from_serving(&food, 0, 1.0).is_err());

        let mut food = yogurt();
        food.servings[0].protein = "-3".to_string();
        assert!(entry_from_serving(&food, 0, 1.0).is_err());
    }

    #[test]
    fn test_empty_nutrient_is_zero() {
        let mut food = yogurt();
        food.servings[0].fat = String::new();
        let entry = entry_from_serving(&food, 0, 1.0).unwrap();
        assert!(entry.fat.abs() < f64::EPSILON);
    }

    #[test]
    fn test_default_serving_index() {
        assert_eq!(yogurt().default_serving_index(), 1);
        let mut food = yogurt();
        food.servings[1].is_default = None;
        assert_eq!(food.default_serving_index(), 0);
    }

    #[test]
    fn test_decode_foods_success() {
        let body = r#"{
            "success": true,
            "foods": [{
                "food_id": 33691,
                "food_name": "Banana",
                "servings": [{
                    "serving_id": "32978",
                    "serving_description": "1 medium",
                    "calories": "105",
                    "protein": "1.29",
                    "carbohydrate": "26.95",
                    "fat": "0.39"
                }]
            }]
        }"#;
        let foods = decode_foods(body).unwrap();
        assert_eq!(foods.len(), 1);
        assert_eq!(foods[0].food_id, Some(33691));
        assert!(foods[0].brand_name.is_none());
        assert_eq!(foods[0].servings[0].calories, "105");
    }

    #[test]
    fn test_decode_error_codes() {
        let err = decode_foods(r#"{"success": false, "error": "MISSING_QUERY"}"#).unwrap_err();
        assert_eq!(err.code(), ApiErrorCode::MissingQuery);

        let err = decode_foods(r#"{"success": false, "error": "SOMETHING_NEW"}"#).unwrap_err();
        assert_eq!(err.code(), ApiErrorCode::UnknownError);

        let err = decode_foods(r#"{"success": false}"#).unwrap_err();
        assert_eq!(err.code(), ApiErrorCode::UnknownError);

        let err = decode_foods("not json").unwrap_err();
        assert!(matches!(err, ApiError::Malformed(_)));
    }

    #[test]
    fn test_decode_meal() {
        let body = r#"{
            "success": true,
            "meal_name": "Breakfast bowl",
            "ingredients": [
                {"food_name": "Oats", "servings": [{"serving_description": "1 cup", "calories": "307", "protein": "10.7", "carbohydrate": "54.8", "fat": "5.3"}]}
            ]
        }"#;
        let meal = decode_meal(body).unwrap();
        assert_eq!(meal.meal_name, "Breakfast bowl");
        assert_eq!(meal.ingredients.len(), 1);
        assert!(meal.ingredients[0].food_id.is_none());

        let err = decode_meal(r#"{"success": false, "error": "AI_ANALYSIS_FAILED"}"#).unwrap_err();
        assert_eq!(err.code(), ApiErrorCode::AiAnalysisFailed);
        assert!(err.to_string().starts_with("AI_ANALYSIS_FAILED"));
    }

    #[test]
    fn test_error_code_strings() {
        let json = serde_json::to_string(&ApiErrorCode::MealExtractionFailed).unwrap();
        assert_eq!(json, "\"MEAL_EXTRACTION_FAILED\"");
        assert_eq!(ApiErrorCode::NutritionApiFailed.as_str(), "NUTRITION_API_FAILED");
    }
}
