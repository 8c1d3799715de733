//! Response shapes and candidate normalization for USDA FoodData Central.
//!
//! The search endpoint returns `{"foods": [...]}` where every element is loosely
//! structured. Each element is parsed on its own: a malformed candidate is dropped
//! and logged, never failing the rest of the batch.

use std::collections::HashMap;

use serde::Deserialize;
use serde_json::Value;
use thiserror::Error;
use tracing::warn;

use crate::models::NewFoodItem;

/// Top-level body of `GET /foods/search`. A body without `foods` is an empty batch.
#[derive(Debug, Deserialize)]
pub struct SearchResponse {
    #[serde(default)]
    pub foods: Vec<Value>,
}

#[derive(Debug, Error, PartialEq)]
pub enum CandidateError {
    #[error("candidate is not a JSON object")]
    NotAnObject,
    #[error("missing or non-string description")]
    MissingDescription,
    #[error("foodNutrients is not an array")]
    NutrientsNotArray,
    #[error("nutrient at position {index} has no numeric value")]
    NutrientValue { index: usize },
}

/// Trimmed, upper-cased description. Used as the dedup key within a batch.
#[must_use]
pub fn normalize_name(description: &str) -> String {
    description.trim().to_uppercase()
}

/// Convert one raw candidate into a food item.
///
/// Nutrients are read by position: calories, protein, carbs, fat. Positions past the
/// end of `foodNutrients` (or an absent `foodNutrients`) read as zero.
pub fn candidate_to_food(candidate: &Value) -> Result<NewFoodItem, CandidateError> {
    let obj = candidate.as_object().ok_or(CandidateError::NotAnObject)?;

    let name = obj
        .get("description")
        .and_then(Value::as_str)
        .map(normalize_name)
        .ok_or(CandidateError::MissingDescription)?;

    let nutrients: &[Value] = match obj.get("foodNutrients") {
        None => &[],
        Some(Value::Array(items)) => items,
        Some(_) => return Err(CandidateError::NutrientsNotArray),
    };

    let mut values = [0.0_f64; 4];
    for (index, slot) in values.iter_mut().enumerate() {
        if let Some(nutrient) = nutrients.get(index) {
            *slot = nutrient
                .get("value")
                .and_then(Value::as_f64)
                .ok_or(CandidateError::NutrientValue { index })?;
        }
    }
    let [calories, protein, carbs, fat] = values;

    Ok(NewFoodItem {
        name,
        calories,
        protein,
        carbs,
        fat,
    })
}

/// Keep one item per name: the first one seen, replaced only by a later item with
/// strictly more calories. Output follows first-seen order of names.
#[must_use]
pub fn dedupe_by_name(foods: impl IntoIterator<Item = NewFoodItem>) -> Vec<NewFoodItem> {
    let mut kept: Vec<NewFoodItem> = Vec::new();
    let mut slot_for: HashMap<String, usize> = HashMap::new();

    for food in foods {
        if let Some(&slot) = slot_for.get(&food.name) {
            if food.calories > kept[slot].calories {
                kept[slot] = food;
            }
        } else {
            slot_for.insert(food.name.clone(), kept.len());
            kept.push(food);
        }
    }

    kept
}

/// Parse every candidate of a batch, skipping malformed ones, then dedupe.
#[must_use]
pub fn normalize_batch(candidates: &[Value]) -> Vec<NewFoodItem> {
    let parsed = candidates
        .iter()
        .enumerate()
        .filter_map(|(index, candidate)| match candidate_to_food(candidate) {
            Ok(food) => Some(food),
            Err(error) => {
                warn!(index, %error, "skipping malformed provider candidate");
                None
            }
        });
    dedupe_by_name(parsed)
}
