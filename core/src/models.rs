use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FoodItem {
    pub id: i64,
    pub name: String,
    pub calories: f64,
    pub protein: f64,
    pub carbs: f64,
    pub fat: f64,
}

/// A food item that has not been written to the store yet.
#[derive(Debug, Clone, PartialEq)]
pub struct NewFoodItem {
    pub name: String,
    pub calories: f64,
    pub protein: f64,
    pub carbs: f64,
    pub fat: f64,
}

/// Meal-log request body as accepted at the boundary.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NewMealLog {
    pub user_id: String,
    pub food_id: i64,
    pub quantity: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MealLogEntry {
    pub user_id: String,
    pub food_id: i64,
    pub quantity: f64,
    pub id: String,
}

impl MealLogEntry {
    #[must_use]
    pub fn from_document(id: String, doc: NewMealLog) -> Self {
        Self {
            user_id: doc.user_id,
            food_id: doc.food_id,
            quantity: doc.quantity,
            id,
        }
    }
}
