use std::process;
use std::sync::Arc;

use anyhow::{Result, bail};

use nutrilog_core::models::{FoodItem, NewFoodItem};
use nutrilog_core::service::{NutriService, NutritionProvider};

use super::helpers::print_food_table;
use super::search_and_cache;

pub(crate) async fn cmd_search(
    service: &Arc<NutriService>,
    provider: &Arc<dyn NutritionProvider>,
    query: &str,
    json: bool,
) -> Result<()> {
    let foods = search_and_cache(service, provider, query.to_string()).await?;

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

/// Seed a food item by hand. Later searches find it locally without asking USDA.
pub(crate) fn cmd_add(
    service: &NutriService,
    name: &str,
    calories: f64,
    protein: f64,
    carbs: f64,
    fat: f64,
    json: bool,
) -> Result<()> {
    let food = add_food(service, name, calories, protein, carbs, fat)?;

    if json {
        println!("{}", serde_json::to_string_pretty(&food)?);
    } else {
        let name = &food.name;
        let id = food.id;
        println!("Added food: {name} (id: {id})");
    }

    Ok(())
}

fn add_food(
    service: &NutriService,
    name: &str,
    calories: f64,
    protein: f64,
    carbs: f64,
    fat: f64,
) -> Result<FoodItem> {
    let name = name.trim();
    if name.is_empty() {
        bail!("Food name must not be empty");
    }
    for (label, value) in [
        ("calories", calories),
        ("protein", protein),
        ("carbs", carbs),
        ("fat", fat),
    ] {
        if !value.is_finite() {
            bail!("Invalid {label} '{value}'");
        }
    }

    service.add_food(&NewFoodItem {
        name: name.to_string(),
        calories,
        protein,
        carbs,
        fat,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::Value;

    struct UnusedProvider;

    impl NutritionProvider for UnusedProvider {
        fn search(&self, _query: &str) -> Result<Vec<Value>> {
            panic!("provider should not be consulted for a seeded food")
        }
    }

    #[test]
    fn added_food_is_found_locally() {
        let service = NutriService::new_in_memory().unwrap();
        let added = add_food(&service, "  Sourdough Bread ", 289.0, 12.0, 56.0, 1.8).unwrap();
        assert_eq!(added.name, "Sourdough Bread");

        let found = service.search_foods(&UnusedProvider, "sourdough").unwrap();
        assert_eq!(found, vec![added]);
    }

    #[test]
    fn add_rejects_blank_name_and_non_finite_values() {
        let service = NutriService::new_in_memory().unwrap();
        assert!(add_food(&service, "   ", 100.0, 0.0, 0.0, 0.0).is_err());

        let err = add_food(&service, "Oats", f64::NAN, 0.0, 0.0, 0.0).unwrap_err();
        assert!(err.to_string().contains("calories"));
        assert!(add_food(&service, "Oats", 389.0, 0.0, 0.0, f64::INFINITY).is_err());
    }
}
