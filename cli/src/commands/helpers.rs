use tabled::{
    Table, Tabled,
    settings::{Alignment, Modify, Style, object::Columns},
};

use nutrilog_core::models::{FoodItem, MealLogEntry};

pub(crate) fn print_food_table(foods: &[FoodItem]) {
    #[derive(Tabled)]
    struct FoodRow {
        #[tabled(rename = "ID")]
        id: i64,
        #[tabled(rename = "Name")]
        name: String,
        #[tabled(rename = "Cal")]
        calories: String,
        #[tabled(rename = "Protein")]
        protein: String,
        #[tabled(rename = "Carbs")]
        carbs: String,
        #[tabled(rename = "Fat")]
        fat: String,
    }

    let rows: Vec<FoodRow> = foods
        .iter()
        .map(|f| FoodRow {
            id: f.id,
            name: truncate(&f.name, 40),
            calories: format!("{:.0}", no_neg_zero(f.calories)),
            protein: format!("{:.1}", no_neg_zero(f.protein)),
            carbs: format!("{:.1}", no_neg_zero(f.carbs)),
            fat: format!("{:.1}", no_neg_zero(f.fat)),
        })
        .collect();

    let table = Table::new(&rows)
        .with(Style::rounded())
        .with(Modify::new(Columns::new(2..6)).with(Alignment::right()))
        .to_string();
    println!("{table}");
}

pub(crate) fn print_meal_log_table(logs: &[MealLogEntry]) {
    #[derive(Tabled)]
    struct LogRow {
        #[tabled(rename = "ID")]
        id: String,
        #[tabled(rename = "Food ID")]
        food_id: i64,
        #[tabled(rename = "Quantity")]
        quantity: f64,
    }

    let rows: Vec<LogRow> = logs
        .iter()
        .map(|l| LogRow {
            id: l.id.clone(),
            food_id: l.food_id,
            quantity: l.quantity,
        })
        .collect();

    let table = Table::new(&rows)
        .with(Style::rounded())
        .with(Modify::new(Columns::new(1..3)).with(Alignment::right()))
        .to_string();
    println!("{table}");
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
    fn test_truncate() {
        assert_eq!(truncate("CHEDDAR", 10), "CHEDDAR");
        assert_eq!(
            truncate("CHEESE, CHEDDAR, SHARP, SLICED", 12),
            "CHEESE, C..."
        );
    }

    #[test]
    fn test_truncate_utf8() {
        assert_eq!(truncate("CRÈME FRAÎCHE", 10), "CRÈME F...");
        assert_eq!(truncate("MÜSLI", 10), "MÜSLI");
    }

    #[test]
    fn test_no_neg_zero() {
        assert_eq!(no_neg_zero(-0.0).to_bits(), 0.0_f64.to_bits());
        assert_eq!(no_neg_zero(5.0), 5.0);
    }

    #[test]
    fn test_print_tables_do_not_panic() {
        print_food_table(&[FoodItem {
            id: 1,
            name: "APPLE".to_string(),
            calories: 52.0,
            protein: 0.3,
            carbs: 14.0,
            fat: 0.2,
        }]);
        print_meal_log_table(&[MealLogEntry {
            user_id: "u1".to_string(),
            food_id: 1,
            quantity: 1.5,
            id: "abc".to_string(),
        }]);
    }
}
