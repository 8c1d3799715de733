use std::process;

use anyhow::{Result, bail};

use nutrilog_core::models::NewMealLog;
use nutrilog_core::service::NutriService;

use super::helpers::print_meal_log_table;

pub(crate) fn cmd_log(
    service: &NutriService,
    user_id: &str,
    food_id: i64,
    quantity: f64,
    json: bool,
) -> Result<()> {
    if !quantity.is_finite() {
        bail!("Invalid quantity '{quantity}'");
    }

    let entry = service.log_meal(&NewMealLog {
        user_id: user_id.to_string(),
        food_id,
        quantity,
    })?;

    if json {
        println!("{}", serde_json::to_string_pretty(&entry)?);
    } else {
        let id = &entry.id;
        println!("Logged {quantity} x food {food_id} for {user_id} (id: {id})");
    }

    Ok(())
}

pub(crate) fn cmd_logs(service: &NutriService, user_id: &str, json: bool) -> Result<()> {
    let logs = service.meal_logs_for_user(user_id)?;

    if logs.is_empty() {
        if json {
            println!("[]");
        } else {
            eprintln!("No meal logs for '{user_id}'");
        }
        process::exit(2);
    }

    if json {
        println!("{}", serde_json::to_string_pretty(&logs)?);
    } else {
        print_meal_log_table(&logs);
    }

    Ok(())
}
