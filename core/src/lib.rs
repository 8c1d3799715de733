pub mod db;
pub mod meal_log;
pub mod models;
pub mod service;
pub mod usda;
