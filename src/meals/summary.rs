use std::collections::BTreeMap;

use serde::Serialize;
use time::Date;

use super::repo_types::{iso_date, MealEntry, MealSlot};
use super::services;

/// Computes the summary for one day from the full meal list.
pub trait DailySummarizer: Send + Sync {
    fn summarize(&self, date: Date, meals: &[MealEntry]) -> DailySummary;
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DailySummary {
    #[serde(with = "iso_date")]
    pub date: Date,
    pub meal_count: usize,
    pub calories: f64,
    pub protein: f64,
    pub carbohydrate: f64,
    pub fat: f64,
    pub calories_by_slot: BTreeMap<MealSlot, f64>,
}

/// Default summarizer: plain nutrient sums for the day.
#[derive(Debug, Clone, Copy, Default)]
pub struct NutritionSummarizer;

impl DailySummarizer for NutritionSummarizer {
    fn summarize(&self, date: Date, meals: &[MealEntry]) -> DailySummary {
        let day = services::meals_on(meals, date);
        let macros = services::macro_totals(&day);
        let calories_by_slot = services::group_by_slot(&day)
            .into_iter()
            .map(|(slot, entries)| (slot, services::total_calories(&entries)))
            .collect();
        DailySummary {
            date,
            meal_count: day.len(),
            calories: services::total_calories(&day),
            protein: macros.protein,
            carbohydrate: macros.carbohydrate,
            fat: macros.fat,
            calories_by_slot,
        }
    }
}
