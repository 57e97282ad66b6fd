use serde::{Deserialize, Serialize};

use crate::meals::repo_types::{MacroTotals, MealPatch, NewMealEntry};

#[derive(Debug, Deserialize)]
pub struct SearchQuery {
    #[serde(default)]
    pub q: String,
}

#[derive(Debug, Deserialize)]
pub struct SummaryQuery {
    pub date: Option<String>, // YYYY-MM-DD, today when absent
}

#[derive(Debug, Serialize)]
pub struct TodayTotals {
    pub calories: f64,
    #[serde(flatten)]
    pub macros: MacroTotals,
}

/// Shape checks for submitted meals: a name and finite, non-negative nutrients.
pub(crate) fn check_new_meal(meal: &NewMealEntry) -> Result<(), String> {
    check_name(&meal.name)?;
    check_nutrients(&[
        ("calories", meal.calories),
        ("protein", meal.protein),
        ("carbohydrate", meal.carbohydrate),
        ("fat", meal.fat),
    ])
}

pub(crate) fn check_patch(patch: &MealPatch) -> Result<(), String> {
    if let Some(name) = &patch.name {
        check_name(name)?;
    }
    let present: Vec<_> = [
        ("calories", patch.calories),
        ("protein", patch.protein),
        ("carbohydrate", patch.carbohydrate),
        ("fat", patch.fat),
    ]
    .into_iter()
    .filter_map(|(field, v)| v.map(|v| (field, v)))
    .collect();
    check_nutrients(&present)
}

fn check_name(name: &str) -> Result<(), String> {
    if name.trim().is_empty() {
        return Err("name must be non-empty".into());
    }
    Ok(())
}

fn check_nutrients(values: &[(&str, f64)]) -> Result<(), String> {
    for (field, v) in values {
        if !v.is_finite() || *v < 0.0 {
            return Err(format!("{field} must be a non-negative number"));
        }
    }
    Ok(())
}
