//! Read-side derivations over a meal list snapshot. Everything here is a pure
//! function; the store calls them against its current list on every query.

use std::collections::{BTreeMap, HashMap};

use time::Date;

use super::repo_types::{MacroTotals, MealEntry, MealSlot, ReadyMadeFood};

pub const MOST_FREQUENT_LIMIT: usize = 5;

pub fn search_catalog(catalog: &[ReadyMadeFood], text: &str) -> Vec<ReadyMadeFood> {
    let needle = text.trim().to_lowercase();
    catalog
        .iter()
        .filter(|food| food.name.to_lowercase().contains(&needle))
        .cloned()
        .collect()
}

pub fn meals_on(meals: &[MealEntry], date: Date) -> Vec<MealEntry> {
    meals.iter().filter(|m| m.date == date).cloned().collect()
}

pub fn total_calories(meals: &[MealEntry]) -> f64 {
    meals.iter().map(|m| m.calories).sum()
}

pub fn macro_totals(meals: &[MealEntry]) -> MacroTotals {
    meals.iter().fold(MacroTotals::default(), |acc, m| MacroTotals {
        protein: acc.protein + m.protein,
        carbohydrate: acc.carbohydrate + m.carbohydrate,
        fat: acc.fat + m.fat,
    })
}

/// Buckets meals by slot. Every slot is present in the result, even when empty.
pub fn group_by_slot(meals: &[MealEntry]) -> BTreeMap<MealSlot, Vec<MealEntry>> {
    let mut groups: BTreeMap<MealSlot, Vec<MealEntry>> =
        MealSlot::ALL.iter().map(|slot| (*slot, Vec::new())).collect();
    for meal in meals {
        groups.entry(meal.meal_slot).or_default().push(meal.clone());
    }
    groups
}

/// Ranks names (case-insensitive) by how often they were logged. Ties keep the
/// order in which the names were first seen; each name is represented by its
/// first logged entry.
pub fn most_frequent(meals: &[MealEntry], limit: usize) -> Vec<MealEntry> {
    struct Tally<'a> {
        first: &'a MealEntry,
        count: usize,
    }

    let mut index: HashMap<String, usize> = HashMap::new();
    let mut tallies: Vec<Tally<'_>> = Vec::new();
    for meal in meals {
        let i = *index.entry(meal.name.to_lowercase()).or_insert_with(|| {
            tallies.push(Tally { first: meal, count: 0 });
            tallies.len() - 1
        });
        tallies[i].count += 1;
    }

    // stable: equal counts stay in encounter order
    tallies.sort_by(|a, b| b.count.cmp(&a.count));
    tallies
        .into_iter()
        .take(limit)
        .map(|t| t.first.clone())
        .collect()
}
