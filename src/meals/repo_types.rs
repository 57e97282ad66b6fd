use serde::{Deserialize, Serialize};
use time::format_description::BorrowedFormatItem;
use time::macros::format_description;
use time::Date;
use uuid::Uuid;

/// Calendar dates travel as `YYYY-MM-DD` everywhere (file, HTTP, query strings).
pub const DATE_FORMAT: &[BorrowedFormatItem<'static>] =
    format_description!("[year]-[month]-[day]");

pub(crate) mod iso_date {
    use serde::{de, ser, Deserialize, Deserializer, Serializer};
    use time::Date;

    use super::DATE_FORMAT;

    pub fn serialize<S: Serializer>(date: &Date, s: S) -> Result<S::Ok, S::Error> {
        let text = date.format(DATE_FORMAT).map_err(ser::Error::custom)?;
        s.serialize_str(&text)
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<Date, D::Error> {
        let text = String::deserialize(d)?;
        Date::parse(&text, DATE_FORMAT).map_err(de::Error::custom)
    }

    pub mod option {
        use serde::{de, Deserialize, Deserializer, Serializer};
        use time::Date;

        use super::DATE_FORMAT;

        pub fn serialize<S: Serializer>(date: &Option<Date>, s: S) -> Result<S::Ok, S::Error> {
            match date {
                Some(date) => super::serialize(date, s),
                None => s.serialize_none(),
            }
        }

        pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<Option<Date>, D::Error> {
            Option::<String>::deserialize(d)?
                .map(|text| Date::parse(&text, DATE_FORMAT))
                .transpose()
                .map_err(de::Error::custom)
        }
    }
}

/// Eating occasion a meal is bucketed into.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum MealSlot {
    Breakfast,
    Lunch,
    Dinner,
    Snack,
}

impl MealSlot {
    pub const ALL: [MealSlot; 4] = [
        MealSlot::Breakfast,
        MealSlot::Lunch,
        MealSlot::Dinner,
        MealSlot::Snack,
    ];
}

/// A logged meal. Owned by the store and persisted as part of the full list.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MealEntry {
    pub id: Uuid,
    #[serde(with = "iso_date")]
    pub date: Date,
    pub name: String,
    pub calories: f64,
    pub protein: f64,
    pub carbohydrate: f64,
    pub fat: f64,
    pub meal_slot: MealSlot,
}

/// A meal as the user submits it, before the store assigns an id.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NewMealEntry {
    #[serde(default, with = "iso_date::option")]
    pub date: Option<Date>,
    pub name: String,
    pub calories: f64,
    pub protein: f64,
    pub carbohydrate: f64,
    pub fat: f64,
    pub meal_slot: MealSlot,
}

impl NewMealEntry {
    pub(crate) fn into_entry(self, id: Uuid, today: Date) -> MealEntry {
        MealEntry {
            id,
            date: self.date.unwrap_or(today),
            name: self.name,
            calories: self.calories,
            protein: self.protein,
            carbohydrate: self.carbohydrate,
            fat: self.fat,
            meal_slot: self.meal_slot,
        }
    }
}

/// Partial update: present fields replace the stored ones, `id` is never touched.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct MealPatch {
    #[serde(default, with = "iso_date::option", skip_serializing_if = "Option::is_none")]
    pub date: Option<Date>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub calories: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub protein: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub carbohydrate: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub fat: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub meal_slot: Option<MealSlot>,
}

impl MealPatch {
    pub fn apply(self, meal: &mut MealEntry) {
        if let Some(date) = self.date {
            meal.date = date;
        }
        if let Some(name) = self.name {
            meal.name = name;
        }
        if let Some(v) = self.calories {
            meal.calories = v;
        }
        if let Some(v) = self.protein {
            meal.protein = v;
        }
        if let Some(v) = self.carbohydrate {
            meal.carbohydrate = v;
        }
        if let Some(v) = self.fat {
            meal.fat = v;
        }
        if let Some(slot) = self.meal_slot {
            meal.meal_slot = slot;
        }
    }
}

/// Catalog row from the ready-made foods collection. Never written back.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, sqlx::FromRow)]
pub struct ReadyMadeFood {
    pub name: String,
    pub calories: f64,
    pub protein: f64,
    pub carbohydrate: f64,
    pub fat: f64,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct MacroTotals {
    pub protein: f64,
    pub carbohydrate: f64,
    pub fat: f64,
}
