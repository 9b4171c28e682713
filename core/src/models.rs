use std::fmt;
use std::str::FromStr;

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use crate::error::ValidationError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MealType {
    Breakfast,
    Lunch,
    Dinner,
    Snack,
    Drink,
}

impl MealType {
    pub const ALL: [MealType; 5] = [
        MealType::Breakfast,
        MealType::Lunch,
        MealType::Dinner,
        MealType::Snack,
        MealType::Drink,
    ];

    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            MealType::Breakfast => "breakfast",
            MealType::Lunch => "lunch",
            MealType::Dinner => "dinner",
            MealType::Snack => "snack",
            MealType::Drink => "drink",
        }
    }

    #[must_use]
    pub fn label(self) -> &'static str {
        match self {
            MealType::Breakfast => "Breakfast",
            MealType::Lunch => "Lunch",
            MealType::Dinner => "Dinner",
            MealType::Snack => "Snack",
            MealType::Drink => "Drink",
        }
    }
}

impl fmt::Display for MealType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for MealType {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let lower = s.trim().to_lowercase();
        MealType::ALL
            .into_iter()
            .find(|m| m.as_str() == lower)
            .ok_or_else(|| {
                ValidationError(format!(
                    "Invalid meal type '{s}'. Must be one of: {}",
                    MealType::ALL.map(MealType::as_str).join(", ")
                ))
            })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ExerciseType {
    Running,
    Cycling,
    Gym,
    Badminton,
    Other,
}

impl ExerciseType {
    pub const ALL: [ExerciseType; 5] = [
        ExerciseType::Running,
        ExerciseType::Cycling,
        ExerciseType::Gym,
        ExerciseType::Badminton,
        ExerciseType::Other,
    ];

    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            ExerciseType::Running => "running",
            ExerciseType::Cycling => "cycling",
            ExerciseType::Gym => "gym",
            ExerciseType::Badminton => "badminton",
            ExerciseType::Other => "other",
        }
    }

    #[must_use]
    pub fn label(self) -> &'static str {
        match self {
            ExerciseType::Running => "Running",
            ExerciseType::Cycling => "Cycling",
            ExerciseType::Gym => "Gym",
            ExerciseType::Badminton => "Badminton",
            ExerciseType::Other => "Other",
        }
    }
}

impl fmt::Display for ExerciseType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ExerciseType {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let lower = s.trim().to_lowercase();
        ExerciseType::ALL
            .into_iter()
            .find(|t| t.as_str() == lower)
            .ok_or_else(|| {
                ValidationError(format!(
                    "Invalid exercise type '{s}'. Must be one of: {}",
                    ExerciseType::ALL.map(ExerciseType::as_str).join(", ")
                ))
            })
    }
}

/// Which of the two record tables an operation targets.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EntryKind {
    Food,
    Exercise,
}

impl EntryKind {
    #[must_use]
    pub fn table(self) -> &'static str {
        match self {
            EntryKind::Food => "foods",
            EntryKind::Exercise => "exercises",
        }
    }

    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            EntryKind::Food => "food",
            EntryKind::Exercise => "exercise",
        }
    }
}

impl fmt::Display for EntryKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for EntryKind {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "food" | "foods" | "meal" => Ok(EntryKind::Food),
            "exercise" | "exercises" => Ok(EntryKind::Exercise),
            _ => Err(ValidationError(format!(
                "Invalid entry kind '{s}'. Must be one of: food, exercise"
            ))),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FoodEntry {
    pub id: i64,
    pub meal_type: MealType,
    pub name: String,
    pub time: String,
    #[serde(default)]
    pub note: String,
    #[serde(default)]
    pub image: String,
    pub date: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewFoodEntry {
    pub meal_type: MealType,
    pub name: String,
    pub time: String,
    #[serde(default)]
    pub note: String,
    #[serde(default)]
    pub image: String,
    pub date: String,
}

impl NewFoodEntry {
    #[must_use]
    pub fn with_id(self, id: i64) -> FoodEntry {
        FoodEntry {
            id,
            meal_type: self.meal_type,
            name: self.name,
            time: self.time,
            note: self.note,
            image: self.image,
            date: self.date,
        }
    }
}

impl From<FoodEntry> for NewFoodEntry {
    fn from(entry: FoodEntry) -> Self {
        Self {
            meal_type: entry.meal_type,
            name: entry.name,
            time: entry.time,
            note: entry.note,
            image: entry.image,
            date: entry.date,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExerciseEntry {
    pub id: i64,
    pub exercise_type: ExerciseType,
    pub name: String,
    #[serde(default)]
    pub duration: String,
    #[serde(default)]
    pub calories: String,
    pub time: String,
    #[serde(default)]
    pub note: String,
    #[serde(default)]
    pub image: String,
    pub date: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewExerciseEntry {
    pub exercise_type: ExerciseType,
    pub name: String,
    #[serde(default)]
    pub duration: String,
    #[serde(default)]
    pub calories: String,
    pub time: String,
    #[serde(default)]
    pub note: String,
    #[serde(default)]
    pub image: String,
    pub date: String,
}

impl NewExerciseEntry {
    #[must_use]
    pub fn with_id(self, id: i64) -> ExerciseEntry {
        ExerciseEntry {
            id,
            exercise_type: self.exercise_type,
            name: self.name,
            duration: self.duration,
            calories: self.calories,
            time: self.time,
            note: self.note,
            image: self.image,
            date: self.date,
        }
    }
}

impl From<ExerciseEntry> for NewExerciseEntry {
    fn from(entry: ExerciseEntry) -> Self {
        Self {
            exercise_type: entry.exercise_type,
            name: entry.name,
            duration: entry.duration,
            calories: entry.calories,
            time: entry.time,
            note: entry.note,
            image: entry.image,
            date: entry.date,
        }
    }
}

/// A stored record of either kind.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum Entry {
    Food(FoodEntry),
    Exercise(ExerciseEntry),
}

impl Entry {
    #[must_use]
    pub fn id(&self) -> i64 {
        match self {
            Entry::Food(e) => e.id,
            Entry::Exercise(e) => e.id,
        }
    }

    #[must_use]
    pub fn kind(&self) -> EntryKind {
        match self {
            Entry::Food(_) => EntryKind::Food,
            Entry::Exercise(_) => EntryKind::Exercise,
        }
    }

    #[must_use]
    pub fn name(&self) -> &str {
        match self {
            Entry::Food(e) => &e.name,
            Entry::Exercise(e) => &e.name,
        }
    }

    #[must_use]
    pub fn time(&self) -> &str {
        match self {
            Entry::Food(e) => &e.time,
            Entry::Exercise(e) => &e.time,
        }
    }

    #[must_use]
    pub fn date(&self) -> &str {
        match self {
            Entry::Food(e) => &e.date,
            Entry::Exercise(e) => &e.date,
        }
    }

    #[must_use]
    pub fn image(&self) -> &str {
        match self {
            Entry::Food(e) => &e.image,
            Entry::Exercise(e) => &e.image,
        }
    }
}

/// Form payload for either kind, before the store assigns an id.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum Draft {
    Food(NewFoodEntry),
    Exercise(NewExerciseEntry),
}

impl Draft {
    #[must_use]
    pub fn kind(&self) -> EntryKind {
        match self {
            Draft::Food(_) => EntryKind::Food,
            Draft::Exercise(_) => EntryKind::Exercise,
        }
    }

    #[must_use]
    pub fn name(&self) -> &str {
        match self {
            Draft::Food(d) => &d.name,
            Draft::Exercise(d) => &d.name,
        }
    }

    #[must_use]
    pub fn date(&self) -> &str {
        match self {
            Draft::Food(d) => &d.date,
            Draft::Exercise(d) => &d.date,
        }
    }

    #[must_use]
    pub fn time(&self) -> &str {
        match self {
            Draft::Food(d) => &d.time,
            Draft::Exercise(d) => &d.time,
        }
    }

    pub fn set_image(&mut self, image: String) {
        match self {
            Draft::Food(d) => d.image = image,
            Draft::Exercise(d) => d.image = image,
        }
    }

    pub fn set_time(&mut self, time: String) {
        match self {
            Draft::Food(d) => d.time = time,
            Draft::Exercise(d) => d.time = time,
        }
    }

    #[must_use]
    pub fn into_food(self) -> Option<NewFoodEntry> {
        match self {
            Draft::Food(d) => Some(d),
            Draft::Exercise(_) => None,
        }
    }

    #[must_use]
    pub fn into_exercise(self) -> Option<NewExerciseEntry> {
        match self {
            Draft::Exercise(d) => Some(d),
            Draft::Food(_) => None,
        }
    }
}

impl From<Entry> for Draft {
    fn from(entry: Entry) -> Self {
        match entry {
            Entry::Food(e) => Draft::Food(e.into()),
            Entry::Exercise(e) => Draft::Exercise(e.into()),
        }
    }
}

pub const DATE_FORMAT: &str = "%Y-%m-%d";

pub fn validate_name(name: &str) -> Result<(), ValidationError> {
    if name.trim().is_empty() {
        return Err(ValidationError("Name must not be empty".to_string()));
    }
    Ok(())
}

pub fn validate_date(date: &str) -> Result<NaiveDate, ValidationError> {
    NaiveDate::parse_from_str(date, DATE_FORMAT)
        .map_err(|_| ValidationError(format!("Invalid date '{date}'. Must be YYYY-MM-DD")))
}

/// Normalise `H:MM` / `HH:MM` to zero-padded `HH:MM`.
///
/// Lists are ordered by comparing `time` as a string, so an unpadded `8:30`
/// would sort after `10:00`.
pub fn normalize_time(time: &str) -> Result<String, ValidationError> {
    let invalid = || ValidationError(format!("Invalid time '{time}'. Use HH:MM (e.g. 08:30)"));
    let (h, m) = time.trim().split_once(':').ok_or_else(invalid)?;
    if h.is_empty() || h.len() > 2 || m.len() != 2 {
        return Err(invalid());
    }
    let hours: u32 = h.parse().map_err(|_| invalid())?;
    let minutes: u32 = m.parse().map_err(|_| invalid())?;
    if hours > 23 || minutes > 59 {
        return Err(invalid());
    }
    Ok(format!("{hours:02}:{minutes:02}"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_meal_type_parse() {
        assert_eq!("breakfast".parse::<MealType>().unwrap(), MealType::Breakfast);
        assert_eq!("Drink".parse::<MealType>().unwrap(), MealType::Drink);
        assert_eq!(" LUNCH ".parse::<MealType>().unwrap(), MealType::Lunch);
    }

    #[test]
    fn test_meal_type_invalid() {
        let err = "brunch".parse::<MealType>().unwrap_err();
        assert!(err.to_string().contains("breakfast, lunch, dinner, snack, drink"));
        assert!("".parse::<MealType>().is_err());
    }

    #[test]
    fn test_exercise_type_parse() {
        assert_eq!("gym".parse::<ExerciseType>().unwrap(), ExerciseType::Gym);
        assert_eq!(
            "Badminton".parse::<ExerciseType>().unwrap(),
            ExerciseType::Badminton
        );
        assert!("swimming".parse::<ExerciseType>().is_err());
    }

    #[test]
    fn test_entry_kind_parse() {
        assert_eq!("food".parse::<EntryKind>().unwrap(), EntryKind::Food);
        assert_eq!("exercises".parse::<EntryKind>().unwrap(), EntryKind::Exercise);
        assert!("weight".parse::<EntryKind>().is_err());
        assert_eq!(EntryKind::Food.table(), "foods");
        assert_eq!(EntryKind::Exercise.table(), "exercises");
    }

    #[test]
    fn test_food_entry_json_field_names() {
        let entry = NewFoodEntry {
            meal_type: MealType::Snack,
            name: "Apple".to_string(),
            time: "15:00".to_string(),
            note: String::new(),
            image: String::new(),
            date: "2024-01-01".to_string(),
        }
        .with_id(7);
        let json = serde_json::to_value(&entry).unwrap();
        assert_eq!(json["mealType"], "snack");
        assert_eq!(json["id"], 7);
        assert_eq!(json["date"], "2024-01-01");
    }

    #[test]
    fn test_food_entry_missing_optional_fields() {
        let entry: FoodEntry = serde_json::from_str(
            r#"{"id":1,"mealType":"lunch","name":"Soup","time":"12:00","date":"2024-01-01"}"#,
        )
        .unwrap();
        assert_eq!(entry.note, "");
        assert_eq!(entry.image, "");
    }

    #[test]
    fn test_exercise_entry_json_field_names() {
        let entry = NewExerciseEntry {
            exercise_type: ExerciseType::Running,
            name: "Morning run".to_string(),
            duration: "30 min".to_string(),
            calories: "300".to_string(),
            time: "07:00".to_string(),
            note: String::new(),
            image: String::new(),
            date: "2024-01-01".to_string(),
        }
        .with_id(3);
        let json = serde_json::to_value(&entry).unwrap();
        assert_eq!(json["exerciseType"], "running");
        assert_eq!(json["calories"], "300");
    }

    #[test]
    fn test_draft_from_entry_keeps_fields() {
        let entry = Entry::Food(FoodEntry {
            id: 4,
            meal_type: MealType::Dinner,
            name: "Pasta".to_string(),
            time: "19:30".to_string(),
            note: "with pesto".to_string(),
            image: "data:image/jpeg;base64,AAAA".to_string(),
            date: "2024-02-02".to_string(),
        });
        let draft = Draft::from(entry);
        assert_eq!(draft.kind(), EntryKind::Food);
        assert_eq!(draft.name(), "Pasta");
        assert_eq!(draft.time(), "19:30");
        assert_eq!(draft.date(), "2024-02-02");
    }

    #[test]
    fn test_validate_name() {
        assert!(validate_name("Oatmeal").is_ok());
        assert!(validate_name("   ").is_err());
        assert!(validate_name("").is_err());
    }

    #[test]
    fn test_validate_date() {
        assert_eq!(
            validate_date("2024-01-15").unwrap(),
            NaiveDate::from_ymd_opt(2024, 1, 15).unwrap()
        );
        assert!(validate_date("2024-13-01").is_err());
        assert!(validate_date("15/01/2024").is_err());
    }

    #[test]
    fn test_normalize_time() {
        assert_eq!(normalize_time("08:00").unwrap(), "08:00");
        assert_eq!(normalize_time("8:05").unwrap(), "08:05");
        assert_eq!(normalize_time(" 23:59 ").unwrap(), "23:59");
    }

    #[test]
    fn test_normalize_time_invalid() {
        assert!(normalize_time("24:00").is_err());
        assert!(normalize_time("12:60").is_err());
        assert!(normalize_time("12").is_err());
        assert!(normalize_time("12:5").is_err());
        assert!(normalize_time("ab:cd").is_err());
        assert!(normalize_time("123:00").is_err());
    }
}
