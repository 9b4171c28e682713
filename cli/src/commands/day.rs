use anyhow::Result;
use chrono::Local;
use serde::Serialize;
use tabled::{
    Table, Tabled,
    settings::{Alignment, Modify, Style, object::Columns},
};

use foodlog_core::day_view::DayView;
use foodlog_core::models::{ExerciseEntry, FoodEntry};
use foodlog_core::store::{BackendKind, Store};

use super::helpers::{parse_date, photo_marker, truncate};
use super::report_notice;
use crate::config::Config;

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct DayReport<'a> {
    date: String,
    title: String,
    backend: Option<BackendKind>,
    read_only: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    notice: Option<&'a str>,
    foods: &'a [FoodEntry],
    exercises: &'a [ExerciseEntry],
}

#[derive(Tabled)]
struct FoodRow {
    #[tabled(rename = "ID")]
    id: i64,
    #[tabled(rename = "Time")]
    time: String,
    #[tabled(rename = "Name")]
    name: String,
    #[tabled(rename = "Note")]
    note: String,
    #[tabled(rename = "Photo")]
    photo: &'static str,
}

#[derive(Tabled)]
struct ExerciseRow {
    #[tabled(rename = "ID")]
    id: i64,
    #[tabled(rename = "Time")]
    time: String,
    #[tabled(rename = "Name")]
    name: String,
    #[tabled(rename = "Duration")]
    duration: String,
    #[tabled(rename = "Calories")]
    calories: String,
    #[tabled(rename = "Photo")]
    photo: &'static str,
}

pub(crate) async fn cmd_day(store: &Store, date: Option<String>, json: bool) -> Result<()> {
    let date = parse_date(date)?;
    let today = Local::now().date_naive();
    let mut view = DayView::open(store.clone(), date).await;

    if json {
        let report = DayReport {
            date: view.date_str(),
            title: view.title(today),
            backend: view.backend_kind(),
            read_only: view.is_read_only(),
            notice: view.notice(),
            foods: view.foods(),
            exercises: view.exercises(),
        };
        println!("{}", serde_json::to_string_pretty(&report)?);
        return Ok(());
    }

    report_notice(&mut view);

    let title = view.title(today);
    let date = view.date_str();
    let count = view.entry_count();
    let noun = if count == 1 { "entry" } else { "entries" };
    println!("=== {title} ({date}) ===  {count} {noun}\n");

    if count == 0 {
        println!("  Nothing logged yet. Add something with `foodlog food add` or `foodlog exercise add`.");
        return Ok(());
    }

    for (meal, foods) in view.food_groups() {
        println!("  {}", meal.label().to_uppercase());
        let rows: Vec<FoodRow> = foods
            .iter()
            .map(|f| FoodRow {
                id: f.id,
                time: f.time.clone(),
                name: truncate(&f.name, 35),
                note: truncate(&f.note, 30),
                photo: photo_marker(&f.image),
            })
            .collect();
        let table = Table::new(&rows).with(Style::rounded()).to_string();
        println!("{table}\n");
    }

    for (kind, exercises) in view.exercise_groups() {
        println!("  {}", kind.label().to_uppercase());
        let rows: Vec<ExerciseRow> = exercises
            .iter()
            .map(|e| ExerciseRow {
                id: e.id,
                time: e.time.clone(),
                name: truncate(&e.name, 35),
                duration: e.duration.clone(),
                calories: e.calories.clone(),
                photo: photo_marker(&e.image),
            })
            .collect();
        let table = Table::new(&rows)
            .with(Style::rounded())
            .with(Modify::new(Columns::new(3..5)).with(Alignment::right()))
            .to_string();
        println!("{table}\n");
    }

    Ok(())
}

pub(crate) async fn cmd_backend(store: &Store, config: &Config, json: bool) -> Result<()> {
    let kind = store.open().await?;
    let location = match kind {
        BackendKind::NativeSql => Some(config.db_path.display().to_string()),
        BackendKind::KeyValue => Some(config.kv_dir.display().to_string()),
        BackendKind::ResidentSql => None,
    };

    if json {
        println!(
            "{}",
            serde_json::json!({
                "backend": kind,
                "location": location,
                "dataDir": config.data_dir.display().to_string(),
            })
        );
    } else {
        match location {
            Some(location) => println!("Backend: {kind} ({location})"),
            None => println!("Backend: {kind} (entries are not kept after this command)"),
        }
    }
    Ok(())
}
