use anyhow::{Context, Result, bail};
use clap::Args;
use std::path::PathBuf;
use tracing::debug;

use foodlog_core::capture::CaptureSource;
use foodlog_core::day_view::DayView;
use foodlog_core::error::ViewError;
use foodlog_core::models::{DATE_FORMAT, Draft, EntryKind, ExerciseEntry, ExerciseType};
use foodlog_core::store::Store;

use super::helpers::{exit_not_found, parse_date, parse_time, print_unlisted_save};
use super::{ensure_writable, report_notice, stage_photo};
use crate::config::Config;

#[derive(Args)]
pub(crate) struct ExerciseAddArgs {
    /// What you did
    pub name: String,
    /// Type: running, cycling, gym, badminton, other
    #[arg(long = "type", default_value = "running")]
    pub exercise_type: ExerciseType,
    /// Duration, e.g. "30" or "45 min"
    #[arg(short, long)]
    pub duration: Option<String>,
    /// Calories burned
    #[arg(short, long)]
    pub calories: Option<String>,
    /// Start time (HH:MM, default: now)
    #[arg(short, long)]
    pub time: Option<String>,
    /// Date to log for (YYYY-MM-DD or today/yesterday/tomorrow, default: today)
    #[arg(long)]
    pub date: Option<String>,
    /// Free-form note
    #[arg(short, long)]
    pub note: Option<String>,
    /// Attach a photo: camera, gallery or prompt
    #[arg(long, value_name = "SOURCE")]
    pub photo: Option<CaptureSource>,
    /// Attach the image at this path
    #[arg(long, value_name = "PATH", conflicts_with = "photo")]
    pub image: Option<PathBuf>,
    /// Output as JSON
    #[arg(long)]
    pub json: bool,
}

#[derive(Args)]
pub(crate) struct ExerciseEditArgs {
    /// Entry ID to edit
    pub id: i64,
    /// Date the entry is logged on (default: today)
    #[arg(long)]
    pub date: Option<String>,
    /// New name
    #[arg(long)]
    pub name: Option<String>,
    /// New type: running, cycling, gym, badminton, other
    #[arg(long = "type")]
    pub exercise_type: Option<ExerciseType>,
    /// New duration
    #[arg(short, long)]
    pub duration: Option<String>,
    /// New calories burned
    #[arg(short, long)]
    pub calories: Option<String>,
    /// New time (HH:MM)
    #[arg(short, long)]
    pub time: Option<String>,
    /// New note (empty string clears it)
    #[arg(short, long)]
    pub note: Option<String>,
    /// Move the entry to another date
    #[arg(long, value_name = "DATE")]
    pub move_to: Option<String>,
    /// Replace the photo: camera, gallery or prompt
    #[arg(long, value_name = "SOURCE")]
    pub photo: Option<CaptureSource>,
    /// Replace the photo with the image at this path
    #[arg(long, value_name = "PATH", conflicts_with = "photo")]
    pub image: Option<PathBuf>,
    /// Remove the photo
    #[arg(long, conflicts_with_all = ["photo", "image"])]
    pub clear_image: bool,
    /// Output as JSON
    #[arg(long)]
    pub json: bool,
}

pub(crate) async fn cmd_exercise_add(
    store: &Store,
    config: &Config,
    args: ExerciseAddArgs,
) -> Result<()> {
    let date = parse_date(args.date)?;
    let time = args.time.as_deref().map(parse_time).transpose()?;

    let mut view = DayView::open(store.clone(), date).await;
    ensure_writable(&mut view)?;

    let mut draft = view
        .open_create(EntryKind::Exercise)
        .into_exercise()
        .context("Expected an exercise form")?;
    draft.name = args.name;
    draft.exercise_type = args.exercise_type;
    draft.duration = args.duration.unwrap_or_default();
    draft.calories = args.calories.unwrap_or_default();
    if let Some(time) = time {
        draft.time = time;
    }
    if let Some(note) = args.note {
        draft.note = note;
    }

    stage_photo(&mut view, config, args.image, args.photo).await?;
    let id = view.submit(Draft::Exercise(draft)).await?;
    report_notice(&mut view);

    match view.exercises().iter().find(|e| e.id == id) {
        Some(entry) => print_saved("Logged", entry, args.json),
        None => {
            print_unlisted_save("Logged", EntryKind::Exercise, id, args.json);
            Ok(())
        }
    }
}

pub(crate) async fn cmd_exercise_edit(
    store: &Store,
    config: &Config,
    args: ExerciseEditArgs,
) -> Result<()> {
    let ExerciseEditArgs {
        id,
        date,
        name,
        exercise_type,
        duration,
        calories,
        time,
        note,
        move_to,
        photo,
        image,
        clear_image,
        json,
    } = args;

    if name.is_none()
        && exercise_type.is_none()
        && duration.is_none()
        && calories.is_none()
        && time.is_none()
        && note.is_none()
        && move_to.is_none()
        && photo.is_none()
        && image.is_none()
        && !clear_image
    {
        bail!(
            "Nothing to update. Provide at least one of --name, --type, --duration, --calories, --time, --note, --move-to, --photo, --image or --clear-image"
        );
    }

    let date = parse_date(date)?;
    let time = time.as_deref().map(parse_time).transpose()?;
    let move_to = move_to.map(Some).map(parse_date).transpose()?;

    let mut view = DayView::open(store.clone(), date).await;
    ensure_writable(&mut view)?;

    let Ok(draft) = view.open_edit(EntryKind::Exercise, id) else {
        report_notice(&mut view);
        exit_not_found(EntryKind::Exercise, id, &view.date_str(), json);
    };
    let mut draft = draft
        .into_exercise()
        .context("Expected an exercise form")?;
    if let Some(name) = name {
        draft.name = name;
    }
    if let Some(exercise_type) = exercise_type {
        draft.exercise_type = exercise_type;
    }
    if let Some(duration) = duration {
        draft.duration = duration;
    }
    if let Some(calories) = calories {
        draft.calories = calories;
    }
    if let Some(time) = time {
        draft.time = time;
    }
    if let Some(note) = note {
        draft.note = note;
    }
    if let Some(target) = move_to {
        draft.date = target.format(DATE_FORMAT).to_string();
    }
    if clear_image {
        view.clear_image();
    }
    stage_photo(&mut view, config, image, photo).await?;

    view.submit(Draft::Exercise(draft)).await?;
    if let Some(target) = move_to {
        // The save went through; a failed reload is reported as a notice.
        if let Err(e) = view.select_date(target).await {
            debug!(error = %e, "Reload after move failed");
        }
    }
    report_notice(&mut view);

    match view.exercises().iter().find(|e| e.id == id) {
        Some(entry) => print_saved("Updated", entry, json),
        None => {
            print_unlisted_save("Updated", EntryKind::Exercise, id, json);
            Ok(())
        }
    }
}

pub(crate) async fn cmd_exercise_delete(
    store: &Store,
    id: i64,
    date: Option<String>,
    json: bool,
) -> Result<()> {
    let date = parse_date(date)?;
    let mut view = DayView::open(store.clone(), date).await;
    ensure_writable(&mut view)?;

    match view.delete(EntryKind::Exercise, id).await {
        Ok(true) => {
            report_notice(&mut view);
            if json {
                println!("{}", serde_json::json!({ "deleted": id, "kind": "exercise" }));
            } else {
                println!("Deleted exercise entry {id}");
            }
            Ok(())
        }
        Ok(false) | Err(ViewError::NotListed { .. }) => {
            report_notice(&mut view);
            exit_not_found(EntryKind::Exercise, id, &view.date_str(), json);
        }
        Err(e) => Err(e.into()),
    }
}

fn print_saved(verb: &str, entry: &ExerciseEntry, json: bool) -> Result<()> {
    if json {
        println!("{}", serde_json::to_string_pretty(entry)?);
        return Ok(());
    }
    let ExerciseEntry {
        id,
        exercise_type,
        name,
        duration,
        calories,
        time,
        date,
        ..
    } = entry;
    let kind = exercise_type.label();
    let mut details = Vec::new();
    if !duration.is_empty() {
        details.push(format!("duration {duration}"));
    }
    if !calories.is_empty() {
        details.push(format!("{calories} kcal"));
    }
    if !entry.image.is_empty() {
        details.push("with photo".to_string());
    }
    let details = if details.is_empty() {
        String::new()
    } else {
        format!(" ({})", details.join(", "))
    };
    println!("{verb} [{id}] {name} ({kind}) at {time} on {date}{details}");
    Ok(())
}
