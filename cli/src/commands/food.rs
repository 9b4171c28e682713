use anyhow::{Context, Result, bail};
use clap::Args;
use std::path::PathBuf;
use tracing::debug;

use foodlog_core::capture::CaptureSource;
use foodlog_core::day_view::DayView;
use foodlog_core::error::ViewError;
use foodlog_core::models::{DATE_FORMAT, Draft, EntryKind, FoodEntry, MealType};
use foodlog_core::store::Store;

use super::helpers::{exit_not_found, parse_date, parse_time, print_unlisted_save};
use super::{ensure_writable, report_notice, stage_photo};
use crate::config::Config;

#[derive(Args)]
pub(crate) struct FoodAddArgs {
    /// What you ate or drank
    pub name: String,
    /// Meal: breakfast, lunch, dinner, snack, drink
    #[arg(short, long, default_value = "breakfast")]
    pub meal: MealType,
    /// Time eaten (HH:MM, default: now)
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
pub(crate) struct FoodEditArgs {
    /// Entry ID to edit
    pub id: i64,
    /// Date the entry is logged on (default: today)
    #[arg(long)]
    pub date: Option<String>,
    /// New name
    #[arg(long)]
    pub name: Option<String>,
    /// New meal: breakfast, lunch, dinner, snack, drink
    #[arg(short, long)]
    pub meal: Option<MealType>,
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

pub(crate) async fn cmd_food_add(store: &Store, config: &Config, args: FoodAddArgs) -> Result<()> {
    let date = parse_date(args.date)?;
    let time = args.time.as_deref().map(parse_time).transpose()?;

    let mut view = DayView::open(store.clone(), date).await;
    ensure_writable(&mut view)?;

    let mut draft = view
        .open_create(EntryKind::Food)
        .into_food()
        .context("Expected a food form")?;
    draft.name = args.name;
    draft.meal_type = args.meal;
    if let Some(time) = time {
        draft.time = time;
    }
    if let Some(note) = args.note {
        draft.note = note;
    }

    stage_photo(&mut view, config, args.image, args.photo).await?;
    let id = view.submit(Draft::Food(draft)).await?;
    report_notice(&mut view);

    match view.foods().iter().find(|f| f.id == id) {
        Some(entry) => print_saved("Logged", entry, args.json),
        None => {
            print_unlisted_save("Logged", EntryKind::Food, id, args.json);
            Ok(())
        }
    }
}

pub(crate) async fn cmd_food_edit(
    store: &Store,
    config: &Config,
    args: FoodEditArgs,
) -> Result<()> {
    let FoodEditArgs {
        id,
        date,
        name,
        meal,
        time,
        note,
        move_to,
        photo,
        image,
        clear_image,
        json,
    } = args;

    if name.is_none()
        && meal.is_none()
        && time.is_none()
        && note.is_none()
        && move_to.is_none()
        && photo.is_none()
        && image.is_none()
        && !clear_image
    {
        bail!(
            "Nothing to update. Provide at least one of --name, --meal, --time, --note, --move-to, --photo, --image or --clear-image"
        );
    }

    let date = parse_date(date)?;
    let time = time.as_deref().map(parse_time).transpose()?;
    let move_to = move_to.map(Some).map(parse_date).transpose()?;

    let mut view = DayView::open(store.clone(), date).await;
    ensure_writable(&mut view)?;

    let Ok(draft) = view.open_edit(EntryKind::Food, id) else {
        report_notice(&mut view);
        exit_not_found(EntryKind::Food, id, &view.date_str(), json);
    };
    let mut draft = draft.into_food().context("Expected a food form")?;
    if let Some(name) = name {
        draft.name = name;
    }
    if let Some(meal) = meal {
        draft.meal_type = meal;
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

    view.submit(Draft::Food(draft)).await?;
    if let Some(target) = move_to {
        // The save went through; a failed reload is reported as a notice.
        if let Err(e) = view.select_date(target).await {
            debug!(error = %e, "Reload after move failed");
        }
    }
    report_notice(&mut view);

    match view.foods().iter().find(|f| f.id == id) {
        Some(entry) => print_saved("Updated", entry, json),
        None => {
            print_unlisted_save("Updated", EntryKind::Food, id, json);
            Ok(())
        }
    }
}

pub(crate) async fn cmd_food_delete(
    store: &Store,
    id: i64,
    date: Option<String>,
    json: bool,
) -> Result<()> {
    let date = parse_date(date)?;
    let mut view = DayView::open(store.clone(), date).await;
    ensure_writable(&mut view)?;

    match view.delete(EntryKind::Food, id).await {
        Ok(true) => {
            report_notice(&mut view);
            if json {
                println!("{}", serde_json::json!({ "deleted": id, "kind": "food" }));
            } else {
                println!("Deleted food entry {id}");
            }
            Ok(())
        }
        Ok(false) | Err(ViewError::NotListed { .. }) => {
            report_notice(&mut view);
            exit_not_found(EntryKind::Food, id, &view.date_str(), json);
        }
        Err(e) => Err(e.into()),
    }
}

fn print_saved(verb: &str, entry: &FoodEntry, json: bool) -> Result<()> {
    if json {
        println!("{}", serde_json::to_string_pretty(entry)?);
    } else {
        let FoodEntry {
            id,
            meal_type,
            name,
            time,
            date,
            ..
        } = entry;
        let meal = meal_type.label();
        let photo = if entry.image.is_empty() { "" } else { " (with photo)" };
        println!("{verb} [{id}] {name} for {meal} at {time} on {date}{photo}");
    }
    Ok(())
}
