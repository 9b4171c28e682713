mod day;
mod exercise;
mod food;
mod helpers;
mod photo;

use anyhow::{Result, bail};
use std::path::PathBuf;

use foodlog_core::capture::CaptureSource;
use foodlog_core::day_view::DayView;

use crate::config::Config;
use crate::media::{file_capturer, terminal_capturer};

pub(crate) use day::{cmd_backend, cmd_day};
pub(crate) use exercise::{
    ExerciseAddArgs, ExerciseEditArgs, cmd_exercise_add, cmd_exercise_delete, cmd_exercise_edit,
};
pub(crate) use food::{FoodAddArgs, FoodEditArgs, cmd_food_add, cmd_food_delete, cmd_food_edit};
pub(crate) use helpers::{prompt_choice, prompt_line};
pub(crate) use photo::cmd_photo_save;

/// Refuse to start a write when no backend could be opened.
pub(super) fn ensure_writable(view: &mut DayView) -> Result<()> {
    if view.is_read_only() {
        let notice = view
            .take_notice()
            .unwrap_or_else(|| "Storage is unavailable".to_string());
        bail!("{notice}");
    }
    Ok(())
}

/// Stage a photo into the open form from `--image` or `--photo`.
pub(super) async fn stage_photo(
    view: &mut DayView,
    config: &Config,
    image: Option<PathBuf>,
    photo: Option<CaptureSource>,
) -> Result<()> {
    if let Some(path) = image {
        view.attach_image(&file_capturer(path), CaptureSource::Prompt)
            .await?;
    } else if let Some(source) = photo {
        let attached = view
            .attach_image(&terminal_capturer(config), source)
            .await?;
        if !attached {
            eprintln!("No photo attached");
        }
    }
    Ok(())
}

/// Print any notice the view raised without failing the command.
pub(super) fn report_notice(view: &mut DayView) {
    if let Some(notice) = view.take_notice() {
        eprintln!("Warning: {notice}");
    }
}
