use anyhow::{Context, Result};
use std::path::Path;
use std::process;

use foodlog_core::capture::decode_data_uri;
use foodlog_core::day_view::DayView;
use foodlog_core::models::EntryKind;
use foodlog_core::store::Store;

use super::helpers::{exit_not_found, json_error, parse_date};
use super::report_notice;

/// Write the photo attached to an entry to `path`.
pub(crate) async fn cmd_photo_save(
    store: &Store,
    kind: EntryKind,
    id: i64,
    path: &Path,
    date: Option<String>,
    json: bool,
) -> Result<()> {
    let date = parse_date(date)?;
    let mut view = DayView::open(store.clone(), date).await;
    report_notice(&mut view);

    let Some(entry) = view.entry(kind, id) else {
        exit_not_found(kind, id, &view.date_str(), json);
    };
    if entry.image().is_empty() {
        let message = format!("{kind} entry {id} has no photo");
        if json {
            println!("{}", json_error(&message));
        } else {
            eprintln!("{message}");
        }
        process::exit(2);
    }

    let (mime, bytes) = decode_data_uri(entry.image())?;
    tokio::fs::write(path, &bytes)
        .await
        .with_context(|| format!("Failed to write {}", path.display()))?;

    if json {
        println!(
            "{}",
            serde_json::json!({
                "saved": path.display().to_string(),
                "mime": mime,
                "bytes": bytes.len(),
            })
        );
    } else {
        println!(
            "Saved photo of {} to {} ({mime}, {} bytes)",
            entry.name(),
            path.display(),
            bytes.len()
        );
    }
    Ok(())
}
