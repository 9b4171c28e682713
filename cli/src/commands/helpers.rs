use anyhow::{Context, Result, bail};
use chrono::{Local, NaiveDate};
use serde::Serialize;
use std::io::{self, BufRead, Write};
use std::process;

use foodlog_core::models::{DATE_FORMAT, EntryKind, normalize_time};

pub(crate) fn parse_date(date_str: Option<String>) -> Result<NaiveDate> {
    match date_str {
        None => Ok(Local::now().date_naive()),
        Some(s) => match s.as_str() {
            "today" => Ok(Local::now().date_naive()),
            "yesterday" => Ok(Local::now().date_naive() - chrono::Duration::days(1)),
            "tomorrow" => Ok(Local::now().date_naive() + chrono::Duration::days(1)),
            _ => NaiveDate::parse_from_str(&s, DATE_FORMAT).with_context(|| {
                format!("Invalid date '{s}'. Use YYYY-MM-DD or today/yesterday/tomorrow")
            }),
        },
    }
}

/// Check a `--time` value early so a bad value fails before any photo prompt.
pub(crate) fn parse_time(time: &str) -> Result<String> {
    Ok(normalize_time(time)?)
}

/// Read one line from stdin after printing `prompt` to stderr.
/// Returns `None` on a blank line or end of input.
pub(crate) fn prompt_line(prompt: &str) -> Result<Option<String>> {
    eprint!("{prompt}");
    io::stderr().flush()?;
    let stdin = io::stdin();
    let Some(line) = stdin.lock().lines().next() else {
        return Ok(None);
    };
    let line = line?;
    let line = line.trim();
    if line.is_empty() {
        Ok(None)
    } else {
        Ok(Some(line.to_string()))
    }
}

/// Ask for a 1-based choice out of `count`. A blank answer cancels.
pub(crate) fn prompt_choice(what: &str, count: usize) -> Result<Option<usize>> {
    match prompt_line(&format!("\nSelect {what} (1-{count}, blank to cancel): "))? {
        None => Ok(None),
        Some(answer) => parse_choice(&answer, count).map(Some),
    }
}

fn parse_choice(answer: &str, count: usize) -> Result<usize> {
    let n: usize = answer.trim().parse().context("Invalid number")?;
    if n < 1 || n > count {
        bail!("Selection out of range");
    }
    Ok(n - 1)
}

pub(crate) fn json_error(message: &str) -> String {
    #[derive(Serialize)]
    struct CliError<'a> {
        error: &'a str,
    }
    serde_json::to_string(&CliError { error: message })
        .unwrap_or_else(|_| format!("{{\"error\":\"{message}\"}}"))
}

/// Report a missing entry and exit with status 2.
pub(crate) fn exit_not_found(kind: EntryKind, id: i64, date: &str, json: bool) -> ! {
    let message = format!("No {kind} entry {id} on {date}");
    if json {
        println!("{}", json_error(&message));
    } else {
        eprintln!("{message}");
    }
    process::exit(2);
}

/// Confirm a save when the reloaded day could not show the entry.
pub(crate) fn print_unlisted_save(verb: &str, kind: EntryKind, id: i64, json: bool) {
    if json {
        println!("{}", serde_json::json!({ "id": id, "kind": kind.as_str() }));
    } else {
        println!("{}", unlisted_save_message(verb, kind, id));
    }
}

fn unlisted_save_message(verb: &str, kind: EntryKind, id: i64) -> String {
    format!("{verb} {kind} entry {id}. Run `foodlog day` to see it once the store reads again.")
}

pub(crate) fn truncate(s: &str, max: usize) -> String {
    if s.chars().count() <= max {
        s.to_string()
    } else {
        let end = s.char_indices().nth(max - 3).map_or(s.len(), |(i, _)| i);
        format!("{}...", &s[..end])
    }
}

pub(crate) fn photo_marker(image: &str) -> &'static str {
    if image.is_empty() { "" } else { "yes" }
}
