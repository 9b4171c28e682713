//! State behind the single day screen: the selected date, what was logged on
//! it, and the create/edit form. Front-ends render from this and feed user
//! actions back into it.

use chrono::{Local, NaiveDate};
use tracing::{debug, info, warn};

use crate::capture::{CaptureSource, Capturer};
use crate::error::{StoreError, ValidationError, ViewError};
use crate::models::{
    DATE_FORMAT, Draft, Entry, EntryKind, ExerciseEntry, ExerciseType, FoodEntry, MealType,
    NewExerciseEntry, NewFoodEntry, normalize_time, validate_date, validate_name,
};
use crate::store::{BackendKind, Store};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FormState {
    Closed,
    Create(EntryKind),
    Edit(EntryKind, i64),
}

pub struct DayView {
    store: Store,
    date: NaiveDate,
    foods: Vec<FoodEntry>,
    exercises: Vec<ExerciseEntry>,
    form: FormState,
    menu: Option<(EntryKind, i64)>,
    staged_image: String,
    read_only: bool,
    notice: Option<String>,
}

impl DayView {
    /// Open the store and load `date`. Never fails: when no backend can be
    /// opened the view comes up empty and read-only with a notice.
    pub async fn open(store: Store, date: NaiveDate) -> Self {
        let mut view = Self {
            store,
            date,
            foods: Vec::new(),
            exercises: Vec::new(),
            form: FormState::Closed,
            menu: None,
            staged_image: String::new(),
            read_only: false,
            notice: None,
        };

        match view.store.open().await {
            Ok(kind) => {
                debug!(backend = %kind, date = %view.date_str(), "Opened day view");
                // A read failure here is already recorded as the notice.
                let _ = view.reload().await;
            }
            Err(e) => {
                warn!(error = %e, "Storage unavailable, diary is read-only");
                view.read_only = true;
                view.notice = Some(format!("{e}. Entries cannot be saved right now."));
            }
        }
        view
    }

    #[must_use]
    pub fn date(&self) -> NaiveDate {
        self.date
    }

    #[must_use]
    pub fn date_str(&self) -> String {
        self.date.format(DATE_FORMAT).to_string()
    }

    #[must_use]
    pub fn foods(&self) -> &[FoodEntry] {
        &self.foods
    }

    #[must_use]
    pub fn exercises(&self) -> &[ExerciseEntry] {
        &self.exercises
    }

    #[must_use]
    pub fn form(&self) -> FormState {
        self.form
    }

    #[must_use]
    pub fn menu(&self) -> Option<(EntryKind, i64)> {
        self.menu
    }

    #[must_use]
    pub fn staged_image(&self) -> &str {
        &self.staged_image
    }

    #[must_use]
    pub fn is_read_only(&self) -> bool {
        self.read_only
    }

    #[must_use]
    pub fn backend_kind(&self) -> Option<BackendKind> {
        self.store.backend_kind()
    }

    #[must_use]
    pub fn notice(&self) -> Option<&str> {
        self.notice.as_deref()
    }

    pub fn take_notice(&mut self) -> Option<String> {
        self.notice.take()
    }

    pub async fn select_date(&mut self, date: NaiveDate) -> Result<(), ViewError> {
        self.date = date;
        self.menu = None;
        self.reload().await
    }

    /// Replace both lists with what the store holds for the selected date.
    pub async fn reload(&mut self) -> Result<(), ViewError> {
        if self.read_only {
            return Ok(());
        }
        let date = self.date_str();
        let loaded = async {
            let foods = self.store.foods_by_date(&date).await?;
            let exercises = self.store.exercises_by_date(&date).await?;
            Ok::<_, StoreError>((foods, exercises))
        }
        .await;

        match loaded {
            Ok((foods, exercises)) => {
                debug!(date = %date, foods = foods.len(), exercises = exercises.len(), "Loaded day");
                self.foods = foods;
                self.exercises = exercises;
                Ok(())
            }
            Err(e) => {
                warn!(date = %date, error = %e, "Failed to load day");
                self.foods.clear();
                self.exercises.clear();
                self.notice = Some(format!("Could not load entries for {date}: {e}"));
                Err(e.into())
            }
        }
    }

    /// Start a new entry with the defaults for `kind`.
    pub fn open_create(&mut self, kind: EntryKind) -> Draft {
        self.form = FormState::Create(kind);
        self.staged_image.clear();
        let time = Local::now().format("%H:%M").to_string();
        let date = self.date_str();
        match kind {
            EntryKind::Food => Draft::Food(NewFoodEntry {
                meal_type: MealType::Breakfast,
                name: String::new(),
                time,
                note: String::new(),
                image: String::new(),
                date,
            }),
            EntryKind::Exercise => Draft::Exercise(NewExerciseEntry {
                exercise_type: ExerciseType::Running,
                name: String::new(),
                duration: String::new(),
                calories: String::new(),
                time,
                note: String::new(),
                image: String::new(),
                date,
            }),
        }
    }

    /// Start editing an entry shown for the selected date.
    pub fn open_edit(&mut self, kind: EntryKind, id: i64) -> Result<Draft, ViewError> {
        let entry = self.entry(kind, id).ok_or_else(|| ViewError::NotListed {
            kind,
            id,
            date: self.date_str(),
        })?;
        self.form = FormState::Edit(kind, id);
        self.staged_image = entry.image().to_string();
        self.menu = None;
        Ok(Draft::from(entry))
    }

    pub fn close_form(&mut self) {
        self.form = FormState::Closed;
        self.staged_image.clear();
    }

    pub fn open_menu(&mut self, kind: EntryKind, id: i64) {
        self.menu = Some((kind, id));
    }

    pub fn close_menu(&mut self) {
        self.menu = None;
    }

    /// Capture a photo into the open form. Returns whether an image was
    /// staged; a cancelled capture keeps whatever was staged before.
    pub async fn attach_image(
        &mut self,
        capturer: &Capturer,
        source: CaptureSource,
    ) -> Result<bool, ViewError> {
        if self.form == FormState::Closed {
            return Err(ViewError::NoForm);
        }
        match capturer.capture(source).await {
            Ok(uri) if uri.is_empty() => Ok(false),
            Ok(uri) => {
                self.staged_image = uri;
                Ok(true)
            }
            Err(e) => {
                warn!(%source, error = %e, "Photo capture failed");
                self.notice = Some(e.to_string());
                Err(e.into())
            }
        }
    }

    pub fn clear_image(&mut self) {
        self.staged_image.clear();
    }

    /// Save the open form. Returns the id of the saved entry.
    ///
    /// Nothing is written and no state changes when the draft is invalid.
    /// A store failure leaves the form open so the user can retry.
    pub async fn submit(&mut self, mut draft: Draft) -> Result<i64, ViewError> {
        if self.read_only {
            return Err(ViewError::ReadOnly);
        }
        let (form_kind, editing) = match self.form {
            FormState::Closed => return Err(ViewError::NoForm),
            FormState::Create(kind) => (kind, None),
            FormState::Edit(kind, id) => (kind, Some(id)),
        };
        if draft.kind() != form_kind {
            return Err(ValidationError(format!(
                "The open form is for a {form_kind} entry, not a {}",
                draft.kind()
            ))
            .into());
        }
        validate_name(draft.name())?;
        validate_date(draft.date())?;
        let time = normalize_time(draft.time())?;
        draft.set_time(time);
        draft.set_image(self.staged_image.clone());

        let saved = match (draft, editing) {
            (Draft::Food(d), None) => self.store.insert_food(&d).await,
            (Draft::Exercise(d), None) => self.store.insert_exercise(&d).await,
            (Draft::Food(d), Some(id)) => self.store.update_food(&d.with_id(id)).await.map(|()| id),
            (Draft::Exercise(d), Some(id)) => {
                self.store.update_exercise(&d.with_id(id)).await.map(|()| id)
            }
        };

        match saved {
            Ok(id) => {
                info!(kind = %form_kind, id, "Saved entry");
                self.close_form();
                // Failures are surfaced through the notice; the save itself went through.
                let _ = self.reload().await;
                Ok(id)
            }
            Err(e) => {
                warn!(kind = %form_kind, error = %e, "Failed to save entry");
                self.notice = Some(format!("Could not save {form_kind} entry: {e}"));
                Err(e.into())
            }
        }
    }

    /// Delete an entry shown for the selected date. Returns whether the
    /// store still held it.
    pub async fn delete(&mut self, kind: EntryKind, id: i64) -> Result<bool, ViewError> {
        if self.read_only {
            return Err(ViewError::ReadOnly);
        }
        self.menu = None;
        if self.entry(kind, id).is_none() {
            return Err(ViewError::NotListed {
                kind,
                id,
                date: self.date_str(),
            });
        }
        match self.store.delete(kind, id).await {
            Ok(existed) => {
                info!(%kind, id, existed, "Deleted entry");
                let _ = self.reload().await;
                Ok(existed)
            }
            Err(e) => {
                warn!(%kind, id, error = %e, "Failed to delete entry");
                self.notice = Some(format!("Could not delete {kind} entry: {e}"));
                Err(e.into())
            }
        }
    }

    /// Foods grouped by meal, in meal order. Empty meals are left out.
    #[must_use]
    pub fn food_groups(&self) -> Vec<(MealType, Vec<&FoodEntry>)> {
        MealType::ALL
            .iter()
            .map(|&meal| {
                let entries: Vec<_> = self.foods.iter().filter(|f| f.meal_type == meal).collect();
                (meal, entries)
            })
            .filter(|(_, entries)| !entries.is_empty())
            .collect()
    }

    #[must_use]
    pub fn exercise_groups(&self) -> Vec<(ExerciseType, Vec<&ExerciseEntry>)> {
        ExerciseType::ALL
            .iter()
            .map(|&kind| {
                let entries: Vec<_> = self
                    .exercises
                    .iter()
                    .filter(|e| e.exercise_type == kind)
                    .collect();
                (kind, entries)
            })
            .filter(|(_, entries)| !entries.is_empty())
            .collect()
    }

    /// Heading for the selected date relative to `today`.
    #[must_use]
    pub fn title(&self, today: NaiveDate) -> String {
        if self.date == today {
            "Today".to_string()
        } else if today.pred_opt() == Some(self.date) {
            "Yesterday".to_string()
        } else {
            self.date.format("%A, %B %-d").to_string()
        }
    }

    #[must_use]
    pub fn entry_count(&self) -> usize {
        self.foods.len() + self.exercises.len()
    }

    /// Look up an entry shown for the selected date.
    #[must_use]
    pub fn entry(&self, kind: EntryKind, id: i64) -> Option<Entry> {
        match kind {
            EntryKind::Food => self
                .foods
                .iter()
                .find(|f| f.id == id)
                .cloned()
                .map(Entry::Food),
            EntryKind::Exercise => self
                .exercises
                .iter()
                .find(|e| e.id == id)
                .cloned()
                .map(Entry::Exercise),
        }
    }
}
