use taskmate_shared::{Priority, Task, TaskDraft, TaskId, TaskPatch, UnknownPriority};
use thiserror::Error;
use tracing::{debug, info, instrument, warn};

use crate::error::ClientResult;
use crate::tasks::{Applied, TaskStore};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum FormMode {
    #[default]
    Create,
    Edit(TaskId),
}

/// Field values of the task form, held as the user typed them.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TaskForm {
    pub title: String,
    pub description: String,
    pub due_date: String,
    pub priority: Priority,
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum FormFieldError {
    #[error("unknown form field '{0}' (expected title, description, due or priority)")]
    UnknownField(String),
    #[error(transparent)]
    Priority(#[from] UnknownPriority),
}

impl TaskForm {
    /// Copies a task's current values; later cache refreshes do not touch
    /// the copy.
    pub fn from_task(task: &Task) -> Self {
        Self {
            title: task.title.clone(),
            description: task.description.clone().unwrap_or_default(),
            due_date: task
                .due_date
                .map(|date| date.format("%Y-%m-%d").to_string())
                .unwrap_or_default(),
            priority: task.priority,
        }
    }

    pub fn to_draft(&self) -> TaskDraft {
        TaskDraft {
            title: self.title.trim().to_string(),
            description: non_blank(&self.description),
            due_date: non_blank(&self.due_date),
            priority: self.priority,
        }
    }

    /// The server replaces the stored task with the submitted fields, so
    /// the patch always carries the whole form.
    pub fn to_patch(&self) -> TaskPatch {
        TaskPatch {
            title: Some(self.title.trim().to_string()),
            description: non_blank(&self.description),
            due_date: non_blank(&self.due_date),
            priority: Some(self.priority),
        }
    }

    pub fn set_field(&mut self, key: &str, value: &str) -> Result<(), FormFieldError> {
        match key.trim().to_ascii_lowercase().as_str() {
            "title" => self.title = value.to_string(),
            "desc" | "description" => self.description = value.to_string(),
            "due" | "duedate" | "due_date" => self.due_date = value.to_string(),
            "pri" | "priority" => self.priority = value.parse()?,
            other => return Err(FormFieldError::UnknownField(other.to_string())),
        }
        Ok(())
    }

    pub fn clear(&mut self) {
        *self = Self::default();
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SubmitOutcome {
    Created,
    Updated(TaskId),
}

/// Create/Edit state machine for the task form.
///
/// `Edit(id)` is entered only from a task that is in the cache, and
/// [`FormModeController::reconcile`] drops back to `Create` when that task
/// disappears from a later refresh.
#[derive(Debug, Default)]
pub struct FormModeController {
    mode: FormMode,
    form: TaskForm,
}

impl FormModeController {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn mode(&self) -> FormMode {
        self.mode
    }

    pub fn form(&self) -> &TaskForm {
        &self.form
    }

    pub fn form_mut(&mut self) -> &mut TaskForm {
        &mut self.form
    }

    pub fn submit_label(&self) -> &'static str {
        match self.mode {
            FormMode::Create => "Create Task",
            FormMode::Edit(_) => "Update Task",
        }
    }

    #[instrument(skip(self, task), fields(id = task.id))]
    pub fn begin_edit(&mut self, task: &Task) {
        self.form = TaskForm::from_task(task);
        self.mode = FormMode::Edit(task.id);
        debug!("form switched to edit mode");
    }

    /// Sends the form according to the current mode. Once the server
    /// accepts the mutation the fields are cleared and the controller is
    /// back in `Create`, whatever happened to the refresh that followed.
    /// A rejected mutation changes nothing so the user can retry.
    #[instrument(skip(self, tasks), fields(mode = ?self.mode))]
    pub async fn submit(&mut self, tasks: &TaskStore) -> ClientResult<(SubmitOutcome, Applied)> {
        let (outcome, applied) = match self.mode {
            FormMode::Create => {
                let applied = tasks.create(&self.form.to_draft()).await?;
                (SubmitOutcome::Created, applied)
            }
            FormMode::Edit(id) => {
                let applied = tasks.update(id, &self.form.to_patch()).await?;
                (SubmitOutcome::Updated(id), applied)
            }
        };
        self.reset();
        info!(?outcome, refreshed = applied.refresh.is_ok(), "form submitted");
        Ok((outcome, applied))
    }

    pub fn reset(&mut self) {
        self.mode = FormMode::Create;
        self.form.clear();
    }

    /// Returns `true` when an edit was abandoned because its task is gone.
    pub fn reconcile(&mut self, tasks: &[Task]) -> bool {
        let FormMode::Edit(id) = self.mode else {
            return false;
        };
        if tasks.iter().any(|task| task.id == id) {
            return false;
        }
        warn!(id, "task being edited no longer exists; returning to create mode");
        self.reset();
        true
    }
}

fn non_blank(raw: &str) -> Option<String> {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        None
    } else {
        Some(trimmed.to_string())
    }
}

#[cfg(test)]
mod tests {
    use chrono::NaiveDate;
    use taskmate_shared::{Priority, Task};

    use super::{FormFieldError, FormMode, FormModeController, TaskForm};

    fn task(id: i64, title: &str) -> Task {
        Task {
            id,
            title: title.to_string(),
            description: Some("details".to_string()),
            due_date: NaiveDate::from_ymd_opt(2026, 3, 1),
            priority: Priority::High,
            completed: false,
            status: "PENDING".to_string(),
            completed_at: None,
        }
    }

    #[test]
    fn begin_edit_snapshots_fields() {
        let mut controller = FormModeController::new();
        assert_eq!(controller.mode(), FormMode::Create);
        assert_eq!(controller.submit_label(), "Create Task");

        let mut original = task(3, "Write report");
        controller.begin_edit(&original);
        original.title = "changed after snapshot".to_string();

        assert_eq!(controller.mode(), FormMode::Edit(3));
        assert_eq!(controller.submit_label(), "Update Task");
        assert_eq!(controller.form().title, "Write report");
        assert_eq!(controller.form().due_date, "2026-03-01");
        assert_eq!(controller.form().priority, Priority::High);
    }

    #[test]
    fn reconcile_drops_edit_when_task_disappears() {
        let mut controller = FormModeController::new();
        controller.begin_edit(&task(3, "a"));

        assert!(!controller.reconcile(&[task(3, "a"), task(4, "b")]));
        assert_eq!(controller.mode(), FormMode::Edit(3));

        assert!(controller.reconcile(&[task(4, "b")]));
        assert_eq!(controller.mode(), FormMode::Create);
        assert_eq!(controller.form(), &TaskForm::default());
    }

    #[test]
    fn draft_and_patch_forward_text_unvalidated() {
        let mut form = TaskForm::default();
        form.set_field("title", " Buy milk ").expect("title");
        form.set_field("due", "next tuesday").expect("due");
        form.set_field("priority", "low").expect("priority");

        let draft = form.to_draft();
        assert_eq!(draft.title, "Buy milk");
        assert_eq!(draft.description, None);
        assert_eq!(draft.due_date.as_deref(), Some("next tuesday"));
        assert_eq!(draft.priority, Priority::Low);

        let patch = form.to_patch();
        assert_eq!(patch.title.as_deref(), Some("Buy milk"));
        assert_eq!(patch.priority, Some(Priority::Low));
    }

    #[test]
    fn patch_from_edit_carries_every_field() {
        let mut controller = FormModeController::new();
        controller.begin_edit(&task(3, "Write report"));
        let patch = controller.form().to_patch();
        assert_eq!(patch.title.as_deref(), Some("Write report"));
        assert_eq!(patch.description.as_deref(), Some("details"));
        assert_eq!(patch.due_date.as_deref(), Some("2026-03-01"));
        assert_eq!(patch.priority, Some(Priority::High));

        controller.form_mut().set_field("description", "  ").expect("description");
        let cleared = controller.form().to_patch();
        assert_eq!(cleared.description, None);
        assert_eq!(cleared.title.as_deref(), Some("Write report"));
    }

    #[test]
    fn unknown_field_and_priority_are_reported() {
        let mut form = TaskForm::default();
        assert_eq!(
            form.set_field("colour", "red"),
            Err(FormFieldError::UnknownField("colour".to_string()))
        );
        assert!(matches!(
            form.set_field("pri", "urgent"),
            Err(FormFieldError::Priority(_))
        ));
    }
}
