//! The composition root for one signed-in (or signed-out) user.
//!
//! [`ViewController`] turns user intents into calls on the session, the
//! task cache and the form controller, reports every outcome to the
//! [`Notifier`], and re-renders through a replaceable [`Renderer`].
//! What gets rendered is decided by [`render`], which is a pure function
//! of the session, the cached tasks and the form state.

use std::sync::Arc;

use taskmate_shared::{AuthPayload, LoginRequest, RegisterRequest, Task, TaskId};
use tracing::{debug, error, info, instrument, warn};

use crate::api::{ApiClient, decode_payload};
use crate::error::{ClientError, ClientResult};
use crate::form::{FormFieldError, FormMode, FormModeController, SubmitOutcome, TaskForm};
use crate::notify::{Notifier, Severity};
use crate::session::{Session, SessionStore, UserIdentity};
use crate::tasks::TaskStore;
use crate::transport::Method;

pub const EMPTY_LIST_PLACEHOLDER: &str = "No tasks found. Create your first task!";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum AuthForm {
    #[default]
    Login,
    Register,
}

/// Which navigation chrome is visible.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NavView {
    pub auth_nav: bool,
    pub tasks_nav: bool,
    pub logout: bool,
    pub current_user: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CardAction {
    Complete,
    Edit,
    Delete,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TaskCard {
    pub id: TaskId,
    pub title: String,
    pub description: String,
    pub due: String,
    pub priority: String,
    pub status: String,
    pub completed: bool,
    pub classes: Vec<String>,
    pub actions: Vec<CardAction>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TaskListView {
    Placeholder(&'static str),
    Cards(Vec<TaskCard>),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FormView {
    pub mode: FormMode,
    pub submit_label: &'static str,
    pub fields: TaskForm,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SectionView {
    Auth { form: AuthForm },
    Tasks { form: FormView, list: TaskListView },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ViewModel {
    pub nav: NavView,
    pub section: SectionView,
}

/// Builds the view description. A stored token decides the section: with
/// one the task list is shown and the auth navigation hidden, without one
/// the auth forms are shown and the task navigation hidden.
pub fn render(
    session: &Session,
    tasks: &[Task],
    form: &FormModeController,
    auth_form: AuthForm,
) -> ViewModel {
    let signed_in = session.is_authenticated();
    let nav = NavView {
        auth_nav: !signed_in,
        tasks_nav: signed_in,
        logout: signed_in,
        current_user: session.user().map(|user| user.username.clone()),
    };

    let section = if signed_in {
        let list = if tasks.is_empty() {
            TaskListView::Placeholder(EMPTY_LIST_PLACEHOLDER)
        } else {
            TaskListView::Cards(tasks.iter().map(task_card).collect())
        };
        SectionView::Tasks {
            form: FormView {
                mode: form.mode(),
                submit_label: form.submit_label(),
                fields: form.form().clone(),
            },
            list,
        }
    } else {
        SectionView::Auth { form: auth_form }
    };

    ViewModel { nav, section }
}

fn task_card(task: &Task) -> TaskCard {
    let state_class = if task.completed {
        "status-completed"
    } else {
        "status-pending"
    };
    let mut actions = Vec::with_capacity(3);
    if !task.completed {
        actions.push(CardAction::Complete);
    }
    actions.push(CardAction::Edit);
    actions.push(CardAction::Delete);

    TaskCard {
        id: task.id,
        title: task.title.clone(),
        description: task
            .description
            .as_deref()
            .filter(|text| !text.trim().is_empty())
            .unwrap_or("No description")
            .to_string(),
        due: task
            .due_date
            .map(|date| date.format("%Y-%m-%d").to_string())
            .unwrap_or_else(|| "No due date".to_string()),
        priority: task.priority.as_wire().to_string(),
        status: task.status.clone(),
        completed: task.completed,
        classes: vec![
            "task-item".to_string(),
            format!("priority-{}", task.priority.as_lower()),
            state_class.to_string(),
        ],
        actions,
    }
}

/// Displays a view description. Terminal, test and other front ends plug
/// in here.
pub trait Renderer {
    fn render(&mut self, view: &ViewModel) -> anyhow::Result<()>;

    /// Pushes out anything held back by `render`.
    fn flush(&mut self) -> anyhow::Result<()> {
        Ok(())
    }
}

/// Asks the user before destructive actions.
pub trait Confirm {
    fn confirm(&self, prompt: &str) -> bool;
}

impl<F> Confirm for F
where
    F: Fn(&str) -> bool,
{
    fn confirm(&self, prompt: &str) -> bool {
        self(prompt)
    }
}

/// How a user action ended. Failures have already been reported to the
/// notifier by the time this is returned.
#[must_use]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    Done,
    Declined,
    Failed,
}

impl Outcome {
    pub fn is_failed(self) -> bool {
        self == Outcome::Failed
    }
}

pub struct ViewController {
    session: Arc<SessionStore>,
    api: Arc<ApiClient>,
    tasks: TaskStore,
    form: FormModeController,
    auth_form: AuthForm,
    notifier: Arc<dyn Notifier>,
    renderer: Box<dyn Renderer>,
}

impl ViewController {
    pub fn new(
        session: Arc<SessionStore>,
        api: Arc<ApiClient>,
        tasks: TaskStore,
        notifier: Arc<dyn Notifier>,
        renderer: Box<dyn Renderer>,
    ) -> Self {
        Self {
            session,
            api,
            tasks,
            form: FormModeController::new(),
            auth_form: AuthForm::Login,
            notifier,
            renderer,
        }
    }

    pub fn session(&self) -> Session {
        self.session.current()
    }

    pub fn tasks(&self) -> &TaskStore {
        &self.tasks
    }

    pub fn form(&self) -> &FormModeController {
        &self.form
    }

    pub fn form_mut(&mut self) -> &mut TaskForm {
        self.form.form_mut()
    }

    /// Sets one form field by name and re-renders.
    pub fn set_form_field(&mut self, key: &str, value: &str) -> Result<(), FormFieldError> {
        self.form.form_mut().set_field(key, value)?;
        self.rerender();
        Ok(())
    }

    pub fn auth_form(&self) -> AuthForm {
        self.auth_form
    }

    pub fn api_base_url(&self) -> &str {
        self.api.base_url()
    }

    pub fn view(&self) -> ViewModel {
        render(
            &self.session.current(),
            &self.tasks.snapshot(),
            &self.form,
            self.auth_form,
        )
    }

    /// Loads the persisted token without touching the network.
    #[instrument(skip(self))]
    pub fn restore_session(&mut self) -> bool {
        let session = match self.session.load() {
            Ok(session) => session,
            Err(err) => {
                self.report_error(&err, "Failed to restore session");
                Session::anonymous()
            }
        };
        if !session.is_authenticated() {
            self.auth_form = AuthForm::Login;
        }
        session.is_authenticated()
    }

    /// Initial load: restore the session and, with a token, fetch tasks.
    #[instrument(skip(self))]
    pub async fn init(&mut self) -> Outcome {
        let outcome = if self.restore_session() {
            self.reload_tasks().await
        } else {
            Outcome::Done
        };
        self.rerender();
        outcome
    }

    #[instrument(skip(self, password))]
    pub async fn login(&mut self, username: &str, password: &str) -> Outcome {
        let request = LoginRequest {
            username: username.to_string(),
            password: password.to_string(),
        };
        let result = match self.api.send(Method::Post, "/auth/login", &request).await {
            Ok(value) => decode_payload::<AuthPayload>(value),
            Err(err) => Err(err),
        };
        let payload = match result {
            Ok(payload) => payload,
            Err(err) => {
                self.report_error(&err, "Login failed");
                self.rerender();
                return Outcome::Failed;
            }
        };

        let user = UserIdentity {
            username: if payload.username.is_empty() {
                username.to_string()
            } else {
                payload.username
            },
            email: payload.email,
        };
        if let Err(err) = self.session.save(&payload.token, Some(user)) {
            self.report_error(&err, "Login failed");
            self.rerender();
            return Outcome::Failed;
        }

        info!("logged in");
        self.notifier.notify("Login successful!", Severity::Success);
        let outcome = self.reload_tasks().await;
        self.rerender();
        outcome
    }

    #[instrument(skip(self, password, email))]
    pub async fn register(&mut self, username: &str, password: &str, email: &str) -> Outcome {
        let request = RegisterRequest {
            username: username.to_string(),
            password: password.to_string(),
            email: email.to_string(),
        };
        let outcome = match self.api.send(Method::Post, "/auth/register", &request).await {
            Ok(_) => {
                self.notifier
                    .notify("Registration successful! Please login.", Severity::Success);
                self.auth_form = AuthForm::Login;
                Outcome::Done
            }
            Err(err) => {
                self.report_error(&err, "Registration failed");
                self.auth_form = AuthForm::Register;
                Outcome::Failed
            }
        };
        self.rerender();
        outcome
    }

    #[instrument(skip(self))]
    pub fn logout(&mut self) -> Outcome {
        let cleared = self.session.clear();
        self.form.reset();
        self.tasks.clear();
        self.auth_form = AuthForm::Login;

        let outcome = match cleared {
            Ok(()) => {
                self.notifier
                    .notify("Logged out successfully", Severity::Info);
                Outcome::Done
            }
            Err(err) => {
                self.report_error(&err, "Logout failed");
                Outcome::Failed
            }
        };
        self.rerender();
        outcome
    }

    /// Switches to the task section and re-fetches the list.
    #[instrument(skip(self))]
    pub async fn show_tasks(&mut self) -> Outcome {
        if !self.session.current().is_authenticated() {
            self.notifier
                .notify("Please login to view your tasks", Severity::Info);
            self.auth_form = AuthForm::Login;
            self.rerender();
            return Outcome::Failed;
        }
        let outcome = self.reload_tasks().await;
        self.rerender();
        outcome
    }

    pub fn show_auth_form(&mut self, form: AuthForm) {
        self.auth_form = form;
        self.rerender();
    }

    /// Creates or updates depending on the form mode.
    #[instrument(skip(self), fields(mode = ?self.form.mode()))]
    pub async fn submit_task_form(&mut self) -> Outcome {
        let fallback = match self.form.mode() {
            FormMode::Create => "Failed to create task",
            FormMode::Edit(_) => "Failed to update task",
        };
        let outcome = match self.form.submit(&self.tasks).await {
            Ok((submitted, applied)) => {
                let message = match submitted {
                    SubmitOutcome::Created => "Task created successfully!",
                    SubmitOutcome::Updated(_) => "Task updated successfully!",
                };
                self.notifier.notify(message, Severity::Success);
                self.report_refresh(applied.refresh);
                Outcome::Done
            }
            Err(err) => {
                self.report_error(&err, fallback);
                Outcome::Failed
            }
        };
        self.form.reconcile(&self.tasks.snapshot());
        self.rerender();
        outcome
    }

    #[instrument(skip(self))]
    pub fn begin_edit(&mut self, id: TaskId) -> Outcome {
        let Some(task) = self.tasks.find(id) else {
            warn!(id, "edit requested for a task that is not cached");
            self.notifier
                .notify(&format!("Task {id} not found"), Severity::Error);
            return Outcome::Failed;
        };
        self.form.begin_edit(&task);
        self.rerender();
        Outcome::Done
    }

    pub fn cancel_edit(&mut self) {
        self.form.reset();
        self.rerender();
    }

    #[instrument(skip(self))]
    pub async fn complete(&mut self, id: TaskId) -> Outcome {
        let outcome = match self.tasks.complete(id).await {
            Ok(applied) => {
                self.notifier
                    .notify("Task marked as complete!", Severity::Success);
                self.report_refresh(applied.refresh);
                Outcome::Done
            }
            Err(err) => {
                self.report_error(&err, "Failed to complete task");
                Outcome::Failed
            }
        };
        self.form.reconcile(&self.tasks.snapshot());
        self.rerender();
        outcome
    }

    /// Deletes after the user agrees; declining sends nothing.
    #[instrument(skip(self, confirm))]
    pub async fn delete(&mut self, id: TaskId, confirm: &dyn Confirm) -> Outcome {
        if !confirm.confirm("Are you sure you want to delete this task?") {
            debug!(id, "delete declined");
            return Outcome::Declined;
        }
        let outcome = match self.tasks.remove(id).await {
            Ok(applied) => {
                if self.form.mode() == FormMode::Edit(id) {
                    self.form.reset();
                }
                self.notifier
                    .notify("Task deleted successfully!", Severity::Success);
                self.report_refresh(applied.refresh);
                Outcome::Done
            }
            Err(err) => {
                self.report_error(&err, "Failed to delete task");
                Outcome::Failed
            }
        };
        self.form.reconcile(&self.tasks.snapshot());
        self.rerender();
        outcome
    }

    /// Asks the server whether the stored token is still accepted. Identity
    /// is not re-derived; only a fresh login supplies it.
    #[instrument(skip(self))]
    pub async fn check_token(&mut self) -> Outcome {
        if self.session.token().is_none() {
            self.notifier.notify("Not logged in", Severity::Info);
            return Outcome::Failed;
        }
        match self.api.request("/auth/validate", Method::Get, None).await {
            Ok(_) => {
                self.notifier.notify("Token is valid", Severity::Success);
                Outcome::Done
            }
            Err(err) => {
                self.report_error(&err, "Token check failed");
                Outcome::Failed
            }
        }
    }

    pub fn flush(&mut self) {
        if let Err(err) = self.renderer.flush() {
            error!(error = %err, "failed to flush view");
        }
    }

    async fn reload_tasks(&mut self) -> Outcome {
        let refresh = self.tasks.refresh().await;
        if let Ok(tasks) = &refresh {
            self.form.reconcile(tasks);
        }
        if self.report_refresh(refresh) {
            Outcome::Done
        } else {
            Outcome::Failed
        }
    }

    /// Returns `false` after telling the user the list could not be loaded.
    /// The cache keeps its previous contents in that case.
    fn report_refresh(&self, refresh: ClientResult<Arc<[Task]>>) -> bool {
        match refresh {
            Ok(_) => true,
            Err(err) => {
                error!(error = %err, "failed to load tasks");
                self.notifier.notify("Failed to load tasks", Severity::Error);
                false
            }
        }
    }

    fn report_error(&self, err: &ClientError, fallback: &str) {
        let message = err.user_message(fallback);
        warn!(error = %err, status = ?err.status(), "action failed");
        self.notifier.notify(&message, Severity::Error);
    }

    fn rerender(&mut self) {
        let view = self.view();
        if let Err(err) = self.renderer.render(&view) {
            error!(error = %err, "failed to render view");
        }
    }
}
