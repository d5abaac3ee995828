#![allow(dead_code)]

use std::collections::VecDeque;
use std::sync::Arc;

use async_trait::async_trait;
use parking_lot::Mutex;
use serde_json::{Value, json};
use taskmate_core::api::ApiClient;
use taskmate_core::error::{ClientError, ClientResult};
use taskmate_core::notify::{Notifier, Severity};
use taskmate_core::session::{MemoryTokenStorage, SessionStore};
use taskmate_core::tasks::TaskStore;
use taskmate_core::transport::{HttpRequest, HttpResponse, Transport};
use taskmate_core::view::{Renderer, ViewController, ViewModel};
use tokio::sync::oneshot;

pub const BASE_URL: &str = "http://tasks.test";

pub enum Step {
    Reply(u16, String),
    Fail(String),
    /// Waits until the test sends the response.
    Hold(oneshot::Receiver<(u16, String)>),
}

/// Answers requests from a queue of canned steps and records what was sent.
#[derive(Default)]
pub struct ScriptedTransport {
    steps: Mutex<VecDeque<Step>>,
    requests: Mutex<Vec<HttpRequest>>,
}

impl ScriptedTransport {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn reply(&self, status: u16, body: Value) {
        self.steps
            .lock()
            .push_back(Step::Reply(status, body.to_string()));
    }

    pub fn reply_empty(&self, status: u16) {
        self.steps
            .lock()
            .push_back(Step::Reply(status, String::new()));
    }

    pub fn fail(&self, message: &str) {
        self.steps.lock().push_back(Step::Fail(message.to_string()));
    }

    pub fn hold(&self) -> oneshot::Sender<(u16, String)> {
        let (tx, rx) = oneshot::channel();
        self.steps.lock().push_back(Step::Hold(rx));
        tx
    }

    pub fn requests(&self) -> Vec<HttpRequest> {
        self.requests.lock().clone()
    }

    pub fn request_count(&self) -> usize {
        self.requests.lock().len()
    }

    pub fn remaining_steps(&self) -> usize {
        self.steps.lock().len()
    }
}

#[async_trait]
impl Transport for ScriptedTransport {
    async fn send(&self, request: HttpRequest) -> ClientResult<HttpResponse> {
        self.requests.lock().push(request.clone());
        let step = self.steps.lock().pop_front();
        match step {
            Some(Step::Reply(status, body)) => Ok(HttpResponse { status, body }),
            Some(Step::Fail(message)) => Err(ClientError::Network(message)),
            Some(Step::Hold(rx)) => {
                let (status, body) = rx
                    .await
                    .map_err(|_| ClientError::Network("held response dropped".to_string()))?;
                Ok(HttpResponse { status, body })
            }
            None => panic!(
                "unexpected request: {} {}",
                request.method, request.url
            ),
        }
    }
}

#[derive(Default)]
pub struct RecordingNotifier {
    messages: Mutex<Vec<(String, Severity)>>,
}

impl RecordingNotifier {
    pub fn messages(&self) -> Vec<(String, Severity)> {
        self.messages.lock().clone()
    }

    pub fn last(&self) -> Option<(String, Severity)> {
        self.messages.lock().last().cloned()
    }
}

impl Notifier for RecordingNotifier {
    fn notify(&self, message: &str, severity: Severity) {
        self.messages.lock().push((message.to_string(), severity));
    }
}

/// Keeps every rendered view so tests can inspect the latest one.
#[derive(Clone, Default)]
pub struct RecordingRenderer {
    views: Arc<Mutex<Vec<ViewModel>>>,
}

impl RecordingRenderer {
    pub fn last(&self) -> Option<ViewModel> {
        self.views.lock().last().cloned()
    }

    pub fn count(&self) -> usize {
        self.views.lock().len()
    }
}

impl Renderer for RecordingRenderer {
    fn render(&mut self, view: &ViewModel) -> anyhow::Result<()> {
        self.views.lock().push(view.clone());
        Ok(())
    }
}

pub struct Harness {
    pub transport: Arc<ScriptedTransport>,
    pub session: Arc<SessionStore>,
    pub api: Arc<ApiClient>,
    pub notifier: Arc<RecordingNotifier>,
    pub renderer: RecordingRenderer,
}

impl Harness {
    pub fn new() -> Self {
        Self::with_storage(MemoryTokenStorage::new())
    }

    pub fn signed_in(token: &str) -> Self {
        Self::with_storage(MemoryTokenStorage::with_token(token))
    }

    fn with_storage(storage: MemoryTokenStorage) -> Self {
        let transport = ScriptedTransport::new();
        let session = Arc::new(SessionStore::new(Box::new(storage)));
        let api = Arc::new(ApiClient::new(
            format!("{BASE_URL}/"),
            transport.clone(),
            Arc::clone(&session),
        ));
        Self {
            transport,
            session,
            api,
            notifier: Arc::new(RecordingNotifier::default()),
            renderer: RecordingRenderer::default(),
        }
    }

    pub fn controller(&self) -> ViewController {
        ViewController::new(
            Arc::clone(&self.session),
            Arc::clone(&self.api),
            TaskStore::new(Arc::clone(&self.api)),
            self.notifier.clone(),
            Box::new(self.renderer.clone()),
        )
    }
}

pub fn task_json(id: i64, title: &str, completed: bool) -> Value {
    json!({
        "id": id,
        "title": title,
        "description": null,
        "dueDate": "2026-03-01",
        "priority": "MEDIUM",
        "completed": completed,
        "status": if completed { "COMPLETED" } else { "PENDING" },
    })
}

/// A task list the way the server wraps it.
pub fn task_list(tasks: &[Value]) -> Value {
    json!({ "success": true, "message": "Tasks retrieved", "data": tasks })
}
