use std::sync::Arc;

use parking_lot::RwLock;
use taskmate_shared::{Task, TaskDraft, TaskId, TaskPatch};
use tracing::{debug, info, instrument};

use crate::api::ApiClient;
use crate::error::ClientResult;
use crate::transport::Method;

const TASKS_PATH: &str = "/tasks";

/// A mutation the server accepted, plus the result of the refresh that
/// followed it. A failed refresh does not undo the mutation.
#[must_use]
#[derive(Debug)]
pub struct Applied {
    pub refresh: ClientResult<Arc<[Task]>>,
}

/// Read-through cache of the signed-in user's tasks.
///
/// The cache only ever changes by wholesale replacement after a completed
/// `GET /tasks`. Mutations go to the server first and are followed by a
/// refresh; a failed mutation leaves the cache exactly as it was.
pub struct TaskStore {
    api: Arc<ApiClient>,
    cache: RwLock<Arc<[Task]>>,
}

impl TaskStore {
    pub fn new(api: Arc<ApiClient>) -> Self {
        Self {
            api,
            cache: RwLock::new(Arc::from(Vec::new())),
        }
    }

    /// Fetches the task list and swaps it in. The lock is taken only for
    /// the swap, never across the request.
    #[instrument(skip(self))]
    pub async fn refresh(&self) -> ClientResult<Arc<[Task]>> {
        let tasks: Vec<Task> = self.api.get(TASKS_PATH).await?;
        let fresh: Arc<[Task]> = Arc::from(tasks);
        *self.cache.write() = Arc::clone(&fresh);
        info!(count = fresh.len(), "task cache replaced");
        Ok(fresh)
    }

    #[instrument(skip(self, draft), fields(title_len = draft.title.len()))]
    pub async fn create(&self, draft: &TaskDraft) -> ClientResult<Applied> {
        self.api.send(Method::Post, TASKS_PATH, draft).await?;
        debug!("task created");
        Ok(self.applied().await)
    }

    #[instrument(skip(self, patch))]
    pub async fn update(&self, id: TaskId, patch: &TaskPatch) -> ClientResult<Applied> {
        self.api.send(Method::Put, &task_path(id), patch).await?;
        debug!("task updated");
        Ok(self.applied().await)
    }

    /// Deletes a task. Callers are expected to have asked the user first;
    /// no confirmation happens here.
    #[instrument(skip(self))]
    pub async fn remove(&self, id: TaskId) -> ClientResult<Applied> {
        self.api.request(&task_path(id), Method::Delete, None).await?;
        debug!("task deleted");
        Ok(self.applied().await)
    }

    #[instrument(skip(self))]
    pub async fn complete(&self, id: TaskId) -> ClientResult<Applied> {
        let path = format!("{}/complete", task_path(id));
        self.api.request(&path, Method::Patch, None).await?;
        debug!("task completed");
        Ok(self.applied().await)
    }

    async fn applied(&self) -> Applied {
        Applied {
            refresh: self.refresh().await,
        }
    }

    pub fn snapshot(&self) -> Arc<[Task]> {
        Arc::clone(&self.cache.read())
    }

    pub fn find(&self, id: TaskId) -> Option<Task> {
        self.cache.read().iter().find(|task| task.id == id).cloned()
    }

    pub fn len(&self) -> usize {
        self.cache.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.cache.read().is_empty()
    }

    /// Drops every cached task, e.g. when the session ends.
    pub fn clear(&self) {
        *self.cache.write() = Arc::from(Vec::new());
    }
}

fn task_path(id: TaskId) -> String {
    format!("{TASKS_PATH}/{id}")
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use async_trait::async_trait;
    use taskmate_shared::{Priority, Task};

    use super::{TaskStore, task_path};
    use crate::api::ApiClient;
    use crate::error::{ClientError, ClientResult};
    use crate::session::{MemoryTokenStorage, SessionStore};
    use crate::transport::{HttpRequest, HttpResponse, Transport};

    struct Offline;

    #[async_trait]
    impl Transport for Offline {
        async fn send(&self, _request: HttpRequest) -> ClientResult<HttpResponse> {
            Err(ClientError::Network("offline".to_string()))
        }
    }

    fn store() -> TaskStore {
        let session = Arc::new(SessionStore::new(Box::new(MemoryTokenStorage::new())));
        let api = Arc::new(ApiClient::new("http://tasks.test", Arc::new(Offline), session));
        TaskStore::new(api)
    }

    fn task(id: i64) -> Task {
        Task {
            id,
            title: format!("task {id}"),
            description: None,
            due_date: None,
            priority: Priority::Medium,
            completed: false,
            status: "PENDING".to_string(),
            completed_at: None,
        }
    }

    #[test]
    fn task_paths_nest_under_collection() {
        assert_eq!(task_path(7), "/tasks/7");
        assert_eq!(format!("{}/complete", task_path(12)), "/tasks/12/complete");
    }

    #[test]
    fn find_and_clear_read_the_cached_collection() {
        let store = store();
        assert!(store.is_empty());
        *store.cache.write() = Arc::from(vec![task(1), task(2)]);

        assert_eq!(store.len(), 2);
        assert_eq!(store.find(2).map(|t| t.title), Some("task 2".to_string()));
        assert_eq!(store.find(3), None);

        store.clear();
        assert!(store.is_empty());
        assert_eq!(store.find(1), None);
    }

    #[tokio::test]
    async fn failed_mutation_leaves_cache_alone() {
        let store = store();
        *store.cache.write() = Arc::from(vec![task(1)]);

        let err = store.remove(1).await.expect_err("offline");
        assert_eq!(err, ClientError::Network("offline".to_string()));
        assert_eq!(store.len(), 1);
    }
}
