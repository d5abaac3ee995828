use std::fmt;
use std::str::FromStr;

use chrono::NaiveDate;
use serde::{
  Deserialize,
  Serialize
};

pub type TaskId = i64;

#[derive(
  Debug,
  Clone,
  Copy,
  Serialize,
  Deserialize,
  PartialEq,
  Eq,
  Default,
)]
#[serde(rename_all = "UPPERCASE")]
pub enum Priority {
  #[serde(alias = "Low", alias = "low")]
  Low,
  #[default]
  #[serde(
    alias = "Medium",
    alias = "medium"
  )]
  Medium,
  #[serde(alias = "High", alias = "high")]
  High
}

impl Priority {
  pub fn as_wire(self) -> &'static str {
    match self {
      | Priority::Low => "LOW",
      | Priority::Medium => "MEDIUM",
      | Priority::High => "HIGH"
    }
  }

  pub fn as_lower(self) -> &'static str {
    match self {
      | Priority::Low => "low",
      | Priority::Medium => "medium",
      | Priority::High => "high"
    }
  }
}

impl fmt::Display for Priority {
  fn fmt(
    &self,
    f: &mut fmt::Formatter<'_>
  ) -> fmt::Result {
    f.write_str(self.as_wire())
  }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UnknownPriority(pub String);

impl fmt::Display for UnknownPriority {
  fn fmt(
    &self,
    f: &mut fmt::Formatter<'_>
  ) -> fmt::Result {
    write!(
      f,
      "unknown priority '{}' \
       (expected low, medium or high)",
      self.0
    )
  }
}

impl std::error::Error for UnknownPriority {}

impl FromStr for Priority {
  type Err = UnknownPriority;

  fn from_str(
    s: &str
  ) -> Result<Self, Self::Err> {
    match s
      .trim()
      .to_ascii_lowercase()
      .as_str()
    {
      | "l" | "low" => Ok(Priority::Low),
      | "m" | "medium" => {
        Ok(Priority::Medium)
      }
      | "h" | "high" => {
        Ok(Priority::High)
      }
      | _ => {
        Err(UnknownPriority(
          s.to_string()
        ))
      }
    }
  }
}

/// A task as the server reports it.
///
/// The client never edits one of these in place; it only ever holds
/// whatever the last `GET /tasks` returned.
#[derive(
  Debug,
  Clone,
  Serialize,
  Deserialize,
  PartialEq,
  Eq,
)]
#[serde(rename_all = "camelCase")]
pub struct Task {
  pub id:           TaskId,
  #[serde(default)]
  pub title:        String,
  #[serde(default)]
  pub description:  Option<String>,
  #[serde(
    default,
    with = "due_date_serde"
  )]
  pub due_date:     Option<NaiveDate>,
  #[serde(default)]
  pub priority:     Priority,
  #[serde(default)]
  pub completed:    bool,
  #[serde(default)]
  pub status:       String,
  #[serde(
    default,
    skip_serializing_if = "Option::is_none"
  )]
  pub completed_at: Option<String>
}

/// Body of `POST /tasks`.
///
/// Field text is forwarded as typed; the server owns validation.
#[derive(
  Debug,
  Clone,
  Serialize,
  Deserialize,
  PartialEq,
  Eq,
)]
#[serde(rename_all = "camelCase")]
pub struct TaskDraft {
  pub title:       String,
  #[serde(
    default,
    skip_serializing_if = "Option::is_none"
  )]
  pub description: Option<String>,
  #[serde(
    default,
    skip_serializing_if = "Option::is_none"
  )]
  pub due_date:    Option<String>,
  #[serde(default)]
  pub priority:    Priority
}

impl TaskDraft {
  pub fn new(
    title: impl Into<String>
  ) -> Self {
    Self {
      title:       title.into(),
      description: None,
      due_date:    None,
      priority:    Priority::default()
    }
  }
}

/// Body of `PUT /tasks/{id}`. The server overwrites the stored task
/// with these fields, so an omitted field is cleared; callers send the
/// whole form.
#[derive(
  Debug,
  Clone,
  Serialize,
  Deserialize,
  PartialEq,
  Eq,
  Default,
)]
#[serde(rename_all = "camelCase")]
pub struct TaskPatch {
  #[serde(
    default,
    skip_serializing_if = "Option::is_none"
  )]
  pub title:       Option<String>,
  #[serde(
    default,
    skip_serializing_if = "Option::is_none"
  )]
  pub description: Option<String>,
  #[serde(
    default,
    skip_serializing_if = "Option::is_none"
  )]
  pub due_date:    Option<String>,
  #[serde(
    default,
    skip_serializing_if = "Option::is_none"
  )]
  pub priority:    Option<Priority>
}

impl TaskPatch {
  pub fn is_empty(&self) -> bool {
    self.title.is_none()
      && self.description.is_none()
      && self.due_date.is_none()
      && self.priority.is_none()
  }
}

#[derive(
  Debug, Clone, Serialize, Deserialize,
)]
pub struct LoginRequest {
  pub username: String,
  pub password: String
}

#[derive(
  Debug, Clone, Serialize, Deserialize,
)]
pub struct RegisterRequest {
  pub username: String,
  pub password: String,
  pub email:    String
}

/// Success payload of `POST /auth/login`.
#[derive(
  Debug,
  Clone,
  Serialize,
  Deserialize,
  PartialEq,
  Eq,
)]
#[serde(rename_all = "camelCase")]
pub struct AuthPayload {
  pub token:      String,
  #[serde(default)]
  pub username:   String,
  #[serde(default)]
  pub email:      String,
  #[serde(default)]
  pub expires_in: Option<u64>
}

/// The server's `{success, message, data}` wrapper.
#[derive(
  Debug, Clone, Serialize, Deserialize,
)]
pub struct Envelope<T> {
  pub success: bool,
  #[serde(default)]
  pub message: Option<String>,
  pub data:    Option<T>
}

/// A response body that may or may not be wrapped in an [`Envelope`].
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub enum Payload<T> {
  Enveloped(Envelope<T>),
  Bare(T)
}

impl<T> Payload<T> {
  pub fn into_inner(self) -> Option<T> {
    match self {
      | Payload::Enveloped(envelope) => {
        envelope.data
      }
      | Payload::Bare(value) => {
        Some(value)
      }
    }
  }
}

/// `dueDate` arrives as `YYYY-MM-DD`, but older servers send a full
/// local date-time; only the date part is kept.
pub mod due_date_serde {
  use chrono::NaiveDate;
  use serde::{
    Deserialize,
    Deserializer,
    Serializer
  };

  const FORMAT: &str = "%Y-%m-%d";

  pub fn serialize<S>(
    date: &Option<NaiveDate>,
    serializer: S
  ) -> Result<S::Ok, S::Error>
  where
    S: Serializer
  {
    match date {
      | Some(value) => {
        serializer.serialize_str(
          &value
            .format(FORMAT)
            .to_string()
        )
      }
      | None => {
        serializer.serialize_none()
      }
    }
  }

  pub fn deserialize<'de, D>(
    deserializer: D
  ) -> Result<Option<NaiveDate>, D::Error>
  where
    D: Deserializer<'de>
  {
    let raw = Option::<String>::deserialize(
      deserializer
    )?;
    let Some(raw) = raw else {
      return Ok(None);
    };
    parse(&raw)
      .map_err(serde::de::Error::custom)
  }

  pub fn parse(
    raw: &str
  ) -> Result<Option<NaiveDate>, chrono::ParseError>
  {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
      return Ok(None);
    }
    let date_part = trimmed
      .split(['T', ' '])
      .next()
      .unwrap_or(trimmed);
    NaiveDate::parse_from_str(
      date_part, FORMAT
    )
    .map(Some)
  }
}

#[cfg(test)]
mod tests {
  use chrono::NaiveDate;
  use serde_json::json;

  use super::{
    AuthPayload,
    Payload,
    Priority,
    Task,
    TaskDraft,
    TaskPatch
  };

  #[test]
  fn priority_accepts_any_case() {
    let parsed: Vec<Priority> =
      serde_json::from_value(json!([
        "HIGH", "Medium", "low"
      ]))
      .expect("decode priorities");
    assert_eq!(
      parsed,
      vec![
        Priority::High,
        Priority::Medium,
        Priority::Low
      ]
    );
    assert_eq!(
      "H".parse::<Priority>(),
      Ok(Priority::High)
    );
    assert!(
      "urgent"
        .parse::<Priority>()
        .is_err()
    );
  }

  #[test]
  fn task_decodes_server_shape() {
    let task: Task =
      serde_json::from_value(json!({
        "id": 7,
        "title": "Buy milk",
        "description": null,
        "dueDate": "2026-03-01T00:00:00",
        "priority": "MEDIUM",
        "completed": false,
        "status": "PENDING",
        "userId": 3
      }))
      .expect("decode task");

    assert_eq!(task.id, 7);
    assert_eq!(
      task.due_date,
      NaiveDate::from_ymd_opt(2026, 3, 1)
    );
    assert_eq!(task.description, None);
    assert_eq!(task.status, "PENDING");
  }

  #[test]
  fn draft_and_patch_skip_absent_fields()
   {
    let mut draft =
      TaskDraft::new("Buy milk");
    draft.priority = Priority::High;
    assert_eq!(
      serde_json::to_value(&draft)
        .expect("encode draft"),
      json!({
        "title": "Buy milk",
        "priority": "HIGH"
      })
    );

    let patch = TaskPatch {
      due_date: Some(
        "2026-04-02".to_string()
      ),
      ..TaskPatch::default()
    };
    assert!(!patch.is_empty());
    assert_eq!(
      serde_json::to_value(&patch)
        .expect("encode patch"),
      json!({ "dueDate": "2026-04-02" })
    );
  }

  #[test]
  fn payload_unwraps_envelope_or_bare() {
    let wrapped: Payload<AuthPayload> =
      serde_json::from_value(json!({
        "success": true,
        "message": "Login successful",
        "data": {
          "token": "t1",
          "username": "alice",
          "email": "a@x.com",
          "expiresIn": 86400000
        }
      }))
      .expect("decode envelope");
    let bare: Payload<AuthPayload> =
      serde_json::from_value(json!({
        "token": "t1",
        "username": "alice",
        "email": "a@x.com"
      }))
      .expect("decode bare");

    let wrapped = wrapped
      .into_inner()
      .expect("envelope data");
    let bare =
      bare.into_inner().expect("bare");
    assert_eq!(wrapped.token, bare.token);
    assert_eq!(wrapped.username, "alice");
    assert_eq!(
      wrapped.expires_in,
      Some(86_400_000)
    );

    let empty: Payload<Vec<Task>> =
      serde_json::from_value(json!({
        "success": true,
        "message": "ok",
        "data": null
      }))
      .expect("decode empty envelope");
    assert!(empty.into_inner().is_none());
  }
}
