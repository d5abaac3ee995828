use std::collections::HashMap;
use std::fs;
use std::path::{
  Path,
  PathBuf
};
use std::time::Duration;

use anyhow::{
  Context,
  anyhow
};
use tracing::{
  debug,
  info,
  trace,
  warn
};

pub const DEFAULT_API_URL: &str =
  "http://localhost:8080";

const DEFAULT_TIMEOUT_SECS: u64 = 30;

#[derive(Debug, Clone)]
pub struct Config {
  map: HashMap<String, String>,
  pub loaded_files: Vec<PathBuf>
}

impl Default for Config {
  fn default() -> Self {
    let mut map = HashMap::new();
    for (key, value) in [
      ("api.url", DEFAULT_API_URL),
      ("api.timeout", "30"),
      ("data.location", "~/.taskmate"),
      ("default.command", "list"),
      ("color", "on"),
      ("confirmation", "on")
    ] {
      map.insert(
        key.to_string(),
        value.to_string()
      );
    }

    Config {
      map,
      loaded_files: vec![]
    }
  }
}

impl Config {
  #[tracing::instrument(skip(
    rc_override
  ))]
  pub fn load(
    rc_override: Option<&Path>
  ) -> anyhow::Result<Self> {
    let mut cfg = Config::default();

    let rc = resolve_rc_path(
      rc_override
    )?;
    if let Some(path) = rc {
      info!(taskmaterc = %path.display(), "loading taskmaterc");
      cfg.load_file(&path)?;
    } else {
      debug!(
        "no taskmaterc found; using \
         defaults"
      );
    }

    Ok(cfg)
  }

  #[tracing::instrument(skip(
    self, overrides
  ))]
  pub fn apply_overrides<I>(
    &mut self,
    overrides: I
  ) where
    I: IntoIterator<
      Item = (String, String)
    >
  {
    for (k, v) in overrides {
      let key = k
        .strip_prefix("rc.")
        .unwrap_or(&k)
        .to_string();
      debug!(key = %key, value = %v, "applying override");
      self.map.insert(key, v);
    }
  }

  pub fn get(
    &self,
    key: &str
  ) -> Option<String> {
    self.map.get(key).cloned()
  }

  pub fn get_bool(
    &self,
    key: &str
  ) -> Option<bool> {
    self
      .map
      .get(key)
      .map(|v| parse_bool(v))
  }

  pub fn get_u64(
    &self,
    key: &str
  ) -> anyhow::Result<Option<u64>> {
    self
      .map
      .get(key)
      .map(|v| {
        v.trim().parse::<u64>().map_err(
          |_| {
            anyhow!(
              "invalid value for \
               {key}: {v}"
            )
          }
        )
      })
      .transpose()
  }

  /// Base URL of the task service,
  /// with an explicit override taking
  /// precedence over `api.url`.
  pub fn api_url(
    &self,
    override_url: Option<&str>
  ) -> String {
    override_url
      .map(str::to_string)
      .or_else(|| self.get("api.url"))
      .filter(|url| {
        !url.trim().is_empty()
      })
      .unwrap_or_else(|| {
        DEFAULT_API_URL.to_string()
      })
  }

  pub fn api_timeout(
    &self
  ) -> anyhow::Result<Duration> {
    let secs = self
      .get_u64("api.timeout")?
      .unwrap_or(DEFAULT_TIMEOUT_SECS);
    if secs == 0 {
      return Err(anyhow!(
        "api.timeout must be at least \
         1 second"
      ));
    }
    Ok(Duration::from_secs(secs))
  }

  #[tracing::instrument(skip(self))]
  fn load_file(
    &mut self,
    path: &Path
  ) -> anyhow::Result<()> {
    let path = expand_tilde(path);
    let text =
      fs::read_to_string(&path)
        .with_context(|| {
          format!(
            "failed to read {}",
            path.display()
          )
        })?;

    self
      .loaded_files
      .push(path.clone());

    let base_dir = path
      .parent()
      .map(|p| p.to_path_buf())
      .unwrap_or_else(|| {
        PathBuf::from(".")
      });

    for (line_num, raw_line) in
      text.lines().enumerate()
    {
      let mut line = raw_line.trim();
      if line.is_empty()
        || line.starts_with('#')
      {
        continue;
      }

      if let Some((before, _)) =
        line.split_once('#')
      {
        line = before.trim();
      }

      if line.is_empty() {
        continue;
      }

      if let Some(include_rest) =
        line.strip_prefix("include ")
      {
        let include_path =
          resolve_include_path(
            &base_dir,
            include_rest.trim()
          )?;
        debug!(
            file = %path.display(),
            include = %include_path.display(),
            line = line_num + 1,
            "processing include"
        );

        if include_path.exists() {
          self
            .load_file(&include_path)?;
        } else {
          warn!(include = %include_path.display(), "include file does not exist; skipping");
        }
        continue;
      }

      let (k, v) = line
        .split_once('=')
        .ok_or_else(|| {
          anyhow!(
            "invalid config line \
             {}:{}: {}",
            path.display(),
            line_num + 1,
            raw_line
          )
        })?;

      let key = k.trim().to_string();
      let value = v.trim().to_string();
      trace!(key = %key, value = %value, "loaded config key");
      self.map.insert(key, value);
    }

    Ok(())
  }
}

/// Directory holding the persisted
/// token. Created when missing.
#[tracing::instrument(skip(
  cfg,
  override_dir
))]
pub fn resolve_data_dir(
  cfg: &Config,
  override_dir: Option<&Path>
) -> anyhow::Result<PathBuf> {
  let dir = if let Some(path) =
    override_dir
  {
    path.to_path_buf()
  } else if let Some(cfg_value) =
    cfg.get("data.location")
  {
    expand_tilde(Path::new(&cfg_value))
  } else {
    default_data_dir()?
  };

  if !dir.exists() {
    info!(dir = %dir.display(), "creating data directory");
    fs::create_dir_all(&dir)
      .with_context(|| {
        format!(
          "failed to create {}",
          dir.display()
        )
      })?;
  }

  Ok(dir)
}

#[tracing::instrument(skip(
  override_path
))]
fn resolve_rc_path(
  override_path: Option<&Path>
) -> anyhow::Result<Option<PathBuf>> {
  if let Some(path) = override_path {
    return Ok(Some(path.to_path_buf()));
  }

  if let Ok(rc_env) =
    std::env::var("TASKMATERC")
  {
    if rc_env == "/dev/null" {
      return Ok(None);
    }
    return Ok(Some(PathBuf::from(
      rc_env
    )));
  }

  let Some(home) = dirs::home_dir()
  else {
    warn!(
      "cannot determine home \
       directory; skipping \
       ~/.taskmaterc"
    );
    return Ok(None);
  };
  let candidate =
    home.join(".taskmaterc");
  if candidate.exists() {
    return Ok(Some(candidate));
  }

  Ok(None)
}

fn default_data_dir()
-> anyhow::Result<PathBuf> {
  let home = dirs::home_dir()
    .ok_or_else(|| {
      anyhow!(
        "cannot determine home \
         directory"
      )
    })?;
  Ok(home.join(".taskmate"))
}

fn resolve_include_path(
  base_dir: &Path,
  include: &str
) -> anyhow::Result<PathBuf> {
  if include.trim().is_empty() {
    return Err(anyhow!(
      "include path cannot be empty"
    ));
  }

  let raw = PathBuf::from(include);
  let expanded = expand_tilde(&raw);
  if expanded.is_absolute() {
    Ok(expanded)
  } else {
    Ok(base_dir.join(expanded))
  }
}

fn expand_tilde(
  path: &Path
) -> PathBuf {
  let text = path.to_string_lossy();
  if let Some(rest) =
    text.strip_prefix("~/")
    && let Some(home) = dirs::home_dir()
  {
    return home.join(rest);
  }
  path.to_path_buf()
}

fn parse_bool(s: &str) -> bool {
  matches!(
    s.trim()
      .to_ascii_lowercase()
      .as_str(),
    "1" | "y" | "yes" | "on" | "true"
  )
}

#[cfg(test)]
mod tests {
  use std::fs;
  use std::time::Duration;

  use tempfile::TempDir;

  use super::{
    Config,
    DEFAULT_API_URL,
    resolve_data_dir
  };

  #[test]
  fn defaults_without_rc_file() {
    let cfg = Config::default();
    assert_eq!(
      cfg.api_url(None),
      DEFAULT_API_URL
    );
    assert_eq!(
      cfg.api_timeout().expect("timeout"),
      Duration::from_secs(30)
    );
    assert_eq!(
      cfg.get_bool("confirmation"),
      Some(true)
    );
    assert_eq!(
      cfg.get("default.command").as_deref(),
      Some("list")
    );
  }

  #[test]
  fn rc_file_with_include_and_overrides()
  {
    let temp =
      TempDir::new().expect("tempdir");
    let extra = temp.path().join("extra.rc");
    fs::write(
      &extra,
      "api.timeout = 5\n"
    )
    .expect("write include");
    let rc = temp.path().join("taskmaterc");
    fs::write(
      &rc,
      "# comment\napi.url = http://tasks.test:9000/  # trailing\ninclude extra.rc\ncolor=off\n"
    )
    .expect("write rc");

    let mut cfg =
      Config::load(Some(rc.as_path())).expect("load");
    assert_eq!(cfg.loaded_files.len(), 2);
    assert_eq!(
      cfg.api_url(None),
      "http://tasks.test:9000/"
    );
    assert_eq!(
      cfg.api_timeout().expect("timeout"),
      Duration::from_secs(5)
    );
    assert_eq!(
      cfg.get_bool("color"),
      Some(false)
    );

    cfg.apply_overrides([(
      "rc.confirmation".to_string(),
      "off".to_string()
    )]);
    assert_eq!(
      cfg.get_bool("confirmation"),
      Some(false)
    );
    assert_eq!(
      cfg.api_url(Some("http://other")),
      "http://other"
    );
  }

  #[test]
  fn malformed_line_and_timeout_are_errors()
  {
    let temp =
      TempDir::new().expect("tempdir");
    let rc = temp.path().join("bad.rc");
    fs::write(&rc, "api.url\n")
      .expect("write rc");
    assert!(
      Config::load(Some(rc.as_path())).is_err()
    );

    let mut cfg = Config::default();
    cfg.apply_overrides([(
      "api.timeout".to_string(),
      "soon".to_string()
    )]);
    assert!(cfg.api_timeout().is_err());
  }

  #[test]
  fn data_dir_override_is_created() {
    let temp =
      TempDir::new().expect("tempdir");
    let dir = temp.path().join("nested/data");
    let resolved = resolve_data_dir(
      &Config::default(),
      Some(dir.as_path())
    )
    .expect("data dir");
    assert_eq!(resolved, dir);
    assert!(dir.is_dir());
  }
}
