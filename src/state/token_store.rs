use serde_json::{Map, Value};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::{Mutex, PoisonError};
use thiserror::Error;

pub const ACCESS_TOKEN_KEY: &str = "access_token";
pub const REFRESH_TOKEN_KEY: &str = "refresh_token";

#[derive(Debug, Clone, Error)]
pub enum StoreError {
  #[error("token storage unavailable: {0}")]
  Unavailable(String),
  #[error("token file io error: {0}")]
  Io(String),
  #[error("token file is not valid json: {0}")]
  Corrupt(String),
}

impl From<std::io::Error> for StoreError {
  fn from(err: std::io::Error) -> Self {
    Self::Io(err.to_string())
  }
}

/// Durable string key/value storage for the token pair.
pub trait TokenStore: Send + Sync {
  fn get(&self, key: &str) -> Result<Option<String>, StoreError>;
  fn set(&self, key: &str, value: &str) -> Result<(), StoreError>;
  fn remove(&self, key: &str) -> Result<(), StoreError>;
}

fn normalize(value: &str) -> Option<String> {
  let trimmed = value.trim();
  if trimmed.is_empty() {
    None
  } else {
    Some(trimmed.to_string())
  }
}

#[derive(Default)]
pub struct MemoryTokenStore {
  values: Mutex<HashMap<String, String>>,
}

impl MemoryTokenStore {
  pub fn new() -> Self {
    Self::default()
  }

  pub fn with_tokens(access: &str, refresh: &str) -> Self {
    let store = Self::new();
    {
      let mut values = store.values.lock().unwrap_or_else(PoisonError::into_inner);
      values.insert(ACCESS_TOKEN_KEY.to_string(), access.to_string());
      values.insert(REFRESH_TOKEN_KEY.to_string(), refresh.to_string());
    }
    store
  }
}

impl TokenStore for MemoryTokenStore {
  fn get(&self, key: &str) -> Result<Option<String>, StoreError> {
    let values = self.values.lock().unwrap_or_else(PoisonError::into_inner);
    Ok(values.get(key).and_then(|v| normalize(v)))
  }

  fn set(&self, key: &str, value: &str) -> Result<(), StoreError> {
    let mut values = self.values.lock().unwrap_or_else(PoisonError::into_inner);
    values.insert(key.to_string(), value.to_string());
    Ok(())
  }

  fn remove(&self, key: &str) -> Result<(), StoreError> {
    let mut values = self.values.lock().unwrap_or_else(PoisonError::into_inner);
    values.remove(key);
    Ok(())
  }
}

/// Stores tokens as a flat JSON object in a single file.
pub struct FileTokenStore {
  path: PathBuf,
  lock: Mutex<()>,
}

impl FileTokenStore {
  pub fn new(path: impl Into<PathBuf>) -> Self {
    Self {
      path: path.into(),
      lock: Mutex::new(()),
    }
  }

  pub fn path(&self) -> &Path {
    &self.path
  }

  fn read_map(&self) -> Result<Map<String, Value>, StoreError> {
    let data = match std::fs::read_to_string(&self.path) {
      Ok(data) => data,
      Err(err) if err.kind() == std::io::ErrorKind::NotFound => return Ok(Map::new()),
      Err(err) => return Err(err.into()),
    };
    if data.trim().is_empty() {
      return Ok(Map::new());
    }
    match serde_json::from_str::<Value>(&data) {
      Ok(Value::Object(map)) => Ok(map),
      Ok(_) => Err(StoreError::Corrupt("expected a json object".to_string())),
      Err(err) => Err(StoreError::Corrupt(err.to_string())),
    }
  }

  fn write_map(&self, map: &Map<String, Value>) -> Result<(), StoreError> {
    if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
      std::fs::create_dir_all(parent)?;
    }
    let data = serde_json::to_vec_pretty(map).map_err(|e| StoreError::Io(e.to_string()))?;

    // Write-then-rename so a crash never leaves half a file behind.
    let tmp = self.path.with_extension("json.tmp");
    std::fs::write(&tmp, data)?;
    restrict_permissions(&tmp)?;
    std::fs::rename(&tmp, &self.path)?;
    Ok(())
  }

  fn update(&self, f: impl FnOnce(&mut Map<String, Value>)) -> Result<(), StoreError> {
    let _guard = self.lock.lock().unwrap_or_else(PoisonError::into_inner);
    let mut map = match self.read_map() {
      Ok(map) => map,
      // A corrupt file is replaced rather than blocking every later write.
      Err(StoreError::Corrupt(_)) => Map::new(),
      Err(err) => return Err(err),
    };
    f(&mut map);
    self.write_map(&map)
  }
}

#[cfg(unix)]
fn restrict_permissions(path: &Path) -> Result<(), StoreError> {
  use std::os::unix::fs::PermissionsExt;
  std::fs::set_permissions(path, std::fs::Permissions::from_mode(0o600))?;
  Ok(())
}

#[cfg(not(unix))]
fn restrict_permissions(_path: &Path) -> Result<(), StoreError> {
  Ok(())
}

impl TokenStore for FileTokenStore {
  fn get(&self, key: &str) -> Result<Option<String>, StoreError> {
    let _guard = self.lock.lock().unwrap_or_else(PoisonError::into_inner);
    let map = self.read_map()?;
    Ok(map.get(key).and_then(|v| v.as_str()).and_then(normalize))
  }

  fn set(&self, key: &str, value: &str) -> Result<(), StoreError> {
    self.update(|map| {
      map.insert(key.to_string(), Value::String(value.to_string()));
    })
  }

  fn remove(&self, key: &str) -> Result<(), StoreError> {
    self.update(|map| {
      map.remove(key);
    })
  }
}
