//! Sync tasks and the registry built from the environment or a tasks file.
//!
//! A sync task is one `(user, institution, credentials, channel)` unit of
//! work. Tasks come from one of two sources:
//!
//! - **Environment** (default): `USERS=dana,omer` plus one variable per
//!   credential field, `{USER}_{COMPANY}_{FIELD}`, e.g. `dana_MAX_USERNAME`.
//!   The chat channel is `{USER}_{COMPANY}_TELEGRAM_CHANNEL_ID`, falling back
//!   to `{USER}_TELEGRAM_CHANNEL_ID`.
//! - **Tasks file** (`--tasks <PATH>`), see [`TasksConfig`].
//!
//! Unknown institutions are logged and the task is omitted.

use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::fmt;
use std::path::PathBuf;

use serde::{Deserialize, Serialize};
use tracing::{error, warn};

use crate::error::AppError;
use crate::institution::Institution;

/// Credential fields read from the environment, paired with the key the scraper expects.
const CREDENTIAL_FIELDS: [(&str, &str); 7] = [
    ("ID", "id"),
    ("NUM", "num"),
    ("USERNAME", "username"),
    ("USER_CODE", "userCode"),
    ("PASSWORD", "password"),
    ("CARD6DIGITS", "card6Digits"),
    ("NATIONAL_ID", "nationalID"),
];

/// Opaque login fields for one institution.
///
/// `Debug` prints keys only, never values.
#[derive(Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Credentials(BTreeMap<String, String>);

impl Credentials {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, key: impl Into<String>, value: impl Into<String>) {
        self.0.insert(key.into(), value.into());
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.0.get(key).map(String::as_str)
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_map()
            .entries(self.0.keys().map(|k| (k, "***")))
            .finish()
    }
}

impl FromIterator<(String, String)> for Credentials {
    fn from_iter<I: IntoIterator<Item = (String, String)>>(iter: I) -> Self {
        Self(iter.into_iter().collect())
    }
}

/// One unit of scheduled work.
#[derive(Debug, Clone)]
pub struct SyncTask {
    pub user: String,
    pub institution: Institution,
    pub credentials: Credentials,
    pub channel_id: Option<String>,
}

impl SyncTask {
    /// Stable key used in logs and summaries: `"{user}/{institution}"`.
    pub fn key(&self) -> String {
        format!("{}/{}", self.user, self.institution)
    }
}

/// Ordered list of tasks to run on every tick.
#[derive(Debug, Clone, Default)]
pub struct TaskRegistry {
    tasks: Vec<SyncTask>,
}

impl TaskRegistry {
    pub fn new(tasks: Vec<SyncTask>) -> Self {
        Self { tasks }
    }

    pub fn tasks(&self) -> &[SyncTask] {
        &self.tasks
    }

    pub fn len(&self) -> usize {
        self.tasks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tasks.is_empty()
    }

    /// Builds the registry from the process environment.
    pub fn from_env() -> Result<Self, AppError> {
        let vars: HashMap<String, String> = std::env::vars().collect();
        Self::from_env_vars(&vars)
    }

    /// Builds the registry from an explicit variable map.
    ///
    /// Users keep their `USERS` order; companies within a user are sorted.
    pub fn from_env_vars(vars: &HashMap<String, String>) -> Result<Self, AppError> {
        let users = vars
            .get("USERS")
            .ok_or_else(|| AppError::ConfigError("USERS is not set".to_string()))?;

        let mut tasks = Vec::new();

        for user in users.split(',').map(str::trim).filter(|u| !u.is_empty()) {
            let prefix = format!("{}_", user);
            let telegram_prefix = format!("{}_TELEGRAM", user);

            let companies: BTreeSet<&str> = vars
                .keys()
                .filter(|k| k.starts_with(&prefix) && !k.starts_with(&telegram_prefix))
                .filter_map(|k| k[prefix.len()..].split('_').next())
                .filter(|c| !c.is_empty())
                .collect();

            for company in companies {
                let institution = match company.parse::<Institution>() {
                    Ok(i) => i,
                    Err(e) => {
                        error!(user, company, error = %e, "Skipping task with unknown institution");
                        continue;
                    }
                };

                let credentials: Credentials = CREDENTIAL_FIELDS
                    .iter()
                    .filter_map(|(field, key)| {
                        vars.get(&format!("{}_{}_{}", user, company, field))
                            .filter(|v| !v.is_empty())
                            .map(|v| (key.to_string(), v.clone()))
                    })
                    .collect();

                let channel_id = vars
                    .get(&format!("{}_{}_TELEGRAM_CHANNEL_ID", user, company))
                    .or_else(|| vars.get(&format!("{}_TELEGRAM_CHANNEL_ID", user)))
                    .filter(|v| !v.is_empty())
                    .cloned();

                tasks.push(SyncTask {
                    user: user.to_string(),
                    institution,
                    credentials,
                    channel_id,
                });
            }
        }

        Ok(Self { tasks })
    }

    /// Builds the registry from a parsed tasks file, skipping disabled entries.
    pub fn from_config(config: &TasksConfig) -> Self {
        let tasks = config
            .tasks
            .iter()
            .filter(|entry| entry.enabled)
            .filter_map(|entry| match entry.institution.parse::<Institution>() {
                Ok(institution) => Some(SyncTask {
                    user: entry.user.clone(),
                    institution,
                    credentials: entry.credentials.clone(),
                    channel_id: entry.channel_id.clone().filter(|c| !c.is_empty()),
                }),
                Err(e) => {
                    error!(
                        user = %entry.user,
                        company = %entry.institution,
                        error = %e,
                        "Skipping task with unknown institution"
                    );
                    None
                }
            })
            .collect();

        Self { tasks }
    }
}

/// Root structure of a tasks file.
///
/// # Example
///
/// ```toml
/// [[tasks]]
/// user = "dana"
/// institution = "max"
/// channel_id = "-1001234567890"
///
/// [tasks.credentials]
/// username = "dana"
/// password = "secret"
///
/// [[tasks]]
/// user = "dana"
/// institution = "hapoalim"
/// enabled = false
///
/// [tasks.credentials]
/// userCode = "AB12345"
/// password = "secret"
/// ```
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TasksConfig {
    pub tasks: Vec<TaskEntry>,
}

/// A single task entry in the tasks file.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TaskEntry {
    pub user: String,
    /// Institution id, matched case-insensitively.
    pub institution: String,
    pub channel_id: Option<String>,
    #[serde(default = "default_enabled")]
    pub enabled: bool,
    #[serde(default)]
    pub credentials: Credentials,
}

fn default_enabled() -> bool {
    true
}

/// Default tasks file name.
pub const TASKS_FILE_NAME: &str = "tasks.toml";

/// Returns the default tasks file path: `~/.config/shekel-streamer/tasks.toml`.
pub fn default_tasks_path() -> Option<PathBuf> {
    dirs::config_dir().map(|p| p.join("shekel-streamer").join(TASKS_FILE_NAME))
}

/// Loads a tasks file.
///
/// # Returns
/// * `Ok(Some(config))` - file loaded
/// * `Ok(None)` - no path given and no file at the default location
/// * `Err(e)` - an explicit path is missing, or the file is invalid
pub fn load_tasks_config(path: Option<PathBuf>) -> Result<Option<TasksConfig>, AppError> {
    let explicit = path.is_some();
    let config_path = match path.or_else(default_tasks_path) {
        Some(p) => p,
        None => return Ok(None),
    };

    if !config_path.exists() {
        if explicit {
            return Err(AppError::ConfigError(format!(
                "Tasks file not found: {}",
                config_path.display()
            )));
        }
        return Ok(None);
    }

    let content = std::fs::read_to_string(&config_path).map_err(|e| {
        AppError::ConfigError(format!(
            "Failed to read tasks file '{}': {}",
            config_path.display(),
            e
        ))
    })?;

    let config: TasksConfig = toml::from_str(&content).map_err(|e| {
        AppError::ConfigError(format!(
            "Invalid TOML in '{}': {}",
            config_path.display(),
            e
        ))
    })?;

    if config.tasks.is_empty() {
        warn!(path = %config_path.display(), "Tasks file contains no tasks");
    }

    Ok(Some(config))
}
