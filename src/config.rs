use std::path::Path;

use clap::ValueEnum;
use secrecy::SecretString;
use serde_json::{Map, Value};
use tracing::debug;

use crate::error::{ConfigError, PostError, ValidationError};

pub(crate) type JsonObject = Map<String, Value>;

const SUBMISSION_KEYS: [&str; 3] = ["subreddit", "title", "body"];
const SETTINGS_KEYS: [&str; 5] = [
    "client_id",
    "client_secret",
    "user_agent",
    "username",
    "password",
];
pub(crate) const ENV_CLIENT_ID: &str = "REDDIT_CLIENT_ID";
pub(crate) const ENV_CLIENT_SECRET: &str = "REDDIT_CLIENT_SECRET";
pub(crate) const ENV_USER_AGENT: &str = "REDDIT_USER_AGENT";
pub(crate) const ENV_USERNAME: &str = "REDDIT_USERNAME";
pub(crate) const ENV_PASSWORD: &str = "REDDIT_PASSWORD";

/// Where the reddit credentials come from.
#[derive(ValueEnum, Clone, Copy, Debug, Default, PartialEq, Eq)]
pub(crate) enum CredentialSource {
    /// A JSON settings file given with --settings
    #[default]
    File,
    /// REDDIT_* environment variables
    Env,
}

#[derive(Debug)]
pub(crate) struct Settings {
    pub client_id: String,
    pub client_secret: SecretString,
    pub user_agent: String,
    pub username: String,
    pub password: SecretString,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct Submission {
    pub subreddit: String,
    pub title: String,
    pub body: String,
    /// Empty means no flair.
    pub flair: String,
}

pub(crate) fn load_json(path: &Path) -> Result<JsonObject, ConfigError> {
    let text = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
        path: path.to_path_buf(),
        source,
    })?;
    let value: Value = serde_json::from_str(&text).map_err(|source| ConfigError::Parse {
        path: path.to_path_buf(),
        source,
    })?;
    match value {
        Value::Object(map) => Ok(map),
        _ => Err(ConfigError::NotAnObject {
            path: path.to_path_buf(),
        }),
    }
}

pub(crate) fn require_flag<'a>(
    path: Option<&'a Path>,
    role: &'static str,
    short: &'static str,
    long: &'static str,
) -> Result<&'a Path, ConfigError> {
    path.ok_or(ConfigError::MissingFlag { role, short, long })
}

fn required_str(map: &JsonObject, file: &Path, key: &'static str) -> Result<String, ValidationError> {
    match map.get(key) {
        None => Err(ValidationError::MissingKey {
            file: file.to_path_buf(),
            key,
        }),
        Some(Value::String(s)) => Ok(s.clone()),
        Some(_) => Err(ValidationError::NotAString {
            file: file.to_path_buf(),
            key,
        }),
    }
}

// Presence is checked for every key before types, so a missing key is always
// reported ahead of a mistyped one.
fn check_present(map: &JsonObject, file: &Path, keys: &[&'static str]) -> Result<(), ValidationError> {
    match keys.iter().find(|k| !map.contains_key(**k)) {
        Some(key) => Err(ValidationError::MissingKey {
            file: file.to_path_buf(),
            key: *key,
        }),
        None => Ok(()),
    }
}

fn is_subreddit_name(name: &str) -> bool {
    !name.is_empty() && name.bytes().all(|b| b.is_ascii_alphanumeric() || b == b'_')
}

impl Submission {
    pub(crate) fn from_json(map: &JsonObject, file: &Path) -> Result<Self, ValidationError> {
        check_present(map, file, &SUBMISSION_KEYS)?;
        let flair = match map.get("flair") {
            None | Some(Value::Null) => String::new(),
            Some(Value::String(s)) => s.clone(),
            Some(_) => {
                return Err(ValidationError::NotAString {
                    file: file.to_path_buf(),
                    key: "flair",
                })
            }
        };
        let subreddit = required_str(map, file, "subreddit")?;
        if !is_subreddit_name(&subreddit) {
            return Err(ValidationError::BadSubreddit {
                file: file.to_path_buf(),
                name: subreddit,
            });
        }
        Ok(Submission {
            subreddit,
            title: required_str(map, file, "title")?,
            body: required_str(map, file, "body")?,
            flair,
        })
    }
}

impl Settings {
    pub(crate) fn from_json(map: &JsonObject, file: &Path) -> Result<Self, ValidationError> {
        check_present(map, file, &SETTINGS_KEYS)?;
        Ok(Settings {
            client_id: required_str(map, file, "client_id")?,
            client_secret: required_str(map, file, "client_secret")?.into(),
            user_agent: required_str(map, file, "user_agent")?,
            username: required_str(map, file, "username")?,
            password: required_str(map, file, "password")?.into(),
        })
    }

    /// Builds settings from `REDDIT_*` variables fetched through `lookup`.
    pub(crate) fn from_lookup<F>(mut lookup: F) -> Result<Self, ConfigError>
    where
        F: FnMut(&'static str) -> Option<String>,
    {
        let mut var = |name: &'static str| lookup(name).ok_or(ConfigError::MissingEnv(name));
        Ok(Settings {
            client_id: var(ENV_CLIENT_ID)?,
            client_secret: var(ENV_CLIENT_SECRET)?.into(),
            user_agent: var(ENV_USER_AGENT)?,
            username: var(ENV_USERNAME)?,
            password: var(ENV_PASSWORD)?.into(),
        })
    }
}

pub(crate) fn load_submission(path: &Path) -> Result<Submission, PostError> {
    let map = load_json(path)?;
    let submission = Submission::from_json(&map, path)?;
    debug!(file = %path.display(), subreddit = %submission.subreddit, "loaded post");
    Ok(submission)
}

pub(crate) fn load_settings(path: &Path) -> Result<Settings, PostError> {
    let map = load_json(path)?;
    let settings = Settings::from_json(&map, path)?;
    debug!(file = %path.display(), username = %settings.username, "loaded settings");
    Ok(settings)
}

/// Picks the settings for `source`. Only the file source needs a settings path.
pub(crate) fn resolve_settings<F>(
    source: CredentialSource,
    settings_path: Option<&Path>,
    lookup: F,
) -> Result<Settings, PostError>
where
    F: FnMut(&'static str) -> Option<String>,
{
    match source {
        CredentialSource::File => {
            let path = require_flag(settings_path, "settings", "-s", "--settings")?;
            load_settings(path)
        }
        CredentialSource::Env => Ok(Settings::from_lookup(lookup)?),
    }
}
