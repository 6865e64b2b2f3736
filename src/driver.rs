use std::collections::BTreeMap;

use tracing::{info, warn};

use crate::config::{Settings, Submission};
use crate::error::{FlairNotFoundError, PlatformError, PostError};
use crate::reddit::RedditClient;

#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct Subreddit {
    pub name: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct FlairTemplate {
    pub label: String,
    pub id: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct SelfPost<'a> {
    pub title: &'a str,
    pub body: &'a str,
    pub flair_id: Option<&'a str>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct Submitted {
    pub id: String,
    pub fullname: String,
    pub url: String,
}

/// What the driver needs from an authenticated platform session.
pub(crate) trait PostClient {
    fn subreddit(&self, name: &str) -> Result<Subreddit, PlatformError>;
    fn user_selectable_flairs(
        &self,
        subreddit: &Subreddit,
    ) -> Result<Vec<FlairTemplate>, PlatformError>;
    fn submit(&self, subreddit: &Subreddit, post: &SelfPost<'_>) -> Result<Submitted, PlatformError>;
}

/// Flair label to template id. A label seen twice keeps the last id.
#[derive(Debug, Default)]
pub(crate) struct FlairMap(BTreeMap<String, String>);

impl FlairMap {
    pub(crate) fn id(&self, label: &str) -> Option<&str> {
        self.0.get(label).map(String::as_str)
    }

    pub(crate) fn labels(&self) -> Vec<String> {
        self.0.keys().cloned().collect()
    }
}

impl FromIterator<FlairTemplate> for FlairMap {
    fn from_iter<I: IntoIterator<Item = FlairTemplate>>(iter: I) -> Self {
        FlairMap(iter.into_iter().map(|t| (t.label, t.id)).collect())
    }
}

/// Logs in with `settings` and submits `submission`.
pub(crate) fn publish(settings: &Settings, submission: &Submission) -> Result<Submitted, PostError> {
    let client = RedditClient::login(settings)?;
    info!(username = %settings.username, "logged in");
    submit_with(&client, submission)
}

pub(crate) fn submit_with<C: PostClient>(
    client: &C,
    submission: &Submission,
) -> Result<Submitted, PostError> {
    let subreddit = client.subreddit(&submission.subreddit)?;
    let plain = SelfPost {
        title: &submission.title,
        body: &submission.body,
        flair_id: None,
    };
    if submission.flair.is_empty() {
        return Ok(client.submit(&subreddit, &plain)?);
    }

    // Any failure to list flairs, including subreddits with link flair
    // disabled, degrades to a post without flair.
    let flairs: FlairMap = match client.user_selectable_flairs(&subreddit) {
        Ok(templates) => templates.into_iter().collect(),
        Err(e) => {
            warn!(
                subreddit = %subreddit.name,
                error = %e,
                "cannot list flairs, posting without flair"
            );
            return Ok(client.submit(&subreddit, &plain)?);
        }
    };
    let Some(flair_id) = flairs.id(&submission.flair) else {
        return Err(FlairNotFoundError {
            requested: submission.flair.clone(),
            available: flairs.labels(),
        }
        .into());
    };
    let flaired = SelfPost {
        flair_id: Some(flair_id),
        ..plain
    };
    Ok(client.submit(&subreddit, &flaired)?)
}
