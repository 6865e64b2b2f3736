use serde::Deserialize;
use serde::Serialize;

#[derive(Serialize)]
pub struct PasswordGrant<'a> {
    pub grant_type: GrantType,
    pub username: &'a str,
    pub password: &'a str,
}

#[derive(Serialize)]
#[serde(rename_all = "snake_case")]
pub enum GrantType {
    Password,
}

/// Reddit answers a refused password grant with a 200 and an `error` field,
/// so both shapes go through the same struct.
#[derive(Debug, Deserialize)]
pub struct TokenResponse {
    pub access_token: Option<String>,
    pub error: Option<String>,
    pub error_description: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct Thing<T> {
    pub kind: String,
    pub data: T,
}

#[derive(Debug, Deserialize)]
pub struct SubredditAbout {
    pub display_name: String,
    #[serde(default)]
    pub link_flair_enabled: Option<bool>,
}

#[derive(Serialize)]
pub struct FlairSelectorQuery {
    pub is_newlink: bool,
}

#[derive(Debug, Deserialize)]
pub struct FlairSelector {
    #[serde(default)]
    pub choices: Vec<FlairChoice>,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct FlairChoice {
    #[serde(default)]
    pub flair_text: Option<String>,
    pub flair_template_id: String,
}

#[derive(Serialize)]
pub struct SubmitForm<'a> {
    pub api_type: &'static str,
    pub kind: SubmitKind,
    pub sr: &'a str,
    pub title: &'a str,
    pub text: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub flair_id: Option<&'a str>,
}

#[derive(Serialize)]
pub enum SubmitKind {
    #[serde(rename = "self")]
    SelfPost,
}

#[derive(Debug, Deserialize)]
pub struct SubmitResponse {
    pub json: SubmitJson,
}

#[derive(Debug, Deserialize)]
pub struct SubmitJson {
    /// Each entry is `[code, message, field]`.
    #[serde(default)]
    pub errors: Vec<Vec<serde_json::Value>>,
    pub data: Option<SubmitData>,
}

#[derive(Debug, Deserialize)]
pub struct SubmitData {
    pub id: String,
    pub name: String,
    pub url: String,
}
