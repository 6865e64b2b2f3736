use std::time::Duration;

use percent_encoding::{utf8_percent_encode, AsciiSet, NON_ALPHANUMERIC};
use reqwest::blocking::{Client, RequestBuilder, Response};
use secrecy::{ExposeSecret, SecretString};
use serde::de::DeserializeOwned;
use tracing::debug;

use crate::config::Settings;
use crate::driver::{FlairTemplate, PostClient, SelfPost, Submitted, Subreddit};
use crate::error::PlatformError;
use crate::types::*;

const TOKEN_URL: &str = "https://www.reddit.com/api/v1/access_token";
const API_BASE: &str = "https://oauth.reddit.com";
// Subreddit names are letters, digits and underscores; everything else is
// escaped so a name stays one path segment.
const PATH_SEGMENT: &AsciiSet = &NON_ALPHANUMERIC.remove(b'_');

fn client(user_agent: &str) -> Result<Client, PlatformError> {
    Client::builder()
        .timeout(Duration::from_secs(20))
        .user_agent(user_agent)
        .build()
        .map_err(transport("building http client"))
}

fn transport(context: &'static str) -> impl FnOnce(reqwest::Error) -> PlatformError {
    move |source| PlatformError::Transport { context, source }
}

fn subreddit_path(name: &str, rest: &str) -> String {
    format!("/r/{}{rest}", utf8_percent_encode(name, PATH_SEGMENT))
}

fn token_request(http: &Client, settings: &Settings) -> RequestBuilder {
    http.post(TOKEN_URL)
        .basic_auth(
            &settings.client_id,
            Some(settings.client_secret.expose_secret()),
        )
        .form(&PasswordGrant {
            grant_type: GrantType::Password,
            username: &settings.username,
            password: settings.password.expose_secret(),
        })
}

/// An authenticated session against the reddit OAuth API.
pub(crate) struct RedditClient {
    http: Client,
    token: SecretString,
}

impl RedditClient {
    /// Script-app login: password grant with the app id and secret as basic auth.
    pub(crate) fn login(settings: &Settings) -> Result<Self, PlatformError> {
        let http = client(&settings.user_agent)?;
        let response: TokenResponse = token_request(&http, settings)
            .send()
            .map_err(transport("token post"))?
            .with_error_text()?
            .decode_json("token")?;
        let token = access_token(response)?;
        debug!(username = %settings.username, "got access token");
        Ok(RedditClient {
            http,
            token: token.into(),
        })
    }

    fn get(&self, path: &str) -> RequestBuilder {
        self.http
            .get(format!("{API_BASE}{path}"))
            .query(&[("raw_json", "1")])
            .bearer_auth(self.token.expose_secret())
    }

    fn post(&self, path: &str) -> RequestBuilder {
        self.http
            .post(format!("{API_BASE}{path}"))
            .query(&[("raw_json", "1")])
            .bearer_auth(self.token.expose_secret())
    }

    fn about_request(&self, name: &str) -> RequestBuilder {
        self.get(&subreddit_path(name, "/about"))
    }

    fn flair_request(&self, subreddit: &Subreddit) -> RequestBuilder {
        self.post(&subreddit_path(&subreddit.name, "/api/flairselector"))
            .form(&FlairSelectorQuery { is_newlink: true })
    }

    fn submit_request(&self, subreddit: &Subreddit, post: &SelfPost<'_>) -> RequestBuilder {
        self.post("/api/submit").form(&SubmitForm {
            api_type: "json",
            kind: SubmitKind::SelfPost,
            sr: &subreddit.name,
            title: post.title,
            text: post.body,
            flair_id: post.flair_id,
        })
    }
}

impl PostClient for RedditClient {
    fn subreddit(&self, name: &str) -> Result<Subreddit, PlatformError> {
        let about: Thing<serde_json::Value> = self
            .about_request(name)
            .send()
            .map_err(transport("subreddit about get"))?
            .with_error_text()?
            .decode_json("subreddit about")?;
        resolved_subreddit(name, about)
    }

    fn user_selectable_flairs(
        &self,
        subreddit: &Subreddit,
    ) -> Result<Vec<FlairTemplate>, PlatformError> {
        let selector: FlairSelector = self
            .flair_request(subreddit)
            .send()
            .map_err(transport("flair selector post"))?
            .with_error_text()?
            .decode_json("flair selector")?;
        Ok(flair_templates(selector))
    }

    fn submit(&self, subreddit: &Subreddit, post: &SelfPost<'_>) -> Result<Submitted, PlatformError> {
        let response: SubmitResponse = self
            .submit_request(subreddit, post)
            .send()
            .map_err(transport("submit post"))?
            .with_error_text()?
            .decode_json("submit")?;
        submitted(response)
    }
}

fn decode<T: DeserializeOwned>(endpoint: &str, body: &str) -> Result<T, PlatformError> {
    serde_json::from_str(body)
        .map_err(|e| PlatformError::Api(format!("unexpected {endpoint} response: {e}")))
}

// The kind is checked before the data is decoded: a missing subreddit can come
// back as a search listing instead of a t5.
fn resolved_subreddit(
    name: &str,
    about: Thing<serde_json::Value>,
) -> Result<Subreddit, PlatformError> {
    if about.kind != "t5" {
        return Err(PlatformError::Api(format!(
            "r/{name} is not a subreddit (got a {})",
            about.kind
        )));
    }
    let data: SubredditAbout = serde_json::from_value(about.data)
        .map_err(|e| PlatformError::Api(format!("unexpected subreddit about response: {e}")))?;
    debug!(
        subreddit = %data.display_name,
        link_flair_enabled = ?data.link_flair_enabled,
        "resolved subreddit"
    );
    Ok(Subreddit {
        name: data.display_name,
    })
}

fn access_token(response: TokenResponse) -> Result<String, PlatformError> {
    match response {
        TokenResponse {
            access_token: Some(token),
            ..
        } => Ok(token),
        TokenResponse {
            error,
            error_description,
            ..
        } => Err(PlatformError::Auth(
            match (error, error_description) {
                (Some(e), Some(d)) => format!("{e}: {d}"),
                (Some(e), None) => e,
                (None, Some(d)) => d,
                (None, None) => "no access token in response".to_string(),
            },
        )),
    }
}

// Templates without text cannot be asked for by label.
fn flair_templates(selector: FlairSelector) -> Vec<FlairTemplate> {
    selector
        .choices
        .into_iter()
        .filter_map(|c| {
            c.flair_text.map(|label| FlairTemplate {
                label,
                id: c.flair_template_id,
            })
        })
        .collect()
}

fn submitted(response: SubmitResponse) -> Result<Submitted, PlatformError> {
    let SubmitJson { errors, data } = response.json;
    if !errors.is_empty() {
        let messages: Vec<String> = errors
            .iter()
            .map(|e| {
                let code = e.first().and_then(serde_json::Value::as_str).unwrap_or("?");
                match e.get(1).and_then(serde_json::Value::as_str) {
                    Some(msg) => format!("{code}: {msg}"),
                    None => code.to_string(),
                }
            })
            .collect();
        return Err(PlatformError::Api(messages.join("; ")));
    }
    let data = data.ok_or_else(|| PlatformError::Api("no post in submit response".to_string()))?;
    Ok(Submitted {
        id: data.id,
        fullname: data.name,
        url: data.url,
    })
}

trait ResponseExt {
    fn with_error_text(self) -> Result<Self, PlatformError>
    where
        Self: Sized;
    fn decode_json<T: DeserializeOwned>(self, endpoint: &str) -> Result<T, PlatformError>;
}
impl ResponseExt for Response {
    fn with_error_text(self) -> Result<Self, PlatformError> {
        let status = self.status();
        if status.is_client_error() || status.is_server_error() {
            let body = self.text().map_err(transport("reading error body"))?;
            return Err(PlatformError::Http { status, body });
        }
        Ok(self)
    }

    fn decode_json<T: DeserializeOwned>(self, endpoint: &str) -> Result<T, PlatformError> {
        let body = self.text().map_err(transport("reading response body"))?;
        decode(endpoint, &body)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use reqwest::blocking::Request;
    use reqwest::header::{AUTHORIZATION, CONTENT_TYPE};
    use reqwest::Method;

    fn parse<T: DeserializeOwned>(body: &str) -> T {
        serde_json::from_str(body).unwrap()
    }

    fn session() -> RedditClient {
        RedditClient {
            http: Client::new(),
            token: "tok".to_string().into(),
        }
    }

    fn settings() -> Settings {
        Settings {
            client_id: "abc".to_string(),
            client_secret: "shh".to_string().into(),
            user_agent: "poster/0.1 by u/tester".to_string(),
            username: "tester".to_string(),
            password: "hunter2".to_string().into(),
        }
    }

    fn form_body(request: &Request) -> &str {
        let bytes = request.body().and_then(|b| b.as_bytes()).unwrap();
        std::str::from_utf8(bytes).unwrap()
    }

    fn subreddit(name: &str) -> Subreddit {
        Subreddit {
            name: name.to_string(),
        }
    }

    #[test]
    fn token_request_uses_basic_auth_and_password_grant() {
        let request = token_request(&Client::new(), &settings()).build().unwrap();
        assert_eq!(request.method(), &Method::POST);
        assert_eq!(request.url().as_str(), TOKEN_URL);
        assert_eq!(request.headers()[AUTHORIZATION], "Basic YWJjOnNoaA==");
        assert_eq!(
            request.headers()[CONTENT_TYPE],
            "application/x-www-form-urlencoded"
        );
        assert_eq!(
            form_body(&request),
            "grant_type=password&username=tester&password=hunter2"
        );
    }

    #[test]
    fn about_request_carries_bearer_token() {
        let request = session().about_request("rust_gamedev").build().unwrap();
        assert_eq!(request.method(), &Method::GET);
        assert_eq!(
            request.url().as_str(),
            "https://oauth.reddit.com/r/rust_gamedev/about?raw_json=1"
        );
        assert_eq!(request.headers()[AUTHORIZATION], "Bearer tok");
    }

    #[test]
    fn subreddit_name_stays_one_path_segment() {
        let request = session()
            .about_request("test/../../api/v1/me?x=")
            .build()
            .unwrap();
        let url = request.url();
        assert_eq!(url.host_str(), Some("oauth.reddit.com"));
        assert_eq!(
            url.path(),
            "/r/test%2F%2E%2E%2F%2E%2E%2Fapi%2Fv1%2Fme%3Fx%3D/about"
        );
        assert_eq!(url.query(), Some("raw_json=1"));

        let request = session().flair_request(&subreddit("a#b")).build().unwrap();
        let url = request.url();
        assert_eq!(url.path(), "/r/a%23b/api/flairselector");
        assert_eq!(url.fragment(), None);
        assert_eq!(url.query(), Some("raw_json=1"));
    }

    #[test]
    fn flair_request_asks_for_new_link_flairs() {
        let request = session().flair_request(&subreddit("test")).build().unwrap();
        assert_eq!(request.method(), &Method::POST);
        assert_eq!(request.headers()[AUTHORIZATION], "Bearer tok");
        assert_eq!(form_body(&request), "is_newlink=true");
    }

    #[test]
    fn submit_request_encodes_self_post() {
        let post = SelfPost {
            title: "Hello",
            body: "World",
            flair_id: Some("b2"),
        };
        let request = session()
            .submit_request(&subreddit("test"), &post)
            .build()
            .unwrap();
        assert_eq!(request.method(), &Method::POST);
        assert_eq!(
            request.url().as_str(),
            "https://oauth.reddit.com/api/submit?raw_json=1"
        );
        assert_eq!(request.headers()[AUTHORIZATION], "Bearer tok");
        assert_eq!(
            form_body(&request),
            "api_type=json&kind=self&sr=test&title=Hello&text=World&flair_id=b2"
        );
    }

    #[test]
    fn listing_instead_of_subreddit_is_an_api_error() {
        let err = resolved_subreddit(
            "nosuchsub",
            parse(r#"{"kind": "Listing", "data": {"children": [], "after": null}}"#),
        )
        .unwrap_err();
        assert!(matches!(err, PlatformError::Api(_)));
        assert!(err.to_string().contains("r/nosuchsub is not a subreddit"));
    }

    #[test]
    fn subreddit_about_is_resolved() {
        let sub = resolved_subreddit(
            "RUST",
            parse(r#"{"kind": "t5", "data": {"display_name": "rust", "link_flair_enabled": true, "subscribers": 300000}}"#),
        )
        .unwrap();
        assert_eq!(sub, subreddit("rust"));
    }

    #[test]
    fn undecodable_body_names_the_endpoint() {
        let err = decode::<FlairSelector>("flair selector", "<html>blocked</html>").unwrap_err();
        assert!(matches!(err, PlatformError::Api(_)));
        assert!(err
            .to_string()
            .starts_with("reddit rejected the request: unexpected flair selector response"));
    }

    #[test]
    fn token_is_extracted() {
        let token = access_token(parse(
            r#"{"access_token": "eyJhbGciOi", "token_type": "bearer", "expires_in": 86400, "scope": "*"}"#,
        ))
        .unwrap();
        assert_eq!(token, "eyJhbGciOi");
    }

    #[test]
    fn refused_grant_is_an_auth_error() {
        let err = access_token(parse(r#"{"error": "invalid_grant"}"#)).unwrap_err();
        assert!(matches!(err, PlatformError::Auth(ref m) if m == "invalid_grant"));
        assert_eq!(err.to_string(), "authentication failed: invalid_grant");
    }

    #[test]
    fn unlabelled_flairs_are_skipped() {
        let templates = flair_templates(parse(
            r#"{"choices": [
                {"flair_template_id": "a1", "flair_text": "News"},
                {"flair_template_id": "b2", "flair_text": null},
                {"flair_template_id": "c3", "flair_text": "Meta"}
            ]}"#,
        ));
        assert_eq!(
            templates,
            vec![
                FlairTemplate {
                    label: "News".to_string(),
                    id: "a1".to_string(),
                },
                FlairTemplate {
                    label: "Meta".to_string(),
                    id: "c3".to_string(),
                },
            ]
        );
    }

    #[test]
    fn successful_submit_yields_post() {
        let post = submitted(parse(
            r#"{"json": {"errors": [], "data": {"url": "https://www.reddit.com/r/test/comments/1abcde/hello/", "drafts_count": 0, "id": "1abcde", "name": "t3_1abcde"}}}"#,
        ))
        .unwrap();
        assert_eq!(post.id, "1abcde");
        assert_eq!(post.fullname, "t3_1abcde");
        assert!(post.url.ends_with("/hello/"));
    }

    #[test]
    fn submit_errors_are_reported() {
        let err = submitted(parse(
            r#"{"json": {"errors": [["SUBREDDIT_NOTALLOWED", "you aren't allowed to post there.", "sr"]]}}"#,
        ))
        .unwrap_err();
        assert_eq!(
            err.to_string(),
            "reddit rejected the request: SUBREDDIT_NOTALLOWED: you aren't allowed to post there."
        );
    }

    #[test]
    fn submit_without_data_is_an_error() {
        let err = submitted(parse(r#"{"json": {"errors": []}}"#)).unwrap_err();
        assert!(matches!(err, PlatformError::Api(_)));
    }
}
