//! View rendering
//!
//! Handlers call [`Render::render`] with a view name and the locals they
//! own. The built-in [`HtmlRenderer`] produces plain HTML pages; another
//! implementation can be injected through `AppState`.

use html_escape::{encode_double_quoted_attribute as attr, encode_text as text};
use serde_json::{Map, Value};

use crate::error::AppError;

/// Title shared by every page
pub const TITLE: &str = "LGTM.in GitHub Bookmarklet";

/// Template locals
pub type Locals = Map<String, Value>;

/// Rendering collaborator
pub trait Render: Send + Sync {
    /// Render `view` with `locals` into a complete HTML document
    fn render(&self, view: &str, locals: &Locals) -> Result<String, AppError>;
}

/// Built-in renderer for the service's views
#[derive(Debug, Default, Clone)]
pub struct HtmlRenderer;

fn local<'a>(locals: &'a Locals, key: &str) -> &'a str {
    locals.get(key).and_then(Value::as_str).unwrap_or_default()
}

impl Render for HtmlRenderer {
    fn render(&self, view: &str, locals: &Locals) -> Result<String, AppError> {
        let body = match view {
            "index" => render_index(locals),
            "lgtm" => render_lgtm_form(locals),
            "lgtm_create" => render_lgtm_created(locals),
            "auth_failure" => render_auth_failure(),
            other => {
                return Err(AppError::Internal(anyhow::anyhow!("unknown view: {other}")));
            }
        };

        let title = locals.get("title").and_then(Value::as_str).unwrap_or(TITLE);
        Ok(layout(title, &body))
    }
}

fn layout(title: &str, body: &str) -> String {
    format!(
        r#"<!DOCTYPE html>
<html lang="en">
<head>
  <meta charset="utf-8" />
  <meta name="viewport" content="width=device-width, initial-scale=1" />
  <title>{}</title>
  <link rel="stylesheet" href="/css/style.css" />
</head>
<body>
{}
</body>
</html>"#,
        text(title),
        body
    )
}

fn render_index(locals: &Locals) -> String {
    format!(
        r#"  <h1>{}</h1>
  <p>Drag this link to your bookmarks bar, then click it on a GitHub issue or pull request.</p>
  <p><a class="bookmarklet" href="{}">LGTM</a></p>"#,
        text(TITLE),
        attr(local(locals, "bmltCode"))
    )
}

fn render_lgtm_form(locals: &Locals) -> String {
    let login = locals
        .get("user")
        .and_then(|user| user.get("login"))
        .and_then(Value::as_str)
        .unwrap_or_default();

    format!(
        r#"  <p class="signed-in">Signed in as <strong>{login}</strong> (<a href="/out">sign out</a>)</p>
  <form method="post" action="/lgtm">
    <input type="hidden" name="_csrf" value="{csrf}" />
    <input type="hidden" name="user" value="{owner}" />
    <input type="hidden" name="repo" value="{repo}" />
    <input type="hidden" name="number" value="{number}" />
    <p>{owner_text}/{repo_text}#{number_text}</p>
    <textarea name="text">LGTM</textarea>
    <input type="text" name="hash" placeholder="LGTM image hash" />
    <button type="submit">Post LGTM</button>
  </form>"#,
        login = text(login),
        csrf = attr(local(locals, "csrf")),
        owner = attr(local(locals, "owner")),
        repo = attr(local(locals, "repo")),
        number = attr(local(locals, "number")),
        owner_text = text(local(locals, "owner")),
        repo_text = text(local(locals, "repo")),
        number_text = text(local(locals, "number")),
    )
}

fn render_lgtm_created(locals: &Locals) -> String {
    let link = match locals.get("commentUrl").and_then(Value::as_str) {
        Some(url) => format!(r#"<p><a href="{}">View comment</a></p>"#, attr(url)),
        None => String::new(),
    };
    format!("  <h1>LGTM posted!</h1>\n  {link}")
}

fn render_auth_failure() -> String {
    r#"  <h1>Sign in failed</h1>
  <p>GitHub authorization did not complete. <a href="/lgtm">Try again</a>.</p>"#
        .to_string()
}
