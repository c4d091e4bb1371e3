//! Framework-provided fallback views.
//!
//! The build subsystem installs these when the project supplies no
//! `_document`, `_app` or `_error` page of its own; the loader then
//! resolves them like any other module. The serve binary calls
//! [`ensure_fallback_views`] so a bare dist directory is still renderable.

use std::io;
use std::path::Path;

use serde_json::json;

/// Outer HTML shell: head markup, styles, mount element, state script,
/// client scripts.
pub const DEFAULT_DOCUMENT: &str = r#"<html>
<head>
{{ head | safe }}
{% for href in styles %}<link href="{{ href }}" rel="stylesheet">
{% endfor %}</head>
<body>
<div id="{{ mount_id }}">{{ body | safe }}</div>
{% if props_json %}<script type="text/javascript">{{ state_var }}={{ props_json | safe }}</script>
{% endif %}{% for src in scripts %}<script src="{{ src }}" type="text/javascript" defer></script>
{% endfor %}</body>
</html>"#;

/// Component wrapper; projects override this to add layout shared by all
/// pages.
pub const DEFAULT_APP: &str = r#"{% include "page.html" %}"#;

/// Error view rendered for unmatched routes and pipeline failures.
/// Receives `{statusCode, message}` props.
pub const DEFAULT_ERROR: &str = r#"{%- set status = props.statusCode | default(500) -%}
{%- set msg = props.message | default("An unexpected error has occurred") -%}
{{ head("<title>" ~ status ~ ": " ~ msg ~ "</title>") }}
{{ head('<meta name="viewport" content="width=device-width,initial-scale=1.0,minimum-scale=1.0">') }}
<div style="font-family: sans-serif; text-align: center; padding-top: 15%;">
  <div style="font-size: 1.5rem; color: #47494e; margin-bottom: 8px;">{{ status }}</div>
  <div style="color: #7f828b; line-height: 21px;">{{ msg }}</div>
</div>"#;

/// Write the fallback `_document`, `_app` and `_error` modules into the
/// views directory unless the build already produced them.
pub fn ensure_fallback_views(views_dir: &Path) -> io::Result<()> {
    std::fs::create_dir_all(views_dir)?;
    let fallbacks = [
        ("_document", DEFAULT_DOCUMENT),
        ("_app", DEFAULT_APP),
        ("_error", DEFAULT_ERROR),
    ];
    for (name, component) in fallbacks {
        let path = views_dir.join(format!("{name}.json"));
        if path.exists() {
            continue;
        }
        let module = json!({ "component": component });
        std::fs::write(&path, serde_json::to_string_pretty(&module)?)?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fallbacks_are_written_once() {
        let dir = tempfile::tempdir().unwrap();
        ensure_fallback_views(dir.path()).unwrap();
        assert!(dir.path().join("_document.json").exists());
        assert!(dir.path().join("_app.json").exists());
        assert!(dir.path().join("_error.json").exists());

        // A user-supplied module survives a second call.
        let custom = dir.path().join("_app.json");
        std::fs::write(&custom, r#"{"component": "custom"}"#).unwrap();
        ensure_fallback_views(dir.path()).unwrap();
        let content = std::fs::read_to_string(&custom).unwrap();
        assert!(content.contains("custom"));
    }

    #[test]
    fn default_error_view_renders_status_and_message() {
        use crate::config::Globals;
        use crate::manifest::AssetList;
        use crate::renderer::{RenderAssets, Renderer};

        let list = AssetList::default();
        let html = Renderer::new(&Globals::default())
            .render(
                &RenderAssets {
                    document: DEFAULT_DOCUMENT,
                    app: DEFAULT_APP,
                    component: DEFAULT_ERROR,
                    assets: &list,
                },
                Some(&serde_json::json!({"statusCode": 404, "message": "Not Found"})),
            )
            .unwrap();
        assert!(html.contains("404"));
        assert!(html.contains("Not Found"));
        assert!(html.contains("<title>404: Not Found</title>"));
    }
}
