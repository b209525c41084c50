//! HTML rendering for the single-page interface.
//!
//! Messages are substituted into the user/bot templates through the `{{MSG}}` placeholder.
//! Message text is untrusted (it comes from the user or from the model) and is always escaped
//! before substitution.

use crate::conversation::History;
use crate::extract::Document;

/// Placeholder replaced by message text in [`USER_TEMPLATE`] and [`BOT_TEMPLATE`].
pub const MESSAGE_PLACEHOLDER: &str = "{{MSG}}";

/// Template for a question bubble.
pub const USER_TEMPLATE: &str = r#"<div class="chat-message user">
  <div class="avatar">&#128100;</div>
  <div class="message">{{MSG}}</div>
</div>"#;

/// Template for an answer bubble.
pub const BOT_TEMPLATE: &str = r#"<div class="chat-message bot">
  <div class="avatar">&#129302;</div>
  <div class="message">{{MSG}}</div>
</div>"#;

const CSS: &str = r#"<style>
body { margin: 0; font-family: system-ui, sans-serif; background: #0e1117; color: #fafafa; }
.layout { display: grid; grid-template-columns: 18rem 1fr 1fr; gap: 1rem; min-height: 100vh; }
.sidebar { background: #262730; padding: 1rem; }
.column { padding: 1rem; overflow-y: auto; }
h3 { margin-top: 0; }
.notice { padding: .75rem 1rem; border-radius: .5rem; margin-bottom: 1rem; }
.notice.success { background: #173928; color: #7ee2a8; }
.notice.error { background: #3e1f24; color: #ff9b9b; }
.chat-message { padding: 1.25rem; border-radius: .5rem; margin-bottom: 1rem; display: flex; }
.chat-message.user { background-color: #2b313e; }
.chat-message.bot { background-color: #475063; }
.chat-message .avatar { width: 3rem; font-size: 2rem; }
.chat-message .message { flex: 1; padding: 0 1rem; white-space: pre-wrap; }
input[type=text] { width: 100%; padding: .5rem; box-sizing: border-box; }
details { margin-top: 1rem; }
#busy { display: none; position: fixed; inset: 0; background: rgba(0,0,0,.55);
        align-items: center; justify-content: center; font-size: 1.5rem; }
</style>"#;

const BUSY_SCRIPT: &str = r#"<script>
document.querySelectorAll("form[data-busy]").forEach(function (form) {
  form.addEventListener("submit", function () {
    var busy = document.getElementById("busy");
    busy.textContent = form.dataset.busy;
    busy.style.display = "flex";
  });
});
</script>"#;

/// Kind of status line shown above the page content.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NoticeKind {
    /// Action completed.
    Success,
    /// Action failed; the text describes why.
    Error,
}

/// Status line shown after an action.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Notice {
    /// Severity.
    pub kind: NoticeKind,
    /// Plain text (escaped on render).
    pub text: String,
}

impl Notice {
    /// Success notice.
    pub fn success(text: impl Into<String>) -> Self {
        Self {
            kind: NoticeKind::Success,
            text: text.into(),
        }
    }

    /// Failure notice.
    pub fn error(text: impl Into<String>) -> Self {
        Self {
            kind: NoticeKind::Error,
            text: text.into(),
        }
    }
}

/// Everything the page shows.
pub struct PageView<'a> {
    /// Documents of the last successful Process action.
    pub documents: &'a [Document],
    /// Current dialogue.
    pub history: &'a History,
    /// Whether questions can be asked.
    pub ready: bool,
    /// Outcome of the action that produced this render.
    pub notice: Option<Notice>,
}

/// Escape text for use in HTML element content and attribute values.
pub fn escape_html(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for ch in text.chars() {
        match ch {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#x27;"),
            _ => out.push(ch),
        }
    }
    out
}

/// Substitute escaped `text` into `template`.
pub fn render_message(template: &str, text: &str) -> String {
    template.replace(MESSAGE_PLACEHOLDER, &escape_html(text))
}

/// Render the full page.
pub fn render_page(view: &PageView<'_>) -> String {
    let mut html = String::with_capacity(8 * 1024);
    html.push_str("<!DOCTYPE html>\n<html lang=\"en\">\n<head>\n<meta charset=\"utf-8\">\n");
    html.push_str("<title>Chat with multiple PDFs</title>\n");
    html.push_str(CSS);
    html.push_str("\n</head>\n<body>\n<div class=\"layout\">\n");

    render_sidebar(&mut html, view);
    render_documents(&mut html, view.documents);
    render_chat(&mut html, view);

    html.push_str("</div>\n<div id=\"busy\"></div>\n");
    html.push_str(BUSY_SCRIPT);
    html.push_str("\n</body>\n</html>\n");
    html
}

fn render_sidebar(html: &mut String, view: &PageView<'_>) {
    html.push_str("<aside class=\"sidebar\">\n<h3>Your documents</h3>\n");
    html.push_str(
        "<form method=\"post\" action=\"/process\" enctype=\"multipart/form-data\" data-busy=\"Processing\">\n\
<p>Upload your PDFs here and click on 'Process'</p>\n\
<input type=\"file\" name=\"documents\" accept=\"application/pdf,.pdf\" multiple required>\n\
<p><button type=\"submit\">Process</button></p>\n</form>\n",
    );
    if let Some(notice) = &view.notice {
        let class = match notice.kind {
            NoticeKind::Success => "success",
            NoticeKind::Error => "error",
        };
        html.push_str(&format!(
            "<div class=\"notice {class}\">{}</div>\n",
            escape_html(&notice.text)
        ));
    }
    html.push_str("</aside>\n");
}

fn render_documents(html: &mut String, documents: &[Document]) {
    html.push_str("<section class=\"column\">\n<h3>PDFs</h3>\n");
    for (idx, document) in documents.iter().enumerate() {
        html.push_str(&format!(
            "<p>{}</p>\n<iframe src=\"/documents/{idx}\" title=\"{}\" width=\"100%\" height=\"800\" type=\"application/pdf\"></iframe>\n",
            escape_html(&document.filename),
            escape_html(&document.filename),
        ));
    }
    html.push_str("</section>\n");
}

fn render_chat(html: &mut String, view: &PageView<'_>) {
    html.push_str("<section class=\"column\">\n<h3>Ask question:</h3>\n");
    let disabled = if view.ready { "" } else { " disabled" };
    html.push_str(&format!(
        "<form method=\"post\" action=\"/ask\" data-busy=\"Fetching response...\">\n\
<input type=\"text\" name=\"question\" placeholder=\"Ask a question about your documents:\" autocomplete=\"off\"{disabled}>\n\
</form>\n"
    ));
    html.push_str("<details open>\n<summary>Chat history</summary>\n");
    for (question, answer) in view.history.exchanges_newest_first() {
        html.push_str(&render_message(USER_TEMPLATE, &question.content));
        html.push('\n');
        html.push_str(&render_message(BOT_TEMPLATE, &answer.content));
        html.push('\n');
    }
    html.push_str("</details>\n</section>\n");
}
