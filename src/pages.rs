use maud::{html, Markup, PreEscaped, DOCTYPE};

use crate::render;
use crate::session::{Phase, SessionState};

const STYLESHEET: &str = r#"
body { margin: 0; min-height: 100vh; background: linear-gradient(180deg, #0a0a0a 0%, #1a1a1a 100%); color: #e5e5e5; font-family: system-ui, sans-serif; }
main { max-width: 1040px; margin: 0 auto; padding: 3rem 1.5rem; }
.main-title { font-family: Georgia, serif; font-size: 3rem; text-align: center; margin: 0; color: #fff; }
.subtitle { text-align: center; color: #737373; letter-spacing: 0.2em; text-transform: uppercase; margin-bottom: 2rem; }
form.inline { display: flex; gap: 0.75rem; }
input[type=url], textarea { flex: 1; width: 100%; box-sizing: border-box; background: #111; border: 1px solid #333; color: #fff; padding: 0.7rem; border-radius: 6px; font: inherit; }
textarea { min-height: 200px; margin-bottom: 0.75rem; }
button { background: #1e3a5f; color: #fff; border: 0; border-radius: 6px; padding: 0.7rem 1.4rem; font: inherit; cursor: pointer; }
.notice { padding: 0.8rem 1rem; border-radius: 6px; margin: 1rem 0; }
.notice-error { background: rgba(127,29,29,0.3); color: #fca5a5; }
.notice-warning { background: rgba(133,77,14,0.3); color: #fde68a; }
.result { background: linear-gradient(180deg, #141414 0%, #0d0d0d 100%); border: 1px solid #262626; border-radius: 16px; padding: 2rem; margin-top: 2rem; }
.vehicle-title { font-family: Georgia, serif; font-size: 1.8rem; color: #fff; margin: 0 0 0.5rem; }
.vehicle-meta { color: #737373; }
.result-grid { display: grid; grid-template-columns: 1fr 2fr; gap: 2rem; }
.vehicle-image { width: 100%; border-radius: 8px; }
.spec-grid { display: grid; grid-template-columns: 1fr 1fr; gap: 12px; margin-top: 12px; }
.spec-card { border: 1px solid #262626; border-radius: 8px; padding: 12px; text-align: center; }
.spec-label, .section-label, .value-label { font-size: 0.75rem; color: #737373; text-transform: uppercase; letter-spacing: 0.12em; }
.overview-text { color: #a3a3a3; line-height: 1.8; }
.tag { display: inline-block; padding: 8px 14px; margin: 4px; border-radius: 20px; border: 1px solid #1e3a5f; background: rgba(30,58,95,0.2); color: #93c5fd; }
.tag-option { border-color: #3f3f46; background: rgba(39,39,42,0.5); color: #a1a1aa; }
.tag-concern { border-color: #7f1d1d; background: rgba(127,29,29,0.2); color: #fca5a5; }
.value-grid { display: grid; grid-template-columns: repeat(3, 1fr); gap: 1rem; }
.value-card { border: 1px solid #333; border-radius: 8px; padding: 24px; text-align: center; background: rgba(0,0,0,0.3); }
.value-card-medium { border-color: #1e3a5f; background: rgba(30,58,95,0.2); }
.value-amount { font-family: Georgia, serif; font-size: 1.75rem; color: #fff; }
.value-factors { color: #737373; font-style: italic; text-align: center; margin-top: 1rem; }
hr { border: 0; border-top: 1px solid #262626; margin: 1.5rem 0; }
"#;

fn layout(title: &str, content: Markup) -> Markup {
    html! {
        (DOCTYPE)
        html lang="en" {
            head {
                meta charset="utf-8";
                meta name="viewport" content="width=device-width, initial-scale=1.0";
                title { (title) }
                style { (PreEscaped(STYLESHEET)) }
            }
            body {
                main {
                    h1 class="main-title" { "Vehicle Evaluator" }
                    p class="subtitle" { "Market Intelligence" }
                    (content)
                }
            }
        }
    }
}

fn url_form(url: &str) -> Markup {
    html! {
        form class="inline" method="post" action="/submit" {
            input type="url" name="url" value=(url)
                placeholder="https://bringatrailer.com/listing/..."
                aria-label="Vehicle listing URL"
                required;
            button type="submit" { "Submit" }
        }
    }
}

fn paste_form(url: &str, pasted: &str) -> Markup {
    html! {
        div class="notice notice-warning" {
            "Couldn't auto-fetch the listing. Please paste the listing content below."
        }
        form method="post" action="/analyze" {
            input type="hidden" name="url" value=(url);
            textarea name="content" aria-label="Listing content"
                placeholder="Copy all text from the listing page and paste here..." { (pasted) }
            button type="submit" { "Analyze" }
        }
    }
}

fn reset_form() -> Markup {
    html! {
        hr;
        form method="post" action="/reset" {
            button type="submit" { "New Search" }
        }
    }
}

/// Full page for a resting session state.
pub fn session_page(session: &SessionState) -> Markup {
    let title = session
        .record()
        .map(|r| r.title.as_str())
        .unwrap_or("Vehicle Evaluator");

    layout(
        title,
        html! {
            (url_form(&session.url))
            @if let Some(error) = &session.error {
                div class="notice notice-error" role="alert" { "Analysis failed: " (error) }
            }
            @match &session.phase {
                Phase::NeedsManualPaste => {
                    (paste_form(&session.url, session.pasted.as_deref().unwrap_or_default()))
                }
                Phase::Done(record) => {
                    (render::render(record))
                    (reset_form())
                }
                Phase::Idle | Phase::Fetching | Phase::Analyzing { .. } => {}
            }
        },
    )
}
