//! Aggregator page listing every configured site.
//!
//! Pure presentation over the loaded site definitions: one row per site
//! with its favicon (as a data URI), a link to the instance's listen
//! address, and the description. No caching logic lives here.

use std::sync::Arc;

use anyhow::Context;
use axum::extract::State;
use axum::response::Html;
use axum::routing::get;
use axum::Router;
use tracing::info;

use webstash_core::SiteConfig;

/// Page shell; `{{ROWS}}` is replaced with the rendered site rows.
const PAGE_TEMPLATE: &str = r#"<!DOCTYPE html>
<html>
<head>
    <meta charset="UTF-8">
    <title>Site List</title>
    <style>
        body {
            font-family: Arial, sans-serif;
            margin: 0;
            padding: 0;
            background-color: #f4f4f4;
        }
        .container {
            max-width: 800px;
            margin: 20px auto;
            background-color: #fff;
            padding: 20px;
            border-radius: 8px;
            box-shadow: 0 2px 4px rgba(0, 0, 0, 0.1);
        }
        .site-list {
            list-style: none;
            padding: 0;
        }
        .site-item {
            margin-bottom: 15px;
            padding-bottom: 15px;
            border-bottom: 1px solid #eeeeee;
        }
        .site-item:last-child {
            border-bottom: none;
        }
        .site-icon {
            max-width: 50px;
            max-height: 50px;
            vertical-align: middle;
        }
        .site-name a {
            font-size: 20px;
            text-decoration: none;
            color: #333;
        }
        .site-description {
            margin-top: 5px;
            font-size: 14px;
        }
    </style>
</head>
<body>
    <div class="container">
        <h1>Available Sites</h1>
        <ul class="site-list">
{{ROWS}}        </ul>
    </div>
</body>
</html>
"#;

/// One list row; placeholders are replaced per site.
const ROW_TEMPLATE: &str = r#"            <li class="site-item">
                <div class="site-name">
                    <img class="site-icon" src="data:image/*;base64,{{ICON}}">
                    <a href="http://{{ADDR}}">{{NAME}}</a> - {{DESCRIPTION}}
                </div>
            </li>
"#;

/// Builds the aggregator router over the loaded site definitions.
pub fn router(sites: Vec<SiteConfig>) -> Router {
    Router::new()
        .route("/", get(site_list))
        .with_state(Arc::new(sites))
}

/// Serves the aggregator page on `addr` until the process terminates.
pub async fn serve(addr: &str, sites: Vec<SiteConfig>) -> anyhow::Result<()> {
    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("binding navigate listener on {addr}"))?;
    info!("navigate page listening on {addr}");
    axum::serve(listener, router(sites))
        .await
        .context("navigate server terminated")
}

async fn site_list(State(sites): State<Arc<Vec<SiteConfig>>>) -> Html<String> {
    Html(render(&sites))
}

fn render(sites: &[SiteConfig]) -> String {
    let rows: String = sites
        .iter()
        .map(|site| {
            ROW_TEMPLATE
                .replace("{{ICON}}", site.icon.as_deref().unwrap_or(""))
                .replace("{{ADDR}}", &site.listen_addr)
                .replace("{{NAME}}", &site.name)
                .replace("{{DESCRIPTION}}", &site.description)
        })
        .collect();
    PAGE_TEMPLATE.replace("{{ROWS}}", &rows)
}
