use axum::response::{Html, IntoResponse};

const INDEX_HTML: &str = r#"<!doctype html>
<html>
  <head><title>task-bridge</title></head>
  <body>
    <h1>task-bridge</h1>
    <p><a href="/login">Sign in with Google</a></p>
    <p><a href="/login/github">Link GitHub for premium features</a></p>
  </body>
</html>
"#;

pub async fn index() -> impl IntoResponse {
    Html(INDEX_HTML)
}

pub async fn health_check() -> &'static str {
    "OK"
}
