use crate::middleware::ClientId;
use crate::state::ServerState;
use axum::extract::State;
use axum::response::Html;
use axum::Extension;
use std::fmt::Write;
use std::sync::Arc;

/// Visit counter page: counts this visit, then lists every client seen.
pub async fn status_page(
    State(state): State<Arc<ServerState>>,
    Extension(ClientId(client)): Extension<ClientId>,
) -> Html<String> {
    state.visits.record(&client);
    Html(render(&state.visits.snapshot()))
}

fn render(rows: &[(String, u64)]) -> String {
    let mut html = String::from(concat!(
        "<!DOCTYPE html>\n<html>\n<head>\n",
        "<title>Visitor statistics</title>\n<meta charset=\"utf-8\">\n",
        "<style>\n",
        "body { font-family: Arial, sans-serif; padding: 20px; }\n",
        "table { border-collapse: collapse; width: 50%; }\n",
        "th, td { border: 1px solid #ccc; padding: 8px; text-align: left; }\n",
        "</style>\n</head>\n<body>\n<h2>Visitors by IP</h2>\n<table>\n",
        "<tr><th>IP address</th><th>Visits</th></tr>\n",
    ));
    for (ip, count) in rows {
        let _ = writeln!(html, "<tr><td>{}</td><td>{count}</td></tr>", escape(ip));
    }
    html.push_str("</table>\n</body>\n</html>\n");
    html
}

fn escape(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#39;"),
            c => out.push(c),
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rows_are_escaped() {
        let html = render(&[("<script>".to_string(), 2), ("10.0.0.1".to_string(), 1)]);
        assert!(html.contains("<tr><td>&lt;script&gt;</td><td>2</td></tr>"));
        assert!(html.contains("<tr><td>10.0.0.1</td><td>1</td></tr>"));
        assert!(!html.contains("<script>"));
    }
}
