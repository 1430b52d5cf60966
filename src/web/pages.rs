//! HTML pages rendered by the front door and the admin area

use crate::logging::LogEntry;
use crate::state::VerifiedUser;

const STYLE: &str = r#"
        * { box-sizing: border-box; }
        body {
            font-family: -apple-system, BlinkMacSystemFont, 'Segoe UI', Roboto, sans-serif;
            display: flex;
            justify-content: center;
            align-items: center;
            min-height: 100vh;
            margin: 0;
            background: linear-gradient(135deg, #667eea 0%, #764ba2 100%);
        }
        .container {
            background: white;
            padding: 40px;
            border-radius: 16px;
            box-shadow: 0 10px 40px rgba(0,0,0,0.2);
            text-align: center;
            max-width: 720px;
            width: 90%;
        }
        h1 { color: #333; margin-bottom: 10px; }
        p { color: #666; }
        .count { font-size: 48px; font-weight: 700; color: #5865F2; margin: 20px 0; }
        .discord-btn {
            display: inline-block;
            background: #5865F2;
            color: white;
            padding: 15px 30px;
            border: none;
            border-radius: 8px;
            text-decoration: none;
            font-weight: 600;
            font-size: 16px;
            cursor: pointer;
        }
        .discord-btn:hover { background: #4752C4; }
        .error { background: #fff5f5; color: #c53030; padding: 12px; border-radius: 8px; }
        table { width: 100%; border-collapse: collapse; text-align: left; margin-top: 20px; }
        th, td { padding: 8px; border-bottom: 1px solid #eee; }
        th { color: #888; font-weight: 500; }
        nav a { margin: 0 8px; color: #5865F2; text-decoration: none; }
        input { padding: 12px; border: 1px solid #ddd; border-radius: 8px; width: 100%; margin-bottom: 16px; }
        pre { text-align: left; background: #1a1a2e; color: #e0e0e0; padding: 16px; border-radius: 8px;
              font-size: 12px; overflow-x: auto; max-height: 70vh; }
"#;

fn layout(title: &str, body: &str) -> String {
    format!(
        r#"<!DOCTYPE html>
<html lang="en">
<head>
    <meta charset="UTF-8">
    <meta name="viewport" content="width=device-width, initial-scale=1.0">
    <title>{title}</title>
    <style>{style}</style>
</head>
<body>
    <div class="container">
{body}
    </div>
</body>
</html>"#,
        title = html_escape(title),
        style = STYLE,
        body = body
    )
}

/// Escape text for safe inclusion in HTML
pub fn html_escape(s: &str) -> String {
    let mut escaped = String::with_capacity(s.len());
    for c in s.chars() {
        match c {
            '&' => escaped.push_str("&amp;"),
            '<' => escaped.push_str("&lt;"),
            '>' => escaped.push_str("&gt;"),
            '"' => escaped.push_str("&quot;"),
            '\'' => escaped.push_str("&#39;"),
            c => escaped.push(c),
        }
    }
    escaped
}

pub fn home_page(count: usize) -> String {
    layout(
        "Server Verification",
        &format!(
            r#"        <h1>Verify Your Account</h1>
        <p>Log in with Discord to join the server and unlock your role.</p>
        <div class="count">{count}</div>
        <p>members verified so far</p>
        <a href="/login" class="discord-btn">Login with Discord</a>"#,
            count = count
        ),
    )
}

pub fn success_page() -> String {
    layout(
        "Verification Successful",
        r#"        <h1>Verification Successful!</h1>
        <p>You've been verified and added to the server.</p>
        <p style="color: #888; font-size: 14px;">You can now close this window and check Discord.</p>"#,
    )
}

pub fn admin_login_page(error: Option<&str>) -> String {
    let error_html = error
        .map(|e| format!(r#"<p class="error">{}</p>"#, html_escape(e)))
        .unwrap_or_default();

    layout(
        "Admin Login",
        &format!(
            r#"        <h1>Admin Panel</h1>
        {error_html}
        <form method="post" action="/admin/login">
            <input type="password" name="token" placeholder="Admin token" autofocus>
            <button type="submit" class="discord-btn">Sign in</button>
        </form>"#,
            error_html = error_html
        ),
    )
}

fn admin_nav() -> &'static str {
    r#"<nav><a href="/admin">Users</a><a href="/admin/logs">Logs</a><a href="/admin/export">Export</a><a href="/admin/logout">Logout</a></nav>"#
}

pub fn admin_users_page(users: &[VerifiedUser]) -> String {
    let rows: String = users
        .iter()
        .map(|u| {
            format!(
                "<tr><td>{}</td><td>{}</td><td>{}</td></tr>\n",
                html_escape(&u.id),
                html_escape(&u.display_name),
                u.verified_at.format("%Y-%m-%d %H:%M:%S UTC")
            )
        })
        .collect();

    layout(
        "Verified Users",
        &format!(
            r#"        {nav}
        <h1>Verified Users</h1>
        <p>{count} verified</p>
        <table>
            <thead><tr><th>Discord ID</th><th>Name</th><th>Verified at</th></tr></thead>
            <tbody>
{rows}            </tbody>
        </table>"#,
            nav = admin_nav(),
            count = users.len(),
            rows = rows
        ),
    )
}

pub fn admin_logs_page(entries: &[LogEntry]) -> String {
    let lines = entries
        .iter()
        .map(|e| html_escape(&e.format()))
        .collect::<Vec<_>>()
        .join("\n");

    layout(
        "Logs",
        &format!(
            r#"        {nav}
        <h1>Recent Logs</h1>
        <pre>{lines}</pre>"#,
            nav = admin_nav(),
            lines = lines
        ),
    )
}
