//! Error pages shipped with the crate, used when no theme provides one.

const LAYOUT: &str = r#"<!DOCTYPE html>
<html lang="en">
<head>
    <meta charset="utf-8">
    <meta name="viewport" content="width=device-width, initial-scale=1">
    <title>@title</title>
    <style>
        html, body { background-color: #fff; color: #636b6f; font-family: sans-serif; height: 100vh; margin: 0; }
        .full-height { height: 100vh; }
        .flex-center { align-items: center; display: flex; justify-content: center; }
        .code { border-right: 2px solid; font-size: 26px; padding: 0 15px; }
        .message { font-size: 18px; padding: 10px; }
    </style>
</head>
<body>
<div class="flex-center full-height">
    <div class="code">{{ status }}</div>
    <div class="message">@message</div>
</div>
</body>
</html>
"#;

/// Title and message for each built-in page. Messages may use placeholders.
const PAGES: [(&str, &str, &str); 7] = [
    ("401", "Unauthorized", "Unauthorized"),
    ("403", "Forbidden", "{{ exception.message | Forbidden }}"),
    ("404", "Not Found", "Not Found"),
    ("419", "Page Expired", "Page Expired"),
    ("429", "Too Many Requests", "Too Many Requests"),
    ("500", "Server Error", "Server Error"),
    (
        "503",
        "Service Unavailable",
        "{{ exception.message | Service Unavailable }}",
    ),
];

/// The template for a status page, if one ships with the crate.
pub fn page(name: &str) -> Option<String> {
    PAGES
        .iter()
        .find(|(code, _, _)| *code == name)
        .map(|(_, title, message)| {
            LAYOUT
                .replace("@title", title)
                .replace("@message", message)
        })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_known_pages() {
        let page = page("419").unwrap();
        assert!(page.contains("<title>Page Expired</title>"));
        assert!(page.contains("{{ status }}"));
        assert!(super::page("200").is_none());
    }
}
