//! Page payloads served on the browser's first GET.

use crate::application::page_payload::PagePayloadProvider;

/// The default bootstrap page.
///
/// On load it POSTs `window.location.href` (fragment included) back to the
/// listener as plain text and replaces its message with the response body.
/// No third-party scripts are loaded.
#[derive(Debug, Clone, Copy, Default)]
pub struct BootstrapPage;

impl PagePayloadProvider for BootstrapPage {
    fn page(&self, port: u16) -> Vec<u8> {
        format!(
            r#"<!DOCTYPE html>
<html>
<head>
<meta charset="utf-8">
<title>Retrieving token</title>
<script>
window.addEventListener("DOMContentLoaded", function () {{
    var msg = document.getElementById("msg");
    fetch("http://localhost:{port}/", {{
        method: "POST",
        headers: {{ "Content-Type": "text/plain" }},
        body: window.location.href
    }})
        .then(function (response) {{ return response.text(); }})
        .then(function (text) {{ msg.textContent = text; }})
        .catch(function () {{ msg.textContent = "Could not reach the application. You can close this page."; }});
}});
</script>
</head>
<body>
<p id="msg">Retrieving token.</p>
</body>
</html>
"#
        )
        .into_bytes()
    }
}

/// Serves fixed bytes regardless of port.
#[derive(Debug, Clone, Default)]
pub struct StaticPage(pub Vec<u8>);

impl PagePayloadProvider for StaticPage {
    fn page(&self, _port: u16) -> Vec<u8> {
        self.0.clone()
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────
