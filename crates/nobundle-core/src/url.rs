//! Request URL and path classification.
//!
//! Shared by the request pipeline, the import rewriter and the built-in
//! plugins so they all agree on what a "script", "stylesheet" or "asset
//! import" request is.

use regex_lite::Regex;
use std::path::Path;
use std::sync::OnceLock;

/// Query marker appended to asset imports so the server answers with a module.
pub const IMPORT_QUERY: &str = "import";

/// Known asset file extensions that are served as `export default url` when imported.
pub const ASSET_EXTENSIONS: &[&str] = &[
    ".png", ".jpg", ".jpeg", ".gif", ".svg", ".ico", ".webp", ".avif", ".mp4", ".webm", ".ogg",
    ".mp3", ".wav", ".flac", ".aac", ".woff", ".woff2", ".eot", ".ttf", ".otf", ".wasm", ".pdf",
];

const JS_EXTENSIONS: &[&str] = &[".js", ".jsx", ".ts", ".tsx", ".mjs"];

/// Prefixes reserved for runtime-internal modules besides the client path.
const INTERNAL_PREFIXES: &[&str] = &["/@react-refresh", "\0"];

/// Strip `?query` and `#hash` decoration from a URL or id.
#[must_use]
pub fn clean_url(url: &str) -> &str {
    let end = url.find(['?', '#']).unwrap_or(url.len());
    &url[..end]
}

/// Whether the URL names a script module.
///
/// Extension-less paths that do not end in `/` count as scripts since the
/// resolver tries extensions for them.
#[must_use]
pub fn is_js_request(url: &str) -> bool {
    let url = clean_url(url);
    let lower = url.to_lowercase();
    if JS_EXTENSIONS.iter().any(|ext| lower.ends_with(ext)) {
        return true;
    }
    let file_name = url.rsplit('/').next().unwrap_or(url);
    !file_name.is_empty() && !file_name.contains('.') && !url.ends_with('/')
}

/// Whether the URL names a stylesheet.
#[must_use]
pub fn is_css_request(url: &str) -> bool {
    clean_url(url).to_lowercase().ends_with(".css")
}

/// Whether the URL carries the `?import` asset marker.
#[must_use]
pub fn is_import_request(url: &str) -> bool {
    url.split_once('?').is_some_and(|(_, query)| {
        query
            .split(['&', '#'])
            .any(|param| param == IMPORT_QUERY || param.starts_with("import="))
    })
}

/// Whether the specifier belongs to the runtime client and must not be touched.
#[must_use]
pub fn is_internal_request(url: &str, client_public_path: &str) -> bool {
    url.starts_with(client_public_path) || INTERNAL_PREFIXES.iter().any(|p| url.starts_with(p))
}

/// Whether the specifier is a bare package import (`react`, `@scope/pkg/sub`).
#[must_use]
pub fn is_bare_import(specifier: &str) -> bool {
    static BARE_IMPORT_RE: OnceLock<Regex> = OnceLock::new();
    BARE_IMPORT_RE
        .get_or_init(|| Regex::new(r"^[\w@][^:]").expect("valid bare import regex"))
        .is_match(specifier)
}

/// Whether the path ends with a known asset extension (case-insensitive).
#[must_use]
pub fn is_asset_path(path: &str) -> bool {
    let lower = clean_url(path).to_lowercase();
    ASSET_EXTENSIONS.iter().any(|ext| lower.ends_with(ext))
}

/// Convert platform separators to forward slashes.
#[must_use]
pub fn normalize_path(path: &str) -> String {
    path.replace('\\', "/")
}

/// Public, root-relative form of a file id: `/src/App.tsx`.
///
/// Ids outside the root and virtual ids are returned unchanged (with a
/// leading `/` added to relative ones).
#[must_use]
pub fn short_name(id: &str, root: &Path) -> String {
    let id = normalize_path(id);
    let root = normalize_path(&root.display().to_string());
    let root = root.trim_end_matches('/');
    if let Some(rest) = id.strip_prefix(root) {
        if rest.starts_with('/') {
            return rest.to_string();
        }
    }
    if id.starts_with('/') || id.starts_with('\0') {
        id
    } else {
        format!("/{id}")
    }
}

/// Append a query parameter, respecting an existing query string.
#[must_use]
pub fn inject_query(url: &str, param: &str) -> String {
    let (path, hash) = match url.find('#') {
        Some(idx) => (&url[..idx], &url[idx..]),
        None => (url, ""),
    };
    let sep = if path.contains('?') { '&' } else { '?' };
    format!("{path}{sep}{param}{hash}")
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    #[test]
    fn test_clean_url() {
        assert_eq!(clean_url("/src/App.tsx?t=12"), "/src/App.tsx");
        assert_eq!(clean_url("/src/App.tsx#top"), "/src/App.tsx");
        assert_eq!(clean_url("/logo.svg?import"), "/logo.svg");
        assert_eq!(clean_url("/plain.js"), "/plain.js");
    }

    #[test]
    fn test_is_js_request() {
        assert!(is_js_request("/src/main.tsx"));
        assert!(is_js_request("/src/util.mjs?t=3"));
        assert!(is_js_request("/src/App"));
        assert!(!is_js_request("/src/"));
        assert!(!is_js_request("/index.css"));
        assert!(!is_js_request("/logo.svg"));
    }

    #[test]
    fn test_css_and_import_requests() {
        assert!(is_css_request("/index.css?t=1"));
        assert!(!is_css_request("/index.js"));
        assert!(is_import_request("/logo.svg?import"));
        assert!(is_import_request("/logo.svg?t=4&import"));
        assert!(!is_import_request("/logo.svg?important"));
        assert!(!is_import_request("/logo.svg"));
    }

    #[test]
    fn test_is_internal_request() {
        assert!(is_internal_request("/@nobundle/client", "/@nobundle/client"));
        assert!(is_internal_request("/@react-refresh", "/@nobundle/client"));
        assert!(!is_internal_request("/src/App.tsx", "/@nobundle/client"));
    }

    #[test]
    fn test_is_bare_import() {
        assert!(is_bare_import("react"));
        assert!(is_bare_import("@scope/pkg"));
        assert!(is_bare_import("react-dom/client"));
        assert!(!is_bare_import("./App"));
        assert!(!is_bare_import("/src/App"));
        assert!(!is_bare_import("https://cdn.example.com/x.js"));
    }

    #[test]
    fn test_asset_paths_case_insensitive() {
        assert!(is_asset_path("./logo.SVG"));
        assert!(is_asset_path("/font.woff2?import"));
        assert!(!is_asset_path("./App.tsx"));
        assert!(!is_asset_path("./index.css"));
    }

    #[test]
    fn test_short_name() {
        let root = PathBuf::from("/project");
        assert_eq!(short_name("/project/src/App.tsx", &root), "/src/App.tsx");
        assert_eq!(short_name("/projects/other.ts", &root), "/projects/other.ts");
        assert_eq!(short_name("\0virtual:x", &root), "\0virtual:x");
        assert_eq!(short_name("C:\\project\\a.ts", &PathBuf::from("C:\\project")), "/a.ts");
    }

    #[test]
    fn test_inject_query() {
        assert_eq!(inject_query("/src/a.ts", "t=5"), "/src/a.ts?t=5");
        assert_eq!(inject_query("/src/a.ts?x", "t=5"), "/src/a.ts?x&t=5");
        assert_eq!(inject_query("/src/a.ts#h", "t=5"), "/src/a.ts?t=5#h");
    }
}
