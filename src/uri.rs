// uri.rs: turn free-form input into something a web view can navigate to

use std::path::Path;

/// Schemes passed through untouched. Matched case-insensitively.
pub const KNOWN_SCHEMES: &[&str] = &["http:", "https:", "file:", "about:"];

/// Default scheme for anything that is neither a known URI nor a local path.
pub const DEFAULT_SCHEME: &str = "http://";

/// Normalize `input` into a navigable URI.
///
/// Input already carrying one of [`KNOWN_SCHEMES`] is returned as-is (original
/// casing preserved). Input naming an existing file or directory becomes a
/// `file://` URI of its canonical absolute path. Anything else is treated as a
/// host name and gets [`DEFAULT_SCHEME`] prepended.
pub fn ensure_scheme(input: &str) -> String {
    if has_known_scheme(input) {
        return input.to_owned();
    }

    match Path::new(input).canonicalize() {
        Ok(abs) => format!("file://{}", abs.display()),
        Err(_) => format!("{DEFAULT_SCHEME}{input}"),
    }
}

fn has_known_scheme(input: &str) -> bool {
    KNOWN_SCHEMES.iter().any(|scheme| {
        input
            .get(..scheme.len())
            .is_some_and(|head| head.eq_ignore_ascii_case(scheme))
    })
}

// ── tests ─────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bare_host_gets_http() {
        assert_eq!(ensure_scheme("example.com"), "http://example.com");
    }

    #[test]
    fn scheme_match_is_case_insensitive_and_preserves_casing() {
        assert_eq!(ensure_scheme("HTTP://Example.com"), "HTTP://Example.com");
        assert_eq!(ensure_scheme("https://a.org/x"), "https://a.org/x");
    }

    #[test]
    fn about_blank_unchanged() {
        assert_eq!(ensure_scheme("about:blank"), "about:blank");
    }

    #[test]
    fn existing_path_becomes_file_uri() {
        let file = tempfile::NamedTempFile::new().unwrap();
        let canonical = file.path().canonicalize().unwrap();
        assert_eq!(
            ensure_scheme(file.path().to_str().unwrap()),
            format!("file://{}", canonical.display())
        );
    }

    #[test]
    fn dotdot_path_is_canonicalized() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::create_dir(dir.path().join("sub")).unwrap();
        let nested = dir.path().join("sub").join("..").join("page.html");
        std::fs::write(dir.path().join("page.html"), "<p>hi</p>").unwrap();
        let expected = dir.path().join("page.html").canonicalize().unwrap();
        assert_eq!(
            ensure_scheme(nested.to_str().unwrap()),
            format!("file://{}", expected.display())
        );
    }

    #[test]
    fn cwd_relative_path_is_made_absolute() {
        // Tests run from the package root.
        let expected = std::env::current_dir().unwrap().join("Cargo.toml");
        let expected = expected.canonicalize().unwrap();
        assert_eq!(
            ensure_scheme("Cargo.toml"),
            format!("file://{}", expected.display())
        );
        assert_eq!(
            ensure_scheme("./src"),
            format!("file://{}", Path::new("src").canonicalize().unwrap().display())
        );
    }

    #[test]
    fn missing_path_is_treated_as_host() {
        assert_eq!(
            ensure_scheme("/definitely/not/here.html"),
            "http:///definitely/not/here.html"
        );
    }

    #[test]
    fn short_and_multibyte_input_does_not_panic() {
        assert_eq!(ensure_scheme("ab"), "http://ab");
        assert_eq!(ensure_scheme("häuser.de"), "http://häuser.de");
    }
}
