//! The `--format json` error shape (§7): `{ "code": ..., "message": ...,
//! "details": ... }`. `apm_core::Error` never colors or formats for a
//! terminal itself — that's this module's job.

use apm_core::Error;
use serde::Serialize;

#[derive(Serialize, Debug)]
struct ErrorDoc {
    code: &'static str,
    message: String,
    details: Option<String>,
}

/// Renders `err` as the stable `{code, message, details}` document.
#[must_use]
pub fn render_error_json(err: &Error) -> String {
    let doc = ErrorDoc {
        code: err.code(),
        message: err.to_string(),
        details: None,
    };
    apm_core::to_json_pretty(&doc)
        .unwrap_or_else(|_| format!(r#"{{"code":"{}","message":"{}"}}"#, err.code(), err))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn renders_code_and_message() {
        let err = Error::package_not_found("vim", "no provider");
        let json = render_error_json(&err);
        assert!(json.contains("E-PKG-NOTFOUND"));
        assert!(json.contains("vim"));
    }

    /// Pins the `{code, message, details}` document's field set and
    /// ordering (§7's `--format json` error shape) so adding, removing,
    /// or reordering a field in `ErrorDoc` shows up as a snapshot diff.
    #[test]
    fn error_doc_shape_is_stable_for_a_package_not_found_error() {
        let err = Error::package_not_found("vim", "no provider satisfies the requirement");
        let doc = ErrorDoc {
            code: err.code(),
            message: err.to_string(),
            details: None,
        };
        insta::assert_debug_snapshot!(doc, @r#"
        ErrorDoc {
            code: "E-PKG-NOTFOUND",
            message: "package 'vim' not found: no provider satisfies the requirement",
            details: None,
        }
        "#);
    }

    #[test]
    fn error_doc_shape_is_stable_with_details_present() {
        let doc = ErrorDoc {
            code: "E-LOCK",
            message: "held by pid 1234".to_string(),
            details: Some("retry after the holder exits".to_string()),
        };
        insta::assert_debug_snapshot!(doc, @r#"
        ErrorDoc {
            code: "E-LOCK",
            message: "held by pid 1234",
            details: Some(
                "retry after the holder exits",
            ),
        }
        "#);
    }
}
