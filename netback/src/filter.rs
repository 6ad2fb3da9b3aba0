//! Output filtering: redaction and line commenting.
//!
//! Pure text transformations applied to raw captures before they are
//! written out. Nothing here touches a device.

use std::borrow::Cow;

use crate::channel::{InterruptRule, SecretRule};
use crate::config::Model;

/// Raw per-command captures from one device, in execution order.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct Capture {
    /// Outputs of the annotation commands.
    pub annotations: Vec<String>,

    /// Outputs of the capture commands.
    pub captures: Vec<String>,
}

/// Apply each secret rule in order; later rules see earlier rewrites.
pub fn redact<'t>(text: &'t str, secrets: &[SecretRule]) -> Cow<'t, str> {
    let mut text = Cow::Borrowed(text);
    for secret in secrets {
        if let Cow::Owned(rewritten) = secret.apply(&text) {
            text = Cow::Owned(rewritten);
        }
    }
    text
}

/// Re-apply the substitutions of interrupt rules that carry a replacement.
///
/// Catches matches that only became visible once the full capture was
/// assembled. Rules without a replacement are skipped.
pub fn apply_residual_replacements<'t>(text: &'t str, rules: &[InterruptRule]) -> Cow<'t, str> {
    let mut text = Cow::Borrowed(text);
    for rule in rules.iter().filter(|r| r.replace().is_some()) {
        if let Cow::Owned(rewritten) = rule.replace_all(&text) {
            text = Cow::Owned(rewritten);
        }
    }
    text
}

/// A line holding nothing but an optional carriage return.
fn is_blank(line: &str) -> bool {
    line.is_empty() || line == "\r"
}

/// Prefix every non-blank line with `prefix`.
pub fn annotate_all_lines(text: &str, prefix: &str) -> String {
    if text.is_empty() || prefix.is_empty() {
        return text.to_string();
    }
    text.split('\n')
        .map(|line| {
            if is_blank(line) {
                Cow::Borrowed(line)
            } else {
                Cow::Owned(format!("{prefix}{line}"))
            }
        })
        .collect::<Vec<_>>()
        .join("\n")
}

/// Prefix only the first and last non-blank lines with `prefix`.
///
/// A single non-blank line is prefixed once.
pub fn annotate_boundary_lines(text: &str, prefix: &str) -> String {
    if text.is_empty() || prefix.is_empty() {
        return text.to_string();
    }

    let mut lines: Vec<Cow<'_, str>> = text.split('\n').map(Cow::Borrowed).collect();
    let Some(first) = lines.iter().position(|l| !is_blank(l)) else {
        return text.to_string();
    };
    let last = lines.iter().rposition(|l| !is_blank(l)).unwrap_or(first);

    lines[first] = Cow::Owned(format!("{prefix}{}", lines[first]));
    if last != first {
        lines[last] = Cow::Owned(format!("{prefix}{}", lines[last]));
    }
    lines.join("\n")
}

/// Redaction followed by the residual interrupt substitutions.
pub fn clean(text: &str, model: &Model) -> String {
    let redacted = redact(text, &model.secrets);
    apply_residual_replacements(&redacted, &model.expect).into_owned()
}

/// Turn a device's captures into the artifact text.
///
/// Annotation outputs come first and are commented in full; capture outputs
/// follow with only their boundary lines commented. Empty parts are
/// dropped and the rest joined with a single newline.
pub fn render(capture: &Capture, model: &Model) -> String {
    let annotations = capture
        .annotations
        .iter()
        .map(|raw| annotate_all_lines(&clean(raw, model), &model.comment));
    let captures = capture
        .captures
        .iter()
        .map(|raw| annotate_boundary_lines(&clean(raw, model), &model.comment));

    annotations
        .chain(captures)
        .filter(|part| !part.is_empty())
        .collect::<Vec<_>>()
        .join("\n")
}

#[cfg(test)]
mod tests {
    use super::*;

    fn count_prefixed(text: &str, prefix: &str) -> usize {
        text.split('\n').filter(|l| l.starts_with(prefix)).count()
    }

    #[test]
    fn test_redact_in_order() {
        let secrets = [
            SecretRule::new(r"password \S+", "password <removed>").unwrap(),
            SecretRule::new(r"<removed>", "<hidden>").unwrap(),
        ];
        assert_eq!(
            redact("user admin password hunter2", &secrets),
            "user admin password <hidden>"
        );
    }

    #[test]
    fn test_redact_without_rules_borrows() {
        assert!(matches!(redact("text", &[]), Cow::Borrowed("text")));
    }

    #[test]
    fn test_redact_is_idempotent_for_disjoint_rules() {
        let secrets = [
            SecretRule::new(r"(enable secret \d) \S+", "$1 <secret>").unwrap(),
            SecretRule::new(r"(snmp-server community) \S+", "$1 <community>").unwrap(),
        ];
        let raw = "enable secret 5 $1$xyz\nsnmp-server community public RO\n";
        let once = redact(raw, &secrets).into_owned();
        let twice = redact(&once, &secrets).into_owned();
        assert_eq!(once, "enable secret 5 <secret>\nsnmp-server community <community> RO\n");
        assert_eq!(once, twice);
    }

    #[test]
    fn test_residual_skips_send_only_rules() {
        let rules = [
            InterruptRule::new("--More--").unwrap().with_send(" "),
            InterruptRule::new(r"\x08+").unwrap().with_replace(""),
        ];
        assert_eq!(
            apply_residual_replacements("a--More--b\x08\x08c", &rules),
            "a--More--bc"
        );
    }

    #[test]
    fn test_annotate_all_lines() {
        let text = "line 1\n\nline 3\n";
        let out = annotate_all_lines(text, "! ");
        assert_eq!(out, "! line 1\n\n! line 3\n");
        assert_eq!(out.split('\n').count(), text.split('\n').count());
    }

    #[test]
    fn test_annotate_all_lines_noop() {
        assert_eq!(annotate_all_lines("", "! "), "");
        assert_eq!(annotate_all_lines("abc\ndef", ""), "abc\ndef");
    }

    #[test]
    fn test_annotate_all_lines_keeps_crlf_blank() {
        assert_eq!(annotate_all_lines("a\r\n\r\nb", "# "), "# a\r\n\r\n# b");
    }

    #[test]
    fn test_annotate_all_lines_properties() {
        let samples = ["", "\n", "one", "a\nb\nc", "\n\nx\n\ny\n\n", "trailing\n"];
        for text in samples {
            let out = annotate_all_lines(text, "! ");
            assert_eq!(out.split('\n').count(), text.split('\n').count());
            for (before, after) in text.split('\n').zip(out.split('\n')) {
                if before.is_empty() {
                    assert_eq!(after, "");
                } else {
                    assert_eq!(after, format!("! {before}"));
                }
            }
        }
    }

    #[test]
    fn test_annotate_boundary_lines() {
        let text = "show run\nhostname r1\ninterface Gi0/1\nrouter#";
        assert_eq!(
            annotate_boundary_lines(text, "! "),
            "! show run\nhostname r1\ninterface Gi0/1\n! router#"
        );
    }

    #[test]
    fn test_annotate_boundary_skips_blank_edges() {
        let text = "\n\nshow run\nbody\nrouter#\n\n";
        assert_eq!(
            annotate_boundary_lines(text, "! "),
            "\n\n! show run\nbody\n! router#\n\n"
        );
    }

    #[test]
    fn test_annotate_boundary_counts() {
        let cases = [
            ("", 0),
            ("\n\n", 0),
            ("only", 1),
            ("\nonly\n", 1),
            ("first\nlast", 2),
            ("first\nmiddle\nlast", 2),
        ];
        for (text, expected) in cases {
            let out = annotate_boundary_lines(text, "! ");
            assert_eq!(count_prefixed(&out, "! "), expected, "text: {text:?}");
        }
    }

    #[test]
    fn test_annotate_boundary_single_line_once() {
        assert_eq!(annotate_boundary_lines("router#", "! "), "! router#");
    }

    #[test]
    fn test_render_orders_and_joins() {
        let model = Model::new("ios", r"^\S+#$")
            .unwrap()
            .with_comment("! ")
            .with_secret(SecretRule::new(r"secret \S+", "secret <removed>").unwrap());
        let capture = Capture {
            annotations: vec!["show version\nIOS 15.2\nr1#".into()],
            captures: vec![
                "show run\nenable secret abc\nr1#".into(),
                String::new(),
            ],
        };
        assert_eq!(
            render(&capture, &model),
            "! show version\n! IOS 15.2\n! r1#\n! show run\nenable secret <removed>\n! r1#"
        );
    }

    #[test]
    fn test_render_without_comment_prefix() {
        let model = Model::new("linux", r"\$ $").unwrap();
        let capture = Capture {
            annotations: vec!["uname\nLinux\n$ ".into()],
            captures: vec!["cat cfg\nx=1\n$ ".into()],
        };
        assert_eq!(
            render(&capture, &model),
            "uname\nLinux\n$ \ncat cfg\nx=1\n$ "
        );
    }
}
