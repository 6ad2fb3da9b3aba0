//! Interrupt-rule evaluation, kept free of I/O.
//!
//! The session loop feeds the buffer through [`evaluate`] after every chunk,
//! writes the returned sends to the stream and swaps in the rewritten text.

use super::patterns::InterruptRule;

/// What a pass over the interrupt rules asks the session to do.
#[derive(Debug, Default, PartialEq, Eq)]
pub struct InterruptPass<'r> {
    /// Texts to write to the stream, in order. One entry per match.
    pub sends: Vec<&'r str>,

    /// New buffer contents, if any rule rewrote it.
    pub rewritten: Option<String>,
}

impl InterruptPass<'_> {
    /// Whether any rule fired.
    pub fn is_empty(&self) -> bool {
        self.sends.is_empty() && self.rewritten.is_none()
    }
}

/// Evaluate `rules` in declared order against `buffer`.
///
/// Each rule sees the output of the rules before it. A matching rule with a
/// send action contributes its send text once per match occurrence; a rule
/// with a replacement or a send action then substitutes all of its matches.
pub fn evaluate<'r>(buffer: &str, rules: &'r [InterruptRule]) -> InterruptPass<'r> {
    let mut pass = InterruptPass::default();
    let mut current: Option<String> = None;

    for rule in rules {
        let text = current.as_deref().unwrap_or(buffer);
        let hits = rule.count_matches(text);
        if hits == 0 {
            continue;
        }

        if let Some(send) = rule.send() {
            pass.sends.extend(std::iter::repeat_n(send, hits));
        }

        if rule.rewrites() {
            let rewritten = rule.replace_all(text).into_owned();
            current = Some(rewritten);
        }
    }

    pass.rewritten = current;
    pass
}

#[cfg(test)]
mod tests {
    use super::*;

    fn pager() -> InterruptRule {
        InterruptRule::new(r" --More-- ").unwrap().with_send(" ")
    }

    #[test]
    fn test_no_rules_no_action() {
        let pass = evaluate("router#", &[]);
        assert!(pass.is_empty());
    }

    #[test]
    fn test_send_only_strips_match() {
        let rules = [pager()];
        let pass = evaluate("line1\n --More-- ", &rules);
        assert_eq!(pass.sends, vec![" "]);
        assert_eq!(pass.rewritten.as_deref(), Some("line1\n"));
    }

    #[test]
    fn test_send_once_per_occurrence() {
        let rules = [pager()];
        let pass = evaluate("a --More-- b --More-- c", &rules);
        assert_eq!(pass.sends, vec![" ", " "]);
        assert_eq!(pass.rewritten.as_deref(), Some("abc"));
    }

    #[test]
    fn test_replace_without_send() {
        let rules = [InterruptRule::new(r"\r\n").unwrap().with_replace("\n")];
        let pass = evaluate("a\r\nb\r\n", &rules);
        assert!(pass.sends.is_empty());
        assert_eq!(pass.rewritten.as_deref(), Some("a\nb\n"));
    }

    #[test]
    fn test_rule_without_action_is_ignored() {
        let rules = [InterruptRule::new("router").unwrap()];
        let pass = evaluate("router#", &rules);
        assert!(pass.is_empty());
    }

    #[test]
    fn test_rules_see_earlier_rewrites() {
        let rules = [
            InterruptRule::new("AAA").unwrap().with_replace("BBB"),
            InterruptRule::new("BBB").unwrap().with_replace("CCC"),
        ];
        let pass = evaluate("xAAAx", &rules);
        assert_eq!(pass.rewritten.as_deref(), Some("xCCCx"));
    }

    #[test]
    fn test_send_and_replace() {
        let rules = [InterruptRule::new(r"\[confirm\]")
            .unwrap()
            .with_send("y")
            .with_replace("[confirmed]")];
        let pass = evaluate("Proceed? [confirm]", &rules);
        assert_eq!(pass.sends, vec!["y"]);
        assert_eq!(pass.rewritten.as_deref(), Some("Proceed? [confirmed]"));
    }

    #[test]
    fn test_unmatched_rule_leaves_buffer() {
        let rules = [pager()];
        let pass = evaluate("no pager here\nrouter#", &rules);
        assert!(pass.is_empty());
    }
}
