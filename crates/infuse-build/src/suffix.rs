//! Tag suffix templates.
//!
//! A template is literal text with any number of `{idx}` placeholders, e.g.
//! the default `-injected.{idx}`. Applying it to a tag either appends it with
//! index 0 or, when the tag already ends with an instance of the template,
//! bumps that index:
//!
//! ```
//! use infuse_build::SuffixTemplate;
//!
//! let suffix: SuffixTemplate = "-injected.{idx}".parse().unwrap();
//! assert_eq!(suffix.apply("busybox:latest"), "busybox:latest-injected.0");
//! assert_eq!(suffix.apply("busybox:latest-injected.0"), "busybox:latest-injected.1");
//! ```
//!
//! Every character outside a placeholder is literal, including braces and
//! regex metacharacters. All placeholders of a template take the same index.

use std::str::FromStr;

use regex::Regex;

pub const PLACEHOLDER: &str = "{idx}";

#[derive(Debug, Clone)]
pub struct SuffixTemplate {
    template: String,
    /// Literal segments around the placeholders (`placeholders + 1` entries).
    literals: Vec<String>,
    /// Matches an instance at the end of a tag; `None` without placeholders.
    pattern: Option<Regex>,
}

impl SuffixTemplate {
    pub fn parse(template: &str) -> infuse_core::Result<Self> {
        if template.is_empty() {
            return Err(infuse_core::Error::InvalidSuffix {
                template: template.to_owned(),
                reason: "must not be empty",
            });
        }

        let literals: Vec<String> = template.split(PLACEHOLDER).map(str::to_owned).collect();
        let pattern = if literals.len() > 1 {
            let source = literals
                .iter()
                .map(|literal| regex::escape(literal))
                .collect::<Vec<_>>()
                .join(r"(\d+)");
            let regex = Regex::new(&format!("{source}$")).map_err(|_| {
                infuse_core::Error::InvalidSuffix {
                    template: template.to_owned(),
                    reason: "cannot be turned into a pattern",
                }
            })?;
            Some(regex)
        } else {
            None
        };

        Ok(Self {
            template: template.to_owned(),
            literals,
            pattern,
        })
    }

    pub fn as_str(&self) -> &str {
        &self.template
    }

    pub fn placeholders(&self) -> usize {
        self.literals.len() - 1
    }

    pub fn pattern(&self) -> Option<&Regex> {
        self.pattern.as_ref()
    }

    /// The template with every placeholder replaced by `idx`.
    pub fn render(&self, idx: u64) -> String {
        self.literals.join(&idx.to_string())
    }

    /// Derives the tag of the next injection from `tag`.
    pub fn apply(&self, tag: &str) -> String {
        let Some(pattern) = &self.pattern else {
            return format!("{tag}{}", self.template);
        };

        let bumped = pattern.captures(tag).and_then(|caps| {
            let whole = caps.get(0)?;
            let idx: u64 = caps.get(1)?.as_str().parse().ok()?;
            Some((whole.start(), idx.checked_add(1)?))
        });

        match bumped {
            Some((start, next)) => format!("{}{}", &tag[..start], self.render(next)),
            None => format!("{tag}{}", self.render(0)),
        }
    }
}

impl FromStr for SuffixTemplate {
    type Err = infuse_core::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn template(s: &str) -> SuffixTemplate {
        SuffixTemplate::parse(s).unwrap()
    }

    #[test]
    fn default_template_appends_then_increments() {
        let suffix = template("-injected.{idx}");
        let once = suffix.apply("oci.example.org/busybox:latest");
        assert_eq!(once, "oci.example.org/busybox:latest-injected.0");
        assert_eq!(
            suffix.apply(&once),
            "oci.example.org/busybox:latest-injected.1"
        );
        assert_eq!(
            suffix.apply("oci.example.org/busybox:latest-injected.41"),
            "oci.example.org/busybox:latest-injected.42"
        );
    }

    #[test]
    fn empty_template_is_rejected() {
        assert!(SuffixTemplate::parse("").is_err());
    }

    #[test]
    fn template_without_placeholder_is_appended_verbatim() {
        let suffix = template("-patched");
        assert_eq!(suffix.placeholders(), 0);
        assert!(suffix.pattern().is_none());
        assert_eq!(suffix.apply("app:1.0"), "app:1.0-patched");
        assert_eq!(suffix.apply("app:1.0-patched"), "app:1.0-patched-patched");
    }

    #[test]
    fn literal_braces_around_placeholder() {
        let suffix = template("{{idx}}");
        assert_eq!(suffix.placeholders(), 1);
        assert_eq!(suffix.render(0), "{0}");
        assert_eq!(suffix.apply("app"), "app{0}");
        assert_eq!(suffix.apply("app{0}"), "app{1}");
    }

    #[test]
    fn unbalanced_braces_stay_literal() {
        let suffix = template(".{+{{idx}");
        assert_eq!(suffix.apply("app"), "app.{+{0");
        assert_eq!(suffix.apply("app.{+{0"), "app.{+{1");
    }

    #[test]
    fn regex_metacharacters_are_literal() {
        let cases = [
            (".+.{idx}-.+*", ".+.0-.+*"),
            ("a+b*{idx}?", "a+b*0?"),
            ("!@#{idx}$%^", "!@#0$%^"),
            ("[a-z]{idx}[A-Z]", "[a-z]0[A-Z]"),
            ("({idx}) and {idx}", "(0) and 0"),
            ("{idx}\\{idx}", "0\\0"),
            ("*{idx}+{idx}?", "*0+0?"),
            ("start-{idx}-end", "start-0-end"),
        ];

        for (raw, rendered) in cases {
            let suffix = template(raw);
            assert_eq!(suffix.render(0), rendered, "render {raw}");
            let pattern = suffix.pattern().unwrap();
            assert!(pattern.is_match(rendered), "{raw} should match {rendered}");
        }

        // `.` is not a wildcard
        assert!(!template("-injected.{idx}").pattern().unwrap().is_match("-injectedX0"));
    }

    #[test]
    fn repeated_placeholders_share_the_index() {
        let suffix = template("{idx}.{idx}.{idx}");
        assert_eq!(suffix.placeholders(), 3);
        assert_eq!(suffix.apply("v"), "v0.0.0");
        assert_eq!(suffix.apply("v0.0.0"), "v1.1.1");
    }

    #[test]
    fn match_is_anchored_to_the_end_of_the_tag() {
        let suffix = template("-injected.{idx}");
        assert_eq!(
            suffix.apply("app-injected.3-custom"),
            "app-injected.3-custom-injected.0"
        );
    }

    #[test]
    fn overflowing_index_starts_a_new_suffix() {
        let suffix = template("-injected.{idx}");
        let tag = format!("app-injected.{}", u64::MAX);
        assert_eq!(suffix.apply(&tag), format!("{tag}-injected.0"));
    }

    proptest! {
        #[test]
        fn applying_n_times_yields_index_n_minus_one(
            base in "[a-z][a-z0-9]{0,10}",
            n in 1usize..20,
        ) {
            let suffix = template("-injected.{idx}");
            let mut tag = base.clone();
            for _ in 0..n {
                tag = suffix.apply(&tag);
            }
            prop_assert_eq!(tag, format!("{base}-injected.{}", n - 1));
        }

        #[test]
        fn any_literal_text_renders_and_matches(prefix in "\\PC{0,8}", postfix in "\\PC{0,8}") {
            let raw = format!("{prefix}{PLACEHOLDER}{postfix}");
            prop_assume!(raw.matches(PLACEHOLDER).count() == 1);
            let suffix = template(&raw);
            let rendered = suffix.render(7);
            prop_assert!(suffix.pattern().unwrap().is_match(&rendered));
        }
    }
}
