//! Structural selectors for the host page.
//!
//! Selectors are kept as data so the browser binding can render them to
//! CSS while [`MemoryDocument`](crate::MemoryDocument) evaluates them
//! directly against its element tree.

use std::fmt;

/// A single compound selector.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Selector {
    /// `tag`
    Tag(&'static str),
    /// `#id`
    Id(&'static str),
    /// `[name]`
    Attr(&'static str),
    /// `[name="value"]`
    AttrEq(&'static str, &'static str),
    /// `[name*="needle"]`, optionally case-insensitive.
    AttrContains {
        name: &'static str,
        needle: &'static str,
        ignore_case: bool,
    },
    /// `tag.class1.class2`
    TagClasses(&'static str, &'static [&'static str]),
}

impl Selector {
    /// Render as a CSS selector string.
    pub fn to_css(&self) -> String {
        self.to_string()
    }

    /// Evaluate against an element given its tag and an attribute lookup.
    pub fn matches<'a, F>(&self, tag: &str, attr: F) -> bool
    where
        F: Fn(&str) -> Option<&'a str>,
    {
        match *self {
            Selector::Tag(t) => tag.eq_ignore_ascii_case(t),
            Selector::Id(id) => attr("id") == Some(id),
            Selector::Attr(name) => attr(name).is_some(),
            Selector::AttrEq(name, value) => attr(name) == Some(value),
            Selector::AttrContains {
                name,
                needle,
                ignore_case,
            } => match attr(name) {
                Some(v) if ignore_case => v.to_lowercase().contains(&needle.to_lowercase()),
                Some(v) => v.contains(needle),
                None => false,
            },
            Selector::TagClasses(t, classes) => {
                if !tag.eq_ignore_ascii_case(t) {
                    return false;
                }
                let present = attr("class").unwrap_or("");
                classes
                    .iter()
                    .all(|c| present.split_ascii_whitespace().any(|p| p == *c))
            }
        }
    }
}

impl fmt::Display for Selector {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Selector::Tag(t) => write!(f, "{}", t),
            Selector::Id(id) => write!(f, "#{}", id),
            Selector::Attr(name) => write!(f, "[{}]", name),
            Selector::AttrEq(name, value) => write!(f, "[{}=\"{}\"]", name, value),
            Selector::AttrContains {
                name,
                needle,
                ignore_case,
            } => {
                if *ignore_case {
                    write!(f, "[{}*=\"{}\" i]", name, needle)
                } else {
                    write!(f, "[{}*=\"{}\"]", name, needle)
                }
            }
            Selector::TagClasses(t, classes) => {
                write!(f, "{}", t)?;
                for class in classes.iter() {
                    write!(f, ".{}", class)?;
                }
                Ok(())
            }
        }
    }
}

/// One strategy for locating message blocks.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum BlockMatcher {
    /// Every element matching the selector is a block.
    Direct(Selector),
    /// Find bodies, then climb to the nearest ancestor (or self) matching
    /// any of `ancestors`, tried in order.
    Climb {
        body: Selector,
        ancestors: &'static [Selector],
    },
}

/// Containers searched for the transcript, in order; the body is the fallback.
pub const MAIN_REGION: &[Selector] = &[Selector::Tag("main"), Selector::AttrEq("role", "main")];

/// Any match means a side canvas is open.
pub const CANVAS_MARKERS: &[Selector] = &[
    Selector::Tag("aside"),
    Selector::AttrContains {
        name: "aria-label",
        needle: "Canvas",
        ignore_case: false,
    },
    Selector::AttrContains {
        name: "data-testid",
        needle: "canvas",
        ignore_case: true,
    },
];

/// Block matchers, most stable first. The first one that yields any real
/// block wins.
pub const BLOCK_MATCHERS: &[BlockMatcher] = &[
    BlockMatcher::Direct(Selector::AttrEq("data-testid", "conversation-turn")),
    BlockMatcher::Direct(Selector::Attr("data-message-author-role")),
    BlockMatcher::Climb {
        body: Selector::TagClasses("div", &["markdown", "prose", "markdown-new-styling"]),
        ancestors: &[
            Selector::Attr("data-message-id"),
            Selector::Tag("article"),
            Selector::Tag("div"),
        ],
    },
];

#[cfg(test)]
mod tests {
    use super::*;

    fn lookup<'a>(attrs: &'a [(&'a str, &'a str)]) -> impl Fn(&str) -> Option<&'a str> {
        move |name| attrs.iter().find(|(k, _)| *k == name).map(|(_, v)| *v)
    }

    #[test]
    fn test_css_rendering() {
        assert_eq!(Selector::Tag("main").to_css(), "main");
        assert_eq!(Selector::Id("x").to_css(), "#x");
        assert_eq!(
            Selector::AttrEq("data-testid", "conversation-turn").to_css(),
            "[data-testid=\"conversation-turn\"]"
        );
        assert_eq!(CANVAS_MARKERS[2].to_css(), "[data-testid*=\"canvas\" i]");
        assert_eq!(
            Selector::TagClasses("div", &["markdown", "prose"]).to_css(),
            "div.markdown.prose"
        );
    }

    #[test]
    fn test_attr_contains_case() {
        let attrs = [("data-testid", "Canvas-Panel")];
        assert!(CANVAS_MARKERS[2].matches("div", lookup(&attrs)));

        let attrs = [("aria-label", "open canvas")];
        assert!(!CANVAS_MARKERS[1].matches("div", lookup(&attrs)));
    }

    #[test]
    fn test_tag_classes_requires_all() {
        let sel = Selector::TagClasses("div", &["markdown", "prose"]);
        assert!(sel.matches("div", lookup(&[("class", "prose x markdown")])));
        assert!(!sel.matches("div", lookup(&[("class", "markdown")])));
        assert!(!sel.matches("span", lookup(&[("class", "markdown prose")])));
    }
}
