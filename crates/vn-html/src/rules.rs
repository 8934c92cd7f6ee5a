//! Which attributes carry URLs, and what kind of load each one is.

use vn_url::ResourceType;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AttributeRule {
    /// A single URL loaded as the given resource type.
    Url(ResourceType),
    /// Comma-separated image candidates.
    SrcSet,
    /// Inline declarations.
    Style,
    /// `<meta http-equiv=refresh content>`.
    Refresh,
}

const PLAIN: AttributeRule = AttributeRule::Url(ResourceType::PLAIN);

const ATTRIBUTE_RULES: &[(&str, &str, AttributeRule)] = &[
    ("a", "href", PLAIN),
    ("area", "href", PLAIN),
    ("base", "href", PLAIN),
    ("link", "href", PLAIN),
    ("form", "action", AttributeRule::Url(ResourceType::form())),
    ("button", "formaction", AttributeRule::Url(ResourceType::form())),
    ("input", "formaction", AttributeRule::Url(ResourceType::form())),
    ("iframe", "src", AttributeRule::Url(ResourceType::iframe())),
    ("frame", "src", AttributeRule::Url(ResourceType::iframe())),
    ("script", "src", AttributeRule::Url(ResourceType::script())),
    ("img", "src", PLAIN),
    ("img", "srcset", AttributeRule::SrcSet),
    ("source", "src", PLAIN),
    ("source", "srcset", AttributeRule::SrcSet),
    ("input", "src", PLAIN),
    ("video", "src", PLAIN),
    ("video", "poster", PLAIN),
    ("audio", "src", PLAIN),
    ("track", "src", PLAIN),
    ("embed", "src", PLAIN),
    ("object", "data", PLAIN),
    ("html", "manifest", PLAIN),
    ("meta", "content", AttributeRule::Refresh),
];

/// Rule for `attr` on `tag`; both are matched case-insensitively.
pub fn rule_for(tag: &str, attr: &str) -> Option<AttributeRule> {
    if attr.eq_ignore_ascii_case("style") {
        return Some(AttributeRule::Style);
    }

    ATTRIBUTE_RULES
        .iter()
        .find(|(rule_tag, rule_attr, _)| {
            rule_tag.eq_ignore_ascii_case(tag) && rule_attr.eq_ignore_ascii_case(attr)
        })
        .map(|(_, _, rule)| *rule)
}

#[cfg(test)]
mod tests {
    use super::AttributeRule;
    use super::rule_for;
    use vn_url::ResourceType;

    #[test]
    fn maps_tag_attribute_pairs() {
        assert_eq!(rule_for("IFRAME", "src"), Some(AttributeRule::Url(ResourceType::iframe())));
        assert_eq!(rule_for("script", "SRC"), Some(AttributeRule::Url(ResourceType::script())));
        assert_eq!(rule_for("link", "href"), Some(AttributeRule::Url(ResourceType::PLAIN)));
        assert_eq!(rule_for("form", "action"), Some(AttributeRule::Url(ResourceType::form())));
        assert_eq!(rule_for("img", "srcset"), Some(AttributeRule::SrcSet));
        assert_eq!(rule_for("span", "style"), Some(AttributeRule::Style));
    }

    #[test]
    fn ignores_non_url_attributes() {
        assert_eq!(rule_for("a", "title"), None);
        assert_eq!(rule_for("div", "src"), None);
        assert_eq!(rule_for("script", "href"), None);
    }
}
