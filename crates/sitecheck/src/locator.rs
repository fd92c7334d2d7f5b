//! Locators: how a step names the element it acts on.
//!
//! Locators are plain data so scenarios can be written in YAML. The browser
//! backend resolves them in the page with a single script
//! ([`Locator::script`]) that approximates accessible role and name the way
//! a screen reader would see them. Locators are strict: when more than one
//! element matches and no [`Pick`] is given, acting on the locator fails.

use serde::{Deserialize, Serialize};

/// Default timeout for locator waits (15 seconds)
pub const DEFAULT_TIMEOUT_MS: u64 = 15_000;

/// Attribute used to hand a resolved element over to native input events
pub const TARGET_MARKER: &str = "data-sitecheck-target";

/// ARIA roles the resolver understands, explicit or implicit
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    /// `<button>`, `<input type=submit|button|reset>`, `role=button`
    Button,
    /// `<a href>`, `role=link`
    Link,
    /// `<h1>`..`<h6>`, `role=heading`
    Heading,
    /// `<dialog>`, `role=dialog`, `role=alertdialog`
    Dialog,
    /// text inputs and `<textarea>`, `role=textbox`
    Textbox,
    /// `<footer>` outside sectioning content, `role=contentinfo`
    Contentinfo,
}

impl Role {
    /// Role name as used in ARIA
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Button => "button",
            Self::Link => "link",
            Self::Heading => "heading",
            Self::Dialog => "dialog",
            Self::Textbox => "textbox",
            Self::Contentinfo => "contentinfo",
        }
    }
}

/// Selector type for locating elements
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "by", rename_all = "snake_case")]
pub enum Selector {
    /// Accessible role, optionally filtered by accessible name
    Role {
        /// Role to match
        role: Role,
        /// Accessible name
        #[serde(default, skip_serializing_if = "Option::is_none")]
        name: Option<String>,
        /// Whole-string, case-sensitive name match
        #[serde(default)]
        exact: bool,
    },
    /// `placeholder` attribute of inputs and textareas
    Placeholder {
        /// Placeholder text
        text: String,
        /// Whole-string match
        #[serde(default)]
        exact: bool,
    },
    /// Innermost elements whose text matches
    Text {
        /// Text content
        text: String,
        /// Whole-string match
        #[serde(default)]
        exact: bool,
    },
    /// Innermost elements whose text matches a case-insensitive JS regex
    TextPattern {
        /// Regular expression source
        pattern: String,
    },
    /// CSS selector
    Css {
        /// Selector string
        css: String,
    },
    /// CSS selector filtered by text content
    CssWithText {
        /// Selector string
        css: String,
        /// Text to match
        text: String,
        /// Whole-string match
        #[serde(default)]
        exact: bool,
    },
}

impl Selector {
    /// Playwright-style description, also used as the lookup key by the mock driver
    #[must_use]
    pub fn describe(&self) -> String {
        let op = |exact: bool| if exact { "=" } else { "~" };
        match self {
            Self::Role { role, name, exact } => match name {
                Some(name) => format!("role={}[name{}{name:?}]", role.as_str(), op(*exact)),
                None => format!("role={}", role.as_str()),
            },
            Self::Placeholder { text, exact } => format!("placeholder{}{text:?}", op(*exact)),
            Self::Text { text, exact } => format!("text{}{text:?}", op(*exact)),
            Self::TextPattern { pattern } => format!("text=/{pattern}/i"),
            Self::Css { css } => format!("css={css}"),
            Self::CssWithText { css, text, exact } => {
                format!("css={css}:has-text{}{text:?}", op(*exact))
            }
        }
    }
}

/// Which element to act on when several match
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Pick {
    /// Exactly one match is required
    #[default]
    Strict,
    /// First match in document order
    First,
    /// Last match in document order
    Last,
    /// First visible match, else the first match
    FirstVisible,
    /// Zero-based index
    Nth(usize),
}

impl Pick {
    const fn is_default(&self) -> bool {
        matches!(self, Self::Strict)
    }
}

/// A locator for finding elements on the page
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Locator {
    /// What to match
    #[serde(flatten)]
    selector: Selector,
    /// Restrict matching to descendants of this locator's element
    #[serde(default, skip_serializing_if = "Option::is_none")]
    within: Option<Box<Locator>>,
    /// Disambiguation
    #[serde(default, skip_serializing_if = "Pick::is_default")]
    pick: Pick,
    /// Ignore invisible matches entirely
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    visible_only: bool,
}

impl Locator {
    /// Create a locator from a selector
    #[must_use]
    pub fn from_selector(selector: Selector) -> Self {
        Self {
            selector,
            within: None,
            pick: Pick::Strict,
            visible_only: false,
        }
    }

    /// Match by role and accessible name (substring, case-insensitive)
    #[must_use]
    pub fn role(role: Role, name: impl Into<String>) -> Self {
        Self::from_selector(Selector::Role {
            role,
            name: Some(name.into()),
            exact: false,
        })
    }

    /// Match every element with the role
    #[must_use]
    pub fn any_role(role: Role) -> Self {
        Self::from_selector(Selector::Role {
            role,
            name: None,
            exact: false,
        })
    }

    /// Match by placeholder (substring)
    #[must_use]
    pub fn placeholder(text: impl Into<String>) -> Self {
        Self::from_selector(Selector::Placeholder {
            text: text.into(),
            exact: false,
        })
    }

    /// Match by text (substring)
    #[must_use]
    pub fn text(text: impl Into<String>) -> Self {
        Self::from_selector(Selector::Text {
            text: text.into(),
            exact: false,
        })
    }

    /// Match by text regex
    #[must_use]
    pub fn text_pattern(pattern: impl Into<String>) -> Self {
        Self::from_selector(Selector::TextPattern {
            pattern: pattern.into(),
        })
    }

    /// Match by CSS selector
    #[must_use]
    pub fn css(css: impl Into<String>) -> Self {
        Self::from_selector(Selector::Css { css: css.into() })
    }

    /// Match by CSS selector and text (substring)
    #[must_use]
    pub fn css_with_text(css: impl Into<String>, text: impl Into<String>) -> Self {
        Self::from_selector(Selector::CssWithText {
            css: css.into(),
            text: text.into(),
            exact: false,
        })
    }

    /// Require whole-string matching of name, placeholder or text
    #[must_use]
    pub fn exact(mut self) -> Self {
        match &mut self.selector {
            Selector::Role { exact, .. }
            | Selector::Placeholder { exact, .. }
            | Selector::Text { exact, .. }
            | Selector::CssWithText { exact, .. } => *exact = true,
            Selector::TextPattern { .. } | Selector::Css { .. } => {}
        }
        self
    }

    /// Search only inside `scope`
    #[must_use]
    pub fn within(mut self, scope: Locator) -> Self {
        self.within = Some(Box::new(scope));
        self
    }

    /// Take the first match
    #[must_use]
    pub const fn first(mut self) -> Self {
        self.pick = Pick::First;
        self
    }

    /// Take the last match
    #[must_use]
    pub const fn last(mut self) -> Self {
        self.pick = Pick::Last;
        self
    }

    /// Take the first visible match
    #[must_use]
    pub const fn first_visible(mut self) -> Self {
        self.pick = Pick::FirstVisible;
        self
    }

    /// Take the match at `index`
    #[must_use]
    pub const fn nth(mut self, index: usize) -> Self {
        self.pick = Pick::Nth(index);
        self
    }

    /// Drop invisible matches before picking
    #[must_use]
    pub const fn visible_only(mut self) -> Self {
        self.visible_only = true;
        self
    }

    /// Get the selector
    #[must_use]
    pub const fn selector(&self) -> &Selector {
        &self.selector
    }

    /// Get the scope
    #[must_use]
    pub fn scope(&self) -> Option<&Locator> {
        self.within.as_deref()
    }

    /// Get the pick
    #[must_use]
    pub const fn pick(&self) -> Pick {
        self.pick
    }

    /// Full description including scope and pick, for logs and errors
    #[must_use]
    pub fn describe(&self) -> String {
        let mut out = String::new();
        if let Some(scope) = &self.within {
            out.push_str(&scope.describe());
            out.push_str(" >> ");
        }
        out.push_str(&self.selector.describe());
        if self.visible_only {
            out.push_str(" >> visible=true");
        }
        match self.pick {
            Pick::Strict => {}
            Pick::First => out.push_str(" >> first"),
            Pick::Last => out.push_str(" >> last"),
            Pick::FirstVisible => out.push_str(" >> first-visible"),
            Pick::Nth(i) => out.push_str(&format!(" >> nth={i}")),
        }
        out
    }

    /// Page script resolving this locator and applying `action`.
    ///
    /// The script evaluates to a JSON object shaped like [`ElementState`].
    #[must_use]
    pub fn script(&self, action: &LocatorAction) -> String {
        let loc = serde_json::to_string(self).unwrap_or_else(|_| "null".to_string());
        let action = serde_json::to_string(action).unwrap_or_else(|_| "null".to_string());
        let resolver = resolver_source();
        format!("(() => {{\n{resolver}\nreturn __sitecheckRun({loc}, {action});\n}})()")
    }
}

impl std::fmt::Display for Locator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.describe())
    }
}

/// What the resolver script does with the picked element
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "op", rename_all = "snake_case")]
pub enum LocatorAction {
    /// Report state only
    Query,
    /// Tag the element with [`TARGET_MARKER`] and scroll it into view
    Mark,
    /// Set the value through the native setter and fire input/change
    Fill {
        /// New value
        value: String,
    },
}

/// State of a locator's target at one instant
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ElementState {
    /// Number of matching elements
    pub count: usize,
    /// Whether the picked element is visible
    #[serde(default)]
    pub visible: bool,
    /// `value` of the picked input
    #[serde(default)]
    pub value: Option<String>,
    /// Normalized text of the picked element
    #[serde(default)]
    pub text: Option<String>,
    /// Several matches under strict picking
    #[serde(default)]
    pub ambiguous: bool,
}

impl ElementState {
    /// State of a locator with no matches
    #[must_use]
    pub fn missing() -> Self {
        Self::default()
    }

    /// State of a single visible element
    #[must_use]
    pub fn visible() -> Self {
        Self {
            count: 1,
            visible: true,
            ..Self::default()
        }
    }

    /// Whether at least one element matched
    #[must_use]
    pub const fn is_attached(&self) -> bool {
        self.count > 0
    }
}

const RESOLVER_JS: &str = r#"
const norm = (s) => String(s == null ? '' : s).replace(/\s+/g, ' ').trim();
const textMatch = (actual, expected, exact) => {
  const a = norm(actual), e = norm(expected);
  return exact ? a === e : a.toLowerCase().includes(e.toLowerCase());
};
const isVisible = (el) => {
  if (!el || !el.isConnected) return false;
  const rect = el.getBoundingClientRect();
  if (rect.width <= 0 || rect.height <= 0) return false;
  const style = window.getComputedStyle(el);
  return style.visibility !== 'hidden' && style.display !== 'none';
};
const roleOf = (el) => {
  const explicit = el.getAttribute('role');
  if (explicit) {
    const r = explicit.trim().split(/\s+/)[0].toLowerCase();
    return r === 'alertdialog' ? 'dialog' : r;
  }
  const tag = el.tagName.toLowerCase();
  if (tag === 'button' || tag === 'summary') return 'button';
  if (tag === 'input') {
    const t = (el.getAttribute('type') || 'text').toLowerCase();
    if (['button', 'submit', 'reset', 'image'].includes(t)) return 'button';
    if (['text', 'email', 'tel', 'url', 'search', 'password', 'number'].includes(t)) return 'textbox';
    return null;
  }
  if (tag === 'textarea') return 'textbox';
  if (tag === 'a' && el.hasAttribute('href')) return 'link';
  if (/^h[1-6]$/.test(tag)) return 'heading';
  if (tag === 'dialog') return 'dialog';
  if (tag === 'footer' && !el.closest('article,aside,main,nav,section')) return 'contentinfo';
  return null;
};
const nameOf = (el) => {
  const labelledBy = el.getAttribute('aria-labelledby');
  if (labelledBy) {
    const text = labelledBy.split(/\s+/)
      .map((id) => document.getElementById(id))
      .filter(Boolean)
      .map((n) => n.textContent)
      .join(' ');
    if (norm(text)) return norm(text);
  }
  const label = el.getAttribute('aria-label');
  if (norm(label)) return norm(label);
  const tag = el.tagName.toLowerCase();
  if (tag === 'input' || tag === 'textarea') {
    const t = (el.getAttribute('type') || '').toLowerCase();
    if (['button', 'submit', 'reset'].includes(t)) return norm(el.value);
    if (el.id) {
      const forLabel = document.querySelector('label[for="' + CSS.escape(el.id) + '"]');
      if (forLabel) return norm(forLabel.textContent);
    }
    const wrapping = el.closest('label');
    if (wrapping) return norm(wrapping.textContent);
    return norm(el.getAttribute('placeholder') || el.getAttribute('title'));
  }
  if (tag === 'img') return norm(el.getAttribute('alt'));
  if (roleOf(el) === 'dialog') {
    const heading = el.querySelector('h1,h2,h3,h4,h5,h6,[role=heading]');
    return heading ? norm(heading.textContent) : '';
  }
  return norm(el.textContent) || norm(el.getAttribute('title'));
};
const SKIP = new Set(['SCRIPT', 'STYLE', 'NOSCRIPT', 'TEMPLATE', 'HEAD', 'TITLE']);
const innermost = (all, pred) => all.filter((el) => !SKIP.has(el.tagName) && pred(el)
  && !Array.from(el.children).some((c) => !SKIP.has(c.tagName) && pred(c)));
const candidates = (root, sel) => {
  const all = Array.from(root.querySelectorAll('*'));
  switch (sel.by) {
    case 'role':
      return all.filter((el) => roleOf(el) === sel.role
        && (sel.name == null || textMatch(nameOf(el), sel.name, sel.exact)));
    case 'placeholder':
      return all.filter((el) => el.hasAttribute('placeholder')
        && textMatch(el.getAttribute('placeholder'), sel.text, sel.exact));
    case 'text':
      return innermost(all, (el) => textMatch(el.textContent, sel.text, sel.exact));
    case 'text_pattern': {
      const re = new RegExp(sel.pattern, 'i');
      return innermost(all, (el) => re.test(norm(el.textContent)));
    }
    case 'css':
      return Array.from(root.querySelectorAll(sel.css));
    case 'css_with_text':
      return Array.from(root.querySelectorAll(sel.css))
        .filter((el) => textMatch(el.textContent, sel.text, sel.exact));
    default:
      throw new Error('unknown selector ' + sel.by);
  }
};
const pickOne = (els, pick) => {
  if (els.length === 0) return null;
  if (pick === 'last') return els[els.length - 1];
  if (pick === 'first_visible') return els.find(isVisible) || els[0];
  if (pick && typeof pick === 'object' && 'nth' in pick) return els[pick.nth] || null;
  return els[0];
};
const resolve = (loc) => {
  let roots = [document];
  if (loc.within) {
    const scope = resolve(loc.within);
    roots = scope.target ? [scope.target] : [];
  }
  let els = [];
  for (const root of roots) els = els.concat(candidates(root, loc));
  if (loc.visible_only) els = els.filter(isVisible);
  const pick = loc.pick || 'strict';
  return {
    els,
    target: pickOne(els, pick),
    ambiguous: pick === 'strict' && els.length > 1,
  };
};
const __sitecheckRun = (loc, action) => {
  const r = resolve(loc);
  const el = r.target;
  if (el && !r.ambiguous && action && action.op === 'mark') {
    document.querySelectorAll('[MARKER]').forEach((n) => n.removeAttribute('MARKER'));
    el.setAttribute('MARKER', '1');
    el.scrollIntoView({ block: 'center', inline: 'center' });
  }
  if (el && !r.ambiguous && action && action.op === 'fill') {
    el.focus();
    const proto = el.tagName === 'TEXTAREA' ? HTMLTextAreaElement.prototype : HTMLInputElement.prototype;
    const setter = Object.getOwnPropertyDescriptor(proto, 'value').set;
    setter.call(el, action.value);
    el.dispatchEvent(new Event('input', { bubbles: true }));
    el.dispatchEvent(new Event('change', { bubbles: true }));
  }
  return {
    count: r.els.length,
    visible: isVisible(el),
    value: el && 'value' in el && typeof el.value === 'string' ? el.value : null,
    text: el ? norm(el.textContent) : null,
    ambiguous: r.ambiguous,
  };
};
"#;

fn resolver_source() -> String {
    RESOLVER_JS.replace("MARKER", TARGET_MARKER)
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;

    mod selector_tests {
        use super::*;

        #[test]
        fn test_describe_role_exact() {
            let loc = Locator::role(Role::Button, "订阅前沿").exact();
            assert_eq!(loc.selector().describe(), "role=button[name=\"订阅前沿\"]");
        }

        #[test]
        fn test_describe_role_substring() {
            let loc = Locator::role(Role::Dialog, "订阅前沿更新");
            assert_eq!(loc.selector().describe(), "role=dialog[name~\"订阅前沿更新\"]");
        }

        #[test]
        fn test_describe_other_selectors() {
            assert_eq!(
                Locator::placeholder("name@example.com").selector().describe(),
                "placeholder~\"name@example.com\""
            );
            assert_eq!(
                Locator::text("已保存").exact().selector().describe(),
                "text=\"已保存\""
            );
            assert_eq!(
                Locator::text_pattern("行业洞察|前沿洞察").selector().describe(),
                "text=/行业洞察|前沿洞察/i"
            );
            assert_eq!(Locator::css("footer").selector().describe(), "css=footer");
            assert_eq!(
                Locator::css_with_text("footer a", "战略规划").selector().describe(),
                "css=footer a:has-text~\"战略规划\""
            );
            assert_eq!(Locator::any_role(Role::Dialog).selector().describe(), "role=dialog");
        }

        #[test]
        fn test_exact_is_noop_for_css() {
            let loc = Locator::css("footer").exact();
            assert_eq!(loc.selector(), &Selector::Css { css: "footer".to_string() });
        }
    }

    mod locator_tests {
        use super::*;

        #[test]
        fn test_describe_scope_and_pick() {
            let dialog = Locator::role(Role::Dialog, "订阅前沿更新");
            let loc = Locator::role(Role::Button, "保存订阅").exact().within(dialog).first();
            assert_eq!(
                loc.describe(),
                "role=dialog[name~\"订阅前沿更新\"] >> role=button[name=\"保存订阅\"] >> first"
            );
        }

        #[test]
        fn test_describe_picks() {
            assert!(Locator::text("x").last().describe().ends_with(" >> last"));
            assert!(Locator::text("x").nth(2).describe().ends_with(" >> nth=2"));
            assert!(Locator::text("x")
                .first_visible()
                .describe()
                .ends_with(" >> first-visible"));
            assert!(Locator::css("footer")
                .visible_only()
                .describe()
                .ends_with(" >> visible=true"));
        }

        #[test]
        fn test_default_pick_is_strict() {
            assert_eq!(Locator::css("a").pick(), Pick::Strict);
            assert!(Locator::css("a").scope().is_none());
        }

        #[test]
        fn test_yaml_shape() {
            let yaml = "by: role\nrole: button\nname: 下一步\nexact: true\npick: last\n";
            let loc: Locator = serde_yaml_ng::from_str(yaml).unwrap();
            assert_eq!(loc, Locator::role(Role::Button, "下一步").exact().last());
        }

        #[test]
        fn test_yaml_nested_scope() {
            let yaml = r#"
by: placeholder
text: name@example.com
within:
  by: role
  role: dialog
  name: 订阅前沿更新
"#;
            let loc: Locator = serde_yaml_ng::from_str(yaml).unwrap();
            assert_eq!(
                loc,
                Locator::placeholder("name@example.com")
                    .within(Locator::role(Role::Dialog, "订阅前沿更新"))
            );
        }

        #[test]
        fn test_nth_pick_yaml() {
            let loc: Locator =
                serde_yaml_ng::from_str("by: css\ncss: footer a\npick:\n  nth: 3\n").unwrap();
            assert_eq!(loc.pick(), Pick::Nth(3));
        }

        #[test]
        fn test_json_omits_defaults() {
            let json = serde_json::to_value(Locator::css("footer")).unwrap();
            assert_eq!(json, serde_json::json!({"by": "css", "css": "footer"}));
        }
    }

    mod script_tests {
        use super::*;

        #[test]
        fn test_script_embeds_escaped_spec() {
            let loc = Locator::text("say \"hi\"</script>");
            let script = loc.script(&LocatorAction::Query);
            assert!(script.contains(r#""text":"say \"hi\"</script>""#));
            assert!(script.contains(r#"{"op":"query"}"#));
            assert!(script.starts_with("(() => {"));
            assert!(script.trim_end().ends_with("})()"));
        }

        #[test]
        fn test_fill_action_serialized() {
            let script = Locator::placeholder("怎么称呼你")
                .script(&LocatorAction::Fill { value: "自动化测试".to_string() });
            assert!(script.contains(r#"{"op":"fill","value":"自动化测试"}"#));
        }

        #[test]
        fn test_marker_substituted() {
            let script = Locator::css("a").script(&LocatorAction::Mark);
            assert!(script.contains("[data-sitecheck-target]"));
            assert!(!script.contains("'MARKER'"));
        }
    }

    mod element_state_tests {
        use super::*;

        #[test]
        fn test_deserialize_resolver_output() {
            let state: ElementState = serde_json::from_value(serde_json::json!({
                "count": 2, "visible": true, "value": null, "text": "下一步", "ambiguous": true
            }))
            .unwrap();
            assert_eq!(state.count, 2);
            assert!(state.ambiguous);
            assert_eq!(state.text.as_deref(), Some("下一步"));
        }

        #[test]
        fn test_constructors() {
            assert!(!ElementState::missing().is_attached());
            assert!(ElementState::visible().is_attached());
            assert!(ElementState::visible().visible);
        }
    }
}
