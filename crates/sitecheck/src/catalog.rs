//! Built-in scenarios for the Yiyu think-tank site.
//!
//! Each scenario is plain data built from a timestamp, so seeded e-mail
//! addresses and probe values differ from run to run while staying
//! reproducible in tests.

use crate::assertion::{Assertion, AssertionKind, ParamCheck, BASE_PLACEHOLDER};
use crate::locator::{Locator, Role};
use crate::scenario::{Scenario, Snapshot, Step, CAPTURE_DIALOGS, CAPTURE_ENTRY_URL, CAPTURE_FINAL_URL};
use crate::seed::{SeedPayload, StorageArea};
use crate::wait::{LoadState, WaitState};
use chrono::{DateTime, Local, SecondsFormat, Utc};
use serde_json::json;

/// Names of the built-in scenarios, in catalog order
pub const SCENARIO_NAMES: [&str; 11] = [
    "site-smoke",
    "subscription-dialog",
    "deep-link-modal",
    "fallback-form-submit",
    "dead-link-feedback",
    "footer-links",
    "learning-alias",
    "unknown-page",
    "favicon-asset",
    "strategy-footer-feedback",
    "register-terms-feedback",
];

/// Storage key of the subscription preferences document
pub const SUBSCRIPTION_PREFS_KEY: &str = "yiyu_subscription_prefs";

/// Text every placeholder link dialog carries
pub const NOT_YET_OPEN: &str = "暂未开放";

const NAV_LABELS: [(&str, &str); 5] = [
    ("home", "首页"),
    ("insights", "前沿洞察"),
    ("strategy", "战略陪伴"),
    ("learning", "学习中心"),
    ("about", "关于我们"),
];

fn click(target: Locator, timeout_ms: u64) -> Step {
    Step::Click { target, timeout_ms }
}

fn fill(target: Locator, value: impl Into<String>, timeout_ms: u64) -> Step {
    Step::Fill {
        target,
        value: value.into(),
        timeout_ms,
    }
}

fn soft_wait(target: Locator, timeout_ms: u64, record: &str) -> Step {
    Step::WaitFor {
        target,
        state: WaitState::Visible,
        timeout_ms,
        record: Some(record.to_string()),
    }
}

fn wait_for_url(contains: &[&str], timeout_ms: u64, record: &str) -> Step {
    Step::WaitForUrl {
        contains: contains.iter().map(ToString::to_string).collect(),
        timeout_ms,
        record: Some(record.to_string()),
    }
}

fn capture_count(target: Locator, name: &str) -> Step {
    Step::CaptureCount {
        target,
        name: name.to_string(),
    }
}

fn dialog_count(name: &str) -> Step {
    Step::CaptureDialogCount {
        name: name.to_string(),
    }
}

fn equals_param(capture: &str, param: &str, value: &str) -> AssertionKind {
    AssertionKind::QueryParam {
        capture: capture.to_string(),
        param: param.to_string(),
        expect: ParamCheck::Equals,
        value: Some(value.to_string()),
    }
}

fn dialogs_contain(needle: &str, every: bool) -> AssertionKind {
    AssertionKind::DialogsContain {
        needle: needle.to_string(),
        every,
    }
}

fn dialogs_at_least(count: usize) -> AssertionKind {
    AssertionKind::DialogCount {
        at_least: Some(count),
        exactly: None,
    }
}

fn footer() -> Locator {
    Locator::css("footer")
}

/// Every built-in scenario
#[must_use]
pub fn all(now: DateTime<Local>) -> Vec<Scenario> {
    vec![
        site_smoke(),
        subscription_dialog(now),
        deep_link_modal(),
        fallback_form_submit(),
        dead_link_feedback(),
        footer_links(),
        learning_alias(),
        unknown_page(now),
        favicon_asset(),
        strategy_footer_feedback(),
        register_terms_feedback(),
    ]
}

/// Look a scenario up by name
#[must_use]
pub fn find(name: &str, now: DateTime<Local>) -> Option<Scenario> {
    all(now).into_iter().find(|s| s.name == name)
}

/// Home page reachable over plain HTTP, main navigation rendered
#[must_use]
pub fn site_smoke() -> Scenario {
    let mut scenario = Scenario::new("site-smoke", "check_site", "")
        .with_description("Home page answers 200 and renders the main navigation")
        .with_http_check("home_http", "");
    for (slug, label) in NAV_LABELS {
        let button = Locator::role(Role::Button, label).exact();
        scenario = scenario
            .step(Step::wait_for(button.clone().first(), WaitState::Visible, 20_000))
            .step(capture_count(button, &format!("nav_{slug}_count")));
    }
    scenario = scenario.step(Step::screenshot("home.png"));
    for (slug, _) in NAV_LABELS {
        scenario = scenario.assert(Assertion::new(
            format!("nav_{slug}_present"),
            AssertionKind::at_least(format!("nav_{slug}_count"), 1),
        ));
    }
    scenario.assert(
        Assertion::new(
            "vite_svg_status",
            AssertionKind::AssetStatus {
                url: Some("vite.svg".to_string()),
                capture: None,
                below: 400,
            },
        )
        .warning_only(),
    )
}

/// Subscription preferences seeded in storage prefill the dialog, and
/// saving writes the edited e-mail back
#[must_use]
pub fn subscription_dialog(now: DateTime<Local>) -> Scenario {
    let stamp = now.format("%H%M%S");
    let seed_email = format!("e2e-seed-{stamp}@example.com");
    let updated_email = format!("e2e-updated-{stamp}@example.com");
    let prefs = json!({
        "enabled": true,
        "email": seed_email,
        "frequency": "weekly",
        "topics": { "insights": true, "reports": true, "tools": false, "strategyUpdates": true },
        "formats": { "digest": true, "keyTakeaways": true, "actionChecklist": false },
        "updatedAt": now.with_timezone(&Utc).to_rfc3339_opts(SecondsFormat::Millis, true),
    });
    let seed = SeedPayload::new()
        .with_item(StorageArea::Local, "yiyu_is_admin", "true")
        .with_item(StorageArea::Session, "yiyu_is_admin", "true")
        .with_json(StorageArea::Local, SUBSCRIPTION_PREFS_KEY, &prefs)
        .with_event("yiyu_data_change");

    let dialog = Locator::role(Role::Dialog, "订阅前沿更新");
    let email = Locator::css("input[placeholder=\"name@example.com\"]").within(dialog.clone());

    Scenario::new(
        "subscription-dialog",
        "P0-IX-05_home_subscription_sheet_closed_loop",
        "",
    )
    .with_description("Subscription dialog prefills the stored e-mail and saves the edit")
    .with_param("seed_email", seed_email.clone())
    .with_param("updated_email", updated_email.clone())
    .with_seed(seed)
    .step(Step::screenshot("ix05-home.png"))
    .step(click(Locator::role(Role::Button, "订阅前沿").exact().first(), 15_000))
    .step(Step::wait_for(dialog.clone(), WaitState::Visible, 20_000))
    .step(Step::screenshot("ix05-subscription-dialog-open.png"))
    .step(Step::CaptureValue {
        target: email.clone(),
        name: "prefill_value".to_string(),
        timeout_ms: 15_000,
    })
    .step(fill(email, updated_email.clone(), 15_000))
    .step(click(
        Locator::role(Role::Button, "保存订阅").exact().within(dialog.clone()),
        15_000,
    ))
    .step(Step::wait_for(
        Locator::text("已保存").exact().within(dialog),
        WaitState::Visible,
        10_000,
    ))
    .step(Step::screenshot("ix05-saved.png"))
    .step(Step::CaptureStorage {
        area: StorageArea::Local,
        key: SUBSCRIPTION_PREFS_KEY.to_string(),
        name: "storage".to_string(),
        parse_json: true,
    })
    .assert(Assertion::new(
        "prefill_matches_seed_email",
        AssertionKind::equals("prefill_value", seed_email),
    ))
    .assert(Assertion::new(
        "localstorage_email_updated",
        AssertionKind::JsonFieldEquals {
            capture: "storage".to_string(),
            pointer: "/email".to_string(),
            expected: json!(updated_email),
        },
    ))
    .snapshot(Snapshot::capture(
        "localstorage_yiyu_subscription_prefs.json",
        "storage",
    ))
}

/// `?page=about&intro=1` opens the intro modal; closing it drops `intro=1`
#[must_use]
pub fn deep_link_modal() -> Scenario {
    let modal = Locator::role(Role::Dialog, "介绍视频");
    Scenario::new(
        "deep-link-modal",
        "P0-IX-06_about_intro_modal_deeplink_and_cleanup",
        "?page=about&intro=1",
    )
    .with_description("Intro deep link opens the modal and closing cleans the URL")
    .step(Step::screenshot("ix06-about-entry.png"))
    .step(Step::wait_for(modal.clone(), WaitState::Visible, 20_000))
    .step(Step::screenshot("ix06-modal-open.png"))
    .step(Step::capture_url("url_before_close"))
    .step(click(
        Locator::role(Role::Button, "关闭").exact().within(modal.clone()),
        15_000,
    ))
    .step(Step::wait_for(modal, WaitState::Detached, 20_000))
    .step(Step::screenshot("ix06-modal-closed.png"))
    .step(Step::capture_url("url_after_close"))
    .assert(Assertion::new(
        "url_cleaned_after_close",
        AssertionKind::not_contains("url_after_close", "intro=1"),
    ))
    .assert(Assertion::new(
        "page_about_kept",
        equals_param("url_after_close", "page", "about"),
    ))
    .assert(Assertion::new(
        "same_page_after_close",
        AssertionKind::SamePath {
            left: "url_before_close".to_string(),
            right: "url_after_close".to_string(),
        },
    ))
    .snapshot(Snapshot::fields(
        "url_snapshots.json",
        [
            ("about_url", CAPTURE_ENTRY_URL),
            ("url_before_close", "url_before_close"),
            ("url_after_close", "url_after_close"),
        ],
    ))
}

/// The fallback consult form submits and lands on a marked URL
#[must_use]
pub fn fallback_form_submit() -> Scenario {
    let next = || Locator::role(Role::Button, "下一步").last();
    Scenario::new(
        "fallback-form-submit",
        "P0-IX-07_consult_apply_submit_has_next_step_and_url_marker",
        "?page=consult-apply",
    )
    .with_description("Fallback consult form submits with minimal fields")
    .step(Step::screenshot("ix07-entry.png"))
    .step(click(Locator::role(Role::Button, "使用备用表单").exact(), 20_000))
    .step(Step::fill(Locator::placeholder("怎么称呼你"), "自动化测试"))
    .step(Step::fill(
        Locator::placeholder("用于接收后续材料/开票（如后续购买）"),
        "test@example.com",
    ))
    .step(Step::click(next()))
    .step(Step::fill(
        Locator::placeholder("至少 15 个字"),
        "希望优化战略咨询申请的提交落点与反馈",
    ))
    .step(Step::click(next()))
    .step(Step::click(next()))
    .step(Step::click(next()))
    .step(Step::screenshot("ix07-before-submit.png"))
    .step(click(Locator::role(Role::Button, "确认提交").exact(), 20_000))
    .step(Step::wait_for(
        Locator::role(Role::Heading, "已提交，我们会尽快处理").exact(),
        WaitState::Visible,
        20_000,
    ))
    .step(Step::wait_for(
        Locator::role(Role::Link, "发送邮件（备选落点）").exact(),
        WaitState::Visible,
        20_000,
    ))
    .step(Step::screenshot("ix07-done.png"))
    .step(Step::capture_url("url_after"))
    .assert(Assertion::new(
        "url_has_submitted_marker",
        equals_param("url_after", "submitted", "1"),
    ))
    .assert(Assertion::new(
        "url_has_request_id",
        AssertionKind::query_param("url_after", "rid", ParamCheck::NonEmpty),
    ))
    .snapshot(Snapshot::fields(
        "url_snapshots.json",
        [("open", CAPTURE_ENTRY_URL), ("url_after", "url_after")],
    ))
}

/// Terms and privacy links on the login page answer with a dialog each
#[must_use]
pub fn dead_link_feedback() -> Scenario {
    Scenario::new(
        "dead-link-feedback",
        "P0-IX-08_login_terms_privacy_links_have_feedback",
        "?page=login",
    )
    .with_description("Login page placeholder links raise one dialog each and stay put")
    .step(Step::screenshot("ix08-entry.png"))
    .step(Step::capture_url("url_before"))
    .step(click(Locator::role(Role::Link, "服务条款").exact(), 20_000))
    .step(Step::pause(200))
    .step(dialog_count("after_terms"))
    .step(click(Locator::role(Role::Link, "隐私政策").exact(), 20_000))
    .step(Step::pause(200))
    .step(dialog_count("after_privacy"))
    .step(Step::screenshot("ix08-after-click.png"))
    .step(Step::capture_url("url_after"))
    .assert(Assertion::new(
        "terms_dialog_shown",
        AssertionKind::equals("after_terms", 1),
    ))
    .assert(Assertion::new(
        "privacy_dialog_shown",
        AssertionKind::equals("after_privacy", 2),
    ))
    .assert(Assertion::new(
        "exactly_two_dialogs",
        AssertionKind::DialogCount {
            at_least: None,
            exactly: Some(2),
        },
    ))
    .assert(Assertion::new(
        "dialogs_say_not_yet_open",
        dialogs_contain(NOT_YET_OPEN, true),
    ))
    .assert(Assertion::new(
        "url_unchanged",
        AssertionKind::same("url_before", "url_after"),
    ))
    .snapshot(Snapshot::fields(
        "dialog_messages.json",
        [("open", CAPTURE_ENTRY_URL), ("dialogs", CAPTURE_DIALOGS)],
    ))
}

fn footer_link_steps(
    scenario: Scenario,
    prefix: &str,
    pattern: &str,
    matchers: &[&str],
) -> Scenario {
    scenario
        .step(Step::ScrollToBottom)
        .step(Step::pause(800))
        .step(Step::wait_for(footer(), WaitState::Attached, 20_000))
        .step(Step::wait_for(footer(), WaitState::Visible, 20_000))
        .step(Step::screenshot(format!("ix09-{prefix}-footer-visible.png")))
        .step(Step::capture_url(format!("{prefix}_before")))
        .step(click(
            Locator::text_pattern(pattern).within(footer()).first_visible(),
            20_000,
        ))
        .step(wait_for_url(matchers, 20_000, &format!("{prefix}_url_matched")))
        .step(Step::pause(500))
        .step(Step::screenshot(format!("ix09-{prefix}-after-click.png")))
        .step(Step::capture_url(format!("{prefix}_after")))
        .assert(Assertion::new(
            format!("{prefix}_url_matched"),
            AssertionKind::truthy(format!("{prefix}_url_matched")),
        ))
        .assert(Assertion::new(
            format!("{prefix}_url_changed"),
            AssertionKind::differs(format!("{prefix}_before"), format!("{prefix}_after")),
        ))
}

/// Footer entries for insights and consulting navigate
#[must_use]
pub fn footer_links() -> Scenario {
    let scenario = Scenario::new("footer-links", "P0-IX-09_footer_links_navigate", "")
        .with_description("Footer insight and consult entries change the route")
        .step(Step::screenshot("ix09-home-entry.png"));
    let scenario = footer_link_steps(
        scenario,
        "insights",
        "行业洞察|前沿洞察",
        &["?page=insights", "insights"],
    );
    // Some routes render without a footer; start the second link from home.
    let scenario = scenario
        .step(Step::Navigate {
            url: String::new(),
            wait_until: LoadState::NetworkIdle,
        })
        .step(Step::pause(300));
    footer_link_steps(
        scenario,
        "consult",
        "预约对话|咨询申请|申请咨询",
        &["?page=consult-apply", "consult-apply", "consult", "apply"],
    )
}

/// `?page=learning` is rewritten to the library
#[must_use]
pub fn learning_alias() -> Scenario {
    Scenario::new(
        "learning-alias",
        "P0-IX-10_learning_alias_routes_to_library",
        "?page=learning",
    )
    .with_description("Legacy learning route normalizes to the library")
    .step(Step::screenshot("ix10-entry-learning-param.png"))
    .step(wait_for_url(&["?page=library"], 20_000, "url_normalized"))
    .step(Step::pause(300))
    .step(Step::screenshot("ix10-after-normalize.png"))
    .step(soft_wait(
        Locator::text("书库 · 精选书籍提炼 · 知识精华萃取").exact().first(),
        15_000,
        "library_content_visible",
    ))
    .assert(Assertion::new(
        "final_url_contains_page_library",
        AssertionKind::contains(CAPTURE_FINAL_URL, "?page=library"),
    ))
    .assert(Assertion::new(
        "library_content_visible",
        AssertionKind::truthy("library_content_visible"),
    ))
}

/// An unknown page shows the 404 view and its button returns home
#[must_use]
pub fn unknown_page(now: DateTime<Local>) -> Scenario {
    let bad = format!("bad_{}", now.timestamp_millis());
    Scenario::new(
        "unknown-page",
        "P0-IX-12_unknown_page_shows_404_and_can_go_home",
        format!("?page={bad}"),
    )
    .with_description("Unknown route shows the not-found view with a way home")
    .with_param("bad_page_value", bad.clone())
    .step(Step::screenshot("ix12-unknown-page.png"))
    .step(Step::wait_for(
        Locator::text("页面不存在").exact(),
        WaitState::Visible,
        20_000,
    ))
    .step(click(Locator::role(Role::Button, "返回首页"), 20_000))
    .step(Step::WaitForNetworkIdle { timeout_ms: 60_000 })
    .step(Step::screenshot("ix12-after-go-home.png"))
    .step(capture_count(
        Locator::role(Role::Button, "首页").exact(),
        "home_nav_count",
    ))
    .assert(Assertion::new(
        "final_url_is_site",
        AssertionKind::StartsWith {
            capture: CAPTURE_FINAL_URL.to_string(),
            prefix: BASE_PLACEHOLDER.to_string(),
        },
    ))
    .assert(Assertion::new(
        "bad_page_left",
        AssertionKind::not_contains(CAPTURE_FINAL_URL, format!("page={bad}")),
    ))
    .assert(Assertion::new(
        "home_nav_visible",
        AssertionKind::at_least("home_nav_count", 1),
    ))
}

/// Favicon declared in the page
const FAVICON_HREF_SCRIPT: &str = r#"(() => {
  const el = document.querySelector('link[rel="icon"]');
  return el ? el.getAttribute('href') : null;
})()"#;

/// Favicon as the browser resolved it
const FAVICON_RESOLVED_SCRIPT: &str = r#"(() => {
  const el = document.querySelector('link[rel="icon"]');
  return el ? el.href : null;
})()"#;

/// The favicon resolves under the site path and nothing requests the
/// origin-root `vite.svg`
#[must_use]
pub fn favicon_asset() -> Scenario {
    Scenario::new(
        "favicon-asset",
        "P0-IX-13_favicon_no_root_vite_svg_404",
        "",
    )
    .with_description("Favicon loads from the site path without an origin-root 404")
    .step(Step::screenshot("ix13-home.png"))
    .step(Step::Evaluate {
        script: FAVICON_HREF_SCRIPT.to_string(),
        name: Some("favicon_href".to_string()),
    })
    .step(Step::Evaluate {
        script: FAVICON_RESOLVED_SCRIPT.to_string(),
        name: Some("favicon_resolved".to_string()),
    })
    .assert(Assertion::new(
        "favicon_declared",
        AssertionKind::truthy("favicon_href"),
    ))
    .assert(Assertion::new(
        "favicon_status_ok",
        AssertionKind::AssetStatus {
            url: None,
            capture: Some("favicon_href".to_string()),
            below: 300,
        },
    ))
    .assert(Assertion::new(
        "no_root_vite_svg_error",
        AssertionKind::NoErrorResponse {
            url: "{origin}/vite.svg".to_string(),
        },
    ))
    .snapshot(Snapshot::fields(
        "favicon.json",
        [
            ("open", CAPTURE_ENTRY_URL),
            ("href_attr", "favicon_href"),
            ("resolved", "favicon_resolved"),
        ],
    ))
}

/// A placeholder link in the strategy footer answers with a dialog
#[must_use]
pub fn strategy_footer_feedback() -> Scenario {
    Scenario::new(
        "strategy-footer-feedback",
        "P0-IX-14_strategy_footer_links_have_feedback",
        "?page=strategy",
    )
    .with_description("Strategy footer placeholder link raises a build-tagged dialog")
    .step(Step::wait_for(
        Locator::text("合作方式").first(),
        WaitState::Visible,
        30_000,
    ))
    .step(Step::ScrollToBottom)
    .step(Step::pause(800))
    .step(Step::screenshot("ix14-strategy-footer.png"))
    .step(Step::wait_for(footer(), WaitState::Visible, 20_000))
    .step(click(
        Locator::css_with_text("a", "战略规划").within(footer()).first(),
        20_000,
    ))
    .step(Step::pause(500))
    .step(Step::screenshot("ix14-after-click.png"))
    .assert(Assertion::new("dialog_shown", dialogs_at_least(1)))
    .assert(Assertion::new(
        "dialog_says_not_yet_open",
        dialogs_contain(NOT_YET_OPEN, false),
    ))
    .assert(Assertion::new(
        "dialog_has_build_tag",
        dialogs_contain("vBuild-1.0", false),
    ))
    .assert(Assertion::new(
        "stays_on_strategy",
        AssertionKind::contains(CAPTURE_FINAL_URL, "page=strategy"),
    ))
}

/// Terms and privacy links on the register page answer without navigating
#[must_use]
pub fn register_terms_feedback() -> Scenario {
    let terms = Locator::role(Role::Link, "服务条款");
    Scenario::new(
        "register-terms-feedback",
        "P0-IX-15_register_terms_privacy_links_have_feedback",
        "?page=register",
    )
    .with_description("Register page placeholder links raise dialogs and stay put")
    .with_wait_until(LoadState::DomContentLoaded)
    .step(Step::wait_for(terms.clone(), WaitState::Visible, 30_000))
    .step(Step::screenshot("ix15-register-before.png"))
    .step(Step::capture_url("url_before"))
    .step(click(terms, 20_000))
    .step(Step::pause(300))
    .step(click(Locator::role(Role::Link, "隐私政策"), 20_000))
    .step(Step::pause(300))
    .step(Step::screenshot("ix15-register-after-clicks.png"))
    .step(Step::capture_url("url_after"))
    .assert(Assertion::new("both_dialogs_shown", dialogs_at_least(2)))
    .assert(Assertion::new(
        "dialogs_say_not_yet_open",
        dialogs_contain(NOT_YET_OPEN, false),
    ))
    .assert(Assertion::new(
        "dialogs_have_build_tag",
        dialogs_contain("vBuild-1.0", false),
    ))
    .assert(Assertion::new(
        "url_unchanged",
        AssertionKind::same("url_before", "url_after"),
    ))
    .assert(Assertion::new(
        "stays_on_register",
        AssertionKind::contains("url_after", "page=register"),
    ))
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use crate::dialog::Dialog;
    use crate::driver::{MockDriver, MockEffect, MockElement, MockLauncher};
    use crate::reachability::StaticProbe;
    use crate::runner::{HarnessConfig, ScenarioRunner};
    use chrono::TimeZone;
    use serde_json::Value;
    use tempfile::TempDir;

    const BASE: &str = "https://site.test/";

    fn fixed_now() -> DateTime<Local> {
        Local.with_ymd_and_hms(2026, 3, 14, 9, 26, 53).unwrap()
    }

    fn runner(root: &TempDir, driver: &MockDriver) -> ScenarioRunner<MockLauncher, StaticProbe> {
        let config = HarnessConfig::builder()
            .base_url(BASE)
            .evidence_root(root.path())
            .navigation_timeout_ms(1_000)
            .network_idle_ms(0)
            .poll_interval_ms(5)
            .build();
        ScenarioRunner::new(config, MockLauncher::new(driver.clone()), StaticProbe::new()).unwrap()
    }

    mod catalog_tests {
        use super::*;

        #[test]
        fn test_every_scenario_validates() {
            for scenario in all(fixed_now()) {
                scenario
                    .validate()
                    .unwrap_or_else(|e| panic!("{}: {e}", scenario.name));
            }
        }

        #[test]
        fn test_names_match_catalog_order() {
            let names: Vec<String> = all(fixed_now()).into_iter().map(|s| s.name).collect();
            assert_eq!(names, SCENARIO_NAMES);
        }

        #[test]
        fn test_find() {
            assert!(find("deep-link-modal", fixed_now()).is_some());
            assert!(find("no-such-check", fixed_now()).is_none());
        }

        #[test]
        fn test_seeded_emails_use_clock() {
            let scenario = subscription_dialog(fixed_now());
            assert_eq!(scenario.params["seed_email"], "e2e-seed-092653@example.com");
            assert_eq!(scenario.params["updated_email"], "e2e-updated-092653@example.com");
            let seed = scenario.seed.unwrap();
            let prefs: Value =
                serde_json::from_str(&seed.local_storage[SUBSCRIPTION_PREFS_KEY]).unwrap();
            assert_eq!(prefs["email"], "e2e-seed-092653@example.com");
            assert_eq!(prefs["frequency"], "weekly");
            assert_eq!(seed.local_storage["yiyu_is_admin"], "true");
            assert_eq!(seed.session_storage["yiyu_is_admin"], "true");
            assert_eq!(seed.dispatch_event.as_deref(), Some("yiyu_data_change"));
        }

        #[test]
        fn test_unknown_page_value() {
            let scenario = unknown_page(fixed_now());
            let bad = scenario.params["bad_page_value"].as_str().unwrap().to_string();
            assert!(bad.starts_with("bad_"));
            assert_eq!(scenario.url, format!("?page={bad}"));
        }

        #[test]
        fn test_smoke_asset_is_warning_only() {
            let scenario = site_smoke();
            let asset = scenario
                .assertions
                .iter()
                .find(|a| a.name == "vite_svg_status")
                .unwrap();
            assert_eq!(asset.severity, crate::verdict::Severity::WarningOnly);
            assert_eq!(scenario.http_check.unwrap().name, "home_http");
        }

        #[test]
        fn test_yaml_round_trip() {
            for scenario in all(fixed_now()) {
                let yaml = scenario.to_yaml().unwrap();
                let back = Scenario::from_yaml(&yaml).unwrap();
                assert_eq!(back, scenario, "{}", scenario.name);
            }
        }
    }

    mod closed_loop_tests {
        use super::*;

        fn favicon_driver(href: &str, resolved: &str) -> MockDriver {
            let driver = MockDriver::new();
            driver.set_eval_result(FAVICON_HREF_SCRIPT, json!(href));
            driver.set_eval_result(FAVICON_RESOLVED_SCRIPT, json!(resolved));
            driver
        }

        fn favicon_runner(
            root: &TempDir,
            driver: &MockDriver,
            probe: StaticProbe,
        ) -> ScenarioRunner<MockLauncher, StaticProbe> {
            let config = HarnessConfig::builder()
                .base_url("https://site.test/yiyu/")
                .evidence_root(root.path())
                .network_idle_ms(0)
                .poll_interval_ms(5)
                .build();
            ScenarioRunner::new(config, MockLauncher::new(driver.clone()), probe).unwrap()
        }

        #[tokio::test]
        async fn test_favicon_asset_relative_href_passes() {
            let driver = favicon_driver("vite.svg", "https://site.test/yiyu/vite.svg");
            let probe = StaticProbe::new().with_status("https://site.test/yiyu/vite.svg", 200);
            let root = TempDir::new().unwrap();
            let outcome = favicon_runner(&root, &driver, probe)
                .run(&favicon_asset())
                .await
                .unwrap();
            assert!(outcome.verdict.ok, "{:#?}", outcome.verdict);

            let doc: Value = serde_json::from_str(
                &std::fs::read_to_string(outcome.evidence_dir.join("favicon.json")).unwrap(),
            )
            .unwrap();
            assert_eq!(doc["open"], "https://site.test/yiyu/");
            assert_eq!(doc["href_attr"], "vite.svg");
            assert!(outcome.evidence_dir.join("ix13-home.png").exists());
        }

        #[tokio::test]
        async fn test_favicon_asset_root_href_fails() {
            let driver = favicon_driver("/vite.svg", "https://site.test/vite.svg");
            driver.on_navigate(
                "https://site.test/yiyu/",
                MockEffect::Response {
                    url: "https://site.test/vite.svg".into(),
                    status: 404,
                },
            );
            let probe = StaticProbe::new().with_status("https://site.test/vite.svg", 404);
            let root = TempDir::new().unwrap();
            let outcome = favicon_runner(&root, &driver, probe)
                .run(&favicon_asset())
                .await
                .unwrap();
            assert!(!outcome.verdict.ok);
            let failures = outcome.verdict.failures();
            assert!(failures.contains(&"favicon_status_ok"));
            assert!(failures.contains(&"no_root_vite_svg_error"));
            assert!(!failures.contains(&"favicon_declared"));
        }

        #[tokio::test]
        async fn test_subscription_dialog_against_mock() {
            let now = fixed_now();
            let scenario = subscription_dialog(now);
            let dialog = Locator::role(Role::Dialog, "订阅前沿更新");
            let email = Locator::css("input[placeholder=\"name@example.com\"]");
            let saved = Locator::text("已保存").exact();
            let email_key = email.selector().describe();

            let driver = MockDriver::new();
            driver.add_element(
                &Locator::role(Role::Button, "订阅前沿").exact(),
                MockElement::visible()
                    .with_count(2)
                    .on_click(MockEffect::Show(dialog.selector().describe()))
                    .on_click(MockEffect::PrefillFromStorage {
                        element: email_key.clone(),
                        area: StorageArea::Local,
                        key: SUBSCRIPTION_PREFS_KEY.into(),
                        pointer: "/email".into(),
                    }),
            );
            driver.add_element(&email, MockElement::visible());
            driver.add_element(
                &Locator::role(Role::Button, "保存订阅").exact(),
                MockElement::visible()
                    .on_click(MockEffect::StoreValue {
                        element: email_key,
                        area: StorageArea::Local,
                        key: SUBSCRIPTION_PREFS_KEY.into(),
                        pointer: "/email".into(),
                    })
                    .on_click(MockEffect::Show(saved.selector().describe())),
            );

            let root = TempDir::new().unwrap();
            let outcome = runner(&root, &driver).run_at(&scenario, now).await.unwrap();
            assert!(outcome.verdict.ok, "{:#?}", outcome.verdict);
            assert!(outcome.verdict.check("prefill_matches_seed_email").unwrap().ok);
            assert!(outcome.verdict.check("localstorage_email_updated").unwrap().ok);

            let stored: Value = serde_json::from_str(
                &std::fs::read_to_string(
                    outcome
                        .evidence_dir
                        .join("localstorage_yiyu_subscription_prefs.json"),
                )
                .unwrap(),
            )
            .unwrap();
            assert_eq!(stored["email"], "e2e-updated-092653@example.com");
            assert!(outcome.evidence_dir.join("ix05-saved.png").exists());
        }

        #[tokio::test]
        async fn test_dead_link_feedback_against_mock() {
            let driver = MockDriver::new();
            driver.add_element(
                &Locator::role(Role::Link, "服务条款").exact(),
                MockElement::visible()
                    .on_click(MockEffect::Dialog(Dialog::alert("服务条款暂未开放（vBuild-1.0）"))),
            );
            driver.add_element(
                &Locator::role(Role::Link, "隐私政策").exact(),
                MockElement::visible()
                    .on_click(MockEffect::Dialog(Dialog::alert("隐私政策暂未开放（vBuild-1.0）"))),
            );
            let root = TempDir::new().unwrap();
            let outcome = runner(&root, &driver)
                .run(&dead_link_feedback())
                .await
                .unwrap();
            assert!(outcome.verdict.ok, "{:#?}", outcome.verdict);

            let text = std::fs::read_to_string(outcome.evidence_dir.join("dialog_messages.json"))
                .unwrap();
            let doc: Value = serde_json::from_str(&text).unwrap();
            assert_eq!(doc["open"], format!("{BASE}?page=login"));
            assert_eq!(doc["dialogs"].as_array().unwrap().len(), 2);
        }

        #[tokio::test]
        async fn test_dead_link_without_dialog_fails() {
            let driver = MockDriver::new();
            driver.add_element(&Locator::role(Role::Link, "服务条款").exact(), MockElement::visible());
            driver.add_element(&Locator::role(Role::Link, "隐私政策").exact(), MockElement::visible());
            let root = TempDir::new().unwrap();
            let outcome = runner(&root, &driver)
                .run(&dead_link_feedback())
                .await
                .unwrap();
            assert!(!outcome.verdict.ok);
            let failures = outcome.verdict.failures();
            assert!(failures.contains(&"terms_dialog_shown"));
            assert!(failures.contains(&"exactly_two_dialogs"));
            assert!(!failures.contains(&"url_unchanged"));
        }

        #[tokio::test]
        async fn test_fallback_form_against_mock() {
            let driver = MockDriver::new();
            let done_url = format!("{BASE}?page=consult-apply&submitted=1&rid=r-42");
            for locator in [
                Locator::role(Role::Button, "使用备用表单").exact(),
                Locator::placeholder("怎么称呼你"),
                Locator::placeholder("用于接收后续材料/开票（如后续购买）"),
                Locator::placeholder("至少 15 个字"),
                Locator::role(Role::Heading, "已提交，我们会尽快处理").exact(),
                Locator::role(Role::Link, "发送邮件（备选落点）").exact(),
            ] {
                driver.add_element(&locator, MockElement::visible());
            }
            driver.add_element(
                &Locator::role(Role::Button, "下一步"),
                MockElement::visible().with_count(2),
            );
            driver.add_element(
                &Locator::role(Role::Button, "确认提交").exact(),
                MockElement::visible().on_click(MockEffect::SetUrl(done_url.clone())),
            );
            let root = TempDir::new().unwrap();
            let outcome = runner(&root, &driver)
                .run(&fallback_form_submit())
                .await
                .unwrap();
            assert!(outcome.verdict.ok, "{:#?}", outcome.verdict);
            let snapshot: Value = serde_json::from_str(
                &std::fs::read_to_string(outcome.evidence_dir.join("url_snapshots.json")).unwrap(),
            )
            .unwrap();
            assert_eq!(snapshot["url_after"], done_url);
            assert_eq!(
                driver
                    .history()
                    .iter()
                    .filter(|c| c.starts_with("click:role=button[name~\"下一步\"]"))
                    .count(),
                4
            );
        }
    }
}
