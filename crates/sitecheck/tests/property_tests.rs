//! Property-based tests for sitecheck.
//!
//! Uses proptest to check the harness invariants for arbitrary inputs:
//! verdict AND rule, observer counts, artifact re-reads and storage seeding.

#![allow(clippy::expect_used, clippy::unwrap_used)]

use proptest::prelude::*;
use serde_json::Value;
use sitecheck::assertion::query_params;
use sitecheck::prelude::*;
use sitecheck::{ConsoleLevel, DiagnosticObserver, EvidenceSession};
use std::collections::BTreeMap;
use std::time::Duration;
use tempfile::TempDir;

fn level() -> impl Strategy<Value = ConsoleLevel> {
    prop_oneof![
        Just(ConsoleLevel::Error),
        Just(ConsoleLevel::Warning),
        Just(ConsoleLevel::Info),
        Just(ConsoleLevel::Log),
        Just(ConsoleLevel::Debug),
    ]
}

// === Verdict Property Tests ===

proptest! {
    /// ok iff every required check passed and the console stayed clean.
    #[test]
    fn prop_verdict_is_and_of_required(
        outcomes in prop::collection::vec((any::<bool>(), any::<bool>()), 0..12),
        console_errors in 0usize..3
    ) {
        let mut set = AssertionSet::new();
        for (i, (ok, warning)) in outcomes.iter().enumerate() {
            let check = if *warning {
                Check::warning_only(format!("c{i}"), *ok, Value::Null)
            } else {
                Check::required(format!("c{i}"), *ok, Value::Null)
            };
            set.record(check);
        }
        let mut diagnostics = sitecheck::DiagnosticSummary::default();
        diagnostics.console.error_count = console_errors;

        let verdict = Verdict::compute("s", "ID", "https://site.test/", set, diagnostics);
        let expected = console_errors == 0
            && outcomes.iter().all(|(ok, warning)| *ok || *warning);
        prop_assert_eq!(verdict.ok, expected);
        prop_assert_eq!(verdict.exit_code() == EXIT_OK, expected);
        prop_assert_eq!(verdict.checks.len(), outcomes.len() + 1);
    }
}

// === Observer Property Tests ===

proptest! {
    /// Counts equal the retained entries; samples are bounded prefixes.
    #[test]
    fn prop_observer_counts_and_samples(
        messages in prop::collection::vec((level(), "[a-z ]{0,12}"), 0..40),
        limit in 0usize..15
    ) {
        let observer = DiagnosticObserver::new();
        for (level, text) in &messages {
            observer.record_console(*level, text.clone());
        }
        let errors: Vec<String> = messages
            .iter()
            .filter(|(l, _)| *l == ConsoleLevel::Error)
            .map(|(_, t)| t.clone())
            .collect();
        let warnings = messages.iter().filter(|(l, _)| *l == ConsoleLevel::Warning).count();

        let summary = observer.summary(limit);
        prop_assert_eq!(summary.console.error_count, errors.len());
        prop_assert_eq!(summary.console.warning_count, warnings);
        prop_assert!(summary.console.errors_sample.len() <= limit);
        prop_assert_eq!(
            &summary.console.errors_sample[..],
            &errors[..errors.len().min(limit)]
        );
        prop_assert_eq!(observer.len(), errors.len() + warnings);
    }
}

// === Evidence Property Tests ===

proptest! {
    #![proptest_config(ProptestConfig::with_cases(32))]

    /// Re-reading an artifact yields the last value written.
    #[test]
    fn prop_json_artifact_rereads_last_write(
        writes in prop::collection::vec(
            prop::collection::btree_map("[a-z]{1,6}", "[a-z0-9 一-龥]{0,10}", 0..5),
            1..4
        )
    ) {
        let root = TempDir::new().unwrap();
        let mut session = EvidenceSession::open_now(root.path()).unwrap();
        for doc in &writes {
            session.save_json("snapshot.json", doc).unwrap();
        }
        let back: BTreeMap<String, String> = session.read_json("snapshot.json").unwrap();
        prop_assert_eq!(&back, writes.last().unwrap());
        prop_assert_eq!(session.artifacts().len(), 1);
    }
}

// === Seeding Property Tests ===

proptest! {
    #![proptest_config(ProptestConfig::with_cases(32))]

    /// Seeding then reading storage yields the seed payload.
    #[test]
    fn prop_seed_then_read(
        items in prop::collection::btree_map("[a-z_]{1,10}", "[ -~]{0,20}", 0..6),
        session_area in any::<bool>()
    ) {
        let area = if session_area { StorageArea::Session } else { StorageArea::Local };
        let mut seed = SeedPayload::new();
        for (k, v) in &items {
            seed = seed.with_item(area, k.clone(), v.clone());
        }

        let rt = tokio::runtime::Builder::new_current_thread()
            .enable_time()
            .build()
            .unwrap();
        let read = rt.block_on(async {
            let mut driver = MockDriver::new();
            driver.attach_observer(DiagnosticObserver::new()).await.unwrap();
            driver.install_seed(&seed).await.unwrap();
            driver
                .navigate("https://site.test/", LoadState::NetworkIdle, Duration::from_secs(1))
                .await
                .unwrap();
            let mut read = BTreeMap::new();
            for key in items.keys() {
                read.insert(key.clone(), driver.read_storage(area, key).await.unwrap().unwrap());
            }
            read
        });
        prop_assert_eq!(read, items);
    }
}

// === URL Property Tests ===

proptest! {
    /// Relative targets land under the base; absolute targets pass through.
    #[test]
    fn prop_resolve_url(
        host in "[a-z]{1,8}",
        path in "(/[a-z]{1,5}){0,2}/?",
        target in "[a-z?=&]{0,12}"
    ) {
        let base = format!("https://{host}.test{path}");
        let resolved = sitecheck::resolve_url(&base, &target).unwrap();
        let prefix = format!("{}/", base.trim_end_matches('/'));
        prop_assert!(resolved.starts_with(&prefix), "{} !~ {}", resolved, prefix);

        let absolute = format!("https://other.test/{target}");
        prop_assert_eq!(sitecheck::resolve_url(&base, &absolute).unwrap(), absolute);
    }

    /// Query parameters written in order are read back in order.
    #[test]
    fn prop_query_params_read_back(
        pairs in prop::collection::vec(("[a-z]{1,6}", "[a-z0-9_-]{0,6}"), 0..5)
    ) {
        let query: Vec<String> = pairs.iter().map(|(k, v)| format!("{k}={v}")).collect();
        let url = format!("https://site.test/?{}#top", query.join("&"));
        prop_assert_eq!(query_params(&url), pairs);
    }

    /// Values survive percent-encoding on the way into a URL.
    #[test]
    fn prop_query_params_percent_decoded(value in "[a-z 关于页面&=]{1,8}") {
        let url = sitecheck::resolve_url("https://site.test/app/", "").unwrap();
        let mut url = url::Url::parse(&url).unwrap();
        url.query_pairs_mut().append_pair("page", &value);
        prop_assert_eq!(
            query_params(url.as_str()),
            vec![("page".to_string(), value)]
        );
    }
}
