//! Deep-link modal scenario against the mock driver
//!
//! Runs the built-in `deep-link-modal` scenario without a browser and prints
//! the verdict. Evidence lands in a temporary directory.
//!
//! ```bash
//! cargo run -p sitecheck --example mock_deep_link
//! ```

use sitecheck::{
    catalog, HarnessConfig, Locator, MockDriver, MockEffect, MockElement, MockLauncher, Role,
    ScenarioRunner, SiteCheckResult, StaticProbe,
};

const BASE: &str = "https://site.test/";

#[tokio::main(flavor = "current_thread")]
async fn main() -> SiteCheckResult<()> {
    let modal = Locator::role(Role::Dialog, "介绍视频");
    let close = Locator::role(Role::Button, "关闭").exact().within(modal.clone());

    let driver = MockDriver::new();
    driver.add_element(&modal, MockElement::visible());
    driver.add_element(
        &close,
        MockElement::visible()
            .on_click(MockEffect::SetUrl(format!("{BASE}?page=about")))
            .on_click(MockEffect::Remove(modal.selector().describe())),
    );

    let root = tempfile::tempdir()?;
    let config = HarnessConfig::builder()
        .base_url(BASE)
        .evidence_root(root.path())
        .network_idle_ms(0)
        .build();

    let runner = ScenarioRunner::new(config, MockLauncher::new(driver), StaticProbe::new())?;
    let outcome = runner.run(&catalog::deep_link_modal()).await?;

    println!("{}", outcome.verdict.to_json_pretty()?);
    println!("evidence: {}", outcome.evidence_dir.display());
    Ok(())
}
