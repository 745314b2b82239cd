use settle_browser::{ChromiumDriver, LaunchConfig};
use settle_engine::{
    EngineConfig, InteractionEngine, Locator, NetworkActivityTracker, PopupLocators, PopupSelector,
};
use std::sync::Arc;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let base_url = std::env::var("ERP_URL").unwrap_or_else(|_| "https://erp.example.com/fscmUI/".to_string());
    let username = std::env::var("ERP_USER")?;
    let password = std::env::var("ERP_PASSWORD")?;
    let invoice = std::env::var("ERP_INVOICE").unwrap_or_else(|_| "INV-12345".to_string());
    let supplier = std::env::var("ERP_SUPPLIER").unwrap_or_else(|_| "Acme Corp".to_string());

    let config = match std::env::var("SETTLE_CONFIG") {
        Ok(path) => EngineConfig::from_json(&std::fs::read_to_string(path)?)?,
        Err(_) => EngineConfig::patient().with_ajax_url_pattern("/fscmUI/"),
    };

    let driver = Arc::new(ChromiumDriver::launch(LaunchConfig::headed()).await?);
    let tracker = Arc::new(NetworkActivityTracker::from_config(&config.network)?);
    let listener = tracker.attach(driver.as_ref()).await?;
    let engine = InteractionEngine::new(Arc::clone(&driver), tracker, config)?;

    driver.goto(&base_url).await?;
    engine.settle().await;

    engine.type_and_settle(&Locator::id("username"), &username).await?;
    engine.type_and_settle(&Locator::id("password"), &password).await?;
    engine.click_and_settle(&Locator::id("LoginButton")).await?;

    engine.click_and_settle(&Locator::xpath("//a[text()='Invoices']")).await?;
    engine.type_and_settle(&Locator::id("invoiceNumberField"), &invoice).await?;
    engine.click_and_settle(&Locator::id("searchButton")).await?;
    engine.wait_visible(&Locator::id("searchResultsTable")).await?;
    println!("Invoice search for {} returned results", invoice);

    let supplier_lov = PopupLocators::new(
        Locator::css("div[id$='supplierLov::lovDialogId']"),
        Locator::css("input[id$='supplierLov::_afrLovInternalQueryId:value00']"),
        Locator::css("button[id$='supplierLov::_afrLovInternalQueryId::search']"),
        Locator::xpath("//table[contains(@summary,'Supplier')]//tr[td//text()={text}]"),
    )
    .with_trigger(Locator::css("a[id$='supplierLov::btn']"))
    .with_results_busy(vec![Locator::css(".AFBusyWait")])
    .with_confirm_button(Locator::css("button[id$='supplierLov::lovDialogId::ok']"));

    let session = PopupSelector::new(&engine, supplier_lov)
        .select_value(&supplier)
        .await?;
    println!("Selected supplier {} (popup found in {})", supplier, session.frame);

    listener.shutdown().await?;
    driver.close().await?;
    Ok(())
}
