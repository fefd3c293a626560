use anyhow::{Context, Result};
use chrono::Utc;
use cko_schemas::{format_minor_units, new_order_id, CheckoutDraft, OrderRecord};
use url::Url;

pub async fn run(order_path: &str, config_paths: &[String]) -> Result<()> {
    let settings = super::load_settings(config_paths)?;
    let api = super::http_api(&settings)?;
    let cache = super::open_cache()?;

    let mut draft: CheckoutDraft = super::read_json_file(order_path)?;
    let now_ms = Utc::now().timestamp_millis();
    if draft.order_id.trim().is_empty() {
        draft.order_id = new_order_id(now_ms);
    }
    let record = OrderRecord::prepare(draft, now_ms)?;

    let return_base = Url::parse(&settings.gateway.return_base_url)
        .with_context(|| format!("gateway.return_base_url '{}'", settings.gateway.return_base_url))?;

    let redirect = cko_runtime::submit_checkout(&api, &cache, &record, &return_base).await?;

    println!("order_id={}", redirect.order_id);
    println!("amount={}", format_minor_units(record.amount));
    println!("redirect_url={}", redirect.url);
    Ok(())
}
