use std::{env, str::FromStr, sync::Arc, time::Duration};

use chrono::Local;
use crpt_api::{
    CrptApi, CrptApiConfig, SubmitOptions,
    model::{Description, Document, DocumentRequest, DocumentStatus, DocumentType, Product},
};
use http::{HeaderMap, HeaderValue, header::AUTHORIZATION};
use tracing::{error, info, warn};

// --- Configuration Environment Variable Names ---
const ENV_CRPT_HOST: &str = "CRPT_HOST"; // Optional, defaults to the production host
const ENV_CRPT_PORT: &str = "CRPT_PORT"; // Optional
const ENV_CRPT_TOKEN: &str = "CRPT_TOKEN"; // Optional bearer token
const ENV_CRPT_SIGNATURE: &str = "CRPT_SIGNATURE";
const ENV_CRPT_INN: &str = "CRPT_INN";
const ENV_WINDOW_MS: &str = "CRPT_WINDOW_MS";
const ENV_REQUEST_LIMIT: &str = "CRPT_REQUEST_LIMIT";
const ENV_DOCUMENTS: &str = "CRPT_DOCUMENTS";

fn get_env_var<T: FromStr + std::fmt::Debug>(var_name: &str, default_value: T) -> T
where
    <T as FromStr>::Err: std::fmt::Debug,
{
    env::var(var_name)
        .ok()
        .and_then(|val_str| match val_str.parse::<T>() {
            Ok(val) => Some(val),
            Err(e) => {
                warn!(
                    "Failed to parse env var '{}' (value: '{}'). Error: {:?}. Using default: {:?}",
                    var_name, val_str, e, default_value
                );
                None
            }
        })
        .unwrap_or(default_value)
}

fn document(inn: &str, reg_number: String) -> Result<Document, crpt_api::Error> {
    let today = Local::now().date_naive();
    let product = Product::builder()
        .owner_inn(inn)
        .producer_inn(inn)
        .production_date(today)
        .tnved_code("6401100000")
        .build()?;

    Ok(Document::builder()
        .description(Description::new(inn)?)
        .doc_status(DocumentStatus::New)
        .doc_type(DocumentType::LpIntroduceGoods)
        .owner_inn(inn)
        .participant_inn(inn)
        .producer_inn(inn)
        .production_date(today)
        .production_type("OWN_PRODUCTION")
        .products(vec![product])
        .reg_date(today.format("%Y-%m-%d").to_string())
        .reg_number(reg_number)
        .build()?)
}

#[tokio::main]
async fn main() -> Result<(), crpt_api::Error> {
    let default_log_filter = "info,crpt_api=debug";
    tracing_subscriber::fmt()
        .with_env_filter(env::var("RUST_LOG").unwrap_or_else(|_| default_log_filter.to_string()))
        .init();

    let signature = env::var(ENV_CRPT_SIGNATURE).map_err(|_| {
        format!(
            "Required environment variable '{}' not set",
            ENV_CRPT_SIGNATURE
        )
    })?;
    let inn = env::var(ENV_CRPT_INN).unwrap_or_else(|_| "7707083893".to_string());

    let mut config = CrptApiConfig::builder()
        .window(Duration::from_millis(get_env_var(ENV_WINDOW_MS, 1000)))
        .request_limit(get_env_var(ENV_REQUEST_LIMIT, 10))
        .call_deadline(Duration::from_secs(60))
        .build();
    if let Ok(host) = env::var(ENV_CRPT_HOST) {
        config.host = host;
        config.port = get_env_var(ENV_CRPT_PORT, config.port);
    }
    if let Ok(token) = env::var(ENV_CRPT_TOKEN) {
        let value = HeaderValue::from_str(&format!("Bearer {token}"))?;
        config.header_provider = Some(Arc::new(move || {
            let mut headers = HeaderMap::new();
            headers.insert(AUTHORIZATION, value.clone());
            headers
        }));
    }
    info!(?config, "Starting submitter");

    let api = CrptApi::with_config(config)?;
    let count: usize = get_env_var(ENV_DOCUMENTS, 3);

    let mut handles = Vec::with_capacity(count);
    for i in 0..count {
        let api = api.clone();
        let request = DocumentRequest::new(document(&inn, format!("DEMO-{i}"))?, signature.clone());
        handles.push(tokio::spawn(async move {
            api.submit_with::<serde_json::Value, _>(
                request,
                SubmitOptions::default(),
                async {
                    let _ = tokio::signal::ctrl_c().await;
                },
            )
            .await
        }));
    }

    for (i, handle) in handles.into_iter().enumerate() {
        match handle.await? {
            Ok(created) => info!(document = i, %created, "Document accepted"),
            Err(e) => error!(document = i, error = %e, "Document not accepted"),
        }
    }

    let outcome = api.shutdown(Duration::from_secs(5)).await;
    info!(?outcome, "Submitter stopped");
    Ok(())
}
