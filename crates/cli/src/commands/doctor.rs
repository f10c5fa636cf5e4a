//! Doctor — check the configured model endpoint.

use deskclaw_config::AppConfig;
use deskclaw_core::transport::ModelTransport;
use deskclaw_transport::OpenAiCompatTransport;
use std::path::Path;
use std::time::Duration;

pub async fn run(config_path: &Path) -> anyhow::Result<()> {
    let config = AppConfig::load_or_default(config_path)?;
    println!("Config: {config:?}");

    let transport = OpenAiCompatTransport::new(
        "openai_compat",
        &config.model.api_base,
        config.model.api_key.clone().unwrap_or_default(),
        Duration::from_secs(config.model.request_timeout_secs),
    );

    print!("Endpoint {} ... ", config.model.api_base);
    match transport.health_check().await {
        Ok(true) => println!("reachable"),
        Ok(false) => println!("unreachable (non-success status)"),
        Err(e) => println!("error: {e}"),
    }

    match transport.list_models().await {
        Ok(models) if !models.is_empty() => {
            println!("Models available: {}", models.len());
            for model in models.iter().take(10) {
                let marker = if *model == config.model.model { " (configured)" } else { "" };
                println!("  - {model}{marker}");
            }
        }
        Ok(_) => println!("No model list returned."),
        Err(e) => println!("Model list failed: {e}"),
    }

    Ok(())
}
