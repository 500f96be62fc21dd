use std::time::Duration;

use frejaeid_client::{
    FrejaClient,
    config::{ClientConfig, Settings},
    identity::IdentityMethod,
    request::AuthRequest,
    telemetry,
};

/// How long to keep polling before giving up on the user.
const MAX_POLLS: u32 = 90;
const POLL_INTERVAL: Duration = Duration::from_secs(2);

#[tokio::main]
async fn main() -> color_eyre::Result<()> {
    color_eyre::install()?;
    let _ = dotenvy::dotenv();
    telemetry::init_tracing();

    let settings = Settings::load()?;
    tracing::info!(environment = ?settings.environment, "starting demo authentication");

    let client = FrejaClient::new(ClientConfig::from_settings(&settings)?)?;

    let request =
        AuthRequest::new(IdentityMethod::Inferred).with_level(settings.assurance_level);
    let qr = client.auth_qr_code(None, &request).await?;
    println!("Scan with the Freja eID app: {}", qr.url);

    for _ in 0..MAX_POLLS {
        tokio::time::sleep(POLL_INTERVAL).await;
        let result = client.check_authentication(&qr.reference).await?;
        tracing::info!(status = ?result.status, "polled authentication");

        if result.status.is_terminal() {
            println!("Authentication finished: {:?}", result.status);
            if let Some(attributes) = result.requested_attributes {
                println!("Released attributes: {attributes}");
            }
            return Ok(());
        }
    }

    tracing::warn!("user did not respond in time, cancelling");
    client.cancel_authentication(&qr.reference).await?;
    println!("Authentication cancelled after timeout.");
    Ok(())
}
