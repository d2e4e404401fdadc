//! Demo workflow: greets the wearer by name.

use relay::{RelayDevice, RelayError, Workflow};

pub struct HelloWorkflow;

#[async_trait::async_trait]
impl Workflow for HelloWorkflow {
    async fn run(&self, device: RelayDevice) {
        if let Err(e) = greet(&device).await {
            tracing::warn!(device_id = %device.id(), error = %e, "Hello workflow failed");
        }
        device.terminate().await;
    }
}

async fn greet(device: &RelayDevice) -> Result<(), RelayError> {
    device.vibrate().await?;
    let device_name = device.name().await?;
    device.say("What is your name?").await?;
    let user = device.listen(&[]).await?;

    tracing::info!(device_id = %device.id(), %user, "Greeting user");
    device
        .say(format!("Hello {user}! Your device name is {device_name}"))
        .await
}
