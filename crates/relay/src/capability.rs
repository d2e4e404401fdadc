//! Device capabilities.
//!
//! Each method builds one command, runs it through the session's
//! send-and-wait path and projects the reply field it cares about. A reply
//! that succeeds but omits the field yields the field's default value.

use crate::bridge::protocol::{Command, DeviceInfoQuery, LedArgs, LedEffect, Response};
use crate::error::RelayError;
use crate::session::RelayDevice;

impl RelayDevice {
    async fn device_info(&self, query: DeviceInfoQuery) -> Result<Response, RelayError> {
        self.request(Command::device_info(query)).await
    }

    pub async fn battery(&self) -> Result<i64, RelayError> {
        let res = self.device_info(DeviceInfoQuery::Battery).await?;
        Ok(res.battery.unwrap_or_default())
    }

    pub async fn name(&self) -> Result<String, RelayError> {
        let res = self.device_info(DeviceInfoQuery::Name).await?;
        Ok(res.name.unwrap_or_default())
    }

    /// Last known GPS position as `"lat,long"`.
    pub async fn lat_long(&self) -> Result<String, RelayError> {
        let res = self.device_info(DeviceInfoQuery::LatLong).await?;
        Ok(res.lat_long.unwrap_or_default())
    }

    pub async fn indoor_location(&self) -> Result<String, RelayError> {
        let res = self.device_info(DeviceInfoQuery::IndoorLocation).await?;
        Ok(res.indoor_location.unwrap_or_default())
    }

    /// Read a workflow variable.
    pub async fn get_var(&self, name: impl Into<String>) -> Result<String, RelayError> {
        let res = self.request(Command::GetVar { name: name.into() }).await?;
        Ok(res.value.unwrap_or_default())
    }

    /// Payload the workflow was triggered with.
    pub async fn spillover(&self) -> Result<String, RelayError> {
        self.get_var("spillover").await
    }

    pub async fn set_device_info(
        &self,
        field: impl Into<String>,
        value: impl Into<String>,
    ) -> Result<(), RelayError> {
        self.request(Command::SetDeviceInfo {
            field: field.into(),
            value: value.into(),
        })
        .await?;
        Ok(())
    }

    pub async fn set_channel(&self, name: impl Into<String>) -> Result<(), RelayError> {
        self.set_device_info("channel", name).await
    }

    /// Speak `text` on the device.
    pub async fn say(&self, text: impl Into<String>) -> Result<(), RelayError> {
        let lang = self.config().language.clone();
        self.request(Command::say(text, lang)).await?;
        Ok(())
    }

    /// Listen for speech and return the transcription.
    ///
    /// `phrases` optionally narrows recognition to a candidate list.
    pub async fn listen(&self, phrases: &[String]) -> Result<String, RelayError> {
        let config = self.config();
        let res = self
            .request(Command::Listen {
                transcribe: true,
                phrases: phrases.to_vec(),
                timeout: config.listen_timeout.as_secs(),
                alt_lang: config.language.clone(),
            })
            .await?;
        Ok(res.text.unwrap_or_default())
    }

    pub async fn vibrate(&self) -> Result<(), RelayError> {
        self.request(Command::vibrate()).await?;
        Ok(())
    }

    pub async fn set_led(&self, effect: LedEffect, args: LedArgs) -> Result<(), RelayError> {
        self.request(Command::SetLed { effect, args }).await?;
        Ok(())
    }

    /// Solid white ring.
    pub async fn led_static(&self) -> Result<(), RelayError> {
        self.set_led(LedEffect::Static, LedArgs::ring("FFFFFF"))
            .await
    }

    pub async fn led_off(&self) -> Result<(), RelayError> {
        self.set_led(LedEffect::Off, LedArgs::default()).await
    }
}

#[cfg(test)]
mod tests {
    use std::future::Future;
    use std::time::Duration;

    use serde_json::{Value, json};
    use tokio::sync::mpsc;
    use tokio_util::bytes::Bytes;
    use tokio_util::sync::CancellationToken;

    use super::*;
    use crate::config::SessionConfig;

    /// Far side of the channel pair, answering one request at a time.
    struct Peer {
        from_engine: mpsc::Receiver<Bytes>,
        to_engine: mpsc::Sender<Bytes>,
    }

    impl Peer {
        /// Reply to the next request with `fields` merged into a success frame.
        async fn answer(&mut self, fields: Value) -> Value {
            let bytes = self.from_engine.recv().await.unwrap();
            let req: Value = serde_json::from_slice(&bytes).unwrap();
            let mut reply = json!({"_id": req["_id"], "_type": "resp", "error": null});
            if let (Some(reply), Some(fields)) = (reply.as_object_mut(), fields.as_object()) {
                reply.extend(fields.clone());
            }
            self.to_engine
                .send(Bytes::from(serde_json::to_vec(&reply).unwrap()))
                .await
                .unwrap();
            req
        }

        /// Run a capability call against a single scripted reply.
        async fn call<T, F>(&mut self, fut: F, fields: Value) -> (Value, Result<T, RelayError>)
        where
            F: Future<Output = Result<T, RelayError>> + Send + 'static,
            T: Send + 'static,
        {
            let handle = tokio::spawn(fut);
            let req = self.answer(fields).await;
            (req, handle.await.unwrap())
        }
    }

    async fn connected() -> (RelayDevice, Peer) {
        let (out_tx, out_rx) = mpsc::channel(8);
        let (in_tx, in_rx) = mpsc::channel(8);
        let config = SessionConfig::new()
            .with_response_timeout(Duration::from_secs(60))
            .with_listen_timeout(Duration::from_secs(30))
            .with_language("en-GB");
        let connecting = tokio::spawn(RelayDevice::connect_with_config(
            out_tx,
            in_rx,
            CancellationToken::new(),
            config,
        ));
        let mut peer = Peer {
            from_engine: out_rx,
            to_engine: in_tx,
        };
        peer.answer(json!({"id": "device-42"})).await;
        (connecting.await.unwrap().unwrap(), peer)
    }

    #[tokio::test]
    async fn battery_returns_level() {
        let (device, mut peer) = connected().await;
        let d = device.clone();
        let (req, result) = peer
            .call(async move { d.battery().await }, json!({"battery": 87}))
            .await;

        assert_eq!(req["_type"], "wf_api_get_device_info_request");
        assert_eq!(req["query"], "battery");
        assert_eq!(result.unwrap(), 87);
    }

    #[tokio::test]
    async fn device_info_projections() {
        let (device, mut peer) = connected().await;

        let d = device.clone();
        let (req, name) = peer
            .call(async move { d.name().await }, json!({"name": "front-desk"}))
            .await;
        assert_eq!(req["query"], "name");
        assert_eq!(name.unwrap(), "front-desk");

        let d = device.clone();
        let (req, pos) = peer
            .call(
                async move { d.lat_long().await },
                json!({"latlong": "37.77,-122.41"}),
            )
            .await;
        assert_eq!(req["query"], "latlong");
        assert_eq!(pos.unwrap(), "37.77,-122.41");

        let d = device.clone();
        let (req, loc) = peer
            .call(
                async move { d.indoor_location().await },
                json!({"indoor_location": "lobby"}),
            )
            .await;
        assert_eq!(req["query"], "indoor_location");
        assert_eq!(loc.unwrap(), "lobby");
    }

    #[tokio::test]
    async fn missing_field_defaults() {
        let (device, mut peer) = connected().await;
        let d = device.clone();
        let (_, result) = peer.call(async move { d.battery().await }, json!({})).await;
        assert_eq!(result.unwrap(), 0);
    }

    #[tokio::test]
    async fn spillover_reads_variable() {
        let (device, mut peer) = connected().await;
        let d = device.clone();
        let (req, result) = peer
            .call(async move { d.spillover().await }, json!({"value": "room 12"}))
            .await;

        assert_eq!(req["_type"], "wf_api_get_var_request");
        assert_eq!(req["name"], "spillover");
        assert_eq!(result.unwrap(), "room 12");
    }

    #[tokio::test]
    async fn set_channel_sets_device_info() {
        let (device, mut peer) = connected().await;
        let d = device.clone();
        let (req, result) = peer
            .call(async move { d.set_channel("ops").await }, json!({}))
            .await;

        assert!(result.is_ok());
        assert_eq!(req["_type"], "wf_api_set_device_info_request");
        assert_eq!(req["field"], "channel");
        assert_eq!(req["value"], "ops");
    }

    #[tokio::test]
    async fn say_uses_configured_language() {
        let (device, mut peer) = connected().await;
        let d = device.clone();
        let (req, result) = peer
            .call(async move { d.say("What is your name?").await }, json!({}))
            .await;

        assert!(result.is_ok());
        assert_eq!(req["_type"], "wf_api_say_request");
        assert_eq!(req["text"], "What is your name?");
        assert_eq!(req["lang"], "en-GB");
    }

    #[tokio::test]
    async fn listen_returns_transcription() {
        let (device, mut peer) = connected().await;
        let d = device.clone();
        let phrases = vec!["yes".to_string(), "no".to_string()];
        let (req, result) = peer
            .call(
                async move { d.listen(&phrases).await },
                json!({"text": "yes"}),
            )
            .await;

        assert_eq!(result.unwrap(), "yes");
        assert_eq!(req["_type"], "wf_api_listen_request");
        assert_eq!(req["transcribe"], true);
        assert_eq!(req["phrases"], json!(["yes", "no"]));
        assert_eq!(req["timeout"], 30);
        assert_eq!(req["alt_lang"], "en-GB");
    }

    #[tokio::test]
    async fn vibrate_and_leds() {
        let (device, mut peer) = connected().await;

        let d = device.clone();
        let (req, result) = peer.call(async move { d.vibrate().await }, json!({})).await;
        assert!(result.is_ok());
        assert_eq!(req["_type"], "wf_api_vibrate_request");

        let d = device.clone();
        let (req, result) = peer
            .call(async move { d.led_static().await }, json!({}))
            .await;
        assert!(result.is_ok());
        assert_eq!(req["_type"], "wf_api_set_led_request");
        assert_eq!(req["effect"], "static");
        assert_eq!(req["args"]["colors"]["ring"], "FFFFFF");

        let d = device.clone();
        let (req, result) = peer.call(async move { d.led_off().await }, json!({})).await;
        assert!(result.is_ok());
        assert_eq!(req["effect"], "off");
    }

    #[tokio::test]
    async fn remote_error_passes_through_unchanged() {
        let (device, mut peer) = connected().await;
        let d = device.clone();
        let (_, result) = peer
            .call(
                async move { d.name().await },
                json!({"error": "device asleep", "name": "ignored"}),
            )
            .await;

        assert!(matches!(result, Err(RelayError::Remote(ref m)) if m == "device asleep"));
    }

    #[tokio::test]
    async fn calls_after_terminate_fail_without_io() {
        let (device, mut peer) = connected().await;
        let d = device.clone();
        let (req, ()) = {
            let handle = tokio::spawn(async move { d.terminate().await });
            let req = peer.answer(json!({})).await;
            (req, handle.await.unwrap())
        };
        assert_eq!(req["_type"], "wf_api_terminate_request");

        assert!(matches!(
            device.battery().await,
            Err(RelayError::SessionTerminated)
        ));
        assert!(matches!(
            device.say("hi").await,
            Err(RelayError::SessionTerminated)
        ));
        assert!(peer.from_engine.try_recv().is_err());
    }
}
