//! ONVIF PTZ actuator
//!
//! Absolute positioning over ONVIF PTZ SOAP with WS-Security UsernameToken
//! digest authentication. Positions use the generic normalized spaces
//! (pan/tilt -1..1, zoom 0..1).

use super::actuator::{Actuator, ActuatorError};
use super::types::{Axis, AxisRange, Capabilities, ConnectInfo, Position};
use async_trait::async_trait;
use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine;
use reqwest::{Client, Url};
use sha1::{Digest, Sha1};
use std::time::Duration;
use tokio::sync::Mutex;

const PTZ_SERVICE_PATH: &str = "/onvif/ptz_service";
const REQUEST_TIMEOUT: Duration = Duration::from_secs(10);

/// PTZ service calls issued by this actuator
#[derive(Debug, Clone, Copy, PartialEq)]
enum PtzOperation {
    GetStatus,
    AbsoluteMove(Position),
    Stop,
}

impl PtzOperation {
    fn name(&self) -> &'static str {
        match self {
            Self::GetStatus => "GetStatus",
            Self::AbsoluteMove(_) => "AbsoluteMove",
            Self::Stop => "Stop",
        }
    }

    /// `<s:Body>` content for `profile_token`
    fn body(&self, profile_token: &str) -> String {
        let token = format!("<tptz:ProfileToken>{profile_token}</tptz:ProfileToken>");
        match self {
            Self::GetStatus => format!("<tptz:GetStatus>{token}</tptz:GetStatus>"),
            Self::AbsoluteMove(p) => format!(
                "<tptz:AbsoluteMove>{token}<tptz:Position>\
                 <tt:PanTilt x=\"{:.4}\" y=\"{:.4}\"/><tt:Zoom x=\"{:.4}\"/>\
                 </tptz:Position></tptz:AbsoluteMove>",
                p.pan, p.tilt, p.zoom
            ),
            Self::Stop => format!(
                "<tptz:Stop>{token}<tptz:PanTilt>true</tptz:PanTilt>\
                 <tptz:Zoom>true</tptz:Zoom></tptz:Stop>"
            ),
        }
    }
}

/// UsernameToken with `Base64(SHA1(nonce + created + password))` digest
#[derive(Debug, Clone, PartialEq)]
struct UsernameToken {
    username: String,
    nonce: String,
    created: String,
    digest: String,
}

impl UsernameToken {
    fn new(username: &str, password: &str, nonce: [u8; 16], created: String) -> Self {
        let mut hasher = Sha1::new();
        hasher.update(nonce);
        hasher.update(created.as_bytes());
        hasher.update(password.as_bytes());

        Self {
            username: username.to_string(),
            nonce: BASE64.encode(nonce),
            digest: BASE64.encode(hasher.finalize()),
            created,
        }
    }

    /// Fresh nonce and timestamp; one per request
    fn generate(username: &str, password: &str) -> Self {
        let created = chrono::Utc::now().format("%Y-%m-%dT%H:%M:%SZ").to_string();
        Self::new(username, password, rand::random(), created)
    }

    fn to_header(&self) -> String {
        const WSSE: &str =
            "http://docs.oasis-open.org/wss/2004/01/oasis-200401-wss-wssecurity-secext-1.0.xsd";
        const WSU: &str =
            "http://docs.oasis-open.org/wss/2004/01/oasis-200401-wss-wssecurity-utility-1.0.xsd";
        const DIGEST: &str = "http://docs.oasis-open.org/wss/2004/01/oasis-200401-wss-username-token-profile-1.0#PasswordDigest";
        const BASE64_BINARY: &str = "http://docs.oasis-open.org/wss/2004/01/oasis-200401-wss-soap-message-security-1.0#Base64Binary";

        format!(
            "<s:Header><Security xmlns=\"{WSSE}\" s:mustUnderstand=\"true\"><UsernameToken>\
             <Username>{}</Username>\
             <Password Type=\"{DIGEST}\">{}</Password>\
             <Nonce EncodingType=\"{BASE64_BINARY}\">{}</Nonce>\
             <Created xmlns=\"{WSU}\">{}</Created>\
             </UsernameToken></Security></s:Header>",
            self.username, self.digest, self.nonce, self.created
        )
    }
}

fn envelope(header: &str, body: &str) -> String {
    format!(
        "<?xml version=\"1.0\" encoding=\"UTF-8\"?>\
         <s:Envelope xmlns:s=\"http://www.w3.org/2003/05/soap-envelope\" \
         xmlns:tptz=\"http://www.onvif.org/ver20/ptz/wsdl\" \
         xmlns:tt=\"http://www.onvif.org/ver10/schema\">\
         {header}<s:Body>{body}</s:Body></s:Envelope>"
    )
}

/// PTZ service URL on the same host as the device service endpoint
fn ptz_service_url(endpoint: &str) -> String {
    match Url::parse(endpoint) {
        Ok(mut url) => {
            url.set_path(PTZ_SERVICE_PATH);
            url.set_query(None);
            url.to_string()
        }
        Err(_) => format!("{}{}", endpoint.trim_end_matches('/'), PTZ_SERVICE_PATH),
    }
}

/// `host[:port]` of the endpoint, for the device label
fn endpoint_host(endpoint: &str) -> String {
    Url::parse(endpoint)
        .ok()
        .and_then(|url| {
            let host = url.host_str()?.to_string();
            Some(match url.port() {
                Some(port) => format!("{host}:{port}"),
                None => host,
            })
        })
        .unwrap_or_else(|| endpoint.to_string())
}

/// ONVIF PTZ actuator
pub struct OnvifActuator {
    service_url: String,
    label: String,
    username: String,
    password: String,
    profile_token: String,
    client: Client,
    /// Last position reported or applied; AbsoluteMove needs all axes
    last: Mutex<Position>,
}

impl OnvifActuator {
    /// `endpoint` is the device service URL, e.g. `http://192.168.x.x:2020/onvif/device_service`
    pub fn new(endpoint: &str, username: &str, password: &str, profile_token: &str) -> Self {
        Self {
            service_url: ptz_service_url(endpoint),
            label: format!("ONVIF {}", endpoint_host(endpoint)),
            username: username.to_string(),
            password: password.to_string(),
            profile_token: profile_token.to_string(),
            client: Client::builder()
                .timeout(REQUEST_TIMEOUT)
                .build()
                .unwrap_or_default(),
            last: Mutex::new(Position::default()),
        }
    }

    /// Issue one PTZ operation; returns the response body
    async fn call(&self, operation: PtzOperation) -> Result<String, ActuatorError> {
        let action = operation.name();
        let token = UsernameToken::generate(&self.username, &self.password);
        let request = envelope(&token.to_header(), &operation.body(&self.profile_token));

        tracing::debug!(url = %self.service_url, action, "Sending ONVIF PTZ request");

        let response = self
            .client
            .post(&self.service_url)
            .header("Content-Type", "application/soap+xml; charset=utf-8")
            .body(request)
            .send()
            .await
            .map_err(|e| ActuatorError::Io(format!("PTZ {action} request failed: {e}")))?;

        let status = response.status();
        let text = response.text().await.unwrap_or_default();
        if !status.is_success() {
            tracing::error!(status = %status, body = %text, action, "ONVIF PTZ request failed");
            return Err(ActuatorError::Io(format!(
                "ONVIF PTZ {action} failed with status {status}"
            )));
        }
        Ok(text)
    }

    async fn fetch_status(&self) -> Result<Position, ActuatorError> {
        let xml = self.call(PtzOperation::GetStatus).await?;
        parse_status_position(&xml)
            .ok_or_else(|| ActuatorError::Io("GetStatus response has no position".to_string()))
    }
}

/// Extract a numeric attribute from the first `<prefix:tag ...>` element
fn extract_attribute(xml: &str, tag: &str, attr: &str) -> Option<f64> {
    let start = [format!(":{} ", tag), format!("<{} ", tag)]
        .iter()
        .find_map(|pattern| xml.find(pattern.as_str()))?;
    let element = &xml[start..];
    let element = &element[..element.find('>')?];

    let key = format!("{}=", attr);
    let after = &element[element.find(key.as_str())? + key.len()..];
    let quote = after.chars().next().filter(|c| *c == '"' || *c == '\'')?;
    let value = &after[1..];
    value[..value.find(quote)?].trim().parse().ok()
}

/// Position from a GetStatus response
fn parse_status_position(xml: &str) -> Option<Position> {
    let section = xml
        .find("Position>")
        .map(|idx| &xml[idx..])
        .unwrap_or(xml);
    let pan = extract_attribute(section, "PanTilt", "x")?;
    let tilt = extract_attribute(section, "PanTilt", "y")?;
    let zoom = extract_attribute(section, "Zoom", "x").unwrap_or(0.0);
    Some(Position::new(pan, tilt, zoom))
}

#[async_trait]
impl Actuator for OnvifActuator {
    async fn connect(&self) -> Result<ConnectInfo, ActuatorError> {
        let position = self
            .fetch_status()
            .await
            .map_err(|e| ActuatorError::Unavailable(e.to_string()))?;
        *self.last.lock().await = position;

        Ok(ConnectInfo {
            label: self.label.clone(),
        })
    }

    async fn get_range(&self) -> Result<Capabilities, ActuatorError> {
        Ok(Capabilities::default()
            .with(Axis::Pan, AxisRange::new(-1.0, 1.0))
            .with(Axis::Tilt, AxisRange::new(-1.0, 1.0))
            .with(Axis::Zoom, AxisRange::new(0.0, 1.0)))
    }

    async fn get_position(&self) -> Result<Position, ActuatorError> {
        let position = self.fetch_status().await?;
        *self.last.lock().await = position;
        Ok(position)
    }

    async fn apply_target(&self, axis: Axis, value: f64) -> Result<(), ActuatorError> {
        let mut target = *self.last.lock().await;
        target.set(axis, value);

        tracing::info!(
            axis = %axis,
            pan = target.pan,
            tilt = target.tilt,
            zoom = target.zoom,
            "Executing ONVIF AbsoluteMove"
        );
        self.call(PtzOperation::AbsoluteMove(target)).await?;

        *self.last.lock().await = target;
        Ok(())
    }

    async fn release(&self) {
        if let Err(e) = self.call(PtzOperation::Stop).await {
            tracing::warn!(error = %e, "ONVIF PTZ stop on release failed");
        }
    }
}
