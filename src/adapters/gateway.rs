//! WiFi + MQTT transmission gateway adapter.
//!
//! Implements [`GatewayPort`]: bring up the station link, open an MQTT
//! session with the broker, publish one payload, tear everything down.
//! A wake cycle uses the link for a few seconds at most, so there is no
//! reconnect loop here; retries belong to the cycle's
//! [`RetryPolicy`](crate::retry::RetryPolicy).
//!
//! ## cfg gating
//!
//! - **`target_os = "espidf"`**: `esp_idf_svc::wifi` STA driver and
//!   `esp_idf_svc::mqtt` client (TLS via the certificate bundle, optional
//!   mutual-TLS client certificate).
//! - **all other targets**: simulation stubs for host-side runs.

use core::fmt;
use log::{error, info, warn};

use crate::adapters::device_id;
use crate::app::ports::{GatewayPort, NetworkIdentity};
use crate::error::CommsError;

#[cfg(target_os = "espidf")]
use std::sync::Arc;
#[cfg(target_os = "espidf")]
use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};

#[cfg(target_os = "espidf")]
use esp_idf_svc::hal::delay::FreeRtos;
#[cfg(target_os = "espidf")]
use esp_idf_svc::mqtt::client::{EspMqttClient, EventPayload, MqttClientConfiguration, QoS};
#[cfg(target_os = "espidf")]
use esp_idf_svc::tls::X509;
#[cfg(target_os = "espidf")]
use esp_idf_svc::wifi::{AuthMethod, BlockingWifi, ClientConfiguration, Configuration, EspWifi};

/// Broker must accept the session within this window.
#[cfg(target_os = "espidf")]
const MQTT_CONNECT_TIMEOUT_MS: u32 = 10_000;
/// Broker must acknowledge a QoS 1 publish within this window.
#[cfg(target_os = "espidf")]
const MQTT_ACK_TIMEOUT_MS: u32 = 5_000;
#[cfg(target_os = "espidf")]
const POLL_INTERVAL_MS: u32 = 50;

// ───────────────────────────────────────────────────────────────
// Credentials
// ───────────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CredentialError {
    InvalidSsid,
    InvalidPassword,
    InvalidPem,
}

impl fmt::Display for CredentialError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::InvalidSsid => write!(f, "SSID invalid (must be 1-32 printable ASCII bytes)"),
            Self::InvalidPassword => write!(f, "password invalid (must be 8-64 bytes for WPA2, or empty for open)"),
            Self::InvalidPem => write!(f, "client certificate or key is not PEM"),
        }
    }
}

fn is_printable_ascii(s: &str) -> bool {
    s.bytes().all(|b| (0x20..=0x7E).contains(&b))
}

fn validate_ssid(ssid: &str) -> Result<(), CredentialError> {
    if ssid.is_empty() || ssid.len() > 32 || !is_printable_ascii(ssid) {
        return Err(CredentialError::InvalidSsid);
    }
    Ok(())
}

fn validate_password(password: &str) -> Result<(), CredentialError> {
    if password.is_empty() {
        return Ok(());
    }
    if password.len() < 8 || password.len() > 64 {
        return Err(CredentialError::InvalidPassword);
    }
    Ok(())
}

/// NUL-terminate a PEM blob for the TLS layer.
fn pem_bytes(pem: &str) -> Result<Vec<u8>, CredentialError> {
    let trimmed = pem.trim_end_matches('\0');
    if !trimmed.starts_with("-----BEGIN ") {
        return Err(CredentialError::InvalidPem);
    }
    let mut bytes = trimmed.as_bytes().to_vec();
    bytes.push(0);
    Ok(bytes)
}

/// Link and broker secrets, loaded from NVS at boot.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GatewayCredentials {
    ssid: heapless::String<32>,
    password: heapless::String<64>,
    /// NUL-terminated PEM client certificate and private key.
    client_tls: Option<(Vec<u8>, Vec<u8>)>,
}

impl GatewayCredentials {
    pub fn new(ssid: &str, password: &str) -> Result<Self, CredentialError> {
        validate_ssid(ssid)?;
        validate_password(password)?;
        let mut s = heapless::String::new();
        s.push_str(ssid).map_err(|_| CredentialError::InvalidSsid)?;
        let mut p = heapless::String::new();
        p.push_str(password)
            .map_err(|_| CredentialError::InvalidPassword)?;
        Ok(Self {
            ssid: s,
            password: p,
            client_tls: None,
        })
    }

    /// Authenticate to the broker with mutual TLS.
    pub fn with_client_tls(mut self, cert_pem: &str, key_pem: &str) -> Result<Self, CredentialError> {
        self.client_tls = Some((pem_bytes(cert_pem)?, pem_bytes(key_pem)?));
        Ok(self)
    }

    pub fn ssid(&self) -> &str {
        &self.ssid
    }

    pub fn has_client_tls(&self) -> bool {
        self.client_tls.is_some()
    }
}

/// Resolve the MQTT client id: configured, or derived from the factory MAC.
pub fn resolve_client_id(identity: &NetworkIdentity) -> heapless::String<32> {
    if identity.client_id.is_empty() {
        let mut id = heapless::String::new();
        // Hostname is at most 13 chars.
        let _ = id.push_str(&device_id::hostname(&device_id::read_mac()));
        id
    } else {
        identity.client_id.clone()
    }
}

// ───────────────────────────────────────────────────────────────
// Link state
// ───────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LinkState {
    Down,
    Connected,
}

/// State shared with the MQTT event callback.
#[cfg(target_os = "espidf")]
#[derive(Default)]
struct MqttShared {
    connected: AtomicBool,
    last_published: AtomicU32,
}

// ───────────────────────────────────────────────────────────────
// Gateway adapter
// ───────────────────────────────────────────────────────────────

pub struct MqttGateway {
    credentials: Option<GatewayCredentials>,
    state: LinkState,
    topic_hint: heapless::String<64>,
    #[cfg(target_os = "espidf")]
    wifi: BlockingWifi<EspWifi<'static>>,
    #[cfg(target_os = "espidf")]
    client: Option<EspMqttClient<'static>>,
    #[cfg(target_os = "espidf")]
    shared: Arc<MqttShared>,
    /// Simulation: counts platform_connect() calls for deterministic failures.
    #[cfg(not(target_os = "espidf"))]
    sim_connect_counter: u32,
    /// Simulation: every confirmed publish as (topic, payload).
    #[cfg(not(target_os = "espidf"))]
    published: Vec<(String, Vec<u8>)>,
}

impl MqttGateway {
    #[cfg(target_os = "espidf")]
    pub fn new(wifi: BlockingWifi<EspWifi<'static>>, credentials: Option<GatewayCredentials>) -> Self {
        Self {
            credentials,
            state: LinkState::Down,
            topic_hint: heapless::String::new(),
            wifi,
            client: None,
            shared: Arc::new(MqttShared::default()),
        }
    }

    #[cfg(not(target_os = "espidf"))]
    pub fn new(credentials: Option<GatewayCredentials>) -> Self {
        Self {
            credentials,
            state: LinkState::Down,
            topic_hint: heapless::String::new(),
            sim_connect_counter: 0,
            published: Vec::new(),
        }
    }

    pub fn state(&self) -> LinkState {
        self.state
    }

    /// Simulation: payloads the broker acknowledged.
    #[cfg(not(target_os = "espidf"))]
    pub fn published(&self) -> &[(String, Vec<u8>)] {
        &self.published
    }

    // ── Platform-specific ─────────────────────────────────────

    #[cfg(target_os = "espidf")]
    fn platform_connect(
        &mut self,
        creds: &GatewayCredentials,
        identity: &NetworkIdentity,
        client_id: &str,
    ) -> Result<(), CommsError> {
        if !self.wifi.is_connected().unwrap_or(false) {
            let auth_method = if creds.password.is_empty() {
                AuthMethod::None
            } else {
                AuthMethod::WPA2Personal
            };
            let config = Configuration::Client(ClientConfiguration {
                ssid: creds
                    .ssid
                    .as_str()
                    .try_into()
                    .map_err(|_| CommsError::ConnectFault)?,
                password: creds
                    .password
                    .as_str()
                    .try_into()
                    .map_err(|_| CommsError::ConnectFault)?,
                auth_method,
                ..Default::default()
            });
            self.wifi.set_configuration(&config).map_err(|e| {
                error!("Gateway: WiFi config rejected: {}", e);
                CommsError::ConnectFault
            })?;
            if !self.wifi.is_started().unwrap_or(false) {
                self.wifi.start().map_err(|e| {
                    error!("Gateway: WiFi start failed: {}", e);
                    CommsError::ConnectFault
                })?;
            }
            self.wifi.connect().map_err(|e| {
                warn!("Gateway: WiFi association failed: {}", e);
                CommsError::ConnectFault
            })?;
            self.wifi.wait_netif_up().map_err(|e| {
                warn!("Gateway: no IP lease: {}", e);
                CommsError::ConnectFault
            })?;
            info!("Gateway: WiFi up on '{}'", creds.ssid);
        }

        self.shared.connected.store(false, Ordering::Release);
        let (cert, key) = match &creds.client_tls {
            Some((cert, key)) => (Some(X509::pem_until_nul(cert)), Some(X509::pem_until_nul(key))),
            None => (None, None),
        };
        let conf = MqttClientConfiguration {
            client_id: Some(client_id),
            crt_bundle_attach: Some(esp_idf_svc::sys::esp_crt_bundle_attach),
            client_certificate: cert,
            private_key: key,
            ..Default::default()
        };
        let shared = self.shared.clone();
        let client = EspMqttClient::new_cb(&identity.broker_url, &conf, move |event| {
            match event.payload() {
                EventPayload::Connected(_) => shared.connected.store(true, Ordering::Release),
                EventPayload::Disconnected => shared.connected.store(false, Ordering::Release),
                EventPayload::Published(id) => shared.last_published.store(id, Ordering::Release),
                _ => {}
            }
        })
        .map_err(|e| {
            error!("Gateway: MQTT client init failed: {}", e);
            CommsError::ConnectFault
        })?;
        self.client = Some(client);

        let mut waited = 0;
        while !self.shared.connected.load(Ordering::Acquire) {
            if waited >= MQTT_CONNECT_TIMEOUT_MS {
                warn!("Gateway: broker did not accept session within {} ms", waited);
                self.client = None;
                return Err(CommsError::ConnectFault);
            }
            FreeRtos::delay_ms(POLL_INTERVAL_MS);
            waited += POLL_INTERVAL_MS;
        }
        Ok(())
    }

    #[cfg(not(target_os = "espidf"))]
    fn platform_connect(
        &mut self,
        creds: &GatewayCredentials,
        identity: &NetworkIdentity,
        client_id: &str,
    ) -> Result<(), CommsError> {
        self.sim_connect_counter = self.sim_connect_counter.wrapping_add(1);
        // The 3rd of every 10 attempts fails, exercising the retry path.
        if self.sim_connect_counter % 10 == 3 {
            warn!(
                "Gateway(sim): simulated broker refusal (attempt {})",
                self.sim_connect_counter
            );
            return Err(CommsError::ConnectFault);
        }
        info!(
            "Gateway(sim): WiFi '{}' up, broker {} as {}",
            creds.ssid, identity.broker_url, client_id
        );
        Ok(())
    }

    #[cfg(target_os = "espidf")]
    fn platform_publish(&mut self, topic: &str, payload: &[u8]) -> Result<(), CommsError> {
        let client = self.client.as_mut().ok_or(CommsError::PublishFault)?;
        let id = client
            .publish(topic, QoS::AtLeastOnce, false, payload)
            .map_err(|e| {
                warn!("Gateway: publish enqueue failed: {}", e);
                CommsError::PublishFault
            })?;
        let mut waited = 0;
        while self.shared.last_published.load(Ordering::Acquire) != id {
            if waited >= MQTT_ACK_TIMEOUT_MS || !self.shared.connected.load(Ordering::Acquire) {
                warn!("Gateway: no PUBACK for message {} after {} ms", id, waited);
                return Err(CommsError::PublishFault);
            }
            FreeRtos::delay_ms(POLL_INTERVAL_MS);
            waited += POLL_INTERVAL_MS;
        }
        Ok(())
    }

    #[cfg(not(target_os = "espidf"))]
    fn platform_publish(&mut self, topic: &str, payload: &[u8]) -> Result<(), CommsError> {
        self.published.push((topic.to_owned(), payload.to_vec()));
        Ok(())
    }

    #[cfg(target_os = "espidf")]
    fn platform_disconnect(&mut self) {
        // Dropping the client closes the MQTT session.
        self.client = None;
        let _ = self.wifi.disconnect();
        let _ = self.wifi.stop();
    }

    #[cfg(not(target_os = "espidf"))]
    fn platform_disconnect(&mut self) {
        info!("Gateway(sim): link down");
    }
}

// ───────────────────────────────────────────────────────────────
// GatewayPort
// ───────────────────────────────────────────────────────────────

impl GatewayPort for MqttGateway {
    fn connect(&mut self, identity: &NetworkIdentity) -> Result<(), CommsError> {
        let Some(creds) = self.credentials.take() else {
            warn!("Gateway: no WiFi credentials provisioned");
            return Err(CommsError::ConnectFault);
        };
        let client_id = resolve_client_id(identity);
        info!(
            "Gateway: connecting to {} as '{}' (mTLS={})",
            identity.broker_url,
            client_id,
            creds.has_client_tls()
        );

        let result = self.platform_connect(&creds, identity, &client_id);
        self.credentials = Some(creds);
        match result {
            Ok(()) => {
                self.state = LinkState::Connected;
                self.topic_hint = identity.publish_topic.clone();
                info!("Gateway: connected");
                Ok(())
            }
            Err(e) => {
                self.state = LinkState::Down;
                Err(e)
            }
        }
    }

    fn publish(&mut self, topic: &str, payload: &[u8]) -> Result<(), CommsError> {
        if self.state != LinkState::Connected {
            return Err(CommsError::PublishFault);
        }
        if topic != self.topic_hint.as_str() {
            warn!("Gateway: publishing to '{}' (expected '{}')", topic, self.topic_hint);
        }
        self.platform_publish(topic, payload)?;
        info!("Gateway: {} bytes confirmed on '{}'", payload.len(), topic);
        Ok(())
    }

    fn disconnect(&mut self) {
        self.platform_disconnect();
        self.state = LinkState::Down;
        info!("Gateway: disconnected");
    }
}

// ───────────────────────────────────────────────────────────────
// Tests
// ───────────────────────────────────────────────────────────────
