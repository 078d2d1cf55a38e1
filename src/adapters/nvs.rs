//! NVS (Non-Volatile Storage) adapter.
//!
//! Implements both [`ConfigPort`] and [`StoragePort`] for the Willow node.
//!
//! # Security
//!
//! - Config validation: all fields are range-checked before persistence
//!   and again after loading.
//! - Encrypted NVS: on ESP32, the "auth" namespace lives on the encrypted
//!   NVS partition. The simulation backend uses plaintext (dev/test only).
//! - Namespace isolation: each subsystem uses its own namespace.
//! - Atomic writes: ESP-IDF NVS commits are atomic per nvs_commit().

use crate::adapters::gateway::GatewayCredentials;
use crate::app::ports::{ConfigError, ConfigPort, StorageError, StoragePort};
use crate::config::NodeConfig;
use log::{info, warn};

#[cfg(not(target_os = "espidf"))]
use std::collections::HashMap;

#[cfg(target_os = "espidf")]
use esp_idf_svc::sys::*;

const CONFIG_NAMESPACE: &str = "willow";
const CONFIG_KEY: &str = "nodecfg";

const MAX_BLOB_SIZE: usize = 4000;
const CRED_NAMESPACE: &str = "auth";

/// Credential keys in the "auth" namespace.
pub const CRED_WIFI_SSID: &str = "wifi_ssid";
pub const CRED_WIFI_PASS: &str = "wifi_pass";
pub const CRED_CLIENT_CERT: &str = "client_cert";
pub const CRED_CLIENT_KEY: &str = "client_key";

pub struct NvsAdapter {
    #[cfg(not(target_os = "espidf"))]
    store: std::cell::RefCell<HashMap<String, Vec<u8>>>,
}

impl NvsAdapter {
    /// Create a new NvsAdapter and initialise NVS flash.
    ///
    /// On first boot or after a version mismatch the NVS partition is
    /// erased and re-initialised automatically.
    pub fn new() -> Result<Self, ConfigError> {
        #[cfg(target_os = "espidf")]
        {
            // SAFETY: nvs_flash_init / nvs_flash_erase are called from the
            // single main-task context before any concurrent NVS access.
            let ret = unsafe { nvs_flash_init() };
            if ret == ESP_ERR_NVS_NO_FREE_PAGES as esp_err_t || ret == ESP_ERR_NVS_NEW_VERSION_FOUND as esp_err_t {
                warn!("NVS: erasing and re-initialising flash partition");
                if unsafe { nvs_flash_erase() } != ESP_OK {
                    return Err(ConfigError::IoError);
                }
                if unsafe { nvs_flash_init() } != ESP_OK {
                    return Err(ConfigError::IoError);
                }
            } else if ret != ESP_OK {
                return Err(ConfigError::IoError);
            }
            info!("NvsAdapter: ESP-IDF NVS initialised");
        }

        #[cfg(not(target_os = "espidf"))]
        info!("NvsAdapter: simulation backend");

        Ok(Self {
            #[cfg(not(target_os = "espidf"))]
            store: std::cell::RefCell::new(HashMap::new()),
        })
    }

    #[cfg(not(target_os = "espidf"))]
    fn composite_key(namespace: &str, key: &str) -> String {
        format!("{}::{}", namespace, key)
    }

    /// NUL-terminated copy of an NVS name (15 chars max).
    #[cfg(target_os = "espidf")]
    fn c_name(name: &str) -> [u8; 16] {
        let mut buf = [0u8; 16];
        let bytes = name.as_bytes();
        let len = bytes.len().min(15);
        buf[..len].copy_from_slice(&bytes[..len]);
        buf
    }

    /// Open an NVS namespace, execute a closure with the handle, then close.
    #[cfg(target_os = "espidf")]
    fn with_nvs_handle<F, T>(namespace: &str, write: bool, f: F) -> Result<T, i32>
    where
        F: FnOnce(nvs_handle_t) -> Result<T, i32>,
    {
        let ns = Self::c_name(namespace);
        let mut handle: nvs_handle_t = 0;
        let mode = if write {
            nvs_open_mode_t_NVS_READWRITE
        } else {
            nvs_open_mode_t_NVS_READONLY
        };

        // SAFETY: `ns` is NUL-terminated and outlives the call.
        let ret = unsafe { nvs_open(ns.as_ptr() as *const _, mode, &mut handle) };
        if ret != ESP_OK {
            return Err(ret);
        }

        let result = f(handle);
        // SAFETY: handle was opened above and is closed exactly once.
        unsafe {
            nvs_close(handle);
        }
        result
    }

    /// Read a blob of unknown size.
    fn read_blob(&self, namespace: &str, key: &str) -> Result<Vec<u8>, StorageError> {
        #[cfg(not(target_os = "espidf"))]
        {
            let composite = Self::composite_key(namespace, key);
            self.store
                .borrow()
                .get(&composite)
                .cloned()
                .ok_or(StorageError::NotFound)
        }

        #[cfg(target_os = "espidf")]
        {
            let key_c = Self::c_name(key);
            let result = Self::with_nvs_handle(namespace, false, |handle| {
                let mut size: usize = 0;
                // First call: get size
                // SAFETY: null output pointer asks NVS for the length only.
                let ret = unsafe {
                    nvs_get_blob(handle, key_c.as_ptr() as *const _, core::ptr::null_mut(), &mut size)
                };
                if ret != ESP_OK {
                    return Err(ret);
                }
                if size == 0 || size > MAX_BLOB_SIZE {
                    return Err(ESP_ERR_NVS_INVALID_LENGTH as esp_err_t);
                }
                let mut buf = vec![0u8; size];
                // SAFETY: `buf` holds exactly `size` bytes.
                let ret = unsafe {
                    nvs_get_blob(
                        handle,
                        key_c.as_ptr() as *const _,
                        buf.as_mut_ptr() as *mut _,
                        &mut size,
                    )
                };
                if ret != ESP_OK {
                    return Err(ret);
                }
                Ok(buf)
            });
            result.map_err(|e| {
                if e == ESP_ERR_NVS_NOT_FOUND as esp_err_t {
                    StorageError::NotFound
                } else {
                    StorageError::IoError
                }
            })
        }
    }
}

impl ConfigPort for NvsAdapter {
    fn load(&self) -> Result<NodeConfig, ConfigError> {
        match self.read_blob(CONFIG_NAMESPACE, CONFIG_KEY) {
            Ok(bytes) => {
                let cfg: NodeConfig =
                    postcard::from_bytes(&bytes).map_err(|_| ConfigError::Corrupted)?;
                cfg.validate()?;
                info!("NvsAdapter: loaded config ({} bytes)", bytes.len());
                Ok(cfg)
            }
            Err(StorageError::NotFound) => {
                info!("NvsAdapter: no stored config, using defaults");
                Ok(NodeConfig::default())
            }
            Err(e) => {
                warn!("NvsAdapter: config read error ({}), using defaults", e);
                Ok(NodeConfig::default())
            }
        }
    }

    fn save(&self, config: &NodeConfig) -> Result<(), ConfigError> {
        config.validate()?;
        let bytes = postcard::to_allocvec(config).map_err(|_| ConfigError::IoError)?;
        if bytes.len() > MAX_BLOB_SIZE {
            return Err(ConfigError::ValidationFailed("config blob too large"));
        }

        #[cfg(not(target_os = "espidf"))]
        {
            let key = Self::composite_key(CONFIG_NAMESPACE, CONFIG_KEY);
            self.store.borrow_mut().insert(key, bytes);
            info!("NvsAdapter: config saved (simulation)");
            Ok(())
        }

        #[cfg(target_os = "espidf")]
        {
            let key_c = Self::c_name(CONFIG_KEY);
            let result = Self::with_nvs_handle(CONFIG_NAMESPACE, true, |handle| {
                // SAFETY: key and data pointers are valid for the call.
                let ret = unsafe {
                    nvs_set_blob(
                        handle,
                        key_c.as_ptr() as *const _,
                        bytes.as_ptr() as *const _,
                        bytes.len(),
                    )
                };
                if ret != ESP_OK {
                    return Err(ret);
                }
                let ret = unsafe { nvs_commit(handle) };
                if ret != ESP_OK {
                    return Err(ret);
                }
                Ok(())
            });
            match result {
                Ok(()) => {
                    info!("NvsAdapter: config saved to NVS ({} bytes)", bytes.len());
                    Ok(())
                }
                Err(e) => {
                    warn!("NvsAdapter: NVS write error {}", e);
                    Err(ConfigError::IoError)
                }
            }
        }
    }
}

impl StoragePort for NvsAdapter {
    fn read(&self, namespace: &str, key: &str, buf: &mut [u8]) -> Result<usize, StorageError> {
        #[cfg(not(target_os = "espidf"))]
        {
            let composite = Self::composite_key(namespace, key);
            match self.store.borrow().get(&composite) {
                Some(data) => {
                    let len = data.len().min(buf.len());
                    buf[..len].copy_from_slice(&data[..len]);
                    Ok(len)
                }
                None => Err(StorageError::NotFound),
            }
        }

        #[cfg(target_os = "espidf")]
        {
            let key_c = Self::c_name(key);
            let result = Self::with_nvs_handle(namespace, false, |handle| {
                let mut size = buf.len();
                // SAFETY: `buf` is valid for `size` bytes.
                let ret = unsafe {
                    nvs_get_blob(
                        handle,
                        key_c.as_ptr() as *const _,
                        buf.as_mut_ptr() as *mut _,
                        &mut size,
                    )
                };
                if ret != ESP_OK {
                    return Err(ret);
                }
                Ok(size)
            });
            match result {
                Ok(size) => Ok(size),
                Err(e) if e == ESP_ERR_NVS_NOT_FOUND as esp_err_t => Err(StorageError::NotFound),
                Err(_) => Err(StorageError::IoError),
            }
        }
    }

    fn write(&mut self, namespace: &str, key: &str, data: &[u8]) -> Result<(), StorageError> {
        #[cfg(not(target_os = "espidf"))]
        {
            let composite = Self::composite_key(namespace, key);
            self.store.borrow_mut().insert(composite, data.to_vec());
            Ok(())
        }

        #[cfg(target_os = "espidf")]
        {
            let key_c = Self::c_name(key);
            let result = Self::with_nvs_handle(namespace, true, |handle| {
                // SAFETY: key and data pointers are valid for the call.
                let ret = unsafe {
                    nvs_set_blob(
                        handle,
                        key_c.as_ptr() as *const _,
                        data.as_ptr() as *const _,
                        data.len(),
                    )
                };
                if ret != ESP_OK {
                    return Err(ret);
                }
                let ret = unsafe { nvs_commit(handle) };
                if ret != ESP_OK {
                    return Err(ret);
                }
                Ok(())
            });
            result.map_err(|e| {
                if e == ESP_ERR_NVS_NOT_ENOUGH_SPACE as esp_err_t {
                    StorageError::Full
                } else {
                    StorageError::IoError
                }
            })
        }
    }

    fn delete(&mut self, namespace: &str, key: &str) -> Result<(), StorageError> {
        #[cfg(not(target_os = "espidf"))]
        {
            let composite = Self::composite_key(namespace, key);
            self.store.borrow_mut().remove(&composite);
            Ok(())
        }

        #[cfg(target_os = "espidf")]
        {
            let key_c = Self::c_name(key);
            let result = Self::with_nvs_handle(namespace, true, |handle| {
                let ret = unsafe { nvs_erase_key(handle, key_c.as_ptr() as *const _) };
                if ret != ESP_OK && ret != ESP_ERR_NVS_NOT_FOUND as esp_err_t {
                    return Err(ret);
                }
                let ret = unsafe { nvs_commit(handle) };
                if ret != ESP_OK {
                    return Err(ret);
                }
                Ok(())
            });
            result.map_err(|_| StorageError::IoError)
        }
    }

    fn exists(&self, namespace: &str, key: &str) -> bool {
        #[cfg(not(target_os = "espidf"))]
        {
            let composite = Self::composite_key(namespace, key);
            self.store.borrow().contains_key(&composite)
        }

        #[cfg(target_os = "espidf")]
        {
            let key_c = Self::c_name(key);
            let result = Self::with_nvs_handle(namespace, false, |handle| {
                let ret = unsafe {
                    nvs_find_key(handle, key_c.as_ptr() as *const _, core::ptr::null_mut())
                };
                Ok(ret == ESP_OK)
            });
            result.unwrap_or(false)
        }
    }
}

// ── Secure credential storage ──────────────────────────────────────
//
// WiFi and broker secrets live in the "auth" NVS namespace.  On ESP32,
// NVS encryption is enabled partition-wide via the nvs_key partition;
// with CONFIG_NVS_ENCRYPTION set all nvs_get / nvs_set calls are
// transparently AES-XTS encrypted.
impl NvsAdapter {
    pub fn store_credential(&mut self, key: &str, data: &[u8]) -> Result<(), StorageError> {
        self.write(CRED_NAMESPACE, key, data)
    }

    pub fn credential_exists(&self, key: &str) -> bool {
        self.exists(CRED_NAMESPACE, key)
    }

    fn credential_string(&self, key: &str) -> Option<String> {
        let bytes = self.read_blob(CRED_NAMESPACE, key).ok()?;
        match String::from_utf8(bytes) {
            Ok(s) => Some(s.trim_end_matches('\0').to_owned()),
            Err(_) => {
                warn!("NvsAdapter: credential '{}' is not UTF-8", key);
                None
            }
        }
    }

    /// Persist link and broker secrets in the "auth" namespace.
    pub fn provision_gateway(
        &mut self,
        ssid: &str,
        password: &str,
        client_tls: Option<(&str, &str)>,
    ) -> Result<(), StorageError> {
        self.store_credential(CRED_WIFI_SSID, ssid.as_bytes())?;
        self.store_credential(CRED_WIFI_PASS, password.as_bytes())?;
        match client_tls {
            Some((cert, key)) => {
                self.store_credential(CRED_CLIENT_CERT, cert.as_bytes())?;
                self.store_credential(CRED_CLIENT_KEY, key.as_bytes())?;
            }
            None => {
                self.delete(CRED_NAMESPACE, CRED_CLIENT_CERT)?;
                self.delete(CRED_NAMESPACE, CRED_CLIENT_KEY)?;
            }
        }
        info!("NvsAdapter: gateway credentials provisioned (SSID='{}')", ssid);
        Ok(())
    }

    /// Assemble gateway credentials.  `None` when the node was never
    /// provisioned or the stored values fail validation.
    pub fn load_gateway_credentials(&self) -> Option<GatewayCredentials> {
        let ssid = self.credential_string(CRED_WIFI_SSID)?;
        let password = self.credential_string(CRED_WIFI_PASS).unwrap_or_default();
        let creds = match GatewayCredentials::new(&ssid, &password) {
            Ok(c) => c,
            Err(e) => {
                warn!("NvsAdapter: stored WiFi credentials rejected: {}", e);
                return None;
            }
        };
        let cert = self.credential_string(CRED_CLIENT_CERT);
        let key = self.credential_string(CRED_CLIENT_KEY);
        match (cert, key) {
            (Some(cert), Some(key)) => match creds.clone().with_client_tls(&cert, &key) {
                Ok(c) => Some(c),
                Err(e) => {
                    warn!("NvsAdapter: client TLS material rejected ({}), using server-auth only", e);
                    Some(creds)
                }
            },
            _ => Some(creds),
        }
    }
}

impl Default for NvsAdapter {
    /// Unchecked handle for when flash init failed; every call then
    /// reports an error and callers fall back to defaults.
    fn default() -> Self {
        Self::new().unwrap_or(Self {
            #[cfg(not(target_os = "espidf"))]
            store: std::cell::RefCell::new(HashMap::new()),
        })
    }
}
