//! Persistent configuration store.
//!
//! Implements [`ConfigPort`] by keeping the garden config as one postcard
//! blob.  On ESP32 the blob lives in the NVS `garden` namespace (commits are
//! atomic per `nvs_commit()`); the simulation backend keeps it in memory.
//!
//! Every save is validated first; a stored blob that no longer decodes is
//! reported as [`ConfigError::Corrupted`] so the caller can fall back to
//! defaults.  A reset wipes the whole namespace.

use log::info;

use crate::app::ports::{ConfigError, ConfigPort};
use crate::config::GardenConfig;

#[cfg(not(target_os = "espidf"))]
use core::cell::RefCell;
#[cfg(not(target_os = "espidf"))]
use embassy_sync::blocking_mutex::{Mutex, raw::CriticalSectionRawMutex};

#[cfg(target_os = "espidf")]
use esp_idf_svc::sys::*;
#[cfg(target_os = "espidf")]
use log::warn;

#[cfg(target_os = "espidf")]
const CONFIG_NAMESPACE: &[u8] = b"garden\0";
#[cfg(target_os = "espidf")]
const CONFIG_KEY: &[u8] = b"cfg\0";
#[cfg(target_os = "espidf")]
const MAX_BLOB_SIZE: usize = 1024;

pub struct ConfigStore {
    #[cfg(not(target_os = "espidf"))]
    blob: Mutex<CriticalSectionRawMutex, RefCell<Option<Vec<u8>>>>,
}

impl ConfigStore {
    /// Open the store, initialising NVS flash on the device.
    ///
    /// On first boot or after a layout change the NVS partition is erased
    /// and re-initialised.
    pub fn new() -> Result<Self, ConfigError> {
        #[cfg(target_os = "espidf")]
        {
            // SAFETY: called from main before any concurrent NVS access.
            let ret = unsafe { nvs_flash_init() };
            if ret == ESP_ERR_NVS_NO_FREE_PAGES as esp_err_t || ret == ESP_ERR_NVS_NEW_VERSION_FOUND as esp_err_t {
                warn!("ConfigStore: erasing and re-initialising NVS partition");
                if unsafe { nvs_flash_erase() } != ESP_OK as esp_err_t
                    || unsafe { nvs_flash_init() } != ESP_OK as esp_err_t
                {
                    return Err(ConfigError::IoError);
                }
            } else if ret != ESP_OK as esp_err_t {
                return Err(ConfigError::IoError);
            }
            info!("ConfigStore: NVS initialised");
        }

        #[cfg(not(target_os = "espidf"))]
        info!("ConfigStore: simulation backend");

        Ok(Self {
            #[cfg(not(target_os = "espidf"))]
            blob: Mutex::new(RefCell::new(None)),
        })
    }

    /// Simulation store pre-loaded with raw bytes.
    #[cfg(not(target_os = "espidf"))]
    pub fn with_blob(bytes: Vec<u8>) -> Self {
        Self {
            blob: Mutex::new(RefCell::new(Some(bytes))),
        }
    }

    /// Open the namespace, run `f` with the handle, then close it.
    #[cfg(target_os = "espidf")]
    fn with_nvs_handle<T>(
        write: bool,
        f: impl FnOnce(nvs_handle_t) -> Result<T, i32>,
    ) -> Result<T, i32> {
        let mut handle: nvs_handle_t = 0;
        let mode = if write {
            nvs_open_mode_t_NVS_READWRITE
        } else {
            nvs_open_mode_t_NVS_READONLY
        };
        let ret = unsafe { nvs_open(CONFIG_NAMESPACE.as_ptr() as *const _, mode, &mut handle) };
        if ret != ESP_OK as esp_err_t {
            return Err(ret);
        }
        let result = f(handle);
        unsafe { nvs_close(handle) };
        result
    }

    #[cfg(target_os = "espidf")]
    fn read_blob(&self) -> Result<Option<Vec<u8>>, ConfigError> {
        let result = Self::with_nvs_handle(false, |handle| {
            let mut size: usize = 0;
            let ret = unsafe {
                nvs_get_blob(handle, CONFIG_KEY.as_ptr() as *const _, core::ptr::null_mut(), &mut size)
            };
            if ret != ESP_OK as esp_err_t {
                return Err(ret);
            }
            if size == 0 || size > MAX_BLOB_SIZE {
                return Err(ESP_ERR_NVS_INVALID_LENGTH as esp_err_t);
            }
            let mut buf = vec![0u8; size];
            let ret = unsafe {
                nvs_get_blob(handle, CONFIG_KEY.as_ptr() as *const _, buf.as_mut_ptr() as *mut _, &mut size)
            };
            if ret != ESP_OK as esp_err_t {
                return Err(ret);
            }
            Ok(buf)
        });
        match result {
            Ok(buf) => Ok(Some(buf)),
            Err(e) if e == ESP_ERR_NVS_NOT_FOUND as esp_err_t => Ok(None),
            Err(e) if e == ESP_ERR_NVS_INVALID_LENGTH as esp_err_t => Err(ConfigError::Corrupted),
            Err(e) => {
                warn!("ConfigStore: NVS read error {}", e);
                Err(ConfigError::IoError)
            }
        }
    }

    #[cfg(not(target_os = "espidf"))]
    fn read_blob(&self) -> Result<Option<Vec<u8>>, ConfigError> {
        Ok(self.blob.lock(|b| b.borrow().clone()))
    }

    #[cfg(target_os = "espidf")]
    fn write_blob(&self, bytes: &[u8]) -> Result<(), ConfigError> {
        Self::with_nvs_handle(true, |handle| {
            let ret = unsafe {
                nvs_set_blob(handle, CONFIG_KEY.as_ptr() as *const _, bytes.as_ptr() as *const _, bytes.len())
            };
            if ret != ESP_OK as esp_err_t {
                return Err(ret);
            }
            let ret = unsafe { nvs_commit(handle) };
            if ret != ESP_OK as esp_err_t {
                return Err(ret);
            }
            Ok(())
        })
        .map_err(|e| {
            warn!("ConfigStore: NVS write error {}", e);
            ConfigError::IoError
        })
    }

    #[cfg(not(target_os = "espidf"))]
    fn write_blob(&self, bytes: &[u8]) -> Result<(), ConfigError> {
        self.blob.lock(|b| *b.borrow_mut() = Some(bytes.to_vec()));
        Ok(())
    }

    /// Wipe every key in the namespace.
    #[cfg(target_os = "espidf")]
    fn erase(&self) -> Result<(), ConfigError> {
        Self::with_nvs_handle(true, |handle| {
            let ret = unsafe { nvs_erase_all(handle) };
            if ret != ESP_OK as esp_err_t {
                return Err(ret);
            }
            let ret = unsafe { nvs_commit(handle) };
            if ret != ESP_OK as esp_err_t {
                return Err(ret);
            }
            Ok(())
        })
        .map_err(|e| {
            warn!("ConfigStore: NVS erase error {}", e);
            ConfigError::IoError
        })
    }

    #[cfg(not(target_os = "espidf"))]
    fn erase(&self) -> Result<(), ConfigError> {
        self.blob.lock(|b| *b.borrow_mut() = None);
        Ok(())
    }
}

impl ConfigPort for ConfigStore {
    fn load(&self) -> Result<GardenConfig, ConfigError> {
        let Some(bytes) = self.read_blob()? else {
            info!("ConfigStore: no stored config, using defaults");
            return Ok(GardenConfig::default());
        };
        let config: GardenConfig =
            postcard::from_bytes(&bytes).map_err(|_| ConfigError::Corrupted)?;
        config.validate().map_err(|_| ConfigError::Corrupted)?;
        info!("ConfigStore: loaded config ({} bytes)", bytes.len());
        Ok(config)
    }

    fn save(&self, config: &GardenConfig) -> Result<(), ConfigError> {
        config.validate().map_err(|e| match e {
            crate::error::Error::InvalidSchedule(msg) | crate::error::Error::Config(msg) => {
                ConfigError::ValidationFailed(msg)
            }
            _ => ConfigError::ValidationFailed("config rejected"),
        })?;
        let bytes = postcard::to_allocvec(config).map_err(|_| ConfigError::IoError)?;
        self.write_blob(&bytes)?;
        info!("ConfigStore: config saved ({} bytes)", bytes.len());
        Ok(())
    }

    fn reset(&self) -> Result<(), ConfigError> {
        self.erase()?;
        info!("ConfigStore: stored config erased");
        Ok(())
    }
}
