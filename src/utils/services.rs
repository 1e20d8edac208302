// src/utils/services.rs

use anyhow::{Context, Result};
use tracing::{debug, warn};
use widestring::U16CString;
use windows::{
    core::PCWSTR,
    Win32::{
        Foundation::{ERROR_SERVICE_DOES_NOT_EXIST, ERROR_SERVICE_NOT_ACTIVE},
        System::Services::{
            ChangeServiceConfigW, CloseServiceHandle, ControlService, OpenSCManagerW,
            OpenServiceW, QueryServiceConfigW, ENUM_SERVICE_TYPE, QUERY_SERVICE_CONFIGW,
            SC_HANDLE, SC_MANAGER_CONNECT, SERVICE_AUTO_START, SERVICE_BOOT_START,
            SERVICE_CHANGE_CONFIG, SERVICE_CONTROL_STOP, SERVICE_DEMAND_START, SERVICE_DISABLED,
            SERVICE_ERROR, SERVICE_NO_CHANGE, SERVICE_QUERY_CONFIG, SERVICE_START_TYPE,
            SERVICE_STATUS, SERVICE_STOP, SERVICE_SYSTEM_START,
        },
    },
};

use crate::models::StartupMode;

/// Service or SCM handle closed on drop.
struct ServiceHandle(SC_HANDLE);

impl Drop for ServiceHandle {
    fn drop(&mut self) {
        if let Err(e) = unsafe { CloseServiceHandle(self.0) } {
            warn!("Failed to close service handle: {}", e);
        }
    }
}

/// Opens `service_name` with `access`, keeping the SCM handle alive for as
/// long as the service handle.
fn open_service(service_name: &str, access: u32) -> Result<(ServiceHandle, ServiceHandle)> {
    let scm = unsafe { OpenSCManagerW(PCWSTR::null(), PCWSTR::null(), SC_MANAGER_CONNECT) }
        .context("Failed to open Service Control Manager")?;
    let scm = ServiceHandle(scm);

    let name = U16CString::from_str(service_name)
        .with_context(|| format!("Invalid service name '{}'", service_name))?;
    let service = unsafe { OpenServiceW(scm.0, PCWSTR(name.as_ptr()), access) }
        .with_context(|| format!("Failed to open service '{}'", service_name))?;
    Ok((scm, ServiceHandle(service)))
}

/// True if `err` says the service is not installed.
pub fn is_missing_service(err: &anyhow::Error) -> bool {
    err.downcast_ref::<windows::core::Error>()
        .is_some_and(|e| e.code() == ERROR_SERVICE_DOES_NOT_EXIST.to_hresult())
}

fn startup_mode_from(start_type: SERVICE_START_TYPE) -> StartupMode {
    match start_type {
        SERVICE_DISABLED => StartupMode::Disabled,
        SERVICE_DEMAND_START => StartupMode::Manual,
        SERVICE_AUTO_START | SERVICE_BOOT_START | SERVICE_SYSTEM_START => StartupMode::Automatic,
        other => {
            warn!("Unknown service start type {}, treating as Manual.", other.0);
            StartupMode::Manual
        }
    }
}

fn start_type_from(mode: StartupMode) -> SERVICE_START_TYPE {
    match mode {
        StartupMode::Automatic => SERVICE_AUTO_START,
        StartupMode::Manual => SERVICE_DEMAND_START,
        StartupMode::Disabled => SERVICE_DISABLED,
    }
}

/// Reads the configured startup mode of a service.
///
/// # Returns
///
/// - `Ok(StartupMode)` on success.
/// - `Err(anyhow::Error)` if the service cannot be opened or queried; use
///   [`is_missing_service`] to tell "not installed" apart.
pub fn query_startup_mode(service_name: &str) -> Result<StartupMode> {
    let (_scm, service) = open_service(service_name, SERVICE_QUERY_CONFIG)?;

    let mut needed = 0u32;
    // Sizing call; fails with ERROR_INSUFFICIENT_BUFFER by design.
    let _ = unsafe { QueryServiceConfigW(service.0, None, 0, &mut needed) };
    if needed == 0 {
        anyhow::bail!("Failed to size configuration buffer for '{}'", service_name);
    }

    let mut buffer = vec![0u64; (needed as usize).div_ceil(8)];
    let config = buffer.as_mut_ptr() as *mut QUERY_SERVICE_CONFIGW;
    unsafe { QueryServiceConfigW(service.0, Some(config), needed, &mut needed) }
        .with_context(|| format!("Failed to query configuration of '{}'", service_name))?;

    let start_type = unsafe { (*config).dwStartType };
    Ok(startup_mode_from(start_type))
}

/// Changes only the startup mode of a service.
pub fn set_startup_mode(service_name: &str, mode: StartupMode) -> Result<()> {
    let (_scm, service) = open_service(service_name, SERVICE_CHANGE_CONFIG)?;
    unsafe {
        ChangeServiceConfigW(
            service.0,
            ENUM_SERVICE_TYPE(SERVICE_NO_CHANGE),
            start_type_from(mode),
            SERVICE_ERROR(SERVICE_NO_CHANGE),
            PCWSTR::null(),
            PCWSTR::null(),
            None,
            PCWSTR::null(),
            PCWSTR::null(),
            PCWSTR::null(),
            PCWSTR::null(),
        )
    }
    .with_context(|| format!("Failed to set startup mode of '{}' to {}", service_name, mode))?;
    debug!("Set startup mode of '{}' to {}.", service_name, mode);
    Ok(())
}

/// Sends a stop control. A service that is not running counts as stopped.
pub fn stop_service(service_name: &str) -> Result<()> {
    let (_scm, service) = open_service(service_name, SERVICE_STOP)?;
    let mut status = SERVICE_STATUS::default();
    match unsafe { ControlService(service.0, SERVICE_CONTROL_STOP, &mut status) } {
        Ok(()) => {
            debug!("Stop requested for '{}'.", service_name);
            Ok(())
        }
        Err(e) if e.code() == ERROR_SERVICE_NOT_ACTIVE.to_hresult() => {
            debug!("'{}' is not running.", service_name);
            Ok(())
        }
        Err(e) => Err(e).with_context(|| format!("Failed to stop service '{}'", service_name)),
    }
}
