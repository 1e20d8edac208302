// src/utils/elevation.rs

use tracing::{debug, warn};
use windows::Win32::{
    Foundation::{CloseHandle, HANDLE},
    Security::{GetTokenInformation, TokenElevation, TOKEN_ELEVATION, TOKEN_QUERY},
    System::Threading::{GetCurrentProcess, OpenProcessToken},
};

/// Closes the process token on drop.
struct TokenHandle(HANDLE);

impl Drop for TokenHandle {
    fn drop(&mut self) {
        if unsafe { CloseHandle(self.0) }.is_err() {
            warn!("Failed to close process token handle.");
        }
    }
}

/// Checks if the current process is running with elevated (administrator) privileges.
///
/// # Returns
///
/// - `true` if the process token reports elevation.
/// - `false` otherwise, including when the token cannot be queried.
pub fn is_elevated() -> bool {
    let mut raw = HANDLE::default();
    if let Err(e) = unsafe { OpenProcessToken(GetCurrentProcess(), TOKEN_QUERY, &mut raw) } {
        debug!("OpenProcessToken failed: {}", e);
        return false;
    }
    let token = TokenHandle(raw);

    let mut elevation = TOKEN_ELEVATION::default();
    let size = std::mem::size_of::<TOKEN_ELEVATION>() as u32;
    let mut returned = 0u32;
    let queried = unsafe {
        GetTokenInformation(
            token.0,
            TokenElevation,
            Some(&mut elevation as *mut TOKEN_ELEVATION as *mut _),
            size,
            &mut returned,
        )
    };

    match queried {
        Ok(()) => elevation.TokenIsElevated != 0,
        Err(e) => {
            debug!("GetTokenInformation(TokenElevation) failed: {}", e);
            false
        }
    }
}
