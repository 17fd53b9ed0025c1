//! Browser lifecycle and DOM waiting helpers

mod wait;
mod wrapper;

pub use wait::{wait_for_any, wait_for_element};
pub use wrapper::{BrowserWrapper, launch_browser};

use thiserror::Error;

#[derive(Error, Debug)]
pub enum BrowserError {
    #[error("Failed to find browser executable: {0}")]
    NotFound(String),

    #[error("Failed to launch browser: {0}")]
    LaunchFailed(String),

    #[error("Failed to create page: {0}")]
    PageCreationFailed(String),

    #[error("Navigation failed: {0}")]
    NavigationFailed(String),

    #[error("Element not found: {0}")]
    ElementNotFound(String),

    #[error("IO error: {0}")]
    Io(String),
}

pub type BrowserResult<T> = Result<T, BrowserError>;
