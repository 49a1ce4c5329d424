//! Guest cart persistence.
//!
//! Anonymous carts live in a JSON file so they survive restarts. A missing or
//! unreadable file is an empty cart, never an error.

use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use quickcommerce_core::Cart;
use thiserror::Error;

/// Errors writing the guest cart.
#[derive(Debug, Error)]
pub enum GuestCartError {
    #[error("Failed to write guest cart: {0}")]
    Io(#[from] std::io::Error),
    #[error("Failed to encode guest cart: {0}")]
    Encode(#[from] serde_json::Error),
}

/// The file a guest cart is stored in.
#[derive(Debug, Clone)]
pub struct GuestCartFile {
    path: PathBuf,
}

impl GuestCartFile {
    #[must_use]
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Load the stored cart. Missing or corrupt files load as empty.
    pub async fn load(&self) -> Cart {
        let bytes = match tokio::fs::read(&self.path).await {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == ErrorKind::NotFound => return Cart::new(),
            Err(e) => {
                tracing::warn!(path = %self.path.display(), error = %e, "Could not read guest cart");
                return Cart::new();
            }
        };

        serde_json::from_slice(&bytes).unwrap_or_else(|e| {
            tracing::warn!(
                path = %self.path.display(),
                error = %e,
                "Guest cart file is corrupt, starting empty"
            );
            Cart::new()
        })
    }

    /// Replace the stored cart.
    ///
    /// # Errors
    ///
    /// Returns an error if the directory or file cannot be written.
    pub async fn save(&self, cart: &Cart) -> Result<(), GuestCartError> {
        if let Some(parent) = self.path.parent()
            && !parent.as_os_str().is_empty()
        {
            tokio::fs::create_dir_all(parent).await?;
        }

        let json = serde_json::to_vec_pretty(cart)?;
        let staging = self.path.with_extension("json.tmp");
        tokio::fs::write(&staging, json).await?;
        tokio::fs::rename(&staging, &self.path).await?;
        Ok(())
    }

    /// Delete the stored cart.
    ///
    /// # Errors
    ///
    /// Returns an error if the file exists but cannot be removed.
    pub async fn clear(&self) -> Result<(), GuestCartError> {
        match tokio::fs::remove_file(&self.path).await {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }
}
