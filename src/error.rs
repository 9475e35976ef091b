//! Device acquisition errors.

use std::io;

use thiserror::Error;

#[derive(Error, Debug)]
pub enum Error {
    #[error("HID error: {0}")]
    Hid(#[from] hidapi::HidError),

    #[error("unable to access {path}: {source}")]
    Io {
        path: &'static str,
        #[source]
        source: io::Error,
    },

    #[error("no {0} found")]
    DeviceNotFound(&'static str),

    #[error("color '{0}' does not match format 0xRRGGBB")]
    InvalidColor(String),
}
