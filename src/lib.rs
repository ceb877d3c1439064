pub mod charset;
pub mod clipboard;
pub mod config;
pub mod control;
pub mod engine;
pub mod error;
pub mod focus;
#[cfg(feature = "hotkeys")]
pub mod hotkeys;
pub mod injector;
pub mod keyboard;
pub mod model;
pub mod playback;
pub mod session;
pub mod sim;
pub mod textfile;
pub mod timing;

pub use error::{Result, TyperError};
