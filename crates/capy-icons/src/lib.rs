//! capy-icons: freedesktop icon theme lookup for CapyServices
//!
//! Resolves icon names against the installed theme inheritance chain,
//! converts legacy XPM icons on demand and caches icons submitted as raw
//! pixels under a content digest.

pub mod config;
pub mod convert;
pub mod error;
pub mod index;
pub mod paths;
pub mod resolver;
pub mod runtime;
pub mod theme;
pub mod watcher;

pub use config::{DefaultTheme, IconConfig, THEME_ENV};
pub use convert::{IconConverter, XpmConverter};
pub use error::IconError;
pub use resolver::IconResolver;
pub use runtime::{PixelLayout, RawImage, RuntimeIconCache, digest_name};
pub use theme::{HICOLOR, IconTheme};
pub use watcher::IconWatcher;
