//! Watchface core for PineWalker
//!
//! Everything here is hardware independent: the firmware feeds minute ticks
//! and inbox messages into a [`WatchFace`] and hands it a display to draw on.

#![cfg_attr(not(test), no_std)]

pub mod art;
pub mod clock;
pub mod face;
pub mod layout;
pub mod message;
pub mod settings;
pub mod variant;

pub use clock::HourFormat;
pub use face::{Update, WatchFace};
pub use layout::{Layer, Layers};
pub use message::{Dictionary, DictionaryWriter};
pub use settings::Settings;
pub use variant::Variant;
