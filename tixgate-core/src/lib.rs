#![deny(clippy::unwrap_used)]
#![deny(clippy::expect_used)]
#![deny(clippy::panic)]
#![forbid(unsafe_code)]

pub mod assign;
pub mod entities;
pub mod events;
pub mod framework;
pub mod gateway;
pub mod notify;
pub mod processors;
pub mod purchase;
pub mod settlement;
pub mod utils;
pub mod verify;
