// Licensed under the Apache-2.0 license

// Enforce Copilot coding guidelines - prevent panic-prone patterns in production code only
#![cfg_attr(not(test), deny(clippy::unwrap_used, clippy::indexing_slicing))]
#![cfg_attr(not(test), warn(clippy::expect_used))]
#![cfg_attr(not(test), no_std)]
pub mod bsp;
pub mod common;
pub mod event;
pub mod gpio;
pub mod i2c;
pub mod irq;
pub mod nvic;
pub mod rcc;
pub mod registers;
pub mod spi;
pub mod tests;
pub mod usart;
