// Licensed under the Apache-2.0 license

//! Drivers for devices on the board, written against `embedded-hal` traits
//! so they run on any bus implementation.

pub mod ds1307;
