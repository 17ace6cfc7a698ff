// Licensed under the Apache-2.0 license

//! Suites run on the board from `main`, reporting over the console.

pub mod ds1307_test;
pub mod i2c_test;
