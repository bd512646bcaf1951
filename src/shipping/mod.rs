//! Fulfilment provider integration.
pub mod shiprocket;

pub use shiprocket::{CourierOption, Serviceability, ShiprocketClient, ShiprocketError};
