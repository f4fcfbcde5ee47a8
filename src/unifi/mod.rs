pub mod client;

pub use client::{DeviceError, PortActionClient, UnifiClient};
