#![cfg_attr(not(test), no_std)]

//! evse-gateway - network/control gateway core for an EV charging station
//!
//! This library provides the configuration store with durable, partially
//! corruptible persistence, the change-propagation table it feeds, and the
//! solar-aware charge-current diversion loop driven by it. The serial
//! device protocol, WiFi, HTTP and MQTT transports are external
//! collaborators accessed through the narrow traits in [`platform`] and
//! [`evse`].

// Platform abstraction layer (durable storage seam + mocks)
pub mod platform;

// Logging macros (defmt on embedded targets, println under test)
pub mod logging;

// Configuration store: schema, persistence generations, JSON surface
pub mod config;

// Change propagation from config writes to the rest of the system
pub mod events;

// Charging controller collaborator interface
pub mod evse;

// Solar / grid telemetry feed values
pub mod telemetry;

// Solar divert control loop
pub mod divert;

// Round-robin device status poll
pub mod input;

// Cooperative top-level control flow
pub mod gateway;
