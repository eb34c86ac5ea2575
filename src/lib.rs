//! # SSBot firmware
//!
//! Hardware abstraction for the Summer Springboard classroom robot: two DC
//! motors behind an H-bridge, an ultrasonic range finder and an infrared
//! remote. Everything is written against the `embedded-hal` 1.0 traits; the
//! ESP32-S3 wiring lives in the `ssbot-firmware` binary (feature `firmware`).
//!
//! | Module | Purpose |
//! | ------ | ------- |
//! | [`config`] | Compile-time tuning constants and configuration structs |
//! | [`robot::motor_driver`] | Single H-bridge motor with direction and duty state |
//! | [`robot::differential_drive`] | Two-wheel drive state machine |
//! | [`robot::sonar`] | Rate-limited ultrasonic ranging |
//! | [`robot::ir_remote`] | NEC remote decoding and command polling |
//! | [`robot::robot_controller`] | Remote buttons to drive commands |
//! | [`robot::event_loop`] | Cooperative polling loop |

#![cfg_attr(not(test), no_std)]

#[macro_use]
mod fmt;

pub mod config;
pub mod robot;

#[cfg(test)]
mod testing;
