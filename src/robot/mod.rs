pub mod differential_drive;
pub mod event_loop;
pub mod events;
pub mod ir_remote;
pub mod motor_driver;
pub mod robot_controller;
pub mod sonar;
