//! Game-side logic: world mirror, aiming and the turn controller

pub mod aim;
pub mod controller;
pub mod world;

pub use controller::{run_session, ControllerTuning};
