//! Data models for the BirdQuest application.
//!
//! These models match the frontend TypeScript interfaces exactly for seamless interoperability.

mod image;
mod species;
mod trip;
mod user;

pub use image::*;
pub use species::*;
pub use trip::*;
pub use user::*;
