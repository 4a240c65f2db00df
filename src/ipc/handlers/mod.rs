pub mod admissions;
pub mod auth;
pub mod core;
pub mod courses;
pub mod events;
pub mod guard;

mod access;
