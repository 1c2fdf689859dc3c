// src/models/mod.rs
pub mod attendance;
pub mod student;
