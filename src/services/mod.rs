// src/services/mod.rs
pub mod attendance_service;
pub mod qr_service;
pub mod report_service;
pub mod student_service;
