// src/models/mod.rs

pub mod activity;
pub mod attempt;
pub mod report;
pub mod topic;
pub mod user;
