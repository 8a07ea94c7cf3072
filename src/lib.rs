//! Repair Desk - service-center accounts with emailed one-time codes
//!
//! Login and registration by emailed code, bearer sessions, self-service
//! profiles and a role-gated CRM for staff.

pub mod access;
pub mod account;
pub mod api;
pub mod auth;
pub mod cache;
pub mod challenge;
pub mod config;
pub mod context;
pub mod db;
pub mod error;
pub mod jobs;
pub mod mailer;
pub mod rate_limit;
pub mod server;
