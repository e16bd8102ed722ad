//! API Routes
//!
//! Route handlers organized by functionality.

pub mod admin;
pub mod dataselect;
pub mod documents;
pub mod health;
