//! Entity Module

pub mod identity;
pub mod principal;
pub mod session;
pub mod user_record;
