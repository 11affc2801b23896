//! # PrintCRM API Server Library
//!
//! HTTP surface of PrintCRM: authentication, the customer/order/quotation/
//! payment/lead/job-card resources, dashboard reports, and the account
//! data export and deletion endpoints.
//!
//! ## Modules
//!
//! - `app`: Application state and router builder
//! - `config`: Configuration management
//! - `error`: Error handling and HTTP response mapping
//! - `middleware`: Identity resolution and security headers
//! - `routes`: API route handlers

pub mod app;
pub mod config;
pub mod error;
pub mod middleware;
pub mod routes;
