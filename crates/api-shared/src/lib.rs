//! # API Shared
//!
//! Shared definitions for the consultation APIs.
//!
//! Contains:
//! - Request and response bodies (`dto` module), with OpenAPI schemas
//! - Shared services like `HealthService`
//!
//! This crate does not depend on the core: conversion from core types happens in the API crates.

pub mod dto;
pub mod health;

pub use dto::*;
pub use health::HealthService;
