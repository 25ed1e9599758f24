//! Utilities for writing automated tests for backend servers and load
//! balancers running on the same Tokio runtime.

#![allow(dead_code)]

pub mod config;
pub mod http;
pub mod service;
pub mod tcp;
