//! Helpers shared by the caprov components.
pub mod file;
pub mod httpclient;
pub mod template;
