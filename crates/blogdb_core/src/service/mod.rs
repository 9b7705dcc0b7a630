//! Core use-case services.
//!
//! # Responsibility
//! - Orchestrate repository writes into coordinated, all-or-nothing units.
//! - Keep the CLI decoupled from statement composition.

pub mod blog_service;

pub use blog_service::{BlogService, PostDraft, PublishedPost, RetireSummary, UserProfile};
