//! Use-case services composed over the store repositories.

pub mod graph_service;
