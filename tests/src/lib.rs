//! # HNS-Light Test Suite
//!
//! End-to-end scenarios driving a real `Engine` against scripted full
//! nodes over real TCP, and scripted zone servers over real UDP.

pub mod support;

#[cfg(test)]
mod integration;
