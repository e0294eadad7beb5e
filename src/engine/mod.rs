//! Core engine components

pub mod actor;
pub mod callable;
pub mod context;
pub mod control;
pub mod definition;
pub mod factory;
pub mod flow;
pub mod listener;
pub mod restart;
pub mod scheduler;
pub mod storage;
pub mod token;
pub mod tree;
pub mod variables;
