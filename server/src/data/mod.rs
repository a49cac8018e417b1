//! Data layer: the cache client adapter

pub mod cache;
