//! Persistent stores used by the import engine
//!
//! `catalog` is the four-level hierarchy store; `tag_cache` is the flat
//! (sop_instance_uid, tag) -> value side cache. The two live in separate
//! SQLite databases (see `dicat_common::db::init`).

pub mod catalog;
pub mod tag_cache;
