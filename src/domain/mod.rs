//! Domain model for the order export pipeline

pub mod constants;
pub mod order;

pub use order::{ArticleRef, CartTotals, Column, OrderLine, RawRow};
