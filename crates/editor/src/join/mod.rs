//! Joined tables: single-row left joins and many-row joins

pub mod left;
pub mod many;

pub use left::LeftJoin;
pub use many::ManyJoin;

pub(crate) use many::ID_LIMIT;
