pub mod activity;
pub mod batch;
pub mod boundary;
pub mod cache;
pub mod guards;
pub mod significant;
