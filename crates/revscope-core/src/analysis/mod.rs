pub mod filter;
pub mod ranking;
pub mod significance;
pub mod spikes;
pub mod windows;
