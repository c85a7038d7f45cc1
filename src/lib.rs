#[path = "core/prng.rs"]
pub mod prng;

#[path = "core/sdr.rs"]
pub mod sdr;

#[path = "core/pooler.rs"]
pub mod pooler;

#[path = "core/homeostasis.rs"]
pub mod homeostasis;
