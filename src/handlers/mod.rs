// handlers/mod.rs - Two-tier handler layout
//
// Public (no bearer token, own authentication such as a shared secret)
// Protected (bearer token resolved into a Caller by the identity middleware)

pub mod public;
pub mod protected;
