// handlers/protected/mod.rs - Handlers behind the caller identity middleware
//
// Route prefix: /api/*
// Every handler receives a `Caller`. Anonymous callers reach the handlers too;
// read operations hand them empty results and write operations reject them.

pub mod blobs;
pub mod favorites;
pub mod files;
pub mod users;
