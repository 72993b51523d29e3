// handlers/public/mod.rs - Handlers without bearer token authentication
//
// Route prefix: /webhooks/*

pub mod webhooks;
