// handlers/elevated/mod.rs - administrator endpoints under /_api/admin

pub mod admin;
pub mod tags;
