//! DTOs for the synchronous control surface.

pub mod dto;
