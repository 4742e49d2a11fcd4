//! Concrete upstream adapters for the four supported provider kinds.

pub mod gemini;
pub mod openai_compat;
