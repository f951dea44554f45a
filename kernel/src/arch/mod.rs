//! Architecture support. This kernel targets x86_64 only (spec §1 has no
//! multi-architecture requirement).

pub mod x86_64;
