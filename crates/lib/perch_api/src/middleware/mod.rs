//! Request middleware: credential carriers, identity resolution and gates.

pub mod carriers;
pub mod gates;
pub mod identity;
