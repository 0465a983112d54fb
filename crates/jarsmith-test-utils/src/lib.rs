//! Utilities shared by jarsmith tests.
//!
//! [`ClassBuilder`] assembles class files byte by byte so tests can describe
//! exactly the constant pool and attributes they exercise, without a Java
//! compiler. [`write_jar`] and [`read_jar`] create and inspect archives.
//!
//! This crate deliberately does not depend on any jarsmith crate: fixtures are
//! produced independently of the code under test.

mod class_builder;
mod jar;

pub use class_builder::{ClassBuilder, Target, ACC_PUBLIC, ACC_SUPER};
pub use jar::{read_jar, write_jar, JarEntry};

pub fn u2(value: u16) -> [u8; 2] {
    value.to_be_bytes()
}

pub fn u4(value: u32) -> [u8; 4] {
    value.to_be_bytes()
}
