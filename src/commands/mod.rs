//! Front-end commands. Each one builds nothing itself: it drives an
//! iterator's record stream and reports on what came out.

pub mod count;
pub mod emit;
