//! Git integration for revtree.
//!
//! A dedicated `std::thread::spawn` thread holds the `git2::Repository` for its
//! lifetime (Repository is !Send) and answers requests for the list of changed
//! files in a given diff mode.
pub mod types;
pub mod worker;
