// src/linker/mod.rs

//! Binding and unbinding packages in the unified root
//!
//! [`LinkEngine`] places a package's file tree: a path nobody holds becomes
//! an exclusive link into the package's private storage, a path held by a
//! shared directory is descended into, and a path exclusively held by
//! another package is turned into a shared directory. The package that lost
//! its exclusive claim is *displaced* and relinked against the new ledger
//! state before the operation returns.
//!
//! [`UnlinkEngine`] is the inverse: it withdraws a package from every binding
//! it owns, collapsing shared directories that would be left with a single
//! owner and relinking that owner.

mod link;
mod unlink;

pub use link::LinkEngine;
pub use unlink::UnlinkEngine;

/// Record a displaced package once, preserving first-seen order
fn note_displaced(displaced: &mut Vec<String>, name: &str) {
    if !displaced.iter().any(|d| d == name) {
        displaced.push(name.to_string());
    }
}


#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_note_displaced_once() {
        let mut displaced = Vec::new();
        note_displaced(&mut displaced, "nano");
        note_displaced(&mut displaced, "vim");
        note_displaced(&mut displaced, "nano");
        assert_eq!(displaced, vec!["nano", "vim"]);
    }
}
