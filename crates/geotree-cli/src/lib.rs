//! geotree-cli
//! ===========
//!
//! Command-line interface for the `geotree-core` location hierarchy.
//!
//! This crate primarily provides a binary (`geotree`). The library target
//! only exists so that docs.rs renders this overview.
//!
//! Basic usage:
//!
//! ```text
//! geotree --help
//! geotree --data tree.bin create country Nigeria
//! geotree --data tree.bin list countries
//! geotree --data tree.bin drill Nigeria South-West
//! geotree --data tree.bin --json audit
//! ```
//!
//! For programmatic access use the [`geotree-core`] crate directly.
#![cfg_attr(docsrs, feature(doc_cfg))]
