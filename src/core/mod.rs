//! # Core Wire Components
//!
//! Message tags, frame assembly and the node encoding seam.
//!
//! ## Components
//! - **Tag**: per-connection unique correlation identifiers
//! - **Frame**: text/binary/control frame kinds and the byte layout of each
//! - **Node**: trait through which binary protocol nodes are marshalled
//!
//! ## Wire Format
//! ```text
//! text:    <tag>,<json>
//! binary:  <tag>,<metric:1><flag:1><mac:32><iv:16><ciphertext>
//! keepalive (tag "!"): ?,,
//! ```

pub mod frame;
pub mod node;
pub mod tag;
