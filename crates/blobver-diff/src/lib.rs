//! Content comparison for blobver.
//!
//! The dedup gate and the collapse engine both need to decide whether two
//! objects hold "the same" content, and the collapse engine needs to put
//! direct objects in version order. Both decisions are capabilities passed in
//! by the caller:
//!
//! - [`ContentEquality`] — are two streams equivalent?
//!   - [`OrdinalStreamEquality`] — byte-for-byte, chunked, constant memory
//!   - [`JsonEquality`] — structural JSON equality, byte fallback
//! - [`NameComparer`] — how do two direct paths order?
//!   - [`OrdinalNameComparer`] — lexicographic (timestamp versions)
//!   - [`NumericNameComparer`] — by placeholder value (number versions)

pub mod equality;
pub mod ordering;
pub mod stream;

pub use equality::{ContentEquality, JsonEquality, OrdinalStreamEquality};
pub use ordering::{NameComparer, NumericNameComparer, OrdinalNameComparer};
pub use stream::{streams_equal, ByteStream};
