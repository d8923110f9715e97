//! Domain model (policies, sources, destinations, errors).
//!
//! source / destination はどちらも terminal という共通の identity を持ち、
//! 具象の種類（app / space / ip_range）はどのテーブルに行があるかで決まります。

pub mod destination;
pub mod errors;
pub mod policy;
pub mod protocol;
pub mod terminal;

pub use destination::{EgressDestination, IpRange, Ports};
pub use errors::StoreError;
pub use policy::{EgressPolicy, EgressSource, NewEgressPolicy};
pub use protocol::Protocol;
pub use terminal::TerminalKind;
