#![allow(dead_code, unused_imports)]

pub mod fake_authority;
pub mod fake_transport;
pub mod snapshots;

pub use fake_authority::FakeAuthority;
pub use fake_transport::{fake_transport, FakeControl, FakeTransport};
pub use snapshots::{quiet_config, snapshot, table_roster};
