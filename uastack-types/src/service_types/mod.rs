// Part of uastack, an OPC UA stack in Rust
// SPDX-License-Identifier: MPL-2.0

//! Service request and response structures, hand-maintained for the service
//! sets the stack implements. Field order matches the schema declaration
//! order, which is what the binary encoding derives rely on.

mod attribute_svc;
mod call_svc;
mod filter;
mod monitored_items;
mod node_management;
mod secure_channel;
mod session;
mod subscription;

pub use attribute_svc::*;
pub use call_svc::*;
pub use filter::*;
pub use monitored_items::*;
pub use node_management::*;
pub use secure_channel::*;
pub use session::*;
pub use subscription::*;
