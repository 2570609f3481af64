// Part of uastack, an OPC UA stack in Rust
// SPDX-License-Identifier: MPL-2.0

//! Locks used across the stack. These are `parking_lot` types; the trace
//! macros exist so lock acquisition can be followed in trace logs when
//! debugging deadlocks.

pub use parking_lot::{Mutex, RwLock};

/// Take a read lock on an `RwLock`, tracing the acquisition.
#[macro_export]
macro_rules! trace_read_lock {
    ( $x:expr ) => {{
        log::trace!("Read lock on {} at {}:{}", stringify!($x), file!(), line!());
        $x.read()
    }};
}

/// Take a write lock on an `RwLock`, tracing the acquisition.
#[macro_export]
macro_rules! trace_write_lock {
    ( $x:expr ) => {{
        log::trace!("Write lock on {} at {}:{}", stringify!($x), file!(), line!());
        $x.write()
    }};
}

/// Lock a `Mutex`, tracing the acquisition.
#[macro_export]
macro_rules! trace_lock {
    ( $x:expr ) => {{
        log::trace!("Lock on {} at {}:{}", stringify!($x), file!(), line!());
        $x.lock()
    }};
}
