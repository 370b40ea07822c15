//! Thread-per-Actor Message Passing Runtime
//!
//! Each actor owns isolated state, a blocking mailbox, and a dedicated
//! worker thread; actors communicate exclusively through immutable messages.
//! Dispatch is driven by a per-actor handler table with a dense cache
//! indexed by message identity, so the steady-state path is a single array
//! read.
//!
//! # Architecture
//!
//! ```text
//! ┌──────────────┐  send()   ┌─────────────────────────────┐
//! │ producer     │──────────▶│ Mailbox (ring + overflow)   │
//! │ thread       │           └──────────────┬──────────────┘
//! └──────────────┘                          │ pop() blocks
//!        │ fast_send()                      ▼
//!        │            ┌─────────────────────────────────────┐
//!        └───────────▶│ dispatch mutex                      │
//!                     │  handler cache ─▶ handler ─▶ reply  │
//!                     └─────────────────────────────────────┘
//! ```
//!
//! A [`Group`] multiplexes several actors on one worker thread; a
//! [`Manager`] launches workers, applies CPU affinity and scheduling class,
//! and coordinates orderly shutdown.
//!
//! # Example
//!
//! ```no_run
//! use axon_runtime::{define_message, ActorBehavior, ActorRef, HandlerTable, Manager,
//!                    Placement};
//!
//! struct Ping { count: u64 }
//! define_message!(Ping, 100);
//!
//! struct Echo;
//!
//! impl ActorBehavior for Echo {
//!     fn register_handlers(table: &mut HandlerTable<Self>) {
//!         table.on::<Ping>(|_, msg, _ctx| {
//!             println!("ping {}", msg.count);
//!         });
//!     }
//! }
//!
//! let mut manager = Manager::new();
//! let echo = ActorRef::new("echo", Echo);
//! manager.manage(&echo, Placement::default());
//! manager.init().unwrap();
//! echo.send(Ping { count: 1 }, None);
//! manager.terminate();
//! manager.end();
//! ```

pub mod actor;
pub mod config;
pub mod context;
pub mod error;
pub mod group;
pub mod handlers;
pub mod mailbox;
pub mod manager;
pub mod message;
pub mod placement;
pub mod timer;

pub use actor::{ActorBehavior, ActorRef};
pub use config::RuntimeConfig;
pub use context::{Address, Context, Recipient};
pub use error::RuntimeError;
pub use group::Group;
pub use handlers::{HandlerTable, HANDLER_CACHE_SIZE};
pub use mailbox::Mailbox;
pub use manager::{ActorStats, Manager};
pub use message::{
    Continue, Message, Shutdown, Start, Timeout, APP_ID_MIN, CONTINUE_ID, REJECT_ID,
    SEND_REQUEST_ID, SHUTDOWN_ID, START_ID, TIMEOUT_ID,
};
pub use placement::{Placement, SchedClass};
pub use timer::Timer;
