//! Pong process: binds port 5001 and replies to remote pings.
//!
//! Run this first, then `cargo run --example remote_ping` in another
//! terminal.

use serde::{Deserialize, Serialize};

use axon_remote::{register, ReceiverHandle, SenderHandle};
use axon_runtime::{define_message, ActorBehavior, ActorRef, HandlerTable, Manager, Placement};
use tracing::info;

#[derive(Debug, Default, Serialize, Deserialize)]
struct Ping {
    count: u64,
}
define_message!(Ping, 100);

#[derive(Debug, Default, Serialize, Deserialize)]
struct Pong {
    count: u64,
}
define_message!(Pong, 101);

struct PongActor;

impl ActorBehavior for PongActor {
    fn register_handlers(table: &mut HandlerTable<Self>) {
        table.on::<Ping>(|_, msg, ctx| {
            info!(count = msg.count, "received remote ping, replying");
            // The sender is a reply proxy: this goes back over the wire.
            ctx.reply(Pong { count: msg.count });
        });
    }
}

fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info".into()),
        )
        .init();

    register::<Ping>("Ping");
    register::<Pong>("Pong");

    let local_endpoint = "tcp://0.0.0.0:5001";
    let mut manager = Manager::new();
    let sender = SenderHandle::create(local_endpoint);
    let receiver = ReceiverHandle::create(local_endpoint, &sender).expect("failed to bind");

    let pong = ActorRef::new("pong", PongActor);
    receiver.register_actor("pong", &pong);

    manager.manage(sender.actor(), Placement::default());
    manager.manage(&pong, Placement::default());
    manager.manage(receiver.actor(), Placement::default());

    info!(endpoint = local_endpoint, "pong process up");
    manager.init().expect("failed to start workers");
    manager.end();
}
