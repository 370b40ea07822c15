//! Ping process: binds port 5002 and drives a remote ping-pong against the
//! pong process on port 5001.
//!
//! Start `cargo run --example remote_pong` first.

use serde::{Deserialize, Serialize};

use axon_remote::{register, ReceiverHandle, RemoteRef, SenderHandle};
use axon_runtime::{
    define_message, ActorBehavior, ActorRef, HandlerTable, Manager, Placement, Start,
};
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

struct PingActor {
    pong: RemoteRef,
    manager: ActorRef,
    limit: u64,
}

impl ActorBehavior for PingActor {
    fn register_handlers(table: &mut HandlerTable<Self>) {
        table.on::<Start>(|actor, _, _| {
            info!("starting remote ping-pong");
            if let Err(e) = actor.pong.send(Ping { count: 1 }, Some("ping")) {
                info!(error = %e, "could not send first ping");
            }
        });
        table.on::<Pong>(|actor, msg, _| {
            info!(count = msg.count, "received remote pong");
            if msg.count >= actor.limit {
                info!("done");
                actor.manager.terminate();
            } else if let Err(e) = actor.pong.send(Ping { count: msg.count + 1 }, Some("ping")) {
                info!(error = %e, "could not send ping");
            }
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

    let local_endpoint = "tcp://0.0.0.0:5002";
    let remote_pong_endpoint = "tcp://127.0.0.1:5001";

    let mut manager = Manager::new();
    let sender = SenderHandle::create(local_endpoint);
    let receiver = ReceiverHandle::create(local_endpoint, &sender).expect("failed to bind");

    let ping = ActorRef::new(
        "ping",
        PingActor {
            pong: sender.remote_ref("pong", remote_pong_endpoint),
            manager: manager.handle(),
            limit: 5,
        },
    );
    receiver.register_actor("ping", &ping);

    manager.manage(sender.actor(), Placement::default());
    manager.manage(&ping, Placement::default());
    manager.manage(receiver.actor(), Placement::default());

    info!(endpoint = local_endpoint, "ping process up");
    manager.init().expect("failed to start workers");
    manager.end();
}
