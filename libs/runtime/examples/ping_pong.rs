//! Two actors exchanging messages until a bound is reached.
//!
//! Run with: `cargo run --example ping_pong`

use axon_runtime::{
    define_message, ActorBehavior, ActorRef, HandlerTable, Manager, Placement, Start,
};
use tracing::info;

struct Ping {
    count: u64,
}
define_message!(Ping, 100);

struct Pong {
    count: u64,
}
define_message!(Pong, 101);

struct PingActor {
    pong: ActorRef,
    manager: ActorRef,
    limit: u64,
}

impl ActorBehavior for PingActor {
    fn register_handlers(table: &mut HandlerTable<Self>) {
        table.on::<Start>(|actor, _, ctx| {
            info!("starting ping-pong");
            actor.pong.send(Ping { count: 1 }, Some(ctx.address()));
        });
        table.on::<Pong>(|actor, msg, ctx| {
            info!(count = msg.count, "received pong");
            if msg.count >= actor.limit {
                info!("done");
                actor.manager.terminate();
            } else {
                actor.pong.send(Ping { count: msg.count + 1 }, Some(ctx.address()));
            }
        });
    }
}

struct PongActor;

impl ActorBehavior for PongActor {
    fn register_handlers(table: &mut HandlerTable<Self>) {
        table.on::<Ping>(|_, msg, ctx| {
            info!(count = msg.count, "received ping, replying");
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

    let mut manager = Manager::new();
    let pong = ActorRef::new("pong", PongActor);
    let ping = ActorRef::new(
        "ping",
        PingActor {
            pong: pong.clone(),
            manager: manager.handle(),
            limit: 5,
        },
    );

    manager.manage(&pong, Placement::default());
    manager.manage(&ping, Placement::default());
    manager.init().expect("failed to start workers");
    manager.end();
}
