//! Counter application wiring modules, a combiner, middleware and an async action

use statehub::{middleware, Module, Store, StoreConfig};
use std::time::Duration;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Clone, Debug)]
enum State {
    Counter { count: i32, step: i32 },
    History(Vec<i32>),
    Summary(String),
}

fn counter() -> Module<State> {
    Module::new(State::Counter { count: 0, step: 1 })
        .mutation("increment", |api, _| match api.state() {
            State::Counter { count, step } => {
                let count = count + step;
                api.mutate("history", "record", Some(State::Counter { count, step: *step }))?;
                Ok(State::Counter { count, step: *step })
            }
            other => Ok(other.clone()),
        })
        .mutation("set_step", |api, data| match (api.state(), data) {
            (State::Counter { count, .. }, Some(State::Counter { step, .. })) => Ok(State::Counter {
                count: *count,
                step,
            }),
            (state, _) => Ok(state.clone()),
        })
        .action("increment_later", |api, data| {
            let delay = match data {
                Some(State::Counter { count, .. }) => count.max(0) as u64,
                _ => 0,
            };
            tokio::spawn(async move {
                tokio::time::sleep(Duration::from_millis(delay)).await;
                if let Err(err) = api.mutate(api.hash(), "increment", None) {
                    tracing::warn!(%err, "delayed increment failed");
                }
            });
            Ok(())
        })
}

fn history() -> Module<State> {
    Module::new(State::History(vec![0])).mutation("record", |api, data| {
        match (api.state(), data) {
            (State::History(entries), Some(State::Counter { count, .. })) => {
                let mut entries = entries.clone();
                entries.push(count);
                Ok(State::History(entries))
            }
            (state, _) => Ok(state.clone()),
        }
    })
}

fn summarize(states: &[&State]) -> State {
    match states {
        [State::Counter { count, step }, State::History(entries)] => State::Summary(format!(
            "count={count} step={step} changes={}",
            entries.len() - 1
        )),
        _ => State::Summary(String::from("unavailable")),
    }
}

#[tokio::main]
async fn main() -> statehub::Result<()> {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info"));
    tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer().with_target(true))
        .init();

    println!("=== Complete Counter Application ===\n");

    let store = Store::with_config(StoreConfig::new("counter-app"));
    store.use_middleware(middleware::logger::<State>());

    println!("1. Registering modules");
    store.register("counter", counter())?;
    store.register("history", history())?;
    store.combine("summary", ["counter", "history"], summarize)?;

    println!("\n2. Subscribing to the summary");
    let summary = store.subscribe("summary", |state| {
        if let State::Summary(text) = state {
            println!("   [Summary] {text}");
        }
    })?;

    println!("\n3. Incrementing synchronously");
    store.mutate("counter", "increment", None)?;
    store.mutate("counter", "increment", None)?;

    println!("\n4. Changing step to 5");
    store.mutate(
        "counter",
        "set_step",
        Some(State::Counter { count: 0, step: 5 }),
    )?;

    println!("\n5. Dispatching a delayed increment");
    store.dispatch(
        "counter",
        "increment_later",
        Some(State::Counter { count: 50, step: 0 }),
    )?;
    tokio::time::sleep(Duration::from_millis(100)).await;

    println!("\n6. Tearing down");
    store.unsubscribe("summary", summary)?;
    store.uncombine("summary")?;
    store.unregister("history")?;
    store.unregister("counter")?;

    println!("\n✓ Example complete!");
    Ok(())
}
