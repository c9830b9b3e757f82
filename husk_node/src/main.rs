#[macro_use]
extern crate log;

mod node_config;

use std::fs::File;
use std::io::Read;

use anyhow::Error;
use futures::Future;
use tokio::net::TcpListener;
use tokio::runtime;

use husk::core::relay::server::{relay_run, Server};
use husk::crypto::{LayerKey, KEY_SIZE};

use crate::node_config::*;

/// Load the relay's layer key from a file holding the raw 32 key bytes.
fn load_key(keys_file: &str) -> LayerKey {
    let mut file = File::open(keys_file).expect("Failed to open the keys file");
    let mut buf = [0; KEY_SIZE];
    file.read_exact(&mut buf)
        .expect("Failed to read the key from the keys file");
    LayerKey::from(buf)
}

/// Run a future with the runtime specified by config.
fn run<F>(future: F, threads: Threads)
where
    F: Future<Output = Result<(), Error>> + 'static,
{
    if threads == Threads::N(1) {
        let runtime = runtime::Builder::new_current_thread()
            .enable_all()
            .build()
            .expect("Failed to create runtime");
        runtime.block_on(future).expect("Execution was terminated with error");
    } else {
        let mut builder = runtime::Builder::new_multi_thread();
        match threads {
            Threads::N(n) => {
                builder.worker_threads(n as usize);
            },
            Threads::Auto => {}, // builder will detect number of cores automatically
        }
        let runtime = builder
            .enable_all()
            .build()
            .expect("Failed to create runtime");
        runtime.block_on(future).expect("Execution was terminated with error");
    };
}

fn main() {
    let config = cli_parse();

    match config.log_type {
        LogType::Stderr => {
            let env = env_logger::Env::default().filter_or("RUST_LOG", "info");
            env_logger::Builder::from_env(env).init();
        },
        LogType::Stdout => {
            let env = env_logger::Env::default().filter_or("RUST_LOG", "info");
            env_logger::Builder::from_env(env)
                .target(env_logger::fmt::Target::Stdout)
                .init();
        },
        LogType::None => {},
    }

    for key in config.unused.keys() {
        warn!("Unused configuration key: {:?}", key);
    }

    let key = if let Some(ref key) = config.key {
        key.clone()
    } else if let Some(ref keys_file) = config.keys_file {
        load_key(keys_file)
    } else {
        panic!("Neither relay key nor keys file is specified")
    };

    if config.key_passed_as_arg {
        warn!(
            "You should not pass the relay key via arguments due to \
             security reasons. Use the environment variable instead"
        );
    }

    let server = Server::new(config.id.clone(), key);
    let bind_addr = config.bind_addr;

    let future = async move {
        let listener = TcpListener::bind(&bind_addr).await?;
        relay_run(&server, listener).await.map_err(Error::from)
    };

    run(future, config.threads);
}
