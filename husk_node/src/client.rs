#[macro_use]
extern crate log;

use anyhow::{anyhow, Error};
use clap::{crate_version, value_parser, Arg, Command};
use futures::SinkExt;
use itertools::Itertools;
use rand::thread_rng;
use tokio::io::AsyncWriteExt;
use tokio::net::TcpStream;
use tokio::runtime;
use tokio_util::codec::FramedWrite;

use husk::core::circuit::Circuit;
use husk::core::directory::{fetch_relays, MIN_DIRECTORY_RELAYS};
use husk::core::relay::codec::OnionCodec;

fn app() -> Command {
    Command::new("husk-client")
        .version(crate_version!())
        .about("Build an onion-encrypted message and send it along a relay circuit")
        .arg(
            Arg::new("directory")
                .short('d')
                .long("directory")
                .help("URL of the relay directory")
                .num_args(1)
                .default_value("http://127.0.0.1:8000"),
        )
        .arg(
            Arg::new("message")
                .short('m')
                .long("message")
                .help("Plaintext to deliver at the exit hop")
                .num_args(1)
                .default_value("Hello from the client!"),
        )
        .arg(
            Arg::new("hops")
                .short('n')
                .long("hops")
                .help("Number of relays to use for the circuit")
                .num_args(1)
                .value_parser(value_parser!(usize))
                .default_value("3"),
        )
}

fn run_client(directory: &str, message: &str, hops: usize) -> Result<(), Error> {
    if hops < MIN_DIRECTORY_RELAYS {
        warn!("A circuit of {} hops carries no anonymity value", hops);
    }

    info!("Fetching relay list from directory {}", directory);
    let relays = fetch_relays(directory)?;

    if hops == 0 || hops > relays.len() {
        return Err(anyhow!(
            "Cannot build a circuit of {} hops from {} relays",
            hops,
            relays.len(),
        ));
    }

    let chain: Vec<_> = relays.into_iter().take(hops).collect();
    info!(
        "Using relay chain: {}",
        chain.iter().map(|relay| relay.id.as_str()).format(" -> "),
    );

    let circuit = Circuit::new(chain)?;
    let onion = circuit.build_onion(&mut thread_rng(), message);
    let entry = circuit.entry().hop_address();

    let future = async move {
        info!("Connecting to first relay at {}", entry);
        let stream = TcpStream::connect((entry.host.as_str(), entry.port)).await?;
        let mut framed = FramedWrite::new(stream, OnionCodec);
        framed.send(onion).await?;
        framed.into_inner().shutdown().await?;
        Ok(())
    };

    let runtime = runtime::Builder::new_current_thread()
        .enable_all()
        .build()
        .expect("Failed to create runtime");
    runtime.block_on(future)
}

fn main() {
    let matches = app().get_matches();

    let env = env_logger::Env::default().filter_or("RUST_LOG", "info");
    env_logger::Builder::from_env(env).init();

    let directory = matches.get_one::<String>("directory").unwrap();
    let message = matches.get_one::<String>("message").unwrap();
    let hops = matches.get_one::<usize>("hops").copied().unwrap();

    if let Err(e) = run_client(directory, message, hops) {
        error!("Error in client: {}", e);
        std::process::exit(1);
    }
}
