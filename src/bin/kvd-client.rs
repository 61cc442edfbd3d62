//! The kvd-client executable supports the following command line arguments:
//!
//! `kvd-client set <KEY> <VALUE> [--addr IP-PORT]`
//!
//!     Set the value of a string key to a JSON-encoded string.
//!
//! `kvd-client get <KEY> [--addr IP-PORT]`
//!
//!     Get the value of a given string key.
//!
//! `kvd-client rm <KEY> [--addr IP-PORT]`
//!
//!     Remove a given key, printing the value it held.
//!
//! `kvd-client keys [--addr IP-PORT]`
//!
//!     Print every key in the store, one per line.
//!
//! `kvd-client values [--addr IP-PORT]`
//!
//!     Print every value in the store, one per line.
//!
//! `kvd-client all [--addr IP-PORT]`
//!
//!     Print every key/value entry in the store.
//!
//! `kvd-client clear [--addr IP-PORT]`
//!
//!     Remove every entry from the store.
//!
//! --addr accepts an IP address, either v4 or v6, and a port number, with
//! the format IP:PORT. If --addr is not specified then connect on
//! 127.0.0.1:4000. Each command prints an error and returns a non-zero exit
//! code on server error, or if IP-PORT does not parse as an address.

use std::net::SocketAddr;

use clap::{crate_version, App, Arg, ArgMatches, SubCommand};
use kvd::{KvdClient, KvdError, Request, Result};
use tracing::Level;
use tracing_subscriber::FmtSubscriber;

const DEFAULT_ADDRESS: &str = "127.0.0.1:4000";

/// ['Opt'] holds parsed and validated options from the command line
#[derive(Debug)]
struct Opt {
    /// the server's ip:port
    addr: SocketAddr,
    req: Request,
}

impl Opt {
    fn new(addr: SocketAddr, req: Request) -> Self {
        Self { addr, req }
    }

    /// validates the `addr` parameter is a valid IP address and PORT
    /// returns `Ok<Opt>` if everything is valid
    /// # Errors
    /// returns [`KvdError::Parsing`] if one of the parameters is invalid
    ///
    fn build(addr: &str, req: Request) -> Result<Opt> {
        let addr: SocketAddr = addr.parse().map_err(|_| {
            KvdError::Parsing(format!("could not parse {} into an IP address and port", &addr))
        })?;

        Ok(Opt::new(addr, req))
    }
}

fn main() -> Result<()> {
    // configure a subscriber that will log messages to STDERR
    subscriber_config();

    let matches = App::new("kvd-client")
        .version(crate_version!())
        .author("the kvd developers")
        .about("a durable, multi-threaded key-value store")
        .subcommands(vec![
            SubCommand::with_name("set")
                .about("Set the value of a string key to a JSON-encoded string")
                .arg(Arg::with_name("KEY").required(true).index(1))
                .arg(Arg::with_name("VALUE").required(true).index(2)),
            SubCommand::with_name("get")
                .about("Get the value of a given string key")
                .arg(Arg::with_name("KEY").required(true).index(1)),
            SubCommand::with_name("rm")
                .about("Removes a given key, printing the value it held")
                .arg(Arg::with_name("KEY").required(true).index(1)),
            SubCommand::with_name("keys").about("Print every key in the store"),
            SubCommand::with_name("values").about("Print every value in the store"),
            SubCommand::with_name("all").about("Print every key/value entry in the store"),
            SubCommand::with_name("clear").about("Remove every entry from the store"),
        ])
        .arg(Arg::with_name("addr")
            .long("addr")
            .value_name("IP_ADDR:PORT")
            .help("sets the IP_ADDR:PORT of the server to connect to")
            .default_value(DEFAULT_ADDRESS))
        .get_matches();

    // parse commands into an Opt struct
    match parse_options(matches) {
        Ok(opt) => run(opt),
        Err(e) => Err(e),
    }
}

/// runs the specified request on the [`KvdClient`]
/// `opt` contains the server address and the request type to execute
fn run(opt: Opt) -> Result<()> {
    let mut client = KvdClient::connect(opt.addr)?;
    match opt.req {
        Request::Get { key } => {
            if let Some(value) = client.get(key)? {
                println!("{}", value);
            } else {
                println!("Key not found");
            }
        }
        Request::Set { key, value } => {
            client.set(key, value)?;
        }
        Request::Delete { key } => {
            if let Some(previous) = client.delete(key)? {
                println!("{}", previous);
            } else {
                println!("Key not found");
            }
        }
        Request::GetKeys => {
            for key in client.get_keys()? {
                println!("{}", key);
            }
        }
        Request::GetValues => {
            for value in client.get_values()? {
                println!("{}", value);
            }
        }
        Request::GetAll => {
            for (key, value) in client.get_all()? {
                println!("{}: {}", key, value);
            }
        }
        Request::DeleteAll => {
            client.delete_all()?;
        }
    }
    Ok(())
}

/// parses the matches from the command line into an [`Opt`] struct
fn parse_options(matches: ArgMatches) -> Result<Opt> {
    let addr = matches.value_of("addr").unwrap();
    match matches.subcommand() {
        ("set", Some(args)) => {
            let key = args.value_of("KEY").map(String::from).unwrap();
            let value = args.value_of("VALUE").map(String::from).unwrap();
            Opt::build(addr, Request::Set { key, value })
        }
        ("get", Some(args)) => {
            let key = args.value_of("KEY").map(String::from).unwrap();
            Opt::build(addr, Request::Get { key })
        }
        ("rm", Some(args)) => {
            let key = args.value_of("KEY").map(String::from).unwrap();
            Opt::build(addr, Request::Delete { key })
        }
        ("keys", Some(_)) => Opt::build(addr, Request::GetKeys),
        ("values", Some(_)) => Opt::build(addr, Request::GetValues),
        ("all", Some(_)) => Opt::build(addr, Request::GetAll),
        ("clear", Some(_)) => Opt::build(addr, Request::DeleteAll),
        _ => panic!("unknown command received"),
    }
}

/// configures a tracing subscriber that will log to STDERR
fn subscriber_config() {
    let subscriber = FmtSubscriber::builder()
        // all spans/events with a level higher than TRACE (e.g, debug, info, warn, etc.)
        // will be written to stdout.
        .with_max_level(Level::TRACE)
        // log to stderr instrad of stdout
        .with_writer(std::io::stderr)
        // completes the builder.
        .finish();
    tracing::subscriber::set_global_default(subscriber)
        .expect("setting tracing default subscriber failed");
}
