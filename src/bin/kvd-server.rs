//! this binary starts the kvd server
//! to see the list of commands, type: `kvd-server --help`

use std::net::SocketAddr;
use std::process::exit;
use std::time::Duration;

use clap::{arg_enum, crate_version, value_t, App, Arg};
use kvd::thread_pool::{RayonThreadPool, SharedQueueThreadPool, ThreadPool};
use kvd::{KvStore, KvdError, KvdServer, Result, StoreConfig};
use tracing::{info, Level};
use tracing_subscriber::FmtSubscriber;

arg_enum! {
    #[allow(non_camel_case_types)]
    #[derive(Debug, Copy, Clone, PartialEq, Eq)]
    enum Pool {
        shared,
        rayon
    }
}

const DEFAULT_ADDRESS: &str = "127.0.0.1:4000";
const DEFAULT_LOG_FILE: &str = "./kvd/transaction.log";
const DEFAULT_POOL: Pool = Pool::shared;
const DEFAULT_THREADS: u32 = 4;
// one hour between snapshot attempts
const DEFAULT_SNAPSHOT_INTERVAL_SECS: u64 = 3600;

/// ['Opt'] holds parsed and validated options from the command line
#[derive(Debug)]
struct Opt {
    addr: SocketAddr,
    config: StoreConfig,
    pool: Pool,
    threads: u32,
}

impl Opt {
    /// validates the `addr` parameter and assembles the store configuration
    /// returns `Ok<Opt>` if everything is valid
    /// # Errors
    /// returns [`KvdError::Parsing`] if one of the parameters is invalid
    ///
    fn build(
        addr: &str,
        log_file: &str,
        interval_secs: u64,
        in_memory: bool,
        pool: Pool,
        threads: u32,
    ) -> Result<Opt> {
        let addr: SocketAddr = addr.parse().map_err(|_| {
            KvdError::Parsing(format!("could not parse {} into an IP address and port", &addr))
        })?;

        if threads == 0 {
            return Err(KvdError::Parsing("threads must be greater than zero".to_string()));
        }

        let mut config =
            StoreConfig::new(log_file).snapshot_interval(Duration::from_secs(interval_secs));
        if in_memory {
            config = config.in_memory();
        }

        Ok(Opt {
            addr,
            config,
            pool,
            threads,
        })
    }
}

fn main() {
    // set up a tracing subscriber to log to STDERR
    subscriber_config();

    // parse command line args
    let matches = App::new("kvd-server")
        .version(crate_version!())
        .author("the kvd developers")
        .about("a durable, multi-threaded key-value store server")
        .arg(Arg::with_name("addr")
            .long("addr")
            .value_name("IP_ADDR:PORT")
            .help("sets the IP_ADDR:PORT that the server listens on")
            .default_value(DEFAULT_ADDRESS))
        .arg(Arg::with_name("log-file")
            .long("log-file")
            .value_name("PATH")
            .help("path of the transaction log; snapshots are written to the same directory")
            .default_value(DEFAULT_LOG_FILE))
        .arg(Arg::with_name("snapshot-interval")
            .long("snapshot-interval")
            .value_name("SECONDS")
            .help("seconds between snapshot attempts")
            .default_value("3600"))
        .arg(Arg::with_name("in-memory")
            .long("in-memory")
            .help("run purely in-memory: no transaction log and no snapshots"))
        .arg(Arg::with_name("pool")
            .long("pool")
            .value_name("POOL_NAME")
            .help("sets the thread pool to use, either 'shared' or 'rayon'")
            .default_value("shared"))
        .arg(Arg::with_name("threads")
            .long("threads")
            .value_name("N")
            .help("number of threads servicing client connections")
            .default_value("4"))
        .get_matches();

    // validate command line options, store them in Opt
    let addr = matches.value_of("addr").unwrap();
    let log_file = matches.value_of("log-file").unwrap();
    let interval_secs = value_t!(matches, "snapshot-interval", u64)
        .unwrap_or(DEFAULT_SNAPSHOT_INTERVAL_SECS);
    let in_memory = matches.is_present("in-memory");
    let pool: Pool = value_t!(matches, "pool", Pool).ok().unwrap_or(DEFAULT_POOL);
    let threads = value_t!(matches, "threads", u32).unwrap_or(DEFAULT_THREADS);

    let opt = match Opt::build(addr, log_file, interval_secs, in_memory, pool, threads) {
        Ok(opt) => opt,
        Err(err) => {
            eprintln!("{:?}", err);
            exit(1);
        }
    };

    // start the server
    if let Err(e) = run(opt) {
        eprintln!("{:?}", e);
        exit(1);
    }
}

fn run(opt: Opt) -> Result<()> {
    info!("kvd-server {}", env!("CARGO_PKG_VERSION"));
    if opt.config.durability {
        info!("Transaction log: {:?}", opt.config.log_file);
        info!("Snapshot interval: {:?}", opt.config.snapshot_interval);
    } else {
        info!("Durability disabled, running in-memory");
    }
    info!("Thread pool: {} with {} threads", opt.pool, opt.threads);
    info!("Listening on {}", opt.addr);

    let store = KvStore::open(opt.config.clone())?;

    match opt.pool {
        Pool::shared => run_with_pool(store, SharedQueueThreadPool::new(opt.threads)?, opt.addr),
        Pool::rayon => run_with_pool(store, RayonThreadPool::new(opt.threads)?, opt.addr),
    }
}

fn run_with_pool<P: ThreadPool>(store: KvStore, pool: P, addr: SocketAddr) -> Result<()> {
    let server = KvdServer::new(store, pool);
    server.run(addr)
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
