//! Courier demo binary
//!
//! Runs the serializer benchmark, then brings up the server/client session
//! and polls it until the operator presses Enter.
//!
//! Usage:
//!   cargo run --release -- [OPTIONS]

use std::io::BufRead;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread;

use courier::bench::{BenchmarkRunner, SamplePayload};
use courier::session::{SessionConfig, SessionManager};

/// CPU warm-up size before timing.
const WARMUP_ITERATIONS: u32 = 1_000_000;

struct DemoConfig {
    session: SessionConfig,
    bench_iterations: u32,
}

impl Default for DemoConfig {
    fn default() -> Self {
        Self {
            session: SessionConfig::default(),
            bench_iterations: 10_000,
        }
    }
}

fn main() {
    let config = parse_args();

    println!("Courier Demo - Serializer Benchmark + UDP Session");
    println!("=================================================\n");

    run_benchmark(config.bench_iterations);

    if let Err(e) = run_session(&config.session) {
        eprintln!("session error: {}", e);
        std::process::exit(1);
    }
}

fn run_benchmark(iterations: u32) {
    println!("Serializer benchmark ({} iterations)", iterations);
    println!("-------------------------------------");

    let payload = SamplePayload::demo();
    let mut runner = BenchmarkRunner::new();
    match runner.run(&payload, iterations, WARMUP_ITERATIONS) {
        Ok(report) => report.print(),
        Err(e) => eprintln!("benchmark error: {}", e),
    }
    println!();
}

fn run_session(config: &SessionConfig) -> std::io::Result<()> {
    println!(
        "Session: server on port {}, app id {:?}, capacity {}",
        config.server_port, config.app_id, config.max_peers
    );

    let mut session = SessionManager::start(config)?;

    // Operator stop signal: Enter flips the flag, the loop notices it at
    // the next cycle boundary.
    let stop = Arc::new(AtomicBool::new(false));
    {
        let stop = Arc::clone(&stop);
        thread::spawn(move || {
            let mut line = String::new();
            let _ = std::io::stdin().lock().read_line(&mut line);
            stop.store(true, Ordering::Relaxed);
        });
    }
    println!("Polling... press Enter to stop.\n");

    let result = session.run(&stop);
    session.shutdown();
    result?;

    session.reporter().print();

    println!("\nPress Enter to exit.");
    let mut line = String::new();
    let _ = std::io::stdin().lock().read_line(&mut line);
    Ok(())
}

fn parse_args() -> DemoConfig {
    let args: Vec<String> = std::env::args().collect();
    let mut config = DemoConfig::default();

    let mut i = 1;
    while i < args.len() {
        match args[i].as_str() {
            "--port" | "-p" => {
                if i + 1 < args.len() {
                    config.session.server_port =
                        args[i + 1].parse().unwrap_or(config.session.server_port);
                    i += 1;
                }
            }
            "--app-id" | "-a" => {
                if i + 1 < args.len() {
                    config.session.app_id = args[i + 1].clone();
                    i += 1;
                }
            }
            "--iterations" | "-n" => {
                if i + 1 < args.len() {
                    config.bench_iterations =
                        args[i + 1].parse().unwrap_or(config.bench_iterations);
                    i += 1;
                }
            }
            "--no-merge" => {
                config.session.merge_enabled = false;
            }
            "--help" | "-h" => {
                println!("Courier Demo - Serializer Benchmark + UDP Session\n");
                println!("Usage: courier [OPTIONS]\n");
                println!("Options:");
                println!("  -p, --port <PORT>       Server port (default: 9050)");
                println!("  -a, --app-id <ID>       Application identifier (default: myapp1)");
                println!("  -n, --iterations <N>    Benchmark iterations (default: 10000)");
                println!("      --no-merge          Disable client datagram merging");
                println!("  -h, --help              Show this help");
                std::process::exit(0);
            }
            _ => {}
        }
        i += 1;
    }

    config
}
