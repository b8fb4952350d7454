use crabscan::camera::NativeCamera;
use crabscan::decode::QrDecoder;
use crabscan::formats::catalog;
use crabscan::permissions::check_permission_detailed;
use crabscan::{
    Facing, FormatId, ScanEvent, ScanMode, ScanResult, ScannerConfig, ScannerController,
};
use std::env;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{broadcast, mpsc};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    crabscan::init_logging();

    let args: Vec<String> = env::args().collect();
    if args.len() < 2 {
        print_usage();
        std::process::exit(1);
    }

    let command = &args[1];
    match command.as_str() {
        "list-devices" => cmd_list_devices(&args).await,
        "list-formats" => cmd_list_formats(&args),
        "check-permission" => cmd_check_permission(&args),
        "scan" => cmd_scan(&args).await,
        _ => {
            eprintln!("Unknown command: {}", command);
            print_usage();
            std::process::exit(1);
        }
    }
}

fn print_usage() {
    eprintln!("Usage: crabscan-cli <command> [args]");
    eprintln!("  list-devices [--json]");
    eprintln!("  list-formats [--json]");
    eprintln!("  check-permission [--json]");
    eprintln!("  scan [--facing front|rear] [--single] [--formats A,B] [--timeout <ms>] [--config <path>] [--json]");
}

fn json_requested(args: &[String]) -> bool {
    args.iter().any(|a| a == "--json")
}

fn controller(config: ScannerConfig) -> Result<ScannerController, Box<dyn std::error::Error>> {
    Ok(ScannerController::new(
        Arc::new(NativeCamera::new()),
        Arc::new(QrDecoder::new()),
        config,
    )?)
}

async fn cmd_list_devices(args: &[String]) -> Result<(), Box<dyn std::error::Error>> {
    let scanner = controller(ScannerConfig::default())?;
    let devices = scanner.list_devices().await?;
    scanner.shutdown().await;

    if json_requested(args) {
        println!("{}", serde_json::to_string(&devices)?);
    } else {
        for d in devices {
            let facing = d.facing.map(|f| f.as_str()).unwrap_or("unknown");
            println!("{}: {} ({})", d.id, d.label, facing);
        }
    }
    Ok(())
}

fn cmd_list_formats(args: &[String]) -> Result<(), Box<dyn std::error::Error>> {
    let formats = catalog();
    if json_requested(args) {
        println!("{}", serde_json::to_string(&formats)?);
    } else {
        for f in formats {
            let kind = if f.two_dimensional { "2D" } else { "1D" };
            println!("{:<13} {:<13} {}", f.id, f.name, kind);
        }
    }
    Ok(())
}

fn cmd_check_permission(args: &[String]) -> Result<(), Box<dyn std::error::Error>> {
    let info = check_permission_detailed();
    if json_requested(args) {
        println!("{}", serde_json::to_string(&info)?);
    } else {
        println!("{}: {}", info.status, info.message);
    }
    Ok(())
}

async fn cmd_scan(args: &[String]) -> Result<(), Box<dyn std::error::Error>> {
    // Parse args: scan [--facing f] [--single] [--formats A,B] [--timeout ms] [--config path] [--json]
    let mut facing = None;
    let mut single = false;
    let mut formats = None;
    let mut timeout_ms = None;
    let mut config_path = None;

    let mut i = 2;
    while i < args.len() {
        match args[i].as_str() {
            "--facing" => {
                i += 1;
                facing = Some(arg_value(args, i, "--facing")?.parse::<Facing>()?);
            }
            "--formats" => {
                i += 1;
                let list = arg_value(args, i, "--formats")?
                    .split(',')
                    .map(|name| name.parse::<FormatId>())
                    .collect::<Result<Vec<_>, _>>()?;
                formats = Some(list);
            }
            "--timeout" => {
                i += 1;
                timeout_ms = Some(arg_value(args, i, "--timeout")?.parse::<u64>()?);
            }
            "--config" => {
                i += 1;
                config_path = Some(arg_value(args, i, "--config")?.to_string());
            }
            "--single" => single = true,
            "--json" => {}
            other => return Err(format!("Unknown argument: {}", other).into()),
        }
        i += 1;
    }
    let json = json_requested(args);

    let mut config = match config_path {
        Some(path) => ScannerConfig::load_from_file(path)?,
        None => ScannerConfig::load_or_default(),
    };
    if let Some(facing) = facing {
        config.camera.default_facing = facing;
    }
    if single {
        config.scan.mode = ScanMode::SingleShot;
    }

    let scanner = controller(config)?;
    if let Some(formats) = formats {
        scanner.set_formats(formats).await?;
    }

    let (interrupt_tx, mut interrupt) = mpsc::unbounded_channel();
    ctrlc::set_handler(move || {
        let _ = interrupt_tx.send(());
    })?;

    let mut events = scanner.events();
    scanner.start().await?;
    if !json {
        eprintln!("Scanning, press Ctrl+C to stop");
    }

    let deadline = async move {
        match timeout_ms {
            Some(ms) => tokio::time::sleep(Duration::from_millis(ms)).await,
            None => std::future::pending().await,
        }
    };
    tokio::pin!(deadline);

    let outcome = loop {
        tokio::select! {
            _ = interrupt.recv() => break Ok(()),
            _ = &mut deadline => {
                log::info!("Scan timed out");
                break Ok(());
            }
            event = events.recv() => match event {
                Ok(ScanEvent::ResultDecoded(result)) => {
                    print_result(&result, json)?;
                    if single {
                        break Ok(());
                    }
                }
                Ok(ScanEvent::Failed(failure)) => {
                    break Err(format!("{}: {}", failure.kind, failure.message));
                }
                Ok(ScanEvent::DecodeFault(message)) => {
                    break Err(format!("decode_fault: {}", message));
                }
                Ok(ScanEvent::StatusChanged { .. }) => {}
                Err(broadcast::error::RecvError::Lagged(skipped)) => {
                    log::warn!("Missed {} scanner events", skipped);
                }
                Err(broadcast::error::RecvError::Closed) => break Ok(()),
            }
        }
    };

    let stats = scanner.stats();
    log::info!(
        "Sampled {} frames ({} without a code)",
        stats.frames_sampled,
        stats.soft_misses
    );
    scanner.shutdown().await;
    Ok(outcome?)
}

fn arg_value<'a>(args: &'a [String], index: usize, flag: &str) -> Result<&'a str, String> {
    args.get(index)
        .map(String::as_str)
        .ok_or_else(|| format!("{} requires a value", flag))
}

fn print_result(result: &ScanResult, json: bool) -> Result<(), Box<dyn std::error::Error>> {
    if json {
        println!("{}", serde_json::to_string(result)?);
    } else {
        println!("{}: {}", result.format_name, result.text);
    }
    Ok(())
}
