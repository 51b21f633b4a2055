//! Tree-TDMA sensor mesh command-line tools
//!
//! This CLI works against a topology JSON file:
//! - Resolve a device's routing and schedule state
//! - Print the full slot schedule
//! - Step a device's slotter through its cycles
//! - Encode a data fragment to wire bytes

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use std::fs;
use std::path::PathBuf;
use tdmesh_core::{
    Addr, Fragment, NetworkInfo, Schedule, Slotter, SlotterState, Topology, SLOT_NONE,
};
use tracing::debug;

#[derive(Parser)]
#[command(name = "tdmesh")]
#[command(author, version, about = "Tree-TDMA sensor mesh toolkit", long_about = None)]
struct Cli {
    /// Enable verbose output
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Resolve one device's routing and schedule state
    Resolve {
        /// Topology JSON file
        #[arg(short, long)]
        topology: PathBuf,

        /// Device name to resolve
        #[arg(short, long)]
        name: String,

        /// Emit JSON instead of a table
        #[arg(long)]
        json: bool,
    },

    /// Print the slot schedule for a whole topology
    Schedule {
        /// Topology JSON file
        #[arg(short, long)]
        topology: PathBuf,

        /// Emit JSON instead of a table
        #[arg(long)]
        json: bool,
    },

    /// Step a device's slotter through one refresh period
    Simulate {
        /// Topology JSON file
        #[arg(short, long)]
        topology: PathBuf,

        /// Device name to simulate
        #[arg(short, long)]
        name: String,

        /// Refresh periods to run
        #[arg(long, default_value = "1")]
        refreshes: u32,
    },

    /// Encode a fragment and print the wire bytes
    Frame {
        /// Destination address (hex, e.g. 0x1000)
        #[arg(long)]
        dst: String,

        /// Source address (hex)
        #[arg(long)]
        src: String,

        /// Sequence number
        #[arg(long, default_value = "0")]
        seq: u8,

        /// Payload as hex bytes (e.g. aabb01)
        #[arg(long, default_value = "")]
        payload: String,
    },
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    let level = match cli.verbose {
        0 => tracing::Level::WARN,
        1 => tracing::Level::INFO,
        2 => tracing::Level::DEBUG,
        _ => tracing::Level::TRACE,
    };
    tracing_subscriber::fmt()
        .with_max_level(level)
        .with_target(false)
        .init();

    match cli.command {
        Commands::Resolve {
            topology,
            name,
            json,
        } => resolve(&topology, &name, json),
        Commands::Schedule { topology, json } => schedule(&topology, json),
        Commands::Simulate {
            topology,
            name,
            refreshes,
        } => simulate(&topology, &name, refreshes),
        Commands::Frame {
            dst,
            src,
            seq,
            payload,
        } => frame(&dst, &src, seq, &payload),
    }
}

fn load_topology(path: &PathBuf) -> Result<Topology> {
    let json = fs::read_to_string(path)
        .with_context(|| format!("reading topology {}", path.display()))?;
    Topology::from_json(&json).with_context(|| format!("parsing topology {}", path.display()))
}

fn resolve(path: &PathBuf, name: &str, json: bool) -> Result<()> {
    let topology = load_topology(path)?;
    let info = NetworkInfo::resolve(&topology, name)
        .with_context(|| format!("resolving `{name}`"))?;

    if json {
        println!("{}", serde_json::to_string_pretty(&info)?);
        return Ok(());
    }

    println!("device       {name}");
    println!("type         {:?}", info.router.device_type);
    println!("address      {}", info.router.address);
    println!("parent       {}", info.router.parent);
    println!(
        "children     {} routers, {} end devices",
        info.router.router_count, info.router.node_count
    );
    println!("self slot    {}", fmt_slot(info.slotter.self_slot));
    println!("child slot   {}", fmt_slot(info.slotter.child_slot));
    println!("descendants  {} slots", info.slotter.child_slot_count);
    println!("cycle        {} slots total", info.slotter.total_slots);
    println!("refresh      every {} cycles", info.slotter.cycles_per_refresh);
    Ok(())
}

fn schedule(path: &PathBuf, json: bool) -> Result<()> {
    let topology = load_topology(path)?;
    let schedule = Schedule::build(&topology).context("building schedule")?;

    if json {
        println!("{}", serde_json::to_string_pretty(&schedule)?);
        return Ok(());
    }

    println!("{} slots per cycle", schedule.total_slots());
    println!("slot  addr  tier  device");
    for entry in schedule.entries() {
        let span = if entry.width == 1 {
            format!("{:>4}", entry.slot)
        } else {
            format!("{}-{}", entry.slot, entry.slot + entry.width - 1)
        };
        println!("{span:>4}  {}  {:>4}  {}", entry.address, entry.tier, entry.name);
    }
    Ok(())
}

fn simulate(path: &PathBuf, name: &str, refreshes: u32) -> Result<()> {
    let topology = load_topology(path)?;
    let info = NetworkInfo::resolve(&topology, name)
        .with_context(|| format!("resolving `{name}`"))?;
    let mut slotter = Slotter::from_info(&info.slotter);
    debug!(slotter = ?info.slotter, "seeded slotter");

    println!("simulating `{name}` for {refreshes} refresh period(s)");
    for period in 0..refreshes {
        println!("-- refresh {period}");
        loop {
            let state = slotter.next_state();
            let wait = slotter.get_slot_wait();
            match state {
                SlotterState::WaitRefresh => {
                    println!("   wait-refresh (hold for coordinator)");
                    break;
                }
                SlotterState::Error => bail!("slotter entered error state"),
                _ => println!("   sleep {wait:>3} slots, then {state}"),
            }
        }
    }
    Ok(())
}

fn frame(dst: &str, src: &str, seq: u8, payload: &str) -> Result<()> {
    let dst = parse_addr(dst)?;
    let src = parse_addr(src)?;
    let payload = parse_hex(payload)?;
    let fragment = Fragment::new(dst, src, seq, &payload)?;

    let bytes = fragment.to_bytes();
    println!(
        "{}",
        bytes
            .iter()
            .map(|b| format!("{b:02x}"))
            .collect::<Vec<_>>()
            .join(" ")
    );
    Ok(())
}

fn fmt_slot(slot: u8) -> String {
    if slot == SLOT_NONE {
        "none".to_string()
    } else {
        slot.to_string()
    }
}

fn parse_addr(text: &str) -> Result<Addr> {
    let digits = text.trim_start_matches("0x");
    let word = u16::from_str_radix(digits, 16)
        .with_context(|| format!("`{text}` is not a hex address"))?;
    Ok(Addr::from_u16(word))
}

fn parse_hex(text: &str) -> Result<Vec<u8>> {
    if text.len() % 2 != 0 {
        bail!("payload hex must have an even number of digits");
    }
    (0..text.len())
        .step_by(2)
        .map(|i| {
            u8::from_str_radix(&text[i..i + 2], 16)
                .with_context(|| format!("`{}` is not a hex byte", &text[i..i + 2]))
        })
        .collect()
}
