//! Dual-PoW miner CLI
//!
//! Runs the mining loop against an in-process coordinator and inspects
//! work packs.

use clap::{Parser, Subcommand};
use dualpow_ledger::codec::Buf32;
use dualpow_ledger::core::{current_timestamp, mint_amount, target_with_leading_zeros, Block, TxOut};
use dualpow_ledger::crypto::KeyPair;
use dualpow_ledger::mining::{
    run_devices, verify_work_pack_pow, LocalCoordinator, Miner, MinerConfig, ParallelBackend,
    WorkPack,
};
use dualpow_ledger::script::Script;
use std::path::PathBuf;
use std::sync::Arc;
use tokio::sync::watch;

#[derive(Parser)]
#[command(name = "pow-miner")]
#[command(author = "Darshan")]
#[command(version = "0.1.0")]
#[command(about = "Dual proof-of-work miner", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Mine against a local in-process coordinator
    Mine {
        /// Miner config file (JSON)
        #[arg(short, long)]
        config: Option<PathBuf>,

        /// Parallel hash backend (cpu, rayon)
        #[arg(short, long)]
        backend: Option<ParallelBackend>,

        /// Number of devices to run
        #[arg(short, long, default_value = "1")]
        devices: usize,

        /// Stop each device after this many work packs
        #[arg(short, long)]
        work_packs: Option<u64>,

        /// Initial block target as 64 hex chars
        #[arg(long, conflicts_with = "leading_zeros")]
        initial_target: Option<String>,

        /// Initial block target as a count of leading zero bits
        #[arg(long, default_value = "8")]
        leading_zeros: u32,
    },

    /// Write the default miner config to a file
    InitConfig {
        /// Output file path
        #[arg(short, long)]
        output: PathBuf,
    },

    /// Verify the proof of work of a hex-encoded work pack
    VerifyWorkPack {
        /// Work pack hex
        hex: String,
    },
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Mine {
            config,
            backend,
            devices,
            work_packs,
            initial_target,
            leading_zeros,
        } => {
            let mut config = match config {
                Some(path) => MinerConfig::load_from_file(&path)?,
                None => MinerConfig::default(),
            };
            if let Some(backend) = backend {
                config.parallel_backend = backend;
            }
            if work_packs.is_some() {
                config.max_work_packs = work_packs;
            }
            let target = match initial_target {
                Some(hex) => Buf32::from_hex(&hex)?,
                None => target_with_leading_zeros(leading_zeros),
            };
            run_mine(config, devices.max(1), target)?;
        }

        Commands::InitConfig { output } => {
            MinerConfig::default().save_to_file(&output)?;
            println!("✅ Wrote default config to {}", output.display());
        }

        Commands::VerifyWorkPack { hex } => {
            let work_pack = WorkPack::from_hex(&hex)?;
            let header = &work_pack.header;
            println!("📦 Work pack for block {}", header.block_num);
            println!("   Header id:   {}", header.id());
            println!("   Target:      {}", header.target);
            println!(
                "   Algorithms:  {} / {}",
                header.work_ser_algo_str(),
                header.work_par_algo_str()
            );
            match verify_work_pack_pow(header, &work_pack.lch10_ids) {
                Ok(()) => {
                    println!("✅ Proof of work is valid");
                    if header.id_meets_target() {
                        println!("   Header id meets the block target");
                    }
                }
                Err(e) => {
                    println!("❌ Proof of work is invalid: {}", e);
                    std::process::exit(1);
                }
            }
        }
    }

    Ok(())
}

fn run_mine(
    config: MinerConfig,
    devices: usize,
    target: Buf32,
) -> Result<(), Box<dyn std::error::Error>> {
    let rt = tokio::runtime::Runtime::new()?;

    rt.block_on(async {
        let keys = KeyPair::generate();
        let mint_script = Script::pkh_output(&keys.pkh());
        let genesis = Block::genesis(
            current_timestamp(),
            target,
            b"pow-miner genesis",
            vec![TxOut::new(mint_amount(0), mint_script.clone())],
        );
        println!("⛏️  Mining on local chain, genesis {}", genesis.id());
        println!("   Rewards to {}", keys.address());

        let coordinator = Arc::new(
            LocalCoordinator::new(genesis, mint_script)
                .with_backend(config.parallel_backend.backend()),
        );
        let mut miners = Vec::with_capacity(devices);
        for device in 0..devices {
            miners.push(Miner::new(device, coordinator.clone(), config.clone())?);
        }

        let (shutdown_tx, shutdown_rx) = watch::channel(false);
        tokio::spawn(async move {
            tokio::signal::ctrl_c().await.ok();
            println!("\n📴 Shutting down miners...");
            shutdown_tx.send(true).ok();
        });

        let reports = run_devices(&miners, shutdown_rx).await;

        println!("\n📊 Mining summary");
        for (device, report) in reports.iter().enumerate() {
            println!(
                "   Device {}: {} work packs, {} hashes, {} shares, {} blocks",
                device,
                report.work_packs,
                report.hash_attempts,
                report.valid_shares,
                report.valid_blocks
            );
        }
        println!("   Chain height: {}", coordinator.height().await);
        println!("   Total hashes: {}", coordinator.hash_count().await);

        Ok::<(), Box<dyn std::error::Error>>(())
    })?;

    Ok(())
}
