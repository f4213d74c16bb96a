//! # Radar Monitor
//!
//! Lê o radar MR60BHA2 pela serial, decodifica os frames e registra no log
//! cada atualização das entidades configuradas.
//!
//! ## Uso
//! ```bash
//! radar_monitor                          # Usa radar.toml ao lado do executável
//! radar_monitor --config radar.toml      # Config explícita
//! radar_monitor --replay captura.bin     # Reprocessa uma captura e sai
//! ```

mod serial_thread;

use radar_core::config::{AppConfig, EntityConfig};
use radar_core::lifecycle::{Mr60bha2Component, TickOutcome};
use radar_core::slots::{Publisher, SlotId, SlotTable, SlotValue};
use radar_core::transport::{ChannelTransport, MemoryTransport, Transport};
use std::path::PathBuf;
use std::time::{Duration, Instant};
use tracing::{error, info, warn};

/// Intervalo do resumo periódico de estatísticas.
const SUMMARY_INTERVAL: Duration = Duration::from_secs(30);

fn main() {
    // ── Logging ──
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info".into()),
        )
        .init();

    // ── Argumentos ──
    let args: Vec<String> = std::env::args().collect();
    let config_path = arg_value(&args, "--config")
        .map(PathBuf::from)
        .unwrap_or_else(AppConfig::default_path);

    // ── Carregar config ──
    let mut config = AppConfig::load(&config_path);

    // Salva config padrão se não existir
    if !config_path.exists() {
        if let Err(e) = config.save(&config_path) {
            warn!("Não foi possível salvar config padrão: {e}");
        }
    }

    if let Some(replay) = arg_value(&args, "--replay") {
        config.transport.replay_file = replay;
    }

    let errors = config.validate();
    if !errors.is_empty() {
        for e in &errors {
            error!("Config inválida: {e}");
        }
        std::process::exit(1);
    }

    let slots = SlotTable::from_config(&config, log_publisher);

    // ── Banner ──
    println!();
    println!("══════════════════════════════════════════════");
    println!("   📡 RADAR MONITOR – MR60BHA2");
    println!("══════════════════════════════════════════════");
    if config.transport.replay_file.is_empty() {
        println!("  Dispositivo: {} @ {} baud", config.transport.device, config.transport.baud_rate);
    } else {
        println!("  Replay:      {}", config.transport.replay_file);
    }
    println!("  Entidades:   {}", slots.bound_count());
    println!("  Poll:        {} ms", config.lifecycle.poll_interval_ms);
    println!("══════════════════════════════════════════════");
    println!();

    if config.transport.replay_file.is_empty() {
        let rx = serial_thread::spawn_serial_thread(config.transport.device.clone(), config.transport.baud_rate);
        let component = Mr60bha2Component::setup(ChannelTransport::new(rx), &config, slots);
        run_live(component, &config);
    } else {
        let bytes = match std::fs::read(&config.transport.replay_file) {
            Ok(bytes) => bytes,
            Err(e) => {
                error!("Erro ao ler {}: {e}", config.transport.replay_file);
                std::process::exit(1);
            }
        };
        info!("Replay de {} bytes", bytes.len());
        let component = Mr60bha2Component::setup(MemoryTransport::from_bytes(&bytes), &config, slots);
        run_replay(component);
    }
}

/// Publicador que registra cada atualização no log.
fn log_publisher(_slot: SlotId, entity: &EntityConfig) -> Publisher {
    let name = entity.name.clone();
    let unit = entity.unit.clone().unwrap_or_default();
    let decimals = entity.accuracy_decimals;

    Box::new(move |slot: SlotId, value: &SlotValue| match (value, decimals) {
        (SlotValue::Number(_), Some(d)) => {
            let prec = d as usize;
            info!("{name} [{slot}] → {value:.prec$} {unit}")
        }
        _ => info!("{name} [{slot}] → {value} {unit}"),
    })
}

// ── Loop principal (serial) ──
fn run_live<T: Transport>(mut component: Mr60bha2Component<T>, config: &AppConfig) {
    let idle = Duration::from_millis(config.lifecycle.poll_interval_ms);
    let mut last_summary = Instant::now();
    let mut reported_diagnostic = false;

    loop {
        let now = Instant::now();
        match component.poll(now) {
            // Frame parcial com mais bytes pendentes: continua sem dormir
            TickOutcome::NoFrameYet if !component.transport_idle(now) => {}
            TickOutcome::NoFrameYet | TickOutcome::BackingOff | TickOutcome::TransportFault(_) => {
                std::thread::sleep(idle);
            }
            TickOutcome::Dispatched { .. } | TickOutcome::FrameDropped(_) => {}
        }

        match component.diagnostic() {
            Some(diag) if !reported_diagnostic => {
                error!(
                    "Radar inacessível há {:.0}s ({} falhas): {}",
                    diag.since.elapsed().as_secs_f64(),
                    diag.consecutive_failures,
                    diag.last_error
                );
                reported_diagnostic = true;
            }
            None => reported_diagnostic = false,
            _ => {}
        }

        if last_summary.elapsed() >= SUMMARY_INTERVAL {
            log_summary(&component);
            last_summary = Instant::now();
        }
    }
}

// ── Replay de captura ──
fn run_replay<T: Transport>(mut component: Mr60bha2Component<T>) {
    loop {
        let now = Instant::now();
        match component.poll(now) {
            TickOutcome::NoFrameYet if !component.transport_idle(now) => {}
            TickOutcome::NoFrameYet | TickOutcome::TransportFault(_) | TickOutcome::BackingOff => break,
            TickOutcome::Dispatched { .. } | TickOutcome::FrameDropped(_) => {}
        }
    }
    log_summary(&component);
    component.shutdown();
}

fn log_summary<T: Transport>(component: &Mr60bha2Component<T>) {
    let f = component.faults();
    info!(
        "Frames: {} | Falhas: {} (sync {}, oversize {}, checksum {}, tipo {}, faixa {}, curto {}, transporte {})",
        component.frames_decoded(),
        f.total(),
        f.sync_lost,
        f.oversize,
        f.checksum,
        f.unknown_type,
        f.out_of_range,
        f.truncated,
        f.transport
    );
}

fn arg_value(args: &[String], flag: &str) -> Option<String> {
    args.iter()
        .position(|a| a == flag)
        .and_then(|i| args.get(i + 1))
        .cloned()
}
