//! Thread de I/O que lê a UART do radar e envia os bytes via channel.

use crossbeam_channel::{Receiver, Sender, bounded};
use radar_core::transport::SerialMessage;
use serialport::{DataBits, FlowControl, Parity, StopBits};
use std::io::{ErrorKind, Read};
use std::time::Duration;
use tracing::{debug, error, info};

/// Espera antes de reabrir o dispositivo após uma falha.
const REOPEN_DELAY: Duration = Duration::from_secs(2);

/// Timeout de cada leitura da UART.
const READ_TIMEOUT: Duration = Duration::from_millis(100);

/// Inicia a thread serial. Retorna o receiver do channel.
pub fn spawn_serial_thread(device: String, baud_rate: u32) -> Receiver<SerialMessage> {
    let (tx, rx) = bounded::<SerialMessage>(256);

    std::thread::Builder::new()
        .name("serial-reader".into())
        .spawn(move || {
            serial_loop(&tx, &device, baud_rate);
        })
        .expect("Falha ao criar thread serial");

    rx
}

fn serial_loop(tx: &Sender<SerialMessage>, device: &str, baud_rate: u32) {
    loop {
        let opened = serialport::new(device, baud_rate)
            .data_bits(DataBits::Eight)
            .parity(Parity::None)
            .stop_bits(StopBits::One)
            .flow_control(FlowControl::None)
            .timeout(READ_TIMEOUT)
            .open();

        match opened {
            Ok(mut port) => {
                info!("Lendo radar em {device} ({baud_rate} 8N1)");
                if tx.send(SerialMessage::Connected).is_err() {
                    return;
                }

                let mut buf = [0u8; 256];
                loop {
                    match port.read(&mut buf) {
                        Ok(0) => {}
                        Ok(n) => {
                            if tx.send(SerialMessage::Data(buf[..n].to_vec())).is_err() {
                                debug!("Channel fechado, encerrando thread serial");
                                return;
                            }
                        }
                        Err(ref e) if matches!(e.kind(), ErrorKind::TimedOut | ErrorKind::Interrupted) => {}
                        Err(e) => {
                            error!("Erro ao ler {device}: {e}");
                            if tx.send(SerialMessage::Fault(e.to_string())).is_err() {
                                return;
                            }
                            break;
                        }
                    }
                }
            }
            Err(e) => {
                error!("Falha ao abrir {device}: {e}. Tentando novamente em 2s...");
                if tx.send(SerialMessage::Fault(e.to_string())).is_err() {
                    return;
                }
            }
        }
        std::thread::sleep(REOPEN_DELAY);
    }
}
