use std::{
    sync::{
        Arc,
        atomic::{AtomicBool, AtomicI64, Ordering},
    },
    time::Duration,
};

use tokio::{sync::mpsc::UnboundedSender, time::MissedTickBehavior};
use tokio_tungstenite::tungstenite::protocol::Message;
use tracing::{trace, warn};

use crate::gateway::{GatewayPayload, Opcode};

/// Builds an op 1 frame. A negative sequence means none was seen yet.
pub fn heartbeat_message(seq: i64) -> Option<Message> {
    let d = if seq < 0 {
        serde_json::Value::Null
    } else {
        serde_json::Value::from(seq)
    };
    let json = serde_json::to_string(&GatewayPayload::new(Opcode::Heartbeat, d)).ok()?;
    Some(Message::Text(json.into()))
}

/// Beats every `interval_ms`, the first one after `jitter_ms`.
///
/// Before each beat the ack flag is checked; if the previous beat was never
/// acknowledged the task signals `zombie_tx` and exits without sending.
pub fn spawn_heartbeat(
    tx: UnboundedSender<Message>,
    seq: Arc<AtomicI64>,
    acked: Arc<AtomicBool>,
    zombie_tx: UnboundedSender<()>,
    interval_ms: u64,
    jitter_ms: u64,
) -> tokio::task::JoinHandle<()> {
    tokio::spawn(async move {
        let start = tokio::time::Instant::now() + Duration::from_millis(jitter_ms);
        let mut interval =
            tokio::time::interval_at(start, Duration::from_millis(interval_ms.max(1)));
        // After a stall, beat once and restart the cadence. Catching up in a
        // burst would find the previous beat unacked and close a live socket.
        interval.set_missed_tick_behavior(MissedTickBehavior::Delay);
        loop {
            interval.tick().await;

            if !acked.swap(false, Ordering::AcqRel) {
                warn!("Gateway heartbeat was not acknowledged; connection is a zombie");
                let _ = zombie_tx.send(());
                break;
            }

            let current = seq.load(Ordering::Acquire);
            trace!("Sending gateway heartbeat (seq {})", current);
            let Some(msg) = heartbeat_message(current) else {
                break;
            };
            if tx.send(msg).is_err() {
                break;
            }
        }
    })
}
