use std::sync::Arc;
use std::time::Duration;
use tokio::time::{interval_at, Instant, MissedTickBehavior};
use tracing::debug;

use crate::adapters::PlayerControl;
use crate::store::LogSink;
use crate::types::{LogKind, ProtocolVariant};

/// Name fragments of items worth eating
const EDIBLE: &[&str] = &["apple", "bread", "beef", "chicken", "porkchop", "carrot"];

pub fn is_edible(name: &str) -> bool {
    let name = name.to_lowercase();
    EDIBLE.iter().any(|food| name.contains(food))
}

/// One auto-eat check. Returns the name of the item eaten, if any.
pub async fn tick(
    variant: ProtocolVariant,
    control: Option<&dyn PlayerControl>,
    threshold: u32,
    logs: &dyn LogSink,
) -> Option<String> {
    if variant == ProtocolVariant::Bedrock {
        return None;
    }
    let control = control?;
    let food = control.food()?;
    if food > threshold {
        return None;
    }

    // Hotbar food first; anything else has to be moved into the hand
    let item = control
        .inventory()
        .into_iter()
        .filter(|item| is_edible(&item.name))
        .min_by_key(|item| !item.hotbar)?;

    if let Err(e) = control.equip(&item).await {
        debug!("Auto-eat could not equip {}: {}", item.name, e);
        return None;
    }
    if let Err(e) = control.consume().await {
        debug!("Auto-eat could not eat {}: {}", item.name, e);
        return None;
    }

    logs.add_log(LogKind::Info, &format!("Eating {}...", item.name));
    Some(item.name)
}

/// Run [`tick`] every `period` until the task is aborted
pub async fn run(
    variant: ProtocolVariant,
    control: Option<Arc<dyn PlayerControl>>,
    period: Duration,
    threshold: u32,
    logs: Arc<dyn LogSink>,
) {
    let mut timer = interval_at(Instant::now() + period, period);
    timer.set_missed_tick_behavior(MissedTickBehavior::Delay);
    loop {
        timer.tick().await;
        tick(variant, control.as_deref(), threshold, logs.as_ref()).await;
    }
}
