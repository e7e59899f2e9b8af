//! Java edition adapter backed by Azalea

use anyhow::{anyhow, bail, Result};
use async_trait::async_trait;
use azalea::container::ContainerClientExt;
use azalea::ecs::query::{With, Without};
use azalea::entity::metadata::Player;
use azalea::entity::{LocalEntity, Position as EntityPosition};
use azalea::{Account, Client, Event};
use azalea_chat::FormattedText;
use azalea_inventory::operations::SwapClick;
use azalea_inventory::ItemStack;
use azalea_protocol::packets::game::ClientboundGamePacket;
use parking_lot::{Mutex, RwLock};
use std::ops::RangeInclusive;
use std::sync::Arc;
use tokio::sync::mpsc::UnboundedReceiver;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use super::{PlayerControl, ProtocolAdapter, SessionHandle};
use crate::bot::events::EventSender;
use crate::bot::BotEvent;
use crate::logging::remove_color_codes;
use crate::types::{AuthMode, InventoryItem, Position, SessionConfig};
use crate::utils::camel_to_snake;

/// Ticks between inventory samples (20 ticks per second)
const INVENTORY_SAMPLE_TICKS: u64 = 20;

/// Hotbar index that food from the main inventory is swapped into
const SWAP_HOTBAR_INDEX: u8 = 8;

#[derive(Debug, Default)]
pub struct JavaAdapter;

impl JavaAdapter {
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl ProtocolAdapter for JavaAdapter {
    async fn connect(&self, config: &SessionConfig, events: EventSender) -> Result<Box<dyn SessionHandle>> {
        if config.auth != AuthMode::Offline {
            warn!(
                "Java sessions always join in offline mode; ignoring auth type '{}'",
                config.auth.as_str()
            );
        }
        if config.version != azalea_protocol::packets::VERSION_NAME {
            warn!(
                "Requested Java version {} but this client speaks {}",
                config.version,
                azalea_protocol::packets::VERSION_NAME
            );
        }

        let account = Account::offline(&config.username);
        let address = format!("{}:{}", config.host, config.port);
        let (client, azalea_events) = Client::join(account, address.as_str())
            .await
            .map_err(|e| anyhow!("{e}"))?;

        let player = Arc::new(JavaPlayer {
            client: client.clone(),
            food: RwLock::new(None),
        });
        let pump = tokio::spawn(pump_events(
            client.clone(),
            player.clone(),
            azalea_events,
            events,
        ));

        Ok(Box::new(JavaSession {
            client,
            player,
            pump: Mutex::new(Some(pump)),
        }))
    }
}

pub struct JavaSession {
    client: Client,
    player: Arc<JavaPlayer>,
    pump: Mutex<Option<JoinHandle<()>>>,
}

#[async_trait]
impl SessionHandle for JavaSession {
    async fn disconnect(&self) {
        if let Some(pump) = self.pump.lock().take() {
            pump.abort();
        }
        self.client.disconnect();
    }

    async fn send_chat(&self, text: &str) -> Result<()> {
        self.client.chat(text);
        Ok(())
    }

    fn player(&self) -> Option<Arc<dyn PlayerControl>> {
        Some(self.player.clone())
    }
}

/// Inventory and item use through the Azalea client
pub struct JavaPlayer {
    client: Client,
    food: RwLock<Option<u32>>,
}

#[async_trait]
impl PlayerControl for JavaPlayer {
    fn food(&self) -> Option<u32> {
        *self.food.read()
    }

    fn inventory(&self) -> Vec<InventoryItem> {
        let menu = self.client.menu();
        let slots = menu.slots();
        let hotbar = menu.hotbar_slots_range();
        menu.player_slots_range()
            .filter_map(|slot| describe_slot(slot, slots.get(slot)?, hotbar.contains(&slot)))
            .collect()
    }

    async fn equip(&self, item: &InventoryItem) -> Result<()> {
        let hotbar = self.client.menu().hotbar_slots_range();
        let target = hotbar_target(item.slot, &hotbar);
        if target.swap {
            let Some(inventory) = self.client.clone().open_inventory() else {
                bail!("cannot move {} to the hotbar while a container is open", item.name);
            };
            inventory.click(SwapClick {
                source_slot: item.slot as u16,
                target_slot: target.index,
            });
        }
        self.client.set_selected_hotbar_slot(target.index);
        Ok(())
    }

    async fn consume(&self) -> Result<()> {
        self.client.start_use_item();
        Ok(())
    }
}

/// `CookedBeef` → `cooked_beef`
fn item_name(kind_debug: &str) -> String {
    camel_to_snake(kind_debug)
}

fn describe_slot(slot: usize, stack: &ItemStack, hotbar: bool) -> Option<InventoryItem> {
    if stack.is_empty() {
        return None;
    }
    Some(InventoryItem {
        name: item_name(&format!("{:?}", stack.kind())),
        count: stack.count().max(0) as u32,
        slot,
        hotbar,
    })
}

#[derive(Debug, PartialEq, Eq)]
struct HotbarTarget {
    index: u8,
    /// The item sits in the main inventory and must be swapped in first
    swap: bool,
}

fn hotbar_target(slot: usize, hotbar: &RangeInclusive<usize>) -> HotbarTarget {
    if hotbar.contains(&slot) {
        HotbarTarget {
            index: (slot - hotbar.start()) as u8,
            swap: false,
        }
    } else {
        HotbarTarget {
            index: SWAP_HOTBAR_INDEX,
            swap: true,
        }
    }
}

fn plain_text(text: &FormattedText) -> String {
    remove_color_codes(&text.to_string())
}

/// Emits position and inventory updates only when they change
#[derive(Debug, Default)]
struct TickSampler {
    ticks: u64,
    last_position: Option<Position>,
    last_inventory_full: Option<bool>,
}

impl TickSampler {
    fn position(&mut self, position: Position) -> Option<BotEvent> {
        if self.last_position == Some(position) {
            return None;
        }
        self.last_position = Some(position);
        Some(BotEvent::PositionUpdated(position))
    }

    /// Whether this tick should sample the inventory
    fn advance(&mut self) -> bool {
        self.ticks += 1;
        self.ticks % INVENTORY_SAMPLE_TICKS == 1
    }

    fn inventory(&mut self, full: bool) -> Option<BotEvent> {
        if self.last_inventory_full == Some(full) {
            return None;
        }
        self.last_inventory_full = Some(full);
        Some(BotEvent::InventoryUpdated { full })
    }
}

fn to_position(position: &EntityPosition) -> Position {
    Position::new(position.x, position.y, position.z)
}

/// Own position plus every other known player, sampled from the ECS
fn sample_world(client: &Client) -> Option<(Position, Vec<Option<Position>>)> {
    let mut ecs = client.ecs.lock();
    let own = ecs.get::<EntityPosition>(client.entity).map(to_position)?;
    let mut players = ecs.query_filtered::<Option<&EntityPosition>, (With<Player>, Without<LocalEntity>)>();
    let others = players.iter(&ecs).map(|p| p.map(to_position)).collect();
    Some((own, others))
}

fn inventory_full(player: &JavaPlayer) -> bool {
    let menu = player.client.menu();
    let slots = menu.slots();
    menu.player_slots_range()
        .all(|slot| slots.get(slot).is_some_and(|stack| !stack.is_empty()))
}

async fn pump_events(
    client: Client,
    player: Arc<JavaPlayer>,
    mut azalea_events: UnboundedReceiver<Event>,
    events: EventSender,
) {
    let mut sampler = TickSampler::default();

    while let Some(event) = azalea_events.recv().await {
        let mut out = Vec::new();
        match event {
            Event::Spawn => {
                info!("Java session spawned");
                out.push(BotEvent::SessionEstablished);
            }
            Event::Chat(packet) => {
                let (speaker, text) = packet.split_sender_and_content();
                out.push(BotEvent::ChatReceived {
                    speaker,
                    text: remove_color_codes(&text),
                });
            }
            Event::Packet(packet) => match packet.as_ref() {
                ClientboundGamePacket::SetHealth(p) => {
                    *player.food.write() = Some(p.food);
                    out.push(BotEvent::HealthUpdated {
                        health: p.health,
                        food: p.food as f32,
                    });
                }
                ClientboundGamePacket::Disconnect(p) => {
                    out.push(BotEvent::SessionRejected {
                        reason: plain_text(&p.reason),
                    });
                }
                _ => {}
            },
            Event::Tick => {
                if let Some((own, others)) = sample_world(&client) {
                    out.extend(sampler.position(own));
                    out.push(BotEvent::ProximityTick { own, others });
                }
                if sampler.advance() {
                    out.extend(sampler.inventory(inventory_full(&player)));
                }
            }
            Event::Disconnect(reason) => {
                let reason = reason
                    .map(|r| plain_text(&r))
                    .unwrap_or_else(|| "Connection closed".to_string());
                let _ = events.send(BotEvent::SessionEnded { reason });
                break;
            }
            _ => {}
        }

        for event in out {
            if events.send(event).is_err() {
                debug!("Event listener gone, stopping Java event pump");
                return;
            }
        }
    }
}
