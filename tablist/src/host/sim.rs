//! An in-memory game server implementing [`Host`].
//!
//! It models two protocol revisions whose identity list packets are built
//! differently:
//!
//! - `v1_7_R4` only has a no-argument packet constructor for synthetic
//!   entries, data records without a back-reference to the packet, a game
//!   mode enum at `{nms}.EnumGamemode` without `SPECTATOR`, and no
//!   header/footer packet.
//! - `v1_8_R3` has array constructors for both shapes, data records whose
//!   first parameter is the owning packet, a game mode enum nested in
//!   `WorldSettings`, and a header/footer packet.
//!
//! Each connected session gets an unbounded channel. Its connection's
//! `sendPacket` method turns the packet object into a [`shared::Packet`] and
//! pushes the bincode frame into that channel, so a test can replay exactly
//! what the viewer received.

use super::model::TypeDescriptor;
use super::{field_key, types, Host, HostError, HostObject, Session, TypeHandle, Value};
use bincode::serialize;
use log::debug;
use parking_lot::Mutex;
use rand::Rng;
use shared::{GameMode, Packet, PlayerInfoAction, PlayerInfoEntry, ProfileProperty};
use std::collections::HashMap;
use std::fmt;
use std::str::FromStr;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio::sync::mpsc;
use uuid::Uuid;

pub const GAME_PROFILE: &str = "com.mojang.authlib.GameProfile";
pub const PROPERTY: &str = "com.mojang.authlib.properties.Property";
pub const PROPERTY_MAP: &str = "com.mojang.authlib.properties.PropertyMap";
pub const FORWARDING_MULTIMAP: &str = "com.google.common.collect.ForwardingMultimap";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Revision {
    V1_7R4,
    V1_8R3,
}

impl Revision {
    pub fn tag(self) -> &'static str {
        match self {
            Revision::V1_7R4 => "v1_7_R4",
            Revision::V1_8R3 => "v1_8_R3",
        }
    }

    pub fn implementation_package(self) -> String {
        format!("org.bukkit.craftbukkit.{}", self.tag())
    }
}

impl fmt::Display for Revision {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.tag())
    }
}

impl FromStr for Revision {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "v1_7_R4" => Ok(Revision::V1_7R4),
            "v1_8_R3" => Ok(Revision::V1_8R3),
            other => Err(format!("unsupported revision {} (expected v1_7_R4 or v1_8_R3)", other)),
        }
    }
}

/// Canonical names of the simulated server types for one revision.
#[derive(Debug, Clone)]
struct SimNames {
    revision: Revision,
    packet: String,
    info: String,
    action: String,
    data: String,
    game_mode: String,
    component: String,
    base_component: String,
    text: String,
    human: String,
    entity_player: String,
    connection: String,
    header_footer: String,
    craft_player: String,
}

impl SimNames {
    fn new(revision: Revision) -> Self {
        let nms = |name: &str| format!("net.minecraft.server.{}.{}", revision.tag(), name);
        let obc = |name: &str| format!("org.bukkit.craftbukkit.{}.{}", revision.tag(), name);
        let game_mode = match revision {
            Revision::V1_7R4 => nms("EnumGamemode"),
            Revision::V1_8R3 => nms("WorldSettings$EnumGamemode"),
        };
        Self {
            revision,
            packet: nms("Packet"),
            info: nms("PacketPlayOutPlayerInfo"),
            action: nms("PacketPlayOutPlayerInfo$EnumPlayerInfoAction"),
            data: nms("PacketPlayOutPlayerInfo$PlayerInfoData"),
            game_mode,
            component: nms("IChatBaseComponent"),
            base_component: nms("ChatBaseComponent"),
            text: nms("ChatComponentText"),
            human: nms("EntityHuman"),
            entity_player: nms("EntityPlayer"),
            connection: nms("PlayerConnection"),
            header_footer: nms("PacketPlayOutPlayerListHeaderFooter"),
            craft_player: obc("entity.CraftPlayer"),
        }
    }

    // Obfuscated field names move between revisions; the overlay never
    // relies on them, only on declaration order and type.
    fn human_profile(&self) -> String {
        match self.revision {
            Revision::V1_7R4 => field_key(&self.human, "i"),
            Revision::V1_8R3 => field_key(&self.human, "bH"),
        }
    }

    fn info_action(&self) -> String {
        field_key(&self.info, "a")
    }

    fn info_records(&self) -> String {
        field_key(&self.info, "b")
    }

    fn data_field(&self, name: &str) -> String {
        field_key(&self.data, name)
    }
}

struct SimState {
    names: SimNames,
    sessions: Mutex<Vec<Session>>,
    outboxes: Mutex<HashMap<Uuid, mpsc::UnboundedSender<Vec<u8>>>>,
    fail_properties: AtomicBool,
}

pub struct SimulatedHost {
    revision: Revision,
    types: HashMap<String, TypeHandle>,
    state: Arc<SimState>,
}

impl SimulatedHost {
    pub fn new(revision: Revision) -> Self {
        let names = SimNames::new(revision);
        let state = Arc::new(SimState {
            names,
            sessions: Mutex::new(Vec::new()),
            outboxes: Mutex::new(HashMap::new()),
            fail_properties: AtomicBool::new(false),
        });
        let types = build_catalog(&state)
            .into_iter()
            .map(|descriptor| (descriptor.name.clone(), Arc::new(descriptor)))
            .collect();
        Self {
            revision,
            types,
            state,
        }
    }

    pub fn revision(&self) -> Revision {
        self.revision
    }

    /// Drops a type from the catalog, as if this revision never had it.
    pub fn remove_type(&mut self, canonical: &str) -> bool {
        self.types.remove(canonical).is_some()
    }

    /// Makes profile property construction fail from now on.
    pub fn set_property_failure(&self, fail: bool) {
        self.state.fail_properties.store(fail, Ordering::SeqCst);
    }

    /// Connects a new participant. The receiver yields one bincode frame per
    /// packet the participant is sent.
    pub fn connect(&self, name: &str) -> (Session, mpsc::UnboundedReceiver<Vec<u8>>) {
        let names = &self.state.names;
        let id = Uuid::new_v4();
        let ping = rand::thread_rng().gen_range(20..250);

        let profile = new_profile(id, name);

        let connection = HostObject::new(&names.connection);
        connection.set(field_key(&names.connection, "channel"), Value::Uuid(id));

        let entity = HostObject::new(&names.entity_player);
        entity.set(names.human_profile(), Value::Object(profile));
        entity.set(field_key(&names.entity_player, "ping"), Value::Int(ping));
        entity.set(
            field_key(&names.entity_player, "playerConnection"),
            Value::Object(connection),
        );

        let craft = HostObject::new(&names.craft_player);
        craft.set(field_key(&names.craft_player, "entity"), Value::Object(entity));

        let session = Session {
            id,
            name: name.to_string(),
            handle: Value::Object(craft),
        };

        let (tx, rx) = mpsc::unbounded_channel();
        self.state.outboxes.lock().insert(id, tx);
        self.state.sessions.lock().push(session.clone());
        debug!("{} connected to simulated {} host", name, self.revision);

        (session, rx)
    }

    /// Disconnects a participant; later sends to it fail.
    pub fn disconnect(&self, id: Uuid) -> bool {
        self.state.outboxes.lock().remove(&id);
        let mut sessions = self.state.sessions.lock();
        let before = sessions.len();
        sessions.retain(|s| s.id != id);
        sessions.len() != before
    }
}

impl Host for SimulatedHost {
    fn implementation_package(&self) -> String {
        self.revision.implementation_package()
    }

    fn lookup_type(&self, canonical: &str) -> Option<TypeHandle> {
        self.types.get(canonical).cloned()
    }

    fn online_sessions(&self) -> Vec<Session> {
        self.state.sessions.lock().clone()
    }
}

fn new_profile(id: Uuid, name: &str) -> Arc<HostObject> {
    let properties = HostObject::new(PROPERTY_MAP);
    properties.set(field_key(FORWARDING_MULTIMAP, "delegate"), Value::List(Vec::new()));

    let profile = HostObject::new(GAME_PROFILE);
    profile.set(field_key(GAME_PROFILE, "id"), Value::Uuid(id));
    profile.set(field_key(GAME_PROFILE, "name"), Value::Str(name.to_string()));
    profile.set(field_key(GAME_PROFILE, "properties"), Value::Object(properties));
    profile
}

fn arg(args: &[Value], index: usize) -> Result<&Value, HostError> {
    args.get(index).ok_or(HostError::Arity {
        expected: index + 1,
        actual: args.len(),
    })
}

fn build_catalog(state: &Arc<SimState>) -> Vec<TypeDescriptor> {
    let names = state.names.clone();
    let revision = names.revision;
    let player_array = types::array_of(&names.entity_player);
    let data_array = types::array_of(&names.data);

    let mut catalog = vec![
        authlib_profile(),
        authlib_property(state),
        TypeDescriptor::new(FORWARDING_MULTIMAP)
            .field("delegate", types::LIST)
            .method("put", Some(types::BOOL), &[types::OBJECT, types::OBJECT], |target, args| {
                let map = target.ok_or(HostError::MissingTarget)?.as_object()?;
                let key = field_key(FORWARDING_MULTIMAP, "delegate");
                let mut entries = map.get(&key).as_list().map(<[Value]>::to_vec).unwrap_or_default();
                entries.push(arg(args, 1)?.clone());
                map.set(key, Value::List(entries));
                Ok(Value::Bool(true))
            }),
        TypeDescriptor::new(PROPERTY_MAP)
            .extends(FORWARDING_MULTIMAP)
            .constructor(&[], |_| {
                let map = HostObject::new(PROPERTY_MAP);
                map.set(field_key(FORWARDING_MULTIMAP, "delegate"), Value::List(Vec::new()));
                Ok(Value::Object(map))
            }),
        TypeDescriptor::new(&names.packet),
        TypeDescriptor::new(&names.component),
        TypeDescriptor::new(&names.base_component).extends(&names.component),
        chat_text(&names),
        TypeDescriptor::new(&names.action).constants(
            &PlayerInfoAction::ALL.map(PlayerInfoAction::constant_name),
        ),
        game_mode(&names),
        TypeDescriptor::new(&names.human).field(
            match revision {
                Revision::V1_7R4 => "i",
                Revision::V1_8R3 => "bH",
            },
            GAME_PROFILE,
        ),
        TypeDescriptor::new(&names.entity_player)
            .extends(&names.human)
            .field("ping", types::INT)
            .field("playerConnection", &names.connection),
        connection(state),
        craft_player(&names),
        info_packet(&names, &player_array, &data_array),
        info_data(&names),
    ];

    if revision == Revision::V1_8R3 {
        catalog.push(header_footer(&names));
    }
    catalog
}

fn authlib_profile() -> TypeDescriptor {
    TypeDescriptor::new(GAME_PROFILE)
        .field("id", types::UUID)
        .field("name", types::STRING)
        .field("properties", PROPERTY_MAP)
        .constructor(&[types::UUID, types::STRING], |args| {
            let id = arg(args, 0)?.as_uuid()?;
            let name = arg(args, 1)?.as_str()?;
            Ok(Value::Object(new_profile(id, name)))
        })
        .method("getProperties", Some(PROPERTY_MAP), &[], |target, _| {
            let profile = target.ok_or(HostError::MissingTarget)?.as_object()?;
            Ok(profile.get(&field_key(GAME_PROFILE, "properties")))
        })
}

fn authlib_property(state: &Arc<SimState>) -> TypeDescriptor {
    let state = Arc::clone(state);
    TypeDescriptor::new(PROPERTY)
        .field("name", types::STRING)
        .field("value", types::STRING)
        .field("signature", types::STRING)
        .constructor(&[types::STRING, types::STRING, types::STRING], move |args| {
            if state.fail_properties.load(Ordering::SeqCst) {
                return Err(HostError::Raised("property rejected by host".to_string()));
            }
            let property = HostObject::new(PROPERTY);
            for (index, name) in ["name", "value", "signature"].into_iter().enumerate() {
                property.set(field_key(PROPERTY, name), arg(args, index)?.clone());
            }
            Ok(Value::Object(property))
        })
}

fn chat_text(names: &SimNames) -> TypeDescriptor {
    let text_type = names.text.clone();
    TypeDescriptor::new(&names.text)
        .extends(&names.base_component)
        .field("text", types::STRING)
        .constructor(&[types::STRING], move |args| {
            let component = HostObject::new(&text_type);
            component.set(field_key(&text_type, "text"), Value::Str(arg(args, 0)?.as_str()?.to_string()));
            Ok(Value::Object(component))
        })
}

fn game_mode(names: &SimNames) -> TypeDescriptor {
    let constants: Vec<&str> = GameMode::ALL
        .into_iter()
        .filter(|mode| names.revision == Revision::V1_8R3 || *mode != GameMode::Spectator)
        .map(GameMode::constant_name)
        .collect();
    TypeDescriptor::new(&names.game_mode).constants(&constants)
}

fn connection(state: &Arc<SimState>) -> TypeDescriptor {
    let names = state.names.clone();
    let state = Arc::clone(state);
    let connection_type = names.connection.clone();
    TypeDescriptor::new(&names.connection)
        .field("channel", types::UUID)
        .method("sendPacket", None, &[names.packet.as_str()], move |target, args| {
            let connection = target.ok_or(HostError::MissingTarget)?.as_object()?;
            let channel = connection.get(&field_key(&connection_type, "channel")).as_uuid()?;
            let packet = encode_packet(&state.names, arg(args, 0)?.as_object()?)?;
            let frame = serialize(&packet).map_err(|e| HostError::Raised(e.to_string()))?;

            let outboxes = state.outboxes.lock();
            let outbox = outboxes
                .get(&channel)
                .ok_or_else(|| HostError::Raised("connection closed".to_string()))?;
            outbox
                .send(frame)
                .map_err(|_| HostError::Raised("connection closed".to_string()))?;
            Ok(Value::Null)
        })
}

fn craft_player(names: &SimNames) -> TypeDescriptor {
    let craft_type = names.craft_player.clone();
    TypeDescriptor::new(&names.craft_player)
        .field("entity", &names.entity_player)
        .method("getHandle", Some(names.entity_player.as_str()), &[], move |target, _| {
            let craft = target.ok_or(HostError::MissingTarget)?.as_object()?;
            Ok(craft.get(&field_key(&craft_type, "entity")))
        })
}

fn info_packet(names: &SimNames, player_array: &str, data_array: &str) -> TypeDescriptor {
    let mut descriptor = TypeDescriptor::new(&names.info).extends(&names.packet);
    // Declaration order differs between revisions
    descriptor = match names.revision {
        Revision::V1_7R4 => descriptor.field("b", types::LIST).field("a", &names.action),
        Revision::V1_8R3 => descriptor.field("a", &names.action).field("b", types::LIST),
    };

    let empty = names.clone();
    descriptor = descriptor.constructor(&[], move |_| Ok(Value::Object(HostObject::new(&empty.info))));

    let real = names.clone();
    descriptor = descriptor.constructor(&[names.action.as_str(), player_array], move |args| {
        let packet = HostObject::new(&real.info);
        let mut records = Vec::new();
        for player in arg(args, 1)?.as_list()? {
            let entity = player.as_object()?;
            let record = HostObject::new(&real.data);
            record.set(real.data_field("profile"), entity.get(&real.human_profile()));
            record.set(
                real.data_field("ping"),
                entity.get(&field_key(&real.entity_player, "ping")),
            );
            record.set(
                real.data_field("gamemode"),
                Value::Enum {
                    owner: real.game_mode.clone(),
                    constant: GameMode::Survival.constant_name().to_string(),
                },
            );
            records.push(Value::Object(record));
        }
        packet.set(real.info_action(), arg(args, 0)?.clone());
        packet.set(real.info_records(), Value::List(records));
        Ok(Value::Object(packet))
    });

    if names.revision == Revision::V1_8R3 {
        let direct = names.clone();
        descriptor = descriptor.constructor(&[names.action.as_str(), data_array], move |args| {
            let packet = HostObject::new(&direct.info);
            packet.set(direct.info_action(), arg(args, 0)?.clone());
            packet.set(direct.info_records(), Value::List(arg(args, 1)?.as_list()?.to_vec()));
            Ok(Value::Object(packet))
        });
    }
    descriptor
}

fn info_data(names: &SimNames) -> TypeDescriptor {
    let data = names.clone();
    let mut params: Vec<&str> = Vec::new();
    if names.revision == Revision::V1_8R3 {
        params.push(&names.info);
    }
    params.extend([GAME_PROFILE, types::INT, names.game_mode.as_str(), names.component.as_str()]);

    TypeDescriptor::new(&names.data)
        .field("ping", types::INT)
        .field("gamemode", &names.game_mode)
        .field("profile", GAME_PROFILE)
        .field("display", &names.component)
        .constructor(&params, move |args| {
            // Skip the owning packet back-reference where the revision has one
            let offset = args.len().saturating_sub(4);
            let record = HostObject::new(&data.data);
            record.set(data.data_field("profile"), arg(args, offset)?.clone());
            record.set(data.data_field("ping"), Value::Int(arg(args, offset + 1)?.as_int()?));
            record.set(data.data_field("gamemode"), arg(args, offset + 2)?.clone());
            record.set(data.data_field("display"), arg(args, offset + 3)?.clone());
            Ok(Value::Object(record))
        })
}

fn header_footer(names: &SimNames) -> TypeDescriptor {
    let hf = names.header_footer.clone();
    TypeDescriptor::new(&names.header_footer)
        .extends(&names.packet)
        .field("a", &names.component)
        .field("b", &names.component)
        .constructor(&[names.component.as_str()], move |args| {
            let packet = HostObject::new(&hf);
            packet.set(field_key(&hf, "a"), arg(args, 0)?.clone());
            Ok(Value::Object(packet))
        })
}

fn component_text(names: &SimNames, value: &Value) -> Result<Option<String>, HostError> {
    match value {
        Value::Null => Ok(None),
        Value::Object(component) => Ok(Some(
            component.get(&field_key(&names.text, "text")).as_str()?.to_string(),
        )),
        other => Err(HostError::UnexpectedValue {
            expected: names.component.clone(),
            actual: other.type_name(),
        }),
    }
}

fn encode_profile(profile: &HostObject) -> Result<(Uuid, String, Vec<ProfileProperty>), HostError> {
    let id = profile.get(&field_key(GAME_PROFILE, "id")).as_uuid()?;
    let name = profile.get(&field_key(GAME_PROFILE, "name")).as_str()?.to_string();

    let mut properties = Vec::new();
    if let Value::Object(map) = profile.get(&field_key(GAME_PROFILE, "properties")) {
        for property in map.get(&field_key(FORWARDING_MULTIMAP, "delegate")).as_list()? {
            let property = property.as_object()?;
            let signature = match property.get(&field_key(PROPERTY, "signature")) {
                Value::Str(s) => Some(s),
                _ => None,
            };
            properties.push(ProfileProperty {
                name: property.get(&field_key(PROPERTY, "name")).as_str()?.to_string(),
                value: property.get(&field_key(PROPERTY, "value")).as_str()?.to_string(),
                signature,
            });
        }
    }
    Ok((id, name, properties))
}

/// Converts a packet object into what travels over the wire.
fn encode_packet(names: &SimNames, packet: &HostObject) -> Result<Packet, HostError> {
    if packet.type_name() == names.info {
        let action_value = packet.get(&names.info_action());
        let constant = action_value.as_enum_constant()?;
        let action = PlayerInfoAction::from_constant_name(constant)
            .ok_or_else(|| HostError::Raised(format!("unknown action {}", constant)))?;

        let mut entries = Vec::new();
        for record in packet.get(&names.info_records()).as_list()? {
            let record = record.as_object()?;
            let profile = record.get(&names.data_field("profile"));
            let (id, name, properties) = encode_profile(profile.as_object()?)?;
            let game_mode = match record.get(&names.data_field("gamemode")) {
                Value::Enum { constant, .. } => GameMode::from_constant_name(&constant).unwrap_or_default(),
                _ => GameMode::NotSet,
            };
            entries.push(PlayerInfoEntry {
                id,
                name,
                ping: record.get(&names.data_field("ping")).as_int()?,
                game_mode,
                display_name: component_text(names, &record.get(&names.data_field("display")))?,
                properties,
            });
        }
        return Ok(Packet::PlayerInfo { action, entries });
    }

    if packet.type_name() == names.header_footer {
        let header = component_text(names, &packet.get(&field_key(&names.header_footer, "a")))?;
        let footer = component_text(names, &packet.get(&field_key(&names.header_footer, "b")))?;
        return Ok(Packet::HeaderFooter {
            header: header.unwrap_or_default(),
            footer: footer.unwrap_or_default(),
        });
    }

    Err(HostError::Raised(format!("unsupported packet {}", packet.type_name())))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_revision_parsing() {
        assert_eq!("v1_7_R4".parse::<Revision>(), Ok(Revision::V1_7R4));
        assert_eq!("v1_8_R3".parse::<Revision>(), Ok(Revision::V1_8R3));
        assert!("v1_20_R1".parse::<Revision>().is_err());
        assert_eq!(
            Revision::V1_8R3.implementation_package(),
            "org.bukkit.craftbukkit.v1_8_R3"
        );
    }

    #[test]
    fn test_catalog_differs_by_revision() {
        let old = SimulatedHost::new(Revision::V1_7R4);
        let new = SimulatedHost::new(Revision::V1_8R3);

        assert!(old.lookup_type("net.minecraft.server.v1_7_R4.EnumGamemode").is_some());
        assert!(old
            .lookup_type("net.minecraft.server.v1_7_R4.PacketPlayOutPlayerListHeaderFooter")
            .is_none());
        assert!(new
            .lookup_type("net.minecraft.server.v1_8_R3.WorldSettings$EnumGamemode")
            .is_some());
        assert!(new
            .lookup_type("net.minecraft.server.v1_8_R3.PacketPlayOutPlayerListHeaderFooter")
            .is_some());

        let old_info = old
            .lookup_type("net.minecraft.server.v1_7_R4.PacketPlayOutPlayerInfo")
            .unwrap();
        let new_info = new
            .lookup_type("net.minecraft.server.v1_8_R3.PacketPlayOutPlayerInfo")
            .unwrap();
        assert_eq!(old_info.constructors.len(), 2);
        assert_eq!(new_info.constructors.len(), 3);
    }

    #[test]
    fn test_connect_and_disconnect() {
        let host = SimulatedHost::new(Revision::V1_8R3);
        let (steve, _steve_rx) = host.connect("Steve");
        let (alex, _alex_rx) = host.connect("Alex");

        let online: Vec<String> = host.online_sessions().into_iter().map(|s| s.name).collect();
        assert_eq!(online, vec!["Steve", "Alex"]);

        assert!(host.disconnect(steve.id));
        assert!(!host.disconnect(steve.id));
        assert_eq!(host.online_sessions().len(), 1);
        assert_eq!(host.online_sessions()[0].id, alex.id);
    }

    #[test]
    fn test_remove_type() {
        let mut host = SimulatedHost::new(Revision::V1_8R3);
        assert!(host.remove_type(GAME_PROFILE));
        assert!(host.lookup_type(GAME_PROFILE).is_none());
        assert!(!host.remove_type(GAME_PROFILE));
    }

    #[test]
    fn test_encode_unsupported_packet() {
        let names = SimNames::new(Revision::V1_8R3);
        let stray = HostObject::new(&names.packet);
        assert!(encode_packet(&names, &stray).is_err());
    }
}
