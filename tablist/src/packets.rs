//! Construction and dispatch of identity list packets.
//!
//! The host builds "add a connected participant" and "add a synthetic
//! identity" differently, and the synthetic path itself differs between
//! revisions. [`PacketSynthesizer::bind`] resolves every handle once and picks
//! a [`SyntheticShape`] and [`RecordShape`] from the constructor shapes it
//! finds. Later calls only dispatch on those tags.

use crate::error::{InvokeError, ResolveError};
use crate::handles::{ConstructorInvoker, FieldAccessor, MethodInvoker};
use crate::host::{types, Host, Session, TypeHandle, Value};
use crate::resolver::Resolver;
use log::{debug, info, warn};
use shared::{GameMode, PlayerInfoAction};
use std::collections::HashMap;
use uuid::Uuid;

const GAME_PROFILE: &str = "com.mojang.authlib.GameProfile";
const PROPERTY: &str = "com.mojang.authlib.properties.Property";

/// Profile property name clients read skins from.
pub const TEXTURES_PROPERTY: &str = "textures";

/// How a synthetic-identity packet is built on this revision.
#[derive(Debug, Clone)]
pub enum SyntheticShape {
    /// `new Packet(action, records[])`
    DirectArrayCtor(ConstructorInvoker),
    /// `new Packet()`, then the action and record list are written directly.
    DefaultCtorPlusFieldInjection {
        ctor: ConstructorInvoker,
        action: FieldAccessor,
        records: FieldAccessor,
    },
}

/// Whether the data record constructor takes the owning packet first.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RecordShape {
    Plain,
    OuterReference,
}

#[derive(Debug, Clone)]
struct HeaderFooterShape {
    ctor: ConstructorInvoker,
    footer: FieldAccessor,
}

#[derive(Debug, Clone)]
struct ProfileBindings {
    ctor: ConstructorInvoker,
    properties: MethodInvoker,
    put: MethodInvoker,
    property_ctor: ConstructorInvoker,
}

/// Outcome of a batch of sends.
#[derive(Debug, Default)]
pub struct PassReport {
    pub sent: usize,
    pub failures: Vec<InvokeError>,
}

impl PassReport {
    pub fn record(&mut self, result: Result<(), InvokeError>) {
        match result {
            Ok(()) => self.sent += 1,
            Err(e) => {
                warn!("{}", e);
                self.failures.push(e);
            }
        }
    }

    pub fn merge(&mut self, other: PassReport) {
        self.sent += other.sent;
        self.failures.extend(other.failures);
    }

    pub fn is_clean(&self) -> bool {
        self.failures.is_empty()
    }
}

/// Bound handles for building and sending identity list packets.
/// Immutable once bound; share it behind an `Arc`.
#[derive(Debug)]
pub struct PacketSynthesizer {
    participant_handle: MethodInvoker,
    connection: FieldAccessor,
    send_packet: MethodInvoker,

    action_type: String,
    actions: HashMap<PlayerInfoAction, Value>,
    game_mode_type: String,
    game_modes: HashMap<GameMode, Value>,

    participant_type: String,
    real_ctor: ConstructorInvoker,
    synthetic: SyntheticShape,
    record_type: String,
    record_ctor: ConstructorInvoker,
    record_shape: RecordShape,
    text_ctor: ConstructorInvoker,
    profile: ProfileBindings,
    header_footer: Option<HeaderFooterShape>,
}

fn bind_constants<K: Copy + Eq + std::hash::Hash>(
    resolver: &Resolver<'_>,
    ty: &TypeHandle,
    keys: impl IntoIterator<Item = K>,
    name: impl Fn(K) -> &'static str,
) -> HashMap<K, Value> {
    let mut bound = HashMap::new();
    for key in keys {
        match resolver.resolve_enum_constant(ty, name(key)) {
            Some(value) => {
                bound.insert(key, value);
            }
            None => warn!("{} has no constant {}", ty.name, name(key)),
        }
    }
    bound
}

impl PacketSynthesizer {
    /// Resolves everything against `host`, deriving placeholder variables
    /// from its implementation package.
    pub fn bind(host: &dyn Host) -> Result<Self, ResolveError> {
        Self::bind_with(&Resolver::new(host))
    }

    pub fn bind_with(resolver: &Resolver<'_>) -> Result<Self, ResolveError> {
        let craft_player = resolver.craft_type("entity.CraftPlayer")?;
        let entity_player = resolver.minecraft_type("EntityPlayer")?;
        let connection_type = resolver.minecraft_type("PlayerConnection")?;
        let packet_type = resolver.minecraft_type("Packet")?;

        let participant_handle =
            resolver.resolve_method(&craft_player, Some("getHandle"), None, false, &[])?;
        let connection = resolver.resolve_field(&entity_player, None, &connection_type.name, 0)?;
        let send_packet = resolver.resolve_method(
            &connection_type,
            Some("sendPacket"),
            None,
            true,
            &[packet_type.name.as_str()],
        )?;

        let info = resolver.minecraft_type("PacketPlayOutPlayerInfo")?;
        let action = resolver.minecraft_type("PacketPlayOutPlayerInfo$EnumPlayerInfoAction")?;
        let record = resolver.minecraft_type("PacketPlayOutPlayerInfo$PlayerInfoData")?;
        let game_mode =
            resolver.resolve_first_type(&["{nms}.WorldSettings$EnumGamemode", "{nms}.EnumGamemode"])?;
        let text = resolver.minecraft_type("ChatComponentText")?;

        let participant_array = types::array_of(&entity_player.name);
        let real_ctor =
            resolver.resolve_constructor(&info, &[action.name.as_str(), participant_array.as_str()])?;

        let record_array = types::array_of(&record.name);
        let synthetic =
            match resolver.resolve_constructor(&info, &[action.name.as_str(), record_array.as_str()]) {
                Ok(ctor) => SyntheticShape::DirectArrayCtor(ctor),
                Err(e) => {
                    debug!("{}, falling back to field injection", e);
                    SyntheticShape::DefaultCtorPlusFieldInjection {
                        ctor: resolver.resolve_constructor(&info, &[])?,
                        action: resolver.resolve_field(&info, None, &action.name, 0)?,
                        records: resolver.resolve_field(&info, None, types::LIST, 0)?,
                    }
                }
            };

        let record_ctor = resolver.resolve_constructor_by_index(&record, 0)?;
        let record_shape = match record_ctor.parameter_types().first() {
            Some(first) if *first == info.name => RecordShape::OuterReference,
            _ => RecordShape::Plain,
        };

        let text_ctor = resolver.resolve_constructor(&text, &[types::STRING])?;
        let profile = Self::bind_profile(resolver)?;
        let header_footer = Self::bind_header_footer(resolver);

        let actions = bind_constants(resolver, &action, PlayerInfoAction::ALL, PlayerInfoAction::constant_name);
        let game_modes = bind_constants(resolver, &game_mode, GameMode::ALL, GameMode::constant_name);

        let synthesizer = Self {
            participant_handle,
            connection,
            send_packet,
            action_type: action.name.clone(),
            actions,
            game_mode_type: game_mode.name.clone(),
            game_modes,
            participant_type: entity_player.name.clone(),
            real_ctor,
            synthetic,
            record_type: record.name.clone(),
            record_ctor,
            record_shape,
            text_ctor,
            profile,
            header_footer,
        };
        info!(
            "Bound packet handles for {} (field injection: {}, record shape: {:?}, header/footer: {})",
            resolver.variables().version,
            synthesizer.uses_field_injection(),
            synthesizer.record_shape,
            synthesizer.supports_header_footer()
        );
        Ok(synthesizer)
    }

    fn bind_profile(resolver: &Resolver<'_>) -> Result<ProfileBindings, ResolveError> {
        let profile = resolver.resolve_type(GAME_PROFILE)?;
        let property = resolver.resolve_type(PROPERTY)?;

        let properties = resolver.resolve_method(&profile, Some("getProperties"), None, false, &[])?;
        let map_type = match properties.return_type() {
            Some(name) => resolver.resolve_type(name)?,
            None => {
                return Err(ResolveError::MethodNotFound {
                    owner: profile.name.clone(),
                    name: Some("getProperties".to_string()),
                    params: Vec::new(),
                })
            }
        };

        Ok(ProfileBindings {
            ctor: resolver.resolve_constructor(&profile, &[types::UUID, types::STRING])?,
            put: resolver.resolve_method(
                &map_type,
                Some("put"),
                None,
                true,
                &[types::OBJECT, types::OBJECT],
            )?,
            properties,
            property_ctor: resolver
                .resolve_constructor(&property, &[types::STRING, types::STRING, types::STRING])?,
        })
    }

    // Older revisions have no header/footer packet at all
    fn bind_header_footer(resolver: &Resolver<'_>) -> Option<HeaderFooterShape> {
        let bind = || -> Result<HeaderFooterShape, ResolveError> {
            let packet = resolver.minecraft_type("PacketPlayOutPlayerListHeaderFooter")?;
            let component = resolver.minecraft_type("IChatBaseComponent")?;
            Ok(HeaderFooterShape {
                ctor: resolver.resolve_constructor(&packet, &[component.name.as_str()])?,
                footer: resolver.resolve_field(&packet, None, &component.name, 1)?,
            })
        };
        match bind() {
            Ok(shape) => Some(shape),
            Err(e) => {
                info!("Header/footer packet unavailable: {}", e);
                None
            }
        }
    }

    pub fn uses_field_injection(&self) -> bool {
        matches!(self.synthetic, SyntheticShape::DefaultCtorPlusFieldInjection { .. })
    }

    pub fn synthetic_shape(&self) -> &SyntheticShape {
        &self.synthetic
    }

    pub fn record_shape(&self) -> RecordShape {
        self.record_shape
    }

    pub fn supports_header_footer(&self) -> bool {
        self.header_footer.is_some()
    }

    fn action_value(&self, action: PlayerInfoAction) -> Result<Value, InvokeError> {
        self.actions
            .get(&action)
            .cloned()
            .ok_or_else(|| InvokeError::EnumConstantMissing {
                owner: self.action_type.clone(),
                constant: action.constant_name().to_string(),
            })
    }

    /// Falls back to `NOT_SET` when the revision lacks the requested mode.
    fn game_mode_value(&self, mode: GameMode) -> Result<Value, InvokeError> {
        if let Some(value) = self.game_modes.get(&mode) {
            return Ok(value.clone());
        }
        debug!("{} missing, using NOT_SET", mode.constant_name());
        self.game_modes
            .get(&GameMode::NotSet)
            .cloned()
            .ok_or_else(|| InvokeError::EnumConstantMissing {
                owner: self.game_mode_type.clone(),
                constant: mode.constant_name().to_string(),
            })
    }

    /// The host's native participant object behind a session.
    pub fn participant_ref(&self, session: &Session) -> Result<Value, InvokeError> {
        self.participant_handle.invoke(Some(&session.handle), &[])
    }

    pub fn create_profile(&self, id: Uuid, name: &str) -> Result<Value, InvokeError> {
        self.profile
            .ctor
            .invoke(&[Value::Uuid(id), Value::Str(name.to_string())])
    }

    /// Creates a profile carrying one signed property, e.g. skin textures.
    pub fn create_profile_with_property(
        &self,
        id: Uuid,
        name: &str,
        property: &str,
        value: &str,
        signature: &str,
    ) -> Result<Value, InvokeError> {
        let profile = self.create_profile(id, name)?;
        let map = self.profile.properties.invoke(Some(&profile), &[])?;
        let entry = self.profile.property_ctor.invoke(&[
            Value::Str(property.to_string()),
            Value::Str(value.to_string()),
            Value::Str(signature.to_string()),
        ])?;
        self.profile
            .put
            .invoke(Some(&map), &[Value::Str(property.to_string()), entry])?;
        Ok(profile)
    }

    pub fn create_text(&self, text: &str) -> Result<Value, InvokeError> {
        self.text_ctor.invoke(&[Value::Str(text.to_string())])
    }

    pub fn create_record(
        &self,
        profile: Value,
        ping: i32,
        mode: GameMode,
        text: &str,
    ) -> Result<Value, InvokeError> {
        let mut args = Vec::with_capacity(5);
        if self.record_shape == RecordShape::OuterReference {
            args.push(Value::Null);
        }
        args.push(profile);
        args.push(Value::Int(ping));
        args.push(self.game_mode_value(mode)?);
        args.push(self.create_text(text)?);
        self.record_ctor.invoke(&args)
    }

    /// Packet listing real connected participants.
    pub fn real_packet(
        &self,
        action: PlayerInfoAction,
        participants: &[Session],
    ) -> Result<Value, InvokeError> {
        let items = participants
            .iter()
            .map(|session| self.participant_ref(session))
            .collect::<Result<Vec<_>, _>>()?;
        self.real_ctor.invoke(&[
            self.action_value(action)?,
            Value::Array {
                element: self.participant_type.clone(),
                items,
            },
        ])
    }

    /// Packet carrying synthetic data records.
    pub fn synthetic_packet(
        &self,
        action: PlayerInfoAction,
        records: Vec<Value>,
    ) -> Result<Value, InvokeError> {
        let action = self.action_value(action)?;
        match &self.synthetic {
            SyntheticShape::DirectArrayCtor(ctor) => ctor.invoke(&[
                action,
                Value::Array {
                    element: self.record_type.clone(),
                    items: records,
                },
            ]),
            SyntheticShape::DefaultCtorPlusFieldInjection {
                ctor,
                action: action_field,
                records: records_field,
            } => {
                let packet = ctor.invoke(&[])?;
                action_field.set(&packet, action)?;
                records_field.set(&packet, Value::List(records))?;
                Ok(packet)
            }
        }
    }

    /// Header/footer packet, or `None` on revisions without one.
    pub fn header_footer_packet(&self, header: &str, footer: &str) -> Result<Option<Value>, InvokeError> {
        let Some(shape) = &self.header_footer else {
            return Ok(None);
        };
        let packet = shape.ctor.invoke(&[self.create_text(header)?])?;
        shape.footer.set(&packet, self.create_text(footer)?)?;
        Ok(Some(packet))
    }

    fn dispatch(&self, viewer: &Session, packet: &Value) -> Result<(), InvokeError> {
        let participant = self.participant_ref(viewer)?;
        let connection = self.connection.get(&participant)?;
        self.send_packet.invoke(Some(&connection), &[packet.clone()])?;
        Ok(())
    }

    pub fn send_to(&self, viewer: &Session, packet: &Value) -> Result<(), InvokeError> {
        self.dispatch(viewer, packet)
            .map_err(|e| InvokeError::SendFailure {
                viewer: viewer.name.clone(),
                source: Box::new(e),
            })
    }

    /// Sends one packet to every viewer; a failed target never stops the rest.
    pub fn send_to_all(&self, viewers: &[Session], packet: &Value) -> PassReport {
        let mut report = PassReport::default();
        for viewer in viewers {
            report.record(self.send_to(viewer, packet));
        }
        report
    }

    /// Shows or hides one real participant in `viewer`'s list.
    pub fn send_real(
        &self,
        viewer: &Session,
        action: PlayerInfoAction,
        target: &Session,
    ) -> Result<(), InvokeError> {
        let packet = self.real_packet(action, std::slice::from_ref(target))?;
        self.send_to(viewer, &packet)
    }

    pub fn send_synthetic(
        &self,
        viewer: &Session,
        action: PlayerInfoAction,
        profile: Value,
        ping: i32,
        mode: GameMode,
        text: &str,
    ) -> Result<(), InvokeError> {
        let record = self.create_record(profile, ping, mode, text)?;
        let packet = self.synthetic_packet(action, vec![record])?;
        self.send_to(viewer, &packet)
    }
}
