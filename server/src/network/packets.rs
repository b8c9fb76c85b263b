// gore_server/server/src/network/packets.rs
use super::codec::{BitReader, BitWriter, CodecError, CodecResult, WireEnum};
use crate::core::constants::{MAX_CHAT_LEN, MAX_USER_NAME_LEN};
use crate::core::types::{CharacterId, ItemId, MapId, Vec2};
use crate::entities::stats::StatKind;

const PACKET_ID_BITS: u32 = 6;

macro_rules! packet_ids {
    ($name:ident, $label:expr, { $($variant:ident = $value:literal),+ $(,)? }) => {
        #[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
        pub enum $name {
            $($variant = $value),+
        }

        impl WireEnum for $name {
            const BITS: u32 = PACKET_ID_BITS;
            const NAME: &'static str = $label;

            fn to_wire(self) -> u32 {
                self as u32
            }

            fn from_wire(value: u32) -> Option<Self> {
                match value {
                    $($value => Some($name::$variant),)+
                    _ => None,
                }
            }
        }
    };
}

packet_ids!(ClientPacketId, "client packet id", {
    Attack = 0,
    Jump = 1,
    Login = 2,
    MoveLeft = 3,
    MoveRight = 4,
    MoveStop = 5,
    PickupItem = 6,
    Ping = 7,
    Say = 8,
    SetUdpPort = 9,
});

packet_ids!(ServerPacketId, "server packet id", {
    LoginSuccessful = 0,
    LoginUnsuccessful = 1,
    Pong = 2,
    CreateCharacter = 3,
    RemoveCharacter = 4,
    UpdatePosition = 5,
    CharacterKilled = 6,
    CharacterRespawned = 7,
    CharacterDamaged = 8,
    SetStat = 9,
    CreateItem = 10,
    RemoveItem = 11,
    Chat = 12,
});

impl WireEnum for StatKind {
    const BITS: u32 = 3;
    const NAME: &'static str = "stat";

    fn to_wire(self) -> u32 {
        self.to_u8() as u32
    }

    fn from_wire(value: u32) -> Option<Self> {
        StatKind::from_u8(value as u8)
    }
}

fn write_vec2(w: &mut BitWriter, v: Vec2) {
    w.write_f32(v.x);
    w.write_f32(v.y);
}

fn read_vec2(r: &mut BitReader<'_>) -> CodecResult<Vec2> {
    Ok(Vec2::new(r.read_f32()?, r.read_f32()?))
}

/// Packets a client sends to the server.
#[derive(Clone, Debug, PartialEq)]
pub enum ClientPacket {
    Attack,
    Jump,
    Login { name: String },
    MoveLeft,
    MoveRight,
    MoveStop,
    PickupItem,
    Ping { id: u16 },
    Say { text: String },
    SetUdpPort { port: u16 },
}

impl ClientPacket {
    pub fn id(&self) -> ClientPacketId {
        match self {
            ClientPacket::Attack => ClientPacketId::Attack,
            ClientPacket::Jump => ClientPacketId::Jump,
            ClientPacket::Login { .. } => ClientPacketId::Login,
            ClientPacket::MoveLeft => ClientPacketId::MoveLeft,
            ClientPacket::MoveRight => ClientPacketId::MoveRight,
            ClientPacket::MoveStop => ClientPacketId::MoveStop,
            ClientPacket::PickupItem => ClientPacketId::PickupItem,
            ClientPacket::Ping { .. } => ClientPacketId::Ping,
            ClientPacket::Say { .. } => ClientPacketId::Say,
            ClientPacket::SetUdpPort { .. } => ClientPacketId::SetUdpPort,
        }
    }

    /// Safe to carry over the unreliable channel.
    pub fn is_unreliable_ok(&self) -> bool {
        matches!(
            self,
            ClientPacket::MoveLeft | ClientPacket::MoveRight | ClientPacket::MoveStop | ClientPacket::Ping { .. }
        )
    }

    pub fn encode(&self) -> Vec<u8> {
        let mut w = BitWriter::with_capacity(16);
        w.write_enum(self.id());
        match self {
            ClientPacket::Login { name } => w.write_string(name),
            ClientPacket::Ping { id } => w.write_u16(*id),
            ClientPacket::Say { text } => w.write_string(text),
            ClientPacket::SetUdpPort { port } => w.write_u16(*port),
            _ => {}
        }
        w.into_bytes()
    }

    pub fn decode(data: &[u8]) -> CodecResult<ClientPacket> {
        if data.is_empty() {
            return Err(CodecError::Empty);
        }
        let mut r = BitReader::new(data);
        let packet = match r.read_enum::<ClientPacketId>()? {
            ClientPacketId::Attack => ClientPacket::Attack,
            ClientPacketId::Jump => ClientPacket::Jump,
            ClientPacketId::Login => ClientPacket::Login { name: r.read_string(MAX_USER_NAME_LEN)? },
            ClientPacketId::MoveLeft => ClientPacket::MoveLeft,
            ClientPacketId::MoveRight => ClientPacket::MoveRight,
            ClientPacketId::MoveStop => ClientPacket::MoveStop,
            ClientPacketId::PickupItem => ClientPacket::PickupItem,
            ClientPacketId::Ping => ClientPacket::Ping { id: r.read_u16()? },
            ClientPacketId::Say => ClientPacket::Say { text: r.read_string(MAX_CHAT_LEN)? },
            ClientPacketId::SetUdpPort => ClientPacket::SetUdpPort { port: r.read_u16()? },
        };
        Ok(packet)
    }
}

/// Packets the server sends to clients.
#[derive(Clone, Debug, PartialEq)]
pub enum ServerPacket {
    LoginSuccessful { character: CharacterId, map: MapId },
    LoginUnsuccessful { reason: String },
    Pong { id: u16 },
    CreateCharacter { id: CharacterId, name: String, position: Vec2 },
    RemoveCharacter { id: CharacterId },
    UpdatePosition { id: CharacterId, position: Vec2, velocity: Vec2 },
    CharacterKilled { id: CharacterId },
    CharacterRespawned { id: CharacterId, position: Vec2 },
    CharacterDamaged { id: CharacterId, amount: u32 },
    SetStat { id: CharacterId, stat: StatKind, value: i32 },
    CreateItem { id: ItemId, name: String, position: Vec2 },
    RemoveItem { id: ItemId },
    Chat { speaker: CharacterId, text: String },
}

impl ServerPacket {
    pub fn id(&self) -> ServerPacketId {
        match self {
            ServerPacket::LoginSuccessful { .. } => ServerPacketId::LoginSuccessful,
            ServerPacket::LoginUnsuccessful { .. } => ServerPacketId::LoginUnsuccessful,
            ServerPacket::Pong { .. } => ServerPacketId::Pong,
            ServerPacket::CreateCharacter { .. } => ServerPacketId::CreateCharacter,
            ServerPacket::RemoveCharacter { .. } => ServerPacketId::RemoveCharacter,
            ServerPacket::UpdatePosition { .. } => ServerPacketId::UpdatePosition,
            ServerPacket::CharacterKilled { .. } => ServerPacketId::CharacterKilled,
            ServerPacket::CharacterRespawned { .. } => ServerPacketId::CharacterRespawned,
            ServerPacket::CharacterDamaged { .. } => ServerPacketId::CharacterDamaged,
            ServerPacket::SetStat { .. } => ServerPacketId::SetStat,
            ServerPacket::CreateItem { .. } => ServerPacketId::CreateItem,
            ServerPacket::RemoveItem { .. } => ServerPacketId::RemoveItem,
            ServerPacket::Chat { .. } => ServerPacketId::Chat,
        }
    }

    pub fn encode(&self) -> Vec<u8> {
        let mut w = BitWriter::with_capacity(32);
        w.write_enum(self.id());
        match self {
            ServerPacket::LoginSuccessful { character, map } => {
                w.write_u64(character.0);
                w.write_u16(map.0);
            }
            ServerPacket::LoginUnsuccessful { reason } => w.write_string(reason),
            ServerPacket::Pong { id } => w.write_u16(*id),
            ServerPacket::CreateCharacter { id, name, position } => {
                w.write_u64(id.0);
                w.write_string(name);
                write_vec2(&mut w, *position);
            }
            ServerPacket::RemoveCharacter { id } | ServerPacket::CharacterKilled { id } => w.write_u64(id.0),
            ServerPacket::UpdatePosition { id, position, velocity } => {
                w.write_u64(id.0);
                write_vec2(&mut w, *position);
                write_vec2(&mut w, *velocity);
            }
            ServerPacket::CharacterRespawned { id, position } => {
                w.write_u64(id.0);
                write_vec2(&mut w, *position);
            }
            ServerPacket::CharacterDamaged { id, amount } => {
                w.write_u64(id.0);
                w.write_compact_u32(*amount);
            }
            ServerPacket::SetStat { id, stat, value } => {
                w.write_u64(id.0);
                w.write_enum(*stat);
                w.write_i32(*value);
            }
            ServerPacket::CreateItem { id, name, position } => {
                w.write_u64(id.0);
                w.write_string(name);
                write_vec2(&mut w, *position);
            }
            ServerPacket::RemoveItem { id } => w.write_u64(id.0),
            ServerPacket::Chat { speaker, text } => {
                w.write_u64(speaker.0);
                w.write_string(text);
            }
        }
        w.into_bytes()
    }

    pub fn decode(data: &[u8]) -> CodecResult<ServerPacket> {
        if data.is_empty() {
            return Err(CodecError::Empty);
        }
        let mut r = BitReader::new(data);
        let packet = match r.read_enum::<ServerPacketId>()? {
            ServerPacketId::LoginSuccessful => ServerPacket::LoginSuccessful {
                character: CharacterId(r.read_u64()?),
                map: MapId(r.read_u16()?),
            },
            ServerPacketId::LoginUnsuccessful => ServerPacket::LoginUnsuccessful { reason: r.read_string(MAX_CHAT_LEN)? },
            ServerPacketId::Pong => ServerPacket::Pong { id: r.read_u16()? },
            ServerPacketId::CreateCharacter => ServerPacket::CreateCharacter {
                id: CharacterId(r.read_u64()?),
                name: r.read_string(MAX_USER_NAME_LEN)?,
                position: read_vec2(&mut r)?,
            },
            ServerPacketId::RemoveCharacter => ServerPacket::RemoveCharacter { id: CharacterId(r.read_u64()?) },
            ServerPacketId::UpdatePosition => ServerPacket::UpdatePosition {
                id: CharacterId(r.read_u64()?),
                position: read_vec2(&mut r)?,
                velocity: read_vec2(&mut r)?,
            },
            ServerPacketId::CharacterKilled => ServerPacket::CharacterKilled { id: CharacterId(r.read_u64()?) },
            ServerPacketId::CharacterRespawned => ServerPacket::CharacterRespawned {
                id: CharacterId(r.read_u64()?),
                position: read_vec2(&mut r)?,
            },
            ServerPacketId::CharacterDamaged => ServerPacket::CharacterDamaged {
                id: CharacterId(r.read_u64()?),
                amount: r.read_compact_u32()?,
            },
            ServerPacketId::SetStat => ServerPacket::SetStat {
                id: CharacterId(r.read_u64()?),
                stat: r.read_enum()?,
                value: r.read_i32()?,
            },
            ServerPacketId::CreateItem => ServerPacket::CreateItem {
                id: ItemId(r.read_u64()?),
                name: r.read_string(MAX_CHAT_LEN)?,
                position: read_vec2(&mut r)?,
            },
            ServerPacketId::RemoveItem => ServerPacket::RemoveItem { id: ItemId(r.read_u64()?) },
            ServerPacketId::Chat => ServerPacket::Chat {
                speaker: CharacterId(r.read_u64()?),
                text: r.read_string(MAX_CHAT_LEN)?,
            },
        };
        Ok(packet)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn login_name_is_length_limited() {
        let long = "x".repeat(MAX_USER_NAME_LEN + 1);
        let bytes = ClientPacket::Login { name: long }.encode();
        assert!(matches!(ClientPacket::decode(&bytes), Err(CodecError::StringTooLong { .. })));
    }

    #[test]
    fn unknown_packet_id_is_rejected() {
        // 63 << 2 puts id 63 in the top six bits.
        assert_eq!(
            ClientPacket::decode(&[63 << 2]),
            Err(CodecError::InvalidEnumValue { kind: "client packet id", value: 63 })
        );
        assert_eq!(ClientPacket::decode(&[]), Err(CodecError::Empty));
    }

    #[test]
    fn set_stat_packs_stat_in_three_bits() {
        let packet = ServerPacket::SetStat { id: CharacterId(4), stat: StatKind::Def, value: -3 };
        let bytes = packet.encode();
        // 6 + 64 + 3 + 32 bits
        assert_eq!(bytes.len(), 14);
        assert_eq!(ServerPacket::decode(&bytes).unwrap(), packet);
    }

    #[test]
    fn truncated_ping_is_rejected() {
        let bytes = ClientPacket::Ping { id: 0xBEEF }.encode();
        assert!(matches!(ClientPacket::decode(&bytes[..1]), Err(CodecError::UnexpectedEof { .. })));
        assert_eq!(ClientPacket::decode(&bytes).unwrap(), ClientPacket::Ping { id: 0xBEEF });
    }
}
