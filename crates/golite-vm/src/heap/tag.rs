//! Tag kinds for heap nodes (spec §3.2).

/// Discriminant stored in byte 0 of a node's header word.
///
/// `Struct` and `Slice` are reserved: the `Tag` enum carries them so
/// `allocate` can in principle construct nodes of those kinds, but no
/// opcode in `interpreter::opcodes` ever produces or consumes one.
#[repr(u8)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Tag {
    Free = 0,
    Unallocated = 1,
    False = 2,
    True = 3,
    Number = 4,
    Null = 5,
    Undefined = 6,
    Chan = 7,
    Struct = 8,
    Array = 9,
    Slice = 10,
    Closure = 11,
    Builtin = 12,
    String = 13,
    Environment = 14,
    Frame = 15,
    BlockFrame = 16,
    CallFrame = 17,
    Extension = 18,
    WaitSend = 19,
    WaitReceive = 20,
}

impl Tag {
    pub const COUNT: u8 = 21;

    pub fn from_byte(b: u8) -> Self {
        match b {
            0 => Tag::Free,
            1 => Tag::Unallocated,
            2 => Tag::False,
            3 => Tag::True,
            4 => Tag::Number,
            5 => Tag::Null,
            6 => Tag::Undefined,
            7 => Tag::Chan,
            8 => Tag::Struct,
            9 => Tag::Array,
            10 => Tag::Slice,
            11 => Tag::Closure,
            12 => Tag::Builtin,
            13 => Tag::String,
            14 => Tag::Environment,
            15 => Tag::Frame,
            16 => Tag::BlockFrame,
            17 => Tag::CallFrame,
            18 => Tag::Extension,
            19 => Tag::WaitSend,
            20 => Tag::WaitReceive,
            other => panic!("corrupt heap: unknown tag byte {other}"),
        }
    }

    /// Human-readable name, used in `VmError` diagnostics.
    pub fn name(self) -> &'static str {
        match self {
            Tag::Free => "FREE",
            Tag::Unallocated => "UNALLOCATED",
            Tag::False => "FALSE",
            Tag::True => "TRUE",
            Tag::Number => "NUMBER",
            Tag::Null => "NULL",
            Tag::Undefined => "UNDEFINED",
            Tag::Chan => "CHAN",
            Tag::Struct => "STRUCT",
            Tag::Array => "ARRAY",
            Tag::Slice => "SLICE",
            Tag::Closure => "CLOSURE",
            Tag::Builtin => "BUILTIN",
            Tag::String => "STRING",
            Tag::Environment => "ENVIRONMENT",
            Tag::Frame => "FRAME",
            Tag::BlockFrame => "BLOCKFRAME",
            Tag::CallFrame => "CALLFRAME",
            Tag::Extension => "EXTENSION",
            Tag::WaitSend => "WAIT_SEND",
            Tag::WaitReceive => "WAIT_RECEIVE",
        }
    }
}
