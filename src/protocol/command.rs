//! Command catalog
//!
//! Static table mapping each command to its request and response shape.
//! Entries are fixed at compile time and never vary per call.

use std::fmt;
use std::str::FromStr;

use crate::error::KvError;

/// Argument layout of a request
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RequestShape {
    /// `NAME`
    NoArg,

    /// `NAME number`
    Num,

    /// `NAME key`
    Key,

    /// `NAME len` + bulk value
    Value,

    /// `NAME key1 key2`
    KeyKey,

    /// `NAME key number`
    KeyNum,

    /// `NAME key number number`
    KeyNumNum,

    /// `NAME key len` + bulk value
    KeyValue,

    /// `NAME key number len` + bulk value
    KeyNumValue,

    /// `NAME key score len` + bulk value (score is a float)
    KeyScoreValue,

    /// `NAME key1 key2 len` + bulk value
    KeyKeyValue,

    /// `NAME key1 key2 ... keyN` (at least one key)
    MultiKey,

    /// Count-prefixed `NAME k1 v1 k2 v2 ...`
    BulkSet,
}

impl RequestShape {
    /// Whether the last argument travels as a length-prefixed bulk payload
    pub fn has_bulk_value(self) -> bool {
        matches!(
            self,
            RequestShape::Value
                | RequestShape::KeyValue
                | RequestShape::KeyNumValue
                | RequestShape::KeyScoreValue
                | RequestShape::KeyKeyValue
        )
    }

    /// Exact number of arguments, or `None` for variadic shapes
    pub fn arity(self) -> Option<usize> {
        match self {
            RequestShape::NoArg => Some(0),
            RequestShape::Num | RequestShape::Key | RequestShape::Value => Some(1),
            RequestShape::KeyKey | RequestShape::KeyNum | RequestShape::KeyValue => Some(2),
            RequestShape::KeyNumNum
            | RequestShape::KeyNumValue
            | RequestShape::KeyScoreValue
            | RequestShape::KeyKeyValue => Some(3),
            RequestShape::MultiKey | RequestShape::BulkSet => None,
        }
    }
}

/// Kind of scalar carried by a value reply
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ValueKind {
    Number,
    Boolean,
    String,
}

/// Decode routine selected for a reply
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ResponseShape {
    /// Single `+`/`-` line
    Status,

    /// Single scalar line
    Value(ValueKind),

    /// `$len` + payload, or nil
    Bulk,

    /// `*count` of bulk payloads, or nil
    MultiBulk,

    /// `*count` of arbitrary replies
    Aggregate,
}

/// Catalog entry: name plus shapes
#[derive(Debug, PartialEq, Eq, Hash)]
pub struct CommandSpec {
    pub name: &'static str,
    pub request: RequestShape,
    pub response: ResponseShape,
}

macro_rules! catalog {
    ($($variant:ident => $name:literal, $req:ident, $resp:expr;)+) => {
        /// A command known to the catalog
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
        pub enum Command {
            $($variant,)+
        }

        impl Command {
            /// Every command in catalog order
            pub const ALL: &'static [Command] = &[$(Command::$variant,)+];

            /// The fixed catalog entry for this command
            pub fn spec(self) -> &'static CommandSpec {
                match self {
                    $(Command::$variant => &CommandSpec {
                        name: $name,
                        request: RequestShape::$req,
                        response: $resp,
                    },)+
                }
            }
        }
    };
}

use ResponseShape::{Aggregate, Bulk, MultiBulk, Status};

const NUMBER: ResponseShape = ResponseShape::Value(ValueKind::Number);
const BOOLEAN: ResponseShape = ResponseShape::Value(ValueKind::Boolean);
const STRING: ResponseShape = ResponseShape::Value(ValueKind::String);

catalog! {
    // -------------------------------------------------------------------------
    // Connection / Server
    // -------------------------------------------------------------------------
    Ping => "PING", NoArg, Status;
    Quit => "QUIT", NoArg, Status;
    Auth => "AUTH", Key, Status;
    Select => "SELECT", Num, Status;
    Echo => "ECHO", Value, Bulk;
    FlushDb => "FLUSHDB", NoArg, Status;
    FlushAll => "FLUSHALL", NoArg, Status;
    DbSize => "DBSIZE", NoArg, NUMBER;
    Save => "SAVE", NoArg, Status;
    BgSave => "BGSAVE", NoArg, Status;
    BgRewriteAof => "BGREWRITEAOF", NoArg, Status;
    LastSave => "LASTSAVE", NoArg, NUMBER;
    Shutdown => "SHUTDOWN", NoArg, Status;
    Info => "INFO", NoArg, Bulk;

    // -------------------------------------------------------------------------
    // Keyspace
    // -------------------------------------------------------------------------
    Exists => "EXISTS", Key, BOOLEAN;
    Del => "DEL", Key, NUMBER;
    Type => "TYPE", Key, STRING;
    Keys => "KEYS", Key, MultiBulk;
    RandomKey => "RANDOMKEY", NoArg, Bulk;
    Rename => "RENAME", KeyKey, Status;
    RenameNx => "RENAMENX", KeyKey, BOOLEAN;
    Expire => "EXPIRE", KeyNum, BOOLEAN;
    ExpireAt => "EXPIREAT", KeyNum, BOOLEAN;
    Ttl => "TTL", Key, NUMBER;
    Move => "MOVE", KeyNum, BOOLEAN;

    // -------------------------------------------------------------------------
    // Strings
    // -------------------------------------------------------------------------
    Set => "SET", KeyValue, Status;
    Get => "GET", Key, Bulk;
    GetSet => "GETSET", KeyValue, Bulk;
    SetNx => "SETNX", KeyValue, BOOLEAN;
    MGet => "MGET", MultiKey, MultiBulk;
    MSet => "MSET", BulkSet, Status;
    MSetNx => "MSETNX", BulkSet, BOOLEAN;
    Incr => "INCR", Key, NUMBER;
    IncrBy => "INCRBY", KeyNum, NUMBER;
    Decr => "DECR", Key, NUMBER;
    DecrBy => "DECRBY", KeyNum, NUMBER;
    Append => "APPEND", KeyValue, NUMBER;
    Substr => "SUBSTR", KeyNumNum, Bulk;

    // -------------------------------------------------------------------------
    // Lists
    // -------------------------------------------------------------------------
    RPush => "RPUSH", KeyValue, NUMBER;
    LPush => "LPUSH", KeyValue, NUMBER;
    LLen => "LLEN", Key, NUMBER;
    LRange => "LRANGE", KeyNumNum, MultiBulk;
    LTrim => "LTRIM", KeyNumNum, Status;
    LIndex => "LINDEX", KeyNum, Bulk;
    LSet => "LSET", KeyNumValue, Status;
    LRem => "LREM", KeyNumValue, NUMBER;
    LPop => "LPOP", Key, Bulk;
    RPop => "RPOP", Key, Bulk;
    RPopLPush => "RPOPLPUSH", KeyKey, Bulk;

    // -------------------------------------------------------------------------
    // Sets
    // -------------------------------------------------------------------------
    SAdd => "SADD", KeyValue, BOOLEAN;
    SRem => "SREM", KeyValue, BOOLEAN;
    SPop => "SPOP", Key, Bulk;
    SMove => "SMOVE", KeyKeyValue, BOOLEAN;
    SCard => "SCARD", Key, NUMBER;
    SIsMember => "SISMEMBER", KeyValue, BOOLEAN;
    SInter => "SINTER", MultiKey, MultiBulk;
    SInterStore => "SINTERSTORE", MultiKey, NUMBER;
    SUnion => "SUNION", MultiKey, MultiBulk;
    SUnionStore => "SUNIONSTORE", MultiKey, NUMBER;
    SDiff => "SDIFF", MultiKey, MultiBulk;
    SDiffStore => "SDIFFSTORE", MultiKey, NUMBER;
    SMembers => "SMEMBERS", Key, MultiBulk;
    SRandMember => "SRANDMEMBER", Key, Bulk;

    // -------------------------------------------------------------------------
    // Sorted Sets
    // -------------------------------------------------------------------------
    ZAdd => "ZADD", KeyScoreValue, BOOLEAN;
    ZRem => "ZREM", KeyValue, BOOLEAN;
    ZIncrBy => "ZINCRBY", KeyScoreValue, Bulk;
    ZRange => "ZRANGE", KeyNumNum, MultiBulk;
    ZRevRange => "ZREVRANGE", KeyNumNum, MultiBulk;
    ZRemRangeByRank => "ZREMRANGEBYRANK", KeyNumNum, NUMBER;
    ZCard => "ZCARD", Key, NUMBER;
    ZScore => "ZSCORE", KeyValue, Bulk;

    // -------------------------------------------------------------------------
    // Hashes
    // -------------------------------------------------------------------------
    HSet => "HSET", KeyKeyValue, BOOLEAN;
    HGet => "HGET", KeyKey, Bulk;
    HDel => "HDEL", KeyKey, BOOLEAN;
    HExists => "HEXISTS", KeyKey, BOOLEAN;
    HLen => "HLEN", Key, NUMBER;
    HKeys => "HKEYS", Key, MultiBulk;
    HVals => "HVALS", Key, MultiBulk;
    HGetAll => "HGETALL", Key, MultiBulk;

    // -------------------------------------------------------------------------
    // Transactions
    // -------------------------------------------------------------------------
    Multi => "MULTI", NoArg, Status;
    Exec => "EXEC", NoArg, Aggregate;
    Discard => "DISCARD", NoArg, Status;
}

impl Command {
    /// Command name as sent on the wire
    pub fn name(self) -> &'static str {
        self.spec().name
    }

    /// Argument layout
    pub fn request_shape(self) -> RequestShape {
        self.spec().request
    }

    /// Decode routine
    pub fn response_shape(self) -> ResponseShape {
        self.spec().response
    }

    /// Commands after which the server closes the connection
    pub fn is_terminal(self) -> bool {
        matches!(self, Command::Quit | Command::Shutdown)
    }

    /// Look up a command by name (case-insensitive)
    pub fn from_name(name: &str) -> Option<Command> {
        Command::ALL
            .iter()
            .copied()
            .find(|cmd| cmd.name().eq_ignore_ascii_case(name))
    }
}

impl FromStr for Command {
    type Err = KvError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Command::from_name(s).ok_or_else(|| KvError::UnknownCommand(s.to_string()))
    }
}

impl fmt::Display for Command {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}
