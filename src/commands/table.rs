//! Static command registry.
//!
//! Commands come in two arity classes. A *niladic* command takes no
//! arguments and does not touch the store (`PING`); a *variadic* command
//! receives the already-split argument list plus a store reference
//! (`ECHO`, `SET`, `GET`). The table maps lowercase command names to plain
//! function pointers and is built once at startup, read-only afterwards,
//! so lookups need no locking.

use crate::protocol::RespValue;
use crate::storage::Store;
use bytes::Bytes;
use std::collections::HashMap;
use std::time::Duration;
use tracing::debug;

/// Handler for a command that takes no arguments.
pub type NiladicHandler = fn() -> RespValue;

/// Handler for a command that takes one or more arguments.
pub type VariadicHandler = fn(&Store, &[Bytes]) -> RespValue;

/// The process-wide command table.
#[derive(Debug)]
pub struct CommandTable {
    niladic: HashMap<&'static str, NiladicHandler>,
    variadic: HashMap<&'static str, VariadicHandler>,
}

impl CommandTable {
    /// Builds the table of built-in commands.
    pub fn builtin() -> Self {
        let mut niladic: HashMap<&'static str, NiladicHandler> = HashMap::new();
        niladic.insert("ping", cmd_ping);

        let mut variadic: HashMap<&'static str, VariadicHandler> = HashMap::new();
        variadic.insert("echo", cmd_echo);
        variadic.insert("set", cmd_set);
        variadic.insert("get", cmd_get);

        Self { niladic, variadic }
    }

    /// Looks up a niladic command by lowercase name.
    pub fn niladic(&self, name: &str) -> Option<NiladicHandler> {
        self.niladic.get(name).copied()
    }

    /// Looks up a variadic command by lowercase name.
    pub fn variadic(&self, name: &str) -> Option<VariadicHandler> {
        self.variadic.get(name).copied()
    }
}

impl Default for CommandTable {
    fn default() -> Self {
        Self::builtin()
    }
}

// ============================================================================
// Built-in command handlers
// ============================================================================

/// `PING` — always replies `PONG`, any trailing arguments are ignored.
fn cmd_ping() -> RespValue {
    RespValue::pong()
}

/// `ECHO <message>` — replies with the message unchanged.
fn cmd_echo(_store: &Store, args: &[Bytes]) -> RespValue {
    match args {
        [message] => RespValue::bulk_string(message.clone()),
        _ => RespValue::error("ERR wrong number of arguments for 'echo' command"),
    }
}

/// `SET <key> <value> [PX <milliseconds>]` — stores the pair, optionally
/// with a millisecond TTL. Any modifier other than PX, or an argument count
/// outside {2, 4}, is an input error and leaves the store unmodified.
fn cmd_set(store: &Store, args: &[Bytes]) -> RespValue {
    match args {
        [key, value] => {
            store.set(key.clone(), value.clone(), None);
            RespValue::ok()
        }
        [key, value, modifier, millis] => {
            if !modifier.eq_ignore_ascii_case(b"px") {
                debug!(
                    modifier = %String::from_utf8_lossy(modifier),
                    "rejected unknown SET modifier"
                );
                return RespValue::error("ERR syntax error");
            }
            let millis = match parse_millis(millis) {
                Some(ms) => ms,
                None => return RespValue::error("ERR invalid expire time in 'set' command"),
            };
            store.set(key.clone(), value.clone(), Some(Duration::from_millis(millis)));
            RespValue::ok()
        }
        _ => RespValue::error("ERR wrong number of arguments for 'set' command"),
    }
}

/// `GET <key>` — the value, or the nil bulk string when absent or expired.
fn cmd_get(store: &Store, args: &[Bytes]) -> RespValue {
    match args {
        [key] => match store.get(key) {
            Some(value) => RespValue::bulk_string(value),
            None => RespValue::null(),
        },
        _ => RespValue::error("ERR wrong number of arguments for 'get' command"),
    }
}

fn parse_millis(raw: &[u8]) -> Option<u64> {
    let ms: u64 = std::str::from_utf8(raw).ok()?.parse().ok()?;
    if ms > 0 {
        Some(ms)
    } else {
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn b(s: &str) -> Bytes {
        Bytes::from(s.to_string())
    }

    #[test]
    fn table_knows_builtin_commands() {
        let table = CommandTable::builtin();
        assert!(table.niladic("ping").is_some());
        assert!(table.variadic("echo").is_some());
        assert!(table.variadic("set").is_some());
        assert!(table.variadic("get").is_some());
        assert!(table.niladic("echo").is_none());
        assert!(table.variadic("ping").is_none());
        assert!(table.variadic("flushdb").is_none());
    }

    #[test]
    fn ping_replies_pong() {
        assert_eq!(cmd_ping(), RespValue::pong());
    }

    #[test]
    fn echo_returns_argument_unchanged() {
        let store = Store::new();
        let reply = cmd_echo(&store, &[b("hey")]);
        assert_eq!(reply, RespValue::bulk_string(b("hey")));
    }

    #[test]
    fn echo_wrong_arity_is_error() {
        let store = Store::new();
        assert!(cmd_echo(&store, &[]).is_error());
        assert!(cmd_echo(&store, &[b("a"), b("b")]).is_error());
    }

    #[test]
    fn set_then_get() {
        let store = Store::new();
        assert_eq!(cmd_set(&store, &[b("foo"), b("bar")]), RespValue::ok());
        assert_eq!(
            cmd_get(&store, &[b("foo")]),
            RespValue::bulk_string(b("bar"))
        );
    }

    #[test]
    fn get_missing_is_nil() {
        let store = Store::new();
        assert_eq!(cmd_get(&store, &[b("missingkey")]), RespValue::null());
    }

    #[test]
    fn get_extra_arguments_is_error() {
        let store = Store::new();
        assert!(cmd_get(&store, &[b("k"), b("extra")]).is_error());
    }

    #[test]
    fn set_three_arguments_is_error() {
        let store = Store::new();
        let reply = cmd_set(&store, &[b("k"), b("v"), b("px")]);
        assert!(reply.is_error());
        assert_eq!(cmd_get(&store, &[b("k")]), RespValue::null());
    }

    #[test]
    fn set_unknown_modifier_is_error_and_leaves_store_unmodified() {
        let store = Store::new();
        let reply = cmd_set(&store, &[b("k"), b("v"), b("EX"), b("10")]);
        assert_eq!(reply, RespValue::error("ERR syntax error"));
        assert_eq!(cmd_get(&store, &[b("k")]), RespValue::null());
    }

    #[test]
    fn set_bad_expire_time_is_error() {
        let store = Store::new();
        assert!(cmd_set(&store, &[b("k"), b("v"), b("PX"), b("soon")]).is_error());
        assert!(cmd_set(&store, &[b("k"), b("v"), b("PX"), b("0")]).is_error());
        assert!(cmd_set(&store, &[b("k"), b("v"), b("PX"), b("-5")]).is_error());
        assert_eq!(cmd_get(&store, &[b("k")]), RespValue::null());
    }

    #[tokio::test(start_paused = true)]
    async fn set_px_modifier_is_case_insensitive() {
        let store = Store::new();
        assert_eq!(
            cmd_set(&store, &[b("k"), b("v"), b("px"), b("100")]),
            RespValue::ok()
        );
        assert_eq!(
            cmd_set(&store, &[b("j"), b("w"), b("Px"), b("100")]),
            RespValue::ok()
        );

        assert_eq!(cmd_get(&store, &[b("k")]), RespValue::bulk_string(b("v")));

        tokio::time::advance(Duration::from_millis(100)).await;
        assert_eq!(cmd_get(&store, &[b("k")]), RespValue::null());
        assert_eq!(cmd_get(&store, &[b("j")]), RespValue::null());
    }
}
